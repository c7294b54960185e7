//! Messages the bot sends during an application.

use crate::applicant::{ApplicantRecord, ExtractedAnswers};

pub fn welcome(display_name: &str) -> String {
    format!(
        "Hello, thank you for choosing our services. Before we proceed, \
         may I confirm that your full name is {display_name}?"
    )
}

pub const ASK_NAME: &str = "What is your full name then?";

pub const IDENTITY_REPROMPT: &str =
    "Sorry, I didn't catch that. Please answer \"Yes\", \"No\", or type your full name.";

pub fn identity_confirmed(name: &str) -> String {
    format!(
        "Perfect, {name}! I'll create an account for you right away!\n\
         All done!\n\
         Now, what loan amount are you planning to receive?"
    )
}

pub fn loan_amount_accepted(amount: u64) -> String {
    format!(
        "Wonderful!! We will be looking for a ${amount} loan\n\
         Please, fill out the attached document and send it back to me as a .pdf file"
    )
}

pub const TEMPLATE_UNAVAILABLE: &str =
    "I don't have a blank application on hand right now. Please ask us for the form and send it back as a .pdf file.";

pub const INVALID_LOAN_AMOUNT: &str =
    "Sorry, I don't think this is a valid amount. Please enter a whole number above zero, without '$'";

pub const MALFORMED_APPLICATION: &str = "Sorry, I couldn't parse some fields of your application. \
     Please make sure to follow guidelines and resubmit your application";

pub const UNREADABLE_APPLICATION: &str = "Sorry, I couldn't read that file. \
     Please make sure it is a PDF with selectable text and resubmit your application";

pub const ATTACHMENT_FAILED: &str = "Sorry, an error occurred. Please try to resubmit your application";

pub fn application_summary(record: &ApplicantRecord, answers: &ExtractedAnswers) -> String {
    format!(
        "Splendid! Here is what I managed to learn from your application:\n\n\
         Name: {}\n{}\n\
         Now, please provide us with your age",
        record.name.as_deref().unwrap_or(""),
        answers.summary()
    )
}

pub const INVALID_AGE: &str = "Sorry, I don't think this is a valid age. Try again";

pub const CALCULATING: &str = "Got it! Now, give me a moment while I calculate your results...";

pub fn quote(rate_percent: u32) -> String {
    format!("Your expected interest is: {rate_percent}%")
}

pub const PRICING_FAILED: &str = "Sorry, I couldn't calculate a rate for your application. \
     Please try again later, or send /apply to start over.";

pub const ALREADY_COMPLETE: &str =
    "Your application is complete. Send /apply to start a new one.";

pub const NO_ACTIVE_APPLICATION: &str = "Send /apply to start a loan application.";

pub const HELP: &str = "Commands:\n\
     /apply - start (or restart) a loan application\n\
     /status - show where your application stands\n\
     /help - show this message";

pub fn status(record: &ApplicantRecord) -> String {
    use super::Stage;

    let step = match record.stage() {
        Stage::AwaitIdentity => "waiting for you to confirm your name",
        Stage::AwaitLoanAmount => "waiting for the loan amount",
        Stage::AwaitDocument => "waiting for your filled-out application (.pdf)",
        Stage::AwaitAge => "waiting for your age",
        Stage::Complete => "complete",
    };
    match record.interest_rate {
        Some(rate) => format!("Application {}: {step}. Quoted rate: {rate}%", record.id),
        None => format!("Application {}: {step}.", record.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_names_the_user() {
        assert!(welcome("ada").ends_with("your full name is ada?"));
    }

    #[test]
    fn status_mentions_stage_and_rate() {
        let mut record = ApplicantRecord::new("cli", "u");
        assert!(status(&record).contains("confirm your name"));

        record.interest_rate = Some(12);
        assert!(status(&record).ends_with("Quoted rate: 12%"));
    }
}
