//! End-to-end conversation tests.
//!
//! Each test loads real model artifacts written to a temp directory, drives
//! the bot through the CLI channel (attachments are local files), and checks
//! the replies and what ends up in the store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use loan_assist::applicant::IncomeBracket;
use loan_assist::bot::LoanBot;
use loan_assist::channels::{Attachment, ChannelManager, CliChannel, IncomingMessage};
use loan_assist::conversation::{prompts, ApplicantKey, ConversationController, Stage};
use loan_assist::error::ModelError;
use loan_assist::extract::PlainTextParser;
use loan_assist::scoring::artifact::digest_hex;
use loan_assist::scoring::{ModelPins, PricingPolicy, RiskPricer};
use loan_assist::store::{Database, LibSqlBackend};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const APPLICATION: &str = "\
Race: White
Sex: Female
Answer: Yes
Answer: Private, Sales, 40
Answer: Married-civ-spouse
Answer: RENT
Answer: Bachelors
Answer: United-States
Answer: B
Answer: N
";

/// One stump: applicants over 40 earn more than 50K.
fn income_model() -> serde_json::Value {
    serde_json::json!({
        "version": "it-1",
        "features": ["age", "workclass", "education", "marital_status", "occupation",
                     "race", "sex", "hours_per_week", "native_country"],
        "categories": {
            "workclass": ["Private", "Self-emp-inc"],
            "sex": ["Female", "Male"],
            "native_country": ["developed", "developing"]
        },
        "classes": ["<=50K", ">50K"],
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 40.0, "left": 1, "right": 2},
                {"value": [1.0, 0.0]},
                {"value": [0.0, 1.0]}
            ]}
        ]
    })
}

/// All-zero weights: every applicant defaults with probability 0.5.
fn risk_model() -> serde_json::Value {
    let n = 7;
    let identity: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    serde_json::json!({
        "version": "it-1",
        "features": ["age", "income", "home_ownership", "employed", "loan_grade",
                     "loan_amount", "prior_default"],
        "categories": {
            "home_ownership": ["MORTGAGE", "OTHER", "OWN", "RENT"],
            "employed": ["No", "Yes"],
            "loan_grade": ["A", "B", "C", "D", "E", "F", "G"],
            "prior_default": ["N", "Y"]
        },
        "scaler": {"mean": vec![0.0; n], "scale": vec![1.0; n]},
        "projection": {"mean": vec![0.0; n], "components": identity},
        "coefficients": vec![0.0; n],
        "intercept": 0.0
    })
}

fn write_models(dir: &Path) {
    std::fs::write(dir.join("income_model.json"), income_model().to_string()).unwrap();
    std::fs::write(dir.join("risk_model.json"), risk_model().to_string()).unwrap();
    std::fs::write(
        dir.join("hdi.csv"),
        "country,hdi2019\nUnited States,0.926\nIndia,0.645\n",
    )
    .unwrap();
}

struct TestBot {
    bot: LoanBot,
    store: Arc<LibSqlBackend>,
    dir: tempfile::TempDir,
}

async fn test_bot(template: bool) -> TestBot {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());

    let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    store.run_migrations().await.unwrap();

    let pricer =
        RiskPricer::from_dir(dir.path(), &ModelPins::default(), PricingPolicy::default()).unwrap();

    let template_path = dir.path().join("application_template.docx");
    std::fs::write(&template_path, b"blank form").unwrap();

    let controller = ConversationController::new(
        store.clone(),
        Arc::new(PlainTextParser),
        pricer,
        dir.path().join("apps"),
    )
    .with_template(template.then_some(template_path));

    let mut channels = ChannelManager::new();
    channels.add(Arc::new(CliChannel::new()));

    TestBot {
        bot: LoanBot::new(channels, controller),
        store,
        dir,
    }
}

fn say(content: &str) -> IncomingMessage {
    IncomingMessage::new("cli", "local-user", content).with_user_name("Grace Hopper")
}

fn upload(path: &Path) -> IncomingMessage {
    let name = path.file_name().unwrap().to_string_lossy().to_string();
    say("").with_attachment(Attachment::new(name, path.to_string_lossy()))
}

async fn send(t: &TestBot, msg: IncomingMessage) -> Vec<String> {
    timeout(TEST_TIMEOUT, t.bot.handle_message(&msg))
        .await
        .expect("handle_message timed out")
        .unwrap()
        .into_iter()
        .map(|r| r.content)
        .collect()
}

async fn stage(t: &TestBot) -> Stage {
    let key = ApplicantKey::new("cli", "local-user");
    let session = t.bot.sessions().get(&key).await.unwrap();
    let stage = session.lock().await.stage();
    stage
}

#[tokio::test]
async fn full_application_is_quoted_and_stored() {
    let t = test_bot(true).await;
    let form = t.dir.path().join("filled.pdf");
    std::fs::write(&form, APPLICATION).unwrap();

    let replies = send(&t, say("/apply")).await;
    assert!(replies[0].contains("Grace Hopper"));

    send(&t, say("No")).await;
    let replies = send(&t, say("Grace Brewster Hopper")).await;
    assert!(replies[0].contains("Grace Brewster Hopper"));
    assert_eq!(stage(&t).await, Stage::AwaitLoanAmount);

    let replies = send(&t, say("ten thousand")).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(stage(&t).await, Stage::AwaitLoanAmount);

    let replies = timeout(TEST_TIMEOUT, t.bot.handle_message(&say("1000")))
        .await
        .unwrap()
        .unwrap();
    assert!(replies.iter().any(|r| r.file.is_some()));
    assert_eq!(stage(&t).await, Stage::AwaitDocument);

    // A non-PDF upload is ignored without a reply.
    let notes = t.dir.path().join("notes.txt");
    std::fs::write(&notes, "hello").unwrap();
    assert!(send(&t, upload(&notes)).await.is_empty());
    assert_eq!(stage(&t).await, Stage::AwaitDocument);

    let replies = send(&t, upload(&form)).await;
    assert!(replies[0].contains("Bachelors"));
    assert_eq!(stage(&t).await, Stage::AwaitAge);

    let replies = send(&t, say("130")).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(stage(&t).await, Stage::AwaitAge);

    let replies = send(&t, say("30")).await;
    assert_eq!(replies.last().unwrap(), "Your expected interest is: 12%");
    assert_eq!(stage(&t).await, Stage::Complete);

    let key = ApplicantKey::new("cli", "local-user");
    let id = t.bot.sessions().get(&key).await.unwrap().lock().await.id;
    let stored = t.store.get_record(id).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Grace Brewster Hopper"));
    assert_eq!(stored.loan_amount, Some(1000));
    assert_eq!(stored.occupation.as_deref(), Some("Sales"));
    assert_eq!(stored.age, Some(30));
    assert_eq!(stored.income, Some(IncomeBracket::AtMost50K));
    assert_eq!(stored.interest_rate, Some(12));
    assert_eq!(stored.stage(), Stage::Complete);
    assert!(stored.completed_at.is_some());

    // The transient upload is gone.
    let apps = t.dir.path().join("apps");
    assert_eq!(std::fs::read_dir(apps).unwrap().count(), 0);
}

#[tokio::test]
async fn malformed_application_holds_the_stage() {
    let t = test_bot(false).await;
    let form = t.dir.path().join("broken.pdf");
    std::fs::write(&form, "Race: White\nAnswer: Yes\n").unwrap();

    send(&t, say("/apply")).await;
    send(&t, say("yes")).await;
    let replies = send(&t, say("5000")).await;
    assert_eq!(replies[1], prompts::TEMPLATE_UNAVAILABLE);

    let replies = send(&t, upload(&form)).await;
    assert_eq!(replies.len(), 1);
    assert_eq!(stage(&t).await, Stage::AwaitDocument);

    // Resubmitting a good form moves on.
    std::fs::write(&form, APPLICATION).unwrap();
    send(&t, upload(&form)).await;
    assert_eq!(stage(&t).await, Stage::AwaitAge);
}

#[tokio::test]
async fn older_applicants_are_classified_above_50k() {
    let t = test_bot(false).await;
    let form = t.dir.path().join("filled.pdf");
    std::fs::write(&form, APPLICATION).unwrap();

    for line in ["/apply", "yes", "2000"] {
        send(&t, say(line)).await;
    }
    send(&t, upload(&form)).await;
    send(&t, say("55")).await;

    let key = ApplicantKey::new("cli", "local-user");
    let session = t.bot.sessions().get(&key).await.unwrap();
    let record = session.lock().await;
    assert_eq!(record.income, Some(IncomeBracket::Above50K));

    let stored = t.store.list_records_for_user("cli", "local-user").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, record.id);
}

#[tokio::test]
async fn pinned_digest_mismatch_fails_model_loading() {
    let dir = tempfile::tempdir().unwrap();
    write_models(dir.path());

    let income_bytes = std::fs::read(dir.path().join("income_model.json")).unwrap();
    let pins = ModelPins {
        income: Some(digest_hex(&income_bytes)),
        risk: Some("0".repeat(64)),
    };

    let err = RiskPricer::from_dir(dir.path(), &pins, PricingPolicy::default()).unwrap_err();
    assert!(matches!(err, ModelError::DigestMismatch { .. }));
}
