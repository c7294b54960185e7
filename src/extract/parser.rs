//! Field extractor — turns application text into an [`ExtractedAnswers`] set.
//!
//! The application form has a fixed layout:
//!
//! ```text
//! Race: White
//! Sex: Female
//! 1. Are you currently employed?
//! Answer: Yes
//! 2. Work class, occupation and hours worked per week (or N/A)?
//! Answer: Private, Sales, 40
//! ...
//! ```
//!
//! Race and sex come from their labeled lines. Every other field comes from
//! the "Answer:" lines in question order, where the second question is a
//! joint question covering three fields.

use regex::Regex;

use crate::applicant::{ApplicationField, ExtractedAnswers};
use crate::error::ExtractionError;

/// Placeholder answer for the joint question when it does not apply.
pub const NOT_APPLICABLE: &str = "N/A";

/// One question on the form and the field(s) its answer fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Question {
    Single(ApplicationField),
    Joint,
}

/// Questions answered by "Answer:" lines, in document order.
const QUESTIONS: [Question; 8] = [
    Question::Single(ApplicationField::Employed),
    Question::Joint,
    Question::Single(ApplicationField::MaritalStatus),
    Question::Single(ApplicationField::HomeOwnership),
    Question::Single(ApplicationField::Education),
    Question::Single(ApplicationField::NativeCountry),
    Question::Single(ApplicationField::LoanGrade),
    Question::Single(ApplicationField::PriorDefault),
];

/// Extracts the twelve application fields from document text.
pub struct FieldExtractor {
    race: Regex,
    sex: Regex,
    answer: Regex,
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor {
    pub fn new() -> Self {
        Self {
            race: Regex::new(r"(?im)^[ \t]*race[ \t]*:(.*)$").unwrap(),
            sex: Regex::new(r"(?im)^[ \t]*sex[ \t]*:(.*)$").unwrap(),
            answer: Regex::new(r"(?im)^[ \t]*answer[ \t]*:(.*)$").unwrap(),
        }
    }

    /// Number of "Answer:" lines a complete application needs.
    pub fn required_answers() -> usize {
        QUESTIONS.len()
    }

    /// Extract all fields, or fail with a malformed-application error.
    pub fn extract(&self, text: &str) -> Result<ExtractedAnswers, ExtractionError> {
        let mut answers = ExtractedAnswers::new();

        answers.insert(ApplicationField::Race, labeled_value(&self.race, text, "Race:")?);
        answers.insert(ApplicationField::Sex, labeled_value(&self.sex, text, "Sex:")?);

        let lines: Vec<&str> = self
            .answer
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .collect();

        if lines.len() < QUESTIONS.len() {
            return Err(ExtractionError::NotEnoughAnswers {
                expected: QUESTIONS.len(),
                found: lines.len(),
            });
        }
        if lines.len() > QUESTIONS.len() {
            tracing::debug!(
                extra = lines.len() - QUESTIONS.len(),
                "Ignoring trailing answer lines"
            );
        }

        for (question, line) in QUESTIONS.iter().zip(&lines) {
            match question {
                Question::Single(field) => answers.insert(*field, *line),
                Question::Joint => {
                    for (field, part) in ApplicationField::JOINT.iter().zip(split_joint(line)?) {
                        answers.insert(*field, part);
                    }
                }
            }
        }

        debug_assert!(answers.is_complete());
        Ok(answers)
    }
}

/// Value following a label on its own line, trimmed. Blank counts as missing.
fn labeled_value(
    pattern: &Regex,
    text: &str,
    label: &'static str,
) -> Result<String, ExtractionError> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ExtractionError::MissingLabel { label })
}

/// Split the joint answer into its three parts.
///
/// "N/A" applies to all three fields and is checked before splitting.
fn split_joint(answer: &str) -> Result<Vec<String>, ExtractionError> {
    let expected = ApplicationField::JOINT.len();

    if answer.trim().eq_ignore_ascii_case(NOT_APPLICABLE) {
        return Ok(vec![NOT_APPLICABLE.to_string(); expected]);
    }

    let parts: Vec<String> = answer.split(',').map(|p| p.trim().to_string()).collect();
    if parts.len() != expected || parts.iter().any(String::is_empty) {
        return Err(ExtractionError::JointAnswerSplit {
            answer: answer.to_string(),
            expected,
        });
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application(joint: &str) -> String {
        format!(
            "LOAN APPLICATION\n\
             Race: White\n\
             Sex:   Female  \n\
             \n\
             1. Are you currently employed?\n\
             Answer: Yes\n\
             2. Work class, occupation, hours per week\n\
             Answer: {joint}\n\
             3. Are you married?\n\
             answer: No\n\
             4. Home ownership\n\
             ANSWER:  RENT \n\
             5. Highest education\n\
             Answer: Bachelors\n\
             6. Native country\n\
             Answer: Canada\n\
             7. Loan grade\n\
             Answer: B\n\
             8. Have you defaulted before?\n\
             Answer: N\n"
        )
    }

    #[test]
    fn well_formed_document_yields_all_fields() {
        let answers = FieldExtractor::new()
            .extract(&application("Private, Sales, 40"))
            .unwrap();

        assert_eq!(answers.len(), 12);
        assert!(answers.is_complete());
        assert_eq!(answers.get(ApplicationField::Race), Some("White"));
        assert_eq!(answers.get(ApplicationField::Sex), Some("Female"));
        assert_eq!(answers.get(ApplicationField::Employed), Some("Yes"));
        assert_eq!(answers.get(ApplicationField::MaritalStatus), Some("No"));
        assert_eq!(answers.get(ApplicationField::HomeOwnership), Some("RENT"));
        assert_eq!(answers.get(ApplicationField::Education), Some("Bachelors"));
        assert_eq!(answers.get(ApplicationField::NativeCountry), Some("Canada"));
        assert_eq!(answers.get(ApplicationField::LoanGrade), Some("B"));
        assert_eq!(answers.get(ApplicationField::PriorDefault), Some("N"));
    }

    #[test]
    fn joint_answer_is_split_positionally() {
        let answers = FieldExtractor::new()
            .extract(&application("Private, Sales, 40"))
            .unwrap();
        assert_eq!(answers.get(ApplicationField::Workclass), Some("Private"));
        assert_eq!(answers.get(ApplicationField::Occupation), Some("Sales"));
        assert_eq!(answers.get(ApplicationField::HoursPerWeek), Some("40"));
    }

    #[test]
    fn not_applicable_fills_all_joint_fields() {
        for joint in ["N/A", "  n/a  "] {
            let answers = FieldExtractor::new().extract(&application(joint)).unwrap();
            for field in ApplicationField::JOINT {
                assert_eq!(answers.get(field), Some("N/A"), "{field} for {joint:?}");
            }
            // Cursor advanced by exactly one line
            assert_eq!(answers.get(ApplicationField::MaritalStatus), Some("No"));
        }
    }

    #[test]
    fn not_applicable_with_odd_label_spacing() {
        let text = application("x").replace("Answer: x", "  aNsWeR :   N/A   ");
        let answers = FieldExtractor::new().extract(&text).unwrap();
        assert_eq!(answers.get(ApplicationField::HoursPerWeek), Some("N/A"));
    }

    #[test]
    fn joint_answer_with_wrong_arity_is_malformed() {
        let extractor = FieldExtractor::new();
        for joint in ["Private, Sales", "Private, Sales, 40, extra", "Private", "Private, , 40"] {
            let err = extractor.extract(&application(joint)).unwrap_err();
            assert!(
                matches!(err, ExtractionError::JointAnswerSplit { expected: 3, .. }),
                "{joint:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn too_few_answers_is_malformed() {
        let text = "Race: Black\nSex: Male\nAnswer: Yes\nAnswer: N/A\nAnswer: Yes\n";
        let err = FieldExtractor::new().extract(text).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::NotEnoughAnswers {
                expected: 8,
                found: 3
            }
        );
    }

    #[test]
    fn missing_labels_are_malformed() {
        let extractor = FieldExtractor::new();
        let no_race = application("N/A").replace("Race: White", "");
        assert_eq!(
            extractor.extract(&no_race).unwrap_err(),
            ExtractionError::MissingLabel { label: "Race:" }
        );

        let blank_sex = application("N/A").replace("Sex:   Female", "Sex:");
        assert_eq!(
            extractor.extract(&blank_sex).unwrap_err(),
            ExtractionError::MissingLabel { label: "Sex:" }
        );
    }

    #[test]
    fn extra_answer_lines_are_ignored() {
        let text = format!("{}Answer: something else\n", application("N/A"));
        let answers = FieldExtractor::new().extract(&text).unwrap();
        assert_eq!(answers.get(ApplicationField::PriorDefault), Some("N"));
        assert_eq!(answers.len(), 12);
    }

    #[test]
    fn windows_line_endings_are_tolerated() {
        let text = application("Private, Sales, 40").replace('\n', "\r\n");
        let answers = FieldExtractor::new().extract(&text).unwrap();
        assert_eq!(answers.get(ApplicationField::Sex), Some("Female"));
        assert_eq!(answers.get(ApplicationField::HoursPerWeek), Some("40"));
    }

    #[test]
    fn extraction_is_idempotent() {
        let extractor = FieldExtractor::new();
        let text = application("Self-emp-inc, Exec-managerial, 55");
        assert_eq!(extractor.extract(&text), extractor.extract(&text));
    }
}
