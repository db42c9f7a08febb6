// ********* Input data structures ***********

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::Display;

/// Column holding the client identifier, derived from the source file name.
pub const CLIENT_COLUMN: &str = "Client";
/// Numeric coercion of `Participant Identifier`.
pub const PARTICIPANT_ID_COLUMN: &str = "Participant ID";
/// The raw participant identifier, as exported by the survey tool.
pub const PARTICIPANT_IDENTIFIER_COLUMN: &str = "Participant Identifier";
pub const INDUSTRY_COLUMN: &str = "Industry";
pub const PROFICIENCY_COLUMN: &str = "Proficiency";
/// Source of the proficiency label.
pub const RATING_COLUMN: &str = "Rating";

/// Placeholder for industries and proficiencies that could not be resolved.
pub const UNKNOWN: &str = "Unknown";

/// Columns that are always attached by the pipeline, in export order.
pub const SYSTEM_COLUMNS: [&str; 4] = [
    CLIENT_COLUMN,
    PARTICIPANT_ID_COLUMN,
    INDUSTRY_COLUMN,
    PROFICIENCY_COLUMN,
];

/// Number of values inspected by the delimiter sniffing of the question type detection.
pub const TYPE_SAMPLE_SIZE: usize = 20;

/// How the survey questions are enumerated.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum QuestionSetMode {
    /// Only the columns listed in the scored or org-readiness lists are questions.
    Whitelist,
    /// Every column that is not demographic or excluded is a question.
    Permissive,
}

/// The shape of the answers of a question.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum QuestionType {
    SingleSelect,
    MultiSelect,
    FreeResponse,
}

impl QuestionType {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::SingleSelect => "single-select",
            QuestionType::MultiSelect => "multi-select",
            QuestionType::FreeResponse => "free-response",
        }
    }
}

impl Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ********* Configuration **********

/// The static configuration that drives classification and validation.
///
/// It does not depend on the loaded data and stays constant for the life of the process.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveyRules {
    pub question_set: QuestionSetMode,
    pub scored_questions: Vec<String>,
    pub org_readiness_questions: Vec<String>,
    /// Question text (trimmed) -> the accepted answers.
    pub valid_answers: HashMap<String, Vec<String>>,
    /// Questions whose True/False answers are rewritten as Yes/No.
    pub yes_no_questions: HashSet<String>,
    /// The known proficiency labels, in display order.
    pub proficiency_levels: Vec<String>,
    pub demographic_keywords: Vec<String>,
    /// Columns that are never questions.
    pub excluded_columns: Vec<String>,
}

impl SurveyRules {
    pub fn default_demographic_keywords() -> Vec<String> {
        [
            "department",
            "function",
            "office",
            "level",
            "country",
            "region",
            "agency",
            "network",
            "tenure",
            "role",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn default_excluded_columns() -> Vec<String> {
        [
            CLIENT_COLUMN,
            PARTICIPANT_ID_COLUMN,
            PARTICIPANT_IDENTIFIER_COLUMN,
            "Email Address:",
            "Email Address",
            RATING_COLUMN,
            INDUSTRY_COLUMN,
            PROFICIENCY_COLUMN,
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    /// Rules with no whitelist at all, in permissive mode.
    pub fn permissive() -> SurveyRules {
        SurveyRules {
            question_set: QuestionSetMode::Permissive,
            scored_questions: Vec::new(),
            org_readiness_questions: Vec::new(),
            valid_answers: HashMap::new(),
            yes_no_questions: HashSet::new(),
            proficiency_levels: Vec::new(),
            demographic_keywords: SurveyRules::default_demographic_keywords(),
            excluded_columns: SurveyRules::default_excluded_columns(),
        }
    }

    /// The accepted answers for a question, if the question has a whitelist.
    pub fn valid_answers_for(&self, question: &str) -> Option<&[String]> {
        self.valid_answers
            .get(question.trim())
            .map(|answers| answers.as_slice())
    }

    pub fn is_yes_no_question(&self, question: &str) -> bool {
        self.yes_no_questions.contains(question.trim())
    }
}

// ******** Errors *********

/// Errors that prevent an analysis request from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AnalysisError {
    /// The requested column is not part of the table.
    UnknownColumn(String),
    /// The requested column exists but is not a question for the current rules.
    NotAQuestion(String),
}

impl Error for AnalysisError {}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::UnknownColumn(c) => write!(f, "unknown column {:?}", c),
            AnalysisError::NotAQuestion(c) => {
                write!(f, "column {:?} is not a survey question", c)
            }
        }
    }
}
