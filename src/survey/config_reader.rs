use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use survey_analysis::{QuestionSetMode, SurveyRules};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;

use crate::survey::*;

/// The rules used when no configuration file is given.
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default_survey_config.json");

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "configVersion")]
    pub config_version: String,
    #[serde(rename = "questionSet")]
    pub question_set: String,
    #[serde(rename = "scoredQuestions")]
    pub scored_questions: Vec<String>,
    #[serde(rename = "orgReadinessQuestions")]
    pub org_readiness_questions: Vec<String>,
    #[serde(rename = "validAnswers")]
    pub valid_answers: BTreeMap<String, Vec<String>>,
    #[serde(rename = "yesNoQuestions")]
    pub yes_no_questions: Vec<String>,
    #[serde(rename = "proficiencyLevels")]
    pub proficiency_levels: Vec<String>,
    #[serde(rename = "demographicKeywords")]
    pub demographic_keywords: Option<Vec<String>>,
    #[serde(rename = "excludedColumns")]
    pub excluded_columns: Option<Vec<String>>,
}

pub fn parse_config(contents: &str) -> SResult<SurveyConfig> {
    let config: SurveyConfig = serde_json::from_str(contents).context(ParsingJsonSnafu)?;
    Ok(config)
}

/// Reads the configuration at the given path, or the embedded default one.
pub fn read_config(path: Option<&str>) -> SResult<SurveyConfig> {
    match path {
        Some(p) => {
            let contents = fs::read_to_string(p).context(OpeningJsonSnafu { path: p })?;
            debug!("read_config: {}: {} bytes", p, contents.len());
            parse_config(&contents)
        }
        None => {
            debug!("read_config: using the embedded configuration");
            parse_config(DEFAULT_CONFIG)
        }
    }
}

fn validate_question_set(mode: &str) -> SResult<QuestionSetMode> {
    match mode {
        "whitelist" => Ok(QuestionSetMode::Whitelist),
        "permissive" => Ok(QuestionSetMode::Permissive),
        x => whatever!(
            "Unknown questionSet {:?}: expected whitelist or permissive",
            x
        ),
    }
}

fn trimmed(l: &[String]) -> Vec<String> {
    l.iter().map(|s| s.trim().to_string()).collect()
}

/// Checks the configuration and turns it into the rules used by the analysis.
pub fn validate_config(config: &SurveyConfig) -> SResult<SurveyRules> {
    if config.config_version.trim().is_empty() {
        whatever!("Missing configVersion");
    }
    let question_set = validate_question_set(config.question_set.as_str())?;

    let mut valid_answers: HashMap<String, Vec<String>> = HashMap::new();
    for (question, answers) in config.valid_answers.iter() {
        if let Some(bad) = answers.iter().find(|a| a.contains(',') || a.contains(';')) {
            whatever!(
                "The valid answer {:?} of {:?} contains a delimiter (',' or ';')",
                bad,
                question
            )
        }
        if answers.iter().any(|a| a.trim().is_empty()) {
            whatever!("The valid answers of {:?} contain an empty answer", question)
        }
        valid_answers.insert(question.trim().to_string(), answers.clone());
    }

    let proficiency_levels = trimmed(&config.proficiency_levels);
    let mut seen: HashSet<String> = HashSet::new();
    for l in proficiency_levels.iter() {
        if !seen.insert(l.to_lowercase()) {
            whatever!("Duplicate proficiency level {:?}", l)
        }
    }

    let rules = SurveyRules {
        question_set,
        scored_questions: trimmed(&config.scored_questions),
        org_readiness_questions: trimmed(&config.org_readiness_questions),
        valid_answers,
        yes_no_questions: trimmed(&config.yes_no_questions).into_iter().collect(),
        proficiency_levels,
        demographic_keywords: config
            .demographic_keywords
            .clone()
            .unwrap_or_else(SurveyRules::default_demographic_keywords),
        excluded_columns: config
            .excluded_columns
            .clone()
            .unwrap_or_else(SurveyRules::default_excluded_columns),
    };
    debug!("validate_config: {:?}", rules);
    Ok(rules)
}
