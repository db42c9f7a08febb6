//! Column classification and question type detection.
//!
//! Everything here is a pure function of the column names, a sample of the values and the
//! survey rules: nothing is cached between calls.

use log::debug;

use std::collections::HashSet;

use crate::config::*;
use crate::table::SurveyTable;

const MULTI_SELECT_MARKER: &str = "select all that apply";

/// The partition of the columns of a table.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ColumnClassification {
    pub demographic: Vec<String>,
    pub scored: Vec<String>,
    pub org_readiness: Vec<String>,
    /// Questions outside of both whitelists. Only populated in permissive mode.
    pub unlisted: Vec<String>,
    /// Columns that are neither demographic nor questions.
    pub excluded: Vec<String>,
}

impl ColumnClassification {
    /// The question columns: scored, then org-readiness, then unlisted.
    pub fn questions(&self) -> Vec<String> {
        self.scored
            .iter()
            .chain(self.org_readiness.iter())
            .chain(self.unlisted.iter())
            .cloned()
            .collect()
    }

    pub fn is_question(&self, column: &str) -> bool {
        self.scored
            .iter()
            .chain(self.org_readiness.iter())
            .chain(self.unlisted.iter())
            .any(|c| c == column)
    }
}

/// The columns whose name contains one of the demographic keywords, in column order.
pub fn demographic_columns(columns: &[String], keywords: &[String]) -> Vec<String> {
    let keywords: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    columns
        .iter()
        .filter(|c| {
            let lower = c.to_lowercase();
            keywords.iter().any(|k| lower.contains(k.as_str()))
        })
        .cloned()
        .collect()
}

/// Classifies all the columns of the table, system columns included.
pub fn classify_columns(table: &SurveyTable, rules: &SurveyRules) -> ColumnClassification {
    classify_column_names(&table.column_names(), rules)
}

pub fn classify_column_names(columns: &[String], rules: &SurveyRules) -> ColumnClassification {
    let demographic = demographic_columns(columns, &rules.demographic_keywords);
    let demographic_set: HashSet<&String> = demographic.iter().collect();
    let scored_set: HashSet<&str> = rules.scored_questions.iter().map(|s| s.trim()).collect();
    let org_set: HashSet<&str> = rules
        .org_readiness_questions
        .iter()
        .map(|s| s.trim())
        .collect();

    let mut res = ColumnClassification {
        demographic: demographic.clone(),
        ..Default::default()
    };
    for c in columns {
        let name = c.trim();
        let is_system = rules.excluded_columns.iter().any(|e| e == c)
            || SYSTEM_COLUMNS.contains(&c.as_str());
        if scored_set.contains(name) && !is_system {
            res.scored.push(c.clone());
        } else if org_set.contains(name) && !is_system {
            res.org_readiness.push(c.clone());
        } else if rules.question_set == QuestionSetMode::Permissive
            && !is_system
            && !demographic_set.contains(c)
            && !c.starts_with("Unnamed")
        {
            res.unlisted.push(c.clone());
        } else if !demographic_set.contains(c) {
            res.excluded.push(c.clone());
        }
    }
    debug!(
        "classify_column_names: {} demographic, {} scored, {} org-readiness, {} unlisted, {} excluded",
        res.demographic.len(),
        res.scored.len(),
        res.org_readiness.len(),
        res.unlisted.len(),
        res.excluded.len()
    );
    res
}

/// The type of a question, from its text and the whitelists alone.
pub fn infer_question_type(question: &str, rules: &SurveyRules) -> QuestionType {
    let lower = question.to_lowercase();
    let multi = lower.contains(MULTI_SELECT_MARKER);
    if rules.valid_answers_for(question).is_some() {
        return if multi {
            QuestionType::MultiSelect
        } else {
            QuestionType::SingleSelect
        };
    }
    match rules.question_set {
        QuestionSetMode::Whitelist => QuestionType::FreeResponse,
        QuestionSetMode::Permissive => {
            if multi {
                QuestionType::MultiSelect
            } else if lower.contains("[free response]")
                || lower.contains("describe")
                || lower.contains("write")
            {
                QuestionType::FreeResponse
            } else {
                QuestionType::SingleSelect
            }
        }
    }
}

/// True if one of the first values contains a comma or a semicolon.
pub fn sample_has_delimiters<'a, I>(values: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .filter(|v| !v.trim().is_empty())
        .take(TYPE_SAMPLE_SIZE)
        .any(|v| v.contains(',') || v.contains(';'))
}

/// The type of a question as displayed: the inferred type, unless the sample of the answers
/// contains delimiters, in which case the question is always treated as multi-select.
pub fn detect_question_type<'a, I>(question: &str, values: I, rules: &SurveyRules) -> QuestionType
where
    I: IntoIterator<Item = &'a str>,
{
    let inferred = infer_question_type(question, rules);
    if sample_has_delimiters(values) {
        if inferred != QuestionType::MultiSelect {
            debug!(
                "detect_question_type: {:?}: delimiters found in sample, {} -> multi-select",
                question, inferred
            );
        }
        QuestionType::MultiSelect
    } else {
        inferred
    }
}
