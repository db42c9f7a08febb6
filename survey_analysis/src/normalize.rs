use log::debug;

use crate::config::SurveyRules;

/// The answers of a question that survived the validity filter.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilteredResponses {
    /// The kept answers, with their original spelling.
    pub kept: Vec<String>,
    /// Number of answers rejected by the whitelist (missing answers included).
    pub dropped: usize,
}

/// Splits a multi-part answer on commas and semicolons into trimmed, non-empty parts.
pub fn split_options(value: &str) -> Vec<&str> {
    value
        .split(|c| c == ',' || c == ';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_missing(value: &Option<String>) -> bool {
    match value {
        Some(s) => s.trim().is_empty(),
        None => true,
    }
}

/// Drops the answers that are not part of the whitelist.
///
/// An answer is valid if all of its parts are in the whitelist, compared trimmed and
/// without regard to case. Missing and empty answers are never valid. Without a whitelist,
/// only the missing answers are removed and nothing is counted as dropped.
pub fn filter_valid(values: Vec<Option<String>>, allowed: Option<&[String]>) -> FilteredResponses {
    let mut res = FilteredResponses::default();
    let allowed_lower: Option<Vec<String>> =
        allowed.map(|a| a.iter().map(|s| s.trim().to_lowercase()).collect());
    for v in values {
        let is_valid = match (&allowed_lower, &v) {
            (_, v) if is_missing(v) => false,
            (None, _) => true,
            (Some(allowed), Some(s)) => {
                let parts = split_options(s);
                !parts.is_empty()
                    && parts
                        .iter()
                        .all(|p| allowed.contains(&p.to_lowercase()))
            }
            (Some(_), None) => false,
        };
        match v {
            Some(s) if is_valid => res.kept.push(s),
            _ if allowed_lower.is_some() => res.dropped += 1,
            _ => {}
        }
    }
    res
}

// Only these exact spellings are rewritten; `TRUE` or ` yes ` are left to the whitelist.
fn yes_no(value: &str) -> Option<&'static str> {
    match value {
        "True" | "true" | "Yes" | "yes" => Some("Yes"),
        "False" | "false" | "No" | "no" => Some("No"),
        _ => None,
    }
}

/// The spelling under which an answer option is counted: the whitelist entry it matches
/// (trimmed, without regard to case), or the trimmed option when nothing matches.
pub fn canonical_option(option: &str, allowed: Option<&[String]>) -> String {
    let option = option.trim();
    let lower = option.to_lowercase();
    allowed
        .and_then(|a| a.iter().find(|x| x.trim().to_lowercase() == lower))
        .map(|x| x.trim().to_string())
        .unwrap_or_else(|| option.to_string())
}

/// Rewrites True/False answers as Yes/No for the registered yes/no questions.
///
/// The answers of the other questions are returned unchanged.
pub fn normalize_yes_no(
    question: &str,
    values: Vec<Option<String>>,
    rules: &SurveyRules,
) -> Vec<Option<String>> {
    if !rules.is_yes_no_question(question) {
        return values;
    }
    values
        .into_iter()
        .map(|v| v.map(|s| yes_no(&s).map(|x| x.to_string()).unwrap_or(s)))
        .collect()
}

/// The full normalization of the answers of a question: yes/no rewriting, then the
/// whitelist filter.
pub fn normalize_responses(
    question: &str,
    values: Vec<Option<String>>,
    rules: &SurveyRules,
) -> FilteredResponses {
    let normalized = normalize_yes_no(question, values, rules);
    let res = filter_valid(normalized, rules.valid_answers_for(question));
    debug!(
        "normalize_responses: {:?}: kept {}, dropped {}",
        question,
        res.kept.len(),
        res.dropped
    );
    res
}
