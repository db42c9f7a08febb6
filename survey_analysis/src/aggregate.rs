use log::{debug, info};

use std::collections::HashMap;

use crate::classify::{classify_columns, detect_question_type};
use crate::config::*;
use crate::normalize::{canonical_option, normalize_responses, split_options};
use crate::table::{ResponseRecord, SurveyTable};

/// The number of selections of one answer option.
#[derive(PartialEq, Debug, Clone)]
pub struct OptionCount {
    pub option: String,
    pub count: u64,
    /// Share of the responses, in percent, rounded to one decimal.
    pub percentage: f64,
}

/// The outcome of the analysis of one question.
#[derive(PartialEq, Debug, Clone)]
pub enum QuestionSummary {
    Counts {
        /// The denominator of the percentages: the number of responses (not options).
        responses: u64,
        options: Vec<OptionCount>,
    },
    FreeResponse {
        responses: Vec<String>,
    },
}

#[derive(PartialEq, Debug, Clone)]
pub struct QuestionAnalysis {
    pub question: String,
    pub question_type: QuestionType,
    /// Rows of the table matching the filters.
    pub matched_rows: usize,
    /// Rows of the whole table.
    pub total_rows: usize,
    /// Answers rejected by the whitelist.
    pub dropped: usize,
    pub summary: QuestionSummary,
}

/// Restrictions on the rows of the table. An empty selection does not restrict anything.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RowFilter {
    pub clients: Vec<String>,
    pub industries: Vec<String>,
    pub proficiencies: Vec<String>,
    /// Demographic column -> accepted values.
    pub demographics: Vec<(String, Vec<String>)>,
}

impl RowFilter {
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
            && self.industries.is_empty()
            && self.proficiencies.is_empty()
            && self.demographics.iter().all(|(_, vs)| vs.is_empty())
    }

    pub fn matches(&self, table: &SurveyTable, record: &ResponseRecord) -> bool {
        fn accepts(selection: &[String], value: &str) -> bool {
            selection.is_empty() || selection.iter().any(|s| s == value)
        }
        accepts(&self.clients, &record.client)
            && accepts(&self.industries, record.industry())
            && accepts(&self.proficiencies, record.proficiency())
            && self.demographics.iter().all(|(column, accepted)| {
                accepted.is_empty()
                    || table
                        .value(record, column)
                        .map(|v| accepted.iter().any(|a| *a == v))
                        .unwrap_or(false)
            })
    }

    /// The records of the table that pass all the filters, in table order.
    pub fn apply<'a>(&self, table: &'a SurveyTable) -> Vec<&'a ResponseRecord> {
        table
            .records()
            .iter()
            .filter(|r| self.matches(table, r))
            .collect()
    }
}

/// Rounds a percentage to one decimal.
pub fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn percentage(count: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(count as f64 / total as f64 * 100.0)
    }
}

// Counts in decreasing order, ties broken by first appearance.
fn count_items<'a, I>(items: I) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for item in items {
        let c = counts.entry(item.to_string()).or_insert(0);
        if *c == 0 {
            order.push(item.to_string());
        }
        *c += 1;
    }
    let mut res: Vec<(String, u64)> = order
        .into_iter()
        .map(|k| {
            let c = counts[&k];
            (k, c)
        })
        .collect();
    // Stable sort: the first appearance order is kept among equal counts.
    res.sort_by(|a, b| b.1.cmp(&a.1));
    res
}

fn with_percentages(counts: Vec<(String, u64)>, total: u64) -> Vec<OptionCount> {
    counts
        .into_iter()
        .map(|(option, count)| OptionCount {
            option,
            count,
            percentage: percentage(count, total),
        })
        .collect()
}

/// Counts of the distinct answers of a single-select question.
pub fn single_select_counts(values: &[String]) -> (u64, Vec<OptionCount>) {
    let total = values.len() as u64;
    let counts = count_items(values.iter().map(|s| s.as_str()));
    (total, with_percentages(counts, total))
}

/// Counts of the options of a multi-select question.
///
/// The percentages are relative to the number of non-empty responses, so they may add up to
/// more than 100.
pub fn multi_select_counts(values: &[String]) -> (u64, Vec<OptionCount>) {
    let split: Vec<Vec<&str>> = values
        .iter()
        .map(|v| split_options(v))
        .filter(|parts| !parts.is_empty())
        .collect();
    let total = split.len() as u64;
    let counts = count_items(split.iter().flatten().copied());
    (total, with_percentages(counts, total))
}

/// Analyzes a question over the rows selected by the filter.
///
/// The question type is detected on the filtered answers before the whitelist filter, then the
/// answers are normalized and tallied according to the type.
pub fn analyze_question(
    table: &SurveyTable,
    question: &str,
    filter: &RowFilter,
    rules: &SurveyRules,
) -> Result<QuestionAnalysis, AnalysisError> {
    if !table.has_column(question) {
        return Err(AnalysisError::UnknownColumn(question.to_string()));
    }
    if !classify_columns(table, rules).is_question(question) {
        return Err(AnalysisError::NotAQuestion(question.to_string()));
    }

    let records = filter.apply(table);
    let raw: Vec<Option<String>> = table
        .column_values(&records, question)?
        .into_iter()
        .map(|v| v.map(|c| c.into_owned()))
        .collect();
    let question_type = detect_question_type(
        question,
        raw.iter().filter_map(|v| v.as_deref()),
        rules,
    );
    let normalized = normalize_responses(question, raw, rules);
    let allowed = rules.valid_answers_for(question);

    // Counted answers use one spelling per option; free responses are kept as written.
    let summary = match question_type {
        QuestionType::SingleSelect => {
            let answers: Vec<String> = normalized
                .kept
                .iter()
                .map(|v| canonical_option(v, allowed))
                .collect();
            let (responses, options) = single_select_counts(&answers);
            QuestionSummary::Counts { responses, options }
        }
        QuestionType::MultiSelect => {
            let answers: Vec<String> = normalized
                .kept
                .iter()
                .map(|v| {
                    split_options(v)
                        .into_iter()
                        .map(|p| canonical_option(p, allowed))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .collect();
            let (responses, options) = multi_select_counts(&answers);
            QuestionSummary::Counts { responses, options }
        }
        QuestionType::FreeResponse => QuestionSummary::FreeResponse {
            responses: normalized.kept,
        },
    };
    info!(
        "analyze_question: {:?} ({}): {} of {} rows match the filters, {} answers dropped",
        question,
        question_type,
        records.len(),
        table.len(),
        normalized.dropped
    );
    Ok(QuestionAnalysis {
        question: question.to_string(),
        question_type,
        matched_rows: records.len(),
        total_rows: table.len(),
        dropped: normalized.dropped,
        summary,
    })
}

/// The distribution of the values of a demographic column.
#[derive(PartialEq, Debug, Clone)]
pub struct DemographicBreakdown {
    pub column: String,
    pub counts: Vec<OptionCount>,
    pub unique_values: usize,
    pub responses: u64,
}

pub fn demographic_breakdown(
    table: &SurveyTable,
    column: &str,
    filter: &RowFilter,
) -> Result<DemographicBreakdown, AnalysisError> {
    let records = filter.apply(table);
    let values = table.column_values(&records, column)?;
    let present: Vec<&str> = values
        .iter()
        .filter_map(|v| v.as_deref())
        .filter(|v| !v.trim().is_empty())
        .collect();
    let responses = present.len() as u64;
    let counts = count_items(present);
    debug!(
        "demographic_breakdown: {:?}: {} distinct values",
        column,
        counts.len()
    );
    Ok(DemographicBreakdown {
        column: column.to_string(),
        unique_values: counts.len(),
        counts: with_percentages(counts, responses),
        responses,
    })
}

/// Number of respondents of a client, in total and per proficiency level.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ClientSummary {
    pub client: String,
    pub total_responses: u64,
    /// One entry per configured level, in order, then "Unknown".
    pub proficiency_counts: Vec<(String, u64)>,
}

/// The proficiency labels of the client summary: the configured levels followed by "Unknown".
pub fn summary_levels(levels: &[String]) -> Vec<String> {
    let mut res: Vec<String> = levels.to_vec();
    if !res.iter().any(|l| l == UNKNOWN) {
        res.push(UNKNOWN.to_string());
    }
    res
}

/// The per-client summary, clients in order of first appearance.
pub fn client_summaries(table: &SurveyTable, levels: &[String]) -> Vec<ClientSummary> {
    let labels = summary_levels(levels);
    table
        .clients()
        .into_iter()
        .map(|client| {
            let records: Vec<&ResponseRecord> = table
                .records()
                .iter()
                .filter(|r| r.client == client)
                .collect();
            let proficiency_counts = labels
                .iter()
                .map(|l| {
                    let n = records.iter().filter(|r| r.proficiency() == l).count();
                    (l.clone(), n as u64)
                })
                .collect();
            ClientSummary {
                total_responses: records.len() as u64,
                client,
                proficiency_counts,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::SurveyTable;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|x| x.to_string()).collect()
    }

    fn s(x: &str) -> Option<String> {
        Some(x.to_string())
    }

    fn oc(option: &str, count: u64, percentage: f64) -> OptionCount {
        OptionCount {
            option: option.to_string(),
            count,
            percentage,
        }
    }

    const FREQ: &str = "How often do you use AI?";
    const TOOLS: &str = "Which tools do you use? (Select all that apply)";
    const IDEAS: &str = "Any ideas?";

    fn rules() -> SurveyRules {
        let mut valid_answers: HashMap<String, Vec<String>> = HashMap::new();
        valid_answers.insert(FREQ.to_string(), strings(&["Daily", "Weekly", "Never"]));
        valid_answers.insert(TOOLS.to_string(), strings(&["ChatGPT", "Copilot"]));
        SurveyRules {
            question_set: QuestionSetMode::Whitelist,
            scored_questions: strings(&[FREQ, TOOLS]),
            org_readiness_questions: strings(&[IDEAS]),
            valid_answers,
            proficiency_levels: strings(&["AI Expert", "AI Beginner"]),
            ..SurveyRules::permissive()
        }
    }

    fn table() -> SurveyTable {
        let header = strings(&["Department", "Rating", FREQ, TOOLS, IDEAS]);
        let acme = SurveyTable::from_rows(
            "acme",
            &header,
            vec![
                vec![s("HR"), s("AI Expert"), s("Daily"), s("ChatGPT, Copilot"), s("More")],
                vec![s("IT"), s("AI Beginner"), s("Weekly"), s("Copilot"), None],
                vec![s("IT"), None, s("Sometimes"), s("Bard"), s("Less")],
            ],
        );
        let globex = SurveyTable::from_rows(
            "globex",
            &header,
            vec![vec![s("HR"), s("AI Expert"), s("Daily"), None, None]],
        );
        let mut t = SurveyTable::concat(vec![acme, globex]);
        t.attach_industries(None);
        t.attach_proficiencies(&strings(&["AI Expert", "AI Beginner"]));
        t
    }

    #[test]
    fn multi_select_percentages_use_responses() {
        let (total, counts) = multi_select_counts(&strings(&["A, B", "B", ""]));
        assert_eq!(total, 2);
        assert_eq!(counts, vec![oc("B", 2, 100.0), oc("A", 1, 50.0)]);
    }

    #[test]
    fn single_select_counts_and_rounding() {
        let (total, counts) = single_select_counts(&strings(&["x", "y", "x"]));
        assert_eq!(total, 3);
        assert_eq!(counts, vec![oc("x", 2, 66.7), oc("y", 1, 33.3)]);
    }

    #[test]
    fn ties_keep_first_appearance() {
        let (_, counts) = single_select_counts(&strings(&["b", "a", "a", "b", "c"]));
        let order: Vec<&str> = counts.iter().map(|c| c.option.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn analysis_of_single_select_question() {
        init_logs();
        let res = analyze_question(&table(), FREQ, &RowFilter::default(), &rules()).unwrap();
        assert_eq!(res.question_type, QuestionType::SingleSelect);
        assert_eq!(res.matched_rows, 4);
        assert_eq!(res.dropped, 1);
        assert_eq!(
            res.summary,
            QuestionSummary::Counts {
                responses: 3,
                options: vec![oc("Daily", 2, 66.7), oc("Weekly", 1, 33.3)],
            }
        );
    }

    #[test]
    fn answer_spellings_are_counted_together() {
        init_logs();
        let header = strings(&[FREQ, TOOLS]);
        let mut t = SurveyTable::from_rows(
            "acme",
            &header,
            vec![
                vec![s(" daily "), s("chatgpt; Copilot")],
                vec![s("Daily"), s("ChatGPT , COPILOT")],
                vec![s("WEEKLY"), s("copilot")],
            ],
        );
        t.attach_industries(None);
        t.attach_proficiencies(&strings(&["AI Expert", "AI Beginner"]));
        let freq = analyze_question(&t, FREQ, &RowFilter::default(), &rules()).unwrap();
        assert_eq!(freq.question_type, QuestionType::SingleSelect);
        assert_eq!(
            freq.summary,
            QuestionSummary::Counts {
                responses: 3,
                options: vec![oc("Daily", 2, 66.7), oc("Weekly", 1, 33.3)],
            }
        );
        let tools = analyze_question(&t, TOOLS, &RowFilter::default(), &rules()).unwrap();
        assert_eq!(tools.question_type, QuestionType::MultiSelect);
        assert_eq!(
            tools.summary,
            QuestionSummary::Counts {
                responses: 3,
                options: vec![oc("Copilot", 3, 100.0), oc("ChatGPT", 2, 66.7)],
            }
        );
    }

    #[test]
    fn analysis_with_filters() {
        init_logs();
        let filter = RowFilter {
            clients: strings(&["acme"]),
            demographics: vec![("Department".to_string(), strings(&["IT", "HR"]))],
            proficiencies: strings(&["AI Beginner", "AI Expert"]),
            ..Default::default()
        };
        let res = analyze_question(&table(), TOOLS, &filter, &rules()).unwrap();
        assert_eq!(res.question_type, QuestionType::MultiSelect);
        assert_eq!(res.matched_rows, 2);
        assert_eq!(
            res.summary,
            QuestionSummary::Counts {
                responses: 2,
                options: vec![oc("Copilot", 2, 100.0), oc("ChatGPT", 1, 50.0)],
            }
        );
    }

    #[test]
    fn filters_commute() {
        let a = RowFilter {
            clients: strings(&["acme"]),
            industries: strings(&[UNKNOWN]),
            ..Default::default()
        };
        let t = table();
        let by_client = RowFilter {
            clients: strings(&["acme"]),
            ..Default::default()
        };
        let by_industry = RowFilter {
            industries: strings(&[UNKNOWN]),
            ..Default::default()
        };
        let both: Vec<&ResponseRecord> = by_client
            .apply(&t)
            .into_iter()
            .filter(|r| by_industry.matches(&t, r))
            .collect();
        assert_eq!(a.apply(&t), both);
    }

    #[test]
    fn analysis_of_free_response_question() {
        let res = analyze_question(&table(), IDEAS, &RowFilter::default(), &rules()).unwrap();
        assert_eq!(res.question_type, QuestionType::FreeResponse);
        assert_eq!(
            res.summary,
            QuestionSummary::FreeResponse {
                responses: strings(&["More", "Less"])
            }
        );
        assert_eq!(res.dropped, 0);
    }

    #[test]
    fn unknown_and_non_question_columns_are_rejected() {
        let t = table();
        let r = rules();
        assert_eq!(
            analyze_question(&t, "Nope", &RowFilter::default(), &r),
            Err(AnalysisError::UnknownColumn("Nope".to_string()))
        );
        assert_eq!(
            analyze_question(&t, "Department", &RowFilter::default(), &r),
            Err(AnalysisError::NotAQuestion("Department".to_string()))
        );
    }

    #[test]
    fn demographic_breakdown_counts_values() {
        let b = demographic_breakdown(&table(), "Department", &RowFilter::default()).unwrap();
        assert_eq!(b.responses, 4);
        assert_eq!(b.unique_values, 2);
        assert_eq!(b.counts, vec![oc("HR", 2, 50.0), oc("IT", 2, 50.0)]);
    }

    #[test]
    fn client_summary_counts_proficiencies() {
        let levels = strings(&["AI Expert", "AI Beginner"]);
        let summaries = client_summaries(&table(), &levels);
        assert_eq!(
            summaries[0],
            ClientSummary {
                client: "acme".to_string(),
                total_responses: 3,
                proficiency_counts: vec![
                    ("AI Expert".to_string(), 1),
                    ("AI Beginner".to_string(), 1),
                    (UNKNOWN.to_string(), 1),
                ],
            }
        );
        assert_eq!(summaries[1].total_responses, 1);
    }
}
