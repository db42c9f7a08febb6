use log::{debug, warn};

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::config::*;

/// The numeric coercion of the participant identifier.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ParticipantId {
    Numeric(f64),
    /// The source value was present but not a number.
    Unparsed,
}

impl ParticipantId {
    pub fn parse(raw: &str) -> ParticipantId {
        match raw.trim().parse::<f64>() {
            Ok(x) if x.is_finite() => ParticipantId::Numeric(x),
            _ => ParticipantId::Unparsed,
        }
    }

    /// The text used in exports. The unparsed marker has no textual form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ParticipantId::Numeric(x) => Some(format_number(*x)),
            ParticipantId::Unparsed => None,
        }
    }
}

/// Formats a number the way it reads in a spreadsheet: integral values lose their fraction.
pub fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{:.0}", x)
    } else {
        x.to_string()
    }
}

/// The answers of one respondent.
#[derive(PartialEq, Debug, Clone)]
pub struct ResponseRecord {
    pub client: String,
    pub participant_id: Option<ParticipantId>,
    pub industry: Option<String>,
    pub proficiency: Option<String>,
    // Aligned with the columns of the owning table.
    values: Vec<Option<String>>,
}

impl ResponseRecord {
    pub fn industry(&self) -> &str {
        self.industry.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn proficiency(&self) -> &str {
        self.proficiency.as_deref().unwrap_or(UNKNOWN)
    }
}

/// The unified table: all the respondents of all the loaded clients.
///
/// The data columns are the union of the columns of every source, in the order they were
/// first seen. The system columns (client, participant id, industry, proficiency) are typed
/// fields of the records and come after the data columns when the table is enumerated.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct SurveyTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    records: Vec<ResponseRecord>,
}

impl SurveyTable {
    /// Builds the table of a single client from a header and the rows below it.
    ///
    /// Rows shorter than the header are padded with missing values, longer rows are truncated.
    /// Data columns named like a system column are dropped.
    pub fn from_rows(
        client: &str,
        header: &[String],
        rows: Vec<Vec<Option<String>>>,
    ) -> SurveyTable {
        let kept: Vec<usize> = header
            .iter()
            .enumerate()
            .filter(|(_, name)| !SYSTEM_COLUMNS.contains(&name.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        if kept.len() < header.len() {
            warn!(
                "from_rows: client {}: dropping data columns shadowed by system columns",
                client
            );
        }
        let columns: Vec<String> = kept.iter().map(|idx| header[*idx].clone()).collect();
        let mut table = SurveyTable::with_columns(columns);
        let pid_idx = table.index.get(PARTICIPANT_IDENTIFIER_COLUMN).cloned();

        for row in rows {
            let values: Vec<Option<String>> = kept
                .iter()
                .map(|idx| row.get(*idx).cloned().flatten())
                .collect();
            let participant_id = pid_idx
                .and_then(|idx| values[idx].as_deref())
                .map(ParticipantId::parse);
            table.records.push(ResponseRecord {
                client: client.to_string(),
                participant_id,
                industry: None,
                proficiency: None,
                values,
            });
        }
        debug!(
            "from_rows: client {}: {} columns, {} records",
            client,
            table.columns.len(),
            table.records.len()
        );
        table
    }

    fn with_columns(columns: Vec<String>) -> SurveyTable {
        let index = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.clone(), idx))
            .collect();
        SurveyTable {
            columns,
            index,
            records: Vec::new(),
        }
    }

    /// Concatenates tables. The columns are the union of all the columns; values absent
    /// from a part are missing.
    pub fn concat(parts: Vec<SurveyTable>) -> SurveyTable {
        let mut columns: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for part in parts.iter() {
            for c in part.columns.iter() {
                if seen.insert(c.clone()) {
                    columns.push(c.clone());
                }
            }
        }
        let mut res = SurveyTable::with_columns(columns);
        for part in parts {
            let positions: Vec<usize> = part.columns.iter().map(|c| res.index[c]).collect();
            for rec in part.records {
                let mut values: Vec<Option<String>> = vec![None; res.columns.len()];
                for (pos, v) in positions.iter().zip(rec.values) {
                    values[*pos] = v;
                }
                res.records.push(ResponseRecord { values, ..rec });
            }
        }
        res
    }

    /// The data columns, in table order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All the column names: the data columns followed by the system columns.
    pub fn column_names(&self) -> Vec<String> {
        let mut res = self.columns.clone();
        res.extend(SYSTEM_COLUMNS.iter().map(|s| s.to_string()));
        res
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column) || SYSTEM_COLUMNS.contains(&column)
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The value of a column for a record, system columns included.
    ///
    /// Missing values and unknown columns are both returned as None.
    pub fn value<'a>(&self, record: &'a ResponseRecord, column: &str) -> Option<Cow<'a, str>> {
        match column {
            CLIENT_COLUMN => Some(Cow::Borrowed(record.client.as_str())),
            PARTICIPANT_ID_COLUMN => record
                .participant_id
                .and_then(|p| p.to_text())
                .map(Cow::Owned),
            INDUSTRY_COLUMN => Some(Cow::Borrowed(record.industry())),
            PROFICIENCY_COLUMN => Some(Cow::Borrowed(record.proficiency())),
            _ => self
                .index
                .get(column)
                .and_then(|idx| record.values.get(*idx))
                .and_then(|v| v.as_deref())
                .map(Cow::Borrowed),
        }
    }

    /// The values of a column for the given records, in order.
    pub fn column_values<'a>(
        &self,
        records: &[&'a ResponseRecord],
        column: &str,
    ) -> Result<Vec<Option<Cow<'a, str>>>, AnalysisError> {
        if !self.has_column(column) {
            return Err(AnalysisError::UnknownColumn(column.to_string()));
        }
        Ok(records.iter().map(|r| self.value(r, column)).collect())
    }

    /// The distinct clients, in order of first appearance.
    pub fn clients(&self) -> Vec<String> {
        let mut seen: HashSet<&str> = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.client.as_str()))
            .map(|r| r.client.clone())
            .collect()
    }

    /// Resolves the industry of every record from its client.
    ///
    /// Returns the clients that have no entry in the mapping, each listed once. When no
    /// mapping was loaded, every record is "Unknown" and nothing is reported.
    pub fn attach_industries(&mut self, mapping: Option<&HashMap<String, String>>) -> Vec<String> {
        let mut unmapped: Vec<String> = Vec::new();
        for rec in self.records.iter_mut() {
            let industry = match mapping {
                Some(m) => match m.get(&rec.client) {
                    Some(ind) => ind.clone(),
                    None => {
                        if !unmapped.contains(&rec.client) {
                            unmapped.push(rec.client.clone());
                        }
                        UNKNOWN.to_string()
                    }
                },
                None => UNKNOWN.to_string(),
            };
            rec.industry = Some(industry);
        }
        for client in unmapped.iter() {
            warn!("attach_industries: no industry registered for client {}", client);
        }
        unmapped
    }

    /// Resolves the proficiency of every record from the rating column.
    pub fn attach_proficiencies(&mut self, levels: &[String]) {
        let rating_idx = self.index.get(RATING_COLUMN).cloned();
        for rec in self.records.iter_mut() {
            let rating = rating_idx.and_then(|idx| rec.values[idx].as_deref());
            let level = rating.and_then(|r| {
                levels
                    .iter()
                    .find(|l| l.trim().eq_ignore_ascii_case(r.trim()))
            });
            rec.proficiency = Some(level.cloned().unwrap_or_else(|| UNKNOWN.to_string()));
        }
    }
}
