// CSV exports.

use log::debug;
use snafu::prelude::*;
use survey_analysis::aggregate::{summary_levels, ClientSummary, QuestionAnalysis, QuestionSummary};
use survey_analysis::{ResponseRecord, SurveyTable};

use std::fs::File;
use std::io::{self, Write};

use crate::survey::*;

/// Opens the destination of an export: a file, or the standard output for `stdout`.
pub fn open_output(path: &str) -> SResult<Box<dyn Write>> {
    if path == "stdout" {
        return Ok(Box::new(io::stdout()));
    }
    let f = File::create(path).context(WritingOutputSnafu { path })?;
    Ok(Box::new(f))
}

fn finish<W: Write>(mut wtr: csv::Writer<W>) -> SResult<()> {
    wtr.flush().context(CsvFlushSnafu)?;
    Ok(())
}

/// Writes the given columns of the records, with a header row. Missing values are empty
/// fields.
pub fn write_table<W: Write>(
    w: W,
    table: &SurveyTable,
    records: &[&ResponseRecord],
    columns: &[String],
) -> SResult<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record(columns).context(CsvWriteSnafu)?;
    for r in records.iter() {
        let row: Vec<String> = columns
            .iter()
            .map(|c| {
                table
                    .value(r, c)
                    .map(|v| v.into_owned())
                    .unwrap_or_default()
            })
            .collect();
        wtr.write_record(&row).context(CsvWriteSnafu)?;
    }
    debug!(
        "write_table: {} rows, {} columns",
        records.len(),
        columns.len()
    );
    finish(wtr)
}

/// Writes the answers of a free-response question, one per row.
pub fn write_responses<W: Write>(w: W, question: &str, responses: &[String]) -> SResult<()> {
    let mut wtr = csv::Writer::from_writer(w);
    wtr.write_record([question]).context(CsvWriteSnafu)?;
    for r in responses.iter() {
        wtr.write_record([r]).context(CsvWriteSnafu)?;
    }
    finish(wtr)
}

/// Writes the table of an analysis: the counts, or the answers of a free-response question.
pub fn write_analysis<W: Write>(w: W, analysis: &QuestionAnalysis) -> SResult<()> {
    match &analysis.summary {
        QuestionSummary::Counts { options, .. } => {
            let mut wtr = csv::Writer::from_writer(w);
            wtr.write_record(["Option", "Count", "Percentage"])
                .context(CsvWriteSnafu)?;
            for o in options.iter() {
                wtr.write_record([
                    o.option.clone(),
                    o.count.to_string(),
                    format!("{:.1}", o.percentage),
                ])
                .context(CsvWriteSnafu)?;
            }
            finish(wtr)
        }
        QuestionSummary::FreeResponse { responses } => {
            write_responses(w, &analysis.question, responses)
        }
    }
}

/// Writes the per-client summary: one row per client, one column per proficiency level.
pub fn write_client_summaries<W: Write>(
    w: W,
    summaries: &[ClientSummary],
    levels: &[String],
) -> SResult<()> {
    let mut wtr = csv::Writer::from_writer(w);
    let mut header: Vec<String> = vec!["Client".to_string(), "Total Responses".to_string()];
    header.extend(summary_levels(levels));
    wtr.write_record(&header).context(CsvWriteSnafu)?;
    for s in summaries.iter() {
        let mut row: Vec<String> = vec![s.client.clone(), s.total_responses.to_string()];
        row.extend(s.proficiency_counts.iter().map(|(_, n)| n.to_string()));
        wtr.write_record(&row).context(CsvWriteSnafu)?;
    }
    finish(wtr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_analysis::aggregate::{analyze_question, client_summaries, RowFilter};
    use survey_analysis::{SurveyRules, CLIENT_COLUMN, PARTICIPANT_ID_COLUMN};

    fn s(x: &str) -> Option<String> {
        Some(x.to_string())
    }

    fn table() -> SurveyTable {
        let header: Vec<String> = ["Participant Identifier", "Comment", "Rating"]
            .iter()
            .map(|x| x.to_string())
            .collect();
        let a = SurveyTable::from_rows(
            "Acme",
            &header,
            vec![
                vec![s("1"), s("Great, really"), s("High")],
                vec![s("abc"), None, s("Low")],
            ],
        );
        let b = SurveyTable::from_rows(
            "Globex",
            &header[..2],
            vec![vec![s("3.0"), s("Fine")]],
        );
        let mut t = SurveyTable::concat(vec![a, b]);
        t.attach_industries(None);
        t.attach_proficiencies(&["High".to_string(), "Low".to_string()]);
        t
    }

    #[test]
    fn full_table_round_trip() {
        let t = table();
        let records: Vec<&ResponseRecord> = t.records().iter().collect();
        let mut buf: Vec<u8> = Vec::new();
        write_table(&mut buf, &t, &records, &t.column_names()).unwrap();

        let mut rdr = csv::Reader::from_reader(buf.as_slice());
        let headers: Vec<String> = rdr.headers().unwrap().iter().map(|h| h.to_string()).collect();
        assert_eq!(headers, t.column_names());
        let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), t.len());

        let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
        assert_eq!(&rows[0][col("Comment")], "Great, really");
        assert_eq!(&rows[1][col("Comment")], "");
        assert_eq!(&rows[1][col(PARTICIPANT_ID_COLUMN)], "");
        assert_eq!(&rows[2][col(PARTICIPANT_ID_COLUMN)], "3");
        assert_eq!(&rows[2][col(CLIENT_COLUMN)], "Globex");
        assert_eq!(&rows[2][col("Rating")], "");
    }

    #[test]
    fn counts_are_written_with_one_decimal() {
        let t = table();
        let analysis =
            analyze_question(&t, "Rating", &RowFilter::default(), &SurveyRules::permissive());
        // Rating is an excluded column.
        assert!(analysis.is_err());

        let analysis =
            analyze_question(&t, "Comment", &RowFilter::default(), &SurveyRules::permissive())
                .unwrap();
        let mut buf: Vec<u8> = Vec::new();
        write_analysis(&mut buf, &analysis).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Option,Count,Percentage\nGreat,1,50.0\nreally,1,50.0\nFine,1,50.0\n"
        );
    }

    #[test]
    fn client_summary_has_one_column_per_level() {
        let t = table();
        let levels = vec!["High".to_string(), "Low".to_string()];
        let mut buf: Vec<u8> = Vec::new();
        write_client_summaries(&mut buf, &client_summaries(&t, &levels), &levels).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Client,Total Responses,High,Low,Unknown\nAcme,2,1,1,0\nGlobex,1,0,0,1\n"
        );
    }

    #[test]
    fn free_responses_are_quoted_as_needed() {
        let mut buf: Vec<u8> = Vec::new();
        write_responses(
            &mut buf,
            "Anything else?",
            &["Yes, a lot".to_string(), "no".to_string()],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Anything else?\n\"Yes, a lot\"\nno\n");
    }
}
