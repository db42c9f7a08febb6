use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_analysis::aggregate::*;
use survey_analysis::classify::*;
use survey_analysis::*;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{AnalyzeArgs, Args, Command, ExportArgs, ExportKind, FilterArgs};
use crate::survey::config_reader::*;
use crate::survey::io_common::{client_name, discover_survey_files, simplify_file_name};
use crate::survey::io_csv::*;
use crate::survey::io_excel::{read_survey_file, SourceLayout};
use crate::survey::io_mapping::load_mapping;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod io_mapping;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("Data directory not found: {path}"))]
    DataDirMissing { path: String },
    #[snafu(display("No survey files (.xlsx or .xls) found in {path}"))]
    NoSurveyFiles { path: String },
    #[snafu(display("No data could be loaded from {path}"))]
    NoData { path: String },
    #[snafu(display("Error listing directory {path}: {source}"))]
    ListingDir {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("Error reading sheet {sheet}: {source}"))]
    ReadingSheet {
        source: calamine::Error,
        sheet: String,
    },
    #[snafu(display("Missing sheet: expected {expected}"))]
    MissingSheet { expected: String },
    #[snafu(display("No header found on row {row}"))]
    MissingHeader { row: usize },
    #[snafu(display("Cannot derive a client name from {file_name}"))]
    ClientName { file_name: String },

    #[snafu(display("Mapping file {path} has no sheet"))]
    EmptyMapping { path: String },
    #[snafu(display("Mapping file {path} has no {column} column"))]
    MappingMissingColumn { path: String, column: String },

    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },

    #[snafu(display("Error writing {path}: {source}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV: {source}"))]
    CsvWrite { source: csv::Error },
    #[snafu(display("Error flushing CSV: {source}"))]
    CsvFlush { source: std::io::Error },

    #[snafu(display("{source}"))]
    Analysis { source: AnalysisError },
    #[snafu(display("Invalid filter {filter:?}: expected COLUMN=VALUE"))]
    InvalidFilter { filter: String },
    #[snafu(display("Question {question:?} is not a free-response question"))]
    NotFreeResponse { question: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SResult<T> = Result<T, SurveyError>;

// The spreadsheet readers return boxed errors: calamine errors are large.
pub type BSResult<T> = Result<T, Box<SurveyError>>;

/// The outcome of reading a data folder.
#[derive(PartialEq, Debug, Clone)]
pub struct Ingestion {
    pub table: SurveyTable,
    /// File name -> number of rows read.
    pub loaded_files: BTreeMap<String, usize>,
    /// One message per file that could not be read.
    pub errors: Vec<String>,
}

/// Reads one client file into a single-client table.
pub fn read_client_file(path: &Path, layout: Option<SourceLayout>) -> BSResult<SurveyTable> {
    let file_name = simplify_file_name(path);
    let client = client_name(&file_name).context(ClientNameSnafu {
        file_name: file_name.clone(),
    })?;
    let data = read_survey_file(path, layout)?;
    Ok(SurveyTable::from_rows(&client, &data.header, data.rows))
}

/// Reads all the survey files of a folder and stitches them into one table.
///
/// A file that cannot be read is reported in the errors and skipped. It is an error if the
/// folder does not exist, contains no survey file, or if no file could be read at all.
pub fn ingest_directory(dir: &Path, layout: Option<SourceLayout>) -> SResult<Ingestion> {
    let path = dir.display().to_string();
    ensure!(dir.is_dir(), DataDirMissingSnafu { path: path.clone() });
    let files = discover_survey_files(dir)?;
    ensure!(!files.is_empty(), NoSurveyFilesSnafu { path: path.clone() });

    let mut parts: Vec<SurveyTable> = Vec::new();
    let mut loaded_files: BTreeMap<String, usize> = BTreeMap::new();
    let mut errors: Vec<String> = Vec::new();
    for file in files.iter() {
        let file_name = simplify_file_name(file);
        match read_client_file(file, layout) {
            Ok(part) => {
                info!("ingest_directory: {}: {} rows", file_name, part.len());
                loaded_files.insert(file_name, part.len());
                parts.push(part);
            }
            Err(e) => {
                let msg = format!("Error loading {}: {}", file_name, e);
                warn!("{}", msg);
                errors.push(msg);
            }
        }
    }
    ensure!(!parts.is_empty(), NoDataSnafu { path });

    let table = SurveyTable::concat(parts);
    info!(
        "ingest_directory: {} files, {} rows, {} columns",
        loaded_files.len(),
        table.len(),
        table.columns().len()
    );
    Ok(Ingestion {
        table,
        loaded_files,
        errors,
    })
}

/// What happened to the client-to-industry mapping during a load.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum MappingStatus {
    Loaded { clients: usize },
    NotFound,
    Malformed { message: String },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LoadReport {
    pub loaded_files: BTreeMap<String, usize>,
    pub errors: Vec<String>,
    pub mapping: MappingStatus,
    pub unmapped_clients: Vec<String>,
}

/// The loaded data and everything needed to reload it.
#[derive(PartialEq, Debug, Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub layout: Option<SourceLayout>,
    pub rules: SurveyRules,
    pub table: SurveyTable,
    pub report: LoadReport,
}

impl AppState {
    pub fn load(
        data_dir: &Path,
        layout: Option<SourceLayout>,
        rules: SurveyRules,
    ) -> SResult<AppState> {
        let ingestion = ingest_directory(data_dir, layout)?;
        let mut table = ingestion.table;

        let (mapping, status): (Option<HashMap<String, String>>, MappingStatus) =
            match load_mapping(data_dir) {
                Ok(Some(m)) => {
                    let clients = m.len();
                    (Some(m), MappingStatus::Loaded { clients })
                }
                Ok(None) => {
                    warn!("load: no industry mapping in {}", data_dir.display());
                    (None, MappingStatus::NotFound)
                }
                Err(e) => {
                    warn!("load: industry mapping ignored: {}", e);
                    (
                        None,
                        MappingStatus::Malformed {
                            message: e.to_string(),
                        },
                    )
                }
            };
        let unmapped_clients = table.attach_industries(mapping.as_ref());
        table.attach_proficiencies(&rules.proficiency_levels);

        Ok(AppState {
            data_dir: data_dir.to_path_buf(),
            layout,
            rules,
            table,
            report: LoadReport {
                loaded_files: ingestion.loaded_files,
                errors: ingestion.errors,
                mapping: status,
                unmapped_clients,
            },
        })
    }

    /// Reads the data folder again. The current state is kept if the new load fails.
    pub fn reload(&mut self) -> SResult<()> {
        let fresh = AppState::load(&self.data_dir, self.layout, self.rules.clone())?;
        info!("reload: {} -> {} rows", self.table.len(), fresh.table.len());
        *self = fresh;
        Ok(())
    }

    pub fn classification(&self) -> ColumnClassification {
        classify_columns(&self.table, &self.rules)
    }
}

/// Turns the filter options of the command line into a row filter.
///
/// The `--filter` options are `COLUMN=VALUE` pairs; several values for the same column are
/// alternatives.
pub fn build_filter(args: &FilterArgs, table: &SurveyTable) -> SResult<RowFilter> {
    let mut demographics: Vec<(String, Vec<String>)> = Vec::new();
    for f in args.filter.iter() {
        let (column, value) = f
            .split_once('=')
            .context(InvalidFilterSnafu { filter: f.clone() })?;
        let column = column.trim();
        if !table.has_column(column) {
            return Err(AnalysisError::UnknownColumn(column.to_string())).context(AnalysisSnafu);
        }
        let value = value.trim().to_string();
        match demographics.iter_mut().find(|(c, _)| c == column) {
            Some((_, values)) => values.push(value),
            None => demographics.push((column.to_string(), vec![value])),
        }
    }
    let filter = RowFilter {
        clients: args.client.clone(),
        industries: args.industry.clone(),
        proficiencies: args.proficiency.clone(),
        demographics,
    };
    debug!("build_filter: {:?}", filter);
    Ok(filter)
}

// ********* JSON reports *********

fn mapping_to_json(status: &MappingStatus) -> JSValue {
    match status {
        MappingStatus::Loaded { clients } => json!({"status": "loaded", "clients": clients}),
        MappingStatus::NotFound => json!({"status": "not found"}),
        MappingStatus::Malformed { message } => {
            json!({"status": "malformed", "message": message})
        }
    }
}

pub fn load_report_to_json(state: &AppState) -> JSValue {
    let mut files: JSMap<String, JSValue> = JSMap::new();
    for (name, rows) in state.report.loaded_files.iter() {
        files.insert(name.clone(), json!(rows));
    }
    json!({
        "dataDir": state.data_dir.display().to_string(),
        "files": files,
        "totalRows": state.table.len(),
        "columns": state.table.column_names().len(),
        "clients": state.table.clients(),
        "errors": state.report.errors,
        "mapping": mapping_to_json(&state.report.mapping),
        "unmappedClients": state.report.unmapped_clients,
    })
}

pub fn classification_to_json(state: &AppState) -> JSValue {
    let c = state.classification();
    let typed = |questions: &[String]| -> Vec<JSValue> {
        questions
            .iter()
            .map(|q| {
                let values: Vec<String> = state
                    .table
                    .records()
                    .iter()
                    .filter_map(|r| state.table.value(r, q))
                    .map(|v| v.into_owned())
                    .collect();
                let t = detect_question_type(q, values.iter().map(|v| v.as_str()), &state.rules);
                json!({"question": q, "type": t.label()})
            })
            .collect()
    };
    json!({
        "demographic": c.demographic,
        "scoredQuestions": typed(&c.scored),
        "orgReadinessQuestions": typed(&c.org_readiness),
        "unlistedQuestions": typed(&c.unlisted),
        "excluded": c.excluded,
    })
}

fn counts_to_json(counts: &[OptionCount]) -> Vec<JSValue> {
    counts
        .iter()
        .map(|c| json!({"option": c.option, "count": c.count, "percentage": c.percentage}))
        .collect()
}

pub fn analysis_to_json(analysis: &QuestionAnalysis) -> JSValue {
    let mut js = json!({
        "question": analysis.question,
        "type": analysis.question_type.label(),
        "matchedRows": analysis.matched_rows,
        "totalRows": analysis.total_rows,
        "dropped": analysis.dropped,
    });
    match &analysis.summary {
        QuestionSummary::Counts { responses, options } => {
            js["responses"] = json!(responses);
            js["counts"] = json!(counts_to_json(options));
        }
        QuestionSummary::FreeResponse { responses } => {
            js["responses"] = json!(responses.len());
            js["freeResponses"] = json!(responses);
        }
    }
    js
}

pub fn demographics_to_json(breakdowns: &[DemographicBreakdown], top: usize) -> JSValue {
    let l: Vec<JSValue> = breakdowns
        .iter()
        .map(|b| {
            let shown: Vec<OptionCount> = b.counts.iter().take(top).cloned().collect();
            json!({
                "column": b.column,
                "uniqueValues": b.unique_values,
                "responses": b.responses,
                "top": counts_to_json(&shown),
            })
        })
        .collect();
    json!(l)
}

// ********* Commands *********

/// Writes a report to a file, or to the standard output for `stdout` or no path.
fn write_output(out: Option<&str>, content: &str) -> SResult<()> {
    match out {
        None | Some("stdout") => {
            println!("{}", content);
        }
        Some(path) => {
            fs::write(path, content).context(WritingOutputSnafu { path })?;
            info!("write_output: written to {}", path);
        }
    }
    Ok(())
}

fn read_reference(path: &str) -> SResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu)?;
    Ok(js)
}

/// Compares a report with a reference JSON file and prints the differences.
pub fn check_reference(report: &JSValue, reference_path: &str) -> SResult<()> {
    let reference = read_reference(reference_path)?;
    let pretty_report = serde_json::to_string_pretty(report).context(ParsingJsonSnafu)?;
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu)?;
    if pretty_reference != pretty_report {
        warn!("Found differences with the reference {}", reference_path);
        print_diff(pretty_reference.as_str(), pretty_report.as_str(), "\n");
        whatever!(
            "Difference detected between the analysis and the reference {}",
            reference_path
        )
    }
    Ok(())
}

fn pretty(js: &JSValue) -> SResult<String> {
    serde_json::to_string_pretty(js).context(ParsingJsonSnafu)
}

fn run_analyze(state: &AppState, args: &AnalyzeArgs) -> SResult<()> {
    let filter = build_filter(&args.filters, &state.table)?;
    let analysis = analyze_question(&state.table, &args.question, &filter, &state.rules)
        .context(AnalysisSnafu)?;
    let js = analysis_to_json(&analysis);
    write_output(args.out.as_deref(), &pretty(&js)?)?;
    if let Some(path) = args.csv.as_deref() {
        let w = open_output(path)?;
        write_analysis(w, &analysis)?;
    }
    if let Some(reference) = args.reference.as_deref() {
        check_reference(&js, reference)?;
    }
    Ok(())
}

fn run_demographics(state: &AppState, filters: &FilterArgs, top: usize) -> SResult<()> {
    let filter = build_filter(filters, &state.table)?;
    let mut breakdowns: Vec<DemographicBreakdown> = Vec::new();
    for column in state.classification().demographic.iter() {
        let b = demographic_breakdown(&state.table, column, &filter).context(AnalysisSnafu)?;
        breakdowns.push(b);
    }
    write_output(None, &pretty(&demographics_to_json(&breakdowns, top))?)
}

fn run_export(state: &AppState, args: &ExportArgs) -> SResult<()> {
    let filter = build_filter(&args.filters, &state.table)?;
    match args.kind {
        ExportKind::Full => {
            let records = filter.apply(&state.table);
            let w = open_output(&args.out)?;
            write_table(w, &state.table, &records, &state.table.column_names())?;
        }
        ExportKind::Columns => {
            if args.column.is_empty() {
                whatever!("Exporting columns requires at least one --column")
            }
            for c in args.column.iter() {
                if !state.table.has_column(c) {
                    return Err(AnalysisError::UnknownColumn(c.clone())).context(AnalysisSnafu);
                }
            }
            let records = filter.apply(&state.table);
            let w = open_output(&args.out)?;
            write_table(w, &state.table, &records, &args.column)?;
        }
        ExportKind::Responses => {
            let question = match args.question.as_deref() {
                Some(q) => q,
                None => whatever!("Exporting responses requires --question"),
            };
            let analysis = analyze_question(&state.table, question, &filter, &state.rules)
                .context(AnalysisSnafu)?;
            match &analysis.summary {
                QuestionSummary::FreeResponse { responses } => {
                    let w = open_output(&args.out)?;
                    write_responses(w, question, responses)?;
                }
                QuestionSummary::Counts { .. } => {
                    return NotFreeResponseSnafu { question }.fail();
                }
            }
        }
        ExportKind::Summary => {
            // Every client is summarized, the filters do not apply.
            let summaries = client_summaries(&state.table, &state.rules.proficiency_levels);
            let w = open_output(&args.out)?;
            write_client_summaries(w, &summaries, &state.rules.proficiency_levels)?;
        }
    }
    info!("run_export: {:?} written to {}", args.kind, args.out);
    Ok(())
}

pub fn run(args: &Args) -> SResult<()> {
    let config = read_config(args.config.as_deref())?;
    let rules = validate_config(&config)?;
    info!(
        "run: configuration {} ({} scored, {} org-readiness questions)",
        config.config_version,
        rules.scored_questions.len(),
        rules.org_readiness_questions.len()
    );
    let layout = match args.layout.as_deref() {
        Some(name) => Some(SourceLayout::from_name(name)?),
        None => None,
    };
    let state = AppState::load(Path::new(&args.data_dir), layout, rules)?;

    match &args.command {
        Command::Load => write_output(None, &pretty(&load_report_to_json(&state))?),
        Command::Questions => write_output(None, &pretty(&classification_to_json(&state))?),
        Command::Analyze(a) => run_analyze(&state, a),
        Command::Demographics(d) => run_demographics(&state, &d.filters, d.top),
        Command::Export(e) => run_export(&state, e),
    }
}
