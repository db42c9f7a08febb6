use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

/// Explores the results of client surveys exported as spreadsheets.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (directory path, default 'data') The folder containing one spreadsheet per client and,
    /// optionally, the file client_industry_mapping.xlsx.
    #[clap(short, long, value_parser, default_value = "data", global = true)]
    pub data_dir: String,

    /// (file path, optional) The JSON file with the survey rules (question lists, valid answers,
    /// proficiency levels). The embedded rules are used if not provided.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<String>,

    /// (raw-data-v1, raw-data-v2, scoring-sheet or empty) Forces the layout of all the
    /// spreadsheets instead of detecting it from their sheets.
    #[clap(long, value_parser, global = true)]
    pub layout: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Loads the data folder and prints what was read.
    Load,
    /// Prints the classification of the columns and the type of each question.
    Questions,
    /// Counts the answers of one question.
    Analyze(AnalyzeArgs),
    /// Prints the most frequent values of every demographic column.
    Demographics(DemographicsArgs),
    /// Writes a CSV export.
    Export(ExportArgs),
}

/// Restrictions on the respondents. Repeating an option accepts several values.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Only keep the respondents of this client.
    #[clap(long, value_parser)]
    pub client: Vec<String>,

    /// Only keep the respondents of clients in this industry.
    #[clap(long, value_parser)]
    pub industry: Vec<String>,

    /// Only keep the respondents with this proficiency level.
    #[clap(long, value_parser)]
    pub proficiency: Vec<String>,

    /// (COLUMN=VALUE) Only keep the respondents with this value in the column.
    #[clap(long, value_parser)]
    pub filter: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AnalyzeArgs {
    /// The exact name of the question column.
    #[clap(short, long, value_parser)]
    pub question: String,

    #[clap(flatten)]
    pub filters: FilterArgs,

    /// (file path, 'stdout' or empty) Where to write the analysis in JSON format.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the counts (or the free responses) are also written
    /// in CSV format to the given location.
    #[clap(long, value_parser)]
    pub csv: Option<String>,

    /// (file path) A reference file containing an analysis in JSON format. If provided, survex
    /// will check that the analysis matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DemographicsArgs {
    #[clap(flatten)]
    pub filters: FilterArgs,

    /// Number of values shown per column.
    #[clap(long, value_parser, default_value_t = 10)]
    pub top: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// All the columns of the table.
    Full,
    /// The columns given with --column.
    Columns,
    /// The answers of the free-response question given with --question.
    Responses,
    /// The number of respondents per client and proficiency level.
    Summary,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ExportArgs {
    #[clap(value_enum)]
    pub kind: ExportKind,

    /// (file path or 'stdout') The destination of the CSV export.
    #[clap(short, long, value_parser)]
    pub out: String,

    /// A column to export. Can be repeated.
    #[clap(long, value_parser)]
    pub column: Vec<String>,

    /// The question whose answers are exported.
    #[clap(short, long, value_parser)]
    pub question: Option<String>,

    #[clap(flatten)]
    pub filters: FilterArgs,
}
