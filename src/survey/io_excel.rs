use calamine::{open_workbook_auto, DataType, Range, Reader};
use chrono::{Duration, NaiveDate};
use log::debug;
use snafu::prelude::*;
use survey_analysis::{format_number, PARTICIPANT_IDENTIFIER_COLUMN, RATING_COLUMN};

use std::path::Path;

use crate::survey::{io_common::disambiguate_headers, *};

pub const RAW_DATA_SHEET: &str = "Raw Data";
pub const SCORING_SHEET: &str = "Scoring Sheet";

// A first row containing one of these is a header row, not a banner.
const HEADER_MARKERS: [&str; 4] = [
    PARTICIPANT_IDENTIFIER_COLUMN,
    "Email Address",
    "Email Address:",
    RATING_COLUMN,
];

/// The known shapes of the survey exports.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SourceLayout {
    /// `Raw Data` sheet, header on the first row.
    RawDataV1,
    /// `Raw Data` sheet, a banner row then the header.
    RawDataV2,
    /// `Scoring Sheet` sheet, header on the sixth row.
    ScoringSheet,
}

impl SourceLayout {
    pub fn from_name(name: &str) -> SResult<SourceLayout> {
        match name {
            "raw-data-v1" => Ok(SourceLayout::RawDataV1),
            "raw-data-v2" => Ok(SourceLayout::RawDataV2),
            "scoring-sheet" => Ok(SourceLayout::ScoringSheet),
            x => whatever!(
                "Unknown layout {:?}: expected raw-data-v1, raw-data-v2 or scoring-sheet",
                x
            ),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SourceLayout::RawDataV1 => "raw-data-v1",
            SourceLayout::RawDataV2 => "raw-data-v2",
            SourceLayout::ScoringSheet => "scoring-sheet",
        }
    }

    pub fn sheet_name(&self) -> &'static str {
        match self {
            SourceLayout::RawDataV1 | SourceLayout::RawDataV2 => RAW_DATA_SHEET,
            SourceLayout::ScoringSheet => SCORING_SHEET,
        }
    }

    /// Index (from 0) of the header row in the sheet.
    pub fn header_row(&self) -> usize {
        match self {
            SourceLayout::RawDataV1 => 0,
            SourceLayout::RawDataV2 => 1,
            SourceLayout::ScoringSheet => 5,
        }
    }

    /// Index (from 0) of the first row of answers in the sheet.
    pub fn data_start_row(&self) -> usize {
        self.header_row() + 1
    }
}

/// The header and the answers read from the survey sheet of a file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SheetData {
    pub layout: SourceLayout,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

fn find_sheet(sheet_names: &[String], wanted: &str) -> Option<String> {
    sheet_names
        .iter()
        .find(|n| n.trim().eq_ignore_ascii_case(wanted))
        .cloned()
}

/// Picks the sheet to read. Without a forced layout, `Raw Data` wins over `Scoring Sheet`, and
/// the Raw Data layout still has to be settled with [`raw_data_layout`].
pub fn select_sheet(
    sheet_names: &[String],
    forced: Option<SourceLayout>,
) -> Option<(String, SourceLayout)> {
    if let Some(layout) = forced {
        return find_sheet(sheet_names, layout.sheet_name()).map(|s| (s, layout));
    }
    if let Some(s) = find_sheet(sheet_names, RAW_DATA_SHEET) {
        return Some((s, SourceLayout::RawDataV2));
    }
    find_sheet(sheet_names, SCORING_SHEET).map(|s| (s, SourceLayout::ScoringSheet))
}

/// A Raw Data sheet is in the first layout when its first row already holds column names.
pub fn raw_data_layout(range: &Range<DataType>) -> SourceLayout {
    let starts_at_top = matches!(range.start(), Some((0, _)));
    let first_row_is_header = starts_at_top
        && range
            .rows()
            .next()
            .map(|row| {
                row.iter().filter_map(cell_text).any(|s| {
                    HEADER_MARKERS
                        .iter()
                        .any(|m| m.eq_ignore_ascii_case(s.trim()))
                })
            })
            .unwrap_or(false);
    if first_row_is_header {
        SourceLayout::RawDataV1
    } else {
        SourceLayout::RawDataV2
    }
}

// Serial of 9999-12-31, the last day Excel can represent.
const MAX_EXCEL_SERIAL: f64 = 2_958_466.0;

/// An Excel date serial (days since 1899-12-30, fraction for the time of day) as
/// `YYYY-MM-DD HH:MM:SS`, rounded to the second.
pub fn datetime_text(serial: f64) -> Option<String> {
    if !(0.0..MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    let dt = epoch.checked_add_signed(Duration::seconds(seconds))?;
    Some(dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// The text of a cell, None when the cell is empty.
pub fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::Empty => None,
        DataType::String(s) if s.trim().is_empty() => None,
        DataType::String(s) => Some(s.clone()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(format_number(*f)),
        DataType::DateTime(f) => Some(datetime_text(*f).unwrap_or_else(|| format_number(*f))),
        DataType::Bool(true) => Some("True".to_string()),
        DataType::Bool(false) => Some("False".to_string()),
        DataType::Error(e) => {
            debug!("cell_text: error cell {:?} read as missing", e);
            None
        }
    }
}

fn header_names(row: &[DataType]) -> Vec<String> {
    let names = row
        .iter()
        .enumerate()
        .map(|(idx, cell)| cell_text(cell).unwrap_or_else(|| format!("Unnamed: {}", idx)))
        .collect();
    disambiguate_headers(names)
}

/// Reads the header and the answers of a sheet, at the offsets of the layout.
///
/// Rows without any value are skipped.
pub fn parse_range(range: &Range<DataType>, layout: SourceLayout) -> BSResult<SheetData> {
    let missing_header = MissingHeaderSnafu {
        row: layout.header_row() + 1,
    };
    let (start_row, _) = range.start().context(missing_header)?;
    let start_row = start_row as usize;

    let mut header: Option<Vec<String>> = None;
    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, row) in range.rows().enumerate() {
        let row_idx = start_row + idx;
        if row_idx == layout.header_row() {
            if row.iter().any(|c| cell_text(c).is_some()) {
                header = Some(header_names(row));
            }
        } else if row_idx >= layout.data_start_row() {
            let values: Vec<Option<String>> = row.iter().map(cell_text).collect();
            if values.iter().all(|v| v.is_none()) {
                debug!("parse_range: skipping empty row {}", row_idx + 1);
                continue;
            }
            rows.push(values);
        }
    }
    let header = header.context(missing_header)?;
    debug!("parse_range: layout {}: header: {:?}", layout.name(), header);
    Ok(SheetData {
        layout,
        header,
        rows,
    })
}

/// Reads the survey sheet of a workbook (xlsx or xls).
pub fn read_survey_file(path: &Path, forced: Option<SourceLayout>) -> BSResult<SheetData> {
    let path_s = path.display().to_string();
    let mut workbook =
        open_workbook_auto(path).context(OpeningExcelSnafu { path: path_s.clone() })?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_owned();
    debug!("read_survey_file: {}: sheets {:?}", path_s, sheet_names);

    let expected = match forced {
        Some(layout) => format!("'{}'", layout.sheet_name()),
        None => format!("'{}' or '{}'", RAW_DATA_SHEET, SCORING_SHEET),
    };
    let (sheet, layout) =
        select_sheet(&sheet_names, forced).context(MissingSheetSnafu { expected })?;
    let range = workbook
        .worksheet_range(&sheet)
        .context(MissingSheetSnafu {
            expected: sheet.clone(),
        })?
        .context(ReadingSheetSnafu {
            sheet: sheet.clone(),
        })?;

    let layout = match (forced, layout) {
        (None, SourceLayout::RawDataV2) => raw_data_layout(&range),
        (_, l) => l,
    };
    debug!(
        "read_survey_file: {}: sheet {:?} read as {}",
        path_s,
        sheet,
        layout.name()
    );
    parse_range(&range, layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Range<DataType> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range: Range<DataType> = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                if !v.is_empty() {
                    range.set_value((r as u32, c as u32), DataType::String(v.to_string()));
                }
            }
        }
        range
    }

    fn s(x: &str) -> Option<String> {
        Some(x.to_string())
    }

    #[test]
    fn layout_names_round_trip() {
        for l in [
            SourceLayout::RawDataV1,
            SourceLayout::RawDataV2,
            SourceLayout::ScoringSheet,
        ] {
            assert_eq!(SourceLayout::from_name(l.name()).unwrap(), l);
        }
        assert!(SourceLayout::from_name("csv").is_err());
    }

    #[test]
    fn sheet_selection() {
        let names = |xs: &[&str]| -> Vec<String> { xs.iter().map(|x| x.to_string()).collect() };
        assert_eq!(
            select_sheet(&names(&["Summary", "raw data "]), None),
            Some(("raw data ".to_string(), SourceLayout::RawDataV2))
        );
        assert_eq!(
            select_sheet(&names(&["Scoring Sheet", "Raw Data"]), None),
            Some(("Raw Data".to_string(), SourceLayout::RawDataV2))
        );
        assert_eq!(
            select_sheet(&names(&["Scoring Sheet"]), None),
            Some(("Scoring Sheet".to_string(), SourceLayout::ScoringSheet))
        );
        assert_eq!(
            select_sheet(&names(&["Scoring Sheet", "Raw Data"]), Some(SourceLayout::ScoringSheet)),
            Some(("Scoring Sheet".to_string(), SourceLayout::ScoringSheet))
        );
        assert_eq!(select_sheet(&names(&["Sheet1"]), None), None);
    }

    #[test]
    fn raw_data_with_header_on_first_row() {
        let range = sheet(&[
            &["Participant Identifier", "Q1"],
            &["1", "Yes"],
            &["", ""],
            &["2", "No"],
        ]);
        assert_eq!(raw_data_layout(&range), SourceLayout::RawDataV1);
        let data = parse_range(&range, SourceLayout::RawDataV1).unwrap();
        assert_eq!(data.header, vec!["Participant Identifier", "Q1"]);
        assert_eq!(
            data.rows,
            vec![vec![s("1"), s("Yes")], vec![s("2"), s("No")]]
        );
    }

    #[test]
    fn raw_data_with_banner_row() {
        let range = sheet(&[
            &["AI Maturity Survey", ""],
            &["Participant Identifier", "Q1"],
            &["7", "Maybe"],
        ]);
        assert_eq!(raw_data_layout(&range), SourceLayout::RawDataV2);
        let data = parse_range(&range, SourceLayout::RawDataV2).unwrap();
        assert_eq!(data.header, vec!["Participant Identifier", "Q1"]);
        assert_eq!(data.rows, vec![vec![s("7"), s("Maybe")]]);
    }

    #[test]
    fn scoring_sheet_header_on_sixth_row() {
        let range = sheet(&[
            &["Scoring"],
            &[""],
            &[""],
            &[""],
            &["Generated 2024-05-01"],
            &["Participant Identifier", "Score", "Score", ""],
            &["3", "10", "12", "x"],
        ]);
        let data = parse_range(&range, SourceLayout::ScoringSheet).unwrap();
        assert_eq!(
            data.header,
            vec!["Participant Identifier", "Score", "Score.1", "Unnamed: 3"]
        );
        assert_eq!(data.rows, vec![vec![s("3"), s("10"), s("12"), s("x")]]);
    }

    #[test]
    fn missing_header_is_an_error() {
        let range = sheet(&[&["only a banner"]]);
        let err = parse_range(&range, SourceLayout::RawDataV2).unwrap_err();
        assert!(matches!(*err, SurveyError::MissingHeader { row: 2 }));
        let empty: Range<DataType> = Range::empty();
        assert!(parse_range(&empty, SourceLayout::RawDataV1).is_err());
    }

    #[test]
    fn date_cells_are_read_as_timestamps() {
        assert_eq!(
            cell_text(&DataType::DateTime(45413.416666666664)),
            s("2024-05-01 10:00:00")
        );
        assert_eq!(datetime_text(45413.0), s("2024-05-01 00:00:00"));
        assert_eq!(datetime_text(-1.0), None);
        assert_eq!(cell_text(&DataType::DateTime(-1.0)), s("-1"));
    }

    #[test]
    fn date_cells_of_a_workbook() {
        use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Acme.xlsx");
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(RAW_DATA_SHEET).unwrap();
        sheet.write_string(0, 0, "Participant Identifier").unwrap();
        sheet.write_string(0, 1, "Start Date").unwrap();
        sheet.write_string(1, 0, "1").unwrap();
        let start = ExcelDateTime::from_ymd(2024, 5, 1)
            .unwrap()
            .and_hms(10, 0, 0)
            .unwrap();
        let format = Format::new().set_num_format("yyyy-mm-dd hh:mm");
        sheet
            .write_datetime_with_format(1, 1, &start, &format)
            .unwrap();
        workbook.save(&path).unwrap();

        let data = read_survey_file(&path, None).unwrap();
        assert_eq!(data.layout, SourceLayout::RawDataV1);
        assert_eq!(data.rows, vec![vec![s("1"), s("2024-05-01 10:00:00")]]);
    }

    #[test]
    fn cells_are_read_as_text() {
        assert_eq!(cell_text(&DataType::Float(3.0)), s("3"));
        assert_eq!(cell_text(&DataType::Float(2.5)), s("2.5"));
        assert_eq!(cell_text(&DataType::Int(42)), s("42"));
        assert_eq!(cell_text(&DataType::Bool(true)), s("True"));
        assert_eq!(cell_text(&DataType::String("  ".to_string())), None);
        assert_eq!(cell_text(&DataType::Empty), None);
    }
}
