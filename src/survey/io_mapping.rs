// Reader for the client-to-industry lookup table.

use calamine::{open_workbook_auto, DataType, Range, Reader};
use log::{debug, info};
use snafu::prelude::*;
use survey_analysis::{CLIENT_COLUMN, INDUSTRY_COLUMN};

use std::collections::HashMap;
use std::path::Path;

use crate::survey::{io_common::MAPPING_FILE_NAME, io_excel::cell_text, *};

fn column_index(header: &[Option<String>], name: &str, path: &str) -> BSResult<usize> {
    let idx = header
        .iter()
        .position(|h| h.as_deref().map(|s| s.trim()) == Some(name))
        .context(MappingMissingColumnSnafu { path, column: name })?;
    Ok(idx)
}

/// Reads the mapping from the first sheet: header on the first row, with `Client` and
/// `Industry` columns. Later rows override earlier ones for the same client.
pub fn parse_mapping(range: &Range<DataType>, path: &str) -> BSResult<HashMap<String, String>> {
    let mut rows = range.rows();
    let header: Vec<Option<String>> = match rows.next() {
        Some(row) => row.iter().map(cell_text).collect(),
        None => Vec::new(),
    };
    let client_idx = column_index(&header, CLIENT_COLUMN, path)?;
    let industry_idx = column_index(&header, INDUSTRY_COLUMN, path)?;

    let mut res: HashMap<String, String> = HashMap::new();
    for row in rows {
        let client = match row.get(client_idx).and_then(cell_text) {
            Some(c) if !c.trim().is_empty() => c.trim().to_string(),
            _ => continue,
        };
        let industry = row
            .get(industry_idx)
            .and_then(cell_text)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| survey_analysis::UNKNOWN.to_string());
        debug!("parse_mapping: {} -> {}", client, industry);
        res.insert(client, industry);
    }
    Ok(res)
}

/// Loads the mapping file of the data folder. Returns None when there is no such file.
pub fn load_mapping(dir: &Path) -> BSResult<Option<HashMap<String, String>>> {
    let p = dir.join(MAPPING_FILE_NAME);
    if !p.is_file() {
        return Ok(None);
    }
    let path = p.display().to_string();
    let mut workbook = open_workbook_auto(&p).context(OpeningExcelSnafu { path: path.clone() })?;
    let range = workbook
        .worksheet_range_at(0)
        .context(EmptyMappingSnafu { path: path.clone() })?
        .context(ReadingSheetSnafu {
            sheet: format!("{}[0]", MAPPING_FILE_NAME),
        })?;
    let mapping = parse_mapping(&range, &path)?;
    info!("load_mapping: {} clients mapped", mapping.len());
    Ok(Some(mapping))
}
