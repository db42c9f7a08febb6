use log::debug;
use snafu::prelude::*;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::survey::*;

/// The client-to-industry lookup table, never read as survey data.
pub const MAPPING_FILE_NAME: &str = "client_industry_mapping.xlsx";

const SURVEY_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

pub fn simplify_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn survey_extension(file_name: &str) -> Option<&str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    SURVEY_EXTENSIONS
        .iter()
        .find(|e| e.eq_ignore_ascii_case(ext))
        .map(|_| ext)
}

/// A spreadsheet that holds survey answers: right extension, not the mapping file and not an
/// Office lock file.
pub fn is_survey_file(file_name: &str) -> bool {
    survey_extension(file_name).is_some()
        && !file_name.eq_ignore_ascii_case(MAPPING_FILE_NAME)
        && !file_name.starts_with("~$")
}

/// The client of a file: the file name without extension, up to the first double underscore.
///
/// `Acme__May 2024.xlsx` belongs to the client `Acme`.
pub fn client_name(file_name: &str) -> Option<String> {
    let stem = match survey_extension(file_name) {
        Some(ext) => &file_name[..file_name.len() - ext.len() - 1],
        None => file_name,
    };
    let client = stem.split("__").next().unwrap_or(stem).trim();
    if client.is_empty() {
        None
    } else {
        Some(client.to_string())
    }
}

/// All the survey files of a folder, sorted by name.
pub fn discover_survey_files(dir: &Path) -> SResult<Vec<PathBuf>> {
    let path = dir.display().to_string();
    let mut res: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).context(ListingDirSnafu { path: path.clone() })? {
        let entry = entry.context(ListingDirSnafu { path: path.clone() })?;
        let p = entry.path();
        if p.is_file() && is_survey_file(&simplify_file_name(&p)) {
            res.push(p);
        }
    }
    res.sort();
    debug!("discover_survey_files: {}: {:?}", path, res);
    Ok(res)
}

/// Makes the column names unique, from left to right: the second `Q` becomes `Q.1`, the third
/// `Q.2`, and a name already taken by a renaming gets a further suffix (`Q.1.1`).
pub fn disambiguate_headers(names: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut res: Vec<String> = Vec::new();
    for name in names {
        let mut col = name.clone();
        let mut cur = counts.get(&col).copied().unwrap_or(0);
        while cur > 0 {
            counts.insert(col.clone(), cur + 1);
            col = format!("{}.{}", col, cur);
            cur = counts.get(&col).copied().unwrap_or(0);
        }
        counts.insert(col.clone(), cur + 1);
        if col != name {
            debug!("disambiguate_headers: {:?} -> {:?}", name, col);
        }
        res.push(col);
    }
    res
}
