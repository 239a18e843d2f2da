use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, info};

use crate::models::polars_err;

/// Columns shared by every allele group in the predictor output.
pub const COMMON_COLS: [&str; 4] = ["Pos", "Peptide", "ID", "Target"];

/// Number of predictor columns per allele; the last one is the rank.
const ALLELE_GROUP_WIDTH: usize = 4;

/// One allele's column group, resolved once at parse time. `raw` holds the
/// header names as written in the file, `unique` the suffixed names used
/// inside the frame, so output renaming strips exactly the suffixes this
/// parser added and nothing else.
#[derive(Debug, Clone)]
pub struct AlleleColumns {
    pub allele: String,
    pub raw: Vec<String>,
    pub unique: Vec<String>,
}

impl AlleleColumns {
    pub fn rank_col(&self) -> &str {
        // group layout puts the rank last
        self.unique.last().map(String::as_str).unwrap_or_default()
    }
}

/// Predictor output reduced to a shared shape: a data frame, the columns
/// every allele shares, and one resolved column group per allele. Both the
/// wide and the long predictor formats load into this.
#[derive(Debug)]
pub struct BindingTable {
    pub df: DataFrame,
    pub common: Vec<String>,
    pub alleles: Vec<AlleleColumns>,
}

/// The tab-separated wide table produced by the binding predictor: line 1
/// holds allele names aligned to 4-column groups, line 2 per-column headers,
/// data rows follow.
pub struct BindingTableFile {
    pub path: String,
}

/// Disambiguate repeated header names by positional suffixing: the first
/// occurrence keeps its name, later ones get `_1`, `_2`, ...
fn uniquify_headers(headers: &[String]) -> Vec<String> {
    let mut seen: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    headers
        .iter()
        .map(|h| {
            let count = seen.entry(h.as_str()).or_insert(0);
            let name = if *count == 0 {
                h.clone()
            } else {
                format!("{h}_{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

impl BindingTableFile {
    pub fn load(&self) -> PolarsResult<BindingTable> {
        info!("Reading binding prediction table from {}", self.path);
        let file = File::open(&self.path)
            .map_err(|e| polars_err(format!("{}: {e}", self.path).into()))?;
        let mut reader = BufReader::new(file);

        let mut allele_line = String::new();
        let mut header_line = String::new();
        reader.read_line(&mut allele_line)?;
        reader.read_line(&mut header_line)?;
        if header_line.is_empty() {
            return Err(PolarsError::ComputeError(
                format!("{}: expected two header rows", self.path).into(),
            ));
        }

        let allele_names: Vec<&str> = allele_line.trim_end().split('\t').collect();
        let raw_headers: Vec<String> = header_line
            .trim_end()
            .split('\t')
            .map(|s| s.to_string())
            .collect();
        let unique_headers = uniquify_headers(&raw_headers);

        for required in COMMON_COLS {
            if !unique_headers.iter().any(|h| h == required) {
                return Err(PolarsError::ComputeError(
                    format!("{}: missing common column `{}`", self.path, required).into(),
                ));
            }
        }

        let mut alleles = Vec::new();
        let mut group_start = COMMON_COLS.len();
        for name in allele_names.iter().filter(|n| !n.is_empty()) {
            let group_end = group_start + ALLELE_GROUP_WIDTH;
            if group_end > unique_headers.len() {
                return Err(PolarsError::ComputeError(
                    format!(
                        "{}: allele `{}` expects columns {}..{} but the header row has {}",
                        self.path,
                        name,
                        group_start,
                        group_end,
                        unique_headers.len()
                    )
                    .into(),
                ));
            }
            alleles.push(AlleleColumns {
                allele: name.to_string(),
                raw: raw_headers[group_start..group_end].to_vec(),
                unique: unique_headers[group_start..group_end].to_vec(),
            });
            group_start = group_end;
        }
        if alleles.is_empty() {
            return Err(PolarsError::ComputeError(
                format!("{}: no allele groups found in the first header row", self.path).into(),
            ));
        }
        debug!(
            "Alleles detected: {:?}",
            alleles.iter().map(|a| a.allele.as_str()).collect::<Vec<_>>()
        );

        let mut df = CsvReadOptions::default()
            .with_has_header(false)
            .with_skip_rows(2)
            .map_parse_options(|mut o| {
                o.separator = b'\t';
                o
            })
            .try_into_reader_with_file_path(Some(PathBuf::from(&self.path)))?
            .finish()?;

        if df.width() != unique_headers.len() {
            return Err(PolarsError::ComputeError(
                format!(
                    "{}: header declares {} columns but data rows have {}",
                    self.path,
                    unique_headers.len(),
                    df.width()
                )
                .into(),
            ));
        }
        df.set_column_names(unique_headers.iter().map(|s| PlSmallStr::from(s.as_str())))?;

        // rank columns drive filtering and sorting, make them numeric up front
        let rank_casts: Vec<Expr> = alleles
            .iter()
            .map(|a| col(a.rank_col()).cast(DataType::Float64))
            .collect();
        let df = df.lazy().with_columns(rank_casts).collect()?;

        info!("Binding table: {} row(s), {} allele(s)", df.height(), alleles.len());
        Ok(BindingTable {
            df,
            common: COMMON_COLS.iter().map(|c| c.to_string()).collect(),
            alleles,
        })
    }
}
