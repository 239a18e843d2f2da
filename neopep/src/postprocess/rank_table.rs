use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{debug, info};

use crate::models::polars_err;
use crate::postprocess::binding_table::{AlleleColumns, BindingTable};

/// Per-allele rank columns carry this prefix in the long predictor format.
pub const RANK_PREFIX: &str = "%Rank_";

/// Cross-allele best rank; never allele-specific, so never a group.
const BEST_RANK_COL: &str = "%Rank_best";

const PEPTIDE_COL: &str = "Peptide";

/// The tab-separated long table produced by the alternative binding
/// predictor: a block of `#` metadata lines, then a single header row with
/// one `%Rank_<allele>` column per allele.
pub struct RankTableFile {
    pub path: String,
}

impl RankTableFile {
    pub fn load(&self) -> PolarsResult<BindingTable> {
        info!("Reading long-format binding prediction table from {}", self.path);
        let file = File::open(&self.path)
            .map_err(|e| polars_err(format!("{}: {e}", self.path).into()))?;
        let reader = BufReader::new(file);

        let mut metadata_lines = 0;
        for line in reader.lines() {
            if line?.starts_with('#') {
                metadata_lines += 1;
            } else {
                break;
            }
        }
        debug!("Skipping {} metadata line(s)", metadata_lines);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_skip_rows(metadata_lines)
            .map_parse_options(|mut o| {
                o.separator = b'\t';
                o
            })
            .try_into_reader_with_file_path(Some(PathBuf::from(&self.path)))?
            .finish()?;

        if !df.get_column_names().iter().any(|c| c.as_str() == PEPTIDE_COL) {
            return Err(PolarsError::ComputeError(
                format!("{}: missing required column `{}`", self.path, PEPTIDE_COL).into(),
            ));
        }

        let alleles: Vec<AlleleColumns> = df
            .get_column_names()
            .iter()
            .filter(|c| c.as_str() != BEST_RANK_COL)
            .filter_map(|c| {
                c.strip_prefix(RANK_PREFIX).map(|allele| AlleleColumns {
                    allele: allele.to_string(),
                    // the emitted table renames the rank column to a bare `Rank`
                    raw: vec!["Rank".to_string()],
                    unique: vec![c.to_string()],
                })
            })
            .collect();
        if alleles.is_empty() {
            return Err(PolarsError::ComputeError(
                format!("{}: no `{}` allele columns found", self.path, RANK_PREFIX).into(),
            ));
        }
        debug!(
            "Alleles detected: {:?}",
            alleles.iter().map(|a| a.allele.as_str()).collect::<Vec<_>>()
        );

        let rank_casts: Vec<Expr> = alleles
            .iter()
            .map(|a| col(a.rank_col()).cast(DataType::Float64))
            .collect();
        let df = df.lazy().with_columns(rank_casts).collect()?;

        info!("Binding table: {} row(s), {} allele(s)", df.height(), alleles.len());
        Ok(BindingTable {
            df,
            common: vec![PEPTIDE_COL.to_string()],
            alleles,
        })
    }
}
