use polars::prelude::*;
use tracing::{debug, info};

use crate::helper_functions::read_csv;

pub const GENE_COL: &str = "gene_name";
pub const TPM_COL: &str = "tpm_sampleTest";

/// Sample-level gene-expression CSV from the quantification step.
pub struct GeneExpressionTable {
    pub path: String,
}

impl GeneExpressionTable {
    /// Load, deduplicate gene names keeping the first occurrence, and drop
    /// non-expressed entries (tpm <= 0). Missing columns are fatal with the
    /// file path in the message.
    pub fn load(&self) -> PolarsResult<DataFrame> {
        info!("Reading gene expression data from {}", self.path);
        let df = read_csv(&self.path)?;

        for required in [GENE_COL, TPM_COL] {
            if !df.get_column_names().iter().any(|c| c.as_str() == required) {
                return Err(PolarsError::ComputeError(
                    format!("{}: missing required column `{}`", self.path, required).into(),
                ));
            }
        }

        let df = df.unique_stable(
            Some(&[GENE_COL.to_string()]),
            UniqueKeepStrategy::First,
            None,
        )?;

        let df = df
            .lazy()
            .with_column(col(TPM_COL).cast(DataType::Float64))
            .filter(col(TPM_COL).gt(lit(0.0)))
            .collect()?;

        debug!("{} expressed gene(s) after dedup and tpm > 0 filter", df.height());
        Ok(df)
    }
}

/// Median TPM over the expressed genes, surfaced as a threshold suggestion
/// only; it never participates in filtering.
pub fn median_tpm(df: &DataFrame) -> PolarsResult<Option<f64>> {
    Ok(df.column(TPM_COL)?.f64()?.median())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_expression_csv() -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "gene_name,tpm_sampleTest").unwrap();
        writeln!(f, "KRAS,12.5").unwrap();
        writeln!(f, "KRAS,99.0").unwrap();
        writeln!(f, "TP53,0.0").unwrap();
        writeln!(f, "EGFR,3.25").unwrap();
        writeln!(f, "MYC,-1.0").unwrap();
        f
    }

    #[test]
    fn duplicates_keep_first_and_non_expressed_drop() {
        let f = write_expression_csv();
        let df = GeneExpressionTable { path: f.path().to_string_lossy().to_string() }
            .load()
            .unwrap();
        let genes: Vec<&str> = df
            .column(GENE_COL)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        let tpms: Vec<f64> = df
            .column(TPM_COL)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(genes, vec!["KRAS", "EGFR"]);
        assert_eq!(tpms, vec![12.5, 3.25]);
    }

    #[test]
    fn median_skips_non_expressed_entries() {
        let f = write_expression_csv();
        let df = GeneExpressionTable { path: f.path().to_string_lossy().to_string() }
            .load()
            .unwrap();
        // median over {12.5, 3.25}
        assert_eq!(median_tpm(&df).unwrap(), Some((12.5 + 3.25) / 2.0));
    }

    #[test]
    fn missing_column_is_fatal_with_context() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "gene_name,tpm").unwrap();
        writeln!(f, "KRAS,1.0").unwrap();
        let err = GeneExpressionTable { path: f.path().to_string_lossy().to_string() }
            .load()
            .unwrap_err();
        assert!(err.to_string().contains(TPM_COL));
    }
}
