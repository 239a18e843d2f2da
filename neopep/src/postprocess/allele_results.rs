use std::collections::HashSet;
use std::fs;
use std::path::Path;

use polars::df;
use polars::prelude::*;
use tracing::{debug, info};

use crate::clustering::cluster_peptides_by_gene;
use crate::data_handling::gene_expression::{GENE_COL, TPM_COL};
use crate::helper_functions::dataframe_to_csv;
use crate::models::{MutationRecord, MutationType};
use crate::postprocess::binding_table::{AlleleColumns, BindingTable};

/// Strong-binder cutoff convention of the predictors; not user-configurable.
pub const RANK_CUTOFF: f64 = 5.0;

const GENE_NAME: &str = "Gene Name";
const GENE_EXPRESSION: &str = "Gene Expression";
const CONSIDERED_TARGET: &str = "Considered Target";
const CLUSTER: &str = "Cluster";
const METADATA_COLS: [&str; 5] = [
    "Transcript ID",
    "cDNA Change",
    "Protein Change",
    "Mutation Type",
    "Description",
];

/// Peptide -> gene lookup frame across all records; the first gene observed
/// for a peptide wins.
fn peptide_gene_frame(records: &[MutationRecord]) -> PolarsResult<DataFrame> {
    let mut seen = HashSet::new();
    let mut peptides = Vec::new();
    let mut genes = Vec::new();
    for record in records {
        let Some(gene) = &record.gene_name else { continue };
        for peptide in &record.peptides {
            if seen.insert(peptide.clone()) {
                peptides.push(peptide.clone());
                genes.push(gene.clone());
            }
        }
    }
    df!("Peptide" => peptides, GENE_NAME => genes)
}

/// Static mutation metadata keyed by gene. Wildtype entries never make it
/// in here, which is what keeps wildtype-only rows out of the final output.
fn metadata_frame(records: &[MutationRecord]) -> PolarsResult<DataFrame> {
    let mut seen = HashSet::new();
    let mut genes = Vec::new();
    let mut transcripts = Vec::new();
    let mut cdna = Vec::new();
    let mut protein = Vec::new();
    let mut mutation_types = Vec::new();
    let mut descriptions = Vec::new();

    for record in records {
        if record.mutation_type == MutationType::Wildtype {
            continue;
        }
        let Some(gene) = &record.gene_name else { continue };
        let row = (
            gene.clone(),
            record.transcript_id.clone(),
            record.cdna_change.clone(),
            record.protein_change.clone(),
            record.mutation_type.label().to_string(),
            record.description.clone(),
        );
        if seen.insert(row.clone()) {
            genes.push(row.0);
            transcripts.push(row.1);
            cdna.push(row.2);
            protein.push(row.3);
            mutation_types.push(row.4);
            descriptions.push(row.5);
        }
    }

    df!(
        GENE_NAME => genes,
        METADATA_COLS[0] => transcripts,
        METADATA_COLS[1] => cdna,
        METADATA_COLS[2] => protein,
        METADATA_COLS[3] => mutation_types,
        METADATA_COLS[4] => descriptions,
    )
}

fn gene_peptide_pairs(df: &DataFrame) -> PolarsResult<Vec<(String, String)>> {
    let genes = df.column(GENE_NAME)?.str()?;
    let peptides = df.column("Peptide")?.str()?;
    Ok(genes
        .into_iter()
        .zip(peptides.into_iter())
        .filter_map(|(g, p)| Some((g?.to_string(), p?.to_string())))
        .collect())
}

/// Cluster the allele's filtered (gene, peptide) set and lay the assignment
/// out as a joinable frame, one row per distinct pair.
fn cluster_frame(pairs: &[(String, String)]) -> PolarsResult<DataFrame> {
    let clustered = cluster_peptides_by_gene(pairs);
    let mut seen = HashSet::new();
    let mut genes = Vec::new();
    let mut peptides = Vec::new();
    let mut clusters = Vec::new();
    for row in clustered {
        if seen.insert((row.gene.clone(), row.peptide.clone())) {
            genes.push(row.gene);
            peptides.push(row.peptide);
            clusters.push(row.cluster);
        }
    }
    df!(GENE_NAME => genes, "Peptide" => peptides, CLUSTER => clusters)
}

fn process_allele(
    table_df: &DataFrame,
    common: &[String],
    allele: &AlleleColumns,
    gene_df: &DataFrame,
    expression: &DataFrame,
    metadata: &DataFrame,
    tpm_threshold: f64,
) -> PolarsResult<DataFrame> {
    let rank_col = allele.rank_col();

    let filtered = table_df
        .clone()
        .lazy()
        .filter(col(rank_col).lt_eq(lit(RANK_CUTOFF)))
        .join(
            gene_df.clone().lazy(),
            [col("Peptide")],
            [col("Peptide")],
            JoinArgs::new(JoinType::Inner),
        )
        .join(
            expression.clone().lazy(),
            [col(GENE_NAME)],
            [col(GENE_NAME)],
            JoinArgs::new(JoinType::Inner),
        )
        .with_column(
            when(col(GENE_EXPRESSION).gt_eq(lit(tpm_threshold)))
                .then(lit(1i32))
                .otherwise(lit(0i32))
                .alias(CONSIDERED_TARGET),
        )
        .collect()?;
    debug!(
        "{}: {} row(s) below rank cutoff with expressed genes",
        allele.allele,
        filtered.height()
    );

    // clustering is recomputed over this allele's filtered subset only
    let pairs = gene_peptide_pairs(&filtered)?;
    let clusters = cluster_frame(&pairs)?;

    let joined = filtered
        .lazy()
        .join(
            clusters.lazy(),
            [col(GENE_NAME), col("Peptide")],
            [col(GENE_NAME), col("Peptide")],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            metadata.clone().lazy(),
            [col(GENE_NAME)],
            [col(GENE_NAME)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([rank_col], SortMultipleOptions::default())
        .collect()?;

    let mut selected: Vec<&str> = common.iter().map(String::as_str).collect();
    selected.extend([GENE_NAME, GENE_EXPRESSION, CONSIDERED_TARGET, CLUSTER]);
    selected.extend(METADATA_COLS);
    selected.extend(allele.unique.iter().map(String::as_str));
    let mut out = joined.select(selected)?;

    // undo the positional suffixing for the emitted table
    for (unique, raw) in allele.unique.iter().zip(allele.raw.iter()) {
        if unique != raw {
            out.rename(unique, raw.as_str().into())?;
        }
    }
    Ok(out)
}

/// Produce one ranked CSV per allele; returns the written file paths.
pub fn write_allele_results(
    table: &BindingTable,
    records: &[MutationRecord],
    expression: &DataFrame,
    tpm_threshold: f64,
    output_dir: &Path,
) -> PolarsResult<Vec<String>> {
    let gene_df = peptide_gene_frame(records)?;
    let metadata = metadata_frame(records)?;

    let mut expression = expression.clone();
    expression.rename(GENE_COL, GENE_NAME.into())?;
    expression.rename(TPM_COL, GENE_EXPRESSION.into())?;
    // polars 0.46's `rename` leaves the frame's cached schema stale, which
    // breaks the lazy joins below; drop the cache so `lazy()` re-derives it.
    expression.clear_schema();

    fs::create_dir_all(output_dir)?;

    let mut written = Vec::with_capacity(table.alleles.len());
    for allele in &table.alleles {
        let mut out = process_allele(
            &table.df,
            &table.common,
            allele,
            &gene_df,
            &expression,
            &metadata,
            tpm_threshold,
        )?;
        let path = output_dir.join(format!("{}_results.csv", allele.allele));
        let path_str = path.to_string_lossy().to_string();
        dataframe_to_csv(&mut out, &path_str, true)?;
        info!("Results for allele {} saved to {}", allele.allele, path_str);
        written.push(path_str);
    }
    Ok(written)
}
