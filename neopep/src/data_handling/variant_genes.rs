use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use tracing::{info, warn};

use crate::models::MutationRecord;

/// Parse the annotator's `*.exonic_variant_function` table into a
/// variant-line -> gene-name map. The file is headerless and tab-separated;
/// column 0 is the variant line id and column 2 starts with `GENE:...`.
pub fn read_variant_gene_map(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    info!("Reading exonic variant function table from {}", path.display());
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening variant function table {}", path.display()))?;

    let mut map = HashMap::new();
    for record in reader.records() {
        let record = record?;
        if record.len() < 3 {
            continue;
        }
        let gene_info = &record[2];
        let gene = gene_info.split(':').next().unwrap_or(gene_info);
        map.insert(record[0].to_string(), gene.to_string());
    }
    info!("Mapped {} variant line(s) to gene names", map.len());
    Ok(map)
}

/// Attach gene names to records by variant id. Records without a mapping
/// keep `None` and fall out of the final join later.
pub fn attach_gene_names(records: &mut [MutationRecord], genes: &HashMap<String, String>) {
    let mut unmapped = 0;
    for record in records.iter_mut() {
        match genes.get(&record.variant_id) {
            Some(gene) => record.gene_name = Some(gene.clone()),
            None => unmapped += 1,
        }
    }
    if unmapped > 0 {
        warn!("{unmapped} record(s) have no gene mapping");
    }
}
