use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::models::{MutationRecord, MutationType};

/// The coding-change FASTA written by the external annotator: one entry per
/// annotated transcript variant plus one WILDTYPE entry per variant line.
pub struct AnnotatedFasta {
    pub path: PathBuf,
}

/// Header of a variant entry:
/// `>line1 NM_001005484 c.A338G p.E113G protein-altering (position ...)`
/// Wildtype entries carry only `>line1 NM_001005484 WILDTYPE`.
#[derive(Debug)]
struct RawEntry {
    variant_id: String,
    transcript_id: String,
    cdna_change: String,
    protein_change: String,
    mutation_type: MutationType,
    description: String,
    sequence: String,
}

fn parse_header(body: &str) -> Option<RawEntry> {
    let fields: Vec<&str> = body.splitn(6, ' ').collect();
    if fields.len() >= 3 && fields[2] == "WILDTYPE" {
        return Some(RawEntry {
            variant_id: fields[0].to_string(),
            transcript_id: fields[1].to_string(),
            cdna_change: "NA".to_string(),
            protein_change: "NA".to_string(),
            mutation_type: MutationType::Wildtype,
            description: "NA".to_string(),
            sequence: String::new(),
        });
    }
    if fields.len() < 5 {
        return None;
    }
    Some(RawEntry {
        variant_id: fields[0].to_string(),
        transcript_id: fields[1].to_string(),
        cdna_change: fields[2].to_string(),
        protein_change: fields[3].to_string(),
        mutation_type: MutationType::from_label(fields[4]),
        description: fields.get(5).unwrap_or(&"").to_string(),
        sequence: String::new(),
    })
}

impl AnnotatedFasta {
    /// Parse the FASTA into variant records with the wildtype protein
    /// resolved into each record by (variant id, transcript id). Wildtype
    /// entries do not surface as records of their own.
    pub fn load(&self) -> anyhow::Result<Vec<MutationRecord>> {
        info!("Reading annotated FASTA from {}", self.path.display());
        let file = File::open(&self.path)
            .with_context(|| format!("opening annotated FASTA {}", self.path.display()))?;

        let mut entries: Vec<RawEntry> = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            let line = line.trim_end();
            if let Some(body) = line.strip_prefix('>') {
                match parse_header(body) {
                    Some(entry) => entries.push(entry),
                    None => warn!("skipping malformed FASTA header `>{body}`"),
                }
            } else if let Some(current) = entries.last_mut() {
                current.sequence.push_str(line);
            }
        }

        // strip the terminal stop symbol on every translated sequence
        for entry in entries.iter_mut() {
            while entry.sequence.ends_with('*') {
                entry.sequence.pop();
            }
        }

        let mut wildtypes: HashMap<(String, String), String> = HashMap::new();
        for entry in &entries {
            if entry.mutation_type == MutationType::Wildtype {
                wildtypes
                    .entry((entry.variant_id.clone(), entry.transcript_id.clone()))
                    .or_insert_with(|| entry.sequence.clone());
            }
        }

        let mut records = Vec::new();
        let mut unpaired = 0;
        for entry in entries {
            if entry.mutation_type == MutationType::Wildtype {
                continue;
            }
            let wildtype_sequence = wildtypes
                .get(&(entry.variant_id.clone(), entry.transcript_id.clone()))
                .cloned();
            if wildtype_sequence.is_none() {
                unpaired += 1;
            }
            records.push(MutationRecord {
                variant_id: entry.variant_id,
                transcript_id: entry.transcript_id,
                cdna_change: entry.cdna_change,
                protein_change: entry.protein_change,
                mutation_type: entry.mutation_type,
                description: entry.description,
                protein_sequence: entry.sequence,
                wildtype_sequence,
                gene_name: None,
                peptides: Vec::new(),
            });
        }

        info!(
            "Parsed {} variant record(s), {} wildtype entries, {} without a wildtype partner",
            records.len(),
            wildtypes.len(),
            unpaired
        );
        debug!(
            "First record: {:?}",
            records.first().map(|r| (&r.variant_id, &r.transcript_id))
        );
        Ok(records)
    }
}

/// Remove immediate-stopgain records before generation; their paired
/// wildtype sequence disappears with them.
pub fn drop_immediate_stopgain(records: Vec<MutationRecord>) -> Vec<MutationRecord> {
    let before = records.len();
    let kept: Vec<MutationRecord> = records
        .into_iter()
        .filter(|r| r.mutation_type != MutationType::ImmediateStopgain)
        .collect();
    if kept.len() < before {
        info!("Dropped {} immediate-stopgain record(s)", before - kept.len());
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FASTA: &str = "\
>line1 NM_001005484 WILDTYPE
MKLVWYSTRAED
GHIKLMN*
>line1 NM_001005484 c.A338G p.E113G protein-altering (position 338 changed)
MKLVWYSTRAED
GHIKLMG*
>line2 NM_000002 c.C10T p.Q4* immediate-stopgain (early stop)
MKL*
>line3 NM_000003 c.G5A p.R2H protein-altering (position 5 changed)
MHLVWYSTRAED
";

    fn write_fasta() -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(FASTA.as_bytes()).unwrap();
        f
    }

    #[test]
    fn variant_records_carry_their_wildtype_sequence() {
        let f = write_fasta();
        let records = AnnotatedFasta { path: f.path().to_path_buf() }.load().unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.variant_id, "line1");
        assert_eq!(first.transcript_id, "NM_001005484");
        assert_eq!(first.protein_change, "p.E113G");
        assert_eq!(first.mutation_type, MutationType::ProteinAltering);
        assert_eq!(first.protein_sequence, "MKLVWYSTRAEDGHIKLMG");
        assert_eq!(first.wildtype_sequence.as_deref(), Some("MKLVWYSTRAEDGHIKLMN"));
    }

    #[test]
    fn terminal_stop_symbol_is_stripped() {
        let f = write_fasta();
        let records = AnnotatedFasta { path: f.path().to_path_buf() }.load().unwrap();
        for r in &records {
            assert!(!r.protein_sequence.ends_with('*'));
        }
    }

    #[test]
    fn missing_wildtype_partner_is_not_fatal() {
        let f = write_fasta();
        let records = AnnotatedFasta { path: f.path().to_path_buf() }.load().unwrap();
        let line3 = records.iter().find(|r| r.variant_id == "line3").unwrap();
        assert!(line3.wildtype_sequence.is_none());
    }

    #[test]
    fn immediate_stopgain_records_are_dropped() {
        let f = write_fasta();
        let records = AnnotatedFasta { path: f.path().to_path_buf() }.load().unwrap();
        let kept = drop_immediate_stopgain(records);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|r| r.mutation_type != MutationType::ImmediateStopgain));
    }
}
