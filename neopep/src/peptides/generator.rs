use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::models::{MutationRecord, MutationType};
use crate::peptides::protein_change::ProteinChange;
use crate::peptides::windows::{frameshift_windows, site_windows};

/// Per-class tallies over one generation pass, mirrored into the run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct GenerationCounts {
    pub insertion: usize,
    pub deletion: usize,
    pub frameshift: usize,
    pub substitution: usize,
    pub unrecognized: usize,
}

/// Fill `peptides` on every protein-altering record: classify the annotation,
/// slide the windows, drop anything still present in the paired wildtype
/// protein, and deduplicate preserving first-seen order.
///
/// Records with unrecognized notation are counted and skipped, never fatal.
pub fn generate_peptides<R: Rng>(records: &mut [MutationRecord], rng: &mut R) -> GenerationCounts {
    let mut counts = GenerationCounts::default();

    for record in records.iter_mut() {
        if record.mutation_type != MutationType::ProteinAltering {
            continue;
        }

        let change = match ProteinChange::parse(&record.protein_change) {
            Ok(change) => change,
            Err(e) => {
                warn!(
                    "{} ({}): {}, record skipped",
                    record.variant_id, record.transcript_id, e
                );
                counts.unrecognized += 1;
                continue;
            }
        };

        let seq = record.protein_sequence.as_str();
        let raw: Vec<String> = match &change {
            ProteinChange::Insertion { site, inserted } => {
                counts.insertion += 1;
                site_windows(seq, *site)
                    .into_iter()
                    // every kept window must span the novel residues
                    .filter(|w| w.contains(inserted.as_str()))
                    .collect()
            }
            ProteinChange::Deletion { site } => {
                counts.deletion += 1;
                site_windows(seq, *site)
            }
            ProteinChange::Substitution { site } => {
                counts.substitution += 1;
                site_windows(seq, *site)
            }
            ProteinChange::Frameshift { site, mut_length } => {
                counts.frameshift += 1;
                frameshift_windows(seq, *site, *mut_length, rng)
            }
        };

        let survivors: Vec<String> = match &record.wildtype_sequence {
            Some(wildtype) => raw
                .into_iter()
                .filter(|p| !wildtype.contains(p.as_str()))
                .collect(),
            None => {
                warn!(
                    "{} ({}): no wildtype partner, skipping wildtype filter",
                    record.variant_id, record.transcript_id
                );
                raw
            }
        };

        record.peptides = dedup_preserve_order(survivors);
        debug!(
            "{} ({}): {} candidate peptide(s)",
            record.variant_id,
            record.transcript_id,
            record.peptides.len()
        );
    }

    info!(
        "Peptide generation counts: insertion {}, deletion {}, frameshift {}, substitution {}, unrecognized {}",
        counts.insertion, counts.deletion, counts.frameshift, counts.substitution, counts.unrecognized
    );
    counts
}

fn dedup_preserve_order(peptides: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    peptides.into_iter().filter(|p| seen.insert(p.clone())).collect()
}

/// Write the aggregate newline-delimited peptide list the external binding
/// predictors consume. Returns the number of peptides written.
pub fn write_peptide_list(records: &[MutationRecord], path: &Path) -> anyhow::Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("creating peptide list {}", path.display()))?;
    let mut out = BufWriter::new(file);

    let mut written = 0;
    for record in records {
        for peptide in &record.peptides {
            writeln!(out, "{peptide}")?;
            written += 1;
        }
    }
    out.flush()?;
    info!("Wrote {} peptide(s) to {}", written, path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn record(protein_change: &str, seq: &str, wildtype: Option<&str>) -> MutationRecord {
        MutationRecord {
            variant_id: "line1".to_string(),
            transcript_id: "NM_000001".to_string(),
            cdna_change: "c.A1G".to_string(),
            protein_change: protein_change.to_string(),
            mutation_type: MutationType::ProteinAltering,
            description: "test".to_string(),
            protein_sequence: seq.to_string(),
            wildtype_sequence: wildtype.map(|s| s.to_string()),
            gene_name: None,
            peptides: Vec::new(),
        }
    }

    fn varied_seq(n: usize) -> String {
        let letters: Vec<char> = "ACDEFGHIKLMNPQRSTVWY".chars().collect();
        (0..n)
            .map(|i| letters[(i * 7 + i / 20) % letters.len()])
            .collect()
    }

    #[test]
    fn insertion_windows_all_contain_the_inserted_residues() {
        let mut seq = varied_seq(400);
        seq.replace_range(183..183, "Q");
        let mut records = vec![record("p.Q183_R184insQ", &seq, None)];
        let mut rng = StdRng::seed_from_u64(42);
        let counts = generate_peptides(&mut records, &mut rng);

        assert_eq!(counts.insertion, 1);
        assert!(!records[0].peptides.is_empty());
        for p in &records[0].peptides {
            assert!(p.contains('Q'), "window {p} misses the insertion");
            assert!((12..=25).contains(&p.len()));
        }
    }

    #[test]
    fn wildtype_substrings_are_filtered_out() {
        let wildtype = varied_seq(400);
        let mut mutant = wildtype.clone();
        mutant.replace_range(299..300, "W");
        let mut records = vec![record("p.G300W", &mutant, Some(&wildtype))];
        let mut rng = StdRng::seed_from_u64(42);
        let counts = generate_peptides(&mut records, &mut rng);

        assert_eq!(counts.substitution, 1);
        assert!(!records[0].peptides.is_empty());
        for p in &records[0].peptides {
            assert!(!wildtype.contains(p.as_str()));
            // the surviving windows are exactly the ones spanning index 299
            assert!(p.contains('W'));
        }
    }

    #[test]
    fn missing_wildtype_partner_disables_the_filter_only() {
        let seq = varied_seq(400);
        let mut records = vec![record("p.G300D", &seq, None)];
        let mut rng = StdRng::seed_from_u64(42);
        generate_peptides(&mut records, &mut rng);
        assert!(!records[0].peptides.is_empty());
    }

    #[test]
    fn candidates_are_deduplicated_in_first_seen_order() {
        let first = vec!["AAAA".to_string(), "BBBB".to_string(), "AAAA".to_string(), "CCCC".to_string(), "BBBB".to_string()];
        assert_eq!(
            dedup_preserve_order(first),
            vec!["AAAA".to_string(), "BBBB".to_string(), "CCCC".to_string()]
        );
    }

    #[test]
    fn unrecognized_notation_is_counted_and_skipped() {
        let seq = varied_seq(400);
        let mut records = vec![record("p.weird!notation", &seq, None)];
        let mut rng = StdRng::seed_from_u64(42);
        let counts = generate_peptides(&mut records, &mut rng);
        assert_eq!(counts.unrecognized, 1);
        assert!(records[0].peptides.is_empty());
    }

    #[test]
    fn non_protein_altering_records_are_ignored() {
        let seq = varied_seq(400);
        let mut rec = record("p.G300D", &seq, None);
        rec.mutation_type = MutationType::Synonymous;
        let mut records = vec![rec];
        let mut rng = StdRng::seed_from_u64(42);
        let counts = generate_peptides(&mut records, &mut rng);
        assert_eq!(counts, GenerationCounts::default());
        assert!(records[0].peptides.is_empty());
    }
}
