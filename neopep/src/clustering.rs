use std::collections::BTreeMap;

use tracing::debug;

/// One `(gene, peptide)` pair with its assigned mother sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusteredPeptide {
    pub gene: String,
    pub peptide: String,
    pub cluster: String,
}

/// Maximal overlap between a suffix of `s1` and a prefix of `s2`.
fn max_overlap(s1: &str, s2: &str) -> usize {
    let cap = s1.len().min(s2.len());
    for len in (1..=cap).rev() {
        if s1.ends_with(&s2[..len]) {
            return len;
        }
    }
    0
}

/// Merge two sequences if possible: containment keeps the longer one,
/// otherwise the maximal suffix/prefix overlap in either direction is
/// collapsed into a concatenation, preferring the longer result.
/// `None` means the pair cannot be merged.
pub fn merge_sequences(a: &str, b: &str) -> Option<String> {
    if b.contains(a) {
        return Some(b.to_string());
    }
    if a.contains(b) {
        return Some(a.to_string());
    }

    let ab = max_overlap(a, b);
    let ba = max_overlap(b, a);
    let merged_ab = (ab > 0).then(|| format!("{}{}", a, &b[ab..]));
    let merged_ba = (ba > 0).then(|| format!("{}{}", b, &a[ba..]));

    match (merged_ab, merged_ba) {
        (Some(x), Some(y)) => Some(if y.len() > x.len() { y } else { x }),
        (Some(x), None) => Some(x),
        (None, Some(y)) => Some(y),
        (None, None) => None,
    }
}

/// Greedy first-fit clustering of one gene's peptides into mother sequences.
///
/// Peptides are visited in descending length (stable sort, so ties keep their
/// original relative order) and each merges into the first representative
/// that accepts it. The order dependence is part of the contract; downstream
/// output expects exactly this greedy behavior, not a minimal set cover.
pub fn merge_peptides(peptides: &[String]) -> Vec<String> {
    let mut ordered: Vec<&String> = peptides.iter().collect();
    ordered.sort_by_key(|p| std::cmp::Reverse(p.len()));

    let mut clusters: Vec<String> = Vec::new();
    for peptide in ordered {
        let mut merged = false;
        for representative in clusters.iter_mut() {
            if let Some(combined) = merge_sequences(representative, peptide) {
                *representative = combined;
                merged = true;
                break;
            }
        }
        if !merged {
            clusters.push(peptide.clone());
        }
    }
    clusters
}

/// Cluster `(gene, peptide)` pairs per gene and map every input pair to a
/// mother sequence. On multiple containing representatives the longest wins,
/// first match on ties.
pub fn cluster_peptides_by_gene(pairs: &[(String, String)]) -> Vec<ClusteredPeptide> {
    let mut by_gene: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (gene, peptide) in pairs {
        by_gene.entry(gene).or_default().push(peptide);
    }

    let mut out = Vec::with_capacity(pairs.len());
    for (gene, peptides) in by_gene {
        let owned: Vec<String> = peptides.iter().map(|p| p.to_string()).collect();
        let mothers = merge_peptides(&owned);
        debug!("{gene}: {} peptide(s) -> {} cluster(s)", owned.len(), mothers.len());

        for peptide in &owned {
            let mut best: Option<&String> = None;
            for mother in &mothers {
                if mother.contains(peptide.as_str())
                    && best.map_or(true, |b| mother.len() > b.len())
                {
                    best = Some(mother);
                }
            }
            out.push(ClusteredPeptide {
                gene: gene.to_string(),
                peptide: peptide.clone(),
                // a peptide no representative contains should not arise;
                // fall back to the peptide itself rather than drop the row
                cluster: best.cloned().unwrap_or_else(|| peptide.clone()),
            });
        }
    }
    out
}
