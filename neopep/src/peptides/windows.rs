use rand::Rng;

/// MHC-II presentable peptide length bounds.
pub const MIN_PEPTIDE_LEN: usize = 12;
pub const MAX_PEPTIDE_LEN: usize = 25;

/// Per-length cap on frameshift start positions before switching from
/// exhaustive enumeration to uniform sampling without replacement.
pub const FRAMESHIFT_SAMPLE_CAP: usize = 30;

/// All peptide windows of length 12..=25 sliding across `site`:
/// `seq[site - len + offset .. site + offset]` for offset in 0..len.
///
/// Windows that would start before the sequence begins are skipped, and
/// windows running past the end are truncated; anything shorter than 12
/// residues after slicing is dropped. Duplicate windows are kept here;
/// the generator deduplicates per record.
pub fn site_windows(seq: &str, site: usize) -> Vec<String> {
    let mut out = Vec::new();
    for len in MIN_PEPTIDE_LEN..=MAX_PEPTIDE_LEN {
        for offset in 0..len {
            let start = site as i64 - len as i64 + offset as i64;
            if start < 0 {
                continue;
            }
            let start = start as usize;
            let end = (site + offset).min(seq.len());
            if end <= start {
                continue;
            }
            let window = &seq[start..end];
            if window.len() >= MIN_PEPTIDE_LEN {
                out.push(window.to_string());
            }
        }
    }
    out
}

/// Windows across a frameshifted tail of `mut_length` residues starting at
/// `site`. For each length the valid start count is `mut_length - len + 1`;
/// above the cap, 30 distinct starts are drawn from the injected RNG instead
/// of enumerating all of them.
pub fn frameshift_windows<R: Rng>(
    seq: &str,
    site: usize,
    mut_length: usize,
    rng: &mut R,
) -> Vec<String> {
    let mut out = Vec::new();
    for len in MIN_PEPTIDE_LEN..=MAX_PEPTIDE_LEN {
        let Some(n_starts) = (mut_length + 1).checked_sub(len).filter(|&n| n > 0) else {
            continue;
        };
        let starts: Vec<usize> = if n_starts > FRAMESHIFT_SAMPLE_CAP {
            rand::seq::index::sample(rng, n_starts, FRAMESHIFT_SAMPLE_CAP)
                .iter()
                .map(|i| site + i)
                .collect()
        } else {
            (site..site + n_starts).collect()
        };
        for start in starts {
            if start >= seq.len() {
                continue;
            }
            let end = (start + len).min(seq.len());
            let window = &seq[start..end];
            if window.len() >= MIN_PEPTIDE_LEN {
                out.push(window.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn alphabet_seq(n: usize) -> String {
        // Repeating A..Y so every length-12 window is still position-distinctive
        let letters: Vec<char> = "ACDEFGHIKLMNPQRSTVWY".chars().collect();
        (0..n).map(|i| letters[i % letters.len()]).collect()
    }

    #[test]
    fn window_lengths_stay_in_bounds() {
        let seq = alphabet_seq(400);
        for w in site_windows(&seq, 200) {
            assert!(w.len() >= MIN_PEPTIDE_LEN && w.len() <= MAX_PEPTIDE_LEN);
        }
    }

    #[test]
    fn every_window_spans_the_site() {
        let seq = alphabet_seq(400);
        let site = 200;
        for len in [MIN_PEPTIDE_LEN, MAX_PEPTIDE_LEN] {
            // offset 0 ends exactly at the site, offset len-1 starts right before it
            let first = &seq[site - len..site];
            let last = &seq[site - 1..site + len - 1];
            let windows = site_windows(&seq, site);
            assert!(windows.iter().any(|w| w == first));
            assert!(windows.iter().any(|w| w == last));
        }
    }

    #[test]
    fn deletion_near_sequence_end_truncates() {
        // site 709 on a protein shorter than 709 + 25: right-hand windows
        // truncate at the boundary and sub-12 remnants disappear.
        let seq = alphabet_seq(715);
        let windows = site_windows(&seq, 709);
        assert!(!windows.is_empty());
        for w in &windows {
            assert!(w.len() >= MIN_PEPTIDE_LEN);
            assert!(seq.ends_with(w.as_str()) || seq.contains(w.as_str()));
        }
        // longest possible right extension is 715 - 709 = 6 residues past the site
        assert!(windows.iter().all(|w| w.len() <= MAX_PEPTIDE_LEN));
    }

    #[test]
    fn windows_near_sequence_start_are_skipped() {
        let seq = alphabet_seq(100);
        // site 3: every window of length >= 12 would start before index 0
        // except truncated tails, all of which fall below the length floor
        for w in site_windows(&seq, 3) {
            assert!(w.len() >= MIN_PEPTIDE_LEN);
        }
    }

    #[test]
    fn frameshift_enumerates_when_under_cap() {
        let seq = alphabet_seq(300);
        let mut rng = StdRng::seed_from_u64(42);
        // mut_length 20: for len 12 there are 9 starts, for len 20 one, for len 21+ none
        let windows = frameshift_windows(&seq, 100, 20, &mut rng);
        let len12: Vec<&String> = windows.iter().filter(|w| w.len() == 12).collect();
        assert_eq!(len12.len(), 9);
        let len20: Vec<&String> = windows.iter().filter(|w| w.len() == 20).collect();
        assert_eq!(len20.len(), 1);
        assert!(windows.iter().all(|w| w.len() <= 20));
    }

    #[test]
    fn frameshift_samples_at_most_cap_starts_per_length() {
        let seq = alphabet_seq(2000);
        let mut rng = StdRng::seed_from_u64(42);
        let windows = frameshift_windows(&seq, 100, 500, &mut rng);
        for len in MIN_PEPTIDE_LEN..=MAX_PEPTIDE_LEN {
            // 500 - len + 1 starts per length, all above the cap
            let drawn = windows.iter().filter(|w| w.len() == len).count();
            assert_eq!(drawn, FRAMESHIFT_SAMPLE_CAP);
        }
    }

    #[test]
    fn frameshift_sampling_is_reproducible_under_a_seed() {
        let seq = alphabet_seq(2000);
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        assert_eq!(
            frameshift_windows(&seq, 100, 500, &mut a),
            frameshift_windows(&seq, 100, 500, &mut b)
        );
    }

    #[test]
    fn degenerate_frameshift_region_yields_nothing() {
        let seq = alphabet_seq(300);
        let mut rng = StdRng::seed_from_u64(42);
        assert!(frameshift_windows(&seq, 100, 11, &mut rng).is_empty());
    }
}
