use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// A classified protein-change annotation.
///
/// Sites are 0-based indices into the mutant protein sequence, except for
/// insertions, where the anchor keeps the raw 1-based position so that the
/// sliding window straddles the junction between the two reported residues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProteinChange {
    /// `p.Q183_R184insQ`
    Insertion { site: usize, inserted: String },
    /// `p.E710del` or `p.E710_S712del`
    Deletion { site: usize },
    /// `p.Y32Cfs*18`; `mut_length` counts shifted residues up to the new stop.
    Frameshift { site: usize, mut_length: usize },
    /// `p.G300D`
    Substitution { site: usize },
}

/// A protein-change string that matches none of the four supported shapes.
/// Callers are expected to count and skip the record, not abort the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedNotation(pub String);

impl fmt::Display for UnrecognizedNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized mutation notation `{}`", self.0)
    }
}

impl std::error::Error for UnrecognizedNotation {}

fn insertion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^p\.[A-Z](\d+)_[A-Z]\d+ins([A-Z*]+)$").unwrap())
}

fn deletion_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^p\.[A-Z](\d+)(?:_[A-Z]\d+)?del$").unwrap())
}

fn frameshift_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^p\.[A-Z](\d+)[A-Z]fs\*(\d+)$").unwrap())
}

fn substitution_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^p\.[A-Z](\d+)[A-Z]$").unwrap())
}

impl ProteinChange {
    pub fn parse(notation: &str) -> Result<ProteinChange, UnrecognizedNotation> {
        let err = || UnrecognizedNotation(notation.to_string());

        if let Some(caps) = insertion_re().captures(notation) {
            let site: usize = caps[1].parse().map_err(|_| err())?;
            return Ok(ProteinChange::Insertion {
                site,
                inserted: caps[2].to_string(),
            });
        }
        if let Some(caps) = deletion_re().captures(notation) {
            let pos: usize = caps[1].parse().map_err(|_| err())?;
            if pos == 0 {
                return Err(err());
            }
            return Ok(ProteinChange::Deletion { site: pos - 1 });
        }
        if let Some(caps) = frameshift_re().captures(notation) {
            let pos: usize = caps[1].parse().map_err(|_| err())?;
            let mut_length: usize = caps[2].parse().map_err(|_| err())?;
            if pos == 0 {
                return Err(err());
            }
            return Ok(ProteinChange::Frameshift { site: pos - 1, mut_length });
        }
        if let Some(caps) = substitution_re().captures(notation) {
            let pos: usize = caps[1].parse().map_err(|_| err())?;
            if pos == 0 {
                return Err(err());
            }
            return Ok(ProteinChange::Substitution { site: pos - 1 });
        }
        Err(err())
    }
}
