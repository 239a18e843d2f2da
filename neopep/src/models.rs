use polars::prelude::PolarsError;

/// Wrap any foreign error into a `PolarsError` so dataframe-facing code can
/// stay on `PolarsResult` end to end.
pub fn polars_err(e: Box<dyn std::error::Error>) -> PolarsError {
    PolarsError::ComputeError(format!("{e}").into())
}

/// Mutation classes emitted by the external annotator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationType {
    ProteinAltering,
    ImmediateStopgain,
    Synonymous,
    Wildtype,
    Other(String),
}

impl MutationType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "protein-altering" => MutationType::ProteinAltering,
            "immediate-stopgain" => MutationType::ImmediateStopgain,
            "synonymous" => MutationType::Synonymous,
            "WILDTYPE" => MutationType::Wildtype,
            other => MutationType::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MutationType::ProteinAltering => "protein-altering",
            MutationType::ImmediateStopgain => "immediate-stopgain",
            MutationType::Synonymous => "synonymous",
            MutationType::Wildtype => "WILDTYPE",
            MutationType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for MutationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One annotated transcript variant from the annotator's coding-change FASTA.
///
/// The wildtype protein is resolved into `wildtype_sequence` at parse time by
/// (variant id, transcript id), so nothing downstream depends on row order.
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub variant_id: String,
    pub transcript_id: String,
    pub cdna_change: String,
    pub protein_change: String,
    pub mutation_type: MutationType,
    pub description: String,
    /// Translated protein, terminal stop symbol stripped.
    pub protein_sequence: String,
    /// Paired unmutated protein, if the annotator emitted one.
    pub wildtype_sequence: Option<String>,
    /// Attached from the exonic variant-function table.
    pub gene_name: Option<String>,
    /// Candidate mutant peptides, first-seen order, deduplicated.
    pub peptides: Vec<String>,
}
