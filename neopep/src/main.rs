use std::env;
use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::data_handling::annotated_fasta::{drop_immediate_stopgain, AnnotatedFasta};
use crate::data_handling::gene_expression::{median_tpm, GeneExpressionTable};
use crate::data_handling::variant_genes::{attach_gene_names, read_variant_gene_map};
use crate::helper_functions::project_root;
use crate::peptides::generator::{generate_peptides, write_peptide_list, GenerationCounts};
use crate::postprocess::allele_results::write_allele_results;
use crate::postprocess::binding_table::BindingTableFile;
use crate::postprocess::rank_table::RankTableFile;

mod clustering;
mod data_handling;
mod helper_functions;
mod models;
mod peptides;
mod postprocess;

/// Which binding predictor produced the table to postprocess. The wide
/// two-header-row format comes from NetMHCIIpan, the long `%Rank_` column
/// format from MixMHC2pred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PredictorKind {
    NetMhcIiPan,
    MixMhc2Pred,
}

impl PredictorKind {
    fn from_env() -> anyhow::Result<Self> {
        match env::var("NEOPEP_PREDICTOR").as_deref() {
            Err(_) => Ok(PredictorKind::NetMhcIiPan),
            Ok("netmhciipan") => Ok(PredictorKind::NetMhcIiPan),
            Ok("mixmhc2pred") => Ok(PredictorKind::MixMhc2Pred),
            Ok(other) => anyhow::bail!(
                "unknown NEOPEP_PREDICTOR `{other}`, expected `netmhciipan` or `mixmhc2pred`"
            ),
        }
    }

    fn default_table_path(self) -> &'static str {
        match self {
            PredictorKind::NetMhcIiPan => "data/netmhciipan_outputs/NetMHCIIpan_out.txt",
            PredictorKind::MixMhc2Pred => "data/mixmhc2pred_outputs/MixMHC2pred_out.txt",
        }
    }
}

/// Paths and thresholds for one pipeline invocation. Everything can be
/// overridden through the environment; defaults resolve against
/// `project_root()`.
#[derive(Debug)]
struct PipelineConfig {
    predictor: PredictorKind,
    annotated_fasta: PathBuf,
    variant_function: PathBuf,
    peptide_list: PathBuf,
    binding_table: PathBuf,
    gene_expression: PathBuf,
    allele_output_dir: PathBuf,
    run_summary: PathBuf,
    tpm_threshold: f64,
    seed: Option<u64>,
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| project_root().join(default))
}

impl PipelineConfig {
    fn from_env() -> anyhow::Result<Self> {
        let predictor = PredictorKind::from_env()?;
        let tpm_threshold = env::var("NEOPEP_TPM_THRESHOLD")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1.0);
        let seed = env::var("NEOPEP_SEED").ok().and_then(|v| v.parse().ok());
        Ok(PipelineConfig {
            predictor,
            annotated_fasta: env_path("NEOPEP_FASTA", "data/annovar_outputs/coding_changes.fa"),
            variant_function: env_path(
                "NEOPEP_VARIANT_FUNCTION",
                "data/annovar_outputs/sample.refGene.exonic_variant_function",
            ),
            peptide_list: env_path("NEOPEP_PEP_OUT", "data/mutated_peptide_sequences.pep"),
            binding_table: env_path("NEOPEP_BINDING_TABLE", predictor.default_table_path()),
            gene_expression: env_path("NEOPEP_EXPRESSION", "data/gene_expression.csv"),
            allele_output_dir: env_path("NEOPEP_ALLELE_DIR", "data/allele_results"),
            run_summary: env_path("NEOPEP_RUN_SUMMARY", "run_summary.json"),
            tpm_threshold,
            seed,
        })
    }
}

#[derive(serde::Serialize)]
struct RunSummary {
    variants: usize,
    counts: GenerationCounts,
    peptides_written: usize,
    median_tpm: Option<f64>,
    tpm_threshold: f64,
    allele_outputs: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the neoantigen peptide pipeline");
    let config = PipelineConfig::from_env()?;

    let records = AnnotatedFasta { path: config.annotated_fasta.clone() }.load()?;
    let mut records = drop_immediate_stopgain(records);

    let gene_map = read_variant_gene_map(&config.variant_function)?;
    attach_gene_names(&mut records, &gene_map);

    let mut rng = match config.seed {
        Some(seed) => {
            info!("Seeding frameshift sampling with {seed}");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };
    let counts = generate_peptides(&mut records, &mut rng);
    let peptides_written = write_peptide_list(&records, &config.peptide_list)?;

    let expression = GeneExpressionTable {
        path: config.gene_expression.to_string_lossy().to_string(),
    }
    .load()?;
    let median = median_tpm(&expression)?;
    match median {
        Some(m) => info!("Median TPM across expressed genes: {m:.3} (suggested starting threshold)"),
        None => warn!("No expressed genes found in {}", config.gene_expression.display()),
    }
    info!("Filtering with TPM threshold {}", config.tpm_threshold);

    let table_path = config.binding_table.to_string_lossy().to_string();
    let table = match config.predictor {
        PredictorKind::NetMhcIiPan => BindingTableFile { path: table_path }.load()?,
        PredictorKind::MixMhc2Pred => RankTableFile { path: table_path }.load()?,
    };
    let allele_outputs = write_allele_results(
        &table,
        &records,
        &expression,
        config.tpm_threshold,
        &config.allele_output_dir,
    )?;

    let summary = RunSummary {
        variants: records.len(),
        counts,
        peptides_written,
        median_tpm: median,
        tpm_threshold: config.tpm_threshold,
        allele_outputs,
    };
    let summary_file = File::create(&config.run_summary)
        .with_context(|| format!("writing run summary {}", config.run_summary.display()))?;
    serde_json::to_writer_pretty(summary_file, &summary)?;

    info!("Pipeline finished");
    Ok(())
}
