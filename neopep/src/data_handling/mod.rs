pub mod annotated_fasta;
pub mod gene_expression;
pub mod variant_genes;
