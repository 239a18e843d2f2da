pub mod allele_results;
pub mod binding_table;
pub mod rank_table;
