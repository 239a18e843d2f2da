pub mod generator;
pub mod protein_change;
pub mod windows;
