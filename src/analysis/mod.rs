pub mod classifier;
pub mod underwriting;
