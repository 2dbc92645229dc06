pub mod format;
pub mod strategies;
