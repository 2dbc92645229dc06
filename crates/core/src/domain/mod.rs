pub mod contract;
pub mod portfolio;
