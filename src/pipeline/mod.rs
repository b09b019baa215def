//! Pipeline module - the analysis stages, from raw waves to regression tables

pub mod correlation;
pub mod coverage;
pub mod describe;
pub mod filter;
pub mod loader;
pub mod logit;
pub mod merge;
pub mod recode;
pub mod regression;

pub use correlation::*;
pub use coverage::*;
pub use describe::*;
pub use filter::*;
pub use loader::*;
pub use merge::*;
pub use recode::*;
