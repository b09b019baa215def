//! Report module - summaries, console tables and exported reports

pub mod bundle;
pub mod run_report;
pub mod summary;
pub mod tables;

pub use bundle::*;
pub use run_report::*;
pub use summary::*;
pub use tables::*;
