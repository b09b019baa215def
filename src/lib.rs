//! Findex: survey pipeline library
//!
//! Merges two Global Findex survey waves, recodes and filters them, and fits
//! pooled and per-country logit models linking credit card ownership to
//! household savings.

pub mod cli;
pub mod config;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod utils;
