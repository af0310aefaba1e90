//! File output for cycle results.

pub mod export;
