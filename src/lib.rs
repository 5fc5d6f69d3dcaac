#![warn(missing_debug_implementations, rust_2018_idioms, missing_docs)]

//! Calling of likely pseudouridine sites from bisulfite induced deletion signatures.
//!
//! Per position deletion counts of a bisulfite treated sample, and optionally an
//! untreated control, are filtered, collapsed into contiguous groups, tested
//! against a background error rate and classified against gene and repeat
//! annotations.
pub mod annotation;
pub mod config;
pub mod error;
pub mod genomic;
pub mod group;
pub mod input;
pub mod locus;
pub mod origin;
pub mod pipeline;
pub mod report;
pub mod stats;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, crate::error::Error>;
