//! Output module for reporting on crawl sessions
//!
//! This module handles:
//! - Collecting queue and result counts of a session
//! - Printing them for the command line

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
