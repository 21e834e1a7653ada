//! Integration tests for Crawl-Dispatch

mod client_tests;
mod crawl_tests;
