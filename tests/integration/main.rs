//! Integration test harness
//!
//! All scenarios run against wiremock servers on 127.0.0.1.

mod crawl_tests;
