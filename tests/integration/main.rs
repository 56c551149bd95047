//! Integration tests for Listing-Watch
//!
//! These tests use wiremock to create mock listing sites and exercise
//! searches, whole runs and the external collaborators end-to-end.

mod common;
mod run_tests;
mod search_tests;
