//! Integration tests for Collection, its index and the typed model layer.

#[path = "../support/mod.rs"]
mod support;

mod models;
