//! Repository tests against in-memory SQLite with the real migrations.

pub mod harness;
