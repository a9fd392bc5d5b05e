//! # queuectl-cli
//!
//! Control Operations, the `clap` argv surface, output rendering, and
//! worker-process management for the `queuectl` binary. Exposed as a
//! library (not just a `main.rs`) so integration tests can exercise
//! `control`/`process` directly against a temp-file store, the same shape
//! `fraiseql-cli` uses for its own command modules.

pub mod cli;
pub mod control;
pub mod output;
pub mod process;
