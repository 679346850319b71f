//! # nodenet
//!
//! Scenario runner and read-only debug server for `nodenet-core`.
//!
//! - [`scenario`]: JSON mutation scripts, one remake pass per tick
//! - [`cli`]: clap commands (`kinds`, `run`, `verify`, `serve`)
//! - [`api`]: axum router serving the roster of a finished run

pub mod api;
pub mod cli;
pub mod scenario;
