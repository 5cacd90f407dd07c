//! crconfig - routing configuration synthesizer for CDN traffic routers.
//!
//! crconfig reads the operational database of a CDN control plane (delivery services,
//! their regexes, static DNS entries and the parameters of server profiles) and produces
//! the consolidated "CR config" document that traffic routers load to decide how to
//! answer DNS and HTTP requests.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use crconfig::{CrConfigSynthesizer, adapters::SnapshotStore};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let store = SnapshotStore::from_path("tables.json").await?;
//! let synthesizer = CrConfigSynthesizer::new(Arc::new(store));
//! let report = synthesizer.synthesize("cdn1", "cdn.example.com").await?;
//! println!("{}", report.document.to_json_pretty()?);
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping
//! the synthesis logic inside `core`. The core never talks to a database directly; it reads
//! through [`ports::store::CrConfigStore`], implemented by a Postgres adapter for live runs
//! and by an in-memory snapshot adapter for offline runs and tests.
//!
//! # Error Handling
//! Core operations return [`SynthesisError`]. Any fatal error aborts the run and no partial
//! document is produced. Non-fatal conditions are logged, counted and returned as
//! [`Diagnostic`]s alongside the document. The binary and config loader use `eyre`.
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{PostgresStore, SnapshotStore},
    core::{
        CrConfigDocument, CrConfigSynthesizer, Diagnostic, Diagnostics, SynthesisError,
        SynthesisReport,
    },
    ports::store::CrConfigStore,
};
