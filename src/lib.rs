//! # CNC Suite
//!
//! Material catalog and element outliner services for a CNC production
//! plugin hosted inside a 3D modeling application.
//!
//! The plugin keeps two JSON-backed stores: a shared catalog of sheet and
//! length stock (`materials.json`) and a per-project list of manufacturable
//! elements (`elements.json`). Both are loaded lazily, catalog first, and
//! publish change notifications that panels use to refresh.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  spawn   ┌──────────────────────────┐
//! │  Plugin  │─────────▶│ InitializationCoordinator│
//! └────┬─────┘          └──────┬──────────────┬────┘
//!      │                       ▼              ▼
//!      │            ┌──────────────────┐ ┌──────────────────┐
//!      │            │MaterialCatalog   │◀│ElementOutliner   │
//!      │            │Store (materials) │ │Store (elements)  │
//!      │            └────────┬─────────┘ └────────┬─────────┘
//!      │                     │ notify             │ notify
//!      ▼                     ▼                    ▼
//! ┌──────────┐      ┌─────────────────┐   ┌───────────────┐
//! │ Commands │─────▶│ MaterialPalette │   │ OutlinerPanel │
//! └──────────┘      └───────┬─────────┘   └───────────────┘
//!                           ▼
//!                    HostDocument (trait)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`error`] | Initialization errors |
//! | [`persist`] | JSON file read and atomic write |
//! | [`catalog`] | Material catalog store |
//! | [`outliner`] | Element outliner store |
//! | [`coordinator`] | Single-flight, ordered initialization |
//! | [`host`] | Host document contract and in-memory document |
//! | [`palette`] | Material-to-object operations |
//! | [`view`] | Display rows and summaries |
//! | [`panel`] | Outliner panel state |
//! | [`commands`] | Host commands |
//! | [`plugin`] | Composition root |
//!
//! The data model, filters, lookup index and notification fanout live in
//! the I/O-free `cnc_suite_core` crate and are re-exported here.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod host;
pub mod logging;
pub mod outliner;
pub mod palette;
pub mod panel;
pub mod persist;
pub mod plugin;
pub mod view;

pub use cnc_suite_core::{filter, index, models, notify};
