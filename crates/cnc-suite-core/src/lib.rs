//! # CNC Suite Core
//!
//! Shared, I/O-free logic for CNC Suite: the material and element data
//! models, composite element filters, the type/status/material lookup
//! index, and the change-notification fanout used by both stores.
//!
//! This crate contains no tokio, filesystem writes, or host-application
//! bindings. Persistence and initialization live in the `cnc-suite` crate.

pub mod filter;
pub mod index;
pub mod models;
pub mod notify;
