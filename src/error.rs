//! Error types shared across initialization.
//!
//! Store operations use `anyhow::Result`; only initialization has a typed
//! error, because one failure is handed to every caller awaiting readiness
//! and must therefore be `Clone`.

use std::fmt;

/// The two dependency-ordered initialization steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStep {
    Catalog,
    Outliner,
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitStep::Catalog => f.write_str("material catalog"),
            InitStep::Outliner => f.write_str("element outliner"),
        }
    }
}

/// Error observed by callers of
/// [`InitializationCoordinator::ensure_ready`](crate::coordinator::InitializationCoordinator::ensure_ready).
///
/// A failed catalog load degrades to the default catalog and does not
/// surface here; only a failure to build even that fallback does.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    /// The outliner could not be constructed or loaded.
    #[error("{step} failed to initialize: {message}")]
    Step { step: InitStep, message: String },

    /// The initialization task panicked or was cancelled by runtime shutdown.
    #[error("initialization was interrupted: {message}")]
    Interrupted { message: String },
}

impl InitError {
    /// The catalog could not be built even from the built-in defaults.
    pub fn catalog(err: &anyhow::Error) -> Self {
        InitError::Step {
            step: InitStep::Catalog,
            message: format!("{:#}", err),
        }
    }

    pub fn outliner(err: &anyhow::Error) -> Self {
        InitError::Step {
            step: InitStep::Outliner,
            message: format!("{:#}", err),
        }
    }

    /// The step that failed, if the failure belongs to one.
    pub fn step(&self) -> Option<InitStep> {
        match self {
            InitError::Step { step, .. } => Some(*step),
            InitError::Interrupted { .. } => None,
        }
    }
}
