//! Error types: declaration misuse, step failures, configuration, runtime.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A boxed error a step may fail with.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The lifecycle hooks a suite can carry. At most one of each per suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::BeforeAll => "before_all",
            HookKind::AfterAll => "after_all",
            HookKind::BeforeEach => "before_each",
            HookKind::AfterEach => "after_each",
        })
    }
}

/// Misuse of the registration API. Fatal: the run never starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeclarationError {
    #[error("suite \"{suite}\" can only have a single {kind}")]
    DuplicateHook { suite: String, kind: HookKind },
}

/// Why a step (hook or case body) did not succeed.
///
/// Cheap to clone: a failing `before_all` hands the same failure to every
/// case of its suite.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Failure {
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("panicked{}: {message}", .location.as_deref().map(|at| format!(" at {at}")).unwrap_or_default())]
    Panicked {
        message: String,
        /// `file:line:column` of the panic, when a panic hook saw it.
        location: Option<String>,
    },
    #[error("{0}")]
    Error(Arc<dyn StdError + Send + Sync + 'static>),
}

impl Failure {
    pub fn from_error(err: impl Into<BoxError>) -> Self {
        Failure::Error(Arc::from(err.into()))
    }

    /// Convert a payload caught by `catch_unwind`.
    pub fn from_panic(payload: Box<dyn Any + Send>, location: Option<String>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Failure::Panicked {
            message: msg,
            location,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Failure::Timeout(_))
    }

    /// Messages of the wrapped error's `source()` chain, outermost first.
    pub fn causes(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Failure::Error(err) = self {
            let mut cur = err.source();
            while let Some(e) = cur {
                out.push(e.to_string());
                cur = e.source();
            }
        }
        out
    }
}

/// Which step of the lifecycle produced a case failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    BeforeAll,
    BeforeEach,
    Body,
    AfterEach,
    AfterAll,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::BeforeAll => "before_all",
            Phase::BeforeEach => "before_each",
            Phase::Body => "body",
            Phase::AfterEach => "after_each",
            Phase::AfterAll => "after_all",
        })
    }
}

/// The first failure recorded for a case.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{phase}: {failure}")]
pub struct CaseFailure {
    pub phase: Phase,
    #[source]
    pub failure: Failure,
}

impl CaseFailure {
    pub fn new(phase: Phase, failure: Failure) -> Self {
        CaseFailure { phase, failure }
    }
}

/// Malformed command-line or environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid timeout `{value}` from {origin}: expected milliseconds")]
    InvalidTimeout { value: String, origin: &'static str },
    #[error("invalid color choice `{0}`: expected auto, always or never")]
    InvalidColor(String),
    #[error("flag `{0}` requires a value")]
    MissingValue(String),
}

/// Failure to drive the execution phase at all.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
