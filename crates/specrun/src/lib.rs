//! # specrun: a sequential describe/it test runner
//!
//! Declare suites, cases and lifecycle hooks with a closure-based API, then
//! run them one at a time, depth-first, in declaration order. Every hook and
//! case body races a timeout; results are printed as a colored, indented tree
//! followed by a one-line summary.
//!
//! ## Quick example
//!
//! ```rust,no_run
//! use specrun::Step;
//!
//! fn main() {
//!     specrun::run(|ctx| {
//!         ctx.describe("Calculator", |ctx| {
//!             ctx.before_each(Step::sync(|| { /* fresh state */ }));
//!
//!             ctx.it("adds two numbers", || {
//!                 assert_eq!(2 + 3, 5);
//!             });
//!
//!             ctx.it_async("waits for a timer", || async {
//!                 tokio::time::sleep(std::time::Duration::from_millis(5)).await;
//!             })
//!             .timeout(100);
//!
//!             ctx.it_done("signals from another thread", |done| {
//!                 std::thread::spawn(move || done.ok());
//!             });
//!         });
//!     });
//! }
//! ```
//!
//! ## Features
//!
//! - `macros` (default): the `suite!` / `declare!` DSL
//! - `googletest`: re-exports `googletest` matchers via `specrun::matchers`

pub mod config;
mod context;
pub mod error;
pub mod logging;
pub mod report;
pub mod runner;
pub mod step;
pub mod tree;

pub use config::{ColorChoice, RunConfig};
pub use context::{build, run, CaseBuilder, Context, HookBuilder};
pub use error::{BoxError, CaseFailure, DeclarationError, Failure, HookKind, Phase};
pub use runner::{RunOutcome, Runner};
pub use step::{Done, Step};
pub use tree::{Case, Suite};

/// DSL macros. See the `specrun_macros` crate for the grammar.
#[cfg(feature = "macros")]
pub use specrun_macros::{declare, suite};

/// Re-export of the [`googletest`] crate. Available with the `googletest` feature.
#[cfg(feature = "googletest")]
pub use googletest;

/// Composable matchers re-exported from [`googletest::prelude`].
#[cfg(feature = "googletest")]
pub mod matchers {
    pub use googletest::prelude::*;
}

/// Everything a declaration file needs.
pub mod prelude {
    pub use crate::{Context, Done, HookKind, Step};
}
