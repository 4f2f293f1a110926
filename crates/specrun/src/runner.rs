//! Sequential executor: cases, suites, and the top-level run.
//!
//! Exactly one step is in flight at any time. Within a suite the order is
//!
//! ```text
//! before_all -> (before_each -> body -> after_each) per case -> child suites -> after_all
//! ```

use std::time::{Duration, Instant};

use futures_util::future::LocalBoxFuture;
use futures_util::FutureExt;

use crate::config::RunConfig;
use crate::error::{CaseFailure, Failure, Phase, RunError};
use crate::report::Reporter;
use crate::step::{run_step, Outcome};
use crate::tree::{Case, Hook, Hooks, Suite};

/// Totals and the executed tree, returned once a run completes.
#[derive(Debug)]
pub struct RunOutcome {
    pub root: Suite,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn passed(&self) -> usize {
        self.root.passed
    }

    pub fn failed(&self) -> usize {
        self.root.failed
    }

    pub fn count(&self) -> usize {
        self.root.count
    }

    /// 0 when nothing failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.root.failed == 0 {
            0
        } else {
            1
        }
    }
}

/// Drives a built tree to completion.
pub struct Runner {
    reporter: Reporter,
}

impl Runner {
    /// A runner printing to stdout, colored per `config`.
    pub fn new(config: &RunConfig) -> Self {
        Runner {
            reporter: Reporter::stdout(config.color.enabled()),
        }
    }

    pub fn with_reporter(reporter: Reporter) -> Self {
        Runner { reporter }
    }

    /// Execute `root` on a single-threaded runtime and print the summary.
    ///
    /// Steps run inside a `LocalSet`, so callback steps may use
    /// `tokio::task::spawn_local` as well as `tokio::spawn`. Timers and I/O
    /// drivers are both enabled.
    pub fn execute(mut self, mut root: Suite) -> Result<RunOutcome, RunError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let local = tokio::task::LocalSet::new();

        let elapsed = local.block_on(&rt, async {
            let start = Instant::now();
            run_suite(&mut root, &mut self.reporter).await;
            start.elapsed()
        });

        self.reporter.summary(&root, elapsed);
        tracing::debug!(
            passed = root.passed,
            failed = root.failed,
            count = root.count,
            "run finished"
        );

        Ok(RunOutcome { root, elapsed })
    }
}

async fn run_hook(hook: Option<&Hook>) -> Outcome {
    match hook {
        Some(hook) => run_step(Some(&hook.step), hook.timeout).await,
        None => Ok(()),
    }
}

// ============================================================================
// Case executor
// ============================================================================

async fn run_case(case: &mut Case, hooks: &Hooks, depth: usize, reporter: &mut Reporter) {
    tracing::debug!(case = %case.title, style = case.body.style(), "running case");
    case.started = Some(Instant::now());

    case.failure = match run_hook(hooks.before_each.as_ref()).await {
        Err(failure) => Some(CaseFailure::new(Phase::BeforeEach, failure)),
        Ok(()) => {
            let body = run_step(Some(&case.body), case.timeout)
                .await
                .err()
                .map(|f| CaseFailure::new(Phase::Body, f));
            // after_each runs even when the body failed.
            let after = run_hook(hooks.after_each.as_ref())
                .await
                .err()
                .map(|f| CaseFailure::new(Phase::AfterEach, f));
            body.or(after)
        }
    };

    case.stopped = Some(Instant::now());
    reporter.case(depth, case);
}

// ============================================================================
// Suite executor
// ============================================================================

/// Mark every case of `suite` that has no failure yet as failed by `phase`.
fn fail_clean_cases(suite: &mut Suite, phase: Phase, failure: &Failure) {
    for case in &mut suite.cases {
        case.fail_if_clean(phase, failure);
    }
}

fn run_suite<'a>(suite: &'a mut Suite, reporter: &'a mut Reporter) -> LocalBoxFuture<'a, ()> {
    async move {
        tracing::debug!(suite = %suite.title, depth = suite.depth, "running suite");
        suite.started = Some(Instant::now());
        reporter.suite_header(suite);

        match run_hook(suite.hooks.before_all.as_ref()).await {
            Err(failure) => {
                reporter.hook_failure(suite, "before_all", &failure);
                fail_clean_cases(suite, Phase::BeforeAll, &failure);
                for case in &suite.cases {
                    reporter.case(suite.depth, case);
                }
                for child in &suite.suites {
                    reporter.suite_skipped(child);
                }
                suite.before_all_error = Some(failure);
            }
            Ok(()) => {
                for case in &mut suite.cases {
                    run_case(case, &suite.hooks, suite.depth, reporter).await;
                }
                for child in &mut suite.suites {
                    run_suite(child, reporter).await;
                }
                if let Err(failure) = run_hook(suite.hooks.after_all.as_ref()).await {
                    reporter.hook_failure(suite, "after_all", &failure);
                    fail_clean_cases(suite, Phase::AfterAll, &failure);
                    suite.after_all_error = Some(failure);
                }
            }
        }

        aggregate(suite);
        suite.stopped = Some(Instant::now());
        reporter.suite_footer(suite);
    }
    .boxed_local()
}

fn aggregate(suite: &mut Suite) {
    let (mut passed, mut failed) = (0, 0);
    for child in &suite.suites {
        passed += child.passed;
        failed += child.failed;
    }
    for case in &suite.cases {
        if case.passed() {
            passed += 1;
        } else {
            failed += 1;
        }
    }
    suite.passed = passed;
    suite.failed = failed;
}
