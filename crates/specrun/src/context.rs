//! Declaration API: `Context`, `CaseBuilder`, `HookBuilder`, `build()` and `run()`.

use std::future::Future;
use std::time::Duration;

use crate::config::RunConfig;
use crate::error::{BoxError, DeclarationError, HookKind};
use crate::runner::Runner;
use crate::step::{Done, Step};
use crate::tree::{Case, Hook, Suite};

// ============================================================================
// Context: the build context threaded through declaration closures
// ============================================================================

/// Builds the suite tree while declaration closures run.
///
/// Every `describe` makes its suite the open one for the duration of its
/// closure; cases and hooks attach to whichever suite is open.
///
/// ```rust,no_run
/// let root = specrun::Context::root("math", std::time::Duration::from_secs(5))
///     .declare(|ctx| {
///         ctx.describe("Calculator", |ctx| {
///             ctx.it("adds", || assert_eq!(2 + 3, 5));
///         });
///     })
///     .finish()
///     .expect("valid declarations");
/// assert_eq!(root.count(), 1);
/// ```
pub struct Context {
    root: Suite,
    open: Vec<Suite>,
    errors: Vec<DeclarationError>,
}

impl Context {
    /// A fresh build context whose root suite has `default_timeout`.
    pub fn root(title: impl Into<String>, default_timeout: Duration) -> Self {
        Context {
            root: Suite::new(title.into(), 0, default_timeout),
            open: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Context::root(config.root_title.clone(), config.default_timeout)
    }

    /// Run `body` against the root suite and hand the context back.
    pub fn declare(mut self, body: impl FnOnce(&mut Context)) -> Self {
        body(&mut self);
        self
    }

    /// The finished tree, or the first declaration error.
    pub fn finish(mut self) -> Result<Suite, DeclarationError> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0));
        }
        // Closures always return before `finish`, so every describe has popped.
        debug_assert!(self.open.is_empty(), "specrun: unbalanced describe nesting");
        Ok(self.root)
    }

    /// Declaration errors recorded so far.
    pub fn errors(&self) -> &[DeclarationError] {
        &self.errors
    }

    fn current(&mut self) -> &mut Suite {
        self.open.last_mut().unwrap_or(&mut self.root)
    }

    // ---- Describe -------------------------------------------------------------

    pub fn describe(&mut self, title: &str, body: impl FnOnce(&mut Context)) {
        self.describe_impl(title, None, body);
    }

    /// Like [`describe`](Self::describe), with a timeout inherited by everything
    /// declared inside.
    pub fn describe_with_timeout(&mut self, title: &str, timeout_ms: u64, body: impl FnOnce(&mut Context)) {
        self.describe_impl(title, Some(Duration::from_millis(timeout_ms)), body);
    }

    pub fn context(&mut self, title: &str, body: impl FnOnce(&mut Context)) {
        self.describe(title, body);
    }

    fn describe_impl(&mut self, title: &str, timeout: Option<Duration>, body: impl FnOnce(&mut Context)) {
        let parent = self.current();
        let suite = Suite::new(
            title.to_string(),
            parent.depth + 1,
            timeout.unwrap_or(parent.timeout),
        );
        tracing::debug!(suite = title, depth = suite.depth, "declaring suite");

        self.open.push(suite);
        body(self);

        if let Some(suite) = self.open.pop() {
            let parent = self.current();
            parent.count += suite.count;
            parent.suites.push(suite);
        }
    }

    // ---- Cases ----------------------------------------------------------------

    /// Declare a case with an explicit [`Step`]. Registered when the returned
    /// builder is dropped.
    pub fn case(&mut self, title: &str, body: Step) -> CaseBuilder<'_> {
        CaseBuilder {
            ctx: self,
            title: title.to_string(),
            body: Some(body),
            timeout: None,
        }
    }

    /// Declare a synchronous case.
    ///
    /// ```rust,no_run
    /// # let ctx = &mut specrun::Context::root("", std::time::Duration::from_secs(5));
    /// ctx.it("works", || assert!(true));
    /// ctx.it("slow", || std::thread::sleep(std::time::Duration::from_millis(5)))
    ///     .timeout(50);
    /// ctx.it("later", || todo!());
    /// ```
    pub fn it<F>(&mut self, title: &str, body: F) -> CaseBuilder<'_>
    where
        F: Fn() + 'static,
    {
        self.case(title, Step::sync(body))
    }

    pub fn test<F>(&mut self, title: &str, body: F) -> CaseBuilder<'_>
    where
        F: Fn() + 'static,
    {
        self.it(title, body)
    }

    /// Declare a synchronous case that fails with the error it returns.
    ///
    /// ```rust,no_run
    /// # let ctx = &mut specrun::Context::root("", std::time::Duration::from_secs(5));
    /// ctx.it_result("parses", || -> Result<(), std::num::ParseIntError> {
    ///     assert_eq!("42".parse::<u32>()?, 42);
    ///     Ok(())
    /// });
    /// ```
    pub fn it_result<F, E>(&mut self, title: &str, body: F) -> CaseBuilder<'_>
    where
        F: Fn() -> Result<(), E> + 'static,
        E: Into<BoxError>,
    {
        self.case(title, Step::try_sync(body))
    }

    /// Declare a case whose body returns a future.
    pub fn it_async<F, Fut>(&mut self, title: &str, body: F) -> CaseBuilder<'_>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.case(title, Step::future(body))
    }

    /// Declare a case whose future fails with the error it resolves to.
    pub fn it_async_result<F, Fut, E>(&mut self, title: &str, body: F) -> CaseBuilder<'_>
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<(), E>> + 'static,
        E: Into<BoxError>,
    {
        self.case(title, Step::try_future(body))
    }

    /// Declare a case that signals completion through a [`Done`] handle.
    pub fn it_done<F>(&mut self, title: &str, body: F) -> CaseBuilder<'_>
    where
        F: Fn(Done) + 'static,
    {
        self.case(title, Step::callback(body))
    }

    // ---- Hooks ----------------------------------------------------------------

    pub fn before_all(&mut self, step: Step) -> HookBuilder<'_> {
        self.hook(HookKind::BeforeAll, step)
    }

    pub fn after_all(&mut self, step: Step) -> HookBuilder<'_> {
        self.hook(HookKind::AfterAll, step)
    }

    pub fn before_each(&mut self, step: Step) -> HookBuilder<'_> {
        self.hook(HookKind::BeforeEach, step)
    }

    pub fn after_each(&mut self, step: Step) -> HookBuilder<'_> {
        self.hook(HookKind::AfterEach, step)
    }

    /// Declare a hook of `kind` on the open suite.
    pub fn hook(&mut self, kind: HookKind, step: Step) -> HookBuilder<'_> {
        HookBuilder {
            ctx: self,
            kind,
            step: Some(step),
            timeout: None,
        }
    }

    fn register_case(&mut self, title: String, body: Step, timeout: Option<Duration>) {
        let suite = self.current();
        let timeout = effective_timeout(timeout, suite.timeout);
        suite.cases.push(Case::new(title, body, timeout));
        suite.count += 1;
    }

    fn register_hook(&mut self, kind: HookKind, step: Step, timeout: Option<Duration>) {
        let suite = self.current();
        if suite.hooks.has(kind) {
            let err = DeclarationError::DuplicateHook {
                suite: suite.title.clone(),
                kind,
            };
            tracing::debug!(%err, "rejected hook");
            self.errors.push(err);
            return;
        }
        let timeout = effective_timeout(timeout, suite.timeout);
        *suite.hooks.slot(kind) = Some(Hook { step, timeout });
    }
}

/// A zero override falls back to the suite timeout.
fn effective_timeout(requested: Option<Duration>, inherited: Duration) -> Duration {
    match requested {
        Some(t) if !t.is_zero() => t,
        _ => inherited,
    }
}

// ============================================================================
// CaseBuilder / HookBuilder: register on Drop
// ============================================================================

/// Returned by [`Context::it`] and friends; registers the case when dropped.
pub struct CaseBuilder<'a> {
    ctx: &'a mut Context,
    title: String,
    body: Option<Step>,
    timeout: Option<Duration>,
}

impl CaseBuilder<'_> {
    /// Fail the case if its body has not completed within `ms` milliseconds.
    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(ms));
        self
    }
}

impl Drop for CaseBuilder<'_> {
    fn drop(&mut self) {
        if let Some(body) = self.body.take() {
            let title = std::mem::take(&mut self.title);
            self.ctx.register_case(title, body, self.timeout);
        }
    }
}

/// Returned by the hook methods of [`Context`]; registers the hook when dropped.
pub struct HookBuilder<'a> {
    ctx: &'a mut Context,
    kind: HookKind,
    step: Option<Step>,
    timeout: Option<Duration>,
}

impl HookBuilder<'_> {
    /// Fail the hook if it has not completed within `ms` milliseconds.
    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(Duration::from_millis(ms));
        self
    }
}

impl Drop for HookBuilder<'_> {
    fn drop(&mut self) {
        if let Some(step) = self.step.take() {
            self.ctx.register_hook(self.kind, step, self.timeout);
        }
    }
}

/// Build a tree from `body` using the root title and timeout in `config`.
pub fn build(config: &RunConfig, body: impl FnOnce(&mut Context)) -> Result<Suite, DeclarationError> {
    Context::from_config(config).declare(body).finish()
}

// ============================================================================
// run(): entry point
// ============================================================================

/// Build and run a test tree, then exit the process.
///
/// This is the main entry point. Call it from `fn main()` in a test target
/// with `harness = false`. Exit code: 0 when every case passed, 1 when any
/// failed, 2 when the configuration or the declarations are invalid (nothing
/// runs in that case).
///
/// # Example
///
/// ```rust,no_run
/// fn main() {
///     specrun::run(|ctx| {
///         ctx.describe("Calculator", |ctx| {
///             ctx.it("adds", || assert_eq!(2 + 3, 5));
///         });
///     });
/// }
/// ```
pub fn run(body: impl FnOnce(&mut Context)) {
    crate::logging::init();

    let config = match RunConfig::from_args() {
        Ok(config) => config,
        Err(err) => fatal(&err),
    };

    // Phase 1: build the tree
    let root = match build(&config, body) {
        Ok(root) => root,
        Err(err) => fatal(&err),
    };

    // Phase 2: execute the tree
    match Runner::new(&config).execute(root) {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(err) => fatal(&err),
    }
}

fn fatal(err: &dyn std::error::Error) -> ! {
    tracing::error!(%err, "aborting before execution");
    eprintln!("specrun: {err}");
    std::process::exit(2);
}
