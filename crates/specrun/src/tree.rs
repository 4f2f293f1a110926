//! The suite/case tree built at declaration time and filled in by the runner.

use std::time::{Duration, Instant};

use crate::error::{CaseFailure, Failure, HookKind, Phase};
use crate::step::Step;

/// A registered hook with its effective timeout.
#[derive(Debug)]
pub(crate) struct Hook {
    pub(crate) step: Step,
    pub(crate) timeout: Duration,
}

#[derive(Debug, Default)]
pub(crate) struct Hooks {
    pub(crate) before_all: Option<Hook>,
    pub(crate) after_all: Option<Hook>,
    pub(crate) before_each: Option<Hook>,
    pub(crate) after_each: Option<Hook>,
}

impl Hooks {
    pub(crate) fn slot(&mut self, kind: HookKind) -> &mut Option<Hook> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::AfterAll => &mut self.after_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
        }
    }

    pub(crate) fn has(&self, kind: HookKind) -> bool {
        match kind {
            HookKind::BeforeAll => self.before_all.is_some(),
            HookKind::AfterAll => self.after_all.is_some(),
            HookKind::BeforeEach => self.before_each.is_some(),
            HookKind::AfterEach => self.after_each.is_some(),
        }
    }
}

/// A single test case.
#[derive(Debug)]
pub struct Case {
    pub(crate) title: String,
    pub(crate) body: Step,
    pub(crate) timeout: Duration,
    pub(crate) started: Option<Instant>,
    pub(crate) stopped: Option<Instant>,
    pub(crate) failure: Option<CaseFailure>,
}

impl Case {
    pub(crate) fn new(title: String, body: Step, timeout: Duration) -> Self {
        Case {
            title,
            body,
            timeout,
            started: None,
            stopped: None,
            failure: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The first failure recorded for this case, if any.
    pub fn failure(&self) -> Option<&CaseFailure> {
        self.failure.as_ref()
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// Whether the body was actually executed (false for cases failed by `before_all`).
    pub fn ran(&self) -> bool {
        self.started.is_some()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        elapsed(self.started, self.stopped)
    }

    /// Record `failure` unless an earlier one is already present.
    pub(crate) fn fail_if_clean(&mut self, phase: Phase, failure: &Failure) {
        if self.failure.is_none() {
            self.failure = Some(CaseFailure::new(phase, failure.clone()));
        }
    }
}

/// A named group of cases and nested suites.
#[derive(Debug)]
pub struct Suite {
    pub(crate) title: String,
    pub(crate) depth: usize,
    pub(crate) timeout: Duration,
    pub(crate) hooks: Hooks,
    pub(crate) cases: Vec<Case>,
    pub(crate) suites: Vec<Suite>,
    pub(crate) count: usize,
    pub(crate) passed: usize,
    pub(crate) failed: usize,
    pub(crate) started: Option<Instant>,
    pub(crate) stopped: Option<Instant>,
    pub(crate) before_all_error: Option<Failure>,
    pub(crate) after_all_error: Option<Failure>,
}

impl Suite {
    pub(crate) fn new(title: String, depth: usize, timeout: Duration) -> Self {
        Suite {
            title,
            depth,
            timeout,
            hooks: Hooks::default(),
            cases: Vec::new(),
            suites: Vec::new(),
            count: 0,
            passed: 0,
            failed: 0,
            started: None,
            stopped: None,
            before_all_error: None,
            after_all_error: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Nesting level; the root is 0.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Own cases plus every descendant's.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn has_hook(&self, kind: HookKind) -> bool {
        self.hooks.has(kind)
    }

    pub fn before_all_error(&self) -> Option<&Failure> {
        self.before_all_error.as_ref()
    }

    pub fn after_all_error(&self) -> Option<&Failure> {
        self.after_all_error.as_ref()
    }

    /// False for suites skipped because an ancestor's `before_all` failed.
    pub fn ran(&self) -> bool {
        self.started.is_some()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        elapsed(self.started, self.stopped)
    }

    /// Find a direct child suite by title.
    pub fn suite(&self, title: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.title == title)
    }

    /// Find a directly owned case by title.
    pub fn case(&self, title: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.title == title)
    }
}

fn elapsed(started: Option<Instant>, stopped: Option<Instant>) -> Option<Duration> {
    match (started, stopped) {
        (Some(start), Some(stop)) => Some(stop.saturating_duration_since(start)),
        _ => None,
    }
}
