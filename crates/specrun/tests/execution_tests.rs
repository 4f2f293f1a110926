use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context as _;
use pretty_assertions::assert_eq;
use rstest::rstest;
use specrun::report::{Capture, Reporter};
use specrun::{Context, DeclarationError, HookKind, Phase, RunOutcome, Runner, Step, Suite};

fn declare(body: impl FnOnce(&mut Context)) -> Suite {
    Context::root("root", Duration::from_millis(1000))
        .declare(body)
        .finish()
        .unwrap()
}

fn execute(root: Suite) -> (RunOutcome, Capture) {
    let capture = Capture::default();
    let outcome = Runner::with_reporter(Reporter::new(capture.clone(), false))
        .execute(root)
        .unwrap();
    (outcome, capture)
}

/// Recorder shared between closures; every clone appends to the same log.
#[derive(Clone, Default)]
struct Log(Rc<RefCell<Vec<String>>>);

impl Log {
    fn push(&self, entry: &str) {
        self.0.borrow_mut().push(entry.to_string());
    }

    fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    fn step(&self, entry: &'static str) -> Step {
        let log = self.clone();
        Step::sync(move || log.push(entry))
    }
}

fn check_totals(suite: &Suite) {
    assert_eq!(
        suite.passed() + suite.failed(),
        suite.count(),
        "totals of {}",
        suite.title()
    );
    for child in suite.suites() {
        check_totals(child);
    }
}

// ============================================================================
// Totals
// ============================================================================

#[test]
fn totals_add_up_in_every_suite() {
    let root = declare(|ctx| {
        ctx.it("top", || {});
        ctx.describe("mixed", |ctx| {
            ctx.it("passes", || {});
            ctx.it_result("fails", || -> Result<(), &'static str> { Err("nope") });
            ctx.describe("deep", |ctx| {
                ctx.it("panics", || panic!("deep panic"));
                ctx.it("passes too", || {});
            });
        });
        ctx.describe("broken setup", |ctx| {
            ctx.before_all(Step::try_sync(|| -> Result<(), &'static str> { Err("no setup") }));
            ctx.it("a", || {});
            ctx.it("b", || {});
        });
    });

    let (outcome, _) = execute(root);
    check_totals(&outcome.root);
    assert_eq!((outcome.passed(), outcome.failed(), outcome.count()), (3, 4, 7));
    assert_eq!(outcome.exit_code(), 1);
}

#[test]
fn sibling_suites_sum_into_parent() {
    let root = declare(|ctx| {
        ctx.describe("left", |ctx| {
            ctx.it("l1", || {});
            ctx.it("l2", || {});
        });
        ctx.describe("right", |ctx| {
            ctx.it("r1", || {});
            ctx.it("r2", || {});
        });
    });

    let (outcome, capture) = execute(root);
    assert_eq!((outcome.passed(), outcome.failed(), outcome.count()), (4, 0, 4));
    assert_eq!(outcome.exit_code(), 0);
    let summary = capture.lines().pop().unwrap();
    assert!(summary.starts_with("Passed: 4 of 4, Failed: 0 ("), "{summary}");
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn cases_and_hooks_run_in_declaration_order() {
    let log = Log::default();
    let root = declare({
        let log = log.clone();
        move |ctx: &mut Context| {
            ctx.describe("s", |ctx| {
                ctx.before_all(log.step("before_all"));
                ctx.before_each(log.step("before_each"));
                ctx.after_each(log.step("after_each"));
                ctx.after_all(log.step("after_all"));
                for title in ["a", "b", "c"] {
                    let log = log.clone();
                    ctx.it(title, move || log.push(title));
                }
                ctx.describe("child", |ctx| {
                    let log = log.clone();
                    ctx.it("d", move || log.push("d"));
                });
            });
        }
    });

    execute(root);
    assert_eq!(
        log.entries(),
        [
            "before_all",
            "before_each",
            "a",
            "after_each",
            "before_each",
            "b",
            "after_each",
            "before_each",
            "c",
            "after_each",
            "d",
            "after_all",
        ]
    );
}

// ============================================================================
// Declaration errors
// ============================================================================

#[test]
fn duplicate_before_each_is_rejected_before_anything_runs() {
    static RAN: AtomicU32 = AtomicU32::new(0);
    let err = Context::root("root", Duration::from_millis(1000))
        .declare(|ctx| {
            ctx.describe("db", |ctx| {
                ctx.before_each(Step::sync(|| {}));
                ctx.before_each(Step::sync(|| {}));
                ctx.it("never runs", || {
                    RAN.fetch_add(1, Ordering::SeqCst);
                });
            });
        })
        .finish()
        .unwrap_err();

    assert_eq!(
        err,
        DeclarationError::DuplicateHook {
            suite: "db".into(),
            kind: HookKind::BeforeEach,
        }
    );
    assert_eq!(err.to_string(), "suite \"db\" can only have a single before_each");
    assert_eq!(RAN.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Timeouts
// ============================================================================

#[test]
fn unsignalled_callback_times_out_and_run_continues() {
    let root = declare(|ctx| {
        ctx.describe("waiting", |ctx| {
            ctx.it_done("never signals", |_done| {}).timeout(50);
            ctx.it("runs afterwards", || {});
        });
    });

    let (outcome, capture) = execute(root);
    let waiting = outcome.root.suite("waiting").unwrap();
    let failure = waiting.case("never signals").unwrap().failure().unwrap();
    assert_eq!(failure.phase, Phase::Body);
    assert!(failure.failure.is_timeout());
    assert!(waiting.case("runs afterwards").unwrap().passed());
    assert!(capture.contents().contains("    Error: body: timed out after 50ms\n"));
}

#[test]
fn slow_hook_times_out_under_suite_limit() {
    let root = declare(|ctx| {
        ctx.describe_with_timeout("slow", 30, |ctx| {
            ctx.before_each(Step::future(|| tokio::time::sleep(Duration::from_millis(500))));
            ctx.it("starved", || {});
        });
    });

    let (outcome, _) = execute(root);
    let failure = outcome.root.suite("slow").unwrap().case("starved").unwrap().failure().unwrap();
    assert_eq!(failure.phase, Phase::BeforeEach);
    assert_eq!(failure.failure.to_string(), "timed out after 30ms");
}

// ============================================================================
// Hook failures
// ============================================================================

#[test]
fn failed_before_all_skips_every_body() {
    static BODIES: AtomicU32 = AtomicU32::new(0);
    let root = declare(|ctx| {
        ctx.describe("setup", |ctx| {
            ctx.before_all(Step::try_sync(|| -> Result<(), &'static str> { Err("database unreachable") }));
            ctx.it("one", || {
                BODIES.fetch_add(1, Ordering::SeqCst);
            });
            ctx.it("two", || {
                BODIES.fetch_add(1, Ordering::SeqCst);
            });
        });
    });

    let (outcome, capture) = execute(root);
    assert_eq!(BODIES.load(Ordering::SeqCst), 0);

    let setup = outcome.root.suite("setup").unwrap();
    assert_eq!(setup.before_all_error().unwrap().to_string(), "database unreachable");
    for case in setup.cases() {
        let failure = case.failure().unwrap();
        assert_eq!(failure.phase, Phase::BeforeAll);
        assert_eq!(failure.to_string(), "before_all: database unreachable");
        assert!(!case.ran());
    }
    let out = capture.contents();
    assert!(out.contains("  before_all failed: database unreachable\n"), "{out}");
    assert!(out.contains("  ✗ one (not run)\n"), "{out}");
}

#[test]
fn panicking_before_each_skips_body_and_after_each() {
    let log = Log::default();
    let root = declare({
        let log = log.clone();
        move |ctx: &mut Context| {
            ctx.describe("exploding", |ctx| {
                ctx.before_each(Step::sync(|| panic!("setup exploded")));
                ctx.after_each(log.step("after_each"));
                let body = log.clone();
                ctx.it("victim", move || body.push("body"));
            });
            ctx.describe("bystander", |ctx| {
                ctx.it("unaffected", || {});
            });
        }
    });

    let (outcome, _) = execute(root);
    assert!(log.entries().is_empty());

    let victim = outcome.root.suite("exploding").unwrap().case("victim").unwrap();
    let message = victim.failure().unwrap().to_string();
    assert!(message.starts_with("before_each: panicked at "), "{message}");
    assert!(message.contains("execution_tests.rs:"), "{message}");
    assert!(message.ends_with(": setup exploded"), "{message}");
    let bystander = outcome.root.suite("bystander").unwrap();
    assert_eq!((bystander.passed(), bystander.failed()), (1, 0));
}

// ============================================================================
// Failure sources
// ============================================================================

fn sync_error() -> Step {
    Step::try_sync(|| -> Result<(), &'static str> { Err("boom") })
}

fn future_error() -> Step {
    Step::try_future(|| async {
        tokio::task::yield_now().await;
        Err::<(), _>("boom")
    })
}

fn callback_error() -> Step {
    Step::callback(|done| {
        std::thread::spawn(move || done.fail("boom"));
    })
}

#[rstest]
#[case::sync(sync_error)]
#[case::future(future_error)]
#[case::callback(callback_error)]
fn every_style_reports_its_error(#[case] make: fn() -> Step) {
    let root = declare(|ctx| {
        ctx.case("failing", make());
    });

    let (outcome, capture) = execute(root);
    let failure = outcome.root.case("failing").unwrap().failure().unwrap();
    assert_eq!(failure.to_string(), "body: boom");
    assert!(capture.contents().contains("Error: body: boom\n"));
}

#[test]
fn unfinished_case_fails_with_its_location() {
    let root = declare(|ctx| {
        ctx.it("placeholder", || todo!());
        ctx.it_async("async placeholder", || async { panic!("not wired up") });
    });

    let (outcome, capture) = execute(root);
    assert_eq!((outcome.passed(), outcome.failed()), (0, 2));

    let failure = outcome.root.case("placeholder").unwrap().failure().unwrap();
    let message = failure.failure.to_string();
    assert!(message.starts_with("panicked at "), "{message}");
    assert!(message.ends_with(": not yet implemented"), "{message}");

    let line = capture
        .lines()
        .into_iter()
        .find(|l| l.starts_with("  Error: body: panicked at "))
        .unwrap();
    assert!(line.contains("execution_tests.rs:"), "{line}");
}

#[test]
fn async_bodies_can_use_network_io() {
    let root = declare(|ctx| {
        ctx.it_async_result("binds a socket", || async {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            let addr = listener.local_addr()?;
            let (client, accepted) = tokio::join!(tokio::net::TcpStream::connect(addr), listener.accept());
            client?;
            accepted?;
            Ok::<(), std::io::Error>(())
        });
    });

    let (outcome, capture) = execute(root);
    assert_eq!(outcome.failed(), 0, "{}", capture.contents());
    assert!(outcome.root.case("binds a socket").unwrap().passed());
}

#[test]
fn error_chain_is_printed() {
    let root = declare(|ctx| {
        ctx.describe("config", |ctx| {
            ctx.it_result("loads", || -> anyhow::Result<()> {
                Err::<(), _>(std::io::Error::new(std::io::ErrorKind::NotFound, "missing file"))
                    .context("reading settings")?;
                Ok(())
            });
        });
    });

    let (_, capture) = execute(root);
    let lines = capture.lines();
    let at = lines
        .iter()
        .position(|l| l.starts_with("  ✗ loads ("))
        .unwrap();
    assert_eq!(lines[at + 1], "    Error: body: reading settings");
    assert_eq!(lines[at + 2], "      caused by: missing file");
}

// ============================================================================
// DSL
// ============================================================================

#[test]
fn declare_macro_builds_the_same_tree() {
    let root = Context::root("dsl", Duration::from_millis(1000))
        .declare(specrun::declare! {
            describe "math" timeout(200) {
                before_each { }
                it "adds" { assert_eq!(1 + 1, 2); }
                it "parses" try {
                    assert_eq!("7".parse::<u8>()?, 7);
                    Ok(())
                }
                it "waits" async timeout(50) {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
                context "callbacks" {
                    test "signals" |done| { done.ok(); }
                }
            }
        })
        .finish()
        .unwrap();

    let math = root.suite("math").unwrap();
    assert_eq!(math.timeout(), Duration::from_millis(200));
    assert!(math.has_hook(HookKind::BeforeEach));
    assert_eq!(math.case("waits").unwrap().timeout(), Duration::from_millis(50));
    assert_eq!(root.count(), 4);

    let (outcome, _) = execute(root);
    assert_eq!((outcome.passed(), outcome.failed()), (4, 0));
}
