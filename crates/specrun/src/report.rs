//! Colored, indented tree output.
//!
//! ```text
//! root
//!   Calculator
//!   ✓ adds two numbers (0ms)
//!   ✗ divides (1ms)
//!     Error: body: panicked: attempt to divide by zero
//!   Calculator (1ms)
//! root (2ms)
//! Passed: 1 of 2, Failed: 1 (2 ms)
//! ```

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::Duration;

use crate::error::Failure;
use crate::tree::{Case, Suite};

// ============================================================================
// ANSI color helpers
// ============================================================================

#[derive(Clone, Copy)]
struct Palette {
    enabled: bool,
}

impl Palette {
    fn paint(self, code: &str, s: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{s}\x1b[0m")
        } else {
            s.to_string()
        }
    }

    fn green(self, s: &str) -> String {
        self.paint("32", s)
    }

    fn red(self, s: &str) -> String {
        self.paint("31", s)
    }

    fn blue(self, s: &str) -> String {
        self.paint("34", s)
    }

    fn bold(self, s: &str) -> String {
        self.paint("1", s)
    }

    fn dim(self, s: &str) -> String {
        self.paint("2", s)
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn millis(d: Option<Duration>) -> u128 {
    d.map(|d| d.as_millis()).unwrap_or(0)
}

// ============================================================================
// Reporter
// ============================================================================

/// Writes report lines to a sink. Write errors are logged, never fatal.
pub struct Reporter {
    out: Box<dyn Write>,
    palette: Palette,
}

impl Reporter {
    pub fn new(out: impl Write + 'static, color: bool) -> Self {
        Reporter {
            out: Box::new(out),
            palette: Palette { enabled: color },
        }
    }

    pub fn stdout(color: bool) -> Self {
        Reporter::new(io::stdout(), color)
    }

    fn line(&mut self, depth: usize, text: &str) {
        if let Err(err) = writeln!(self.out, "{}{text}", indent(depth)) {
            tracing::warn!(%err, "failed to write report line");
        }
    }

    fn suite_title(&self, suite: &Suite, text: &str) -> String {
        if suite.depth == 0 {
            self.palette.bold(text)
        } else {
            self.palette.blue(text)
        }
    }

    pub(crate) fn suite_header(&mut self, suite: &Suite) {
        let text = self.suite_title(suite, &suite.title);
        self.line(suite.depth, &text);
    }

    pub(crate) fn suite_footer(&mut self, suite: &Suite) {
        let text = format!("{} ({}ms)", suite.title, millis(suite.elapsed()));
        let text = self.suite_title(suite, &text);
        self.line(suite.depth, &text);
    }

    /// A child suite that never ran because an ancestor's `before_all` failed.
    pub(crate) fn suite_skipped(&mut self, suite: &Suite) {
        let text = self.palette.dim(&format!("{} (skipped)", suite.title));
        self.line(suite.depth, &text);
    }

    /// A suite-level hook failure that was applied to the suite's own cases.
    pub(crate) fn hook_failure(&mut self, suite: &Suite, hook: &str, failure: &Failure) {
        let text = self.palette.red(&format!("{hook} failed: {failure}"));
        self.line(suite.depth, &text);
        self.causes(suite.depth + 1, failure);
    }

    pub(crate) fn case(&mut self, depth: usize, case: &Case) {
        let timing = if case.ran() {
            format!("{}ms", millis(case.elapsed()))
        } else {
            "not run".to_string()
        };

        match &case.failure {
            None => {
                let text = self.palette.green(&format!("✓ {} ({timing})", case.title));
                self.line(depth, &text);
            }
            Some(failure) => {
                let text = self.palette.red(&format!("✗ {} ({timing})", case.title));
                self.line(depth, &text);
                let detail = self.palette.red(&format!("Error: {failure}"));
                self.line(depth + 1, &detail);
                self.causes(depth + 2, &failure.failure);
            }
        }
    }

    fn causes(&mut self, depth: usize, failure: &Failure) {
        for cause in failure.causes() {
            let text = self.palette.red(&format!("caused by: {cause}"));
            self.line(depth, &text);
        }
    }

    pub(crate) fn summary(&mut self, root: &Suite, elapsed: Duration) {
        let passed = format!("Passed: {} of {}", root.passed, root.count);
        let passed = if root.passed == root.count {
            self.palette.green(&passed)
        } else {
            self.palette.blue(&passed)
        };
        let failed = format!("Failed: {}", root.failed);
        let failed = if root.failed > 0 {
            self.palette.red(&failed)
        } else {
            failed
        };
        let text = format!("{passed}, {failed} ({} ms)", elapsed.as_millis());
        self.line(0, &text);
        if let Err(err) = self.out.flush() {
            tracing::warn!(%err, "failed to flush report");
        }
    }
}

// ============================================================================
// Capture: in-memory sink
// ============================================================================

/// A cloneable in-memory sink; every clone appends to the same buffer.
///
/// ```rust
/// use std::io::Write;
///
/// let capture = specrun::report::Capture::default();
/// let mut sink = capture.clone();
/// writeln!(sink, "hello").unwrap();
/// assert_eq!(capture.contents(), "hello\n");
/// ```
#[derive(Clone, Default)]
pub struct Capture {
    buf: Rc<RefCell<Vec<u8>>>,
}

impl Capture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.borrow()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for Capture {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.borrow_mut().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
