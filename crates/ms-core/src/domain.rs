//! Per-unit isolation boundary
//!
//! Every callback that belongs to an automation unit (top-level code, topic
//! handlers, conditions, schedules, timers, spawned futures) is executed
//! through that unit's [`UnitDomain`]. Errors and panics are caught here,
//! reported with the unit's identity and swallowed, so nothing raised inside a
//! unit reaches the process or any other unit.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::error;

/// Frames at which a trace stops: everything past them is invocation plumbing.
const TRACE_STOP_MARKERS: &[&str] = &["ms_core::domain::", "std::panicking::", "std::panic::"];

/// Frames dropped wherever they appear
const TRACE_SKIP_MARKERS: &[&str] = &[
    "anyhow::",
    "std::backtrace",
    "core::ops::function::",
    "__rust_",
    "rust_begin_unwind",
    "core::panicking::",
];

struct DomainInner {
    name: String,
    errors: AtomicU64,
}

/// The isolation boundary of one automation unit
///
/// Cheap to clone; clones share the name and error counter.
#[derive(Clone)]
pub struct UnitDomain {
    inner: Arc<DomainInner>,
}

impl UnitDomain {
    /// Create a domain for the unit with the given identity
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(DomainInner {
                name: name.into(),
                errors: AtomicU64::new(0),
            }),
        }
    }

    /// The owning unit's identity
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of errors caught at this boundary so far
    pub fn error_count(&self) -> u64 {
        self.inner.errors.load(Ordering::SeqCst)
    }

    /// Run a fallible callback inside the boundary
    ///
    /// Returns `true` if the callback completed without error or panic.
    pub fn run<F>(&self, origin: &str, f: F) -> bool
    where
        F: FnOnce() -> anyhow::Result<()>,
    {
        self.eval(origin, f).is_some()
    }

    /// Run a callback producing a value inside the boundary
    ///
    /// Returns `None` if the callback failed or panicked.
    pub fn eval<T, F>(&self, origin: &str, f: F) -> Option<T>
    where
        F: FnOnce() -> anyhow::Result<T>,
    {
        match std::panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.report(origin, &err);
                None
            }
            Err(panic) => {
                self.report_panic(origin, panic);
                None
            }
        }
    }

    /// Spawn an asynchronous task inside the boundary
    pub fn spawn<Fut>(&self, origin: &'static str, fut: Fut) -> JoinHandle<()>
    where
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let domain = self.clone();
        tokio::spawn(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => domain.report(origin, &err),
                Err(panic) => domain.report_panic(origin, panic),
            }
        })
    }

    /// Report an error caught at this boundary
    pub fn report(&self, origin: &str, err: &anyhow::Error) {
        self.inner.errors.fetch_add(1, Ordering::SeqCst);
        let name = self.name();
        error!(unit = %name, origin, "{}: {:#}", name, err);

        let debug = format!("{:?}", err);
        if let Some((_, trace)) = debug.split_once("Stack backtrace:") {
            for line in clean_trace(trace) {
                error!(unit = %name, origin, "{}: {}", name, line);
            }
        }
    }

    fn report_panic(&self, origin: &str, panic: Box<dyn Any + Send>) {
        self.inner.errors.fetch_add(1, Ordering::SeqCst);
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown exception".to_string());
        let name = self.name();
        error!(unit = %name, origin, "{}: panicked: {}", name, message);
    }
}

impl std::fmt::Debug for UnitDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitDomain")
            .field("name", &self.inner.name)
            .field("errors", &self.error_count())
            .finish()
    }
}

/// Strip the engine's own invocation frames from a rendered backtrace
///
/// Frames are kept in order until the first frame of the boundary plumbing;
/// error-construction frames are dropped wherever they appear. Each frame's
/// `at file:line` continuation line follows its frame.
pub fn clean_trace(trace: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut skipping = false;

    for line in trace.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if is_frame_header(trimmed) {
            if TRACE_STOP_MARKERS.iter().any(|m| trimmed.contains(m)) {
                break;
            }
            skipping = TRACE_SKIP_MARKERS.iter().any(|m| trimmed.contains(m));
        }

        if !skipping {
            lines.push(trimmed.to_string());
        }
    }

    lines
}

fn is_frame_header(line: &str) -> bool {
    line.split_once(':')
        .map(|(idx, _)| !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
