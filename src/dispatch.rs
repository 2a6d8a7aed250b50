//! Assertion dispatcher
//!
//! A [`Dispatcher`] owns the mode, the locator and matcher settings, and the
//! [`DocumentStore`] rewrites go through. In verify mode a mismatch is a
//! plain failure. In accept mode the dispatcher locates the failing call,
//! re-parses its file, and replaces the expected literal with the actual
//! value, either right away or on [`Dispatcher::flush`].
//!
//! The test harness runs assertions from many threads, often through
//! several dispatchers at once. Accept cycles are serialized by the store's
//! [`ShiftLedger`](crate::rewrite::ShiftLedger), which is held from reading
//! a file until it has been written back. The same ledger maps call sites
//! past rewrites made by any dispatcher on that store.

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ::config::ConfigError;

use crate::config::{load_project, Disambiguation, FlushPolicy, GoldenConfig, LocatorStrategy, Mode};
use crate::error::{AcceptError, LocateError, Mismatch, RewriteError};
use crate::locate::{locate, CallSite, CapturedStack};
use crate::matcher::find_rewrite_targets;
use crate::rewrite::{apply_edits, back_to_front, translate, Edit, Shifts};
use crate::store::{DocumentStore, FsStore};
use crate::syntax::SourceDocument;

/// Result of a golden assertion that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Actual and expected values were equal
    Matched,
    /// The expected literal was rewritten and saved
    Accepted { site: CallSite, rewrites: usize },
    /// The rewrite was validated and queued for [`Dispatcher::flush`]
    Deferred { site: CallSite },
}

/// Where the failing call came from, as captured by an entry point
#[derive(Debug, Clone)]
pub(crate) enum CallOrigin {
    Caller(&'static Location<'static>),
    Stack(CapturedStack),
}

impl CallOrigin {
    fn call_site(&self) -> Result<CallSite, LocateError> {
        match self {
            CallOrigin::Caller(location) => CallSite::from_location(location),
            CallOrigin::Stack(stack) => locate(stack),
        }
    }
}

/// Run one assertion inside a `#[track_caller]`, `#[inline(never)]` entry
/// point. The origin is captured in the entry point's own frame, which keeps
/// the backtrace offset of the caller fixed.
macro_rules! run_assertion {
    ($dispatcher:expr, $input:expr, $transform:expr, $expected:expr, $callee:expr) => {{
        let dispatcher = $dispatcher;
        let expected: &str = $expected;
        let actual: String = ($transform)($input);
        if actual == expected {
            Ok($crate::dispatch::Outcome::Matched)
        } else {
            let origin = match dispatcher.mode() {
                $crate::config::Mode::Verify => None,
                $crate::config::Mode::Accept => Some(match dispatcher.locator() {
                    $crate::config::LocatorStrategy::Caller => {
                        $crate::dispatch::CallOrigin::Caller(::std::panic::Location::caller())
                    }
                    $crate::config::LocatorStrategy::Backtrace => {
                        $crate::dispatch::CallOrigin::Stack(
                            $crate::locate::CapturedStack::capture(),
                        )
                    }
                }),
            };
            dispatcher.settle(actual, expected, origin, $callee)
        }
    }};
}

pub(crate) use run_assertion;

/// A rewrite waiting for [`Dispatcher::flush`]
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRewrite {
    site: CallSite,
    callee: String,
    value: String,
}

type PendingQueue = BTreeMap<PathBuf, Vec<PendingRewrite>>;

/// Runs golden assertions against one [`DocumentStore`].
///
/// With [`FlushPolicy::Deferred`] rewrites are only saved by
/// [`Dispatcher::flush`] or when the dispatcher is dropped. A deferred
/// dispatcher that is never dropped, such as one kept in a `static` or
/// passed to `std::mem::forget`, loses its queued rewrites. A flush that
/// fails on drop panics, unless the thread is already panicking.
pub struct Dispatcher<S: DocumentStore = FsStore> {
    mode: Mode,
    locator: LocatorStrategy,
    disambiguation: Disambiguation,
    flush: FlushPolicy,
    accept_env: String,
    store: S,
    pending: Mutex<PendingQueue>,
}

impl Dispatcher<FsStore> {
    /// Default settings on the real file system
    pub fn new(mode: Mode) -> Self {
        Self::with_store(mode, &GoldenConfig::default(), FsStore)
    }

    /// Settings from `config`, mode from the process environment
    pub fn from_config(config: &GoldenConfig) -> Self {
        Self::with_store(config.mode_from_env(), config, FsStore)
    }

    /// Project configuration (defaults, `golden.toml`, `GOLDEN_*`) and the
    /// accept toggle from the environment
    pub fn from_env() -> Self {
        Self::from_config(&load_config())
    }

    /// The process-wide dispatcher behind [`crate::expect`]
    pub(crate) fn global() -> Self {
        Self::global_from(load_config())
    }

    /// A static is never dropped, so the global dispatcher always saves
    /// rewrites immediately
    fn global_from(mut config: GoldenConfig) -> Self {
        if config.rewrite.flush != FlushPolicy::Immediate {
            tracing::warn!(
                flush = ?config.rewrite.flush,
                "the global dispatcher is never flushed; saving rewrites immediately"
            );
            config.rewrite.flush = FlushPolicy::Immediate;
        }
        Self::from_config(&config)
    }
}

fn load_config() -> GoldenConfig {
    config_or_defaults(load_project())
}

fn config_or_defaults(loaded: Result<GoldenConfig, ConfigError>) -> GoldenConfig {
    loaded.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "couldn't load golden configuration, using defaults");
        GoldenConfig::default()
    })
}

impl<S: DocumentStore> Dispatcher<S> {
    pub fn with_store(mode: Mode, config: &GoldenConfig, store: S) -> Self {
        Self {
            mode,
            locator: config.locator.strategy,
            disambiguation: config.matcher.disambiguation,
            flush: config.rewrite.flush,
            accept_env: config.accept.env.clone(),
            store,
            pending: Mutex::new(PendingQueue::new()),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn locator(&self) -> LocatorStrategy {
        self.locator
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Assert that `transform(input)` equals `expected`, panicking otherwise
    #[track_caller]
    #[inline(never)]
    pub fn evaluate<T, F>(&self, input: T, transform: F, expected: &str) -> Outcome
    where
        F: FnOnce(T) -> String,
    {
        match run_assertion!(self, input, transform, expected, "evaluate") {
            Ok(outcome) => outcome,
            Err(mismatch) => panic!("{}", mismatch),
        }
    }

    /// Like [`Dispatcher::evaluate`], but returns the mismatch instead of panicking
    #[track_caller]
    #[inline(never)]
    pub fn check<T, F>(&self, input: T, transform: F, expected: &str) -> Result<Outcome, Mismatch>
    where
        F: FnOnce(T) -> String,
    {
        run_assertion!(self, input, transform, expected, "check")
    }

    /// Turn a mismatch into a failure or, in accept mode, a rewrite
    pub(crate) fn settle(
        &self,
        actual: String,
        expected: &str,
        origin: Option<CallOrigin>,
        callee: &str,
    ) -> Result<Outcome, Mismatch> {
        let Some(origin) = origin else {
            let hint = format!("INFO: set {}=1 to accept the actual value", self.accept_env);
            return Err(Mismatch::new(actual, expected, hint));
        };

        let accepted = origin
            .call_site()
            .map_err(AcceptError::from)
            .and_then(|site| self.accept_at(site, callee, &actual));

        accepted.map_err(|reason| {
            tracing::warn!(callee, error = %reason, "couldn't accept the actual value");
            let hint = format!(
                "WARN: {}=1 is set but the expected value could not be rewritten:",
                self.accept_env
            );
            Mismatch::new(actual, expected, hint).with_reason(reason)
        })
    }

    /// Rewrite the last argument of the `callee(...)` call at `site` to `actual`
    pub fn accept_at(&self, site: CallSite, callee: &str, actual: &str) -> Result<Outcome, AcceptError> {
        let site = site.resolve(&self.store)?;
        let pending = PendingRewrite {
            site,
            callee: callee.to_string(),
            value: actual.to_string(),
        };

        match self.flush {
            FlushPolicy::Immediate => {
                let path = pending.site.path.clone();
                let mut shifts = self.store.ledger().lock();
                let rewrites = self.rewrite_file(&mut shifts, &path, std::slice::from_ref(&pending))?;
                tracing::info!(site = %pending.site, rewrites, "accepted actual value");
                Ok(Outcome::Accepted {
                    site: pending.site,
                    rewrites,
                })
            }
            FlushPolicy::Deferred => {
                let mut queued = self.lock();
                self.validate(&self.store.ledger().lock(), &pending)?;
                let site = pending.site.clone();
                let queue = queued.entry(site.path.clone()).or_default();
                if queue.iter().any(|existing| existing.site == site) {
                    tracing::warn!(site = %site, "a rewrite for this call is already pending; keeping the first value");
                } else {
                    tracing::debug!(site = %site, "queued rewrite");
                    queue.push(pending);
                }
                Ok(Outcome::Deferred { site })
            }
        }
    }

    /// Save all queued rewrites, one read and one write per file. Returns the
    /// number of literals rewritten.
    pub fn flush(&self) -> Result<usize, RewriteError> {
        let pending = std::mem::take(&mut *self.lock());

        let mut total = 0;
        let mut first_error = None;
        for (path, rewrites) in pending {
            let mut shifts = self.store.ledger().lock();
            match self.rewrite_file(&mut shifts, &path, &rewrites) {
                Ok(count) => total += count,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "couldn't save pending rewrites");
                    if first_error.is_none() {
                        first_error = Some(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(total),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingQueue> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_document(&self, path: &Path) -> Result<SourceDocument, RewriteError> {
        let source = self.store.read(path).map_err(|err| RewriteError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        SourceDocument::parse(path, source).map_err(|err| RewriteError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// `site` as it is in the current file, after earlier rewrites moved text
    fn current_site(shifts: &Shifts, site: &CallSite) -> CallSite {
        let recorded = shifts.get(&site.path).map(Vec::as_slice).unwrap_or(&[]);
        let (line, column) = translate(recorded, site.line, site.column);
        CallSite {
            line,
            column,
            ..site.clone()
        }
    }

    /// Dry run of a rewrite against the current file
    fn validate(&self, shifts: &Shifts, pending: &PendingRewrite) -> Result<(), RewriteError> {
        let document = self.read_document(&pending.site.path)?;
        let site = Self::current_site(shifts, &pending.site);
        find_rewrite_targets(&document, &site, &pending.callee, self.disambiguation).map(|_| ())
    }

    fn rewrite_file(
        &self,
        shifts: &mut Shifts,
        path: &Path,
        rewrites: &[PendingRewrite],
    ) -> Result<usize, RewriteError> {
        let document = self.read_document(path)?;

        let mut edits: Vec<Edit> = Vec::new();
        for pending in rewrites {
            let site = Self::current_site(shifts, &pending.site);
            let targets = find_rewrite_targets(&document, &site, &pending.callee, self.disambiguation)?;
            for target in &targets {
                let edit = Edit::replace(target, &pending.value);
                if !edits.contains(&edit) {
                    edits.push(edit);
                }
            }
        }

        let rewritten = apply_edits(path, document.source(), &edits)?;
        if rewritten == document.source() {
            tracing::debug!(path = %path.display(), "literals already up to date");
            return Ok(edits.len());
        }

        self.store.write(path, &rewritten).map_err(|err| RewriteError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

        let recorded = shifts.entry(path.to_path_buf()).or_default();
        for edit in back_to_front(&edits) {
            tracing::debug!(
                path = %path.display(),
                line = edit.start.display_line(),
                lines = edit.line_delta(document.source()),
                "replaced literal"
            );
            recorded.push(edit.shift());
        }
        tracing::info!(path = %path.display(), rewrites = edits.len(), "saved rewritten source");

        Ok(edits.len())
    }
}

impl<S: DocumentStore> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::error!(error = %err, "deferred golden rewrites were not saved");
            if std::thread::panicking() {
                eprintln!("golden: deferred rewrites were not saved: {}", err);
            } else {
                panic!("golden: deferred rewrites were not saved: {}", err);
            }
        }
    }
}

impl<S: DocumentStore> std::fmt::Debug for Dispatcher<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("mode", &self.mode)
            .field("locator", &self.locator)
            .field("disambiguation", &self.disambiguation)
            .field("flush", &self.flush)
            .finish_non_exhaustive()
    }
}
