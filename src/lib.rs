//! # golden
//!
//! Golden-value assertions that can rewrite their own expected literal.
//!
//! ```ignore
//! use golden::expect;
//!
//! #[test]
//! fn shouts() {
//!     expect("hello", |s: &str| s.to_uppercase(), "");
//! }
//! ```
//!
//! Run the test once with `ACCEPT=1` and the empty literal above becomes
//! `"HELLO"` in the source file. Without `ACCEPT=1` a mismatch fails the
//! test with both values and a hint.
//!
//! ## Pipeline
//!
//! On a mismatch in accept mode:
//!
//!     1. [locate] turns the caller location (or a captured backtrace) into a
//!        [`CallSite`].
//!     2. [syntax] re-parses the file the call site points into.
//!     3. [matcher] finds the call on that line and checks that its last
//!        argument is a string literal.
//!     4. [rewrite] replaces that literal, and the [`DocumentStore`] saves it.
//!
//! [`Dispatcher`] drives the pipeline. Settings come from [`config`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod locate;
pub mod matcher;
pub mod rewrite;
pub mod store;
pub mod syntax;

use once_cell::sync::Lazy;

pub use crate::config::{Disambiguation, FlushPolicy, GoldenConfig, LocatorStrategy, Mode};
pub use crate::dispatch::{Dispatcher, Outcome};
pub use crate::error::{AcceptError, LocateError, Mismatch, RewriteError};
pub use crate::locate::{CallSite, CapturedStack};
pub use crate::store::{DocumentStore, FsStore, MemoryStore};

/// Process-wide dispatcher, configured from the environment on first use
static GLOBAL: Lazy<Dispatcher> = Lazy::new(Dispatcher::global);

/// Assert that `transform(input)` equals `expected`.
///
/// With `ACCEPT=1` a mismatch rewrites `expected` in the calling source file
/// and the assertion passes. Otherwise a mismatch panics.
#[track_caller]
#[inline(never)]
pub fn expect<T, F>(input: T, transform: F, expected: &str) -> Outcome
where
    F: FnOnce(T) -> String,
{
    match dispatch::run_assertion!(&*GLOBAL, input, transform, expected, "expect") {
        Ok(outcome) => outcome,
        Err(mismatch) => panic!("{}", mismatch),
    }
}
