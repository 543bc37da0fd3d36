// vim: tw=80
//! Session-wide settings.

use crate::times::Times;

/// Settings for a [`Session`](crate::Session).
///
/// ```
/// use replaymock::{Config, Session, Times};
///
/// let session = Session::with_config(Config::default()
///     .verification_times(Times::once())
///     .verify_on_drop(true));
/// # session.checkpoint().unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) default_times: Times,
    pub(crate) non_strict_times: Times,
    pub(crate) verification_times: Times,
    pub(crate) verify_on_drop: bool,
    pub(crate) max_listed_invocations: usize
}

impl Config {
    /// Cardinality of strict expectations that don't state one.
    pub fn default_times<T: Into<Times>>(mut self, t: T) -> Self {
        self.default_times = t.into();
        self
    }

    /// Cardinality of non-strict expectations that don't state one.  By
    /// default they must be called at least once.
    pub fn non_strict_times<T: Into<Times>>(mut self, t: T) -> Self {
        self.non_strict_times = t.into();
        self
    }

    /// Cardinality of verified expectations that don't state one.
    pub fn verification_times<T: Into<Times>>(mut self, t: T) -> Self {
        self.verification_times = t.into();
        self
    }

    /// Check that every recorded expectation was satisfied when the session
    /// is dropped, and panic if not.
    pub fn verify_on_drop(mut self, verify: bool) -> Self {
        self.verify_on_drop = verify;
        self
    }

    /// How many near-miss invocations a missing invocation error lists.
    pub fn max_listed_invocations(mut self, n: usize) -> Self {
        self.max_listed_invocations = n;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_times: Times::once(),
            non_strict_times: Times::at_least(1),
            verification_times: Times::at_least(1),
            verify_on_drop: false,
            max_listed_invocations: 10
        }
    }
}
