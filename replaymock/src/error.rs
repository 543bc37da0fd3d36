// vim: tw=80
//! Failures reported by replay and verification.

use thiserror::Error;

use crate::log::ObservedInvocation;

/// Everything that can go wrong in a record, replay, verify cycle.
#[derive(Clone, Debug, Error)]
pub enum Error {
    #[error(transparent)]
    UnexpectedInvocation(#[from] UnexpectedInvocation),
    #[error(transparent)]
    MissingInvocation(#[from] MissingInvocation),
    #[error(transparent)]
    Misuse(#[from] Misuse),
}

impl Error {
    pub fn is_unexpected(&self) -> bool {
        matches!(self, Error::UnexpectedInvocation(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Error::MissingInvocation(_))
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, Error::Misuse(_))
    }
}

/// A call that happened but should not have, or not at that point.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct UnexpectedInvocation {
    /// The offending call.
    pub invocation: ObservedInvocation,
    /// How many calls exceeded the allowed count.  1 for ordering errors.
    pub count: usize,
    /// What was expected instead, if anything in particular.
    pub expected: Option<String>,
    message: String
}

impl UnexpectedInvocation {
    /// Strict replay found `got` where `expected` should have been.
    /// `mismatches` explains, argument by argument, why a call to the same
    /// member didn't match.
    pub(crate) fn instead_of(got: &ObservedInvocation, expected: &str,
                             mismatches: &[String]) -> Self
    {
        let mut message = format!("Unexpected invocation of:\n{}{}\n\
            when was expecting an invocation of:\n{}",
            got.describe_member(), with_arguments(got), expected);
        for m in mismatches {
            message.push_str("\n   ");
            message.push_str(m);
        }
        UnexpectedInvocation {
            invocation: got.clone(),
            count: 1,
            expected: Some(expected.to_owned()),
            message
        }
    }

    /// Strict replay ran past the last recorded expectation.
    pub(crate) fn after_last(got: &ObservedInvocation) -> Self {
        let message = format!("Unexpected invocation of:\n{}{}\n\
            when no more invocations were expected",
            got.describe_member(), with_arguments(got));
        UnexpectedInvocation {
            invocation: got.clone(),
            count: 1,
            expected: None,
            message
        }
    }

    /// More matching calls than an expectation's upper bound allows.
    pub(crate) fn excess(got: &ObservedInvocation, count: usize) -> Self {
        let plural = if count == 1 { "invocation" } else { "invocations" };
        let message = format!("{} unexpected {} to:\n{}", count, plural, got);
        UnexpectedInvocation {
            invocation: got.clone(),
            count,
            expected: None,
            message
        }
    }

    /// Ordered verification found `got` before `expected` was satisfied.
    pub(crate) fn before(got: &ObservedInvocation, expected: &str) -> Self {
        let message = format!("Unexpected invocation of:\n{}\n\
            before the expected invocation of:\n{}", got, expected);
        UnexpectedInvocation {
            invocation: got.clone(),
            count: 1,
            expected: Some(expected.to_owned()),
            message
        }
    }

    /// Full verification left `got` unexplained.
    pub(crate) fn unverified(got: &ObservedInvocation) -> Self {
        let message = format!("Unexpected invocation to:\n{}\n\
            which was not verified", got);
        UnexpectedInvocation {
            invocation: got.clone(),
            count: 1,
            expected: None,
            message
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

fn with_arguments(got: &ObservedInvocation) -> String {
    let mut s = String::new();
    if !got.arguments.is_empty() {
        s.push_str("\n   with arguments: ");
        s.push_str(&crate::value::display_args(&got.arguments));
    }
    if let Some(instance) = &got.instance {
        s.push_str(&format!("\n   on instance: {}", instance));
    }
    s
}

/// An expectation that was invoked fewer times than required.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub struct MissingInvocation {
    /// Description of the expected invocation.
    pub expected: String,
    /// How many more calls were needed.
    pub missing: usize,
    /// Calls to the same member whose arguments didn't match.
    pub instead_got: Vec<ObservedInvocation>,
    message: String
}

impl MissingInvocation {
    pub(crate) fn new(expected: String, missing: usize,
                      instead_got: Vec<ObservedInvocation>) -> Self
    {
        let mut message = if missing == 1 {
            format!("Missing invocation to:\n{}", expected)
        } else {
            format!("Missing {} invocations to:\n{}", missing, expected)
        };
        if !instead_got.is_empty() {
            message.push_str("\ninstead got:");
            for i in instead_got.iter() {
                message.push_str(&format!("\n   {}", i));
            }
        }
        MissingInvocation{expected, missing, instead_got, message}
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// The test itself used the engine incorrectly.
///
/// Reported immediately, when the offending expectation or verification is
/// declared.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("{message}")]
pub struct Misuse {
    message: String
}

impl Misuse {
    pub(crate) fn new<S: Into<String>>(message: S) -> Self {
        let message = message.into();
        tracing::warn!(%message, "misuse");
        Misuse{message}
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
