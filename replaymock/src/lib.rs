// vim: tw=80
//! An expectation matching, replay and verification engine for mock
//! objects.
//!
//! Replaymock decides, for every intercepted call, which recorded behavior
//! applies, and afterwards reconciles the calls that actually happened with
//! what the test expected.  It does not intercept anything by itself: some
//! instrumentation layer (a hand-written proxy, a generated mock, a
//! `dlsym` shim) reports each call to a [`Session`] and carries out the
//! action the session hands back.
//!
//! # Usage
//!
//! A test goes through three phases.
//! * Record.  Open a [`Recording`] with [`Session::begin_recording`] and
//!   declare the calls you expect with [`Expect`].  Each expectation has a
//!   signature, optional argument matchers, a call count and a queue of
//!   results.
//! * Replay.  Run the code under test.  The instrumentation layer reports
//!   every call with [`Session::observe`] or [`Session::invoke`].
//! * Verify.  Either [`Session::checkpoint`] to check that every recorded
//!   expectation was satisfied, or open a [`Verification`] block to make
//!   assertions about the calls that were observed.
//!
//! ## Getting Started
//! ```
//! use replaymock::*;
//! use replaymock::matcher::*;
//!
//! let save = InvocationSignature::instance("Dao", "save", ["String"]);
//! let session = Session::new();
//!
//! let mut recording = session.begin_recording(Discipline::NonStrict, 1)
//!     .unwrap();
//! recording.record(Expect::call(&save)
//!     .with(args![prefix("user:")])
//!     .returns(true))
//!     .unwrap();
//! recording.end();
//!
//! // This is what a proxy would do for every call
//! let r = session.invoke(Call::new(&save).with_args(["user:1"])).unwrap();
//! assert_eq!(Completion::Returned(true.into()), r);
//! let r = session.invoke(Call::new(&save).with_args(["group:1"])).unwrap();
//! assert_eq!(Completion::NotIntercepted, r);
//!
//! let mut v = session.begin_verification(VerificationMode::Unordered, 1)
//!     .unwrap();
//! v.verify(Expect::call(&save).with(args!["group:1"])).unwrap();
//! v.end().assert_ok();
//! ```
//!
//! ## Strict and non-strict recordings
//!
//! A [`Discipline::Strict`] recording describes the exact sequence of calls
//! to the recorded types.  The first call out of sequence fails
//! immediately, and every later call fails the same way.  A
//! [`Discipline::NonStrict`] recording describes behavior, not a sequence:
//! calls may come in any order, calls matching nothing are passed through,
//! and when several expectations match, the most recently recorded one
//! wins.  Recording an expectation identical to an earlier one replaces it.
//!
//! ## Results
//!
//! Each matching call takes the next [`ResultAction`] from its
//! expectation's queue, and the last one repeats.  A delegate computes the
//! result from the [`Invocation`]; it runs without any lock held, so it may
//! call other mocked methods.
//!
//! ## Verification modes
//!
//! [`VerificationMode::Unordered`] counts matching calls anywhere in the
//! log.  [`VerificationMode::Ordered`] also requires them in declaration
//! order; [`Verification::skip`] marks a place where anything may happen.
//! The `Full` modes additionally require that every call was verified, or
//! every call within a [`Scope`].  A call verified by one block is not
//! counted again by later blocks.
//!
//! # Crate features
//!
//! * `regex` - Enables the [`matcher::regex`] matcher.  On by default.

mod action;
mod config;
mod error;
mod expectation;
mod log;
pub mod matcher;
mod record;
mod session;
mod signature;
mod times;
mod value;
mod verify;

pub use action::{Completion, Invocation, ResultAction};
pub use config::Config;
pub use error::{Error, MissingInvocation, Misuse, UnexpectedInvocation};
pub use expectation::Expect;
pub use log::{Call, InvocationLog, ObservedInvocation};
pub use matcher::{ArgumentMatcher, Captor, MatcherKind};
pub use predicates::prelude::{Predicate, predicate};
pub use record::Discipline;
pub use session::{
    Applied, Phase, Recording, ReplayOutcome, Session, Verification
};
pub use signature::{InstanceBinding, InvocationSignature, TargetKind};
pub use times::Times;
pub use value::{Object, ObjectRef, Value};
pub use verify::{Scope, VerificationMode, VerificationResult};
