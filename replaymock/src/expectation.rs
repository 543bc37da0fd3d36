// vim: tw=80
//! Expectations: a signature, argument matchers, a cardinality and, for
//! recorded expectations, a queue of results.

use std::fmt::Write;

use crate::{
    action::{Invocation, ResultAction, Results},
    error::{Error, Misuse},
    log::ObservedInvocation,
    matcher::ArgumentMatcher,
    signature::{InstanceBinding, InvocationSignature},
    times::Times,
    value::{ObjectRef, Value}
};

/// Declares one expected call, for either a recording or a verification.
///
/// ```
/// use replaymock::*;
/// use replaymock::matcher::*;
///
/// let sig = InvocationSignature::instance("Dependency", "find",
///                                         ["String", "int"]);
/// let e = Expect::call(&sig)
///     .with(args![prefix("abc"), any()])
///     .times(1..=2)
///     .returns("found")
///     .returns("not found");
/// ```
#[derive(Clone, Debug)]
#[must_use = "An expectation does nothing until it is recorded or verified"]
pub struct Expect {
    signature: InvocationSignature,
    binding: InstanceBinding,
    fixed: Option<Vec<ArgumentMatcher>>,
    each: Option<ArgumentMatcher>,
    times: Option<Times>,
    results: Results
}

impl Expect {
    /// Expect a call to `signature`, with any arguments, on any instance.
    pub fn call(signature: &InvocationSignature) -> Self {
        Expect {
            signature: signature.clone(),
            binding: InstanceBinding::Any,
            fixed: None,
            each: None,
            times: None,
            results: Results::default()
        }
    }

    /// Only match calls made on this very instance.
    pub fn on(mut self, instance: &ObjectRef) -> Self {
        self.binding = InstanceBinding::Same(instance.clone());
        self
    }

    /// Set the argument matchers, one per argument.
    ///
    /// For a variadic signature this matches only calls with exactly as many
    /// trailing arguments as there are matchers beyond the fixed parameters,
    /// unless [`with_each`](#method.with_each) is also used, in which case
    /// these are the matchers for the fixed parameters only.
    pub fn with(mut self, matchers: Vec<ArgumentMatcher>) -> Self {
        self.fixed = Some(matchers);
        self
    }

    /// Match every trailing argument of a variadic call against `m`.
    pub fn with_each<M: Into<ArgumentMatcher>>(mut self, m: M) -> Self {
        self.each = Some(m.into());
        self
    }

    /// Set the allowed number of calls.  Accepts a `usize` for an exact
    /// count or any range.
    pub fn times<T: Into<Times>>(mut self, t: T) -> Self {
        self.times = Some(t.into());
        self
    }

    /// Forbid the call altogether.  Same as `times(0)`.
    pub fn never(self) -> Self {
        self.times(Times::never())
    }

    pub fn returns<V: Into<Value>>(self, v: V) -> Self {
        self.result(ResultAction::return_value(v))
    }

    pub fn throws<V: Into<Value>>(self, v: V) -> Self {
        self.result(ResultAction::throw(v))
    }

    pub fn delegate<F>(self, f: F) -> Self
        where F: Fn(&Invocation) -> Result<Value, Value> + Send + Sync + 'static
    {
        self.result(ResultAction::delegate(f))
    }

    /// Queue another result.  Each matching call takes the next one; the
    /// last one repeats.
    pub fn result(mut self, action: ResultAction) -> Self {
        self.results.push(action);
        self
    }

    /// Queue several return values at once.
    pub fn returns_each<I, V>(mut self, values: I) -> Self
        where I: IntoIterator<Item=V>, V: Into<Value>
    {
        for v in values {
            self.results.push(ResultAction::return_value(v));
        }
        self
    }
}

/// The arguments an expectation accepts.
#[derive(Clone, Debug)]
enum Arguments {
    /// Whatever the signature allows.
    Any,
    /// One matcher per argument.
    Fixed(Vec<ArgumentMatcher>),
    /// One matcher per fixed parameter, then one for every trailing argument.
    Varargs{fixed: Vec<ArgumentMatcher>, each: ArgumentMatcher}
}

impl Arguments {
    fn build(sig: &InvocationSignature, fixed: Option<Vec<ArgumentMatcher>>,
             each: Option<ArgumentMatcher>) -> Result<Self, Error>
    {
        match (fixed, each) {
            (None, None) => Ok(Arguments::Any),
            (fixed, Some(each)) => {
                if !sig.is_varargs() {
                    return Err(Misuse::new(format!(
                        "{} is not variadic, but a matcher was given for \
                        each trailing argument", sig)).into());
                }
                let fixed = fixed.unwrap_or_default();
                if fixed.len() != sig.fixed_arity() {
                    return Err(arity_misuse(sig, fixed.len()));
                }
                Ok(Arguments::Varargs{fixed, each})
            },
            (Some(fixed), None) => {
                if !sig.accepts_arity(fixed.len()) {
                    return Err(arity_misuse(sig, fixed.len()));
                }
                Ok(Arguments::Fixed(fixed))
            }
        }
    }

    fn matches(&self, args: &[Value]) -> bool {
        match self {
            Arguments::Any => true,
            Arguments::Fixed(ms) => ms.len() == args.len() &&
                ms.iter().zip(args).all(|(m, a)| m.matches(a)),
            Arguments::Varargs{fixed, each} => args.len() >= fixed.len() &&
                fixed.iter().zip(args).all(|(m, a)| m.matches(a)) &&
                args[fixed.len()..].iter().all(|a| each.matches(a))
        }
    }

    fn iter(&self) -> impl Iterator<Item=&ArgumentMatcher> {
        let (fixed, each): (&[ArgumentMatcher], Option<&ArgumentMatcher>) =
            match self {
                Arguments::Any => (&[], None),
                Arguments::Fixed(ms) => (ms.as_slice(), None),
                Arguments::Varargs{fixed, each} =>
                    (fixed.as_slice(), Some(each))
            };
        fixed.iter().chain(each)
    }

    /// The matcher responsible for the `i`th argument of a call.
    fn for_argument(&self, i: usize) -> Option<&ArgumentMatcher> {
        match self {
            Arguments::Any => None,
            Arguments::Fixed(ms) => ms.get(i),
            Arguments::Varargs{fixed, each} => fixed.get(i).or(Some(each))
        }
    }

    fn is_equivalent(&self, other: &Arguments) -> bool {
        fn all_equivalent(a: &[ArgumentMatcher], b: &[ArgumentMatcher]) -> bool
        {
            a.len() == b.len() &&
                a.iter().zip(b).all(|(x, y)| x.is_equivalent(y))
        }
        match (self, other) {
            (Arguments::Any, Arguments::Any) => true,
            (Arguments::Fixed(a), Arguments::Fixed(b)) => all_equivalent(a, b),
            (Arguments::Varargs{fixed: f0, each: e0},
             Arguments::Varargs{fixed: f1, each: e1}) =>
                all_equivalent(f0, f1) && e0.is_equivalent(e1),
            _ => false
        }
    }

    fn describe(&self) -> Option<String> {
        match self {
            Arguments::Any => None,
            Arguments::Fixed(ms) if ms.is_empty() => None,
            Arguments::Fixed(ms) => Some(join(ms.iter())),
            Arguments::Varargs{fixed, each} => {
                let mut s = join(fixed.iter());
                if !s.is_empty() {
                    s.push_str(", ");
                }
                write!(s, "{}...", each).ok();
                Some(s)
            }
        }
    }
}

fn join<'a>(ms: impl Iterator<Item=&'a ArgumentMatcher>) -> String {
    ms.map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

fn arity_misuse(sig: &InvocationSignature, n: usize) -> Error {
    Misuse::new(format!("{} cannot take {} argument matchers", sig, n)).into()
}

/// Which kind of block an expectation was declared in.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Purpose {
    Recording,
    Verification
}

/// A validated expectation, with its call counter.
#[derive(Clone, Debug)]
pub(crate) struct Expectation {
    signature: InvocationSignature,
    binding: InstanceBinding,
    arguments: Arguments,
    times: Times,
    results: Results,
    count: usize
}

impl Expectation {
    /// Validate `e`.  `default_times` applies if it didn't set a
    /// cardinality.
    pub(crate) fn new(e: Expect, purpose: Purpose, default_times: Times)
        -> Result<Self, Error>
    {
        e.signature.validate()?;
        e.binding.validate(&e.signature)?;
        let arguments = Arguments::build(&e.signature, e.fixed, e.each)?;
        match purpose {
            Purpose::Recording => {
                if arguments.iter().any(|m| m.captor().is_some()) {
                    return Err(Misuse::new(format!(
                        "Capturing matchers are only allowed in verifications, \
                        but one was recorded for {}", e.signature)).into());
                }
            },
            Purpose::Verification => {
                if !e.results.is_empty() {
                    return Err(Misuse::new(format!(
                        "Results cannot be specified when verifying {}",
                        e.signature)).into());
                }
            }
        }
        let times = match e.times {
            Some(t) => t,
            None => widen_for_results(default_times, e.results.len())
        };
        Ok(Expectation {
            signature: e.signature,
            binding: e.binding,
            arguments,
            times,
            results: e.results,
            count: 0
        })
    }

    pub(crate) fn signature(&self) -> &InvocationSignature {
        &self.signature
    }

    pub(crate) fn times(&self) -> Times {
        self.times
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Does `call` match this expectation, regardless of its count?
    pub(crate) fn matches(&self, call: &ObservedInvocation) -> bool {
        self.signature == call.signature &&
            self.signature.accepts_arity(call.arguments.len()) &&
            self.binding.matches(call.instance.as_ref()) &&
            self.arguments.matches(&call.arguments)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.times.is_exhausted(self.count)
    }

    pub(crate) fn is_satisfied(&self) -> bool {
        self.times.is_satisfied(self.count)
    }

    /// Count one call and take its result.
    ///
    /// The caller must already have checked that the call matches and that
    /// the expectation isn't exhausted.
    pub(crate) fn consume(&mut self) -> (ResultAction, usize) {
        self.count += 1;
        (self.results.advance(), self.count)
    }

    /// Same signature, instance binding and matchers?
    pub(crate) fn is_equivalent(&self, other: &Expectation) -> bool {
        self.signature == other.signature &&
            self.binding.is_equivalent(&other.binding) &&
            self.arguments.is_equivalent(&other.arguments)
    }

    /// Copy of this expectation for a block repeated `n` times, with its
    /// bounds multiplied.
    pub(crate) fn scaled(&self, n: usize) -> Self {
        let mut e = self.fresh();
        e.times = self.times.scaled(n);
        e
    }

    /// Copy of this expectation that hasn't been called yet.
    pub(crate) fn fresh(&self) -> Self {
        Expectation {
            count: 0,
            results: self.results.restarted(),
            ..self.clone()
        }
    }

    /// Record the arguments of `call` into any captors among the matchers.
    pub(crate) fn capture(&self, call: &ObservedInvocation) {
        for (i, arg) in call.arguments.iter().enumerate() {
            if let Some(captor) = self.arguments.for_argument(i)
                .and_then(ArgumentMatcher::captor)
            {
                captor.push(arg.clone());
            }
        }
    }

    /// Explain, argument by argument, why `call` doesn't match.
    pub(crate) fn explain_mismatch(&self, call: &ObservedInvocation)
        -> Vec<String>
    {
        call.arguments.iter()
            .enumerate()
            .filter_map(|(i, a)| {
                self.arguments.for_argument(i)
                    .and_then(|m| m.explain_mismatch(a))
                    .map(|why| format!("argument {}: {}", i, why))
            }).collect()
    }

    /// The expected call as shown in failure messages.
    pub(crate) fn describe(&self) -> String {
        let mut s = self.signature.to_string();
        if let Some(args) = self.arguments.describe() {
            write!(s, "\n   with arguments: {}", args).ok();
        }
        if let InstanceBinding::Same(o) = &self.binding {
            write!(s, "\n   on instance: {}", o).ok();
        }
        s
    }
}

/// Recording more results than the default maximum raises the maximum, so
/// that every result can be reached.
fn widen_for_results(t: Times, results: usize) -> Times {
    match t.max() {
        Some(max) if max > 0 && max < results =>
            Times::between(t.min(), results).unwrap_or(t),
        _ => t
    }
}
