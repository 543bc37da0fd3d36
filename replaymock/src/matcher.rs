// vim: tw=80
//! Argument matchers.
//!
//! An [`ArgumentMatcher`] is a predicate over a single argument value plus a
//! description used in failure messages.  Build them with the free functions
//! in this module, or convert a literal value, which matches by equality.
//!
//! ```
//! use replaymock::matcher::*;
//! use replaymock::{args, Value};
//!
//! let m = args![any(), 5, prefix("abc")];
//! assert!(m[1].matches(&Value::from(5)));
//! assert!(m[2].matches(&Value::from("abcdef")));
//! assert!(!m[2].matches(&Value::Null));
//! ```
//!
//! Matchers never swallow failures: a panic raised by a [`function`] matcher
//! propagates to the caller.

use cfg_if::cfg_if;
use predicates::prelude::*;
use predicates_tree::CaseTreeExt;
use std::{
    fmt,
    sync::{Arc, Mutex}
};

use crate::{
    error::{Error, Misuse},
    value::{Object, ObjectRef, Value}
};

/// The kind of test an [`ArgumentMatcher`] performs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MatcherKind {
    Any,
    Capture,
    CustomPredicate,
    Equals,
    EqualsWithDelta,
    InstanceLike,
    InstanceOf,
    NotEqual,
    NotNull,
    Null,
    Prefix,
    Regex,
    SameInstance,
    Substring,
    Suffix,
}

type TextPredicate = Arc<dyn Predicate<str> + Send + Sync>;

#[derive(Clone)]
enum Inner {
    Any,
    Capture(Captor),
    Custom {
        description: String,
        f: Arc<dyn Fn(&Value) -> bool + Send + Sync>
    },
    Equals(Value),
    EqualsWithDelta{expected: f64, delta: f64},
    InstanceLike(Value),
    InstanceOf{class_name: &'static str, test: fn(&Value) -> bool},
    NotEqual(Value),
    NotNull,
    Null,
    SameInstance(Value),
    Text{kind: MatcherKind, pattern: String, pred: TextPredicate}
}

/// A predicate over one argument of an intercepted call.
///
/// Immutable once built.  Cloning is cheap.
#[derive(Clone)]
pub struct ArgumentMatcher(Inner);

impl ArgumentMatcher {
    pub fn kind(&self) -> MatcherKind {
        match &self.0 {
            Inner::Any => MatcherKind::Any,
            Inner::Capture(_) => MatcherKind::Capture,
            Inner::Custom{..} => MatcherKind::CustomPredicate,
            Inner::Equals(_) => MatcherKind::Equals,
            Inner::EqualsWithDelta{..} => MatcherKind::EqualsWithDelta,
            Inner::InstanceLike(_) => MatcherKind::InstanceLike,
            Inner::InstanceOf{..} => MatcherKind::InstanceOf,
            Inner::NotEqual(_) => MatcherKind::NotEqual,
            Inner::NotNull => MatcherKind::NotNull,
            Inner::Null => MatcherKind::Null,
            Inner::SameInstance(_) => MatcherKind::SameInstance,
            Inner::Text{kind, ..} => *kind
        }
    }

    /// Does `actual` satisfy this matcher?
    pub fn matches(&self, actual: &Value) -> bool {
        match &self.0 {
            Inner::Any | Inner::Capture(_) => true,
            Inner::Custom{f, ..} => f(actual),
            Inner::Equals(expected) => expected == actual,
            Inner::EqualsWithDelta{expected, delta} =>
                actual.as_f64()
                    .map(|a| (a - expected).abs() <= *delta)
                    .unwrap_or(false),
            Inner::InstanceLike(sample) => sample.same_class(actual),
            Inner::InstanceOf{test, ..} => test(actual),
            Inner::NotEqual(unexpected) => unexpected != actual,
            Inner::NotNull => !actual.is_null(),
            Inner::Null => actual.is_null(),
            Inner::SameInstance(expected) => expected.same_instance(actual),
            Inner::Text{pred, ..} =>
                actual.as_str().map(|s| pred.eval(s)).unwrap_or(false)
        }
    }

    /// Human readable description, as shown in failure messages.
    pub fn describe(&self) -> String {
        match &self.0 {
            Inner::Any => "any".to_owned(),
            Inner::Capture(_) => "any (captured)".to_owned(),
            Inner::Custom{description, ..} => description.clone(),
            Inner::Equals(v) => v.to_string(),
            Inner::EqualsWithDelta{expected, delta} =>
                format!("a numeric value within {:?} of {:?}", delta, expected),
            Inner::InstanceLike(v) =>
                format!("an instance of {}", v.class_name()),
            Inner::InstanceOf{class_name, ..} =>
                format!("an instance of {}", class_name),
            Inner::NotEqual(v) => format!("not equal to {}", v),
            Inner::NotNull => "not null".to_owned(),
            Inner::Null => "null".to_owned(),
            Inner::SameInstance(v) => format!("same instance as {}", v),
            Inner::Text{kind, pattern, ..} => {
                let verb = match kind {
                    MatcherKind::Prefix => "starting with",
                    MatcherKind::Suffix => "ending with",
                    MatcherKind::Substring => "containing",
                    _ => "matching"
                };
                format!("a string {} \"{}\"", verb, pattern.escape_default())
            }
        }
    }

    /// Explain why `actual` does not satisfy this matcher, or `None` if it
    /// does.
    pub fn explain_mismatch(&self, actual: &Value) -> Option<String> {
        if self.matches(actual) {
            return None;
        }
        if let (Inner::Text{pred, ..}, Some(s)) = (&self.0, actual.as_str()) {
            if let Some(case) = pred.find_case(false, s) {
                return Some(case.tree().to_string());
            }
        }
        Some(format!("expected {}, got {}", self.describe(), actual))
    }

    /// Do both matchers accept exactly the same values, by construction?
    ///
    /// Custom predicates and captures are only equivalent to clones of
    /// themselves.
    pub fn is_equivalent(&self, other: &ArgumentMatcher) -> bool {
        match (&self.0, &other.0) {
            (Inner::Any, Inner::Any) => true,
            (Inner::Capture(a), Inner::Capture(b)) => a.ptr_eq(b),
            (Inner::Custom{f: a, ..}, Inner::Custom{f: b, ..}) =>
                Arc::ptr_eq(a, b),
            (Inner::Equals(a), Inner::Equals(b)) => a == b,
            (Inner::EqualsWithDelta{expected: e0, delta: d0},
             Inner::EqualsWithDelta{expected: e1, delta: d1}) =>
                e0 == e1 && d0 == d1,
            (Inner::InstanceLike(a), Inner::InstanceLike(b)) =>
                a.same_class(b),
            (Inner::InstanceOf{class_name: a, ..},
             Inner::InstanceOf{class_name: b, ..}) => a == b,
            (Inner::NotEqual(a), Inner::NotEqual(b)) => a == b,
            (Inner::NotNull, Inner::NotNull) => true,
            (Inner::Null, Inner::Null) => true,
            (Inner::SameInstance(a), Inner::SameInstance(b)) =>
                a.same_instance(b),
            (Inner::Text{kind: k0, pattern: p0, ..},
             Inner::Text{kind: k1, pattern: p1, ..}) => k0 == k1 && p0 == p1,
            _ => false
        }
    }

    pub(crate) fn captor(&self) -> Option<&Captor> {
        match &self.0 {
            Inner::Capture(c) => Some(c),
            _ => None
        }
    }
}

impl fmt::Debug for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ArgumentMatcher")
            .field(&self.kind())
            .field(&self.describe())
            .finish()
    }
}

impl fmt::Display for ArgumentMatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl From<Value> for ArgumentMatcher {
    fn from(v: Value) -> Self {
        eq(v)
    }
}

macro_rules! literal_matcher {
    ($($t:ty),*) => {
        $(
            impl From<$t> for ArgumentMatcher {
                fn from(v: $t) -> Self {
                    eq(v)
                }
            }
        )*
    }
}

literal_matcher!{i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64,
    bool, char, String, &str, ObjectRef}

/// Build a `Vec<ArgumentMatcher>` from matchers and literal values.
///
/// Literal values match by equality.
///
/// ```
/// use replaymock::{args, matcher::*};
/// let m = args![any_string(), 5, null()];
/// assert_eq!(3, m.len());
/// ```
#[macro_export]
macro_rules! args {
    () => { ::std::vec::Vec::<$crate::ArgumentMatcher>::new() };
    ($($m:expr),+ $(,)?) => {
        vec![$($crate::ArgumentMatcher::from($m)),+]
    };
}

/// Collects the arguments matched by a [`capture`] matcher during
/// verification.
#[derive(Clone, Debug, Default)]
pub struct Captor(Arc<Mutex<Vec<Value>>>);

impl Captor {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured values, in invocation order.
    pub fn values(&self) -> Vec<Value> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<Value> {
        self.lock().last().cloned()
    }

    pub(crate) fn push(&self, v: Value) {
        self.lock().push(v);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Value>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }

    fn ptr_eq(&self, other: &Captor) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Match anything, including null.
pub fn any() -> ArgumentMatcher {
    ArgumentMatcher(Inner::Any)
}

/// Match any string, but not null.
pub fn any_string() -> ArgumentMatcher {
    instance_of::<String>()
}

/// Match anything and, in a verification, record the argument of every
/// claimed invocation into `captor`.
pub fn capture(captor: &Captor) -> ArgumentMatcher {
    ArgumentMatcher(Inner::Capture(captor.clone()))
}

/// Match numbers within `delta` of `expected`: `|actual - expected| <= delta`
pub fn close_to(expected: f64, delta: f64) -> ArgumentMatcher {
    ArgumentMatcher(Inner::EqualsWithDelta{expected, delta})
}

/// Match by value equality.  `eq(Value::Null)` matches only null.
pub fn eq<V: Into<Value>>(v: V) -> ArgumentMatcher {
    ArgumentMatcher(Inner::Equals(v.into()))
}

/// Match with an arbitrary closure.
///
/// If the closure panics, the panic propagates through the engine.
pub fn function<F>(description: &str, f: F) -> ArgumentMatcher
    where F: Fn(&Value) -> bool + Send + Sync + 'static
{
    ArgumentMatcher(Inner::Custom {
        description: description.to_owned(),
        f: Arc::new(f)
    })
}

/// Match values of the same runtime type as `sample`.
pub fn instance_like<V: Into<Value>>(sample: V) -> ArgumentMatcher {
    ArgumentMatcher(Inner::InstanceLike(sample.into()))
}

/// Match values whose runtime type is `T`.  Null never matches.
pub fn instance_of<T: Object>() -> ArgumentMatcher {
    ArgumentMatcher(Inner::InstanceOf {
        class_name: std::any::type_name::<T>(),
        test: Value::is_instance_of::<T>
    })
}

pub fn ne<V: Into<Value>>(v: V) -> ArgumentMatcher {
    ArgumentMatcher(Inner::NotEqual(v.into()))
}

pub fn not_null() -> ArgumentMatcher {
    ArgumentMatcher(Inner::NotNull)
}

pub fn null() -> ArgumentMatcher {
    ArgumentMatcher(Inner::Null)
}

/// Match with any [`Predicate`] over [`Value`]s, such as
/// `predicate::eq(Value::from(4))`.
pub fn predicate<P>(p: P) -> ArgumentMatcher
    where P: Predicate<Value> + Send + Sync + 'static
{
    let description = p.to_string();
    ArgumentMatcher(Inner::Custom {
        description,
        f: Arc::new(move |v| p.eval(v))
    })
}

pub fn prefix(text: &str) -> ArgumentMatcher {
    text_matcher(MatcherKind::Prefix, text,
                 Arc::new(predicate::str::starts_with(text)))
}

/// Match strings that match `pattern` in their entirety.
///
/// Fails if the pattern does not compile.
pub fn regex(pattern: &str) -> Result<ArgumentMatcher, Error> {
    let pred = compile_regex(pattern)?;
    Ok(text_matcher(MatcherKind::Regex, pattern, pred))
}

/// Match only `v` itself.  Objects compare by identity; other values by
/// equality.
pub fn same<V: Into<Value>>(v: V) -> ArgumentMatcher {
    ArgumentMatcher(Inner::SameInstance(v.into()))
}

pub fn substring(text: &str) -> ArgumentMatcher {
    text_matcher(MatcherKind::Substring, text,
                 Arc::new(predicate::str::contains(text)))
}

pub fn suffix(text: &str) -> ArgumentMatcher {
    text_matcher(MatcherKind::Suffix, text,
                 Arc::new(predicate::str::ends_with(text)))
}

fn text_matcher(kind: MatcherKind, pattern: &str, pred: TextPredicate)
    -> ArgumentMatcher
{
    ArgumentMatcher(Inner::Text{kind, pattern: pattern.to_owned(), pred})
}

cfg_if! {
    if #[cfg(feature = "regex")] {
        fn compile_regex(pattern: &str) -> Result<TextPredicate, Error> {
            let anchored = format!("^(?:{})$", pattern);
            predicate::str::is_match(anchored)
                .map(|p| Arc::new(p) as TextPredicate)
                .map_err(|e| Misuse::new(format!(
                    "Invalid regular expression \"{}\": {}", pattern, e))
                    .into())
        }
    } else {
        fn compile_regex(_pattern: &str) -> Result<TextPredicate, Error> {
            Err(Misuse::new(
                "Regular expression matchers require the \"regex\" feature")
                .into())
        }
    }
}
