// vim: tw=80
//! What a matched call does: return a value, throw, or run a delegate.

use fragile::Fragile;
use std::{fmt, sync::Arc};

use crate::{
    log::ObservedInvocation,
    signature::InvocationSignature,
    value::{ObjectRef, Value}
};

type DelegateFn = dyn Fn(&Invocation) -> Result<Value, Value> + Send + Sync;

/// The effective outcome of one matched call.
///
/// Expectations hold a queue of these.  Each matching call takes the next
/// one, and the last one repeats forever.
#[derive(Clone)]
pub enum ResultAction {
    Return(Value),
    Throw(Value),
    /// Compute the outcome from the call.  `Err` means "throw".
    Delegate(Arc<DelegateFn>)
}

impl ResultAction {
    pub fn return_value<V: Into<Value>>(v: V) -> Self {
        ResultAction::Return(v.into())
    }

    pub fn throw<V: Into<Value>>(v: V) -> Self {
        ResultAction::Throw(v.into())
    }

    /// Supply a closure that will compute the outcome of each call.
    ///
    /// The closure runs without any engine lock held, so it may itself call
    /// other intercepted methods.
    pub fn delegate<F>(f: F) -> Self
        where F: Fn(&Invocation) -> Result<Value, Value> + Send + Sync + 'static
    {
        ResultAction::Delegate(Arc::new(f))
    }

    /// Single-threaded version of [`delegate`](#method.delegate).  Can be
    /// used when the closure isn't `Send`.
    ///
    /// It is a runtime error to make the matching call from a different
    /// thread than the one that created this action.
    pub fn delegate_st<F>(f: F) -> Self
        where F: Fn(&Invocation) -> Result<Value, Value> + 'static
    {
        let fragile = Fragile::new(f);
        ResultAction::Delegate(Arc::new(move |i: &Invocation| {
            (fragile.get())(i)
        }))
    }

    /// Carry out this action for the call described by `invocation`.
    pub fn perform(&self, invocation: &Invocation) -> Completion {
        match self {
            ResultAction::Return(v) => Completion::Returned(v.clone()),
            ResultAction::Throw(v) => Completion::Threw(v.clone()),
            ResultAction::Delegate(f) => match f(invocation) {
                Ok(v) => Completion::Returned(v),
                Err(v) => Completion::Threw(v)
            }
        }
    }
}

impl fmt::Debug for ResultAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResultAction::Return(v) =>
                f.debug_tuple("Return").field(v).finish(),
            ResultAction::Throw(v) =>
                f.debug_tuple("Throw").field(v).finish(),
            ResultAction::Delegate(_) => f.write_str("Delegate")
        }
    }
}

impl Default for ResultAction {
    /// Return null, which the caller converts to its return type's default.
    fn default() -> Self {
        ResultAction::Return(Value::Null)
    }
}

/// A queue of [`ResultAction`]s.  Advances on every call until it reaches
/// the last entry, which then repeats.
#[derive(Clone, Debug, Default)]
pub(crate) struct Results {
    actions: Vec<ResultAction>,
    next: usize
}

impl Results {
    pub(crate) fn push(&mut self, action: ResultAction) {
        self.actions.push(action);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    /// The same queue, rewound to its first entry.
    pub(crate) fn restarted(&self) -> Self {
        Results{actions: self.actions.clone(), next: 0}
    }

    /// Take the next action.
    pub(crate) fn advance(&mut self) -> ResultAction {
        match self.actions.get(self.next) {
            Some(a) => {
                let a = a.clone();
                if self.next + 1 < self.actions.len() {
                    self.next += 1;
                }
                a
            },
            None => ResultAction::default()
        }
    }
}

/// The call context handed to a delegate.
#[derive(Clone, Debug)]
pub struct Invocation {
    observed: ObservedInvocation,
    count: usize
}

impl Invocation {
    pub(crate) fn new(observed: ObservedInvocation, count: usize) -> Self {
        Invocation{observed, count}
    }

    pub fn arguments(&self) -> &[Value] {
        &self.observed.arguments
    }

    pub fn instance(&self) -> Option<&ObjectRef> {
        self.observed.instance.as_ref()
    }

    /// How many calls the matched expectation has consumed, including this
    /// one.  Starts at 1.
    pub fn invocation_count(&self) -> usize {
        self.count
    }

    pub fn observed(&self) -> &ObservedInvocation {
        &self.observed
    }

    /// Position of this call in the invocation log.
    pub fn sequence(&self) -> usize {
        self.observed.sequence
    }

    pub fn signature(&self) -> &InvocationSignature {
        &self.observed.signature
    }
}

/// How an intercepted call should complete, as computed by
/// [`Session::invoke`](crate::Session::invoke).
#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    Returned(Value),
    Threw(Value),
    /// No expectation applies; run the real code.
    NotIntercepted
}

impl Completion {
    /// Convert to a `Result`, treating "not intercepted" as `None`.
    pub fn into_result(self) -> Option<Result<Value, Value>> {
        match self {
            Completion::Returned(v) => Some(Ok(v)),
            Completion::Threw(v) => Some(Err(v)),
            Completion::NotIntercepted => None
        }
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::log::{Call, InvocationLog};

    fn invocation(args: &[i32]) -> Invocation {
        let sig = InvocationSignature::static_method("Util", "sum",
                                                     ["int", "int"]);
        let mut log = InvocationLog::default();
        let o = log.append(Call::new(&sig).with_args(args.iter().copied()))
            .clone();
        Invocation::new(o, 1)
    }

    #[test]
    fn last_result_repeats() {
        let mut r = Results::default();
        r.push(ResultAction::return_value(1));
        r.push(ResultAction::throw("boom"));
        let i = invocation(&[]);
        assert_eq!(Completion::Returned(1.into()), r.advance().perform(&i));
        assert_eq!(Completion::Threw("boom".into()), r.advance().perform(&i));
        assert_eq!(Completion::Threw("boom".into()), r.advance().perform(&i));
    }

    #[test]
    fn empty_results_return_null() {
        let mut r = Results::default();
        assert!(r.is_empty());
        let i = invocation(&[]);
        assert_eq!(Completion::Returned(Value::Null), r.advance().perform(&i));
    }

    #[test]
    fn delegate_sees_arguments() {
        let d = ResultAction::delegate(|i| {
            let sum = i.arguments().iter()
                .filter_map(Value::as_f64)
                .sum::<f64>();
            if sum < 0.0 { Err("negative".into()) } else { Ok(sum.into()) }
        });
        assert_eq!(Completion::Returned(Value::Float(5.0)),
                   d.perform(&invocation(&[2, 3])));
        assert_eq!(Completion::Threw("negative".into()),
                   d.perform(&invocation(&[2, -3])));
    }

    #[test]
    fn delegate_st() {
        let local = std::rc::Rc::new(7);
        let d = ResultAction::delegate_st(move |_| Ok(Value::from(*local)));
        assert_eq!(Completion::Returned(7.into()), d.perform(&invocation(&[])));
    }
}
