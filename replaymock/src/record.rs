// vim: tw=80
//! Recorded expectations and how replayed calls are matched against them.

use crate::{
    action::ResultAction,
    error::{MissingInvocation, UnexpectedInvocation},
    expectation::Expectation,
    log::{InvocationLog, ObservedInvocation}
};

/// How the expectations of a recording block are replayed.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Discipline {
    /// Calls to the recorded types must arrive exactly in recorded order,
    /// and anything else is an error at the point of the call.
    Strict,
    /// Calls may arrive in any order.  The most recently recorded matching
    /// expectation wins.  Calls that match nothing are not intercepted.
    NonStrict
}

/// What the recorded expectations say about one call.
#[derive(Debug)]
pub(crate) enum Resolution {
    Consumed{action: ResultAction, count: usize},
    NoMatch,
    Unexpected{error: UnexpectedInvocation, strict: bool}
}

/// Every expectation recorded in the current cycle.
#[derive(Debug, Default)]
pub(crate) struct ExpectationSet {
    /// Strict expectations in recorded order, with iterations unrolled.
    strict: Vec<Expectation>,
    /// Index into `strict` of the next expected call.
    cursor: usize,
    non_strict: Vec<Expectation>
}

impl ExpectationSet {
    /// Add the expectations of one finished recording block.
    pub(crate) fn add_block(&mut self, discipline: Discipline,
                            block: Vec<Expectation>, iterations: usize)
    {
        match discipline {
            Discipline::Strict => {
                for _ in 0..iterations {
                    self.strict.extend(block.iter().map(Expectation::fresh));
                }
            },
            Discipline::NonStrict => {
                for e in block {
                    let e = e.scaled(iterations);
                    // A re-recorded expectation replaces the earlier one
                    self.non_strict.retain(|old| !old.is_equivalent(&e));
                    self.non_strict.push(e);
                }
            }
        }
    }

    /// Match `call` against the recorded expectations and consume the one
    /// that applies.
    pub(crate) fn resolve(&mut self, call: &ObservedInvocation) -> Resolution
    {
        let mut exhausted = false;
        for e in self.non_strict.iter_mut().rev() {
            if e.matches(call) {
                if !e.is_exhausted() {
                    let (action, count) = e.consume();
                    return Resolution::Consumed{action, count};
                }
                exhausted = true;
            }
        }
        if exhausted {
            return Resolution::Unexpected {
                error: UnexpectedInvocation::excess(call, 1),
                strict: false
            };
        }
        if self.is_strictly_mocked(call) {
            self.resolve_strict(call)
        } else {
            Resolution::NoMatch
        }
    }

    /// Is `call` to a type that has strict expectations?
    fn is_strictly_mocked(&self, call: &ObservedInvocation) -> bool {
        self.strict.iter()
            .any(|e| e.signature().owner() == call.signature.owner())
    }

    fn resolve_strict(&mut self, call: &ObservedInvocation) -> Resolution {
        let unexpected = |error| Resolution::Unexpected{error, strict: true};
        loop {
            let e = match self.strict.get_mut(self.cursor) {
                Some(e) => e,
                None =>
                    return unexpected(UnexpectedInvocation::after_last(call))
            };
            if e.matches(call) {
                if !e.is_exhausted() {
                    let (action, count) = e.consume();
                    return Resolution::Consumed{action, count};
                }
                if e.times().is_never() {
                    return unexpected(UnexpectedInvocation::excess(call, 1));
                }
            } else if !e.is_satisfied() {
                let mismatches = if *e.signature() == call.signature {
                    e.explain_mismatch(call)
                } else {
                    Vec::new()
                };
                return unexpected(UnexpectedInvocation::instead_of(call,
                    &e.describe(), &mismatches));
            }
            self.cursor += 1;
        }
    }

    /// Find the first expectation that was called fewer times than its
    /// minimum, strict ones first.
    pub(crate) fn check_missing(&self, log: &InvocationLog,
                                max_listed: usize)
        -> Result<(), MissingInvocation>
    {
        let unsatisfied = self.strict.iter()
            .chain(self.non_strict.iter())
            .find(|e| !e.is_satisfied());
        match unsatisfied {
            None => Ok(()),
            Some(e) => {
                let instead_got = log.iter()
                    .filter(|o| o.signature == *e.signature() && !e.matches(o))
                    .take(max_listed)
                    .cloned()
                    .collect();
                Err(MissingInvocation::new(e.describe(),
                    e.times().min() - e.count(), instead_got))
            }
        }
    }
}
