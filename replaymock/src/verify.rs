// vim: tw=80
//! Verification of the invocation log against declared expectations.

use std::collections::BTreeSet;

use crate::{
    error::{Error, MissingInvocation, UnexpectedInvocation},
    expectation::Expectation,
    log::{InvocationLog, ObservedInvocation},
    value::ObjectRef
};

/// How the expectations of a verification block are checked.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum VerificationMode {
    /// Each expectation must be matched by enough invocations, anywhere in
    /// the log.
    Unordered,
    /// Like `Unordered`, but the matching invocations must also occur in
    /// declaration order.
    Ordered,
    /// Like `Unordered`, and every invocation not verified by an earlier
    /// block must be explained by this one.
    Full,
    /// Both `Ordered` and `Full`.
    FullOrdered
}

impl VerificationMode {
    pub fn is_ordered(self) -> bool {
        matches!(self,
                 VerificationMode::Ordered | VerificationMode::FullOrdered)
    }

    pub fn is_full(self) -> bool {
        matches!(self, VerificationMode::Full | VerificationMode::FullOrdered)
    }
}

/// Limits what a full verification must explain.
///
/// A full block with no scope must explain every call in the log.  With a
/// scope, unverified calls are only reported if some entry covers them.
#[derive(Clone, Debug)]
pub enum Scope {
    /// Every call to a method of the named type.
    Type(String),
    /// Every call on this very instance.
    Instance(ObjectRef)
}

impl Scope {
    pub fn of_type<S: Into<String>>(owner: S) -> Self {
        Scope::Type(owner.into())
    }

    pub fn instance(o: &ObjectRef) -> Self {
        Scope::Instance(o.clone())
    }

    fn covers(&self, o: &ObservedInvocation) -> bool {
        match self {
            Scope::Type(owner) => o.signature.owner() == owner.as_str(),
            Scope::Instance(i) => o.instance.as_ref()
                .map(|x| x.ptr_eq(i))
                .unwrap_or(false)
        }
    }
}

/// One entry of a verification block.
#[derive(Clone, Debug)]
pub(crate) enum Step {
    Expect(Expectation),
    /// Any number of unverified invocations may occur here.
    Skip,
    /// The invocations claimed by an earlier unordered block, in place.
    Verified(BTreeSet<usize>)
}

impl Step {
    fn matches(&self, o: &ObservedInvocation) -> bool {
        match self {
            Step::Expect(e) => e.matches(o),
            Step::Skip => false,
            Step::Verified(seqs) => seqs.contains(&o.sequence)
        }
    }

    fn min(&self) -> usize {
        match self {
            Step::Expect(e) => e.times().min(),
            Step::Skip => 0,
            Step::Verified(seqs) => seqs.len()
        }
    }

    fn max(&self) -> Option<usize> {
        match self {
            Step::Expect(e) => e.times().max(),
            Step::Skip => Some(0),
            Step::Verified(seqs) => Some(seqs.len())
        }
    }

    fn describe(&self) -> String {
        match self {
            Step::Expect(e) => e.describe(),
            Step::Skip => "any invocations".to_owned(),
            Step::Verified(seqs) => format!("{} previously verified \
                invocation(s)", seqs.len())
        }
    }

    fn capture(&self, o: &ObservedInvocation) {
        if let Step::Expect(e) = self {
            e.capture(o);
        }
    }

    fn is_skip(&self) -> bool {
        matches!(self, Step::Skip)
    }

    /// Does this step forbid every call it matches?
    fn is_never(&self) -> bool {
        match self {
            Step::Expect(e) => e.times().is_never(),
            _ => false
        }
    }

    /// Is `o` a call of the method this step expects, whatever its
    /// arguments?
    fn has_signature_of(&self, o: &ObservedInvocation) -> bool {
        match self {
            Step::Expect(e) => *e.signature() == o.signature,
            _ => false
        }
    }
}

/// The outcome of a verification block.
///
/// Empty means the verification passed.  Failures are listed in the order
/// they were found.
#[derive(Clone, Debug)]
#[must_use = "A verification result must be checked"]
pub struct VerificationResult {
    failures: Vec<Error>,
    claimed: BTreeSet<usize>,
    mode: VerificationMode,
    cycle: u64
}

impl VerificationResult {
    pub(crate) fn new(mode: VerificationMode, cycle: u64) -> Self {
        VerificationResult {
            failures: Vec::new(),
            claimed: BTreeSet::new(),
            mode,
            cycle
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every discrepancy found, in the order found.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    pub fn unmatched_expectations(&self)
        -> impl Iterator<Item=&MissingInvocation>
    {
        self.failures.iter().filter_map(|e| match e {
            Error::MissingInvocation(m) => Some(m),
            _ => None
        })
    }

    pub fn unexpected_observations(&self)
        -> impl Iterator<Item=&UnexpectedInvocation>
    {
        self.failures.iter().filter_map(|e| match e {
            Error::UnexpectedInvocation(u) => Some(u),
            _ => None
        })
    }

    /// Log positions of the invocations this block verified.
    pub fn verified_invocations(&self) -> impl Iterator<Item=usize> + '_ {
        self.claimed.iter().copied()
    }

    pub fn mode(&self) -> VerificationMode {
        self.mode
    }

    /// The first discrepancy, if any.
    pub fn into_result(self) -> Result<(), Error> {
        match self.failures.into_iter().next() {
            None => Ok(()),
            Some(e) => Err(e)
        }
    }

    /// Panic with the first discrepancy, if any.
    #[track_caller]
    pub fn assert_ok(&self) {
        if let Some(e) = self.failures.first() {
            panic!("{}", e);
        }
    }

    pub(crate) fn push(&mut self, failure: Error) {
        self.failures.push(failure);
    }

    pub(crate) fn cycle(&self) -> u64 {
        self.cycle
    }

    pub(crate) fn claimed(&self) -> &BTreeSet<usize> {
        &self.claimed
    }
}

/// Everything needed to check one block against the log.
pub(crate) struct Verifier<'a> {
    pub log: &'a InvocationLog,
    /// Invocations already verified by earlier blocks.
    pub committed: &'a BTreeSet<usize>,
    pub mode: VerificationMode,
    pub iterations: usize,
    pub max_listed: usize,
    /// What a full block must explain.  Empty means everything.
    pub scope: &'a [Scope]
}

impl Verifier<'_> {
    pub(crate) fn run(&self, steps: &[Step], result: &mut VerificationResult)
    {
        if self.mode.is_ordered() {
            self.ordered(steps, result);
        } else {
            self.unordered(steps, result);
        }
    }

    fn is_unclaimed(&self, o: &ObservedInvocation,
                    claimed: &BTreeSet<usize>) -> bool
    {
        !self.committed.contains(&o.sequence) && !claimed.contains(&o.sequence)
    }

    fn is_in_scope(&self, o: &ObservedInvocation) -> bool {
        self.scope.is_empty() || self.scope.iter().any(|s| s.covers(o))
    }

    fn missing(&self, step: &Step, deficit: usize) -> Error {
        let instead_got = match step {
            Step::Expect(e) => self.log.iter()
                .filter(|o| o.signature == *e.signature() && !e.matches(o))
                .take(self.max_listed)
                .cloned()
                .collect(),
            _ => Vec::new()
        };
        MissingInvocation::new(step.describe(), deficit, instead_got).into()
    }

    fn unordered(&self, steps: &[Step], result: &mut VerificationResult) {
        let mut claimed = BTreeSet::new();
        // Calls already reported as excess
        let mut excess_calls = BTreeSet::new();
        for step in steps {
            let e = match step {
                Step::Expect(e) => e.scaled(self.iterations),
                _ => continue
            };
            let matching = self.log.iter()
                .filter(|o| self.is_unclaimed(o, &claimed) && e.matches(o))
                .collect::<Vec<_>>();
            let times = e.times();
            let take = times.max()
                .map(|max| max.min(matching.len()))
                .unwrap_or(matching.len());
            if matching.len() < times.min() {
                let deficit = times.min() - matching.len();
                result.failures.push(self.missing(&Step::Expect(e.clone()),
                                                  deficit));
            } else if take < matching.len() {
                let excess = matching.len() - take;
                result.failures.push(
                    UnexpectedInvocation::excess(matching[take], excess)
                    .into());
                excess_calls.extend(
                    matching[take..].iter().map(|o| o.sequence));
            }
            for o in &matching[..take] {
                e.capture(o);
                claimed.insert(o.sequence);
            }
        }
        if self.mode.is_full() {
            let unverified = self.log.iter()
                .find(|o| self.is_unclaimed(o, &claimed) &&
                      !excess_calls.contains(&o.sequence) &&
                      self.is_in_scope(o));
            if let Some(o) = unverified {
                result.failures.push(
                    UnexpectedInvocation::unverified(o).into());
            }
        }
        result.claimed = claimed;
    }

    /// Walk the log left to right, advancing through the steps in relative
    /// order.
    fn ordered(&self, steps: &[Step], result: &mut VerificationResult) {
        let steps = steps.iter()
            .cycle()
            .take(steps.len() * self.iterations)
            .collect::<Vec<_>>();
        let referenced = steps.iter()
            .filter_map(|s| match s {
                Step::Verified(seqs) => Some(seqs),
                _ => None
            }).flatten()
            .copied()
            .collect::<BTreeSet<_>>();
        let mut counts = vec![0usize; steps.len()];
        let mut claimed = BTreeSet::new();
        let mut k = 0;
        let exhausted = |counts: &[usize], i: usize| {
            steps[i].max().map(|max| counts[i] >= max).unwrap_or(false)
        };
        let satisfied = |counts: &[usize], i: usize| {
            counts[i] >= steps[i].min()
        };
        // At step k, is the log inside a region covered by a skip marker?
        let in_skip = |counts: &[usize], k: usize| {
            steps.get(k).map(|s| s.is_skip()).unwrap_or(false) ||
                (k < steps.len() && satisfied(counts, k) &&
                 steps.get(k + 1).map(|s| s.is_skip()).unwrap_or(false))
        };

        for o in self.log.iter() {
            if self.committed.contains(&o.sequence) &&
                !referenced.contains(&o.sequence)
            {
                continue;
            }
            if k < steps.len() && steps[k].matches(o) &&
                !exhausted(&counts, k)
            {
                counts[k] += 1;
                steps[k].capture(o);
                claimed.insert(o.sequence);
                continue;
            }
            let later = (k + 1..steps.len()).find(|&j| steps[j].matches(o));
            if let Some(j) = later {
                match (k..j).find(|&i| !satisfied(&counts, i)) {
                    None if steps[j].is_never() => {
                        result.failures.push(
                            UnexpectedInvocation::excess(o, 1).into());
                        result.claimed = claimed;
                        return;
                    },
                    None => {
                        k = j;
                        counts[k] += 1;
                        steps[k].capture(o);
                        claimed.insert(o.sequence);
                        continue;
                    },
                    Some(i) if steps[i].has_signature_of(o) => {
                        result.failures.push(UnexpectedInvocation::before(o,
                            &steps[i].describe()).into());
                        result.claimed = claimed;
                        return;
                    },
                    // Belongs further on; until then it is a gap
                    Some(_) => ()
                }
            } else if k < steps.len() && steps[k].matches(o) {
                if steps[k].is_never() || !in_skip(&counts, k) {
                    result.failures.push(
                        UnexpectedInvocation::excess(o, 1).into());
                    result.claimed = claimed;
                    return;
                }
                continue;
            }
            if self.mode.is_full() && !in_skip(&counts, k) &&
                self.is_in_scope(o)
            {
                result.failures.push(
                    UnexpectedInvocation::unverified(o).into());
                result.claimed = claimed;
                return;
            }
        }

        if let Some(i) = (k..steps.len()).find(|&i| !satisfied(&counts, i)) {
            let deficit = steps[i].min() - counts[i];
            result.failures.push(self.missing(steps[i], deficit));
        }
        result.claimed = claimed;
    }
}

#[cfg(test)]
mod t {
    use super::*;
    use crate::{
        expectation::{Expect, Purpose},
        log::Call,
        signature::InvocationSignature,
        times::Times
    };

    fn sig(member: &str) -> InvocationSignature {
        InvocationSignature::instance("Dependency", member,
                                      Vec::<String>::new())
    }

    fn step(member: &str) -> Step {
        let e = Expect::call(&sig(member));
        Step::Expect(Expectation::new(e, Purpose::Verification,
                                      Times::at_least(1)).unwrap())
    }

    fn log(members: &[&str]) -> InvocationLog {
        let mut log = InvocationLog::default();
        for m in members {
            log.append(Call::new(&sig(m)));
        }
        log
    }

    fn verify(log: &InvocationLog, mode: VerificationMode, steps: &[Step])
        -> VerificationResult
    {
        let committed = BTreeSet::new();
        let v = Verifier{log, committed: &committed, mode, iterations: 1,
                         max_listed: 10, scope: &[]};
        let mut result = VerificationResult::new(mode, 0);
        v.run(steps, &mut result);
        result
    }

    #[test]
    fn ordered_tolerates_gaps() {
        let l = log(&["a", "b", "c", "d"]);
        let r = verify(&l, VerificationMode::Ordered, &[step("a"), step("d")]);
        assert!(r.is_ok(), "{:?}", r.failures());
        assert_eq!(vec![0, 3], r.verified_invocations().collect::<Vec<_>>());
    }

    /// A call that belongs to a later step is a gap until the walk gets
    /// there.
    #[test]
    fn ordered_reversed() {
        let l = log(&["b", "a"]);
        let r = verify(&l, VerificationMode::Ordered, &[step("a"), step("b")]);
        assert_eq!(0, r.unexpected_observations().count());
        let m = r.unmatched_expectations().next().unwrap();
        assert_eq!("Dependency#b()", m.expected);
        assert_eq!(vec![1], r.verified_invocations().collect::<Vec<_>>());
    }

    #[test]
    fn ordered_never_step_ahead() {
        let never = Expect::call(&sig("b")).never();
        let never = Expectation::new(never, Purpose::Verification,
                                     Times::at_least(1)).unwrap();
        let l = log(&["a", "b"]);
        let r = verify(&l, VerificationMode::Ordered,
                       &[step("a"), Step::Expect(never)]);
        let u = r.unexpected_observations().next().unwrap();
        assert_eq!(1, u.invocation.sequence);
    }

    #[test]
    fn ordered_never_reached() {
        let l = log(&["a"]);
        let r = verify(&l, VerificationMode::Ordered, &[step("a"), step("b")]);
        let m = r.unmatched_expectations().next().unwrap();
        assert_eq!("Dependency#b()", m.expected);
    }

    #[test]
    fn full_ordered_with_skip() {
        let l = log(&["a", "b", "c", "d"]);
        let ok = verify(&l, VerificationMode::FullOrdered,
                        &[step("a"), Step::Skip, step("d")]);
        assert!(ok.is_ok(), "{:?}", ok.failures());
        let bad = verify(&l, VerificationMode::FullOrdered,
                         &[step("a"), Step::Skip, step("c")]);
        let u = bad.unexpected_observations().next().unwrap();
        assert_eq!(3, u.invocation.sequence);
    }

    #[test]
    fn unordered_counts_anywhere() {
        let l = log(&["b", "a", "b"]);
        let r = verify(&l, VerificationMode::Unordered,
                       &[step("a"), step("b")]);
        assert!(r.is_ok());
        assert_eq!(3, r.verified_invocations().count());
    }

    #[test]
    fn scope_covers_owner_type() {
        let mut l = log(&["a"]);
        let other = InvocationSignature::static_method("Other", "f",
                                                       Vec::<String>::new());
        l.append(Call::new(&other));
        let committed = BTreeSet::new();
        let scope = [Scope::of_type("Dependency")];
        let v = Verifier{log: &l, committed: &committed,
                         mode: VerificationMode::Full, iterations: 1,
                         max_listed: 10, scope: &scope};
        let mut r = VerificationResult::new(VerificationMode::Full, 0);
        v.run(&[step("a")], &mut r);
        assert!(r.is_ok(), "{:?}", r.failures());
    }

    #[test]
    fn full_reports_the_first_unverified() {
        let l = log(&["a", "b", "c"]);
        let r = verify(&l, VerificationMode::Full, &[step("a")]);
        let u = r.unexpected_observations().collect::<Vec<_>>();
        assert_eq!(1, u.len());
        assert_eq!(1, u[0].invocation.sequence);
    }
}
