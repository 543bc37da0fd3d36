// vim: tw=80
//! The record, replay, verify cycle of one test.

use std::{
    cell::RefCell,
    collections::BTreeSet,
    sync::{Mutex, MutexGuard},
    thread
};

use tracing::{debug, trace, warn};

use crate::{
    action::{Completion, Invocation, ResultAction},
    config::Config,
    error::{Error, Misuse},
    expectation::{Expect, Expectation, Purpose},
    log::{Call, InvocationLog},
    record::{Discipline, ExpectationSet, Resolution},
    verify::{Scope, Step, VerificationMode, VerificationResult, Verifier}
};

thread_local! {
    /// Addresses of the sessions whose lock this thread holds.
    static ENGAGED: RefCell<BTreeSet<usize>> =
        const { RefCell::new(BTreeSet::new()) };
}

/// Marks the current thread as inside one session until dropped.
struct Engaged(usize);

impl Engaged {
    /// Returns `None` if this thread is already inside `session`, which
    /// happens when an argument matcher calls back into it.
    fn enter(session: &Session) -> Option<Self> {
        let addr = session as *const Session as usize;
        ENGAGED.with(|e| {
            if e.borrow_mut().insert(addr) {
                Some(Engaged(addr))
            } else {
                None
            }
        })
    }
}

impl Drop for Engaged {
    fn drop(&mut self) {
        ENGAGED.with(|e| e.borrow_mut().remove(&self.0));
    }
}

fn reentered() -> Error {
    Misuse::new("An argument matcher called back into the mocking engine")
        .into()
}

/// Where a session is in its cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// A recording block is open.  Calls cannot be observed.
    Recording,
    /// Calls are matched against the recorded expectations.
    Replaying
}

/// What the engine decided about one observed call.
#[derive(Debug)]
pub enum ReplayOutcome {
    /// A recorded expectation applies.  Its action is the effective
    /// outcome of the call.
    Apply(Applied),
    /// No recorded expectation applies.  Run the real code.
    NoMatch,
    /// The call should not have happened.
    Fail(Error)
}

impl ReplayOutcome {
    pub fn is_apply(&self) -> bool {
        matches!(self, ReplayOutcome::Apply(_))
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, ReplayOutcome::NoMatch)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, ReplayOutcome::Fail(_))
    }
}

/// A matched call and the action to apply to it.
#[derive(Clone, Debug)]
pub struct Applied {
    action: ResultAction,
    invocation: Invocation
}

impl Applied {
    pub fn action(&self) -> &ResultAction {
        &self.action
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    /// Carry out the action.  Delegates run on the calling thread.
    pub fn perform(&self) -> Completion {
        self.action.perform(&self.invocation)
    }
}

struct State {
    phase: Phase,
    /// Incremented whenever a new cycle starts.
    cycle: u64,
    expectations: ExpectationSet,
    log: InvocationLog,
    /// Invocations verified by completed verification blocks.
    claimed: BTreeSet<usize>,
    /// The strict failure that aborted this cycle, if any.
    poisoned: Option<Error>
}

impl State {
    fn new(cycle: u64) -> Self {
        State {
            phase: Phase::Replaying,
            cycle,
            expectations: ExpectationSet::default(),
            log: InvocationLog::default(),
            claimed: BTreeSet::new(),
            poisoned: None
        }
    }

    fn is_pristine(&self) -> bool {
        self.log.is_empty() && self.claimed.is_empty() &&
            self.poisoned.is_none()
    }
}

/// Owns the expectations and the invocation log of one test.
///
/// A `Session` is `Sync`: calls may be observed from any number of threads.
/// All bookkeeping happens under one lock, but delegates run after it is
/// released, so a delegate may itself make intercepted calls.
///
/// ```
/// use replaymock::*;
///
/// let sig = InvocationSignature::instance("Dependency", "compute",
///                                         ["int"]);
/// let session = Session::new();
/// let mut recording = session.begin_recording(Discipline::Strict, 1)
///     .unwrap();
/// recording.record(Expect::call(&sig).with(args![5]).returns(25)).unwrap();
/// recording.end();
///
/// let call = Call::new(&sig).with_args([5]);
/// assert_eq!(Completion::Returned(25.into()),
///            session.invoke(call).unwrap());
/// session.checkpoint().unwrap();
/// ```
pub struct Session {
    config: Config,
    state: Mutex<State>
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Session{config, state: Mutex::new(State::new(0))}
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        }
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Start a recording block.
    ///
    /// The block is repeated `iterations` times: a strict block expects its
    /// whole sequence that many times, and a non-strict block multiplies
    /// every expectation's bounds.  Several blocks may be recorded before
    /// replay begins; recording after any call was observed starts a new
    /// cycle, discarding the old expectations and log.
    pub fn begin_recording(&self, discipline: Discipline, iterations: usize)
        -> Result<Recording<'_>, Error>
    {
        if iterations == 0 {
            return Err(Misuse::new(
                "A recording block must have at least one iteration").into());
        }
        let mut state = self.lock();
        if state.phase == Phase::Recording {
            return Err(Misuse::new(
                "Cannot begin a recording inside another recording").into());
        }
        if !state.is_pristine() {
            let cycle = state.cycle + 1;
            *state = State::new(cycle);
            debug!(cycle, "new cycle");
        }
        state.phase = Phase::Recording;
        debug!(?discipline, iterations, "recording started");
        Ok(Recording {
            session: self,
            discipline,
            iterations,
            block: Some(Vec::new())
        })
    }

    /// Report one intercepted call and find out what it should do.
    ///
    /// The call is appended to the invocation log before it is matched.
    pub fn observe(&self, call: Call) -> ReplayOutcome {
        let engaged = match Engaged::enter(self) {
            Some(e) => e,
            None => return ReplayOutcome::Fail(reentered())
        };
        let mut state = self.lock();
        if state.phase == Phase::Recording {
            return ReplayOutcome::Fail(Misuse::new(format!(
                "{} was called while a recording block is open",
                call.signature)).into());
        }
        if let Some(e) = &state.poisoned {
            return ReplayOutcome::Fail(e.clone());
        }
        let State{log, expectations, poisoned, ..} = &mut *state;
        let observed = log.append(call);
        trace!(invocation = %observed, sequence = observed.sequence,
               "observed");
        let outcome = match expectations.resolve(observed) {
            Resolution::Consumed{action, count} => {
                trace!(?action, count, "applied");
                ReplayOutcome::Apply(Applied {
                    action,
                    invocation: Invocation::new(observed.clone(), count)
                })
            },
            Resolution::NoMatch => {
                trace!("no match");
                ReplayOutcome::NoMatch
            },
            Resolution::Unexpected{error, strict} => {
                warn!(%error, strict, "unexpected invocation");
                let error = Error::from(error);
                if strict {
                    *poisoned = Some(error.clone());
                }
                ReplayOutcome::Fail(error)
            }
        };
        drop(state);
        drop(engaged);
        outcome
    }

    /// Observe a call and carry out whatever it should do.
    ///
    /// Delegates run after the session lock is released.
    pub fn invoke(&self, call: Call) -> Result<Completion, Error> {
        match self.observe(call) {
            ReplayOutcome::Apply(applied) => Ok(applied.perform()),
            ReplayOutcome::NoMatch => Ok(Completion::NotIntercepted),
            ReplayOutcome::Fail(e) => Err(e)
        }
    }

    /// Start a verification block over the calls observed so far.
    ///
    /// Ordered blocks repeat their steps `iterations` times; unordered
    /// blocks multiply every expectation's bounds.
    pub fn begin_verification(&self, mode: VerificationMode,
                              iterations: usize)
        -> Result<Verification<'_>, Error>
    {
        if iterations == 0 {
            return Err(Misuse::new(
                "A verification block must have at least one iteration")
                .into());
        }
        if self.phase() == Phase::Recording {
            return Err(Misuse::new(
                "Cannot verify while a recording block is open").into());
        }
        debug!(?mode, iterations, "verification started");
        Ok(Verification {
            session: self,
            mode,
            iterations,
            steps: Vec::new(),
            scope: Vec::new()
        })
    }

    /// The calls observed so far in this cycle.
    pub fn invocations(&self) -> InvocationLog {
        self.lock().log.clone()
    }

    /// End the cycle: check that every recorded expectation got at least
    /// its minimum number of calls, then start over with no expectations
    /// and an empty log.
    ///
    /// If a strict failure happened during replay, that failure is
    /// returned.
    pub fn checkpoint(&self) -> Result<(), Error> {
        let _engaged = Engaged::enter(self).ok_or_else(reentered)?;
        let mut state = self.lock();
        if state.phase == Phase::Recording {
            return Err(Misuse::new(
                "Cannot checkpoint while a recording block is open").into());
        }
        let r = match state.poisoned.take() {
            Some(e) => Err(e),
            None => state.expectations
                .check_missing(&state.log, self.config.max_listed_invocations)
                .map_err(Error::from)
        };
        let cycle = state.cycle + 1;
        *state = State::new(cycle);
        debug!(cycle, ok = r.is_ok(), "checkpoint");
        r
    }

    fn end_recording(&self, discipline: Discipline, block: Vec<Expectation>,
                     iterations: usize)
    {
        let mut state = self.lock();
        debug!(?discipline, expectations = block.len(), "recording ended");
        state.expectations.add_block(discipline, block, iterations);
        state.phase = Phase::Replaying;
    }

    fn end_verification(&self, block: &Verification<'_>)
        -> VerificationResult
    {
        let Verification{mode, iterations, steps, scope, ..} = block;
        let (mode, iterations) = (*mode, *iterations);
        let mut state = self.lock();
        let mut result = VerificationResult::new(mode, state.cycle);
        {
            let verifier = Verifier {
                log: &state.log,
                committed: &state.claimed,
                mode,
                iterations,
                max_listed: self.config.max_listed_invocations,
                scope
            };
            verifier.run(steps, &mut result);
        }
        state.claimed.extend(result.claimed().iter().copied());
        debug!(?mode, failures = result.failures().len(),
               "verification ended");
        result
    }

    fn cycle(&self) -> u64 {
        self.lock().cycle
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.config.verify_on_drop && !thread::panicking() {
            if let Err(e) = self.checkpoint() {
                panic!("{}", e);
            }
        }
    }
}

/// An open recording block.  Expectations take effect when it ends.
///
/// Dropping an unended `Recording` ends it.
pub struct Recording<'a> {
    session: &'a Session,
    discipline: Discipline,
    iterations: usize,
    block: Option<Vec<Expectation>>
}

impl Recording<'_> {
    /// Record one expectation.  Fails immediately if it is malformed.
    pub fn record(&mut self, e: Expect) -> Result<&mut Self, Error> {
        let config = &self.session.config;
        let default_times = match self.discipline {
            Discipline::Strict => config.default_times,
            Discipline::NonStrict => config.non_strict_times
        };
        let e = Expectation::new(e, Purpose::Recording, default_times)?;
        if let Some(block) = self.block.as_mut() {
            block.push(e);
        }
        Ok(self)
    }

    /// Finish the block and switch the session to replaying.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(block) = self.block.take() {
            self.session.end_recording(self.discipline, block,
                                       self.iterations);
        }
    }
}

impl Drop for Recording<'_> {
    fn drop(&mut self) {
        self.finish();
    }
}

/// An open verification block.
pub struct Verification<'a> {
    session: &'a Session,
    mode: VerificationMode,
    iterations: usize,
    steps: Vec<Step>,
    scope: Vec<Scope>
}

impl Verification<'_> {
    /// Declare one expected call.  Fails immediately if it is malformed.
    pub fn verify(&mut self, e: Expect) -> Result<&mut Self, Error> {
        let times = self.session.config.verification_times;
        let e = Expectation::new(e, Purpose::Verification, times)?;
        self.steps.push(Step::Expect(e));
        Ok(self)
    }

    /// Allow any number of unverified calls at this point of an ordered
    /// verification.
    pub fn skip(&mut self) -> Result<&mut Self, Error> {
        if !self.mode.is_ordered() {
            return Err(Misuse::new(
                "Skip markers are only allowed in ordered verifications")
                .into());
        }
        self.steps.push(Step::Skip);
        Ok(self)
    }

    /// Place the calls verified by an earlier unordered block at this point
    /// of an ordered verification.
    pub fn verified(&mut self, earlier: &VerificationResult)
        -> Result<&mut Self, Error>
    {
        if !self.mode.is_ordered() {
            return Err(Misuse::new("Previously verified invocations can only \
                be placed in an ordered verification").into());
        }
        if earlier.mode().is_ordered() {
            return Err(Misuse::new("Only invocations verified by an unordered \
                block can be placed in an ordered verification").into());
        }
        if self.iterations != 1 {
            return Err(Misuse::new("Previously verified invocations cannot be \
                placed in an iterated verification").into());
        }
        if earlier.cycle() != self.session.cycle() {
            return Err(Misuse::new(
                "That verification belongs to an earlier cycle").into());
        }
        self.steps.push(Step::Verified(earlier.claimed().clone()));
        Ok(self)
    }

    /// Limit a full verification to calls covered by `scope`.  May be
    /// given more than once; unverified calls outside every scope are
    /// allowed.
    pub fn only(&mut self, scope: Scope) -> Result<&mut Self, Error> {
        if !self.mode.is_full() {
            return Err(Misuse::new(
                "Only a full verification can be limited in scope").into());
        }
        self.scope.push(scope);
        Ok(self)
    }

    /// Check the block against the invocations observed so far.
    ///
    /// The invocations it verifies are excluded from later blocks, whether
    /// or not it passed.
    pub fn end(self) -> VerificationResult {
        match Engaged::enter(self.session) {
            Some(_engaged) => self.session.end_verification(&self),
            None => {
                let mut result = VerificationResult::new(self.mode, 0);
                result.push(reentered());
                result
            }
        }
    }
}
