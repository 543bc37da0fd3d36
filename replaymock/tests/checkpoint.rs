// vim: tw=80
//! Checkpoints, cycles and verification on drop.
#![deny(warnings)]

use pretty_assertions::assert_eq;
use replaymock::*;

fn sig(member: &str) -> InvocationSignature {
    InvocationSignature::instance("Dependency", member, Vec::<String>::new())
}

fn record(session: &Session, discipline: Discipline, e: Expect) {
    let mut r = session.begin_recording(discipline, 1).unwrap();
    r.record(e).unwrap();
    r.end();
}

#[test]
fn checkpoint_starts_over() {
    let session = Session::new();
    record(&session, Discipline::NonStrict, Expect::call(&sig("a")).returns(1));
    assert!(session.observe(Call::new(&sig("a"))).is_apply());
    session.checkpoint().unwrap();
    assert!(session.invocations().is_empty());
    assert!(session.observe(Call::new(&sig("a"))).is_no_match());
    assert_eq!(1, session.invocations().len());
    assert_eq!(0, session.invocations().get(0).unwrap().sequence);
}

#[test]
fn blocks_accumulate_before_replay() {
    let session = Session::new();
    record(&session, Discipline::NonStrict, Expect::call(&sig("a")).returns(1));
    record(&session, Discipline::NonStrict, Expect::call(&sig("b")).returns(2));
    assert_eq!(Completion::Returned(1.into()),
               session.invoke(Call::new(&sig("a"))).unwrap());
    assert_eq!(Completion::Returned(2.into()),
               session.invoke(Call::new(&sig("b"))).unwrap());
}

/// Recording after calls were observed begins a new cycle.
#[test]
fn recording_after_replay() {
    let session = Session::new();
    record(&session, Discipline::Strict, Expect::call(&sig("a")));
    session.invoke(Call::new(&sig("a"))).unwrap();
    record(&session, Discipline::Strict, Expect::call(&sig("b")));
    assert!(session.invocations().is_empty());
    session.invoke(Call::new(&sig("b"))).unwrap();
    session.checkpoint().unwrap();
}

#[test]
fn checkpoint_after_failure_starts_over() {
    let session = Session::new();
    record(&session, Discipline::Strict, Expect::call(&sig("a")));
    assert!(session.invoke(Call::new(&sig("b"))).is_err());
    assert!(session.checkpoint().is_err());
    assert!(session.observe(Call::new(&sig("b"))).is_no_match());
    session.checkpoint().unwrap();
}

#[test]
fn claims_do_not_survive_a_checkpoint() {
    let session = Session::new();
    session.observe(Call::new(&sig("a")));
    let mut v = session.begin_verification(VerificationMode::Unordered, 1)
        .unwrap();
    v.verify(Expect::call(&sig("a"))).unwrap();
    v.end().assert_ok();
    session.checkpoint().unwrap();
    session.observe(Call::new(&sig("a")));
    let mut v = session.begin_verification(VerificationMode::Full, 1)
        .unwrap();
    v.verify(Expect::call(&sig("a"))).unwrap();
    v.end().assert_ok();
}

#[test]
fn verify_on_drop_satisfied() {
    let session = Session::with_config(Config::default().verify_on_drop(true));
    record(&session, Discipline::Strict, Expect::call(&sig("a")));
    session.invoke(Call::new(&sig("a"))).unwrap();
}

#[test]
#[should_panic(expected = "Missing invocation to:\nDependency#a()")]
fn verify_on_drop_unsatisfied() {
    let session = Session::with_config(Config::default().verify_on_drop(true));
    record(&session, Discipline::Strict, Expect::call(&sig("a")));
}

/// A session dropped while unwinding must not panic again.
#[test]
#[should_panic(expected = "first failure")]
fn verify_on_drop_while_panicking() {
    let session = Session::with_config(Config::default().verify_on_drop(true));
    record(&session, Discipline::Strict, Expect::call(&sig("a")));
    panic!("first failure");
}

#[test]
fn configured_strict_default() {
    let session = Session::with_config(Config::default()
                                       .default_times(1..));
    record(&session, Discipline::Strict, Expect::call(&sig("a")));
    for _ in 0..3 {
        session.invoke(Call::new(&sig("a"))).unwrap();
    }
    session.checkpoint().unwrap();
}
