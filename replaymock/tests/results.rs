// vim: tw=80
//! Result queues, thrown values and delegates.
#![deny(warnings)]

use pretty_assertions::assert_eq;
use replaymock::*;
use replaymock::matcher::*;

fn next_id() -> InvocationSignature {
    InvocationSignature::instance("Sequence", "nextId", Vec::<String>::new())
}

fn record(session: &Session, discipline: Discipline, e: Expect) {
    let mut r = session.begin_recording(discipline, 1).unwrap();
    r.record(e).unwrap();
    r.end();
}

fn invoke(session: &Session) -> Completion {
    session.invoke(Call::new(&next_id())).unwrap()
}

#[test]
fn queue_advances_then_repeats() {
    let session = Session::new();
    record(&session, Discipline::NonStrict,
           Expect::call(&next_id()).returns_each([1, 2, 3]));
    for expected in [1, 2, 3, 3, 3] {
        assert_eq!(Completion::Returned(expected.into()), invoke(&session));
    }
}

#[test]
fn first_result_applies_first() {
    let session = Session::new();
    record(&session, Discipline::NonStrict,
           Expect::call(&next_id()).returns(10).returns(20));
    match session.observe(Call::new(&next_id())) {
        ReplayOutcome::Apply(a) => {
            assert!(matches!(a.action(), ResultAction::Return(Value::Int(10))));
        },
        o => panic!("Unexpected outcome {:?}", o)
    }
    assert_eq!(Completion::Returned(20.into()), invoke(&session));
    assert_eq!(Completion::Returned(20.into()), invoke(&session));
}

/// In a strict recording, extra results allow extra calls.
#[test]
fn strict_results_widen_count() {
    let session = Session::new();
    record(&session, Discipline::Strict,
           Expect::call(&next_id()).returns(1).returns(2));
    assert_eq!(Completion::Returned(1.into()), invoke(&session));
    assert_eq!(Completion::Returned(2.into()), invoke(&session));
    assert!(session.invoke(Call::new(&next_id())).is_err());
}

#[test]
fn returns_then_throws() {
    let session = Session::new();
    record(&session, Discipline::NonStrict,
           Expect::call(&next_id()).returns(1).throws("exhausted"));
    assert_eq!(Completion::Returned(1.into()), invoke(&session));
    assert_eq!(Completion::Threw("exhausted".into()), invoke(&session));
    assert_eq!(Some(Err("exhausted".into())), invoke(&session).into_result());
}

#[test]
fn delegate_receives_invocation() {
    let square = InvocationSignature::static_method("Math", "square", ["int"]);
    let session = Session::new();
    let mut r = session.begin_recording(Discipline::NonStrict, 1).unwrap();
    r.record(Expect::call(&square).with(args![any()]).delegate(|i| {
        match i.arguments()[0] {
            Value::Int(x) if x >= 0 => Ok(Value::Int(x * x)),
            ref v => Err(format!("bad argument {}", v).into())
        }
    })).unwrap();
    r.end();
    let call = |x: i32| session.invoke(Call::new(&square).with_args([x]))
        .unwrap();
    assert_eq!(Completion::Returned(49.into()), call(7));
    assert_eq!(Completion::Threw("bad argument -1".into()), call(-1));
}

#[test]
fn delegate_sees_invocation_count() {
    let session = Session::new();
    record(&session, Discipline::NonStrict,
           Expect::call(&next_id())
               .delegate(|i| Ok((i.invocation_count() as i64 * 100).into())));
    assert_eq!(Completion::Returned(100.into()), invoke(&session));
    assert_eq!(Completion::Returned(200.into()), invoke(&session));
}

#[test]
fn delegate_sees_instance() {
    #[derive(Debug, PartialEq)]
    struct Counter(i64);

    let get = InvocationSignature::instance("Counter", "get",
                                            Vec::<String>::new());
    let session = Session::new();
    record(&session, Discipline::NonStrict, Expect::call(&get).delegate(|i| {
        let c = i.instance()
            .and_then(|o| o.downcast_ref::<Counter>())
            .map(|c| c.0)
            .unwrap_or(-1);
        Ok(c.into())
    }));
    let counter = ObjectRef::new(Counter(42));
    assert_eq!(Completion::Returned(42.into()),
               session.invoke(Call::new(&get).on(&counter)).unwrap());
}

#[test]
fn single_threaded_delegate() {
    use std::{cell::RefCell, rc::Rc};

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen2 = seen.clone();
    let session = Session::new();
    record(&session, Discipline::NonStrict,
           Expect::call(&next_id()).result(ResultAction::delegate_st(
               move |i| {
                   seen2.borrow_mut().push(i.sequence());
                   Ok(Value::Null)
               })));
    invoke(&session);
    invoke(&session);
    assert_eq!(vec![0, 1], *seen.borrow());
}

#[test]
fn no_results_returns_null() {
    let session = Session::new();
    record(&session, Discipline::NonStrict, Expect::call(&next_id()));
    assert_eq!(Completion::Returned(Value::Null), invoke(&session));
}
