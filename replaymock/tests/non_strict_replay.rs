// vim: tw=80
//! Non-strict recordings: any order, latest matching expectation wins.
#![deny(warnings)]

use pretty_assertions::assert_eq;
use replaymock::*;
use replaymock::matcher::*;

fn foo() -> InvocationSignature {
    InvocationSignature::instance("Dependency", "foo", ["int"])
}

fn record(session: &Session, expectations: Vec<Expect>) {
    let mut r = session.begin_recording(Discipline::NonStrict, 1).unwrap();
    for e in expectations {
        r.record(e).unwrap();
    }
    r.end();
}

fn returned(session: &Session, arg: i32) -> Value {
    match session.invoke(Call::new(&foo()).with_args([arg])).unwrap() {
        Completion::Returned(v) => v,
        c => panic!("Unexpected completion {:?}", c)
    }
}

#[test]
fn specific_after_wildcard() {
    let session = Session::new();
    record(&session, vec![
        Expect::call(&foo()).with(args![instance_of::<i64>()]).returns(1),
        Expect::call(&foo()).with(args![5]).returns(2),
    ]);
    assert_eq!(Value::from(2), returned(&session, 5));
    assert_eq!(Value::from(1), returned(&session, 9));
}

/// A wildcard recorded after a literal shadows it.
#[test]
fn wildcard_after_specific() {
    let session = Session::new();
    record(&session, vec![
        Expect::call(&foo()).with(args![5]).returns(2),
        Expect::call(&foo()).with(args![any()]).returns(1),
    ]);
    assert_eq!(Value::from(1), returned(&session, 5));
    assert_eq!(Value::from(1), returned(&session, 9));
}

#[test]
fn override_law() {
    let session = Session::new();
    record(&session, vec![
        Expect::call(&foo()).with(args![3]).returns("A"),
    ]);
    record(&session, vec![
        Expect::call(&foo()).with(args![3]).returns("B"),
    ]);
    for _ in 0..3 {
        assert_eq!(Value::from("B"), returned(&session, 3));
    }
    session.checkpoint().unwrap();
}

#[test]
fn unmatched_calls_pass_through() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).with(args![1])]);
    assert!(session.observe(Call::new(&foo()).with_args([2])).is_no_match());
    let bar = InvocationSignature::static_method("Other", "bar",
                                                 Vec::<String>::new());
    assert!(session.observe(Call::new(&bar)).is_no_match());
}

#[test]
fn exhausted_expectation() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).times(1).returns(1)]);
    assert_eq!(Value::from(1), returned(&session, 0));
    let e = session.invoke(Call::new(&foo()).with_args([0])).unwrap_err();
    assert_eq!("1 unexpected invocation to:\nDependency#foo(0)",
               e.to_string());
}

#[test]
fn forbidden_call() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).never()]);
    let r = session.observe(Call::new(&foo()).with_args([0]));
    assert!(r.is_fail());
}

/// Exhausting one expectation lets an older one take over.
#[test]
fn falls_back_to_older_expectation() {
    let session = Session::new();
    record(&session, vec![
        Expect::call(&foo()).times(..).returns("old"),
        Expect::call(&foo()).with(args![5]).times(1).returns("new"),
    ]);
    assert_eq!(Value::from("new"), returned(&session, 5));
    assert_eq!(Value::from("old"), returned(&session, 5));
}

#[test]
fn called_at_least_once_by_default() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).returns(1)]);
    let e = session.checkpoint().unwrap_err();
    assert!(e.is_missing());
    assert_eq!("Missing invocation to:\nDependency#foo(int)", e.to_string());
}

#[test]
fn no_maximum_by_default() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).returns(1)]);
    for i in 0..3 {
        assert_eq!(Value::from(1), returned(&session, i));
    }
    session.checkpoint().unwrap();
}

#[test]
fn optional_when_stated() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).times(..).returns(1)]);
    session.checkpoint().unwrap();
}

#[test]
fn explicit_minimum_is_checked() {
    let session = Session::new();
    record(&session, vec![Expect::call(&foo()).with(args![7]).times(1..)]);
    assert!(session.observe(Call::new(&foo()).with_args([8])).is_no_match());
    let e = session.checkpoint().unwrap_err();
    assert_eq!("Missing invocation to:\n\
               Dependency#foo(int)\n   with arguments: 7\n\
               instead got:\n   \
               Dependency#foo(8)", e.to_string());
}

#[test]
fn iterations_scale_bounds() {
    let session = Session::new();
    let mut r = session.begin_recording(Discipline::NonStrict, 3).unwrap();
    r.record(Expect::call(&foo()).times(1)).unwrap();
    r.end();
    for _ in 0..3 {
        returned(&session, 0);
    }
    assert!(session.observe(Call::new(&foo()).with_args([0])).is_fail());
}

#[test]
fn instance_binding() {
    #[derive(Debug, PartialEq)]
    struct Dependency(&'static str);

    let a = ObjectRef::new(Dependency("a"));
    let b = ObjectRef::new(Dependency("b"));
    let session = Session::new();
    record(&session, vec![
        Expect::call(&foo()).returns("any"),
        Expect::call(&foo()).on(&a).returns("a"),
    ]);
    let on = |o: &ObjectRef| session.invoke(Call::new(&foo()).on(o)
                                                .with_args([0])).unwrap();
    assert_eq!(Completion::Returned("a".into()), on(&a));
    assert_eq!(Completion::Returned("any".into()), on(&b));
}

#[test]
fn mixed_with_strict() {
    let session = Session::new();
    let step = InvocationSignature::instance("Workflow", "step", ["int"]);
    let mut r = session.begin_recording(Discipline::Strict, 1).unwrap();
    r.record(Expect::call(&step).with(args![1])).unwrap();
    r.record(Expect::call(&step).with(args![2])).unwrap();
    r.end();
    record(&session, vec![Expect::call(&foo()).returns(0)]);

    returned(&session, 0);
    session.invoke(Call::new(&step).with_args([1])).unwrap();
    returned(&session, 0);
    session.invoke(Call::new(&step).with_args([2])).unwrap();
    session.checkpoint().unwrap();
}
