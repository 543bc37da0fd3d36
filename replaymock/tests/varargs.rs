// vim: tw=80
//! Variadic signatures.
#![deny(warnings)]

use pretty_assertions::assert_eq;
use replaymock::*;
use replaymock::matcher::*;

fn printf() -> InvocationSignature {
    InvocationSignature::static_method("Console", "printf",
                                       ["String", "Object"])
        .with_varargs()
}

fn printf_call(args: Vec<Value>) -> Call {
    Call::new(&printf()).with_args(args)
}

fn session_with(e: Expect) -> Session {
    let session = Session::new();
    let mut r = session.begin_recording(Discipline::NonStrict, 1).unwrap();
    r.record(e).unwrap();
    r.end();
    session
}

#[test]
fn displayed_with_ellipsis() {
    assert_eq!("Console#printf(String, Object...)", printf().to_string());
    assert_eq!(1, printf().fixed_arity());
    assert!(printf().accepts_arity(1));
    assert!(printf().accepts_arity(4));
    assert!(!printf().accepts_arity(0));
}

#[test]
fn each_trailing_argument() {
    let session = session_with(Expect::call(&printf())
        .with(args!["%d"])
        .with_each(instance_of::<i64>())
        .returns(true));
    for args in [vec!["%d".into()],
                 vec!["%d".into(), 1.into()],
                 vec!["%d".into(), 1.into(), 2.into(), 3.into()]]
    {
        assert!(session.observe(printf_call(args)).is_apply());
    }
    let bad = vec!["%d".into(), 1.into(), "x".into()];
    assert!(session.observe(printf_call(bad)).is_no_match());
}

#[test]
fn exact_trailing_count() {
    let session = session_with(Expect::call(&printf())
        .with(args![any_string(), 1, 2]));
    let two = vec!["%d %d".into(), 1.into(), 2.into()];
    assert!(session.observe(printf_call(two)).is_apply());
    let three = vec!["%d %d".into(), 1.into(), 2.into(), 3.into()];
    assert!(session.observe(printf_call(three)).is_no_match());
}

#[test]
fn unconstrained_arguments() {
    let session = session_with(Expect::call(&printf()));
    assert!(session.observe(printf_call(vec!["".into()])).is_apply());
    let many = vec!["".into(), Value::Null, 2.5.into()];
    assert!(session.observe(printf_call(many)).is_apply());
}

#[test]
fn described_in_failures() {
    let session = Session::new();
    session.observe(printf_call(vec!["%s".into(), 7.into()]));
    let mut v = session.begin_verification(VerificationMode::Unordered, 1)
        .unwrap();
    v.verify(Expect::call(&printf())
        .with(args![prefix("%s")])
        .with_each(null())).unwrap();
    let e = v.end().into_result().unwrap_err();
    assert_eq!("Missing invocation to:\n\
               Console#printf(String, Object...)\n   \
               with arguments: a string starting with \"%s\", null...\n\
               instead got:\n   \
               Console#printf(\"%s\", 7)", e.to_string());
}

#[test]
fn too_few_fixed_matchers() {
    let session = Session::new();
    let mut r = session.begin_recording(Discipline::NonStrict, 1).unwrap();
    let e = Expect::call(&printf()).with(args![]);
    assert!(r.record(e).err().unwrap().is_misuse());
}

#[test]
fn each_on_a_fixed_signature() {
    let println = InvocationSignature::static_method("Console", "println",
                                                     ["String"]);
    let session = Session::new();
    let mut r = session.begin_recording(Discipline::NonStrict, 1).unwrap();
    let e = Expect::call(&println).with_each(any());
    assert!(r.record(e).err().unwrap().is_misuse());
}

#[test]
fn variadic_without_parameters() {
    let broken = InvocationSignature::static_method("Console", "flush",
                                                    Vec::<String>::new())
        .with_varargs();
    let session = Session::new();
    let mut v = session.begin_verification(VerificationMode::Unordered, 1)
        .unwrap();
    assert!(v.verify(Expect::call(&broken)).err().unwrap().is_misuse());
}
