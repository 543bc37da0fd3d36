// vim: tw=80
//! Intercepting calls by hand.
//!
//! The engine doesn't rewrite code.  Something has to report every call to a
//! mocked type before it runs, and fall back to the real code when the
//! session says the call isn't intercepted.  Here that is a small wrapper
//! around a `Ledger`, which routes `deposit` and `balance` through a
//! [`Session`].

use std::sync::Mutex;

use replaymock::*;
use replaymock::matcher::*;

#[derive(Debug, Default)]
pub struct Ledger {
    balance: Mutex<i64>
}

impl Ledger {
    pub fn deposit(&self, amount: i64) -> Result<i64, String> {
        if amount <= 0 {
            return Err(format!("cannot deposit {}", amount));
        }
        let mut b = self.balance.lock().map_err(|e| e.to_string())?;
        *b += amount;
        Ok(*b)
    }

    pub fn balance(&self) -> i64 {
        self.balance.lock().map(|b| *b).unwrap_or_default()
    }
}

fn deposit_sig() -> InvocationSignature {
    InvocationSignature::instance("Ledger", "deposit", ["i64"])
}

fn balance_sig() -> InvocationSignature {
    InvocationSignature::instance("Ledger", "balance", Vec::<String>::new())
}

/// Reports every call to the session before running it.
pub struct InterceptedLedger<'a> {
    session: &'a Session,
    this: ObjectRef,
    real: Ledger
}

impl<'a> InterceptedLedger<'a> {
    pub fn new(session: &'a Session) -> Self {
        InterceptedLedger {
            session,
            this: ObjectRef::new(()),
            real: Ledger::default()
        }
    }

    pub fn instance(&self) -> &ObjectRef {
        &self.this
    }

    pub fn deposit(&self, amount: i64) -> Result<i64, String> {
        let call = Call::new(&deposit_sig()).on(&self.this).with_args([amount]);
        match self.session.invoke(call) {
            Ok(Completion::Returned(Value::Int(b))) => Ok(b),
            Ok(Completion::Returned(v)) => Err(format!("bad result {}", v)),
            Ok(Completion::Threw(v)) => Err(v.to_string()),
            Ok(Completion::NotIntercepted) => self.real.deposit(amount),
            Err(e) => panic!("{}", e)
        }
    }

    pub fn balance(&self) -> i64 {
        let call = Call::new(&balance_sig()).on(&self.this);
        match self.session.invoke(call) {
            Ok(Completion::Returned(Value::Int(b))) => b,
            Ok(Completion::NotIntercepted) => self.real.balance(),
            Ok(c) => panic!("balance cannot complete with {:?}", c),
            Err(e) => panic!("{}", e)
        }
    }
}

fn main() {
    let session = Session::new();
    let ledger = InterceptedLedger::new(&session);

    let mut r = session.begin_recording(Discipline::NonStrict, 1)
        .expect("recording");
    r.record(Expect::call(&deposit_sig())
             .with(args![ne(0)])
             .throws("ledger is frozen"))
        .expect("record");
    r.end();

    println!("deposit(10) = {:?}", ledger.deposit(10));
    println!("balance() = {}", ledger.balance());

    let mut v = session.begin_verification(VerificationMode::FullOrdered, 1)
        .expect("verification");
    v.verify(Expect::call(&deposit_sig()).on(ledger.instance()))
        .expect("verify");
    v.verify(Expect::call(&balance_sig())).expect("verify");
    match v.end().into_result() {
        Ok(()) => println!("verified"),
        Err(e) => println!("{}", e)
    }
}

#[test]
fn frozen_ledger() {
    let session = Session::new();
    let ledger = InterceptedLedger::new(&session);
    let mut r = session.begin_recording(Discipline::Strict, 1).unwrap();
    r.record(Expect::call(&deposit_sig()).with(args![5i64]).returns(105))
        .unwrap();
    r.record(Expect::call(&balance_sig()).returns(105)).unwrap();
    r.end();

    assert_eq!(Ok(105), ledger.deposit(5));
    assert_eq!(105, ledger.balance());
    session.checkpoint().unwrap();
}

#[test]
fn real_ledger() {
    let session = Session::new();
    let ledger = InterceptedLedger::new(&session);
    assert_eq!(Ok(7), ledger.deposit(7));
    assert!(ledger.deposit(-1).is_err());
    assert_eq!(7, ledger.balance());

    let mut v = session.begin_verification(VerificationMode::Unordered, 1)
        .unwrap();
    v.verify(Expect::call(&deposit_sig()).times(2)).unwrap();
    v.end().assert_ok();
}
