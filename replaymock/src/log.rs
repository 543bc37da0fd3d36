// vim: tw=80
//! The record of what actually happened during replay.

use std::fmt;

use crate::{
    signature::InvocationSignature,
    value::{display_args, ObjectRef, Value}
};

/// A call as reported by the instrumentation layer, before the engine has
/// seen it.
#[derive(Clone, Debug)]
pub struct Call {
    pub signature: InvocationSignature,
    pub instance: Option<ObjectRef>,
    pub arguments: Vec<Value>
}

impl Call {
    pub fn new(signature: &InvocationSignature) -> Self {
        Call {
            signature: signature.clone(),
            instance: None,
            arguments: Vec::new()
        }
    }

    /// The receiver, for instance methods and constructors.
    pub fn on(mut self, instance: &ObjectRef) -> Self {
        self.instance = Some(instance.clone());
        self
    }

    pub fn with_args<I, V>(mut self, args: I) -> Self
        where I: IntoIterator<Item=V>, V: Into<Value>
    {
        self.arguments = args.into_iter().map(Into::into).collect();
        self
    }
}

/// One entry in the [`InvocationLog`].  Immutable once logged.
#[derive(Clone, Debug)]
pub struct ObservedInvocation {
    pub signature: InvocationSignature,
    pub instance: Option<ObjectRef>,
    pub arguments: Vec<Value>,
    /// Position in the log.  Assigned in arrival order.
    pub sequence: usize
}

impl ObservedInvocation {
    /// The invoked member, without arguments.
    pub(crate) fn describe_member(&self) -> String {
        self.signature.to_string()
    }
}

impl fmt::Display for ObservedInvocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}({})", self.signature.owner(),
               self.signature.member(), display_args(&self.arguments))?;
        if let Some(instance) = &self.instance {
            write!(f, " on {}", instance)?;
        }
        Ok(())
    }
}

/// Append-only sequence of every call observed in one replay cycle.
#[derive(Clone, Debug, Default)]
pub struct InvocationLog(Vec<ObservedInvocation>);

impl InvocationLog {
    /// Log `call`, returning the entry as recorded.
    pub(crate) fn append(&mut self, call: Call) -> &ObservedInvocation {
        let sequence = self.0.len();
        self.0.push(ObservedInvocation {
            signature: call.signature,
            instance: call.instance,
            arguments: call.arguments,
            sequence
        });
        &self.0[sequence]
    }

    pub fn get(&self, sequence: usize) -> Option<&ObservedInvocation> {
        self.0.get(sequence)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObservedInvocation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'a> IntoIterator for &'a InvocationLog {
    type Item = &'a ObservedInvocation;
    type IntoIter = std::slice::Iter<'a, ObservedInvocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
