// vim: tw=80
//! Identification of intercepted methods and constructors.

use std::fmt;

use crate::{
    error::{Error, Misuse},
    value::ObjectRef
};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TargetKind {
    Static,
    Instance,
    Constructor
}

/// Identifies a method or constructor: owner type, member name and
/// parameter types.
///
/// Two signatures match when all of these are equal.  If the signature is
/// variadic, the last parameter type names the element type of the
/// variable-length tail.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct InvocationSignature {
    kind: TargetKind,
    owner: String,
    member: String,
    parameter_types: Vec<String>,
    varargs: bool
}

impl InvocationSignature {
    fn new<P, S>(kind: TargetKind, owner: &str, member: &str, params: P)
        -> Self
        where P: IntoIterator<Item=S>, S: Into<String>
    {
        InvocationSignature {
            kind,
            owner: owner.to_owned(),
            member: member.to_owned(),
            parameter_types: params.into_iter().map(Into::into).collect(),
            varargs: false
        }
    }

    pub fn constructor<P, S>(owner: &str, params: P) -> Self
        where P: IntoIterator<Item=S>, S: Into<String>
    {
        Self::new(TargetKind::Constructor, owner, "<init>", params)
    }

    pub fn instance<P, S>(owner: &str, member: &str, params: P) -> Self
        where P: IntoIterator<Item=S>, S: Into<String>
    {
        Self::new(TargetKind::Instance, owner, member, params)
    }

    pub fn static_method<P, S>(owner: &str, member: &str, params: P) -> Self
        where P: IntoIterator<Item=S>, S: Into<String>
    {
        Self::new(TargetKind::Static, owner, member, params)
    }

    /// Mark the last parameter as variable-length.
    pub fn with_varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn member(&self) -> &str {
        &self.member
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn is_varargs(&self) -> bool {
        self.varargs
    }

    /// Number of parameters before the variable-length tail, if any.
    pub fn fixed_arity(&self) -> usize {
        if self.varargs {
            self.parameter_types.len().saturating_sub(1)
        } else {
            self.parameter_types.len()
        }
    }

    /// Can a call to this signature legally carry `n` arguments?
    pub fn accepts_arity(&self, n: usize) -> bool {
        if self.varargs {
            n >= self.fixed_arity()
        } else {
            n == self.parameter_types.len()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.varargs && self.parameter_types.is_empty() {
            return Err(Misuse::new(format!(
                "{} is declared variadic but has no parameters", self)).into());
        }
        Ok(())
    }
}

impl fmt::Display for InvocationSignature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let params = self.parameter_types.join(", ");
        let dots = if self.varargs { "..." } else { "" };
        match self.kind {
            TargetKind::Constructor =>
                write!(f, "{}#<init>({}{})", self.owner, params, dots),
            _ => write!(f, "{}#{}({}{})", self.owner, self.member, params,
                        dots)
        }
    }
}

/// Which receiver an expectation applies to.
#[derive(Clone, Debug, Default)]
pub enum InstanceBinding {
    /// Any instance, and static calls.
    #[default]
    Any,
    /// Only calls on this very object, compared by identity.
    Same(ObjectRef)
}

impl InstanceBinding {
    pub fn matches(&self, instance: Option<&ObjectRef>) -> bool {
        match (self, instance) {
            (InstanceBinding::Any, _) => true,
            (InstanceBinding::Same(o), Some(i)) => o.ptr_eq(i),
            (InstanceBinding::Same(_), None) => false
        }
    }

    pub(crate) fn is_equivalent(&self, other: &InstanceBinding) -> bool {
        match (self, other) {
            (InstanceBinding::Any, InstanceBinding::Any) => true,
            (InstanceBinding::Same(a), InstanceBinding::Same(b)) => a.ptr_eq(b),
            _ => false
        }
    }

    /// An instance binding only makes sense for instance methods.
    pub(crate) fn validate(&self, sig: &InvocationSignature)
        -> Result<(), Error>
    {
        match (self, sig.kind()) {
            (InstanceBinding::Same(_), TargetKind::Static) |
            (InstanceBinding::Same(_), TargetKind::Constructor) =>
                Err(Misuse::new(format!(
                    "Cannot bind {} to a specific instance", sig)).into()),
            _ => Ok(())
        }
    }
}

impl fmt::Display for InstanceBinding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstanceBinding::Any => f.write_str("any instance"),
            InstanceBinding::Same(o) => write!(f, "instance {}", o)
        }
    }
}
