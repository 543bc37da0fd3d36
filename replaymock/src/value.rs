// vim: tw=80
//! Dynamically typed argument, return and thrown values.
//!
//! The instrumentation layer hands every argument to the engine as a
//! [`Value`].  Primitive values and strings get their own variants so that
//! numeric tolerance and string matchers can inspect them; anything else is
//! wrapped in an [`ObjectRef`], which compares by identity or, through
//! [`Object::equals`], by value.

use downcast::{downcast, Any};
use std::{
    any::TypeId,
    fmt::{self, Debug, Display},
    sync::Arc
};

/// An opaque object that can be passed as an argument to an intercepted call.
///
/// Implemented automatically for every `'static` type that is `Debug`,
/// `PartialEq`, `Send` and `Sync`.
pub trait Object: Any + Debug + Send + Sync {
    /// Name of the concrete type, used in failure messages.
    fn class_name(&self) -> &'static str;

    /// Value equality with another object of possibly different type.
    fn equals(&self, other: &dyn Object) -> bool;

    /// Is `other` of the same concrete type as `self`?
    fn same_class(&self, other: &dyn Object) -> bool;
}

downcast!(dyn Object);

impl<T> Object for T
    where T: Debug + PartialEq + Send + Sync + 'static
{
    fn class_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn equals(&self, other: &dyn Object) -> bool {
        other.downcast_ref::<T>()
            .map(|o| self == o)
            .unwrap_or(false)
    }

    fn same_class(&self, other: &dyn Object) -> bool {
        other.is::<T>()
    }
}

/// A shared reference to an [`Object`].
///
/// Cloning an `ObjectRef` yields another reference to the same instance, so
/// clones are identical for the [`same`](crate::matcher::same) matcher and
/// for instance bindings.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Object>);

impl ObjectRef {
    pub fn new<T: Object>(t: T) -> Self {
        ObjectRef(Arc::new(t))
    }

    pub fn class_name(&self) -> &'static str {
        self.0.class_name()
    }

    /// Borrow the wrapped object as its concrete type, if it is a `T`.
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>().ok()
    }

    pub fn equals(&self, other: &ObjectRef) -> bool {
        self.0.equals(&*other.0)
    }

    pub fn is<T: Object>(&self) -> bool {
        self.0.is::<T>()
    }

    /// Identity comparison: are both references to the very same instance?
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.addr() == other.addr()
    }

    pub fn same_class(&self, other: &ObjectRef) -> bool {
        self.0.same_class(&*other.0)
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(&*self.0, f)
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}@{:x}", self.0, self.addr() as usize)
    }
}

/// A single argument, return value or thrown value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Object(ObjectRef),
}

impl Value {
    pub fn object<T: Object>(t: T) -> Self {
        Value::Object(ObjectRef::new(t))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by tolerance matchers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(x) => Some(*x),
            _ => None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None
        }
    }

    /// Is this value an instance of `T`?
    ///
    /// Primitive variants are instances of the Rust type they store: `Int`
    /// of `i64`, `Str` of `String`, and so on.  `Null` is an instance of
    /// nothing.
    pub fn is_instance_of<T: Object>(&self) -> bool {
        let t = TypeId::of::<T>();
        match self {
            Value::Null => false,
            Value::Bool(_) => t == TypeId::of::<bool>(),
            Value::Int(_) => t == TypeId::of::<i64>(),
            Value::Float(_) => t == TypeId::of::<f64>(),
            Value::Char(_) => t == TypeId::of::<char>(),
            Value::Str(_) => t == TypeId::of::<String>(),
            Value::Object(o) => o.is::<T>()
        }
    }

    /// Are both values of the same runtime type?
    pub fn same_class(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.same_class(b),
            (Value::Null, _) | (_, Value::Null) => false,
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b)
        }
    }

    /// Name of the runtime type, as shown in failure messages.
    pub fn class_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "i64",
            Value::Float(_) => "f64",
            Value::Char(_) => "char",
            Value::Str(_) => "String",
            Value::Object(o) => o.class_name()
        }
    }

    /// Identity comparison.  Only objects have identity; everything else is
    /// compared by value.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Object(_), _) | (_, Value::Object(_)) => false,
            (a, b) => a == b
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.equals(b),
            _ => false
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Char(c) => write!(f, "'{}'", c.escape_default()),
            Value::Str(s) => write!(f, "\"{}\"", s.escape_default()),
            Value::Object(o) => Display::fmt(o, f)
        }
    }
}

macro_rules! value_from {
    ($variant:ident, $conv:ty, [$($t:ty),*]) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(<$conv>::from(v))
                }
            }
        )*
    }
}

value_from!{Int, i64, [i8, i16, i32, i64, u8, u16, u32]}
value_from!{Float, f64, [f32, f64]}

macro_rules! value_from_wide {
    ($($t:ty),*) => {
        $(
            /// Values beyond the range of `i64` become `Float`.
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    i64::try_from(v)
                        .map(Value::Int)
                        .unwrap_or(Value::Float(v as f64))
                }
            }
        )*
    }
}

value_from_wide!{isize, u64, usize}
value_from!{Bool, bool, [bool]}
value_from!{Char, char, [char]}
value_from!{Str, String, [String, &str]}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

/// Format an argument list the way failure messages show it.
pub(crate) fn display_args(args: &[Value]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod t {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point(i32, i32);

    #[derive(Debug, PartialEq)]
    struct Other;

    #[test]
    fn object_equality_is_by_value() {
        let a = ObjectRef::new(Point(1, 2));
        let b = ObjectRef::new(Point(1, 2));
        assert!(a.equals(&b));
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn object_equality_across_types() {
        let a = ObjectRef::new(Point(1, 2));
        let b = ObjectRef::new(Other);
        assert!(!a.equals(&b));
        assert!(!a.same_class(&b));
    }

    #[test]
    fn instance_of_primitives() {
        assert!(Value::from(5).is_instance_of::<i64>());
        assert!(!Value::from(5).is_instance_of::<String>());
        assert!(Value::from("x").is_instance_of::<String>());
        assert!(!Value::Null.is_instance_of::<String>());
        assert!(Value::object(Other).is_instance_of::<Other>());
    }

    #[test]
    fn wide_integers() {
        assert_eq!(Value::Int(7), Value::from(7usize));
        assert_eq!(Value::Int(-7), Value::from(-7isize));
        assert_eq!(Value::Int(i64::MAX), Value::from(i64::MAX as u64));
        assert_eq!(Value::Float(u64::MAX as f64), Value::from(u64::MAX));
    }

    #[test]
    fn option_conversion() {
        assert!(Value::from(None::<i32>).is_null());
        assert_eq!(Value::Int(3), Value::from(Some(3)));
    }

    #[test]
    fn display() {
        assert_eq!("\"a\\\"b\"", Value::from("a\"b").to_string());
        assert_eq!("null, 1, 'c'",
            display_args(&[Value::Null, 1.into(), 'c'.into()]));
    }
}
