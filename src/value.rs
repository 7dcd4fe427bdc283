//! Value Builder — the host-side output tree that crosses the boundary
//! to the caller, independent of the handle table and type nodes that
//! produced it.

use indexmap::IndexMap;

/// A decoded value: the result of running the Grammar Walker over a
/// Java Object Serialization stream.
///
/// `Object` carries field name order (objects always have named fields,
/// known at class-descriptor parse time, so an order-preserving
/// string-keyed map is the natural fit — mirrors the teacher's use of
/// `indexmap` wherever insertion order in table-like data matters).
/// `Map` backs `java.util.HashMap`/`LinkedHashMap`, whose keys are
/// arbitrary decoded values rather than strings, so it is kept as an
/// ordered list of pairs instead of forcing a `Hash` bound onto `Value`
/// (which holds `f64`).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `TC_NULL`.
    Null,
    /// A boxed or primitive `Z` (boolean).
    Bool(bool),
    /// Any integral primitive (`B`, `C`, `I`, `J`, `S`), widened to i64.
    Int(i64),
    /// `D` or `F`, widened to f64.
    Double(f64),
    /// A `B` (byte) array's raw contents.
    Bytes(Vec<u8>),
    /// A decoded stream string (`TC_STRING`/`TC_LONGSTRING`).
    String(String),
    /// An array, or an `ArrayList`/`LinkedList`/`ArrayDeque`/
    /// `PriorityQueue` specialiser result.
    Sequence(Vec<Value>),
    /// A plain object's field values, in declared field order.
    Object(IndexMap<String, Value>),
    /// A `HashMap`/`LinkedHashMap` specialiser result.
    Map(Vec<(Value, Value)>),
    /// A `HashSet`/`LinkedHashSet`/`BitSet` specialiser result.
    Set(Vec<Value>),
}

impl Value {
    /// `true` if this value is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// View as an `i64`, if this is an `Int`.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// View as a `&str`, if this is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// View as a slice of elements, if this is a `Sequence`.
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// View as a field mapping, if this is an `Object`.
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }
}
