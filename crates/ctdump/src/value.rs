//! Typed values produced by the [crate::reader::ValueReader].

use crate::float::Extended;

/// A field value decoded from memory.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Unsigned(u128),
    Signed(i128),
    F32(f32),
    F64(f64),
    LongDouble(Extended),
    /// Storage whose bit pattern has no value in its format (e.g. an x87 unnormal).
    Unrepresentable(&'static str),
    Pointer { address: u64, target: Deref },
    Array(Vec<TypedValue>),
    /// Nested aggregate, fields in declaration order.
    Aggregate(Vec<(String, TypedValue)>),
    /// Text of a followed `char *`, without the terminator.
    CString(Vec<u8>),
}

/// Outcome of (not) following a pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Deref {
    NotFollowed,
    Null,
    /// The target instance is already being dumped; only its address is shown.
    Cycle,
    /// The target is not mapped, or a C string has no terminator within bounds.
    Invalid,
    Value(Box<TypedValue>),
}

impl TypedValue {
    pub fn pointer(address: u64) -> Self {
        TypedValue::Pointer {
            address,
            target: Deref::NotFollowed,
        }
    }

    /// Integer value widened to `i128`, if this is an integer that fits.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            TypedValue::Signed(v) => Some(*v),
            TypedValue::Unsigned(v) => i128::try_from(*v).ok(),
            _ => None,
        }
    }
}
