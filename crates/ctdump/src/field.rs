//! Declared fields of an aggregate, the input to [crate::layout::compute_layout].

use std::sync::Arc;

use crate::{
    abi::TargetAbi,
    errors::LayoutError,
    layout::AggregateLayout,
    primitive::{PrimitiveKind, SizeAlign},
};

/// Struct fields follow each other; union fields overlay each other at offset 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Struct,
    Union,
}

/// A single named field; its declared order is its index in the field list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// `void`; has no size and is rejected by the layout calculator.
    Void,
    Primitive(PrimitiveKind),
    /// Nested aggregate stored by value.
    Aggregate(Arc<AggregateLayout>),
    /// Fixed-length array; elements are laid out at the element's padded size.
    Array { element: Box<FieldKind>, count: usize },
    Pointer(PointerTarget),
    /// Integer field narrower than its base kind, packed into a storage unit.
    BitField { base: PrimitiveKind, width: u32 },
}

/// What a pointer field points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PointerTarget {
    Void,
    Primitive(PrimitiveKind),
    /// Named aggregate, resolved through a [crate::cache::TypeRegistry]. May name
    /// the aggregate that contains the pointer.
    Aggregate(String),
    /// Multi-level pointer (`T **`).
    Pointer(Box<PointerTarget>),
    /// `char *` read as NUL-terminated text.
    CString,
}

#[cfg(feature = "serde")]
impl From<crate::serde::AggregateKindDef> for AggregateKind {
    fn from(value: crate::serde::AggregateKindDef) -> Self {
        match value {
            crate::serde::AggregateKindDef::Struct => AggregateKind::Struct,
            crate::serde::AggregateKindDef::Union => AggregateKind::Union,
        }
    }
}

#[cfg(feature = "serde")]
impl PointerTarget {
    pub fn from_def(value: crate::serde::PointerTargetDef, abi: &TargetAbi) -> Self {
        use crate::serde::PointerTargetDef;

        match value {
            PointerTargetDef::Void => PointerTarget::Void,
            PointerTargetDef::Primitive { primitive } => {
                PointerTarget::Primitive(PrimitiveKind::from_def(primitive, abi))
            }
            PointerTargetDef::Aggregate { name } => PointerTarget::Aggregate(name),
            PointerTargetDef::Pointer { target } => {
                PointerTarget::Pointer(Box::new(PointerTarget::from_def(*target, abi)))
            }
            PointerTargetDef::CString => PointerTarget::CString,
        }
    }
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDescriptor {
            name: name.into(),
            kind,
        }
    }

    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self::new(name, FieldKind::Primitive(kind))
    }

    pub fn bit_field(name: impl Into<String>, base: PrimitiveKind, width: u32) -> Self {
        Self::new(name, FieldKind::BitField { base, width })
    }

    pub fn pointer(name: impl Into<String>, target: PointerTarget) -> Self {
        Self::new(name, FieldKind::Pointer(target))
    }

    pub fn array(name: impl Into<String>, element: FieldKind, count: usize) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                element: Box::new(element),
                count,
            },
        )
    }

    pub fn aggregate(name: impl Into<String>, layout: Arc<AggregateLayout>) -> Self {
        Self::new(name, FieldKind::Aggregate(layout))
    }
}

impl FieldKind {
    /// Size and alignment of a value of this kind. Bit-fields report their base kind.
    pub fn size_align(&self, abi: &TargetAbi, field: &str) -> Result<SizeAlign, LayoutError> {
        match self {
            FieldKind::Void => Err(LayoutError::UnsupportedFieldKind {
                field: field.to_string(),
            }),
            FieldKind::Primitive(kind) => Ok(kind.size_align(abi)),
            FieldKind::Aggregate(layout) => Ok(SizeAlign::new(layout.size, layout.align)),
            FieldKind::Array { element, count } => {
                if matches!(**element, FieldKind::BitField { .. }) {
                    return Err(LayoutError::UnsupportedFieldKind {
                        field: field.to_string(),
                    });
                }

                let element = element.size_align(abi, field)?;
                Ok(SizeAlign::new(element.size * count, element.align))
            }
            FieldKind::Pointer(_) => Ok(SizeAlign::new(
                abi.pointer_size as usize,
                abi.pointer_size as usize,
            )),
            FieldKind::BitField { base, .. } => Ok(base.size_align(abi)),
        }
    }
}
