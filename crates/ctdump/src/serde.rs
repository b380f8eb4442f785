//! JSON-deserializable type descriptions.
//!
//! A [TypesDef] lists the aggregates of one target in definition order and is
//! loaded with [crate::cache::TypeRegistry::load]. Nested aggregates must be
//! defined before they are embedded; pointers may name any aggregate of the
//! file, including the one being defined.

use serde::{Deserialize, Serialize};

/// A set of aggregate types and the ABI they are laid out for.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TypesDef {
    #[serde(default)]
    pub abi: Option<AbiDef>,
    pub aggregates: Vec<AggregateDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AggregateDef {
    pub name: String,
    pub kind: AggregateKindDef,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum AggregateKindDef {
    Struct,
    Union,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FieldDef {
    /// May be empty for an anonymous bit-field.
    #[serde(default)]
    pub name: String,
    pub kind: FieldKindDef,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum FieldKindDef {
    Void,
    Primitive { primitive: PrimitiveDef },
    /// Embeds a previously defined aggregate by value.
    Aggregate { name: String },
    Array { element: Box<FieldKindDef>, count: usize },
    Pointer { target: PointerTargetDef },
    BitField { base: PrimitiveDef, width: u32 },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(tag = "type")]
pub enum PointerTargetDef {
    Void,
    Primitive { primitive: PrimitiveDef },
    Aggregate { name: String },
    Pointer { target: Box<PointerTargetDef> },
    CString,
}

/// C spellings of the scalar kinds; `Long` and `ULong` follow the target's `long` size.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum PrimitiveDef {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Int128,
    UInt128,
    Float,
    Double,
    LongDouble,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub enum AbiPresetDef {
    #[default]
    Host,
    X86_64,
    I386,
    Aarch64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum EndianDef {
    Little,
    Big,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub enum BitFieldPackingDef {
    StorageUnit,
    SysV,
}

/// A preset ABI with optional overrides.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub struct AbiDef {
    #[serde(default)]
    pub preset: AbiPresetDef,
    #[serde(default)]
    pub endian: Option<EndianDef>,
    #[serde(default)]
    pub bitfield_packing: Option<BitFieldPackingDef>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default)]
pub struct DumpConfigDef {
    #[serde(default)]
    pub follow_pointers: Option<bool>,
    #[serde(default)]
    pub float_precision: Option<usize>,
    #[serde(default)]
    pub max_cstring_len: Option<usize>,
}
