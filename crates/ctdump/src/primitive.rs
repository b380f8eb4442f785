//! Primitive layout table: size and alignment of every scalar kind for a [TargetAbi].

use crate::abi::TargetAbi;

/// Scalar kinds a field, array element or pointee can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    U128,
    I128,
    F32,
    F64,
    /// C `long double`; representation comes from [TargetAbi::long_double].
    LongDouble,
}

/// Size and alignment of a type, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeAlign {
    pub size: usize,
    pub align: usize,
}

impl SizeAlign {
    pub const fn new(size: usize, align: usize) -> Self {
        SizeAlign { size, align }
    }
}

impl PrimitiveKind {
    pub fn size_align(self, abi: &TargetAbi) -> SizeAlign {
        match self {
            PrimitiveKind::U8 | PrimitiveKind::I8 => SizeAlign::new(1, 1),
            PrimitiveKind::U16 | PrimitiveKind::I16 => SizeAlign::new(2, 2),
            PrimitiveKind::U32 | PrimitiveKind::I32 | PrimitiveKind::F32 => SizeAlign::new(4, 4),
            PrimitiveKind::U64 | PrimitiveKind::I64 => SizeAlign::new(8, abi.int64_align as usize),
            PrimitiveKind::U128 | PrimitiveKind::I128 => SizeAlign::new(16, 16),
            PrimitiveKind::F64 => SizeAlign::new(8, abi.double_align as usize),
            PrimitiveKind::LongDouble => SizeAlign::new(
                abi.long_double_size as usize,
                abi.long_double_align as usize,
            ),
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::F32 | PrimitiveKind::F64 | PrimitiveKind::LongDouble
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveKind::I8
                | PrimitiveKind::I16
                | PrimitiveKind::I32
                | PrimitiveKind::I64
                | PrimitiveKind::I128
        )
    }

    /// Width in bits of an integer kind; `None` for floating-point kinds.
    pub fn int_bits(self) -> Option<u32> {
        match self {
            PrimitiveKind::U8 | PrimitiveKind::I8 => Some(8),
            PrimitiveKind::U16 | PrimitiveKind::I16 => Some(16),
            PrimitiveKind::U32 | PrimitiveKind::I32 => Some(32),
            PrimitiveKind::U64 | PrimitiveKind::I64 => Some(64),
            PrimitiveKind::U128 | PrimitiveKind::I128 => Some(128),
            _ => None,
        }
    }
}

#[cfg(feature = "serde")]
impl PrimitiveKind {
    /// Maps a C spelling to its kind on `abi`; `char` is taken as signed.
    pub fn from_def(value: crate::serde::PrimitiveDef, abi: &TargetAbi) -> Self {
        use crate::serde::PrimitiveDef;

        match value {
            PrimitiveDef::Char => PrimitiveKind::I8,
            PrimitiveDef::UChar => PrimitiveKind::U8,
            PrimitiveDef::Short => PrimitiveKind::I16,
            PrimitiveDef::UShort => PrimitiveKind::U16,
            PrimitiveDef::Int => PrimitiveKind::I32,
            PrimitiveDef::UInt => PrimitiveKind::U32,
            PrimitiveDef::Long => abi.c_long(true),
            PrimitiveDef::ULong => abi.c_long(false),
            PrimitiveDef::LongLong => PrimitiveKind::I64,
            PrimitiveDef::ULongLong => PrimitiveKind::U64,
            PrimitiveDef::Int128 => PrimitiveKind::I128,
            PrimitiveDef::UInt128 => PrimitiveKind::U128,
            PrimitiveDef::Float => PrimitiveKind::F32,
            PrimitiveDef::Double => PrimitiveKind::F64,
            PrimitiveDef::LongDouble => PrimitiveKind::LongDouble,
        }
    }
}
