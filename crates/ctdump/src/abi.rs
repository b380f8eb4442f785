//! Target ABI parameters that drive the primitive layout table and bit-field packing.

/// Byte order of multi-byte scalars in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// In-memory representation of C `long double`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LongDoubleFormat {
    /// Same as `double` (MSVC, 32-bit ARM).
    Double,
    /// x87 80-bit extended precision, padded to the ABI's storage size.
    X87Extended,
    /// IEEE 754 binary128.
    IeeeQuad,
}

/// How adjacent bit-fields are grouped into storage units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitFieldPacking {
    /// A unit holds bit-fields of one base kind only; it is closed by any
    /// other field and its full size is always reserved.
    #[default]
    StorageUnit,
    /// System V rule: bit-fields run on a bit cursor and only skip ahead when
    /// they would straddle an alignment boundary of their base kind.
    SysV,
}

/// Sizes, alignments and conventions of the platform whose memory is dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetAbi {
    pub pointer_size: u8,
    pub long_size: u8,
    /// Alignment of 8-byte integers (4 on i386).
    pub int64_align: u8,
    /// Alignment of `double` inside aggregates (4 on i386).
    pub double_align: u8,
    pub long_double: LongDoubleFormat,
    pub long_double_size: u8,
    pub long_double_align: u8,
    pub endian: Endian,
    pub bitfield_packing: BitFieldPacking,
}

impl TargetAbi {
    /// x86-64 System V (Linux, BSD, macOS).
    pub const fn x86_64() -> Self {
        TargetAbi {
            pointer_size: 8,
            long_size: 8,
            int64_align: 8,
            double_align: 8,
            long_double: LongDoubleFormat::X87Extended,
            long_double_size: 16,
            long_double_align: 16,
            endian: Endian::Little,
            bitfield_packing: BitFieldPacking::StorageUnit,
        }
    }

    /// i386 System V.
    pub const fn i386() -> Self {
        TargetAbi {
            pointer_size: 4,
            long_size: 4,
            int64_align: 4,
            double_align: 4,
            long_double: LongDoubleFormat::X87Extended,
            long_double_size: 12,
            long_double_align: 4,
            endian: Endian::Little,
            bitfield_packing: BitFieldPacking::StorageUnit,
        }
    }

    /// AArch64 Linux (AAPCS64).
    pub const fn aarch64() -> Self {
        TargetAbi {
            pointer_size: 8,
            long_size: 8,
            int64_align: 8,
            double_align: 8,
            long_double: LongDoubleFormat::IeeeQuad,
            long_double_size: 16,
            long_double_align: 16,
            endian: Endian::Little,
            bitfield_packing: BitFieldPacking::StorageUnit,
        }
    }

    /// The ABI this crate was compiled for, falling back to x86-64.
    pub const fn host() -> Self {
        if cfg!(target_arch = "x86") {
            Self::i386()
        } else if cfg!(target_arch = "aarch64") {
            Self::aarch64()
        } else {
            Self::x86_64()
        }
    }

    pub const fn with_bitfield_packing(mut self, packing: BitFieldPacking) -> Self {
        self.bitfield_packing = packing;
        self
    }

    pub const fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Integer kind backing C `long` / `unsigned long` on this target.
    pub fn c_long(&self, signed: bool) -> crate::primitive::PrimitiveKind {
        use crate::primitive::PrimitiveKind;

        match (self.long_size, signed) {
            (4, true) => PrimitiveKind::I32,
            (4, false) => PrimitiveKind::U32,
            (_, true) => PrimitiveKind::I64,
            (_, false) => PrimitiveKind::U64,
        }
    }
}

#[cfg(feature = "serde")]
impl From<crate::serde::AbiDef> for TargetAbi {
    fn from(value: crate::serde::AbiDef) -> Self {
        use crate::serde::{AbiPresetDef, BitFieldPackingDef, EndianDef};

        let mut abi = match value.preset {
            AbiPresetDef::Host => TargetAbi::host(),
            AbiPresetDef::X86_64 => TargetAbi::x86_64(),
            AbiPresetDef::I386 => TargetAbi::i386(),
            AbiPresetDef::Aarch64 => TargetAbi::aarch64(),
        };

        if let Some(endian) = value.endian {
            abi.endian = match endian {
                EndianDef::Little => Endian::Little,
                EndianDef::Big => Endian::Big,
            };
        }
        if let Some(packing) = value.bitfield_packing {
            abi.bitfield_packing = match packing {
                BitFieldPackingDef::StorageUnit => BitFieldPacking::StorageUnit,
                BitFieldPackingDef::SysV => BitFieldPacking::SysV,
            };
        }

        abi
    }
}

impl Default for TargetAbi {
    fn default() -> Self {
        Self::host()
    }
}
