//! Aggregate layout calculator: offsets, sizes, alignment and bit-field slots.
//!
//! Structs are laid out in declaration order with the minimum padding each
//! field's alignment requires; the total size is padded to the struct's
//! alignment. Bit-fields are grouped according to the ABI's
//! [BitFieldPacking] policy:
//!
//! * [BitFieldPacking::StorageUnit] keeps one open unit of the bit-field's
//!   base kind. A following bit-field of the same base kind is packed into it
//!   while it fits; anything else closes the unit, reserving its full size,
//!   and a new unit is opened at the next offset aligned for the base kind.
//! * [BitFieldPacking::SysV] runs a bit cursor across the struct and only
//!   moves a bit-field to the next alignment boundary of its base kind when it
//!   would otherwise straddle a unit of that kind.
//!
//! Union fields all sit at offset 0; the union takes the largest size and
//! alignment of its members.

use std::collections::HashSet;

use log::debug;

use crate::{
    abi::{BitFieldPacking, TargetAbi},
    errors::{LayoutError, ReadError},
    field::{AggregateKind, FieldDescriptor, FieldKind},
    primitive::PrimitiveKind,
};

/// Location of a bit-field inside the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitSlot {
    /// Byte offset of the storage window holding the bits.
    pub unit_offset: usize,
    /// Size in bytes of the storage window.
    pub unit_size: usize,
    /// Position of the first bit inside the window (see [crate::bits]).
    pub bit_offset: u32,
    pub width: u32,
    pub signed: bool,
}

/// A field together with its computed placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldLayout {
    pub name: String,
    pub kind: FieldKind,
    pub offset: usize,
    pub size: usize,
    pub align: usize,
    /// Set for bit-fields only.
    pub bits: Option<BitSlot>,
}

/// Immutable layout of a struct or union.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateLayout {
    pub kind: AggregateKind,
    /// Fields in declaration order.
    pub fields: Vec<FieldLayout>,
    pub size: usize,
    pub align: usize,
}

impl AggregateLayout {
    pub fn field(&self, index: usize) -> Result<&FieldLayout, ReadError> {
        self.fields.get(index).ok_or(ReadError::FieldIndexOutOfRange {
            index,
            count: self.fields.len(),
        })
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

pub(crate) fn align_up(value: usize, align: usize) -> usize {
    if align <= 1 {
        return value;
    }

    value.div_ceil(align) * align
}

/// Computes the layout of an aggregate from its declared fields.
pub fn compute_layout(
    kind: AggregateKind,
    fields: &[FieldDescriptor],
    abi: &TargetAbi,
) -> Result<AggregateLayout, LayoutError> {
    validate_names(fields)?;

    let layout = match kind {
        AggregateKind::Struct => match abi.bitfield_packing {
            BitFieldPacking::StorageUnit => layout_struct_units(fields, abi)?,
            BitFieldPacking::SysV => layout_struct_sysv(fields, abi)?,
        },
        AggregateKind::Union => layout_union(fields, abi)?,
    };

    debug!(
        "computed {:?} layout: {} fields, size {}, align {}",
        kind,
        layout.fields.len(),
        layout.size,
        layout.align
    );

    Ok(layout)
}

/// Names must be unique; only bit-fields (padding) may be anonymous.
fn validate_names(fields: &[FieldDescriptor]) -> Result<(), LayoutError> {
    let mut seen = HashSet::with_capacity(fields.len());

    for field in fields {
        if field.name.is_empty() {
            if !matches!(field.kind, FieldKind::BitField { .. }) {
                return Err(LayoutError::InvalidFieldName(String::new()));
            }
            continue;
        }

        if !seen.insert(field.name.as_str()) {
            return Err(LayoutError::InvalidFieldName(field.name.clone()));
        }
    }

    Ok(())
}

/// Checks a bit-field declaration and returns the integer width of its base kind.
fn check_bit_field(field: &FieldDescriptor, base: PrimitiveKind, width: u32) -> Result<u32, LayoutError> {
    let max = base.int_bits().ok_or_else(|| LayoutError::UnsupportedFieldKind {
        field: field.name.clone(),
    })?;

    if width > max || (width == 0 && !field.name.is_empty()) {
        return Err(LayoutError::InvalidBitWidth {
            field: field.name.clone(),
            width,
            max,
        });
    }

    Ok(max)
}

struct OpenUnit {
    base: PrimitiveKind,
    offset: usize,
    size: usize,
    used: u32,
}

fn layout_struct_units(
    fields: &[FieldDescriptor],
    abi: &TargetAbi,
) -> Result<AggregateLayout, LayoutError> {
    let mut out = Vec::with_capacity(fields.len());
    let mut cursor = 0usize;
    let mut align = 1usize;
    let mut open: Option<OpenUnit> = None;

    for field in fields {
        match &field.kind {
            FieldKind::BitField { base, width } => {
                let unit_bits = check_bit_field(field, *base, *width)?;
                let sa = base.size_align(abi);

                if *width == 0 {
                    if let Some(unit) = open.take() {
                        cursor = unit.offset + unit.size;
                    }
                    cursor = align_up(cursor, sa.align);
                    out.push(bit_field_layout(field, cursor, 0, sa.align, 0, 0, *base));
                    continue;
                }

                let fits = open
                    .as_ref()
                    .is_some_and(|u| u.base == *base && u.used + width <= unit_bits);

                if !fits {
                    if let Some(unit) = open.take() {
                        cursor = unit.offset + unit.size;
                    }
                    open = Some(OpenUnit {
                        base: *base,
                        offset: align_up(cursor, sa.align),
                        size: sa.size,
                        used: 0,
                    });
                    align = align.max(sa.align);
                }

                if let Some(unit) = open.as_mut() {
                    out.push(bit_field_layout(
                        field,
                        unit.offset,
                        unit.size,
                        sa.align,
                        unit.used,
                        *width,
                        *base,
                    ));
                    unit.used += width;
                }
            }
            kind => {
                if let Some(unit) = open.take() {
                    cursor = unit.offset + unit.size;
                }

                let sa = kind.size_align(abi, &field.name)?;
                let offset = align_up(cursor, sa.align);
                out.push(FieldLayout {
                    name: field.name.clone(),
                    kind: kind.clone(),
                    offset,
                    size: sa.size,
                    align: sa.align,
                    bits: None,
                });
                cursor = offset + sa.size;
                align = align.max(sa.align);
            }
        }
    }

    if let Some(unit) = open.take() {
        cursor = unit.offset + unit.size;
    }

    Ok(AggregateLayout {
        kind: AggregateKind::Struct,
        fields: out,
        size: align_up(cursor, align),
        align,
    })
}

fn layout_struct_sysv(
    fields: &[FieldDescriptor],
    abi: &TargetAbi,
) -> Result<AggregateLayout, LayoutError> {
    let mut out = Vec::with_capacity(fields.len());
    let mut bit_cursor = 0usize;
    let mut align = 1usize;

    for field in fields {
        match &field.kind {
            FieldKind::BitField { base, width } => {
                let unit_bits = check_bit_field(field, *base, *width)? as usize;
                let sa = base.size_align(abi);
                let align_bits = sa.align * 8;
                let width = *width as usize;

                if width == 0 {
                    bit_cursor = align_up(bit_cursor, align_bits);
                    out.push(bit_field_layout(field, bit_cursor / 8, 0, 1, 0, 0, *base));
                    continue;
                }

                if bit_cursor % align_bits + width > unit_bits {
                    bit_cursor = align_up(bit_cursor, align_bits);
                }

                let window_offset = bit_cursor / 8;
                let bit_offset = (bit_cursor % 8) as u32;
                let window_size = (bit_offset as usize + width).div_ceil(8);

                out.push(bit_field_layout(
                    field,
                    window_offset,
                    window_size,
                    sa.align,
                    bit_offset,
                    width as u32,
                    *base,
                ));
                bit_cursor += width;
                // unnamed bit-fields do not raise the struct's alignment
                if !field.name.is_empty() {
                    align = align.max(sa.align);
                }
            }
            kind => {
                let sa = kind.size_align(abi, &field.name)?;
                let offset = align_up(bit_cursor.div_ceil(8), sa.align);
                out.push(FieldLayout {
                    name: field.name.clone(),
                    kind: kind.clone(),
                    offset,
                    size: sa.size,
                    align: sa.align,
                    bits: None,
                });
                bit_cursor = (offset + sa.size) * 8;
                align = align.max(sa.align);
            }
        }
    }

    Ok(AggregateLayout {
        kind: AggregateKind::Struct,
        fields: out,
        size: align_up(bit_cursor.div_ceil(8), align),
        align,
    })
}

fn layout_union(fields: &[FieldDescriptor], abi: &TargetAbi) -> Result<AggregateLayout, LayoutError> {
    let mut out = Vec::with_capacity(fields.len());
    let mut size = 0usize;
    let mut align = 1usize;

    for field in fields {
        let layout = match &field.kind {
            FieldKind::BitField { base, width } => {
                check_bit_field(field, *base, *width)?;
                let sa = base.size_align(abi);
                bit_field_layout(field, 0, sa.size, sa.align, 0, *width, *base)
            }
            kind => {
                let sa = kind.size_align(abi, &field.name)?;
                FieldLayout {
                    name: field.name.clone(),
                    kind: kind.clone(),
                    offset: 0,
                    size: sa.size,
                    align: sa.align,
                    bits: None,
                }
            }
        };

        size = size.max(layout.size);
        align = align.max(layout.align);
        out.push(layout);
    }

    Ok(AggregateLayout {
        kind: AggregateKind::Union,
        fields: out,
        size: align_up(size, align),
        align,
    })
}

fn bit_field_layout(
    field: &FieldDescriptor,
    unit_offset: usize,
    unit_size: usize,
    align: usize,
    bit_offset: u32,
    width: u32,
    base: PrimitiveKind,
) -> FieldLayout {
    FieldLayout {
        name: field.name.clone(),
        kind: field.kind.clone(),
        offset: unit_offset,
        size: unit_size,
        align,
        bits: Some(BitSlot {
            unit_offset,
            unit_size,
            bit_offset,
            width,
            signed: base.is_signed(),
        }),
    }
}
