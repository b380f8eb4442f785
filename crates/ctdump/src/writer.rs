//! Instance builder for drivers and tests: populates a zeroed buffer by field name.

use crate::{
    abi::TargetAbi,
    bits::{insert, mask, read_unit, write_unit},
    errors::WriteError,
    field::FieldKind,
    float::encode_long_double,
    layout::{AggregateLayout, FieldLayout},
    primitive::PrimitiveKind,
};

/// Owns the bytes of one instance of an aggregate.
pub struct InstanceBuilder<'l> {
    layout: &'l AggregateLayout,
    abi: TargetAbi,
    bytes: Vec<u8>,
}

impl<'l> InstanceBuilder<'l> {
    pub fn new(layout: &'l AggregateLayout, abi: TargetAbi) -> Self {
        InstanceBuilder {
            layout,
            abi,
            bytes: vec![0u8; layout.size],
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }

    fn field(&self, name: &str) -> Result<&'l FieldLayout, WriteError> {
        let layout: &'l AggregateLayout = self.layout;
        layout
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| WriteError::MissingField(name.to_string()))
    }

    /// Sets an integer field or bit-field. The value must fit the field's width
    /// as either a signed or an unsigned number.
    pub fn set_int(&mut self, name: &str, value: i128) -> Result<&mut Self, WriteError> {
        let field = self.field(name)?;

        if let Some(slot) = field.bits {
            check_fits(name, value, slot.width)?;
            if slot.width == 0 {
                return Ok(self);
            }
            let endian = self.abi.endian;
            let window = self.window(slot.unit_offset, slot.unit_size)?;
            let unit = read_unit(window, endian);
            let unit = insert(
                unit,
                slot.unit_size as u32 * 8,
                slot.bit_offset,
                slot.width,
                value as u128,
                endian,
            );
            write_unit(window, unit, endian);
            return Ok(self);
        }

        match &field.kind {
            FieldKind::Primitive(kind) if kind.is_integer() => {
                self.write_int(name, field.offset, *kind, value)?;
                Ok(self)
            }
            _ => Err(WriteError::InvalidValue(name.to_string())),
        }
    }

    /// Sets a `float`, `double` or `long double` field.
    pub fn set_float(&mut self, name: &str, value: f64) -> Result<&mut Self, WriteError> {
        let field = self.field(name)?;

        match &field.kind {
            FieldKind::Primitive(kind) if !kind.is_integer() => {
                self.write_float(field.offset, *kind, value)?;
                Ok(self)
            }
            _ => Err(WriteError::InvalidValue(name.to_string())),
        }
    }

    pub fn set_pointer(&mut self, name: &str, address: u64) -> Result<&mut Self, WriteError> {
        let field = self.field(name)?;

        match &field.kind {
            FieldKind::Pointer(_) => {
                self.write_pointer(name, field.offset, address)?;
                Ok(self)
            }
            _ => Err(WriteError::InvalidValue(name.to_string())),
        }
    }

    /// Copies raw bytes to the start of a field (e.g. a `char[]` or exact `long double` bits).
    pub fn set_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<&mut Self, WriteError> {
        let field = self.field(name)?;
        if bytes.len() > field.size || field.bits.is_some() {
            return Err(WriteError::InvalidValue(name.to_string()));
        }

        self.window(field.offset, bytes.len())?.copy_from_slice(bytes);
        Ok(self)
    }

    pub fn set_element_int(&mut self, name: &str, index: usize, value: i128) -> Result<&mut Self, WriteError> {
        let (offset, element) = self.element(name, index)?;

        match element {
            FieldKind::Primitive(kind) if kind.is_integer() => {
                self.write_int(name, offset, *kind, value)?;
                Ok(self)
            }
            _ => Err(WriteError::InvalidValue(name.to_string())),
        }
    }

    pub fn set_element_pointer(&mut self, name: &str, index: usize, address: u64) -> Result<&mut Self, WriteError> {
        let (offset, element) = self.element(name, index)?;

        match element {
            FieldKind::Pointer(_) => {
                self.write_pointer(name, offset, address)?;
                Ok(self)
            }
            _ => Err(WriteError::InvalidValue(name.to_string())),
        }
    }

    /// Copies a whole element, typically the bytes of another builder for an
    /// array of aggregates.
    pub fn set_element_bytes(&mut self, name: &str, index: usize, bytes: &[u8]) -> Result<&mut Self, WriteError> {
        let (offset, element) = self.element(name, index)?;
        let size = element
            .size_align(&self.abi, name)
            .map_err(|_| WriteError::InvalidValue(name.to_string()))?
            .size;
        if bytes.len() > size {
            return Err(WriteError::InvalidValue(name.to_string()));
        }

        self.window(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(self)
    }

    fn element(&self, name: &str, index: usize) -> Result<(usize, &'l FieldKind), WriteError> {
        let field = self.field(name)?;

        match &field.kind {
            FieldKind::Array { element, count } if index < *count => {
                Ok((field.offset + index * (field.size / count), element.as_ref()))
            }
            FieldKind::Array { .. } => Err(WriteError::OutOfBounds),
            _ => Err(WriteError::InvalidValue(name.to_string())),
        }
    }

    fn window(&mut self, offset: usize, len: usize) -> Result<&mut [u8], WriteError> {
        self.bytes
            .get_mut(offset..offset + len)
            .ok_or(WriteError::OutOfBounds)
    }

    fn write_int(&mut self, name: &str, offset: usize, kind: PrimitiveKind, value: i128) -> Result<(), WriteError> {
        let sa = kind.size_align(&self.abi);
        check_fits(name, value, sa.size as u32 * 8)?;
        let endian = self.abi.endian;
        write_unit(self.window(offset, sa.size)?, value as u128, endian);
        Ok(())
    }

    fn write_float(&mut self, offset: usize, kind: PrimitiveKind, value: f64) -> Result<(), WriteError> {
        let endian = self.abi.endian;

        match kind {
            PrimitiveKind::F32 => write_unit(self.window(offset, 4)?, (value as f32).to_bits() as u128, endian),
            PrimitiveKind::F64 => write_unit(self.window(offset, 8)?, value.to_bits() as u128, endian),
            _ => {
                let size = self.abi.long_double_size as usize;
                let encoded = encode_long_double(value, self.abi.long_double, size, endian);
                self.window(offset, size)?.copy_from_slice(&encoded);
            }
        }

        Ok(())
    }

    fn write_pointer(&mut self, name: &str, offset: usize, address: u64) -> Result<(), WriteError> {
        let size = self.abi.pointer_size as usize;
        if size < 8 && address >> (size * 8) != 0 {
            return Err(WriteError::InvalidValue(name.to_string()));
        }

        let endian = self.abi.endian;
        write_unit(self.window(offset, size)?, address as u128, endian);
        Ok(())
    }
}

/// A value fits `bits` if it is representable as a signed or unsigned integer of that width.
fn check_fits(name: &str, value: i128, bits: u32) -> Result<(), WriteError> {
    if bits >= 128 {
        return Ok(());
    }
    if bits == 0 {
        return match value {
            0 => Ok(()),
            _ => Err(WriteError::InvalidValue(name.to_string())),
        };
    }

    let min = -(1i128 << (bits - 1));
    let max = mask(bits) as i128;
    if value < min || value > max {
        return Err(WriteError::InvalidValue(name.to_string()));
    }

    Ok(())
}
