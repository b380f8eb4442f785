//! Value reader: decodes field values of an aggregate instance from borrowed memory.

use log::{debug, trace};

use crate::{
    abi::TargetAbi,
    bits::{extract, read_unit, sign_extend},
    cache::TypeRegistry,
    config::DumpConfig,
    errors::ReadError,
    field::{FieldKind, PointerTarget},
    float::Extended,
    layout::{AggregateLayout, BitSlot, FieldLayout},
    memory::{AddressSpace, MemoryRegion},
    primitive::PrimitiveKind,
    value::{Deref, TypedValue},
};

/// Aggregate instances currently being dumped, keyed by (layout identity, address).
///
/// A layout's identity is the address of the shared descriptor, so every
/// handle to the same `Arc<AggregateLayout>` maps to the same key.
#[derive(Debug, Clone, Default)]
pub struct ActivePath {
    entries: Vec<(usize, u64)>,
}

impl ActivePath {
    fn identity(layout: &AggregateLayout) -> usize {
        layout as *const AggregateLayout as usize
    }

    pub fn contains(&self, layout: &AggregateLayout, address: u64) -> bool {
        self.entries.contains(&(Self::identity(layout), address))
    }

    fn enter(&mut self, layout: &AggregateLayout, address: u64) {
        self.entries.push((Self::identity(layout), address));
    }

    fn leave(&mut self) {
        self.entries.pop();
    }

    pub fn depth(&self) -> usize {
        self.entries.len()
    }
}

/// Reads typed values out of instances using computed layouts.
///
/// Named pointer targets are resolved through the registry and pointees are
/// looked up in the address space; the instance region itself does not need
/// to be part of the address space unless pointers refer back into it.
#[derive(Debug)]
pub struct ValueReader<'a> {
    registry: &'a TypeRegistry,
    space: &'a AddressSpace<'a>,
    config: DumpConfig,
}

impl<'a> ValueReader<'a> {
    pub fn new(registry: &'a TypeRegistry, space: &'a AddressSpace<'a>, config: DumpConfig) -> Self {
        ValueReader {
            registry,
            space,
            config,
        }
    }

    pub fn abi(&self) -> &TargetAbi {
        self.registry.abi()
    }

    pub fn config(&self) -> &DumpConfig {
        &self.config
    }

    /// Reads field `index` of the instance stored at the start of `region`.
    pub fn read_value(
        &self,
        layout: &AggregateLayout,
        region: &MemoryRegion<'a>,
        index: usize,
    ) -> Result<TypedValue, ReadError> {
        let field = layout.field(index)?;
        let mut path = self.begin(layout, region)?;
        self.read_field(field, region.base(), region, &mut path, self.config.follow_pointers)
    }

    pub fn read_named(
        &self,
        layout: &AggregateLayout,
        region: &MemoryRegion<'a>,
        name: &str,
    ) -> Result<TypedValue, ReadError> {
        let index = layout
            .field_index(name)
            .ok_or_else(|| ReadError::UnknownField(name.to_string()))?;
        self.read_value(layout, region, index)
    }

    /// Reads every named field in declaration order; anonymous bit-fields are skipped.
    pub fn read_all(
        &self,
        layout: &AggregateLayout,
        region: &MemoryRegion<'a>,
    ) -> Result<Vec<(String, TypedValue)>, ReadError> {
        let mut path = self.begin(layout, region)?;
        self.read_fields(layout, region.base(), region, &mut path, self.config.follow_pointers)
    }

    /// Lazy view over the elements of array field `index`. The iterator can be
    /// cloned to restart it.
    pub fn array_elements<'v>(
        &'v self,
        layout: &'v AggregateLayout,
        region: &MemoryRegion<'a>,
        index: usize,
    ) -> Result<ArrayElements<'v, 'a>, ReadError> {
        let field = layout.field(index)?;
        let path = self.begin(layout, region)?;

        match &field.kind {
            FieldKind::Array { element, count } => Ok(ArrayElements::new(
                self,
                element,
                *count,
                field,
                region.base() + field.offset as u64,
                *region,
                path,
                self.config.follow_pointers,
            )),
            _ => Err(ReadError::NotAnArray(field.name.clone())),
        }
    }

    fn begin(&self, layout: &AggregateLayout, region: &MemoryRegion<'a>) -> Result<ActivePath, ReadError> {
        if region.len() < layout.size {
            return Err(ReadError::OutOfBounds {
                address: region.base(),
                len: layout.size,
            });
        }

        let mut path = ActivePath::default();
        path.enter(layout, region.base());
        Ok(path)
    }

    fn read_fields(
        &self,
        layout: &AggregateLayout,
        base: u64,
        region: &MemoryRegion<'a>,
        path: &mut ActivePath,
        follow: bool,
    ) -> Result<Vec<(String, TypedValue)>, ReadError> {
        let mut values = Vec::with_capacity(layout.fields.len());

        for field in layout.fields.iter().filter(|f| !f.name.is_empty()) {
            let value = self.read_field(field, base, region, path, follow)?;
            values.push((field.name.clone(), value));
        }

        Ok(values)
    }

    fn read_field(
        &self,
        field: &FieldLayout,
        base: u64,
        region: &MemoryRegion<'a>,
        path: &mut ActivePath,
        follow: bool,
    ) -> Result<TypedValue, ReadError> {
        trace!("reading `{}` at {:#x}", field.name, base + field.offset as u64);

        match &field.bits {
            Some(slot) => self.read_bit_field(slot, base, region),
            None => self.read_kind(&field.kind, base + field.offset as u64, region, path, follow),
        }
    }

    fn read_bit_field(&self, slot: &BitSlot, base: u64, region: &MemoryRegion<'a>) -> Result<TypedValue, ReadError> {
        if slot.width == 0 {
            return Ok(TypedValue::Unsigned(0));
        }

        let endian = self.abi().endian;
        let bytes = region.read_bytes(base + slot.unit_offset as u64, slot.unit_size)?;
        let raw = extract(
            read_unit(bytes, endian),
            slot.unit_size as u32 * 8,
            slot.bit_offset,
            slot.width,
            endian,
        );

        if slot.signed {
            Ok(TypedValue::Signed(sign_extend(raw, slot.width)))
        } else {
            Ok(TypedValue::Unsigned(raw))
        }
    }

    fn read_kind(
        &self,
        kind: &FieldKind,
        address: u64,
        region: &MemoryRegion<'a>,
        path: &mut ActivePath,
        follow: bool,
    ) -> Result<TypedValue, ReadError> {
        match kind {
            FieldKind::Void => Ok(TypedValue::Unrepresentable("void has no value")),
            FieldKind::Primitive(primitive) => {
                let size = primitive.size_align(self.abi()).size;
                Ok(decode_primitive(*primitive, region.read_bytes(address, size)?, self.abi()))
            }
            FieldKind::BitField { base, .. } => {
                let size = base.size_align(self.abi()).size;
                Ok(decode_primitive(*base, region.read_bytes(address, size)?, self.abi()))
            }
            FieldKind::Aggregate(layout) => {
                path.enter(layout, address);
                let fields = self.read_fields(layout, address, region, path, follow);
                path.leave();
                Ok(TypedValue::Aggregate(fields?))
            }
            FieldKind::Array { element, count } => {
                let stride = element_stride(element, self.abi());
                let mut values = Vec::with_capacity(*count);
                for i in 0..*count {
                    let at = address + (i * stride) as u64;
                    values.push(self.read_kind(element, at, region, path, follow)?);
                }
                Ok(TypedValue::Array(values))
            }
            FieldKind::Pointer(target) => {
                let size = self.abi().pointer_size as usize;
                let pointer = read_unit(region.read_bytes(address, size)?, self.abi().endian) as u64;
                let target = if follow {
                    self.follow(target, pointer, path)?
                } else {
                    Deref::NotFollowed
                };

                Ok(TypedValue::Pointer {
                    address: pointer,
                    target,
                })
            }
        }
    }

    /// Dereferences one level. Pointees are read without further follow-through.
    fn follow(&self, target: &PointerTarget, address: u64, path: &mut ActivePath) -> Result<Deref, ReadError> {
        if address == 0 {
            return Ok(Deref::Null);
        }

        let deref = match target {
            PointerTarget::Void => Deref::NotFollowed,
            PointerTarget::Primitive(kind) => match self.space.read_primitive(address, *kind, self.abi()) {
                Ok(value) => Deref::Value(Box::new(value)),
                Err(_) => invalid(address),
            },
            PointerTarget::Pointer(_) => match self.space.read_word(address, self.abi()) {
                Ok(word) => Deref::Value(Box::new(TypedValue::pointer(word))),
                Err(_) => invalid(address),
            },
            PointerTarget::CString => match self.space.read_cstring(address, self.config.max_cstring_len) {
                Ok(Some(text)) => Deref::Value(Box::new(TypedValue::CString(text.to_vec()))),
                _ => invalid(address),
            },
            PointerTarget::Aggregate(name) => {
                let layout = self
                    .registry
                    .get(name)
                    .ok_or_else(|| ReadError::UnknownAggregate(name.clone()))?;

                match check_cycle(path, layout, name, address) {
                    Err(ReadError::CyclicReferenceDetected { aggregate, address }) => {
                        debug!("not following `{}` at {:#x}: already on the dump path", aggregate, address);
                        return Ok(Deref::Cycle);
                    }
                    other => other?,
                }

                let Some(region) = self
                    .space
                    .find(address)
                    .filter(|r| r.contains(address, layout.size))
                else {
                    return Ok(invalid(address));
                };
                let region = *region;

                path.enter(layout, address);
                let fields = self.read_fields(layout, address, &region, path, false);
                path.leave();

                Deref::Value(Box::new(TypedValue::Aggregate(fields?)))
            }
        };

        Ok(deref)
    }
}

fn check_cycle(path: &ActivePath, layout: &AggregateLayout, name: &str, address: u64) -> Result<(), ReadError> {
    if path.contains(layout, address) {
        return Err(ReadError::CyclicReferenceDetected {
            aggregate: name.to_string(),
            address,
        });
    }

    Ok(())
}

fn invalid(address: u64) -> Deref {
    debug!("pointer target {:#x} is not mapped", address);
    Deref::Invalid
}

fn element_stride(element: &FieldKind, abi: &TargetAbi) -> usize {
    element.size_align(abi, "").map(|sa| sa.size).unwrap_or(0)
}

/// Decodes a scalar from exactly `kind`'s storage bytes.
pub fn decode_primitive(kind: PrimitiveKind, bytes: &[u8], abi: &TargetAbi) -> TypedValue {
    if kind == PrimitiveKind::LongDouble {
        return match Extended::decode(bytes, abi.long_double, abi.endian) {
            Ok(value) => TypedValue::LongDouble(value),
            Err(reason) => TypedValue::Unrepresentable(reason),
        };
    }

    let raw = read_unit(bytes, abi.endian);
    match kind {
        PrimitiveKind::F32 => TypedValue::F32(f32::from_bits(raw as u32)),
        PrimitiveKind::F64 => TypedValue::F64(f64::from_bits(raw as u64)),
        _ if kind.is_signed() => TypedValue::Signed(sign_extend(raw, bytes.len() as u32 * 8)),
        _ => TypedValue::Unsigned(raw),
    }
}

/// Lazy, restartable iterator over the elements of an array field.
#[derive(Clone, Debug)]
pub struct ArrayElements<'v, 'a> {
    reader: &'v ValueReader<'a>,
    element: &'v FieldKind,
    count: usize,
    stride: usize,
    address: u64,
    region: MemoryRegion<'a>,
    path: ActivePath,
    follow: bool,
    index: usize,
}

impl<'v, 'a> ArrayElements<'v, 'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        reader: &'v ValueReader<'a>,
        element: &'v FieldKind,
        count: usize,
        field: &FieldLayout,
        address: u64,
        region: MemoryRegion<'a>,
        path: ActivePath,
        follow: bool,
    ) -> Self {
        let stride = if count == 0 { 0 } else { field.size / count };

        ArrayElements {
            reader,
            element,
            count,
            stride,
            address,
            region,
            path,
            follow,
            index: 0,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Iterator for ArrayElements<'_, '_> {
    type Item = Result<TypedValue, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }

        let at = self.address + (self.index * self.stride) as u64;
        self.index += 1;

        Some(
            self.reader
                .read_kind(self.element, at, &self.region, &mut self.path, self.follow),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArrayElements<'_, '_> {}
