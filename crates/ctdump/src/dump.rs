//! Resolves a named type, reads an instance and formats it.

use std::fmt::Write;

use crate::{
    cache::TypeRegistry,
    config::DumpConfig,
    errors::{DumpError, ReadError},
    format::{DumpRecord, Formatter},
    memory::{AddressSpace, MemoryRegion},
    reader::ValueReader,
};

pub struct Dumper<'a> {
    registry: &'a TypeRegistry,
    reader: ValueReader<'a>,
    formatter: Formatter,
}

impl<'a> Dumper<'a> {
    pub fn new(registry: &'a TypeRegistry, space: &'a AddressSpace<'a>, config: DumpConfig) -> Self {
        Dumper {
            registry,
            reader: ValueReader::new(registry, space, config),
            formatter: Formatter::new(config),
        }
    }

    pub fn reader(&self) -> &ValueReader<'a> {
        &self.reader
    }

    /// Dumps every named field of the instance at the start of `region`,
    /// labelled with the type name.
    pub fn dump<W: Write>(&self, type_name: &str, region: &MemoryRegion<'a>, sink: &mut W) -> Result<(), DumpError> {
        let record = self.build_record(type_name, type_name, region, None)?;
        self.formatter.format(&record, sink)?;
        Ok(())
    }

    /// Dumps only `fields`, in the given order.
    pub fn dump_fields<W: Write>(
        &self,
        label: &str,
        type_name: &str,
        region: &MemoryRegion<'a>,
        fields: &[&str],
        sink: &mut W,
    ) -> Result<(), DumpError> {
        let record = self.build_record(label, type_name, region, Some(fields))?;
        self.formatter.format(&record, sink)?;
        Ok(())
    }

    pub fn build_record(
        &self,
        label: &str,
        type_name: &str,
        region: &MemoryRegion<'a>,
        fields: Option<&[&str]>,
    ) -> Result<DumpRecord, DumpError> {
        let layout = self.registry.resolve(type_name)?;

        let values = match fields {
            None => self.reader.read_all(layout, region)?,
            Some(names) => names
                .iter()
                .map(|name| {
                    let value = self.reader.read_named(layout, region, name)?;
                    Ok::<_, ReadError>((name.to_string(), value))
                })
                .collect::<Result<Vec<_>, _>>()?,
        };

        Ok(DumpRecord {
            label: label.to_string(),
            values,
            address: region.base(),
            size: layout.size,
        })
    }
}
