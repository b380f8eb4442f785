//! # ctdump
//!
//! Computes the native memory layout of C aggregates (structs, unions,
//! bit-fields, fixed arrays, pointers) for a target ABI and dumps live
//! instances into a stable line-oriented text format.
//!
//! ## Example
//!
//! ```
//! use ctdump::abi::TargetAbi;
//! use ctdump::cache::TypeRegistry;
//! use ctdump::config::DumpConfig;
//! use ctdump::dump::Dumper;
//! use ctdump::field::{AggregateKind, FieldDescriptor};
//! use ctdump::memory::{AddressSpace, MemoryRegion};
//! use ctdump::primitive::PrimitiveKind;
//! use ctdump::writer::InstanceBuilder;
//!
//! let mut registry = TypeRegistry::new(TargetAbi::x86_64());
//! let layout = registry
//!     .define(
//!         "struct point",
//!         AggregateKind::Struct,
//!         &[
//!             FieldDescriptor::primitive("x", PrimitiveKind::I32),
//!             FieldDescriptor::bit_field("flags", PrimitiveKind::U32, 3),
//!         ],
//!     )
//!     .unwrap();
//!
//! let mut point = InstanceBuilder::new(&layout, *registry.abi());
//! point.set_int("x", -4).unwrap().set_int("flags", 5).unwrap();
//! let bytes = point.finish();
//!
//! let space = AddressSpace::new();
//! let dumper = Dumper::new(&registry, &space, DumpConfig::default());
//! let mut out = String::new();
//! dumper
//!     .dump("struct point", &MemoryRegion::new(0x1000, &bytes), &mut out)
//!     .unwrap();
//!
//! assert_eq!(
//!     out,
//!     "s: struct point\nv: x -4\nv: flags 5\no: struct point 0x1000\nt: sizeof 8\n\n"
//! );
//! ```

pub mod abi;
pub mod bits;
pub mod cache;
pub mod config;
pub mod dump;
pub mod errors;
pub mod field;
pub mod float;
pub mod format;
pub mod layout;
pub mod memory;
pub mod primitive;
pub mod reader;
#[cfg(feature = "serde")]
pub mod serde;
pub mod value;
pub mod writer;
