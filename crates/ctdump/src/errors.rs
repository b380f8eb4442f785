//! Error types for layout computation, value reading, formatting and instance writing.

use thiserror::Error;

/// Errors produced when computing the layout of an aggregate (see [crate::layout::compute_layout]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// The declared type of a field has no determinable size (e.g. `void`, a float bit-field).
    #[error("field `{field}` has a kind whose size cannot be determined")]
    UnsupportedFieldKind { field: String },
    /// Bit-field width is larger than its base integer kind.
    #[error("bit-field `{field}` is {width} bits wide but its base kind holds {max}")]
    InvalidBitWidth { field: String, width: u32, max: u32 },
    /// Field name is invalid (e.g. empty or duplicate).
    #[error("invalid field name `{0}`")]
    InvalidFieldName(String),
    /// An aggregate with this name is already registered.
    #[error("aggregate `{0}` is already defined")]
    DuplicateAggregate(String),
    /// No aggregate with this name is registered.
    #[error("unknown aggregate `{0}`")]
    UnknownAggregate(String),
}

/// Errors produced when reading typed values out of a memory region.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// Requested field index is beyond the descriptor's field count.
    #[error("field index {index} out of range for an aggregate of {count} fields")]
    FieldIndexOutOfRange { index: usize, count: usize },
    /// No field with this name exists in the aggregate.
    #[error("no field named `{0}`")]
    UnknownField(String),
    /// An array view was requested for a field that is not an array.
    #[error("field `{0}` is not an array")]
    NotAnArray(String),
    /// The byte range is not covered by the region (or by any mapped region).
    #[error("{len} bytes at {address:#x} are outside the mapped memory")]
    OutOfBounds { address: u64, len: usize },
    /// A pointer target names an aggregate that is not registered.
    #[error("unknown aggregate `{0}`")]
    UnknownAggregate(String),
    /// The pointer targets an aggregate instance already on the active dump path.
    ///
    /// Informational: the reader turns it into [crate::value::Deref::Cycle] rather than
    /// failing the dump.
    #[error("`{aggregate}` at {address:#x} is already being dumped")]
    CyclicReferenceDetected { aggregate: String, address: u64 },
}

/// Errors produced when rendering values into the canonical text protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The value has no exact representation in the output format.
    #[error("value of `{field}` cannot be represented exactly: {reason}")]
    Unrepresentable { field: String, reason: &'static str },
    /// The output sink refused the write.
    #[error("output sink failed")]
    Sink(#[from] std::fmt::Error),
}

/// Errors produced when populating an instance buffer with [crate::writer::InstanceBuilder].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// Buffer is too short to write the value.
    #[error("write outside of the instance buffer")]
    OutOfBounds,
    /// The value does not fit the field's kind.
    #[error("value does not fit field `{0}`")]
    InvalidValue(String),
    /// No field with this name exists in the aggregate.
    #[error("no field named `{0}`")]
    MissingField(String),
}

/// Any failure while dumping one aggregate instance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DumpError {
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Format(#[from] FormatError),
}
