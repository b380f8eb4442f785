//! Canonical line-oriented dump format.
//!
//! ```text
//! s: <label>
//! v: <field> <value>
//! o: <label> 0x<address>
//! t: sizeof <size>
//!
//! ```

use std::fmt::Write;

use crate::{
    config::DumpConfig,
    errors::FormatError,
    value::{Deref, TypedValue},
};

/// One dumped instance: its label, the requested field values, where it lives and how big it is.
#[derive(Debug, Clone, PartialEq)]
pub struct DumpRecord {
    pub label: String,
    pub values: Vec<(String, TypedValue)>,
    pub address: u64,
    pub size: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter {
    config: DumpConfig,
}

impl Formatter {
    pub fn new(config: DumpConfig) -> Self {
        Formatter { config }
    }

    /// Appends the record to `sink`. Nothing is written past the first value that fails to render.
    pub fn format<W: Write>(&self, record: &DumpRecord, sink: &mut W) -> Result<(), FormatError> {
        let mut lines = String::new();

        writeln!(lines, "s: {}", record.label)?;
        for (name, value) in &record.values {
            write!(lines, "v: {} ", name)?;
            self.render_value(name, value, &mut lines)?;
            lines.push('\n');
        }
        writeln!(lines, "o: {} {:#x}", record.label, record.address)?;
        writeln!(lines, "t: sizeof {}", record.size)?;
        lines.push('\n');

        sink.write_str(&lines)?;
        Ok(())
    }

    pub fn render(&self, field: &str, value: &TypedValue) -> Result<String, FormatError> {
        let mut out = String::new();
        self.render_value(field, value, &mut out)?;
        Ok(out)
    }

    /// Renders a single value. `field` names the top-level field in errors.
    pub fn render_value<W: Write>(&self, field: &str, value: &TypedValue, out: &mut W) -> Result<(), FormatError> {
        let precision = self.config.float_precision;

        match value {
            TypedValue::Unsigned(v) => write!(out, "{}", v)?,
            TypedValue::Signed(v) => write!(out, "{}", v)?,
            TypedValue::F32(v) => write!(out, "{:.*}", precision, *v as f64)?,
            TypedValue::F64(v) => write!(out, "{:.*}", precision, v)?,
            TypedValue::LongDouble(v) => out.write_str(&v.to_scientific())?,
            TypedValue::Unrepresentable(reason) => {
                return Err(FormatError::Unrepresentable {
                    field: field.to_string(),
                    reason: *reason,
                });
            }
            TypedValue::Pointer { address, target } => {
                write!(out, "{:#x}", address)?;
                match target {
                    Deref::Value(pointee) => {
                        out.write_str(" -> ")?;
                        self.render_value(field, pointee, out)?;
                    }
                    Deref::Invalid => out.write_str(" -> <invalid>")?,
                    Deref::NotFollowed | Deref::Null | Deref::Cycle => {}
                }
            }
            TypedValue::Array(elements) => {
                out.write_char('[')?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    self.render_value(field, element, out)?;
                }
                out.write_char(']')?;
            }
            TypedValue::Aggregate(fields) => {
                out.write_char('{')?;
                for (i, (name, inner)) in fields.iter().enumerate() {
                    if i > 0 {
                        out.write_str(", ")?;
                    }
                    write!(out, "{} ", name)?;
                    self.render_value(field, inner, out)?;
                }
                out.write_char('}')?;
            }
            TypedValue::CString(text) => write!(out, "\"{}\"", text.escape_ascii())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::float::Extended;

    fn render(value: TypedValue) -> String {
        Formatter::default().render("x", &value).unwrap()
    }

    #[test]
    fn test_record_layout() {
        let record = DumpRecord {
            label: "struct a".to_string(),
            values: vec![
                ("a".to_string(), TypedValue::Unsigned(97)),
                ("b".to_string(), TypedValue::Signed(-1)),
            ],
            address: 0x7ffd_1234,
            size: 64,
        };

        let mut out = String::new();
        Formatter::default().format(&record, &mut out).unwrap();
        assert_eq!(out, "s: struct a\nv: a 97\nv: b -1\no: struct a 0x7ffd1234\nt: sizeof 64\n\n");
    }

    #[test]
    fn test_floats() {
        assert_eq!(render(TypedValue::F32(10.0)), "10.000000");
        assert_eq!(render(TypedValue::F64(1e-4)), "0.000100");
        assert_eq!(render(TypedValue::LongDouble(Extended::from_f64(2.5))), "2.5e0");

        let short = Formatter::new(DumpConfig {
            float_precision: 2,
            ..Default::default()
        });
        assert_eq!(short.render("f", &TypedValue::F64(1.23456)).unwrap(), "1.23");
    }

    #[test]
    fn test_pointers() {
        assert_eq!(render(TypedValue::pointer(0xaaaaaaaa)), "0xaaaaaaaa");
        assert_eq!(
            render(TypedValue::Pointer {
                address: 0x1000,
                target: Deref::Value(Box::new(TypedValue::Signed(5))),
            }),
            "0x1000 -> 5"
        );
        assert_eq!(
            render(TypedValue::Pointer {
                address: 0x10,
                target: Deref::Invalid,
            }),
            "0x10 -> <invalid>"
        );
        assert_eq!(
            render(TypedValue::Pointer {
                address: 0,
                target: Deref::Null,
            }),
            "0x0"
        );
    }

    #[test]
    fn test_compound_values() {
        let value = TypedValue::Array(vec![
            TypedValue::Aggregate(vec![
                ("a".to_string(), TypedValue::Unsigned(1)),
                ("b".to_string(), TypedValue::Signed(-2)),
            ]),
            TypedValue::Aggregate(vec![
                ("a".to_string(), TypedValue::Unsigned(3)),
                ("b".to_string(), TypedValue::Signed(4)),
            ]),
        ]);

        assert_eq!(render(value), "[{a 1, b -2}, {a 3, b 4}]");
        assert_eq!(render(TypedValue::Array(vec![])), "[]");
    }

    #[test]
    fn test_cstring_is_escaped() {
        assert_eq!(
            render(TypedValue::CString(b"say \"hi\"\n".to_vec())),
            "\"say \\\"hi\\\"\\n\""
        );
    }

    #[test]
    fn test_unrepresentable_names_field() {
        let err = Formatter::default()
            .render(
                "h",
                &TypedValue::Array(vec![TypedValue::Unrepresentable("unnormal x87 encoding")]),
            )
            .unwrap_err();

        assert_eq!(
            err,
            FormatError::Unrepresentable {
                field: "h".to_string(),
                reason: "unnormal x87 encoding",
            }
        );
    }

    #[test]
    fn test_failed_record_leaves_sink_untouched() {
        let record = DumpRecord {
            label: "union b".to_string(),
            values: vec![
                ("a".to_string(), TypedValue::Unsigned(1)),
                ("h".to_string(), TypedValue::Unrepresentable("bad")),
            ],
            address: 0,
            size: 16,
        };

        let mut out = String::new();
        assert!(Formatter::default().format(&record, &mut out).is_err());
        assert!(out.is_empty());
    }
}
