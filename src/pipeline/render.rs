//! CSV rendering: schema header + one record row.
//!
//! Values are joined with `,` exactly as received. There is no quoting or
//! escaping, so a value containing a comma shifts every column after it.
//! Downstream consumers of these artifacts rely on the unquoted layout.

use crate::schema::{Record, Schema};

/// Render the two-line CSV: header, newline, values. No trailing newline.
pub fn render_csv(schema: &Schema, record: &Record) -> String {
    let header = schema.fields().join(",");
    let row = record.values().join(",");
    [header, row].join("\n")
}
