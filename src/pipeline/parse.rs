//! Reply parsing: pipe-delimited model text → [`Record`].
//!
//! Parsing is purely structural. The reply is trimmed as a whole, then split
//! on `|`; individual values keep their surrounding whitespace and the field
//! count is not checked here. `""` splits into one empty field, not zero.
//!
//! Reconciling the record with the schema is a separate step,
//! [`align_record`], so a stricter policy can be swapped in without
//! touching the parser or the renderer.

use crate::config::AlignmentMode;
use crate::error::Doc2CsvError;
use crate::schema::{Record, Schema};
use tracing::warn;

/// Field delimiter the model is asked to use.
pub const FIELD_DELIMITER: char = '|';

/// Split a model reply into a record.
pub fn parse_reply(reply: &str) -> Record {
    reply.trim().split(FIELD_DELIMITER).collect()
}

/// Check `record` against `schema` according to `mode`.
///
/// `Passthrough` returns the record unchanged even when the lengths differ;
/// the mismatch is logged and will show up as a misaligned CSV row.
/// `Strict` rejects any length difference.
pub fn align_record(schema: &Schema, record: Record, mode: AlignmentMode) -> Result<Record, Doc2CsvError> {
    if record.len() == schema.len() {
        return Ok(record);
    }
    match mode {
        AlignmentMode::Passthrough => {
            warn!(
                "Record has {} fields, schema has {}; columns will be misaligned",
                record.len(),
                schema.len()
            );
            Ok(record)
        }
        AlignmentMode::Strict => Err(Doc2CsvError::FieldCountMismatch {
            expected: schema.len(),
            found: record.len(),
        }),
    }
}
