//! The fixed shipment/invoice schema and the values extracted against it.
//!
//! Field order matters twice: it is the order the model is asked for in the
//! prompt, and it is the CSV column order. Both read from [`Schema`] so they
//! cannot drift apart.

use serde::{Deserialize, Serialize};

/// Field names of the shipment/invoice schema, in prompt and column order.
pub const SHIPMENT_FIELDS: [&str; 13] = [
    "PL NO",
    "INV NO",
    "HSCODE",
    "Date",
    "Address",
    "Tax No",
    "Commodity",
    "QTY",
    "Unit",
    "Unit Price",
    "Total Amount",
    "G.W(KG)",
    "N.W(KG)",
];

/// Ordered sequence of field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Build a schema from any ordered list of names.
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    /// The 13-field shipment schema.
    pub fn shipment() -> Self {
        Self::new(SHIPMENT_FIELDS)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::shipment()
    }
}

/// Values extracted from one document, meant to line up with [`Schema`]
/// position by position. Nothing upstream guarantees the lengths match.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    values: Vec<String>,
}

impl Record {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

impl<S: Into<String>> FromIterator<S> for Record {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// Rendered CSV text plus the object name it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvArtifact {
    pub name: String,
    pub text: String,
}
