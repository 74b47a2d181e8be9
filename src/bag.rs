//! Shopping bag snapshot as stored in session state and payment metadata.
//!
//! A bag maps a product id to either a plain quantity or a per-size
//! breakdown. The wire form is the JSON object the bag subsystem writes,
//! for example `{"12": 2, "7": {"items_by_size": {"M": 1, "L": 3}}}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BagError {
    #[error("bag is not valid JSON: {0}")]
    Malformed(String),

    #[error("product {0} has a zero quantity")]
    ZeroQuantity(i32),

    #[error("product {0} has an empty size breakdown")]
    EmptySizes(i32),
}

/// One bag entry. Untagged on the wire, explicit in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum BagEntry {
    Flat(u32),
    Sized { items_by_size: BTreeMap<String, u32> },
}

/// A single (product, size, quantity) row produced by expanding a bag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BagLine {
    pub product_id: i32,
    pub size: Option<String>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct BagSnapshot {
    #[schema(value_type = Object)]
    entries: BTreeMap<i32, BagEntry>,
}

impl BagSnapshot {
    pub fn new(entries: BTreeMap<i32, BagEntry>) -> Result<Self, BagError> {
        let bag = Self { entries };
        bag.validate()?;
        Ok(bag)
    }

    /// Parse the serialized snapshot carried in payment metadata.
    pub fn parse(raw: &str) -> Result<Self, BagError> {
        let entries: BTreeMap<i32, BagEntry> =
            serde_json::from_str(raw).map_err(|e| BagError::Malformed(e.to_string()))?;
        Self::new(entries)
    }

    /// Canonical JSON form. Keys are sorted, so equal bags serialize identically.
    pub fn to_json(&self) -> String {
        // Maps of integers and strings always serialize.
        serde_json::to_string(&self.entries).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn validate(&self) -> Result<(), BagError> {
        for (&product_id, entry) in &self.entries {
            match entry {
                BagEntry::Flat(0) => return Err(BagError::ZeroQuantity(product_id)),
                BagEntry::Flat(_) => {}
                BagEntry::Sized { items_by_size } => {
                    if items_by_size.is_empty() {
                        return Err(BagError::EmptySizes(product_id));
                    }
                    if items_by_size.values().any(|&q| q == 0) {
                        return Err(BagError::ZeroQuantity(product_id));
                    }
                }
            }
        }
        Ok(())
    }

    /// Flatten into one line per product, or per (product, size) for sized entries.
    pub fn lines(&self) -> Vec<BagLine> {
        let mut lines = Vec::new();
        for (&product_id, entry) in &self.entries {
            match entry {
                BagEntry::Flat(quantity) => lines.push(BagLine {
                    product_id,
                    size: None,
                    quantity: *quantity,
                }),
                BagEntry::Sized { items_by_size } => {
                    for (size, quantity) in items_by_size {
                        lines.push(BagLine {
                            product_id,
                            size: Some(size.clone()),
                            quantity: *quantity,
                        });
                    }
                }
            }
        }
        lines
    }
}
