//! Method table description.
//!
//! A [`Schema`] tells a front end which selector to put in front of each
//! call, how wide selectors are, and how each method encodes its payloads.
//! It is rendered as JSON so a generator or a probe can consume it.
//!
//! # Example
//!
//! ```
//! use rpcwire::handler::{Encoding, Schema};
//!
//! let mut schema = Schema::new(1);
//! schema.add_method("vadd", 0, Encoding::Packed);
//! schema.add_method("stats", 1, Encoding::MsgPack);
//!
//! let json = schema.to_json().unwrap();
//! assert!(json.contains("\"vadd\""));
//!
//! let parsed = Schema::from_json(&json).unwrap();
//! assert_eq!(parsed.get_method("stats").unwrap().selector, 1);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire generation described by a schema.
///
/// Generation 2 is the framing where every reply carries a status byte
/// after its length prefix.
pub const PROTOCOL_VERSION: &str = "2";

/// How a method encodes its arguments and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Packed native layout.
    Packed,
    /// MessagePack, structs as maps.
    MsgPack,
    /// Bytes passed through untouched.
    Raw,
}

/// One registered method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSchema {
    pub name: String,
    pub selector: u32,
    pub encoding: Encoding,
}

/// Description of a method table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub version: String,
    /// Selector size in bytes (1, 2 or 4).
    pub selector_width: usize,
    /// Methods in selector order.
    pub methods: Vec<MethodSchema>,
}

impl Schema {
    /// Create an empty schema for the given selector width.
    pub fn new(selector_width: usize) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            selector_width,
            methods: Vec::new(),
        }
    }

    pub fn add_method(&mut self, name: &str, selector: u32, encoding: Encoding) {
        self.methods.push(MethodSchema {
            name: name.to_string(),
            selector,
            encoding,
        });
    }

    /// Get a method by name.
    pub fn get_method(&self, name: &str) -> Option<&MethodSchema> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Render as a JSON document.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON document produced by [`Schema::to_json`].
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
