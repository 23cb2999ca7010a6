//! Table objects.

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::attr::{AttrIter, get, validate};
use crate::builder::MessageBuilder;
use crate::error::{Error, ParseError, Result};
use crate::json;
use crate::message::{NLMSG_HDRLEN, NfGenMsg, NlMsgHdr};
use crate::output::Format;

/// Attribute ids for NFTA_TABLE_* constants.
mod attr_ids {
    pub const NFTA_TABLE_NAME: u16 = 1;
    pub const NFTA_TABLE_FLAGS: u16 = 2;
    pub const NFTA_TABLE_USE: u16 = 3;
    pub const NFTA_TABLE_MAX: u16 = 3;
}

use attr_ids::*;

/// Optional fields of a [`Table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAttr {
    Name,
    Family,
    Flags,
    Use,
}

/// A top-level nftables table.
///
/// All fields are optional until parsed or set explicitly. Not internally
/// synchronized; share across threads only with external locking.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Table {
    family: Option<u32>,
    name: Option<String>,
    table_flags: Option<u32>,
    use_count: Option<u32>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Get the table name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the protocol family.
    pub fn set_family(&mut self, family: u32) {
        self.family = Some(family);
    }

    /// Get the protocol family.
    pub fn family(&self) -> Option<u32> {
        self.family
    }

    /// Set the table flags.
    pub fn set_flags(&mut self, flags: u32) {
        self.table_flags = Some(flags);
    }

    /// Get the table flags.
    pub fn flags(&self) -> Option<u32> {
        self.table_flags
    }

    /// Get the number of chains using this table.
    pub fn use_count(&self) -> Option<u32> {
        self.use_count
    }

    /// Check whether an optional field is present.
    pub fn is_set(&self, attr: TableAttr) -> bool {
        match attr {
            TableAttr::Name => self.name.is_some(),
            TableAttr::Family => self.family.is_some(),
            TableAttr::Flags => self.table_flags.is_some(),
            TableAttr::Use => self.use_count.is_some(),
        }
    }

    /// Clear an optional field, releasing anything it owned.
    /// Clearing an absent field is a no-op.
    pub fn unset(&mut self, attr: TableAttr) {
        match attr {
            TableAttr::Name => self.name = None,
            TableAttr::Family => self.family = None,
            TableAttr::Flags => self.table_flags = None,
            TableAttr::Use => self.use_count = None,
        }
    }

    /// Append this table's attributes to a message under construction.
    /// Only present fields are emitted.
    pub fn build_payload(&self, builder: &mut MessageBuilder) {
        if let Some(name) = &self.name {
            builder.append_attr_str(NFTA_TABLE_NAME, name);
        }
        if let Some(flags) = self.table_flags {
            builder.append_attr_u32_be(NFTA_TABLE_FLAGS, flags);
        }
    }

    /// Build a complete netlink message carrying this table.
    pub fn build_message(&self, cmd: u16, flags: u16, seq: u32) -> Vec<u8> {
        let family = self.family.unwrap_or_default() as u8;
        let mut builder = MessageBuilder::nft(cmd, family, flags, seq);
        self.build_payload(&mut builder);
        builder.finish()
    }

    /// Parse a complete netlink message into this table.
    pub fn parse_message(&mut self, msg: &[u8]) -> Result<()> {
        let mut input = nft_payload(msg)?;
        let nfg = NfGenMsg::parse(&mut input)?;
        self.family = Some(nfg.family as u32);
        self.parse_payload(input)
    }

    fn parse_payload(&mut self, data: &[u8]) -> Result<()> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_TABLE_MAX {
                trace!(attr_type, "skipping unknown table attribute");
                continue;
            }
            match attr_type {
                NFTA_TABLE_NAME => {
                    validate::string(attr_type, payload)?;
                    self.name = Some(get::string(payload)?.to_owned());
                }
                NFTA_TABLE_FLAGS => {
                    validate::u32(attr_type, payload)?;
                    self.table_flags = Some(get::u32_be(payload)?);
                }
                NFTA_TABLE_USE => {
                    validate::u32(attr_type, payload)?;
                    self.use_count = Some(get::u32_be(payload)?);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Render in the given format.
    pub fn render(&self, format: Format) -> String {
        match format {
            Format::Text => format!(
                "table {} {} flags {:x}",
                self.name.as_deref().unwrap_or(""),
                self.family.unwrap_or_default(),
                self.table_flags.unwrap_or_default(),
            ),
            Format::Xml => {
                let mut out = String::from("<table>");
                if let Some(name) = &self.name {
                    out.push_str(&format!("<name>{name}</name>"));
                }
                if let Some(family) = self.family {
                    out.push_str(&format!("<family>{family}</family>"));
                }
                if let Some(flags) = self.table_flags {
                    out.push_str(&format!("<flags>{flags}</flags>"));
                }
                out.push_str("</table>");
                out
            }
            Format::Json => json!({ "table": self.json_value() }).to_string(),
        }
    }

    pub(crate) fn json_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(name) = &self.name {
            obj.insert("name".into(), json!(name));
        }
        if let Some(family) = self.family {
            obj.insert("family".into(), json!(family));
        }
        if let Some(flags) = self.table_flags {
            obj.insert("flags".into(), json!(flags));
        }
        if let Some(use_count) = self.use_count {
            obj.insert("use".into(), json!(use_count));
        }
        Value::Object(obj)
    }

    /// Build a table from the body of a `"table"` document node.
    pub fn from_json(value: &Value) -> std::result::Result<Self, ParseError> {
        let obj = json::as_object(value, "table")?;
        let mut table = Self::new();
        table.name = Some(json::str_field(obj, "name")?.to_owned());
        table.family = json::opt_u32_field(obj, "family")?;
        table.table_flags = json::opt_u32_field(obj, "flags")?;
        table.use_count = json::opt_u32_field(obj, "use")?;
        Ok(table)
    }
}

/// Slice out the payload of an nft message, bounds-checked against the
/// declared length.
pub(crate) fn nft_payload(msg: &[u8]) -> Result<&[u8]> {
    let header = NlMsgHdr::from_bytes(msg)?;
    let len = header.nlmsg_len as usize;
    if len < NLMSG_HDRLEN + NfGenMsg::SIZE || len > msg.len() {
        return Err(Error::Truncated {
            expected: NLMSG_HDRLEN + NfGenMsg::SIZE,
            actual: msg.len(),
        });
    }
    Ok(&msg[NLMSG_HDRLEN..len])
}
