//! Set objects.

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::attr::{AttrIter, get, validate};
use crate::builder::MessageBuilder;
use crate::error::{ParseError, Result};
use crate::json;
use crate::message::NfGenMsg;
use crate::output::Format;
use crate::set_elem::{ElemList, SetElem};
use crate::table::nft_payload;

/// Attribute ids for NFTA_SET_* constants.
mod attr_ids {
    pub const NFTA_SET_TABLE: u16 = 1;
    pub const NFTA_SET_NAME: u16 = 2;
    pub const NFTA_SET_FLAGS: u16 = 3;
    pub const NFTA_SET_KEY_TYPE: u16 = 4;
    pub const NFTA_SET_KEY_LEN: u16 = 5;
    pub const NFTA_SET_DATA_TYPE: u16 = 6;
    pub const NFTA_SET_DATA_LEN: u16 = 7;
    pub const NFTA_SET_MAX: u16 = 7;
}

use attr_ids::*;

/// Optional fields of a [`Set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetAttr {
    Family,
    Table,
    Name,
    Flags,
    KeyType,
    KeyLen,
    DataType,
    DataLen,
}

/// A named set belonging to a table, exclusively owning its elements.
///
/// Name and table are optional until parsed or set explicitly. Dropping the
/// set drops every element and any chain name an element's verdict owns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Set {
    family: Option<u32>,
    table: Option<String>,
    name: Option<String>,
    set_flags: Option<u32>,
    key_type: Option<u32>,
    key_len: Option<u32>,
    data_type: Option<u32>,
    data_len: Option<u32>,
    elems: ElemList,
}

impl Set {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_family(&mut self, family: u32) {
        self.family = Some(family);
    }

    pub fn family(&self) -> Option<u32> {
        self.family
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = Some(table.into());
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.set_flags = Some(flags);
    }

    pub fn flags(&self) -> Option<u32> {
        self.set_flags
    }

    pub fn set_key_type(&mut self, key_type: u32) {
        self.key_type = Some(key_type);
    }

    pub fn key_type(&self) -> Option<u32> {
        self.key_type
    }

    pub fn set_key_len(&mut self, key_len: u32) {
        self.key_len = Some(key_len);
    }

    pub fn key_len(&self) -> Option<u32> {
        self.key_len
    }

    pub fn set_data_type(&mut self, data_type: u32) {
        self.data_type = Some(data_type);
    }

    pub fn data_type(&self) -> Option<u32> {
        self.data_type
    }

    pub fn set_data_len(&mut self, data_len: u32) {
        self.data_len = Some(data_len);
    }

    pub fn data_len(&self) -> Option<u32> {
        self.data_len
    }

    /// The elements owned by this set.
    pub fn elems(&self) -> &ElemList {
        &self.elems
    }

    /// Mutable access to the owned elements.
    pub fn elems_mut(&mut self) -> &mut ElemList {
        &mut self.elems
    }

    /// Append an element, taking ownership.
    pub fn push_elem(&mut self, elem: SetElem) {
        self.elems.push(elem);
    }

    /// Check whether an optional field is present.
    pub fn is_set(&self, attr: SetAttr) -> bool {
        match attr {
            SetAttr::Family => self.family.is_some(),
            SetAttr::Table => self.table.is_some(),
            SetAttr::Name => self.name.is_some(),
            SetAttr::Flags => self.set_flags.is_some(),
            SetAttr::KeyType => self.key_type.is_some(),
            SetAttr::KeyLen => self.key_len.is_some(),
            SetAttr::DataType => self.data_type.is_some(),
            SetAttr::DataLen => self.data_len.is_some(),
        }
    }

    /// Clear an optional field, releasing anything it owned.
    /// Clearing an absent field is a no-op.
    pub fn unset(&mut self, attr: SetAttr) {
        match attr {
            SetAttr::Family => self.family = None,
            SetAttr::Table => self.table = None,
            SetAttr::Name => self.name = None,
            SetAttr::Flags => self.set_flags = None,
            SetAttr::KeyType => self.key_type = None,
            SetAttr::KeyLen => self.key_len = None,
            SetAttr::DataType => self.data_type = None,
            SetAttr::DataLen => self.data_len = None,
        }
    }

    /// Append this set's attributes to a message under construction.
    /// Only present fields are emitted.
    pub fn build_payload(&self, builder: &mut MessageBuilder) {
        if let Some(table) = &self.table {
            builder.append_attr_str(NFTA_SET_TABLE, table);
        }
        if let Some(name) = &self.name {
            builder.append_attr_str(NFTA_SET_NAME, name);
        }
        if let Some(flags) = self.set_flags {
            builder.append_attr_u32_be(NFTA_SET_FLAGS, flags);
        }
        if let Some(key_type) = self.key_type {
            builder.append_attr_u32_be(NFTA_SET_KEY_TYPE, key_type);
        }
        if let Some(key_len) = self.key_len {
            builder.append_attr_u32_be(NFTA_SET_KEY_LEN, key_len);
        }
        if let Some(data_type) = self.data_type {
            builder.append_attr_u32_be(NFTA_SET_DATA_TYPE, data_type);
        }
        if let Some(data_len) = self.data_len {
            builder.append_attr_u32_be(NFTA_SET_DATA_LEN, data_len);
        }
    }

    /// Build a complete netlink message carrying this set's attributes
    /// (elements travel in their own messages).
    pub fn build_message(&self, cmd: u16, flags: u16, seq: u32) -> Vec<u8> {
        let family = self.family.unwrap_or_default() as u8;
        let mut builder = MessageBuilder::nft(cmd, family, flags, seq);
        self.build_payload(&mut builder);
        builder.finish()
    }

    /// Parse a complete netlink message into this set.
    pub fn parse_message(&mut self, msg: &[u8]) -> Result<()> {
        let mut input = nft_payload(msg)?;
        let nfg = NfGenMsg::parse(&mut input)?;
        self.family = Some(nfg.family as u32);
        self.parse_payload(input)
    }

    fn parse_payload(&mut self, data: &[u8]) -> Result<()> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_SET_MAX {
                trace!(attr_type, "skipping unknown set attribute");
                continue;
            }
            match attr_type {
                NFTA_SET_TABLE => {
                    validate::string(attr_type, payload)?;
                    self.table = Some(get::string(payload)?.to_owned());
                }
                NFTA_SET_NAME => {
                    validate::string(attr_type, payload)?;
                    self.name = Some(get::string(payload)?.to_owned());
                }
                NFTA_SET_FLAGS => {
                    validate::u32(attr_type, payload)?;
                    self.set_flags = Some(get::u32_be(payload)?);
                }
                NFTA_SET_KEY_TYPE => {
                    validate::u32(attr_type, payload)?;
                    self.key_type = Some(get::u32_be(payload)?);
                }
                NFTA_SET_KEY_LEN => {
                    validate::u32(attr_type, payload)?;
                    self.key_len = Some(get::u32_be(payload)?);
                }
                NFTA_SET_DATA_TYPE => {
                    validate::u32(attr_type, payload)?;
                    self.data_type = Some(get::u32_be(payload)?);
                }
                NFTA_SET_DATA_LEN => {
                    validate::u32(attr_type, payload)?;
                    self.data_len = Some(get::u32_be(payload)?);
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Render in the given format.
    pub fn render(&self, format: Format) -> String {
        match format {
            Format::Text => {
                let mut out = format!(
                    "set {} {} {:x}",
                    self.name.as_deref().unwrap_or(""),
                    self.table.as_deref().unwrap_or(""),
                    self.set_flags.unwrap_or_default(),
                );
                for elem in &self.elems {
                    out.push_str(&format!("\n  {elem}"));
                }
                out
            }
            Format::Xml => {
                let mut out = String::from("<set>");
                if let Some(name) = &self.name {
                    out.push_str(&format!("<name>{name}</name>"));
                }
                if let Some(table) = &self.table {
                    out.push_str(&format!("<table>{table}</table>"));
                }
                if let Some(family) = self.family {
                    out.push_str(&format!("<family>{family}</family>"));
                }
                if let Some(flags) = self.set_flags {
                    out.push_str(&format!("<flags>{flags}</flags>"));
                }
                if let Some(key_type) = self.key_type {
                    out.push_str(&format!("<key_type>{key_type}</key_type>"));
                }
                if let Some(key_len) = self.key_len {
                    out.push_str(&format!("<key_len>{key_len}</key_len>"));
                }
                if let Some(data_type) = self.data_type {
                    out.push_str(&format!("<data_type>{data_type}</data_type>"));
                }
                if let Some(data_len) = self.data_len {
                    out.push_str(&format!("<data_len>{data_len}</data_len>"));
                }
                for elem in &self.elems {
                    out.push_str(&elem.render_xml());
                }
                out.push_str("</set>");
                out
            }
            Format::Json => json!({ "set": self.json_value() }).to_string(),
        }
    }

    pub(crate) fn json_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(name) = &self.name {
            obj.insert("name".into(), json!(name));
        }
        if let Some(table) = &self.table {
            obj.insert("table".into(), json!(table));
        }
        if let Some(family) = self.family {
            obj.insert("family".into(), json!(family));
        }
        if let Some(flags) = self.set_flags {
            obj.insert("flags".into(), json!(flags));
        }
        if let Some(key_type) = self.key_type {
            obj.insert("key_type".into(), json!(key_type));
        }
        if let Some(key_len) = self.key_len {
            obj.insert("key_len".into(), json!(key_len));
        }
        if let Some(data_type) = self.data_type {
            obj.insert("data_type".into(), json!(data_type));
        }
        if let Some(data_len) = self.data_len {
            obj.insert("data_len".into(), json!(data_len));
        }
        if !self.elems.is_empty() {
            let elems: Vec<Value> = self.elems.iter().map(SetElem::json_value).collect();
            obj.insert("elements".into(), Value::Array(elems));
        }
        Value::Object(obj)
    }

    /// Build a set from the body of a `"set"` document node.
    pub fn from_json(value: &Value) -> std::result::Result<Self, ParseError> {
        let obj = json::as_object(value, "set")?;
        let mut set = Self::new();
        set.name = Some(json::str_field(obj, "name")?.to_owned());
        set.table = Some(json::str_field(obj, "table")?.to_owned());
        set.family = json::opt_u32_field(obj, "family")?;
        set.set_flags = json::opt_u32_field(obj, "flags")?;
        set.key_type = json::opt_u32_field(obj, "key_type")?;
        set.key_len = json::opt_u32_field(obj, "key_len")?;
        set.data_type = json::opt_u32_field(obj, "data_type")?;
        set.data_len = json::opt_u32_field(obj, "data_len")?;
        if let Some(elems) = obj.get("elements") {
            let elems = elems
                .as_array()
                .ok_or_else(|| ParseError::bad_type("elements"))?;
            for elem in elems {
                set.elems.push(SetElem::from_json(elem)?);
            }
        }
        Ok(set)
    }
}
