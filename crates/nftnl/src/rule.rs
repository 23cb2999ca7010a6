//! Rule objects.
//!
//! A rule here carries its placement attributes only; expression payloads
//! are built and parsed by their own codecs.

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::attr::{AttrIter, get, validate};
use crate::builder::MessageBuilder;
use crate::error::{ParseError, Result};
use crate::json;
use crate::message::NfGenMsg;
use crate::output::Format;
use crate::table::nft_payload;

/// Attribute ids for NFTA_RULE_* constants.
mod attr_ids {
    pub const NFTA_RULE_TABLE: u16 = 1;
    pub const NFTA_RULE_CHAIN: u16 = 2;
    pub const NFTA_RULE_HANDLE: u16 = 3;
    pub const NFTA_RULE_POSITION: u16 = 6;
    pub const NFTA_RULE_MAX: u16 = 6;
}

use attr_ids::*;

/// Optional fields of a [`Rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAttr {
    Family,
    Table,
    Chain,
    Handle,
    Position,
}

/// A rule anchored in a chain.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Rule {
    family: Option<u32>,
    table: Option<String>,
    chain: Option<String>,
    handle: Option<u64>,
    position: Option<u64>,
}

impl Rule {
    /// Create an empty rule.
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

    pub fn set_chain(&mut self, chain: impl Into<String>) {
        self.chain = Some(chain.into());
    }

    pub fn chain(&self) -> Option<&str> {
        self.chain.as_deref()
    }

    pub fn set_handle(&mut self, handle: u64) {
        self.handle = Some(handle);
    }

    pub fn handle(&self) -> Option<u64> {
        self.handle
    }

    /// Set the handle of the rule this one is positioned after.
    pub fn set_position(&mut self, position: u64) {
        self.position = Some(position);
    }

    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// Check whether an optional field is present.
    pub fn is_set(&self, attr: RuleAttr) -> bool {
        match attr {
            RuleAttr::Family => self.family.is_some(),
            RuleAttr::Table => self.table.is_some(),
            RuleAttr::Chain => self.chain.is_some(),
            RuleAttr::Handle => self.handle.is_some(),
            RuleAttr::Position => self.position.is_some(),
        }
    }

    /// Clear an optional field. Clearing an absent field is a no-op.
    pub fn unset(&mut self, attr: RuleAttr) {
        match attr {
            RuleAttr::Family => self.family = None,
            RuleAttr::Table => self.table = None,
            RuleAttr::Chain => self.chain = None,
            RuleAttr::Handle => self.handle = None,
            RuleAttr::Position => self.position = None,
        }
    }

    /// Append this rule's attributes to a message under construction.
    pub fn build_payload(&self, builder: &mut MessageBuilder) {
        if let Some(table) = &self.table {
            builder.append_attr_str(NFTA_RULE_TABLE, table);
        }
        if let Some(chain) = &self.chain {
            builder.append_attr_str(NFTA_RULE_CHAIN, chain);
        }
        if let Some(handle) = self.handle {
            builder.append_attr_u64_be(NFTA_RULE_HANDLE, handle);
        }
        if let Some(position) = self.position {
            builder.append_attr_u64_be(NFTA_RULE_POSITION, position);
        }
    }

    /// Build a complete netlink message carrying this rule.
    pub fn build_message(&self, cmd: u16, flags: u16, seq: u32) -> Vec<u8> {
        let family = self.family.unwrap_or_default() as u8;
        let mut builder = MessageBuilder::nft(cmd, family, flags, seq);
        self.build_payload(&mut builder);
        builder.finish()
    }

    /// Parse a complete netlink message into this rule.
    pub fn parse_message(&mut self, msg: &[u8]) -> Result<()> {
        let mut input = nft_payload(msg)?;
        let nfg = NfGenMsg::parse(&mut input)?;
        self.family = Some(nfg.family as u32);
        self.parse_payload(input)
    }

    fn parse_payload(&mut self, data: &[u8]) -> Result<()> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_RULE_MAX {
                trace!(attr_type, "skipping unknown rule attribute");
                continue;
            }
            match attr_type {
                NFTA_RULE_TABLE => {
                    validate::string(attr_type, payload)?;
                    self.table = Some(get::string(payload)?.to_owned());
                }
                NFTA_RULE_CHAIN => {
                    validate::string(attr_type, payload)?;
                    self.chain = Some(get::string(payload)?.to_owned());
                }
                NFTA_RULE_HANDLE => {
                    self.handle = Some(get::u64_be(payload)?);
                }
                NFTA_RULE_POSITION => {
                    self.position = Some(get::u64_be(payload)?);
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
                "rule {} {} handle {}",
                self.table.as_deref().unwrap_or(""),
                self.chain.as_deref().unwrap_or(""),
                self.handle.unwrap_or_default(),
            ),
            Format::Xml => {
                let mut out = String::from("<rule>");
                if let Some(table) = &self.table {
                    out.push_str(&format!("<table>{table}</table>"));
                }
                if let Some(chain) = &self.chain {
                    out.push_str(&format!("<chain>{chain}</chain>"));
                }
                if let Some(family) = self.family {
                    out.push_str(&format!("<family>{family}</family>"));
                }
                if let Some(handle) = self.handle {
                    out.push_str(&format!("<handle>{handle}</handle>"));
                }
                if let Some(position) = self.position {
                    out.push_str(&format!("<position>{position}</position>"));
                }
                out.push_str("</rule>");
                out
            }
            Format::Json => json!({ "rule": self.json_value() }).to_string(),
        }
    }

    pub(crate) fn json_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(family) = self.family {
            obj.insert("family".into(), json!(family));
        }
        if let Some(table) = &self.table {
            obj.insert("table".into(), json!(table));
        }
        if let Some(chain) = &self.chain {
            obj.insert("chain".into(), json!(chain));
        }
        if let Some(handle) = self.handle {
            obj.insert("handle".into(), json!(handle));
        }
        if let Some(position) = self.position {
            obj.insert("position".into(), json!(position));
        }
        Value::Object(obj)
    }

    /// Build a rule from the body of a `"rule"` document node.
    pub fn from_json(value: &Value) -> std::result::Result<Self, ParseError> {
        let obj = json::as_object(value, "rule")?;
        let mut rule = Self::new();
        rule.table = Some(json::str_field(obj, "table")?.to_owned());
        rule.chain = Some(json::str_field(obj, "chain")?.to_owned());
        rule.family = json::opt_u32_field(obj, "family")?;
        rule.handle = json::opt_u64_field(obj, "handle")?;
        rule.position = json::opt_u64_field(obj, "position")?;
        Ok(rule)
    }
}
