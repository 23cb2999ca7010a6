//! Chain objects.

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::attr::{AttrIter, get, validate};
use crate::builder::MessageBuilder;
use crate::error::{ParseError, Result};
use crate::json;
use crate::message::NfGenMsg;
use crate::output::Format;
use crate::table::nft_payload;

/// Attribute ids for NFTA_CHAIN_* and NFTA_HOOK_* constants.
mod attr_ids {
    pub const NFTA_CHAIN_TABLE: u16 = 1;
    pub const NFTA_CHAIN_HANDLE: u16 = 2;
    pub const NFTA_CHAIN_NAME: u16 = 3;
    pub const NFTA_CHAIN_HOOK: u16 = 4;
    pub const NFTA_CHAIN_POLICY: u16 = 5;
    pub const NFTA_CHAIN_USE: u16 = 6;
    pub const NFTA_CHAIN_TYPE: u16 = 7;
    pub const NFTA_CHAIN_MAX: u16 = 7;

    pub const NFTA_HOOK_HOOKNUM: u16 = 1;
    pub const NFTA_HOOK_PRIORITY: u16 = 2;
    pub const NFTA_HOOK_MAX: u16 = 2;
}

use attr_ids::*;

/// Optional fields of a [`Chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainAttr {
    Name,
    Table,
    Family,
    Handle,
    Hooknum,
    Priority,
    Policy,
    Use,
    Type,
}

/// A chain anchored in a table, optionally hooked into the packet path.
///
/// All fields are optional until parsed or set explicitly.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Chain {
    family: Option<u32>,
    name: Option<String>,
    table: Option<String>,
    handle: Option<u64>,
    hooknum: Option<u32>,
    priority: Option<i32>,
    policy: Option<u32>,
    use_count: Option<u32>,
    chain_type: Option<String>,
}

impl Chain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_table(&mut self, table: impl Into<String>) {
        self.table = Some(table.into());
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn set_family(&mut self, family: u32) {
        self.family = Some(family);
    }

    pub fn family(&self) -> Option<u32> {
        self.family
    }

    pub fn set_handle(&mut self, handle: u64) {
        self.handle = Some(handle);
    }

    pub fn handle(&self) -> Option<u64> {
        self.handle
    }

    /// Set the hook point and priority; both travel in one nested attribute.
    pub fn set_hook(&mut self, hooknum: u32, priority: i32) {
        self.hooknum = Some(hooknum);
        self.priority = Some(priority);
    }

    pub fn hooknum(&self) -> Option<u32> {
        self.hooknum
    }

    pub fn priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn set_policy(&mut self, policy: u32) {
        self.policy = Some(policy);
    }

    pub fn policy(&self) -> Option<u32> {
        self.policy
    }

    pub fn set_chain_type(&mut self, chain_type: impl Into<String>) {
        self.chain_type = Some(chain_type.into());
    }

    pub fn chain_type(&self) -> Option<&str> {
        self.chain_type.as_deref()
    }

    /// Check whether an optional field is present.
    pub fn is_set(&self, attr: ChainAttr) -> bool {
        match attr {
            ChainAttr::Name => self.name.is_some(),
            ChainAttr::Table => self.table.is_some(),
            ChainAttr::Family => self.family.is_some(),
            ChainAttr::Handle => self.handle.is_some(),
            ChainAttr::Hooknum => self.hooknum.is_some(),
            ChainAttr::Priority => self.priority.is_some(),
            ChainAttr::Policy => self.policy.is_some(),
            ChainAttr::Use => self.use_count.is_some(),
            ChainAttr::Type => self.chain_type.is_some(),
        }
    }

    /// Clear an optional field. Clearing an absent field is a no-op.
    pub fn unset(&mut self, attr: ChainAttr) {
        match attr {
            ChainAttr::Name => self.name = None,
            ChainAttr::Table => self.table = None,
            ChainAttr::Family => self.family = None,
            ChainAttr::Handle => self.handle = None,
            ChainAttr::Hooknum => self.hooknum = None,
            ChainAttr::Priority => self.priority = None,
            ChainAttr::Policy => self.policy = None,
            ChainAttr::Use => self.use_count = None,
            ChainAttr::Type => self.chain_type = None,
        }
    }

    /// Append this chain's attributes to a message under construction.
    pub fn build_payload(&self, builder: &mut MessageBuilder) {
        if let Some(table) = &self.table {
            builder.append_attr_str(NFTA_CHAIN_TABLE, table);
        }
        if let Some(name) = &self.name {
            builder.append_attr_str(NFTA_CHAIN_NAME, name);
        }
        if let Some(handle) = self.handle {
            builder.append_attr_u64_be(NFTA_CHAIN_HANDLE, handle);
        }
        if self.hooknum.is_some() || self.priority.is_some() {
            let nest = builder.nest_start(NFTA_CHAIN_HOOK);
            if let Some(hooknum) = self.hooknum {
                builder.append_attr_u32_be(NFTA_HOOK_HOOKNUM, hooknum);
            }
            if let Some(priority) = self.priority {
                builder.append_attr_i32_be(NFTA_HOOK_PRIORITY, priority);
            }
            builder.nest_end(nest);
        }
        if let Some(policy) = self.policy {
            builder.append_attr_u32_be(NFTA_CHAIN_POLICY, policy);
        }
        if let Some(chain_type) = &self.chain_type {
            builder.append_attr_str(NFTA_CHAIN_TYPE, chain_type);
        }
    }

    /// Build a complete netlink message carrying this chain.
    pub fn build_message(&self, cmd: u16, flags: u16, seq: u32) -> Vec<u8> {
        let family = self.family.unwrap_or_default() as u8;
        let mut builder = MessageBuilder::nft(cmd, family, flags, seq);
        self.build_payload(&mut builder);
        builder.finish()
    }

    /// Parse a complete netlink message into this chain.
    pub fn parse_message(&mut self, msg: &[u8]) -> Result<()> {
        let mut input = nft_payload(msg)?;
        let nfg = NfGenMsg::parse(&mut input)?;
        self.family = Some(nfg.family as u32);
        self.parse_payload(input)
    }

    fn parse_payload(&mut self, data: &[u8]) -> Result<()> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_CHAIN_MAX {
                trace!(attr_type, "skipping unknown chain attribute");
                continue;
            }
            match attr_type {
                NFTA_CHAIN_TABLE => {
                    validate::string(attr_type, payload)?;
                    self.table = Some(get::string(payload)?.to_owned());
                }
                NFTA_CHAIN_NAME => {
                    validate::string(attr_type, payload)?;
                    self.name = Some(get::string(payload)?.to_owned());
                }
                NFTA_CHAIN_HANDLE => {
                    self.handle = Some(get::u64_be(payload)?);
                }
                NFTA_CHAIN_HOOK => {
                    validate::nested(attr_type, payload)?;
                    self.parse_hook(payload)?;
                }
                NFTA_CHAIN_POLICY => {
                    validate::u32(attr_type, payload)?;
                    self.policy = Some(get::u32_be(payload)?);
                }
                NFTA_CHAIN_USE => {
                    validate::u32(attr_type, payload)?;
                    self.use_count = Some(get::u32_be(payload)?);
                }
                NFTA_CHAIN_TYPE => {
                    validate::string(attr_type, payload)?;
                    self.chain_type = Some(get::string(payload)?.to_owned());
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_hook(&mut self, data: &[u8]) -> Result<()> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_HOOK_MAX {
                trace!(attr_type, "skipping unknown hook attribute");
                continue;
            }
            match attr_type {
                NFTA_HOOK_HOOKNUM => {
                    validate::u32(attr_type, payload)?;
                    self.hooknum = Some(get::u32_be(payload)?);
                }
                NFTA_HOOK_PRIORITY => {
                    validate::u32(attr_type, payload)?;
                    self.priority = Some(get::i32_be(payload)?);
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
                    "chain {} {} {}",
                    self.table.as_deref().unwrap_or(""),
                    self.name.as_deref().unwrap_or(""),
                    self.family.unwrap_or_default(),
                );
                if let (Some(hooknum), Some(priority)) = (self.hooknum, self.priority) {
                    out.push_str(&format!(" hook {hooknum} prio {priority}"));
                }
                if let Some(policy) = self.policy {
                    out.push_str(&format!(" policy {policy}"));
                }
                out
            }
            Format::Xml => {
                let mut out = String::from("<chain>");
                if let Some(name) = &self.name {
                    out.push_str(&format!("<name>{name}</name>"));
                }
                if let Some(table) = &self.table {
                    out.push_str(&format!("<table>{table}</table>"));
                }
                if let Some(family) = self.family {
                    out.push_str(&format!("<family>{family}</family>"));
                }
                if let Some(handle) = self.handle {
                    out.push_str(&format!("<handle>{handle}</handle>"));
                }
                if let Some(hooknum) = self.hooknum {
                    out.push_str(&format!("<hooknum>{hooknum}</hooknum>"));
                }
                if let Some(priority) = self.priority {
                    out.push_str(&format!("<prio>{priority}</prio>"));
                }
                if let Some(policy) = self.policy {
                    out.push_str(&format!("<policy>{policy}</policy>"));
                }
                if let Some(chain_type) = &self.chain_type {
                    out.push_str(&format!("<type>{chain_type}</type>"));
                }
                out.push_str("</chain>");
                out
            }
            Format::Json => json!({ "chain": self.json_value() }).to_string(),
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
        if let Some(handle) = self.handle {
            obj.insert("handle".into(), json!(handle));
        }
        if let Some(hooknum) = self.hooknum {
            obj.insert("hooknum".into(), json!(hooknum));
        }
        if let Some(priority) = self.priority {
            obj.insert("prio".into(), json!(priority));
        }
        if let Some(policy) = self.policy {
            obj.insert("policy".into(), json!(policy));
        }
        if let Some(use_count) = self.use_count {
            obj.insert("use".into(), json!(use_count));
        }
        if let Some(chain_type) = &self.chain_type {
            obj.insert("type".into(), json!(chain_type));
        }
        Value::Object(obj)
    }

    /// Build a chain from the body of a `"chain"` document node.
    pub fn from_json(value: &Value) -> std::result::Result<Self, ParseError> {
        let obj = json::as_object(value, "chain")?;
        let mut chain = Self::new();
        chain.name = Some(json::str_field(obj, "name")?.to_owned());
        chain.table = Some(json::str_field(obj, "table")?.to_owned());
        chain.family = json::opt_u32_field(obj, "family")?;
        chain.handle = json::opt_u64_field(obj, "handle")?;
        chain.hooknum = json::opt_u32_field(obj, "hooknum")?;
        chain.priority = json::opt_i32_field(obj, "prio")?;
        chain.policy = json::opt_u32_field(obj, "policy")?;
        chain.use_count = json::opt_u32_field(obj, "use")?;
        chain.chain_type = json::opt_str_field(obj, "type")?.map(str::to_owned);
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{NftMsgType, family};

    #[test]
    fn attr_record_contract() {
        let mut chain = Chain::new();
        chain.set_hook(1, -100);
        assert!(chain.is_set(ChainAttr::Hooknum));
        assert_eq!(chain.priority(), Some(-100));

        chain.unset(ChainAttr::Priority);
        assert!(!chain.is_set(ChainAttr::Priority));
        assert!(chain.is_set(ChainAttr::Hooknum));
    }

    #[test]
    fn message_roundtrip_with_hook() {
        let mut chain = Chain::new();
        chain.set_family(family::NFPROTO_IPV4 as u32);
        chain.set_table("filter");
        chain.set_name("input");
        chain.set_hook(1, -100);
        chain.set_policy(1);
        chain.set_chain_type("filter");
        chain.set_handle(42);

        let msg = chain.build_message(NftMsgType::NEWCHAIN, 0, 9);

        let mut parsed = Chain::new();
        parsed.parse_message(&msg).unwrap();
        assert_eq!(parsed, chain);
    }

    #[test]
    fn json_roundtrip() {
        let mut chain = Chain::new();
        chain.set_name("forward");
        chain.set_table("filter");
        chain.set_hook(2, 0);

        let value = chain.json_value();
        assert_eq!(Chain::from_json(&value).unwrap(), chain);
    }

    #[test]
    fn from_json_requires_table() {
        let value = json!({"name": "input"});
        assert_eq!(
            Chain::from_json(&value),
            Err(ParseError::missing("table"))
        );
    }
}
