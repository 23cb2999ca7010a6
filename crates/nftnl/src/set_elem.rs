//! Set elements, element ownership, and the element-list codec.

use std::fmt;

use serde_json::{Map, Value, json};
use tracing::trace;

use crate::attr::{AttrIter, get, validate};
use crate::builder::MessageBuilder;
use crate::data::{DataBuf, DataValue};
use crate::error::{Error, ParseError, Result};
use crate::json;
use crate::message::NfGenMsg;
use crate::set::Set;
use crate::table::nft_payload;

/// Attribute ids for NFTA_SET_ELEM_* and NFTA_SET_ELEM_LIST_* constants.
mod attr_ids {
    pub const NFTA_SET_ELEM_KEY: u16 = 1;
    pub const NFTA_SET_ELEM_DATA: u16 = 2;
    pub const NFTA_SET_ELEM_FLAGS: u16 = 3;
    pub const NFTA_SET_ELEM_MAX: u16 = 3;

    /// Tag the kernel uses for every child of the elements container.
    pub const NFTA_LIST_ELEM: u16 = 1;

    pub const NFTA_SET_ELEM_LIST_TABLE: u16 = 1;
    pub const NFTA_SET_ELEM_LIST_SET: u16 = 2;
    pub const NFTA_SET_ELEM_LIST_ELEMENTS: u16 = 3;
    pub const NFTA_SET_ELEM_LIST_MAX: u16 = 3;
}

use attr_ids::*;

/// Optional fields of a [`SetElem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetElemAttr {
    Flags,
    Key,
    Data,
}

/// One element of a set: a key, optional per-element flags, and optional
/// data (a raw value or a verdict).
///
/// Identity is positional; an element belongs to exactly one list.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetElem {
    elem_flags: Option<u32>,
    key: Option<DataBuf>,
    data: Option<DataValue>,
}

impl SetElem {
    /// Create an empty element.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_flags(&mut self, flags: u32) {
        self.elem_flags = Some(flags);
    }

    pub fn flags(&self) -> Option<u32> {
        self.elem_flags
    }

    pub fn set_key(&mut self, key: DataBuf) {
        self.key = Some(key);
    }

    pub fn key(&self) -> Option<&DataBuf> {
        self.key.as_ref()
    }

    pub fn set_data(&mut self, data: DataValue) {
        self.data = Some(data);
    }

    pub fn data(&self) -> Option<&DataValue> {
        self.data.as_ref()
    }

    /// Check whether an optional field is present.
    pub fn is_set(&self, attr: SetElemAttr) -> bool {
        match attr {
            SetElemAttr::Flags => self.elem_flags.is_some(),
            SetElemAttr::Key => self.key.is_some(),
            SetElemAttr::Data => self.data.is_some(),
        }
    }

    /// Clear an optional field, releasing anything it owned (a verdict's
    /// chain name included). Clearing an absent field is a no-op.
    pub fn unset(&mut self, attr: SetElemAttr) {
        match attr {
            SetElemAttr::Flags => self.elem_flags = None,
            SetElemAttr::Key => self.key = None,
            SetElemAttr::Data => self.data = None,
        }
    }

    /// Append this element's attributes to a message under construction.
    /// Only present fields are emitted; the key travels as a nested raw
    /// value register, the data as a nested value or verdict register.
    pub fn encode(&self, builder: &mut MessageBuilder) {
        if let Some(flags) = self.elem_flags {
            builder.append_attr_u32_be(NFTA_SET_ELEM_FLAGS, flags);
        }
        if let Some(key) = self.key {
            DataValue::Value(key).encode(builder, NFTA_SET_ELEM_KEY);
        }
        if let Some(data) = &self.data {
            data.encode(builder, NFTA_SET_ELEM_DATA);
        }
    }

    /// Decode one element from the payload of its list child attribute.
    ///
    /// Always returns the element, even when its decode failed partway:
    /// the caller links it into the owning list before propagating the
    /// error, matching the wire parser's observable behavior.
    pub fn decode(data: &[u8]) -> (Self, Result<()>) {
        let mut elem = Self::new();
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_SET_ELEM_MAX {
                trace!(attr_type, "skipping unknown set element attribute");
                continue;
            }
            let status = match attr_type {
                NFTA_SET_ELEM_FLAGS => validate::u32(attr_type, payload)
                    .and_then(|()| get::u32_be(payload))
                    .map(|flags| elem.elem_flags = Some(flags)),
                NFTA_SET_ELEM_KEY => validate::nested(attr_type, payload)
                    .and_then(|()| DataValue::decode(payload))
                    .and_then(|value| match value {
                        DataValue::Value(buf) => {
                            elem.key = Some(buf);
                            Ok(())
                        }
                        DataValue::Verdict { .. } => Err(Error::InvalidAttribute(
                            "verdict register in set element key".into(),
                        )),
                    }),
                NFTA_SET_ELEM_DATA => validate::nested(attr_type, payload)
                    .and_then(|()| DataValue::decode(payload))
                    .map(|value| elem.data = Some(value)),
                _ => Ok(()),
            };
            if let Err(err) = status {
                return (elem, Err(err));
            }
        }
        (elem, Ok(()))
    }

    pub(crate) fn render_xml(&self) -> String {
        let mut out = String::from("<elem>");
        if let Some(flags) = self.elem_flags {
            out.push_str(&format!("<flags>{flags}</flags>"));
        }
        if let Some(key) = &self.key {
            out.push_str(&format!("<key>{}</key>", key.to_hex()));
        }
        match &self.data {
            Some(DataValue::Value(buf)) => {
                out.push_str(&format!("<data>{}</data>", buf.to_hex()));
            }
            Some(DataValue::Verdict { code, chain }) => {
                out.push_str(&format!("<verdict>{code}</verdict>"));
                if let Some(chain) = chain {
                    out.push_str(&format!("<chain>{chain}</chain>"));
                }
            }
            None => {}
        }
        out.push_str("</elem>");
        out
    }

    pub(crate) fn json_value(&self) -> Value {
        let mut obj = Map::new();
        if let Some(flags) = self.elem_flags {
            obj.insert("flags".into(), json!(flags));
        }
        if let Some(key) = &self.key {
            obj.insert("key".into(), json!(key.to_hex()));
        }
        match &self.data {
            Some(DataValue::Value(buf)) => {
                obj.insert("data".into(), json!(buf.to_hex()));
            }
            Some(DataValue::Verdict { code, chain }) => {
                let mut verdict = Map::new();
                verdict.insert("code".into(), json!(code));
                if let Some(chain) = chain {
                    verdict.insert("chain".into(), json!(chain));
                }
                obj.insert("verdict".into(), Value::Object(verdict));
            }
            None => {}
        }
        Value::Object(obj)
    }

    /// Build an element from one entry of an `"elements"` document array.
    pub fn from_json(value: &Value) -> std::result::Result<Self, ParseError> {
        let obj = json::as_object(value, "elem")?;
        let mut elem = Self::new();
        elem.elem_flags = json::opt_u32_field(obj, "flags")?;
        if let Some(key) = json::opt_str_field(obj, "key")? {
            elem.key = Some(DataBuf::from_hex(key).map_err(|_| ParseError::bad_type("key"))?);
        }
        if let Some(data) = json::opt_str_field(obj, "data")? {
            elem.data = Some(DataValue::Value(
                DataBuf::from_hex(data).map_err(|_| ParseError::bad_type("data"))?,
            ));
        } else if let Some(verdict) = obj.get("verdict") {
            let verdict = json::as_object(verdict, "verdict")?;
            elem.data = Some(DataValue::Verdict {
                code: json::i32_field(verdict, "code")?,
                chain: json::opt_str_field(verdict, "chain")?.map(str::to_owned),
            });
        }
        Ok(elem)
    }
}

impl fmt::Display for SetElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flags={}", self.elem_flags.unwrap_or_default())?;
        if let Some(key) = &self.key {
            write!(f, " key={}", key.to_hex())?;
        }
        match &self.data {
            Some(DataValue::Value(buf)) => write!(f, " data={}", buf.to_hex())?,
            Some(DataValue::Verdict { code, chain }) => {
                write!(f, " verdict={code}")?;
                if let Some(chain) = chain {
                    write!(f, " chain={chain}")?;
                }
            }
            None => {}
        }
        Ok(())
    }
}

/// Ordered, owning collection of set elements.
///
/// Iteration order equals insertion order; the borrow checker rules out
/// mutation during iteration. Dropping the list drops every element.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ElemList {
    elems: Vec<SetElem>,
}

impl ElemList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    /// Check if the list holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Append an element, taking ownership. O(1), preserves order.
    pub fn push(&mut self, elem: SetElem) {
        self.elems.push(elem);
    }

    /// Iterate the elements in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SetElem> {
        self.elems.iter()
    }

    /// Invoke `f` on each element in order, stopping at the first error
    /// and propagating it; `Ok(())` once every element was visited.
    pub fn for_each<E>(
        &self,
        mut f: impl FnMut(&SetElem) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        for elem in &self.elems {
            f(elem)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ElemList {
    type Item = &'a SetElem;
    type IntoIter = std::slice::Iter<'a, SetElem>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Set {
    /// Append an element-list payload for this set: the set name and table
    /// as string attributes when present, then the elements container with
    /// one nested child per element, indexed by 1-based position (index 0
    /// is reserved).
    pub fn build_elems_payload(&self, builder: &mut MessageBuilder) {
        if let Some(name) = self.name() {
            builder.append_attr_str(NFTA_SET_ELEM_LIST_SET, name);
        }
        if let Some(table) = self.table() {
            builder.append_attr_str(NFTA_SET_ELEM_LIST_TABLE, table);
        }
        let list = builder.nest_start(NFTA_SET_ELEM_LIST_ELEMENTS);
        for (i, elem) in self.elems().iter().enumerate() {
            let nest = builder.nest_start((i + 1) as u16);
            elem.encode(builder);
            builder.nest_end(nest);
        }
        builder.nest_end(list);
    }

    /// Build a complete netlink message carrying this set's elements.
    pub fn build_elems_message(&self, cmd: u16, flags: u16, seq: u32) -> Vec<u8> {
        let family = self.family().unwrap_or_default() as u8;
        let mut builder = MessageBuilder::nft(cmd, family, flags, seq);
        self.build_elems_payload(&mut builder);
        builder.finish()
    }

    /// Parse a complete element-list netlink message into this set.
    ///
    /// An element whose inner decode fails is still linked into the list
    /// before the failure is reported; callers observing an error may
    /// therefore see a partially-valid trailing element.
    pub fn parse_elems_message(&mut self, msg: &[u8]) -> Result<()> {
        let mut input = nft_payload(msg)?;
        let _nfg = NfGenMsg::parse(&mut input)?;
        for (attr_type, payload) in AttrIter::new(input) {
            if attr_type > NFTA_SET_ELEM_LIST_MAX {
                trace!(attr_type, "skipping unknown element list attribute");
                continue;
            }
            match attr_type {
                NFTA_SET_ELEM_LIST_TABLE => {
                    validate::string(attr_type, payload)?;
                    self.set_table(get::string(payload)?);
                }
                NFTA_SET_ELEM_LIST_SET => {
                    validate::string(attr_type, payload)?;
                    self.set_name(get::string(payload)?);
                }
                NFTA_SET_ELEM_LIST_ELEMENTS => {
                    validate::nested(attr_type, payload)?;
                    self.parse_elem_list(payload)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_elem_list(&mut self, data: &[u8]) -> Result<()> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type != NFTA_LIST_ELEM {
                return Err(Error::InvalidAttribute(format!(
                    "unexpected tag {} in element list",
                    attr_type
                )));
            }
            let (elem, status) = SetElem::decode(payload);
            self.elems_mut().push(elem);
            status?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{NF_ACCEPT, NFT_GOTO};
    use crate::fixtures;
    use crate::message::{NLMSG_HDRLEN, NftMsgType, family};

    fn elem_with_key(byte: u8) -> SetElem {
        let mut elem = SetElem::new();
        elem.set_key(DataBuf::new(&[byte]).unwrap());
        elem
    }

    #[test]
    fn attr_record_contract() {
        let mut elem = SetElem::new();
        assert!(!elem.is_set(SetElemAttr::Key));

        elem.set_flags(1);
        elem.set_key(DataBuf::new(&[1, 2, 3, 4]).unwrap());
        elem.set_data(DataValue::Verdict {
            code: NFT_GOTO,
            chain: Some("forward".into()),
        });
        assert!(elem.is_set(SetElemAttr::Flags));
        assert!(elem.is_set(SetElemAttr::Key));
        assert!(elem.is_set(SetElemAttr::Data));
        assert_eq!(elem.flags(), Some(1));

        // Unsetting the data releases the verdict's chain name too.
        elem.unset(SetElemAttr::Data);
        assert!(!elem.is_set(SetElemAttr::Data));
        assert_eq!(elem.data(), None);

        elem.unset(SetElemAttr::Data); // no-op
        assert!(!elem.is_set(SetElemAttr::Data));
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut list = ElemList::new();
        assert_eq!(list.iter().count(), 0);

        for byte in 0..5u8 {
            list.push(elem_with_key(byte));
        }
        assert_eq!(list.len(), 5);

        let keys: Vec<u8> = list
            .iter()
            .map(|e| e.key().unwrap().as_slice()[0])
            .collect();
        assert_eq!(keys, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn for_each_short_circuits() {
        let mut list = ElemList::new();
        for byte in 0..4u8 {
            list.push(elem_with_key(byte));
        }

        let mut visited = 0;
        let result = list.for_each(|elem| {
            visited += 1;
            if elem.key().unwrap().as_slice()[0] == 2 {
                Err(-7)
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(-7));
        assert_eq!(visited, 3);

        let mut visited = 0;
        let result: std::result::Result<(), i32> = list.for_each(|_| {
            visited += 1;
            Ok(())
        });
        assert_eq!(result, Ok(()));
        assert_eq!(visited, 4);
    }

    fn roundtrip(set: &Set) -> Set {
        let msg = set.build_elems_message(NftMsgType::NEWSETELEM, 0, 1);
        let mut parsed = Set::new();
        parsed.parse_elems_message(&msg).unwrap();
        parsed
    }

    #[test]
    fn elems_message_roundtrip_value() {
        let mut set = Set::new();
        set.set_family(family::NFPROTO_IPV4 as u32);
        set.set_name("ports");
        set.set_table("filter");

        let mut elem = SetElem::new();
        elem.set_flags(1);
        elem.set_key(DataBuf::new(&[0xc0, 0xa8, 0x00, 0x01]).unwrap());
        elem.set_data(DataValue::value(&[1, 2, 3, 4, 5, 6]).unwrap());
        set.push_elem(elem);

        let parsed = roundtrip(&set);
        assert_eq!(parsed.name(), Some("ports"));
        assert_eq!(parsed.table(), Some("filter"));
        assert_eq!(parsed.elems().len(), 1);

        let decoded = parsed.elems().iter().next().unwrap();
        assert_eq!(decoded.flags(), Some(1));
        assert_eq!(decoded.key().unwrap().len(), 4);
        match decoded.data().unwrap() {
            DataValue::Value(buf) => assert_eq!(buf.len(), 6),
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[test]
    fn elems_message_roundtrip_verdict_chain() {
        let mut set = Set::new();
        set.set_name("dispatch");
        set.set_table("filter");

        let mut elem = SetElem::new();
        elem.set_key(DataBuf::new(&[0x16]).unwrap());
        elem.set_data(DataValue::Verdict {
            code: NFT_GOTO,
            chain: Some("forward".into()),
        });
        set.push_elem(elem);

        let parsed = roundtrip(&set);
        match parsed.elems().iter().next().unwrap().data().unwrap() {
            DataValue::Verdict { code, chain } => {
                assert_eq!(*code, NFT_GOTO);
                assert_eq!(chain.as_deref(), Some("forward"));
            }
            other => panic!("expected verdict, got {other:?}"),
        }
    }

    #[test]
    fn elems_are_indexed_from_one() {
        let mut set = Set::new();
        set.set_name("pair");
        set.set_table("filter");
        set.push_elem(elem_with_key(1));
        set.push_elem(elem_with_key(2));

        let msg = set.build_elems_message(NftMsgType::NEWSETELEM, 0, 1);
        // Walk to the elements container and collect child tags.
        let payload = &msg[NLMSG_HDRLEN + NfGenMsg::SIZE..];
        let container = AttrIter::new(payload)
            .find(|(ty, _)| *ty == NFTA_SET_ELEM_LIST_ELEMENTS)
            .expect("elements container");
        let tags: Vec<u16> = AttrIter::new(container.1).map(|(ty, _)| ty).collect();
        assert_eq!(tags, vec![1, 2]);
    }

    #[test]
    fn unexpected_list_tag_aborts_decode() {
        let mut set = Set::new();
        set.set_name("pair");
        set.set_table("filter");
        set.push_elem(elem_with_key(1));
        set.push_elem(elem_with_key(2));

        // The second element encodes under tag 2, which the decoder
        // rejects as a foreign child.
        let msg = set.build_elems_message(NftMsgType::NEWSETELEM, 0, 1);
        let mut parsed = Set::new();
        assert!(parsed.parse_elems_message(&msg).is_err());
        // The first element was decoded and linked before the abort.
        assert_eq!(parsed.elems().len(), 1);
    }

    #[test]
    fn partially_decoded_element_is_still_linked() {
        let msg = fixtures::elems_message_with_bad_flags();
        let mut parsed = Set::new();
        assert!(parsed.parse_elems_message(&msg).is_err());
        assert_eq!(parsed.elems().len(), 1);
        // The attribute decoded before the malformed one survived.
        let elem = parsed.elems().iter().next().unwrap();
        assert_eq!(elem.key().map(|k| k.len()), Some(4));
    }

    #[test]
    fn unknown_element_attribute_is_skipped() {
        let msg = fixtures::elems_message_with_unknown_attr();
        let mut parsed = Set::new();
        parsed.parse_elems_message(&msg).unwrap();
        assert_eq!(parsed.elems().len(), 1);
        assert_eq!(
            parsed.elems().iter().next().unwrap().key().map(|k| k.len()),
            Some(4)
        );
    }

    #[test]
    fn fixture_message_decodes() {
        let msg = fixtures::elems_message();
        let mut parsed = Set::new();
        parsed.parse_elems_message(&msg).unwrap();
        assert_eq!(parsed.name(), Some("ports"));
        assert_eq!(parsed.table(), Some("filter"));
        assert_eq!(parsed.elems().len(), 1);

        let elem = parsed.elems().iter().next().unwrap();
        assert_eq!(elem.key().unwrap().as_slice(), &[0, 0, 0, 22]);
    }

    #[test]
    fn display_renders_key_and_verdict() {
        let mut elem = SetElem::new();
        elem.set_flags(1);
        elem.set_key(DataBuf::new(&[0xab, 0xcd]).unwrap());
        elem.set_data(DataValue::Verdict {
            code: NF_ACCEPT,
            chain: None,
        });
        assert_eq!(elem.to_string(), "flags=1 key=abcd verdict=1");
    }

    #[test]
    fn json_roundtrip() {
        let mut elem = SetElem::new();
        elem.set_flags(2);
        elem.set_key(DataBuf::new(&[1, 2]).unwrap());
        elem.set_data(DataValue::Verdict {
            code: NFT_GOTO,
            chain: Some("out".into()),
        });
        assert_eq!(SetElem::from_json(&elem.json_value()).unwrap(), elem);
    }
}
