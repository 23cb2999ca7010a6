//! Incremental construction of nfnetlink request messages.
//!
//! A [`MessageBuilder`] owns a growing byte buffer whose first 16 bytes are
//! the netlink header; attributes and nested containers are appended behind
//! it and the total length is patched in by [`finish`](MessageBuilder::finish).

use crate::attr::{NLA_F_NESTED, NlAttr, nla_align};
use crate::message::{
    NLM_F_REQUEST, NLMSG_HDRLEN, NfGenMsg, NlMsgHdr, nft_msg_type, nlmsg_align,
};

/// Handle for an open nested attribute, spent by
/// [`nest_end`](MessageBuilder::nest_end).
#[derive(Debug, Clone, Copy)]
pub struct NestToken {
    /// Offset of the nested attribute header in the buffer.
    offset: usize,
}

/// Builder for one netlink message.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    buf: Vec<u8>,
}

impl MessageBuilder {
    /// Start a message with the given type and flags.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        let mut buf = Vec::with_capacity(NLMSG_HDRLEN + 64);
        buf.extend_from_slice(NlMsgHdr::new(msg_type, flags).as_bytes());
        Self { buf }
    }

    /// Start an nftables command message: the netlink header for
    /// `(NFNL_SUBSYS_NFTABLES << 8) | cmd` followed by the nfgenmsg extra
    /// header for `family`.
    pub fn nft(cmd: u16, family: u8, flags: u16, seq: u32) -> Self {
        let mut builder = Self::new(nft_msg_type(cmd), NLM_F_REQUEST | flags);
        builder.set_seq(seq);
        builder.append_bytes(&NfGenMsg::new(family, 0).to_bytes());
        builder
    }

    /// Current message length in bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been appended behind the header yet.
    pub fn is_empty(&self) -> bool {
        self.buf.len() == NLMSG_HDRLEN
    }

    fn pad(&mut self, align: fn(usize) -> usize) {
        self.buf.resize(align(self.buf.len()), 0);
    }

    /// Append raw bytes, padded to message alignment.
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
        self.pad(nlmsg_align);
    }

    /// Append one attribute with the given type and payload.
    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) {
        self.buf
            .extend_from_slice(NlAttr::new(attr_type, data.len()).as_bytes());
        self.buf.extend_from_slice(data);
        self.pad(nla_align);
    }

    /// Append a u32 attribute (big endian / network order).
    pub fn append_attr_u32_be(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_be_bytes());
    }

    /// Append an i32 attribute (big endian / network order).
    pub fn append_attr_i32_be(&mut self, attr_type: u16, value: i32) {
        self.append_attr(attr_type, &value.to_be_bytes());
    }

    /// Append a u64 attribute (big endian / network order).
    pub fn append_attr_u64_be(&mut self, attr_type: u16, value: u64) {
        self.append_attr(attr_type, &value.to_be_bytes());
    }

    /// Append a null-terminated string attribute.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.append_attr(attr_type, &data);
    }

    /// Open a nested attribute; the returned token closes it again.
    /// The container's length is unknown until then, so a placeholder
    /// header goes in first.
    pub fn nest_start(&mut self, attr_type: u16) -> NestToken {
        let offset = self.buf.len();
        self.buf
            .extend_from_slice(NlAttr::new(attr_type | NLA_F_NESTED, 0).as_bytes());
        NestToken { offset }
    }

    /// Close a nested attribute, patching its length to cover everything
    /// appended since [`nest_start`](Self::nest_start).
    pub fn nest_end(&mut self, token: NestToken) {
        let len = (self.buf.len() - token.offset) as u16;
        self.buf[token.offset..token.offset + 2].copy_from_slice(&len.to_ne_bytes());
        self.pad(nla_align);
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Set the port ID.
    pub fn set_pid(&mut self, pid: u32) {
        self.buf[12..16].copy_from_slice(&pid.to_ne_bytes());
    }

    /// Patch the total length into the header and return the message bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let len = self.buf.len() as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
        self.buf
    }

    /// The bytes built so far, for inspection.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::{AttrIter, NLA_HDRLEN};
    use crate::message::{NLM_F_ACK, NftMsgType, family};

    #[test]
    fn header_only_message() {
        let msg = MessageBuilder::new(16, NLM_F_REQUEST).finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!(header.nlmsg_type, 16);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST);
    }

    #[test]
    fn appended_attribute_is_walkable() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder.append_attr_u32_be(1, 0x12345678);
        let msg = builder.finish();

        assert!(msg.len() >= NLMSG_HDRLEN + NLA_HDRLEN + 4);
        let (_, payload) = AttrIter::new(&msg[NLMSG_HDRLEN..]).next().unwrap();
        assert_eq!(payload, &[0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn nested_attribute_covers_its_children() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        let nest = builder.nest_start(1);
        builder.append_attr_u32_be(2, 100);
        builder.nest_end(nest);
        let msg = builder.finish();

        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN..]).collect();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, 1);
        let inner: Vec<_> = AttrIter::new(attrs[0].1).collect();
        assert_eq!(inner, vec![(2, &100u32.to_be_bytes()[..])]);
    }

    #[test]
    fn string_attribute_is_null_terminated() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder.append_attr_str(1, "filter");
        let msg = builder.finish();

        let (_, payload) = AttrIter::new(&msg[NLMSG_HDRLEN..]).next().unwrap();
        assert_eq!(payload, b"filter\0");
    }

    #[test]
    fn nft_request_header() {
        let msg = MessageBuilder::nft(NftMsgType::NEWSET, family::NFPROTO_IPV4, NLM_F_ACK, 7)
            .finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_type, 0x0a09);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST | NLM_F_ACK);
        assert_eq!(header.nlmsg_seq, 7);
        assert_eq!(msg.len(), NLMSG_HDRLEN + NfGenMsg::SIZE);
        assert_eq!(msg[NLMSG_HDRLEN], family::NFPROTO_IPV4);
    }
}
