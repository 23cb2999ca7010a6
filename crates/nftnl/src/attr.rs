//! Netlink attribute (nlattr) primitives: header layout, iteration, and
//! the wire-type checks applied before a payload is interpreted.

use crate::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

/// Align a length to NLA_ALIGNTO boundary.
#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4; // nla_align(size_of::<NlAttr>())

/// Netlink attribute header (mirrors struct nlattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    /// Length including header.
    pub nla_len: u16,
    /// Attribute type.
    pub nla_type: u16,
}

/// Attribute type flags.
pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    /// Header for an attribute carrying `data_len` payload bytes.
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// The attribute type with the flag bits masked off.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    /// Whether the payload is itself an attribute stream.
    pub fn is_nested(&self) -> bool {
        self.nla_type & NLA_F_NESTED != 0
    }

    /// Payload length, i.e. total length minus the header.
    pub fn payload_len(&self) -> usize {
        (self.nla_len as usize).saturating_sub(NLA_HDRLEN)
    }

    /// Wire representation of the header.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Read the header at the front of `data` without consuming it.
    pub fn peek(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(hdr, _)| hdr)
            .map_err(|_| Error::Truncated {
                expected: NLA_HDRLEN,
                actual: data.len(),
            })
    }
}

/// Iterator over the attributes packed into a buffer.
///
/// Stops (yields `None`) at the first attribute whose declared length does
/// not fit the remaining buffer; a truncated trailing attribute is never
/// handed out partially.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    /// Iterate the attributes in `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Whether nothing (more) can be yielded.
    pub fn is_empty(&self) -> bool {
        self.data.len() < NLA_HDRLEN
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// Attribute type (flag bits masked off) and payload.
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let header = NlAttr::peek(self.data).ok()?;
        let len = header.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            return None;
        }
        let payload = &self.data[NLA_HDRLEN..len];
        self.data = self.data.get(nla_align(len)..).unwrap_or_default();
        Some((header.kind(), payload))
    }
}

/// Typed readers for attribute payloads.
pub mod get {
    use super::*;

    fn fixed<const N: usize>(data: &[u8], what: &str) -> Result<[u8; N]> {
        data.get(..N)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| Error::InvalidAttribute(format!("truncated {what} attribute")))
    }

    /// Read a u32 value (big endian / network order).
    pub fn u32_be(data: &[u8]) -> Result<u32> {
        fixed::<4>(data, "u32").map(u32::from_be_bytes)
    }

    /// Read an i32 value (big endian / network order).
    pub fn i32_be(data: &[u8]) -> Result<i32> {
        fixed::<4>(data, "i32").map(i32::from_be_bytes)
    }

    /// Read a u64 value (big endian / network order).
    pub fn u64_be(data: &[u8]) -> Result<u64> {
        fixed::<8>(data, "u64").map(u64::from_be_bytes)
    }

    /// Read a null-terminated string. The terminator is optional on input;
    /// bytes after it are ignored.
    pub fn string(data: &[u8]) -> Result<&str> {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..end])
            .map_err(|e| Error::InvalidAttribute(format!("attribute is not UTF-8: {e}")))
    }

    /// Read raw bytes (no interpretation).
    pub fn bytes(data: &[u8]) -> &[u8] {
        data
    }
}

/// Wire-type checks applied to a known attribute before its payload is
/// interpreted. A mismatch aborts the enclosing nested decode; it never
/// panics on peer-controlled input.
pub mod validate {
    use super::*;

    /// The payload must hold exactly one 32-bit value.
    pub fn u32(attr_type: u16, data: &[u8]) -> Result<()> {
        if data.len() != 4 {
            return Err(Error::InvalidAttribute(format!(
                "attribute {} is not a u32 ({} bytes)",
                attr_type,
                data.len()
            )));
        }
        Ok(())
    }

    /// The payload must be a non-empty, null-terminated string.
    pub fn string(attr_type: u16, data: &[u8]) -> Result<()> {
        if data.is_empty() || data[data.len() - 1] != 0 {
            return Err(Error::InvalidAttribute(format!(
                "attribute {} is not a null-terminated string",
                attr_type
            )));
        }
        Ok(())
    }

    /// The payload must be a non-empty, well-formed attribute stream.
    pub fn nested(attr_type: u16, data: &[u8]) -> Result<()> {
        if data.len() < NLA_HDRLEN {
            return Err(Error::InvalidAttribute(format!(
                "attribute {} is not a nested container",
                attr_type
            )));
        }
        let mut rest = data;
        while rest.len() >= NLA_HDRLEN {
            let child = NlAttr::peek(rest)?;
            let len = child.nla_len as usize;
            if len < NLA_HDRLEN || len > rest.len() {
                return Err(Error::InvalidAttribute(format!(
                    "attribute {} holds a malformed nested stream",
                    attr_type
                )));
            }
            match rest.get(nla_align(len)..) {
                Some(tail) => rest = tail,
                None => break,
            }
        }
        Ok(())
    }
}
