//! Data register payloads: opaque values and verdicts.
//!
//! Set element keys and data travel as "data registers" on the wire: a
//! nested attribute holding either a raw value or a verdict structure.
//! [`DataBuf`] is the raw form, an opaque bit-string interpreted only by the
//! caller's type information. [`DataValue`] is the decoded register: exactly
//! one variant is active, and a verdict's chain name exists only on the
//! variant that can carry it.

use std::fmt;

use tracing::trace;

use crate::attr::{AttrIter, get, validate};
use crate::builder::MessageBuilder;
use crate::error::{Error, Result};

/// Verdict codes.
pub const NF_DROP: i32 = 0;
pub const NF_ACCEPT: i32 = 1;
pub const NFT_CONTINUE: i32 = -1;
pub const NFT_BREAK: i32 = -2;
pub const NFT_JUMP: i32 = -3;
pub const NFT_GOTO: i32 = -4;
pub const NFT_RETURN: i32 = -5;

/// Maximum payload of a data register.
pub const DATA_VALUE_MAXLEN: usize = 64;

/// Attribute ids for NFTA_DATA_* and NFTA_VERDICT_* constants.
mod attr_ids {
    pub const NFTA_DATA_VALUE: u16 = 1;
    pub const NFTA_DATA_VERDICT: u16 = 2;
    pub const NFTA_DATA_MAX: u16 = 2;

    pub const NFTA_VERDICT_CODE: u16 = 1;
    pub const NFTA_VERDICT_CHAIN: u16 = 2;
    pub const NFTA_VERDICT_MAX: u16 = 2;
}

use attr_ids::*;

/// Fixed-capacity byte buffer with an explicit length.
///
/// Not null-terminated; the codec never reinterprets the contents beyond
/// byte-count bookkeeping.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DataBuf {
    buf: [u8; DATA_VALUE_MAXLEN],
    len: usize,
}

impl DataBuf {
    /// Copy `bytes` into a new buffer. Fails if the payload exceeds the
    /// register capacity.
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > DATA_VALUE_MAXLEN {
            return Err(Error::InvalidAttribute(format!(
                "data register payload too long: {} > {}",
                bytes.len(),
                DATA_VALUE_MAXLEN
            )));
        }
        let mut buf = [0u8; DATA_VALUE_MAXLEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            buf,
            len: bytes.len(),
        })
    }

    /// The stored bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Stored length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Render as lowercase hex.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.len * 2);
        for b in self.as_slice() {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }

    /// Parse from lowercase/uppercase hex.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() % 2 != 0 {
            return Err(Error::InvalidAttribute("odd-length hex string".into()));
        }
        let mut bytes = Vec::with_capacity(s.len() / 2);
        for i in (0..s.len()).step_by(2) {
            let byte = u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|_| Error::InvalidAttribute(format!("bad hex string: {s:?}")))?;
            bytes.push(byte);
        }
        Self::new(&bytes)
    }
}

impl fmt::Debug for DataBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataBuf({})", self.to_hex())
    }
}

/// A decoded data register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// Opaque comparison data.
    Value(DataBuf),
    /// Rule outcome, naming a target chain only for jump/goto.
    Verdict {
        /// Verdict code (NF_ACCEPT, NF_DROP, NFT_JUMP, ...).
        code: i32,
        /// Target chain, present only for jump/goto verdicts.
        chain: Option<String>,
    },
}

impl DataValue {
    /// Wrap `bytes` as a raw value register.
    pub fn value(bytes: &[u8]) -> Result<Self> {
        Ok(Self::Value(DataBuf::new(bytes)?))
    }

    /// Encode this register as a nested attribute of type `attr_type`.
    pub fn encode(&self, builder: &mut MessageBuilder, attr_type: u16) {
        let nest = builder.nest_start(attr_type);
        match self {
            Self::Value(buf) => {
                builder.append_attr(NFTA_DATA_VALUE, buf.as_slice());
            }
            Self::Verdict { code, chain } => {
                let verdict = builder.nest_start(NFTA_DATA_VERDICT);
                builder.append_attr_i32_be(NFTA_VERDICT_CODE, *code);
                if let Some(chain) = chain {
                    builder.append_attr_str(NFTA_VERDICT_CHAIN, chain);
                }
                builder.nest_end(verdict);
            }
        }
        builder.nest_end(nest);
    }

    /// Decode a register from the payload of its nested attribute.
    ///
    /// Unknown attribute codes are skipped; a register holding neither a
    /// value nor a verdict is an error.
    pub fn decode(data: &[u8]) -> Result<Self> {
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_DATA_MAX {
                trace!(attr_type, "skipping unknown data register attribute");
                continue;
            }
            match attr_type {
                NFTA_DATA_VALUE => return Ok(Self::Value(DataBuf::new(payload)?)),
                NFTA_DATA_VERDICT => {
                    validate::nested(attr_type, payload)?;
                    return Self::decode_verdict(payload);
                }
                _ => {}
            }
        }
        Err(Error::InvalidAttribute(
            "data register without value or verdict".into(),
        ))
    }

    fn decode_verdict(data: &[u8]) -> Result<Self> {
        let mut code = None;
        let mut chain = None;
        for (attr_type, payload) in AttrIter::new(data) {
            if attr_type > NFTA_VERDICT_MAX {
                trace!(attr_type, "skipping unknown verdict attribute");
                continue;
            }
            match attr_type {
                NFTA_VERDICT_CODE => {
                    validate::u32(attr_type, payload)?;
                    code = Some(get::i32_be(payload)?);
                }
                NFTA_VERDICT_CHAIN => {
                    validate::string(attr_type, payload)?;
                    chain = Some(get::string(payload)?.to_owned());
                }
                _ => {}
            }
        }
        let code = code
            .ok_or_else(|| Error::InvalidAttribute("verdict without a code".into()))?;
        Ok(Self::Verdict { code, chain })
    }
}
