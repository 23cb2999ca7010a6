//! Netlink message framing and the nfnetlink layer on top of it.
//!
//! The lower half mirrors the kernel's nlmsghdr framing; the upper half
//! adds what nftables needs: the nfgenmsg extra header, the nftables
//! subsystem and batch envelope message types, and the command codes.

use crate::error::{Error, Result};
use winnow::binary::{be_u16, le_u8};
use winnow::prelude::*;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Result type for winnow-driven header parsers.
type PResult<T> = std::result::Result<T, winnow::error::ErrMode<winnow::error::ContextError>>;

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Header for a message of (so far) zero payload bytes.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Payload length, i.e. total length minus the header.
    pub fn payload_len(&self) -> usize {
        self.nlmsg_len as usize - NLMSG_HDRLEN
    }

    /// Whether this is an error (or ack) message.
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Whether this ends a multipart reply.
    pub fn is_done(&self) -> bool {
        self.nlmsg_type == NlMsgType::DONE
    }

    /// Wire representation of the header.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Borrow the header at the front of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(hdr, _)| hdr)
            .map_err(|_| Error::Truncated {
                expected: NLMSG_HDRLEN,
                actual: data.len(),
            })
    }
}

/// Standard netlink message types.
pub struct NlMsgType;

impl NlMsgType {
    /// No operation, message must be discarded.
    pub const NOOP: u16 = 1;
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;
    /// Data lost, request resend.
    pub const OVERRUN: u16 = 4;
}

/// Netlink message flags.
pub const NLM_F_REQUEST: u16 = 0x01;
pub const NLM_F_MULTI: u16 = 0x02;
pub const NLM_F_ACK: u16 = 0x04;
pub const NLM_F_ECHO: u16 = 0x08;

// Modifiers to GET request
pub const NLM_F_ROOT: u16 = 0x100;
pub const NLM_F_MATCH: u16 = 0x200;
pub const NLM_F_DUMP: u16 = NLM_F_ROOT | NLM_F_MATCH;

// Modifiers to NEW request
pub const NLM_F_REPLACE: u16 = 0x100;
pub const NLM_F_EXCL: u16 = 0x200;
pub const NLM_F_CREATE: u16 = 0x400;
pub const NLM_F_APPEND: u16 = 0x800;

/// Iterator over the netlink messages packed into one receive buffer.
///
/// A header whose declared length is shorter than a header or longer than
/// the remaining buffer yields an error item; iteration does not continue
/// past it.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Iterate the messages in `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(&'a NlMsgHdr, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }
        let header = match NlMsgHdr::from_bytes(self.data) {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };
        let len = header.nlmsg_len as usize;
        if len < NLMSG_HDRLEN || len > self.data.len() {
            return Some(Err(Error::InvalidMessage(format!(
                "invalid message length: {len}"
            ))));
        }
        let payload = &self.data[NLMSG_HDRLEN..len];
        self.data = self.data.get(nlmsg_align(len)..).unwrap_or_default();
        Some(Ok((header, payload)))
    }
}

/// Netlink error message payload: the error code followed by the header of
/// the request that caused it.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Read the error payload at the front of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::read_from_prefix(data)
            .map(|(err, _)| err)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Whether this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

/// nfnetlink protocol version.
pub const NFNETLINK_V0: u8 = 0;

/// nfnetlink subsystem carrying nftables commands.
pub const NFNL_SUBSYS_NFTABLES: u16 = 10;

/// Batch envelope message types (subsystem "none").
pub const NFNL_MSG_BATCH_BEGIN: u16 = 0x10;
pub const NFNL_MSG_BATCH_END: u16 = 0x11;

/// nftables command codes, combined with the subsystem into nlmsg_type as
/// `(NFNL_SUBSYS_NFTABLES << 8) | cmd`.
pub struct NftMsgType;

impl NftMsgType {
    pub const NEWTABLE: u16 = 0;
    pub const GETTABLE: u16 = 1;
    pub const DELTABLE: u16 = 2;
    pub const NEWCHAIN: u16 = 3;
    pub const GETCHAIN: u16 = 4;
    pub const DELCHAIN: u16 = 5;
    pub const NEWRULE: u16 = 6;
    pub const GETRULE: u16 = 7;
    pub const DELRULE: u16 = 8;
    pub const NEWSET: u16 = 9;
    pub const GETSET: u16 = 10;
    pub const DELSET: u16 = 11;
    pub const NEWSETELEM: u16 = 12;
    pub const GETSETELEM: u16 = 13;
    pub const DELSETELEM: u16 = 14;
}

/// Netfilter protocol families.
pub mod family {
    pub const NFPROTO_UNSPEC: u8 = 0;
    pub const NFPROTO_INET: u8 = 1;
    pub const NFPROTO_IPV4: u8 = 2;
    pub const NFPROTO_ARP: u8 = 3;
    pub const NFPROTO_NETDEV: u8 = 5;
    pub const NFPROTO_BRIDGE: u8 = 7;
    pub const NFPROTO_IPV6: u8 = 10;
}

/// nfgenmsg header carried after the netlink header on every nfnetlink
/// message (4 bytes).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NfGenMsg {
    /// Address family.
    pub family: u8,
    /// Protocol version (NFNETLINK_V0).
    pub version: u8,
    /// Subsystem-specific resource id (big endian on the wire).
    pub res_id: u16,
}

impl NfGenMsg {
    /// Size on the wire.
    pub const SIZE: usize = 4;

    /// Header for the given family and resource id.
    pub fn new(family: u8, res_id: u16) -> Self {
        Self {
            family,
            version: NFNETLINK_V0,
            res_id,
        }
    }

    /// Serialize to wire bytes.
    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let res = self.res_id.to_be_bytes();
        [self.family, self.version, res[0], res[1]]
    }

    fn parse_fields(input: &mut &[u8]) -> PResult<Self> {
        let family = le_u8.parse_next(input)?;
        let version = le_u8.parse_next(input)?;
        let res_id = be_u16.parse_next(input)?;
        Ok(Self {
            family,
            version,
            res_id,
        })
    }

    /// Parse from wire bytes, advancing the input.
    pub fn parse(input: &mut &[u8]) -> Result<Self> {
        Self::parse_fields(input).map_err(|_| Error::Truncated {
            expected: Self::SIZE,
            actual: input.len(),
        })
    }
}

/// Full nlmsg_type for an nftables command.
pub const fn nft_msg_type(cmd: u16) -> u16 {
    (NFNL_SUBSYS_NFTABLES << 8) | cmd
}
