//! Userspace codec and object model for the nftables netlink protocol.
//!
//! This crate builds and parses the binary netlink messages that describe
//! nftables tables, chains, rules, sets, and set elements, and provides
//! batched submission support and text/XML/JSON rendering of the resulting
//! object graph. It does not interpret rule-matching semantics; expression
//! payloads are left to their own codecs.
//!
//! # Example
//!
//! ```ignore
//! use nftnl::{NftMsgType, Set, SetElem, DataBuf, DataValue, NFT_GOTO};
//!
//! let mut set = Set::new();
//! set.set_table("filter");
//! set.set_name("dispatch");
//!
//! let mut elem = SetElem::new();
//! elem.set_key(DataBuf::new(&[0x16])?);
//! elem.set_data(DataValue::Verdict { code: NFT_GOTO, chain: Some("tcp".into()) });
//! set.push_elem(elem);
//!
//! let msg = set.build_elems_message(NftMsgType::NEWSETELEM, 0, 1);
//! # Ok::<(), nftnl::Error>(())
//! ```
//!
//! # Ruleset documents
//!
//! ```ignore
//! use nftnl::{Format, Ruleset};
//!
//! let mut ruleset = Ruleset::new();
//! ruleset.parse(Format::Json, document)?;
//! println!("{}", ruleset.render(Format::Text, nftnl::Command::Add));
//! ```
//!
//! # Thread safety
//!
//! Objects are not internally synchronized; sharing one across threads
//! requires external locking by the caller.

pub mod attr;
pub mod batch;
pub mod builder;
pub mod chain;
pub mod data;
pub mod error;
pub mod message;
pub mod output;
pub mod rule;
pub mod ruleset;
pub mod set;
pub mod set_elem;
pub mod socket;
pub mod table;

mod json;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export common types at crate root for convenience
pub use batch::{batch_begin, batch_end, batch_is_supported, probe_batch_support};
pub use builder::MessageBuilder;
pub use chain::{Chain, ChainAttr};
pub use data::{
    DATA_VALUE_MAXLEN, DataBuf, DataValue, NF_ACCEPT, NF_DROP, NFT_BREAK, NFT_CONTINUE, NFT_GOTO,
    NFT_JUMP, NFT_RETURN,
};
pub use error::{Error, ParseError, Result};
pub use message::{NftMsgType, family};
pub use output::{Command, Format};
pub use rule::{Rule, RuleAttr};
pub use ruleset::{
    ParseAbort, ParseContext, Ruleset, RulesetAttr, RulesetKind, parse_buffer_cb, parse_reader_cb,
};
pub use set::{Set, SetAttr};
pub use set_elem::{ElemList, SetElem, SetElemAttr};
pub use socket::{NetlinkSocket, Transport};
pub use table::{Table, TableAttr};
