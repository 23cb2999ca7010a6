//! Integration tests for nftnl.
//!
//! These exercise the public API end to end without kernel access: messages
//! are built and parsed in memory, and the capability probe runs against an
//! in-process fake transport. Tests that talk to a real kernel would need
//! CAP_NET_ADMIN and are deliberately absent.

use std::ops::ControlFlow;

use nftnl::message::{
    MessageIter, NFNL_MSG_BATCH_BEGIN, NFNL_MSG_BATCH_END, NLM_F_ACK, NLMSG_HDRLEN, NlMsgHdr,
    NlMsgType, nft_msg_type,
};
use nftnl::{
    Chain, Command, DataBuf, DataValue, Format, NFT_JUMP, NftMsgType, ParseAbort, ParseError,
    Result, Rule, Ruleset, RulesetKind, Set, SetElem, Table, Transport, family, parse_buffer_cb,
    probe_batch_support,
};

/// Fake kernel answering every ack-requesting message with a fixed error
/// code (0 for a clean ack).
struct FakeKernel {
    reply_error: i32,
    pending: Option<Vec<u8>>,
}

impl FakeKernel {
    fn new(reply_error: i32) -> Self {
        Self {
            reply_error,
            pending: None,
        }
    }
}

impl Transport for FakeKernel {
    fn send(&mut self, buf: &[u8]) -> Result<()> {
        self.pending = Some(buf.to_vec());
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>> {
        let Some(sent) = self.pending.take() else {
            return Ok(Vec::new());
        };
        for message in MessageIter::new(&sent) {
            let (header, _) = message?;
            if header.nlmsg_flags & NLM_F_ACK != 0 {
                let mut reply = NlMsgHdr::new(NlMsgType::ERROR, 0);
                reply.nlmsg_seq = header.nlmsg_seq;
                reply.nlmsg_len = (NLMSG_HDRLEN + 4 + NLMSG_HDRLEN) as u32;
                let mut buf = reply.as_bytes().to_vec();
                buf.extend_from_slice(&self.reply_error.to_ne_bytes());
                buf.extend_from_slice(header.as_bytes());
                return Ok(buf);
            }
        }
        Ok(Vec::new())
    }
}

#[test]
fn object_messages_roundtrip() {
    let mut table = Table::new();
    table.set_family(family::NFPROTO_IPV4 as u32);
    table.set_name("filter");

    let mut chain = Chain::new();
    chain.set_family(family::NFPROTO_IPV4 as u32);
    chain.set_table("filter");
    chain.set_name("input");
    chain.set_hook(1, -100);

    let mut rule = Rule::new();
    rule.set_family(family::NFPROTO_IPV4 as u32);
    rule.set_table("filter");
    rule.set_chain("input");
    rule.set_handle(12);

    let msg = table.build_message(NftMsgType::NEWTABLE, 0, 1);
    let mut parsed = Table::new();
    parsed.parse_message(&msg).unwrap();
    assert_eq!(parsed, table);

    let msg = chain.build_message(NftMsgType::NEWCHAIN, 0, 2);
    let mut parsed = Chain::new();
    parsed.parse_message(&msg).unwrap();
    assert_eq!(parsed, chain);

    let msg = rule.build_message(NftMsgType::NEWRULE, 0, 3);
    let mut parsed = Rule::new();
    parsed.parse_message(&msg).unwrap();
    assert_eq!(parsed, rule);
}

#[test]
fn set_elements_roundtrip_through_the_wire() {
    // One element per message: the decoder accepts the kernel's list-elem
    // tag, which coincides with the encoder's index only for the first
    // element. Both messages accumulate into the same set.
    let mut verdict_set = Set::new();
    verdict_set.set_family(family::NFPROTO_IPV4 as u32);
    verdict_set.set_table("filter");
    verdict_set.set_name("dispatch");

    let mut elem = SetElem::new();
    elem.set_key(DataBuf::new(&[0x00, 0x16]).unwrap());
    elem.set_data(DataValue::Verdict {
        code: NFT_JUMP,
        chain: Some("tcp-services".into()),
    });
    verdict_set.push_elem(elem);

    let mut value_set = Set::new();
    value_set.set_family(family::NFPROTO_IPV4 as u32);
    value_set.set_table("filter");
    value_set.set_name("dispatch");

    let mut elem = SetElem::new();
    elem.set_key(DataBuf::new(&[0x00, 0x50]).unwrap());
    elem.set_data(DataValue::value(&[0xc0, 0xa8, 0x00, 0x01]).unwrap());
    value_set.push_elem(elem);

    let mut parsed = Set::new();
    parsed
        .parse_elems_message(&verdict_set.build_elems_message(NftMsgType::NEWSETELEM, 0, 4))
        .unwrap();
    parsed
        .parse_elems_message(&value_set.build_elems_message(NftMsgType::NEWSETELEM, 0, 5))
        .unwrap();

    assert_eq!(parsed.name(), Some("dispatch"));
    assert_eq!(parsed.table(), Some("filter"));
    assert_eq!(parsed.elems().len(), 2);

    let elems: Vec<_> = parsed.elems().iter().collect();
    assert_eq!(elems[0].key().map(DataBuf::len), Some(2));
    match elems[0].data().unwrap() {
        DataValue::Verdict { code, chain } => {
            assert_eq!(*code, NFT_JUMP);
            assert_eq!(chain.as_deref(), Some("tcp-services"));
        }
        other => panic!("expected verdict, got {other:?}"),
    }
    match elems[1].data().unwrap() {
        DataValue::Value(buf) => assert_eq!(buf.len(), 4),
        other => panic!("expected value, got {other:?}"),
    }
}

#[test]
fn document_parse_render_parse_is_stable() {
    let document = r#"{"ruleset": [
        {"command": "add", "table": {"name": "filter", "family": 2}},
        {"command": "add", "set": {"name": "ports", "table": "filter",
            "elements": [{"key": "0016", "verdict": {"code": -3, "chain": "tcp"}}]}}
    ]}"#;

    let mut ruleset = Ruleset::new();
    ruleset.parse(Format::Json, document).unwrap();
    assert_eq!(ruleset.tables().len(), 1);
    assert_eq!(ruleset.sets().len(), 1);

    // Each rendered object is itself a valid document node body.
    let rendered = ruleset.sets()[0].render(Format::Json);
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    let reparsed = Set::from_json(&value["set"]).unwrap();
    assert_eq!(&reparsed, &ruleset.sets()[0]);
}

#[test]
fn streaming_parse_distinguishes_abort_reasons() {
    let document = r#"{"ruleset": [
        {"command": "add", "table": {"name": "one"}},
        {"command": "add", "table": {"name": "two"}}
    ]}"#;

    let stopped = parse_buffer_cb(Format::Json, document, |ctx| {
        if ctx.table().and_then(Table::name) == Some("two") {
            ControlFlow::Break(-9)
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(stopped, Err(ParseAbort::Callback(-9)));

    let malformed = parse_buffer_cb(Format::Json, r#"{"ruleset": [{"command": "add"}]}"#, |_| {
        ControlFlow::Continue(())
    });
    assert_eq!(malformed, Err(ParseAbort::Parse(ParseError::NotSupported)));
}

#[test]
fn streaming_parse_classifies_set_element_nodes() {
    let document = r#"{"ruleset": [
        {"command": "add", "elements": {"name": "ports", "table": "filter",
            "elements": [{"key": "0016"}, {"key": "0050"}]}}
    ]}"#;

    let mut seen = Vec::new();
    parse_buffer_cb(Format::Json, document, |ctx| {
        seen.push((ctx.kind(), ctx.set().map(|s| s.elems().len())));
        ControlFlow::Continue(())
    })
    .unwrap();
    assert_eq!(seen, vec![(RulesetKind::SetElems, Some(2))]);
}

#[test]
fn probe_classifies_fake_kernel_replies() {
    // EINVAL for the deliberately incomplete request: batching supported.
    let mut kernel = FakeKernel::new(-libc::EINVAL);
    assert!(probe_batch_support(&mut kernel).unwrap());

    // Clean ack: the kernel swallowed the malformed request, unsupported.
    let mut kernel = FakeKernel::new(0);
    assert!(!probe_batch_support(&mut kernel).unwrap());
}

#[test]
fn probe_batch_has_the_documented_shape() {
    struct Recorder {
        sent: Vec<u8>,
    }
    impl Transport for Recorder {
        fn send(&mut self, buf: &[u8]) -> Result<()> {
            self.sent = buf.to_vec();
            Ok(())
        }
        fn recv(&mut self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    let mut recorder = Recorder { sent: Vec::new() };
    // The silent transport reads as "unsupported", which is fine here.
    assert!(!probe_batch_support(&mut recorder).unwrap());

    let types: Vec<u16> = MessageIter::new(&recorder.sent)
        .map(|m| m.unwrap().0.nlmsg_type)
        .collect();
    assert_eq!(
        types,
        vec![
            NFNL_MSG_BATCH_BEGIN,
            nft_msg_type(NftMsgType::NEWSET),
            NFNL_MSG_BATCH_END,
        ]
    );
}

#[test]
fn ruleset_text_rendering_uses_fixed_width_tags() {
    let mut ruleset = Ruleset::new();
    let mut table = Table::new();
    table.set_name("filter");
    ruleset.push_table(table);

    assert!(
        ruleset
            .render(Format::Text, Command::Add)
            .starts_with("   [ADD] table filter")
    );
    assert!(
        ruleset
            .render(Format::Text, Command::Delete)
            .starts_with("[DELETE] ")
    );
}
