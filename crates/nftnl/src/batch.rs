//! Batch envelope framing and the batch capability probe.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::builder::MessageBuilder;
use crate::error::{Error, Result};
use crate::message::{
    MessageIter, NFNL_MSG_BATCH_BEGIN, NFNL_MSG_BATCH_END, NFNL_SUBSYS_NFTABLES, NLM_F_ACK,
    NLM_F_REQUEST, NfGenMsg, NftMsgType, NlMsgError, family,
};
use crate::socket::{NetlinkSocket, Transport};

/// Build a begin-batch envelope message.
pub fn batch_begin(seq: u32) -> Vec<u8> {
    batch_envelope(NFNL_MSG_BATCH_BEGIN, seq)
}

/// Build an end-batch envelope message.
pub fn batch_end(seq: u32) -> Vec<u8> {
    batch_envelope(NFNL_MSG_BATCH_END, seq)
}

fn batch_envelope(msg_type: u16, seq: u32) -> Vec<u8> {
    let mut builder = MessageBuilder::new(msg_type, NLM_F_REQUEST);
    builder.set_seq(seq);
    builder.append_bytes(
        &NfGenMsg::new(family::NFPROTO_UNSPEC, NFNL_SUBSYS_NFTABLES).to_bytes(),
    );
    builder.finish()
}

/// Probe whether the kernel accepts set commands inside batches.
///
/// Sends begin-batch, an attribute-incomplete create-set request with an
/// ack requested, and end-batch as one unit, then reads replies until one
/// can be classified. EINVAL for the incomplete request means the kernel
/// parsed the batch and rejected the bad member, so batching is supported
/// (`Ok(true)`). Any other reply, a clean ack included, means unsupported
/// (`Ok(false)`); a transport failure surfaces as `Err`.
///
/// The probe is one-shot and side-effect free (no set is created); it is
/// never retried here. Callers needing fresh information re-invoke it.
pub fn probe_batch_support<T: Transport>(transport: &mut T) -> Result<bool> {
    let seq = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(1);
    let req_seq = seq.wrapping_add(1);

    let mut batch = batch_begin(seq);
    // Header-only create-set request: deliberately missing its mandatory
    // attributes so a batch-aware kernel rejects it with EINVAL.
    batch.extend_from_slice(
        &MessageBuilder::nft(NftMsgType::NEWSET, family::NFPROTO_IPV4, NLM_F_ACK, req_seq)
            .finish(),
    );
    batch.extend_from_slice(&batch_end(seq.wrapping_add(2)));

    debug!("probing kernel for batched set message support");
    transport.send(&batch)?;

    loop {
        let data = transport.recv()?;
        if data.is_empty() {
            // Reply stream exhausted without a classifiable answer.
            return Ok(false);
        }
        for message in MessageIter::new(&data) {
            let (header, payload) = message?;
            if header.nlmsg_seq != req_seq {
                continue;
            }
            if header.is_error() {
                let err = NlMsgError::from_bytes(payload)?;
                if err.is_ack() {
                    debug!("probe acknowledged cleanly; batching unsupported");
                    return Ok(false);
                }
                let supported = Error::from_errno(err.error).is_invalid_argument();
                debug!(errno = -err.error, supported, "probe reply classified");
                return Ok(supported);
            }
        }
    }
}

/// Open a dedicated netfilter endpoint and run the capability probe on it.
pub fn batch_is_supported() -> Result<bool> {
    let mut socket = NetlinkSocket::netfilter()?;
    probe_batch_support(&mut socket)
}
