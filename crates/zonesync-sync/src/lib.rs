//! # Zonesync Sync
//!
//! Phase handlers for replicating a ledger's commit history between a
//! central store and its peers.
//!
//! ## Overview
//!
//! An external driver owns the session: it creates a [`HandlerContext`],
//! carries each side's records across the transport, and calls one named
//! phase per round trip. [`SyncHost`] implements the store's side of both
//! roles:
//!
//! - **Pull** (serving): report the ledger head, negotiate the commits the
//!   peer lacks, then stream them one commit per call.
//! - **Push** (receiving): check the peer built on the current head, store
//!   each incoming batch atomically, and advance the head by compare-and-swap
//!   when the stream completes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zonesync_core::{Oid, ZoneId};
//! use zonesync_notp::{RawPacket, StatePacket};
//! use zonesync_store::{MemoryStore, Store};
//! use zonesync_sync::{HandlerContext, PullPhase, RemoteRefStatePacket, SyncConfig, SyncHost};
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     let ledger = store.create_ledger(ZoneId(1), "policies").await.unwrap();
//!     let host = SyncHost::new(store, SyncConfig::default());
//!
//!     let mut ctx = HandlerContext::for_ledger(ZoneId(1), ledger.ledger_id);
//!     let request = RawPacket::from_packetable(&RemoteRefStatePacket {
//!         ref_prev_commit: Oid::ZERO,
//!         ref_commit: Oid::ZERO,
//!     })
//!     .unwrap();
//!     let ret = host
//!         .pull(PullPhase::RequestCurrentState, &mut ctx, &StatePacket::default(), &[request])
//!         .await
//!         .unwrap();
//!     assert!(ret.terminate);
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Peer                                 Store (pull)
//!   |-------- RemoteRefState --------->|  request_current_state
//!   |<------- LocalRefState -----------|
//!   |-------- ack -------------------->|  send_notify_current_state_response
//!   |-------- negotiate -------------->|  send_negotiation_request
//!   |-------- ack -------------------->|  handle_negotiation_response
//!   |<------- ObjectState x N ---------|  handle_exchange_data_stream (per commit)
//!   |-------- ack -------------------->|  handle_commit
//! ```
//!
//! Push mirrors this with the records flowing toward the store; the head
//! only moves on the batch flagged as the completed stream.

pub mod context;
pub mod error;
pub mod handler;
pub mod packets;
pub mod pull;
pub mod push;

#[cfg(test)]
pub(crate) mod test_util;

pub use context::{keys, ContextValue, FromContextValue, HandlerContext};
pub use error::{Result, SyncError};
pub use handler::{HandlerReturn, Phase, PhaseHandler, PullPhase, PushPhase, SyncConfig, SyncHost};
pub use packets::{
    LocalRefStatePacket, ObjectStatePacket, RemoteRefStatePacket, LOCAL_REF_STATE_PACKET_TYPE,
    OBJECT_STATE_PACKET_TYPE, REMOTE_REF_STATE_PACKET_TYPE,
};
pub use push::decode_objects;
