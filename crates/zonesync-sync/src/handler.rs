//! Phase dispatch and the state shared by the pull and push handlers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use zonesync_core::{build_commit_history, Commit, LedgerId, Object, Oid, ZoneId};
use zonesync_notp::{
    code, message_value, value, Packetable, ProtocolPacket, RawPacket, StatePacket,
};
use zonesync_store::{Ledger, Store};

use crate::context::HandlerContext;
use crate::error::{Result, SyncError};
use crate::packets::{RemoteRefStatePacket, REMOTE_REF_STATE_PACKET_TYPE};

/// Configuration for a sync host.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Reject incoming objects whose content does not hash to their OID.
    pub verify_object_ids: bool,
    /// Version written into the protocol record of every outgoing packet.
    pub protocol_version: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            verify_object_ids: true,
            protocol_version: 1,
        }
    }
}

impl SyncConfig {
    pub fn protocol(&self) -> ProtocolPacket {
        ProtocolPacket::new(self.protocol_version)
    }
}

/// What a handler hands back to the driver after one phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerReturn {
    /// Acknowledgement and stream flags, combined as in [`message_value`].
    pub message_value: u64,
    pub error_code: u16,
    /// Records to send to the peer.
    pub packets: Vec<RawPacket>,
    /// The same phase should be invoked again.
    pub has_more: bool,
    /// The session can end here.
    pub terminate: bool,
}

impl HandlerReturn {
    /// An acknowledgement with no stream activity and no records.
    pub fn ack() -> Self {
        Self {
            message_value: message_value(value::ACKNOWLEDGED, value::UNKNOWN),
            ..Self::default()
        }
    }

    pub fn with_packet(mut self, item: &dyn Packetable) -> Result<Self> {
        self.packets.push(RawPacket::from_packetable(item)?);
        Ok(self)
    }

    /// The state packet a driver forwards to the peer for this return.
    pub fn state_packet(&self, message_code: u16) -> StatePacket {
        StatePacket {
            message_code,
            message_value: self.message_value,
            error_code: self.error_code,
        }
    }
}

/// Phases of the serving side of a pull, in driver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PullPhase {
    RequestCurrentState,
    SendNotifyCurrentStateResponse,
    SendNegotiationRequest,
    HandleNegotiationResponse,
    HandleExchangeDataStream,
    HandleCommit,
}

impl PullPhase {
    pub const ORDER: [PullPhase; 6] = [
        PullPhase::RequestCurrentState,
        PullPhase::SendNotifyCurrentStateResponse,
        PullPhase::SendNegotiationRequest,
        PullPhase::HandleNegotiationResponse,
        PullPhase::HandleExchangeDataStream,
        PullPhase::HandleCommit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PullPhase::RequestCurrentState => "request_current_state",
            PullPhase::SendNotifyCurrentStateResponse => "send_notify_current_state_response",
            PullPhase::SendNegotiationRequest => "send_negotiation_request",
            PullPhase::HandleNegotiationResponse => "handle_negotiation_response",
            PullPhase::HandleExchangeDataStream => "handle_exchange_data_stream",
            PullPhase::HandleCommit => "handle_commit",
        }
    }

    pub fn message_code(&self) -> u16 {
        match self {
            PullPhase::RequestCurrentState => code::REQUEST_CURRENT_OBJECTS_STATE,
            PullPhase::SendNotifyCurrentStateResponse => code::RESPOND_CURRENT_STATE,
            PullPhase::SendNegotiationRequest => code::NEGOTIATION_REQUEST,
            PullPhase::HandleNegotiationResponse => code::RESPOND_NEGOTIATION_REQUEST,
            PullPhase::HandleExchangeDataStream => code::EXCHANGE_DATA_STREAM,
            PullPhase::HandleCommit => code::COMMIT,
        }
    }
}

impl fmt::Display for PullPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PullPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        PullPhase::ORDER
            .into_iter()
            .find(|phase| phase.name() == s)
            .ok_or_else(|| SyncError::UnknownPhase(s.to_string()))
    }
}

/// Phases of the receiving side of a push, in driver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PushPhase {
    HandleNotifyCurrentState,
    SendNotifyCurrentStateResponse,
    SendNegotiationRequest,
    HandleNegotiationResponse,
    HandleExchangeDataStream,
    SendCommit,
}

impl PushPhase {
    pub const ORDER: [PushPhase; 6] = [
        PushPhase::HandleNotifyCurrentState,
        PushPhase::SendNotifyCurrentStateResponse,
        PushPhase::SendNegotiationRequest,
        PushPhase::HandleNegotiationResponse,
        PushPhase::HandleExchangeDataStream,
        PushPhase::SendCommit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PushPhase::HandleNotifyCurrentState => "handle_notify_current_state",
            PushPhase::SendNotifyCurrentStateResponse => "send_notify_current_state_response",
            PushPhase::SendNegotiationRequest => "send_negotiation_request",
            PushPhase::HandleNegotiationResponse => "handle_negotiation_response",
            PushPhase::HandleExchangeDataStream => "handle_exchange_data_stream",
            PushPhase::SendCommit => "send_commit",
        }
    }

    pub fn message_code(&self) -> u16 {
        match self {
            PushPhase::HandleNotifyCurrentState => code::NOTIFY_CURRENT_OBJECT_STATES,
            PushPhase::SendNotifyCurrentStateResponse => code::RESPOND_CURRENT_STATE,
            PushPhase::SendNegotiationRequest => code::NEGOTIATION_REQUEST,
            PushPhase::HandleNegotiationResponse => code::RESPOND_NEGOTIATION_REQUEST,
            PushPhase::HandleExchangeDataStream => code::EXCHANGE_DATA_STREAM,
            PushPhase::SendCommit => code::COMMIT,
        }
    }
}

impl fmt::Display for PushPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PushPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        PushPhase::ORDER
            .into_iter()
            .find(|phase| phase.name() == s)
            .ok_or_else(|| SyncError::UnknownPhase(s.to_string()))
    }
}

/// A phase of either role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Pull(PullPhase),
    Push(PushPhase),
}

impl Phase {
    /// Resolve a phase by role (`"pull"` or `"push"`) and handler name.
    pub fn parse(role: &str, name: &str) -> Result<Self> {
        match role {
            "pull" => Ok(Phase::Pull(name.parse()?)),
            "push" => Ok(Phase::Push(name.parse()?)),
            _ => Err(SyncError::UnknownPhase(format!("{role}/{name}"))),
        }
    }

    pub fn message_code(&self) -> u16 {
        match self {
            Phase::Pull(phase) => phase.message_code(),
            Phase::Push(phase) => phase.message_code(),
        }
    }
}

/// The entry point an external driver calls once per phase.
#[async_trait]
pub trait PhaseHandler: Send + Sync {
    /// Run `phase` with the peer's records from its previous phase.
    async fn handle(
        &self,
        phase: Phase,
        ctx: &mut HandlerContext,
        state: &StatePacket,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn>;
}

/// Serves pulls and receives pushes for the ledgers of one store.
pub struct SyncHost<S: Store> {
    pub(crate) store: Arc<S>,
    pub(crate) config: SyncConfig,
}

impl<S: Store> SyncHost<S> {
    pub fn new(store: Arc<S>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one phase of the serving side of a pull.
    pub async fn pull(
        &self,
        phase: PullPhase,
        ctx: &mut HandlerContext,
        _state: &StatePacket,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn> {
        tracing::debug!(%phase, packets = packets.len(), "pull phase");
        match phase {
            PullPhase::RequestCurrentState => self.request_current_state(ctx, packets).await,
            PullPhase::SendNegotiationRequest => self.send_negotiation_request(ctx).await,
            PullPhase::HandleExchangeDataStream => self.send_exchange_data_stream(ctx).await,
            PullPhase::SendNotifyCurrentStateResponse
            | PullPhase::HandleNegotiationResponse
            | PullPhase::HandleCommit => Ok(HandlerReturn::ack()),
        }
    }

    /// Run one phase of the receiving side of a push.
    pub async fn push(
        &self,
        phase: PushPhase,
        ctx: &mut HandlerContext,
        state: &StatePacket,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn> {
        tracing::debug!(%phase, packets = packets.len(), "push phase");
        match phase {
            PushPhase::HandleNotifyCurrentState => {
                self.handle_notify_current_state(ctx, packets).await
            }
            PushPhase::SendNotifyCurrentStateResponse => {
                Ok(self.send_notify_current_state_response(ctx))
            }
            PushPhase::HandleExchangeDataStream => {
                self.receive_exchange_data_stream(ctx, state, packets).await
            }
            PushPhase::SendNegotiationRequest
            | PushPhase::HandleNegotiationResponse
            | PushPhase::SendCommit => Ok(HandlerReturn::ack()),
        }
    }

    pub(crate) async fn load_ledger(&self, zone_id: ZoneId, ledger_id: LedgerId) -> Result<Ledger> {
        self.store
            .get_ledger(zone_id, ledger_id)
            .await?
            .ok_or_else(|| SyncError::LedgerNotFound(ledger_id.to_string()))
    }

    pub(crate) async fn require_object(&self, zone_id: ZoneId, oid: Oid) -> Result<Object> {
        self.store
            .get_object(zone_id, oid)
            .await?
            .ok_or(SyncError::ObjectNotFound(oid))
    }

    /// Walk the zone's commits from `from` back toward `to`.
    pub(crate) async fn commit_history(
        &self,
        zone_id: ZoneId,
        from: Oid,
        to: Oid,
        reverse: bool,
    ) -> Result<(bool, Vec<Commit>)> {
        let store = &self.store;
        build_commit_history(from, to, reverse, |oid| async move {
            Ok::<_, SyncError>(store.get_object(zone_id, oid).await?)
        })
        .await
    }

    /// Commits reachable from `head` that a peer at `known` lacks, oldest first.
    ///
    /// When `known` is on the walk it is left out; otherwise the whole walk
    /// is returned.
    pub async fn pending_commits(
        &self,
        zone_id: ZoneId,
        head: Oid,
        known: Oid,
    ) -> Result<Vec<Commit>> {
        if head.is_zero() || head == known {
            return Ok(Vec::new());
        }
        let (matched, mut history) = self.commit_history(zone_id, head, known, true).await?;
        if matched && !known.is_zero() && !history.is_empty() {
            history.remove(0);
        }
        Ok(history)
    }
}

#[async_trait]
impl<S: Store + 'static> PhaseHandler for SyncHost<S> {
    async fn handle(
        &self,
        phase: Phase,
        ctx: &mut HandlerContext,
        state: &StatePacket,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn> {
        match phase {
            Phase::Pull(phase) => self.pull(phase, ctx, state, packets).await,
            Phase::Push(phase) => self.push(phase, ctx, state, packets).await,
        }
    }
}

/// Find and decode the peer's ref state among its records.
pub(crate) fn read_remote_ref_state(packets: &[RawPacket]) -> Result<RemoteRefStatePacket> {
    let expected = zonesync_notp::combine_u32_to_u64(REMOTE_REF_STATE_PACKET_TYPE, 0);
    let raw = packets
        .iter()
        .find(|p| p.packet_type == expected)
        .ok_or_else(|| SyncError::InvalidInput("missing remote ref state".into()))?;
    raw.decode()
        .map_err(|e| SyncError::InvalidInput(format!("malformed remote ref state: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_round_trip() {
        for phase in PullPhase::ORDER {
            assert_eq!(phase.name().parse::<PullPhase>().unwrap(), phase);
        }
        for phase in PushPhase::ORDER {
            assert_eq!(phase.name().parse::<PushPhase>().unwrap(), phase);
        }
        assert_eq!(
            Phase::parse("push", "send_commit").unwrap(),
            Phase::Push(PushPhase::SendCommit)
        );
        assert!(matches!(
            Phase::parse("pull", "send_commit"),
            Err(SyncError::UnknownPhase(_))
        ));
        assert!(matches!(
            Phase::parse("relay", "handle_commit"),
            Err(SyncError::UnknownPhase(_))
        ));
    }

    #[test]
    fn test_ack_state_packet() {
        let state = HandlerReturn::ack().state_packet(code::COMMIT);
        assert!(state.has_ack());
        assert!(!state.has_active_data_stream());
        assert!(!state.has_completed_data_stream());
        assert_eq!(state.message_code, code::COMMIT);
    }

    #[test]
    fn test_read_remote_ref_state() {
        assert!(matches!(
            read_remote_ref_state(&[]),
            Err(SyncError::InvalidInput(_))
        ));

        let garbage = RawPacket::new(
            zonesync_notp::combine_u32_to_u64(REMOTE_REF_STATE_PACKET_TYPE, 0),
            b"not a ref state".to_vec(),
        );
        assert!(matches!(
            read_remote_ref_state(&[garbage]),
            Err(SyncError::InvalidInput(_))
        ));

        let packet = RemoteRefStatePacket {
            ref_prev_commit: Oid::ZERO,
            ref_commit: Oid::hash(b"c"),
        };
        let raw = RawPacket::from_packetable(&packet).unwrap();
        assert_eq!(read_remote_ref_state(&[raw]).unwrap(), packet);
    }
}
