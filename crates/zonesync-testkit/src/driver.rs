//! In-process sync driver.
//!
//! Plays the peer's side of a pull or push against any [`PhaseHandler`],
//! calling the handler once per phase. Every exchange is framed into a NOTP
//! packet and parsed back, the state packet riding as the first record, so
//! the handlers only ever see what crossed the wire.

use zonesync::{Node, NodeError, Result};
use zonesync_core::{LedgerId, Oid, ZoneId};
use zonesync_notp::{
    combine_u32_to_u64, decode_stream, encode_stream, message_value, value,
    ProtocolPacket, RawPacket, StatePacket,
};
use zonesync_store::Store;
use zonesync_sync::{
    HandlerContext, LocalRefStatePacket, ObjectStatePacket, Phase, PhaseHandler, PullPhase,
    PushPhase, SyncError, LOCAL_REF_STATE_PACKET_TYPE,
};

/// Which ledgers a session connects.
#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub zone_id: ZoneId,
    /// The peer's ledger.
    pub local: LedgerId,
    /// The ledger on the serving store.
    pub remote: LedgerId,
}

/// Outcome of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// The session ended at the state exchange.
    pub up_to_date: bool,
    pub commits: usize,
    pub objects: usize,
    /// The store's head once the session finished.
    pub head: Oid,
    /// Handler calls made.
    pub round_trips: usize,
}

impl SyncReport {
    fn current(head: Oid, round_trips: usize) -> Self {
        Self {
            up_to_date: true,
            commits: 0,
            objects: 0,
            head,
            round_trips,
        }
    }
}

/// What came back from one handler call, after framing.
struct Reply {
    packets: Vec<RawPacket>,
    has_more: bool,
    terminate: bool,
}

struct Session<'a, H> {
    server: &'a H,
    ctx: HandlerContext,
    protocol: ProtocolPacket,
    round_trips: usize,
}

impl<'a, H: PhaseHandler> Session<'a, H> {
    fn new(server: &'a H, route: &Route, protocol: ProtocolPacket) -> Self {
        Self {
            server,
            ctx: HandlerContext::for_ledger(route.zone_id, route.remote),
            protocol,
            round_trips: 0,
        }
    }

    async fn call(&mut self, phase: Phase, stream: u32, packets: &[RawPacket]) -> Result<Reply> {
        let state = StatePacket::new(phase.message_code(), message_value(value::ACKNOWLEDGED, stream));
        let (state, packets) = transmit(&self.protocol, &state, packets)?;

        let ret = self.server.handle(phase, &mut self.ctx, &state, &packets).await?;
        self.round_trips += 1;

        let (reply_state, packets) =
            transmit(&self.protocol, &ret.state_packet(phase.message_code()), &ret.packets)?;
        if reply_state.has_error() {
            return Err(NodeError::InvalidOperation(format!(
                "{phase:?} failed with error code {}",
                reply_state.error_code
            )));
        }
        Ok(Reply {
            packets,
            has_more: ret.has_more,
            terminate: ret.terminate,
        })
    }
}

/// Frame a state packet and its records, then parse them back.
fn transmit(
    protocol: &ProtocolPacket,
    state: &StatePacket,
    packets: &[RawPacket],
) -> Result<(StatePacket, Vec<RawPacket>)> {
    let mut records = Vec::with_capacity(packets.len() + 1);
    records.push(RawPacket::from_packetable(state)?);
    records.extend_from_slice(packets);

    let packet = encode_stream(protocol, &records)?;
    let (_, mut records) = decode_stream(&packet)?;
    if records.is_empty() {
        return Err(NodeError::InvalidOperation("stream carried no state".into()));
    }
    let state = records.remove(0).decode::<StatePacket>()?;
    Ok((state, records))
}

fn read_local_ref_state(packets: &[RawPacket]) -> Result<LocalRefStatePacket> {
    let expected = combine_u32_to_u64(LOCAL_REF_STATE_PACKET_TYPE, 0);
    let raw = packets
        .iter()
        .find(|p| p.packet_type == expected)
        .ok_or_else(|| NodeError::InvalidOperation("missing local ref state".into()))?;
    Ok(raw.decode()?)
}

/// Pull the store's new commits into `client`'s ledger.
///
/// `known_remote` is the store head the client saw last; the client must not
/// have commits of its own on top of it. Each received commit moves the local
/// head by one.
pub async fn pull<S: Store, H: PhaseHandler>(
    client: &Node<S>,
    server: &H,
    route: &Route,
    known_remote: Oid,
) -> Result<SyncReport> {
    let mut head = client.ledger(route.zone_id, route.local).await?.head;
    if head != known_remote {
        return Err(NodeError::InvalidOperation(
            "local ledger has commits the store has not seen".into(),
        ));
    }

    let mut session = Session::new(server, route, client.config().sync.protocol());
    let refs = client
        .remote_ref_state(route.zone_id, route.local, known_remote)
        .await?;
    let reply = session
        .call(
            Phase::Pull(PullPhase::RequestCurrentState),
            value::UNKNOWN,
            &[RawPacket::from_packetable(&refs)?],
        )
        .await?;
    let remote = read_local_ref_state(&reply.packets)?;
    if remote.has_conflicts {
        return Err(SyncError::RefConflict {
            expected: known_remote,
            actual: remote.ref_commit,
        }
        .into());
    }
    if remote.is_up_to_date || reply.terminate {
        return Ok(SyncReport::current(remote.ref_commit, session.round_trips));
    }

    for phase in [
        PullPhase::SendNotifyCurrentStateResponse,
        PullPhase::SendNegotiationRequest,
        PullPhase::HandleNegotiationResponse,
    ] {
        session.call(Phase::Pull(phase), value::UNKNOWN, &[]).await?;
    }

    let mut commits = 0;
    let mut objects = 0;
    // One extra call past the announced count tolerates a trailing empty reply.
    for _ in 0..=remote.number_of_commits {
        let reply = session
            .call(
                Phase::Pull(PullPhase::HandleExchangeDataStream),
                value::ACTIVE_DATA_STREAM,
                &[],
            )
            .await?;
        if let Some(first) = reply.packets.first() {
            let commit = first.decode::<ObjectStatePacket>()?.oid;
            client
                .apply_pulled(route.zone_id, route.local, &reply.packets, head, commit)
                .await?;
            head = commit;
            commits += 1;
            objects += reply.packets.len();
        }
        if !reply.has_more {
            break;
        }
    }

    session
        .call(Phase::Pull(PullPhase::HandleCommit), value::COMPLETED_DATA_STREAM, &[])
        .await?;
    tracing::info!(zone = %route.zone_id, commits, objects, head = %head, "pull finished");

    Ok(SyncReport {
        up_to_date: false,
        commits,
        objects,
        head,
        round_trips: session.round_trips,
    })
}

/// Push `client`'s commits the store lacks.
///
/// `known_remote` is the store head the client last saw; the store refuses
/// the push when its head has moved since.
pub async fn push<S: Store, H: PhaseHandler>(
    client: &Node<S>,
    server: &H,
    route: &Route,
    known_remote: Oid,
) -> Result<SyncReport> {
    let mut session = Session::new(server, route, client.config().sync.protocol());
    let refs = client
        .remote_ref_state(route.zone_id, route.local, known_remote)
        .await?;
    let reply = session
        .call(
            Phase::Push(PushPhase::HandleNotifyCurrentState),
            value::UNKNOWN,
            &[RawPacket::from_packetable(&refs)?],
        )
        .await?;
    let remote = read_local_ref_state(&reply.packets)?;
    if remote.has_conflicts {
        return Err(SyncError::RefConflict {
            expected: known_remote,
            actual: remote.ref_commit,
        }
        .into());
    }
    if remote.is_up_to_date {
        return Ok(SyncReport::current(remote.ref_commit, session.round_trips));
    }

    let reply = session
        .call(Phase::Push(PushPhase::SendNotifyCurrentStateResponse), value::UNKNOWN, &[])
        .await?;
    if reply.terminate {
        return Ok(SyncReport::current(remote.ref_commit, session.round_trips));
    }
    for phase in [PushPhase::SendNegotiationRequest, PushPhase::HandleNegotiationResponse] {
        session.call(Phase::Push(phase), value::UNKNOWN, &[]).await?;
    }

    let oids = client
        .commits_since(route.zone_id, route.local, remote.ref_commit)
        .await?;
    let Some(&head) = oids.last() else {
        return Err(NodeError::InvalidOperation("no commits to push".into()));
    };
    let batches = client.packets_for_commits(route.zone_id, &oids).await?;

    let mut objects = 0;
    for (i, batch) in batches.iter().enumerate() {
        let stream = if i + 1 == batches.len() {
            value::COMPLETED_DATA_STREAM
        } else {
            value::ACTIVE_DATA_STREAM
        };
        session
            .call(Phase::Push(PushPhase::HandleExchangeDataStream), stream, batch)
            .await?;
        objects += batch.len();
    }

    session
        .call(Phase::Push(PushPhase::SendCommit), value::COMPLETED_DATA_STREAM, &[])
        .await?;
    tracing::info!(zone = %route.zone_id, commits = oids.len(), objects, head = %head, "push finished");

    Ok(SyncReport {
        up_to_date: false,
        commits: oids.len(),
        objects,
        head,
        round_trips: session.round_trips,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_notp::code;

    #[test]
    fn test_transmit_keeps_state_and_records() {
        let state = StatePacket::new(code::EXCHANGE_DATA_STREAM, message_value(2, 4));
        let records = vec![RawPacket::new(7, vec![1, 2, 3]), RawPacket::new(8, b"ledger".to_vec())];

        let (decoded, packets) = transmit(&ProtocolPacket::new(1), &state, &records).unwrap();
        assert_eq!(decoded, state);
        assert!(decoded.has_completed_data_stream());
        assert_eq!(packets, records);
    }
}
