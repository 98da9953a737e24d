//! Receiving side of a push: check the peer built on our head, store each
//! incoming batch atomically, and move the head when the stream completes.

use zonesync_core::{split_object, CoreError, Object, Oid};
use zonesync_notp::{RawPacket, StatePacket};
use zonesync_store::{RefTransition, Store};

use crate::context::{keys, HandlerContext};
use crate::error::{Result, SyncError};
use crate::handler::{read_remote_ref_state, HandlerReturn, SyncHost};
use crate::packets::{LocalRefStatePacket, ObjectStatePacket};

impl<S: Store> SyncHost<S> {
    /// Compare the peer's refs with the ledger head.
    ///
    /// A push is accepted only when the peer's last seen head is our head.
    pub async fn handle_notify_current_state(
        &self,
        ctx: &mut HandlerContext,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn> {
        let (zone_id, ledger_id) = ctx.ledger_keys()?;
        let remote = read_remote_ref_state(packets)?;
        let head = self.load_ledger(zone_id, ledger_id).await?.head;
        let is_up_to_date = head == remote.ref_commit;

        let mut has_conflicts = false;
        let mut number_of_commits = 0;
        if !head.is_zero() && head != remote.ref_prev_commit {
            let (matched, history) = self
                .commit_history(zone_id, head, remote.ref_prev_commit, false)
                .await?;
            has_conflicts =
                !matched || history.len() > 1 || remote.ref_prev_commit.is_zero();
            if matched {
                number_of_commits =
                    u32::try_from(history.len().saturating_sub(1)).unwrap_or(u32::MAX);
            }
        }
        if is_up_to_date {
            has_conflicts = false;
        }

        if has_conflicts {
            tracing::warn!(
                zone = %zone_id,
                ledger = %ledger_id,
                head = %head,
                remote_prev = %remote.ref_prev_commit,
                "push: peer is not based on the current head"
            );
        }
        tracing::debug!(
            zone = %zone_id,
            ledger = %ledger_id,
            is_up_to_date,
            "push: current state"
        );

        ctx.set(keys::LOCAL_COMMIT_ID, head);
        ctx.set(keys::REMOTE_COMMIT_ID, remote.ref_commit);
        ctx.set(keys::TERMINATION, is_up_to_date);

        HandlerReturn::ack().with_packet(&LocalRefStatePacket {
            ref_commit: head,
            has_conflicts,
            is_up_to_date,
            number_of_commits,
        })
    }

    /// Acknowledge, ending the session if the ledger is already current.
    pub fn send_notify_current_state_response(&self, ctx: &HandlerContext) -> HandlerReturn {
        let mut ret = HandlerReturn::ack();
        ret.terminate = ctx.get::<bool>(keys::TERMINATION).unwrap_or(false);
        ret
    }

    /// Store one batch of objects.
    ///
    /// The batch is written in one transaction. When `state` marks the stream
    /// as complete the head moves from the value read at the start of the
    /// session to the negotiated remote commit in that same transaction. That
    /// commit must arrive in the final batch or already be stored.
    pub async fn receive_exchange_data_stream(
        &self,
        ctx: &mut HandlerContext,
        state: &StatePacket,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn> {
        let (zone_id, ledger_id) = ctx.ledger_keys()?;

        let objects = decode_objects(packets, self.config.verify_object_ids)?;

        let transition = if state.has_completed_data_stream() {
            let new: Oid = ctx.require(keys::REMOTE_COMMIT_ID)?;
            let expected = match ctx.get::<Oid>(keys::LOCAL_COMMIT_ID) {
                Some(oid) => oid,
                None => self.load_ledger(zone_id, ledger_id).await?.head,
            };
            if !objects.iter().any(|o| o.oid() == new)
                && (new.is_zero() || !self.store.has_object(zone_id, new).await?)
            {
                tracing::warn!(
                    zone = %zone_id,
                    ledger = %ledger_id,
                    commit = %new,
                    "push: completed stream names a commit the store does not have"
                );
                return Err(SyncError::ObjectNotFound(new));
            }
            Some(RefTransition {
                ledger_id,
                expected,
                new,
            })
        } else {
            None
        };

        if let Err(err) = self.store.write_objects(zone_id, &objects, transition).await {
            tracing::warn!(
                zone = %zone_id,
                ledger = %ledger_id,
                objects = objects.len(),
                error = %err,
                "push: batch rolled back"
            );
            return Err(err.into());
        }

        match transition {
            Some(t) => tracing::info!(
                zone = %zone_id,
                ledger = %ledger_id,
                from = %t.expected,
                to = %t.new,
                "push: ledger head advanced"
            ),
            None => tracing::debug!(zone = %zone_id, objects = objects.len(), "push: batch stored"),
        }
        Ok(HandlerReturn::ack())
    }
}

/// Check an incoming object against its announcement.
fn verify_object(packet: &ObjectStatePacket) -> Result<()> {
    let actual = Oid::hash(&packet.content);
    if actual != packet.oid {
        return Err(SyncError::ObjectIdMismatch {
            announced: packet.oid,
            actual,
        });
    }
    let (otype, _) = split_object(&packet.content)?;
    if otype != packet.otype {
        return Err(CoreError::UnexpectedObjectType {
            expected: packet.otype,
            actual: otype,
        }
        .into());
    }
    Ok(())
}

/// Decode the objects carried by a batch, checking each one when `verify` is set.
pub fn decode_objects(packets: &[RawPacket], verify: bool) -> Result<Vec<Object>> {
    let mut objects = Vec::with_capacity(packets.len());
    for raw in packets {
        let packet: ObjectStatePacket = raw.decode()?;
        if verify {
            verify_object(&packet)?;
        }
        objects.push(packet.into_object());
    }
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use zonesync_core::{frame_object, LedgerId, ObjectType, ZoneId};
    use zonesync_notp::{message_value, value, StatePacket};
    use zonesync_store::MemoryStore;

    use super::*;
    use crate::handler::{PushPhase, SyncConfig};
    use crate::packets::RemoteRefStatePacket;
    use crate::test_util::seed_chain;

    const ZONE: ZoneId = ZoneId(1);

    /// A source store holding the commits to push, and an empty target.
    async fn setup(n: usize) -> (Arc<MemoryStore>, SyncHost<MemoryStore>, LedgerId, Vec<Oid>) {
        let source = Arc::new(MemoryStore::new());
        let oids = seed_chain(&source, ZONE, n, "main").await;
        let target = Arc::new(MemoryStore::new());
        let ledger = target.create_ledger(ZONE, "main").await.unwrap();
        (
            source,
            SyncHost::new(target, SyncConfig::default()),
            ledger.ledger_id,
            oids,
        )
    }

    fn remote(prev: Oid, commit: Oid) -> Vec<RawPacket> {
        vec![RawPacket::from_packetable(&RemoteRefStatePacket {
            ref_prev_commit: prev,
            ref_commit: commit,
        })
        .unwrap()]
    }

    fn exchange_state(complete: bool) -> StatePacket {
        let stream = if complete {
            value::COMPLETED_DATA_STREAM
        } else {
            value::ACTIVE_DATA_STREAM
        };
        StatePacket::new(
            PushPhase::HandleExchangeDataStream.message_code(),
            message_value(value::ACKNOWLEDGED, stream),
        )
    }

    async fn batch(source: &Arc<MemoryStore>, oid: Oid) -> Vec<RawPacket> {
        let host = SyncHost::new(source.clone(), SyncConfig::default());
        host.commit_packets(ZONE, oid).await.unwrap()
    }

    #[tokio::test]
    async fn test_push_advances_head_on_completion() {
        let (source, host, ledger_id, oids) = setup(2).await;
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        let idle = StatePacket::default();

        let ret = host
            .push(
                PushPhase::HandleNotifyCurrentState,
                &mut ctx,
                &idle,
                &remote(Oid::ZERO, oids[1]),
            )
            .await
            .unwrap();
        let answer = ret.packets[0].decode::<LocalRefStatePacket>().unwrap();
        assert!(!answer.has_conflicts);
        assert!(!answer.is_up_to_date);

        let ret = host
            .push(PushPhase::SendNotifyCurrentStateResponse, &mut ctx, &idle, &[])
            .await
            .unwrap();
        assert!(!ret.terminate);

        let first = batch(&source, oids[0]).await;
        host.push(
            PushPhase::HandleExchangeDataStream,
            &mut ctx,
            &exchange_state(false),
            &first,
        )
        .await
        .unwrap();
        let ledger = host.store().get_ledger(ZONE, ledger_id).await.unwrap().unwrap();
        assert_eq!(ledger.head, Oid::ZERO);
        assert!(host.store().has_object(ZONE, oids[0]).await.unwrap());

        let last = batch(&source, oids[1]).await;
        host.push(
            PushPhase::HandleExchangeDataStream,
            &mut ctx,
            &exchange_state(true),
            &last,
        )
        .await
        .unwrap();
        let ledger = host.store().get_ledger(ZONE, ledger_id).await.unwrap().unwrap();
        assert_eq!(ledger.head, oids[1]);
    }

    #[tokio::test]
    async fn test_up_to_date_push_terminates() {
        let (_, host, ledger_id, _) = setup(0).await;
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        let idle = StatePacket::default();

        host.push(
            PushPhase::HandleNotifyCurrentState,
            &mut ctx,
            &idle,
            &remote(Oid::ZERO, Oid::ZERO),
        )
        .await
        .unwrap();
        let ret = host
            .push(PushPhase::SendNotifyCurrentStateResponse, &mut ctx, &idle, &[])
            .await
            .unwrap();
        assert!(ret.terminate);
    }

    #[tokio::test]
    async fn test_peer_behind_head_is_a_conflict() {
        let (source, host, ledger_id, oids) = setup(3).await;
        for oid in &oids {
            let objects = decode_objects(&batch(&source, *oid).await, true).unwrap();
            host.store().write_objects(ZONE, &objects, None).await.unwrap();
        }
        host.store()
            .compare_and_swap_ref(ZONE, ledger_id, Oid::ZERO, oids[2])
            .await
            .unwrap();

        for prev in [Oid::ZERO, oids[0], Oid::hash(b"unknown")] {
            let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
            let ret = host
                .handle_notify_current_state(&mut ctx, &remote(prev, Oid::hash(b"new")))
                .await
                .unwrap();
            let answer = ret.packets[0].decode::<LocalRefStatePacket>().unwrap();
            assert!(answer.has_conflicts, "prev {prev:?}");
        }

        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        let ret = host
            .handle_notify_current_state(&mut ctx, &remote(oids[2], Oid::hash(b"new")))
            .await
            .unwrap();
        let answer = ret.packets[0].decode::<LocalRefStatePacket>().unwrap();
        assert!(!answer.has_conflicts);
    }

    #[tokio::test]
    async fn test_head_moved_during_session_is_ref_conflict() {
        let (source, host, ledger_id, oids) = setup(2).await;
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        host.handle_notify_current_state(&mut ctx, &remote(Oid::ZERO, oids[1]))
            .await
            .unwrap();

        // Another session lands first.
        host.store()
            .compare_and_swap_ref(ZONE, ledger_id, Oid::ZERO, Oid::hash(b"other"))
            .await
            .unwrap();

        let mut packets = batch(&source, oids[0]).await;
        packets.extend(batch(&source, oids[1]).await);
        let err = host
            .receive_exchange_data_stream(&mut ctx, &exchange_state(true), &packets)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::RefConflict { expected, actual }
                if expected == Oid::ZERO && actual == Oid::hash(b"other")
        ));
        assert!(!host.store().has_object(ZONE, oids[1]).await.unwrap());
    }

    #[tokio::test]
    async fn test_completion_requires_announced_commit() {
        let (source, host, ledger_id, oids) = setup(1).await;
        let phantom = Oid::hash(b"phantom");
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        host.handle_notify_current_state(&mut ctx, &remote(Oid::ZERO, phantom))
            .await
            .unwrap();

        let packets = batch(&source, oids[0]).await;
        let err = host
            .receive_exchange_data_stream(&mut ctx, &exchange_state(true), &packets)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ObjectNotFound(oid) if oid == phantom));
        assert!(!host.store().has_object(ZONE, oids[0]).await.unwrap());
        let ledger = host.store().get_ledger(ZONE, ledger_id).await.unwrap().unwrap();
        assert_eq!(ledger.head, Oid::ZERO);

        // A commit stored by an earlier batch satisfies the check.
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        host.handle_notify_current_state(&mut ctx, &remote(Oid::ZERO, oids[0]))
            .await
            .unwrap();
        host.receive_exchange_data_stream(&mut ctx, &exchange_state(false), &packets)
            .await
            .unwrap();
        host.receive_exchange_data_stream(&mut ctx, &exchange_state(true), &[])
            .await
            .unwrap();
        let ledger = host.store().get_ledger(ZONE, ledger_id).await.unwrap().unwrap();
        assert_eq!(ledger.head, oids[0]);
    }

    #[tokio::test]
    async fn test_tampered_object_fails_whole_batch() {
        let (source, host, ledger_id, oids) = setup(1).await;
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger_id);
        host.handle_notify_current_state(&mut ctx, &remote(Oid::ZERO, oids[0]))
            .await
            .unwrap();

        let mut packets = batch(&source, oids[0]).await;
        let forged = ObjectStatePacket::new(
            Oid::hash(b"claimed"),
            ObjectType::Blob,
            frame_object(ObjectType::Blob, b"payload").into_content(),
        );
        packets.push(RawPacket::from_packetable(&forged).unwrap());

        let err = host
            .receive_exchange_data_stream(&mut ctx, &exchange_state(true), &packets)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ObjectIdMismatch { .. }));
        assert!(!host.store().has_object(ZONE, oids[0]).await.unwrap());
        let ledger = host.store().get_ledger(ZONE, ledger_id).await.unwrap().unwrap();
        assert_eq!(ledger.head, Oid::ZERO);
    }

    #[test]
    fn test_declared_type_must_match_content() {
        let object = frame_object(ObjectType::Blob, b"payload");
        let packet = ObjectStatePacket::from_object(&object, ObjectType::Tree);
        assert!(matches!(
            verify_object(&packet),
            Err(SyncError::Core(CoreError::UnexpectedObjectType { .. }))
        ));
    }

    #[tokio::test]
    async fn test_verification_can_be_disabled() {
        let target = Arc::new(MemoryStore::new());
        let ledger = target.create_ledger(ZONE, "main").await.unwrap();
        let host = SyncHost::new(
            target,
            SyncConfig {
                verify_object_ids: false,
                ..SyncConfig::default()
            },
        );
        let mut ctx = HandlerContext::for_ledger(ZONE, ledger.ledger_id);
        let forged = ObjectStatePacket::new(Oid::hash(b"claimed"), ObjectType::Blob, b"raw".to_vec());

        host.receive_exchange_data_stream(
            &mut ctx,
            &exchange_state(false),
            &[RawPacket::from_packetable(&forged).unwrap()],
        )
        .await
        .unwrap();
        assert!(host.store().has_object(ZONE, Oid::hash(b"claimed")).await.unwrap());
    }
}
