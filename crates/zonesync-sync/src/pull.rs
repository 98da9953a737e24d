//! Serving side of a pull: report the ledger state, negotiate the commits a
//! peer lacks, and stream them one commit per round trip.

use zonesync_core::{create_commit_object, ObjectType, Oid, ZoneId};
use zonesync_notp::{message_value, value, RawPacket};
use zonesync_store::Store;

use crate::context::{keys, HandlerContext};
use crate::error::Result;
use crate::handler::{read_remote_ref_state, HandlerReturn, SyncHost};
use crate::packets::{LocalRefStatePacket, ObjectStatePacket};

impl<S: Store> SyncHost<S> {
    /// Compare the peer's refs with the ledger head.
    ///
    /// The peer's last seen head must be an ancestor of (or equal to) ours;
    /// otherwise the histories diverged and the answer reports a conflict.
    pub async fn request_current_state(
        &self,
        ctx: &mut HandlerContext,
        packets: &[RawPacket],
    ) -> Result<HandlerReturn> {
        let (zone_id, ledger_id) = ctx.ledger_keys()?;
        let remote = read_remote_ref_state(packets)?;
        let head = self.load_ledger(zone_id, ledger_id).await?.head;

        let mut has_conflicts = head.is_zero() && !remote.ref_prev_commit.is_zero();
        if !head.is_zero() && head != remote.ref_prev_commit {
            let (matched, _) = self
                .commit_history(zone_id, head, remote.ref_prev_commit, false)
                .await?;
            has_conflicts = !matched;
        }
        let is_up_to_date = head == remote.ref_commit;

        let mut number_of_commits = 0;
        if !is_up_to_date {
            let pending = self.pending_commits(zone_id, head, remote.ref_commit).await?;
            number_of_commits = u32::try_from(pending.len()).unwrap_or(u32::MAX);
        }

        if has_conflicts {
            tracing::warn!(
                zone = %zone_id,
                ledger = %ledger_id,
                head = %head,
                remote_prev = %remote.ref_prev_commit,
                "pull: histories diverged"
            );
        }
        tracing::debug!(
            zone = %zone_id,
            ledger = %ledger_id,
            is_up_to_date,
            number_of_commits,
            "pull: current state"
        );

        ctx.set(keys::LOCAL_COMMIT_ID, head);
        ctx.set(keys::REMOTE_COMMIT_ID, remote.ref_commit);
        ctx.set(keys::TERMINATION, is_up_to_date);

        let mut ret = HandlerReturn::ack().with_packet(&LocalRefStatePacket {
            ref_commit: head,
            has_conflicts,
            is_up_to_date,
            number_of_commits,
        })?;
        ret.terminate = is_up_to_date;
        Ok(ret)
    }

    /// Fix the transfer list for the session and reset its cursor.
    pub async fn send_negotiation_request(&self, ctx: &mut HandlerContext) -> Result<HandlerReturn> {
        let (zone_id, _) = ctx.ledger_keys()?;
        let local: Oid = ctx.require(keys::LOCAL_COMMIT_ID)?;
        let remote: Oid = ctx.require(keys::REMOTE_COMMIT_ID)?;

        let mut diff = Vec::new();
        if local != remote {
            for commit in self.pending_commits(zone_id, local, remote).await? {
                diff.push(create_commit_object(&commit)?.oid());
            }
        }
        tracing::debug!(zone = %zone_id, commits = diff.len(), "pull: negotiated");

        ctx.set(keys::DIFF_COMMIT_IDS, diff);
        ctx.set(keys::DIFF_COMMIT_ID_CURSOR, -1i64);
        Ok(HandlerReturn::ack())
    }

    /// Emit the objects of the next negotiated commit.
    ///
    /// The last commit is flagged as a completed stream; calls past the end
    /// of the list emit nothing. A call that fails leaves the cursor where it
    /// was.
    pub async fn send_exchange_data_stream(
        &self,
        ctx: &mut HandlerContext,
    ) -> Result<HandlerReturn> {
        let (zone_id, _) = ctx.ledger_keys()?;
        let diff: Vec<Oid> = ctx.get(keys::DIFF_COMMIT_IDS).unwrap_or_default();
        let cursor = ctx.get::<i64>(keys::DIFF_COMMIT_ID_CURSOR).unwrap_or(-1) + 1;

        let index = usize::try_from(cursor).ok();
        let Some((index, oid)) = index.and_then(|i| diff.get(i).map(|oid| (i, *oid))) else {
            ctx.set(keys::DIFF_COMMIT_ID_CURSOR, cursor);
            return Ok(HandlerReturn::ack());
        };

        // Advance only once the commit's objects are loaded.
        let packets = self.commit_packets(zone_id, oid).await?;
        ctx.set(keys::DIFF_COMMIT_ID_CURSOR, cursor);
        let is_last = index + 1 == diff.len();
        let stream = if is_last {
            value::COMPLETED_DATA_STREAM
        } else {
            value::ACTIVE_DATA_STREAM
        };
        tracing::debug!(
            zone = %zone_id,
            commit = %oid,
            objects = packets.len(),
            position = index + 1,
            total = diff.len(),
            "pull: sending commit"
        );

        Ok(HandlerReturn {
            message_value: message_value(value::ACKNOWLEDGED, stream),
            packets,
            has_more: !is_last,
            ..HandlerReturn::default()
        })
    }

    /// The records that carry one commit: the commit, its tree, then every
    /// tree entry tagged with the entry's declared type.
    pub async fn commit_packets(&self, zone_id: ZoneId, oid: Oid) -> Result<Vec<RawPacket>> {
        let commit_object = self.require_object(zone_id, oid).await?;
        let commit = commit_object.to_commit()?;
        let tree_object = self.require_object(zone_id, commit.tree).await?;
        let tree = tree_object.to_tree()?;

        let mut packets = Vec::with_capacity(2 + tree.entries().len());
        packets.push(RawPacket::from_packetable(&ObjectStatePacket::from_object(
            &commit_object,
            ObjectType::Commit,
        ))?);
        packets.push(RawPacket::from_packetable(&ObjectStatePacket::from_object(
            &tree_object,
            ObjectType::Tree,
        ))?);
        for entry in tree.entries() {
            let object = self.require_object(zone_id, entry.oid).await?;
            packets.push(RawPacket::from_packetable(&ObjectStatePacket::from_object(
                &object,
                entry.otype,
            ))?);
        }
        Ok(packets)
    }
}
