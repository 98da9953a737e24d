//! The Node: one store plus the sync host that replicates it.
//!
//! A node creates ledgers, records local commits, and exposes both halves of
//! replication: the store side through [`SyncHost`], and the requesting or
//! pushing peer's side through the `remote_ref_state`, `apply_pulled` and
//! `packets_for_commits` helpers.

use std::sync::Arc;

use zonesync_core::{
    build_commit_history, create_blob_object, create_commit_object, create_tree_object,
    now_secs, Commit, LedgerId, ObjectHeader, ObjectType, Oid, Tree, TreeEntry, ZoneId,
};
use zonesync_notp::RawPacket;
use zonesync_store::{Ledger, RefTransition, Store};
use zonesync_sync::{decode_objects, HandlerContext, RemoteRefStatePacket, SyncConfig, SyncHost};

use crate::error::{NodeError, Result};

/// Configuration for a Node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Sync configuration.
    pub sync: SyncConfig,
    /// Author and committer used when a commit request names none.
    pub default_author: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sync: SyncConfig::default(),
            default_author: "zonesync".to_string(),
        }
    }
}

/// One piece of code to store in a commit's tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeEntry {
    pub name: String,
    pub code_type: String,
    pub language: String,
    pub language_version: String,
    pub language_type: String,
    /// Blob header; its partition and code id also label the tree entry.
    pub header: ObjectHeader,
    pub data: Vec<u8>,
}

impl CodeEntry {
    /// A Cedar policy in the root partition.
    pub fn new(name: &str, code_id: &str, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            code_type: "acl".to_string(),
            language: "cedar".to_string(),
            language_version: "1".to_string(),
            language_type: "policy".to_string(),
            header: ObjectHeader::new("/", true, 1, 1, 1, code_id, 1),
            data: data.into(),
        }
    }

    pub fn with_partition(mut self, partition: &str) -> Self {
        self.header.partition = partition.to_string();
        self
    }

    fn tree_entry(&self, oid: Oid) -> Result<TreeEntry> {
        Ok(TreeEntry::new(
            &self.header.partition,
            ObjectType::Blob,
            oid,
            &self.name,
            &self.header.code_id,
            &self.code_type,
            &self.language,
            &self.language_version,
            &self.language_type,
        )?)
    }
}

/// A local commit: the full snapshot of the ledger's code.
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    pub message: String,
    /// Falls back to [`NodeConfig::default_author`].
    pub author: Option<String>,
    pub entries: Vec<CodeEntry>,
}

impl CommitRequest {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            ..Self::default()
        }
    }

    pub fn author(mut self, author: &str) -> Self {
        self.author = Some(author.to_string());
        self
    }

    pub fn entry(mut self, entry: CodeEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

/// The main Node struct.
pub struct Node<S: Store> {
    /// The storage backend, shared with the sync host.
    store: Arc<S>,
    host: SyncHost<S>,
    config: NodeConfig,
}

impl<S: Store> Node<S> {
    /// Create a new node over `store`.
    pub fn new(store: S, config: NodeConfig) -> Self {
        let store = Arc::new(store);
        let host = SyncHost::new(Arc::clone(&store), config.sync.clone());
        Self {
            store,
            host,
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create an empty ledger.
    pub async fn create_ledger(&self, zone_id: ZoneId, name: &str) -> Result<Ledger> {
        let ledger = self.store.create_ledger(zone_id, name).await?;
        tracing::info!(zone = %zone_id, ledger = %ledger.ledger_id, name, "ledger created");
        Ok(ledger)
    }

    pub async fn ledger(&self, zone_id: ZoneId, ledger_id: LedgerId) -> Result<Ledger> {
        self.store
            .get_ledger(zone_id, ledger_id)
            .await?
            .ok_or_else(|| NodeError::LedgerNotFound(ledger_id.to_string()))
    }

    pub async fn ledger_by_name(&self, zone_id: ZoneId, name: &str) -> Result<Ledger> {
        self.store
            .get_ledger_by_name(zone_id, name)
            .await?
            .ok_or_else(|| NodeError::LedgerNotFound(name.to_string()))
    }

    pub async fn list_ledgers(&self, zone_id: ZoneId) -> Result<Vec<Ledger>> {
        Ok(self.store.list_ledgers(zone_id).await?)
    }

    /// Record a commit on top of the ledger head.
    ///
    /// Blobs, tree, and commit are written together with the head move; if
    /// the head changed since it was read, nothing is written.
    pub async fn commit(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        request: CommitRequest,
    ) -> Result<Oid> {
        if request.entries.is_empty() {
            return Err(NodeError::InvalidOperation("commit has no entries".into()));
        }
        let ledger = self.ledger(zone_id, ledger_id).await?;

        let mut objects = Vec::with_capacity(request.entries.len() + 2);
        let mut tree = Tree::new();
        for entry in &request.entries {
            let blob = create_blob_object(&entry.header, &entry.data)?;
            tree.add_entry(entry.tree_entry(blob.oid())?)?;
            objects.push(blob);
        }
        let tree = create_tree_object(&tree)?;

        let author = request
            .author
            .as_deref()
            .unwrap_or(&self.config.default_author);
        let now = now_secs();
        let commit = Commit::new(tree.oid(), ledger.head, author, now, author, now, &request.message);
        let commit = create_commit_object(&commit)?;
        let oid = commit.oid();
        objects.push(tree);
        objects.push(commit);

        self.store
            .write_objects(
                zone_id,
                &objects,
                Some(RefTransition {
                    ledger_id,
                    expected: ledger.head,
                    new: oid,
                }),
            )
            .await?;
        tracing::info!(zone = %zone_id, ledger = %ledger_id, commit = %oid, "committed");
        Ok(oid)
    }

    /// The ledger's commits, newest first, with their OIDs.
    pub async fn history(&self, zone_id: ZoneId, ledger_id: LedgerId) -> Result<Vec<(Oid, Commit)>> {
        let head = self.ledger(zone_id, ledger_id).await?.head;
        let store = &self.store;
        let (_, commits) = build_commit_history(head, Oid::ZERO, false, |oid| async move {
            Ok::<_, NodeError>(store.get_object(zone_id, oid).await?)
        })
        .await?;
        commits
            .into_iter()
            .map(|commit| Ok((create_commit_object(&commit)?.oid(), commit)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The host that serves pulls and receives pushes for this node's store.
    pub fn sync_host(&self) -> &SyncHost<S> {
        &self.host
    }

    /// A fresh session context for one ledger.
    pub fn new_session(&self, zone_id: ZoneId, ledger_id: LedgerId) -> HandlerContext {
        HandlerContext::for_ledger(zone_id, ledger_id)
    }

    /// What this node advertises to a store it syncs with: the remote head it
    /// last saw and its own head.
    pub async fn remote_ref_state(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        known_remote: Oid,
    ) -> Result<RemoteRefStatePacket> {
        let head = self.ledger(zone_id, ledger_id).await?.head;
        Ok(RemoteRefStatePacket {
            ref_prev_commit: known_remote,
            ref_commit: head,
        })
    }

    /// Store a batch received from a pull and move the head from `expected`
    /// to `new` in the same transaction.
    pub async fn apply_pulled(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        packets: &[RawPacket],
        expected: Oid,
        new: Oid,
    ) -> Result<()> {
        let objects = decode_objects(packets, self.config.sync.verify_object_ids)?;
        if new.is_zero() {
            return Err(NodeError::InvalidOperation("cannot move head to zero".into()));
        }
        if !objects.iter().any(|o| o.oid() == new) && !self.store.has_object(zone_id, new).await? {
            return Err(NodeError::InvalidOperation(format!(
                "commit {new} is neither in the batch nor stored"
            )));
        }
        self.store
            .write_objects(
                zone_id,
                &objects,
                Some(RefTransition {
                    ledger_id,
                    expected,
                    new,
                }),
            )
            .await?;
        tracing::info!(
            zone = %zone_id,
            ledger = %ledger_id,
            objects = objects.len(),
            head = %new,
            "pulled batch applied"
        );
        Ok(())
    }

    /// Local commits a store at `known_remote` lacks, oldest first.
    pub async fn commits_since(
        &self,
        zone_id: ZoneId,
        ledger_id: LedgerId,
        known_remote: Oid,
    ) -> Result<Vec<Oid>> {
        let head = self.ledger(zone_id, ledger_id).await?.head;
        let commits = self.host.pending_commits(zone_id, head, known_remote).await?;
        commits
            .iter()
            .map(|commit| Ok(create_commit_object(commit)?.oid()))
            .collect()
    }

    /// One outgoing batch per commit, in the given order.
    pub async fn packets_for_commits(
        &self,
        zone_id: ZoneId,
        oids: &[Oid],
    ) -> Result<Vec<Vec<RawPacket>>> {
        let mut batches = Vec::with_capacity(oids.len());
        for oid in oids {
            batches.push(self.host.commit_packets(zone_id, *oid).await?);
        }
        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::CoreError;
    use zonesync_store::{MemoryStore, StoreError};

    const ZONE: ZoneId = ZoneId(1);

    fn node() -> Node<MemoryStore> {
        Node::new(MemoryStore::new(), NodeConfig::default())
    }

    fn request(message: &str, code: &str) -> CommitRequest {
        CommitRequest::new(message).entry(CodeEntry::new("main", "policy-1", code))
    }

    #[tokio::test]
    async fn test_commit_and_history() {
        let node = node();
        let ledger = node.create_ledger(ZONE, "policies").await.unwrap();

        let first = node
            .commit(ZONE, ledger.ledger_id, request("init", "permit(principal, action, resource);"))
            .await
            .unwrap();
        let second = node
            .commit(
                ZONE,
                ledger.ledger_id,
                request("tighten", "forbid(principal, action, resource);").author("alice"),
            )
            .await
            .unwrap();

        assert_eq!(node.ledger(ZONE, ledger.ledger_id).await.unwrap().head, second);

        let history = node.history(ZONE, ledger.ledger_id).await.unwrap();
        let oids: Vec<Oid> = history.iter().map(|(oid, _)| *oid).collect();
        assert_eq!(oids, vec![second, first]);
        assert_eq!(history[0].1.author, "alice");
        assert_eq!(history[1].1.author, "zonesync");
        assert_eq!(history[0].1.parent, first);
        assert!(history[1].1.is_root());
    }

    #[tokio::test]
    async fn test_commit_rejects_empty_and_missing_ledger() {
        let node = node();
        let ledger = node.create_ledger(ZONE, "policies").await.unwrap();

        let err = node
            .commit(ZONE, ledger.ledger_id, CommitRequest::new("empty"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidOperation(_)));

        let err = node
            .commit(ZONE, LedgerId::new_v4(), request("x", "permit(principal, action, resource);"))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::LedgerNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_code_id_is_rejected() {
        let node = node();
        let ledger = node.create_ledger(ZONE, "policies").await.unwrap();
        let request = CommitRequest::new("dup")
            .entry(CodeEntry::new("a", "same", "permit(principal, action, resource);"))
            .entry(CodeEntry::new("b", "same", "forbid(principal, action, resource);"));

        let err = node.commit(ZONE, ledger.ledger_id, request).await.unwrap_err();
        assert!(matches!(err, NodeError::Core(_)));
        assert_eq!(node.ledger(ZONE, ledger.ledger_id).await.unwrap().head, Oid::ZERO);
    }

    #[tokio::test]
    async fn test_multiline_author_is_rejected() {
        let node = node();
        let ledger = node.create_ledger(ZONE, "policies").await.unwrap();
        let first = node
            .commit(ZONE, ledger.ledger_id, request("init", "permit(principal, action, resource);"))
            .await
            .unwrap();

        let err = node
            .commit(
                ZONE,
                ledger.ledger_id,
                request("m", "forbid(principal, action, resource);").author("alice\nbob"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Core(CoreError::InvalidCommit(_))));

        assert_eq!(node.ledger(ZONE, ledger.ledger_id).await.unwrap().head, first);
        assert_eq!(node.history(ZONE, ledger.ledger_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_pulled_moves_head() {
        let source = node();
        let target = node();
        let src = source.create_ledger(ZONE, "policies").await.unwrap();
        let dst = target.create_ledger(ZONE, "policies").await.unwrap();

        let oid = source
            .commit(ZONE, src.ledger_id, request("init", "permit(principal, action, resource);"))
            .await
            .unwrap();
        let batches = source.packets_for_commits(ZONE, &[oid]).await.unwrap();
        assert_eq!(batches.len(), 1);

        target
            .apply_pulled(ZONE, dst.ledger_id, &batches[0], Oid::ZERO, oid)
            .await
            .unwrap();
        assert_eq!(target.ledger(ZONE, dst.ledger_id).await.unwrap().head, oid);
        assert_eq!(target.history(ZONE, dst.ledger_id).await.unwrap().len(), 1);

        // Replaying the batch against the old head is a conflict.
        let err = target
            .apply_pulled(ZONE, dst.ledger_id, &batches[0], Oid::ZERO, oid)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Store(StoreError::RefMismatch { .. })));
    }

    #[tokio::test]
    async fn test_commits_since_and_ref_state() {
        let node = node();
        let ledger = node.create_ledger(ZONE, "policies").await.unwrap();
        let a = node
            .commit(ZONE, ledger.ledger_id, request("a", "permit(principal, action, resource);"))
            .await
            .unwrap();
        let b = node
            .commit(ZONE, ledger.ledger_id, request("b", "forbid(principal, action, resource);"))
            .await
            .unwrap();

        assert_eq!(
            node.commits_since(ZONE, ledger.ledger_id, Oid::ZERO).await.unwrap(),
            vec![a, b]
        );
        assert_eq!(
            node.commits_since(ZONE, ledger.ledger_id, a).await.unwrap(),
            vec![b]
        );

        let state = node.remote_ref_state(ZONE, ledger.ledger_id, a).await.unwrap();
        assert_eq!(state.ref_prev_commit, a);
        assert_eq!(state.ref_commit, b);

        let ctx = node.new_session(ZONE, ledger.ledger_id);
        assert_eq!(ctx.ledger_keys().unwrap(), (ZONE, ledger.ledger_id));
    }
}
