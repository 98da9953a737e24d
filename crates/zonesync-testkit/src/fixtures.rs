//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use zonesync::{CodeEntry, CommitRequest, Node, NodeConfig, Result};
use zonesync_core::{LedgerId, Oid, ZoneId};
use zonesync_store::{MemoryStore, Store};

/// Zone used by fixtures unless told otherwise.
pub const TEST_ZONE: ZoneId = ZoneId(1);

/// A node with one ledger ready for commits.
pub struct TestFixture<S: Store = MemoryStore> {
    pub node: Node<S>,
    pub zone_id: ZoneId,
    pub ledger_id: LedgerId,
}

impl TestFixture<MemoryStore> {
    /// A memory-backed node with a ledger named `name`.
    pub async fn new(name: &str) -> Result<Self> {
        Self::with_store(MemoryStore::new(), name).await
    }
}

impl<S: Store> TestFixture<S> {
    /// A node over `store` with a ledger named `name` in [`TEST_ZONE`].
    pub async fn with_store(store: S, name: &str) -> Result<Self> {
        let node = Node::new(store, NodeConfig::default());
        let ledger = node.create_ledger(TEST_ZONE, name).await?;
        Ok(Self {
            node,
            zone_id: TEST_ZONE,
            ledger_id: ledger.ledger_id,
        })
    }

    /// Current head of the fixture ledger.
    pub async fn head(&self) -> Result<Oid> {
        Ok(self.node.ledger(self.zone_id, self.ledger_id).await?.head)
    }

    /// Commit one policy file.
    pub async fn commit_policy(&self, message: &str, policy: &str) -> Result<Oid> {
        let request = CommitRequest::new(message).entry(CodeEntry::new("main", "policy-main", policy));
        self.node.commit(self.zone_id, self.ledger_id, request).await
    }

    /// Commit `n` distinct policies, returning their OIDs oldest first.
    pub async fn commit_many(&self, n: usize, tag: &str) -> Result<Vec<Oid>> {
        let mut oids = Vec::with_capacity(n);
        for i in 0..n {
            let message = format!("{tag} {i}");
            oids.push(self.commit_policy(&message, &sample_policy(tag, i)).await?);
        }
        Ok(oids)
    }

    /// Commit OIDs of the ledger, oldest first.
    pub async fn commit_ids(&self) -> Result<Vec<Oid>> {
        let mut oids: Vec<Oid> = self
            .node
            .history(self.zone_id, self.ledger_id)
            .await?
            .into_iter()
            .map(|(oid, _)| oid)
            .collect();
        oids.reverse();
        Ok(oids)
    }
}

/// A small Cedar policy unique to `(tag, i)`.
pub fn sample_policy(tag: &str, i: usize) -> String {
    format!(
        "permit(principal == User::\"{tag}-{i}\", action == Action::\"view\", resource);"
    )
}
