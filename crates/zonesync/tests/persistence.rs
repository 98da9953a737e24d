//! A SQLite-backed node keeps its ledgers and history across reopen.

use zonesync::core::ZoneId;
use zonesync::store::SqliteStore;
use zonesync::{CodeEntry, CommitRequest, Node, NodeConfig, NodeError};

const ZONE: ZoneId = ZoneId(7);

fn open(path: &std::path::Path) -> Node<SqliteStore> {
    Node::new(SqliteStore::open(path).unwrap(), NodeConfig::default())
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zonesync.db");

    let (ledger_id, heads) = {
        let node = open(&path);
        let ledger = node.create_ledger(ZONE, "policies").await.unwrap();
        let mut heads = Vec::new();
        for (i, policy) in [
            "permit(principal, action, resource);",
            "forbid(principal, action == Action::\"delete\", resource);",
        ]
        .into_iter()
        .enumerate()
        {
            let request = CommitRequest::new(&format!("rev {i}"))
                .author("ops")
                .entry(CodeEntry::new("main", "policy-main", policy).with_partition("/billing"));
            heads.push(node.commit(ZONE, ledger.ledger_id, request).await.unwrap());
        }
        (ledger.ledger_id, heads)
    };

    let node = open(&path);
    let ledger = node.ledger_by_name(ZONE, "policies").await.unwrap();
    assert_eq!(ledger.ledger_id, ledger_id);
    assert_eq!(ledger.head, heads[1]);

    let history = node.history(ZONE, ledger_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].0, heads[1]);
    assert_eq!(history[1].0, heads[0]);
    assert_eq!(history[0].1.message, "rev 1");
    assert_eq!(history[0].1.author, "ops");

    let err = node.create_ledger(ZONE, "policies").await.unwrap_err();
    assert!(matches!(err, NodeError::Store(_)));
}

#[tokio::test]
async fn test_ledgers_are_zone_scoped() {
    let dir = tempfile::tempdir().unwrap();
    let node = open(&dir.path().join("zones.db"));

    node.create_ledger(ZoneId(1), "policies").await.unwrap();
    node.create_ledger(ZoneId(2), "policies").await.unwrap();

    assert_eq!(node.list_ledgers(ZoneId(1)).await.unwrap().len(), 1);
    assert!(matches!(
        node.ledger_by_name(ZoneId(3), "policies").await.unwrap_err(),
        NodeError::LedgerNotFound(_)
    ));
}
