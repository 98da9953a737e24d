//! Commit fixtures for handler tests.

use zonesync_core::{
    create_blob_object, create_commit_object, create_tree_object, Commit, ObjectHeader,
    ObjectType, Oid, Tree, TreeEntry, ZoneId,
};
use zonesync_store::{MemoryStore, Store};

/// Store a commit with a one-blob tree on top of `parent`.
pub(crate) async fn seed_commit(store: &MemoryStore, zone: ZoneId, parent: Oid, tag: &str) -> Oid {
    let header = ObjectHeader::new("/", true, 1, 1, 1, tag, 1);
    let blob = create_blob_object(&header, format!("permit({tag});").as_bytes()).unwrap();
    let mut tree = Tree::new();
    tree.add_entry(
        TreeEntry::new("/", ObjectType::Blob, blob.oid(), tag, tag, "acl", "cedar", "1", "policy")
            .unwrap(),
    )
    .unwrap();
    let tree = create_tree_object(&tree).unwrap();
    let commit = Commit::new(tree.oid(), parent, "tester", 0, "tester", 0, tag);
    let commit = create_commit_object(&commit).unwrap();
    let oid = commit.oid();
    store
        .write_objects(zone, &[blob, tree, commit], None)
        .await
        .unwrap();
    oid
}

/// Store `n` linked commits, returned oldest first.
pub(crate) async fn seed_chain(store: &MemoryStore, zone: ZoneId, n: usize, tag: &str) -> Vec<Oid> {
    let mut oids = Vec::with_capacity(n);
    let mut parent = Oid::ZERO;
    for i in 0..n {
        parent = seed_commit(store, zone, parent, &format!("{tag}-{i}")).await;
        oids.push(parent);
    }
    oids
}
