//! Golden vectors: wire bytes and object ids every implementation must match.

use zonesync_core::{create_commit_object, Object, Oid};
use zonesync_notp::{decode_stream, Packet};
use zonesync_testkit::vectors::{encode_vector, TextRecord};
use zonesync_testkit::{object_vectors, verify_all_vectors, wire_vectors};

#[test]
fn test_generate_vectors() {
    let json = serde_json::to_string_pretty(&(wire_vectors(), object_vectors())).unwrap();
    println!("{json}");

    for (name, matches, actual) in verify_all_vectors() {
        assert!(matches, "{name}: got {actual}");
    }
}

#[test]
fn test_wire_vectors_decode() {
    for vector in wire_vectors() {
        let bytes = hex::decode(vector.expected_hex).unwrap();
        let (protocol, records) = decode_stream(&Packet::from_bytes(bytes)).unwrap();

        assert_eq!(protocol.version, vector.protocol_version, "{}", vector.name);
        let texts: Vec<String> = records
            .iter()
            .map(|r| r.decode::<TextRecord>().unwrap().0)
            .collect();
        assert_eq!(texts, vector.records, "{}", vector.name);
    }
}

#[test]
fn test_encode_is_deterministic() {
    for vector in wire_vectors() {
        let a = encode_vector(&vector).unwrap();
        let b = encode_vector(&vector).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_commit_vector_parses_back() {
    let vector = &object_vectors()[1];
    let object = Object::new(hex::decode(&vector.framed_hex).unwrap());
    assert_eq!(object.oid().to_hex(), vector.expected_oid);
    assert!(object.verify());

    let commit = object.to_commit().unwrap();
    assert!(commit.is_root());
    assert_eq!(commit.author, "alice");
    assert_eq!(commit.message, "init");
    assert_eq!(
        create_commit_object(&commit).unwrap().oid(),
        Oid::from_hex(vector.expected_oid).unwrap()
    );
}
