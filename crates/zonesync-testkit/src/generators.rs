//! Proptest generators for property-based testing.

use proptest::prelude::*;

use zonesync_core::{frame_object, Commit, ObjectType, Oid};
use zonesync_notp::RawPacket;
use zonesync_sync::{ObjectStatePacket, RemoteRefStatePacket};

/// Generate a random Oid.
pub fn oid() -> impl Strategy<Value = Oid> {
    any::<[u8; 32]>().prop_map(Oid::from_bytes)
}

/// Generate an Oid that is zero about one time in five.
pub fn ref_oid() -> impl Strategy<Value = Oid> {
    prop_oneof![1 => Just(Oid::ZERO), 4 => oid()]
}

/// Generate an ObjectType.
pub fn object_type() -> impl Strategy<Value = ObjectType> {
    prop_oneof![
        Just(ObjectType::Commit),
        Just(ObjectType::Tree),
        Just(ObjectType::Blob),
    ]
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a name with no whitespace.
pub fn identity() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}".prop_map(String::from)
}

/// Generate a plausible commit timestamp (unix seconds).
pub fn timestamp() -> impl Strategy<Value = i64> {
    0i64..=4_102_444_800i64
}

/// Parameters for generating a commit.
#[derive(Debug, Clone)]
pub struct CommitParams {
    pub tree: Oid,
    pub parent: Oid,
    pub author: String,
    pub timestamp: i64,
    pub message: String,
}

impl Arbitrary for CommitParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (oid(), ref_oid(), identity(), timestamp(), ".{0,64}")
            .prop_map(|(tree, parent, author, timestamp, message)| CommitParams {
                tree,
                parent,
                author,
                timestamp,
                message,
            })
            .boxed()
    }
}

/// Generate a commit from parameters.
pub fn commit_from_params(params: &CommitParams) -> Commit {
    Commit::new(
        params.tree,
        params.parent,
        &params.author,
        params.timestamp,
        &params.author,
        params.timestamp,
        &params.message,
    )
}

/// Generate a well-formed object-state packet: the OID matches the content.
pub fn object_state_packet() -> impl Strategy<Value = ObjectStatePacket> {
    (object_type(), payload(512)).prop_map(|(otype, data)| {
        let object = frame_object(otype, &data);
        ObjectStatePacket::from_object(&object, otype)
    })
}

/// Generate a remote ref state.
pub fn remote_ref_state() -> impl Strategy<Value = RemoteRefStatePacket> {
    (ref_oid(), ref_oid()).prop_map(|(ref_prev_commit, ref_commit)| RemoteRefStatePacket {
        ref_prev_commit,
        ref_commit,
    })
}

/// Generate a type-tagged record with an arbitrary payload.
pub fn raw_packet(max_len: usize) -> impl Strategy<Value = RawPacket> {
    (any::<u64>(), payload(max_len))
        .prop_map(|(packet_type, payload)| RawPacket::new(packet_type, payload))
}
