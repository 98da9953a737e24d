//! Content-addressed objects and their framing.
//!
//! Every object is stored framed as `"<type> <len>" 0xFF <content>`, and its
//! [`Oid`] is the SHA-256 of the framed bytes.

use std::fmt;
use std::str::FromStr;

use crate::blob::{deserialize_blob, serialize_blob, ObjectHeader};
use crate::commit::Commit;
use crate::error::{CoreError, Result};
use crate::tree::Tree;
use crate::types::Oid;

/// Separator between an object's frame header and its content.
pub const OBJECT_NULL_BYTE: u8 = 0xFF;

/// Kind of a content-addressed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            other => Err(CoreError::UnsupportedObjectType(other.to_string())),
        }
    }
}

/// A framed object and its identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Object {
    oid: Oid,
    content: Vec<u8>,
}

impl Object {
    /// Wrap framed bytes, computing the OID.
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            oid: Oid::hash(&content),
            content,
        }
    }

    /// Wrap framed bytes loaded under a known OID without rehashing.
    pub fn from_parts(oid: Oid, content: Vec<u8>) -> Self {
        Self { oid, content }
    }

    pub fn oid(&self) -> Oid {
        self.oid
    }

    /// The framed bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    /// True if the OID matches the SHA-256 of the content.
    pub fn verify(&self) -> bool {
        Oid::hash(&self.content) == self.oid
    }

    /// Split the frame into its type and inner content.
    pub fn split(&self) -> Result<(ObjectType, &[u8])> {
        split_object(&self.content)
    }

    pub fn object_type(&self) -> Result<ObjectType> {
        self.split().map(|(otype, _)| otype)
    }

    /// Parse the object into its typed instance.
    pub fn info(&self) -> Result<ObjectInfo> {
        let (otype, inner) = self.split()?;
        let instance = match otype {
            ObjectType::Commit => ObjectInstance::Commit(Commit::parse(inner)?),
            ObjectType::Tree => ObjectInstance::Tree(Tree::parse(inner)?),
            ObjectType::Blob => {
                let (header, data) = deserialize_blob(inner)?;
                ObjectInstance::Blob { header, data }
            }
        };
        Ok(ObjectInfo {
            oid: self.oid,
            otype,
            instance,
        })
    }

    /// Parse the object as a commit.
    pub fn to_commit(&self) -> Result<Commit> {
        match self.info()?.instance {
            ObjectInstance::Commit(commit) => Ok(commit),
            other => Err(CoreError::UnexpectedObjectType {
                expected: ObjectType::Commit,
                actual: other.object_type(),
            }),
        }
    }

    /// Parse the object as a tree.
    pub fn to_tree(&self) -> Result<Tree> {
        match self.info()?.instance {
            ObjectInstance::Tree(tree) => Ok(tree),
            other => Err(CoreError::UnexpectedObjectType {
                expected: ObjectType::Tree,
                actual: other.object_type(),
            }),
        }
    }
}

/// The typed view of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectInstance {
    Commit(Commit),
    Tree(Tree),
    Blob { header: ObjectHeader, data: Vec<u8> },
}

impl ObjectInstance {
    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectInstance::Commit(_) => ObjectType::Commit,
            ObjectInstance::Tree(_) => ObjectType::Tree,
            ObjectInstance::Blob { .. } => ObjectType::Blob,
        }
    }
}

/// An object with its parsed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub oid: Oid,
    pub otype: ObjectType,
    pub instance: ObjectInstance,
}

/// Frame `content` as an object of type `otype`.
pub fn frame_object(otype: ObjectType, content: &[u8]) -> Object {
    let prefix = format!("{} {}", otype.as_str(), content.len());
    let mut framed = Vec::with_capacity(prefix.len() + 1 + content.len());
    framed.extend_from_slice(prefix.as_bytes());
    framed.push(OBJECT_NULL_BYTE);
    framed.extend_from_slice(content);
    Object::new(framed)
}

/// Split framed bytes into the object type and inner content.
pub fn split_object(framed: &[u8]) -> Result<(ObjectType, &[u8])> {
    let nul = framed
        .iter()
        .position(|b| *b == OBJECT_NULL_BYTE)
        .ok_or_else(|| CoreError::MalformedObject("no separator found".into()))?;
    let header = std::str::from_utf8(&framed[..nul])
        .map_err(|_| CoreError::MalformedObject("header is not utf-8".into()))?;
    let (otype, length) = header
        .split_once(' ')
        .ok_or_else(|| CoreError::MalformedObject(format!("invalid header {header:?}")))?;
    let otype: ObjectType = otype.parse()?;
    let length: usize = length
        .parse()
        .map_err(|e| CoreError::MalformedObject(format!("invalid length: {e}")))?;

    let content = &framed[nul + 1..];
    if content.len() != length {
        return Err(CoreError::MalformedObject(format!(
            "content length mismatch: expected {length}, got {}",
            content.len()
        )));
    }
    Ok((otype, content))
}

/// Build the commit object for `commit`. Commits that would not parse back
/// are rejected.
pub fn create_commit_object(commit: &Commit) -> Result<Object> {
    commit.validate()?;
    Ok(frame_object(ObjectType::Commit, &commit.serialize()))
}

/// Build the tree object for `tree`. Empty trees are rejected.
pub fn create_tree_object(tree: &Tree) -> Result<Object> {
    if tree.is_empty() {
        return Err(CoreError::InvalidTree("tree has no entries".into()));
    }
    Ok(frame_object(ObjectType::Tree, &tree.serialize()))
}

/// Build the blob object for `data` described by `header`. Empty data is rejected.
pub fn create_blob_object(header: &ObjectHeader, data: &[u8]) -> Result<Object> {
    if data.is_empty() {
        return Err(CoreError::InvalidBlob("data is empty".into()));
    }
    Ok(frame_object(ObjectType::Blob, &serialize_blob(header, data)?))
}
