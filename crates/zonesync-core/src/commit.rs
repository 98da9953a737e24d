//! Commit objects.
//!
//! Text layout:
//!
//! ```text
//! tree <oid>
//! parent <oid>
//! author <unix-secs> <name>
//! committer <unix-secs> <name>
//! <message, possibly spanning lines>
//! ```

use crate::error::{CoreError, Result};
use crate::types::Oid;

const UNKNOWN_IDENTITY: &str = "unknown";

/// A commit: a tree snapshot plus its parent and authorship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Oid,
    pub parent: Oid,
    pub author: String,
    pub author_timestamp: i64,
    pub committer: String,
    pub committer_timestamp: i64,
    pub message: String,
}

impl Commit {
    /// Create a commit. Blank identities become `"unknown"`.
    pub fn new(
        tree: Oid,
        parent: Oid,
        author: &str,
        author_timestamp: i64,
        committer: &str,
        committer_timestamp: i64,
        message: &str,
    ) -> Self {
        Self {
            tree,
            parent,
            author: identity_or_unknown(author),
            author_timestamp,
            committer: identity_or_unknown(committer),
            committer_timestamp,
            message: message.to_string(),
        }
    }

    /// Check that the commit serializes to text [`Commit::parse`] reads back.
    ///
    /// Identities sit on a single line each, so they must not contain `'\n'`.
    pub fn validate(&self) -> Result<()> {
        for (label, name) in [("author", &self.author), ("committer", &self.committer)] {
            if name.contains('\n') {
                return Err(CoreError::InvalidCommit(format!(
                    "{label} {name:?} spans lines"
                )));
            }
        }
        Ok(())
    }

    /// True for the first commit of a ledger.
    pub fn is_root(&self) -> bool {
        self.parent.is_zero()
    }

    pub fn serialize(&self) -> Vec<u8> {
        format!(
            "tree {}\nparent {}\nauthor {} {}\ncommitter {} {}\n{}",
            self.tree,
            self.parent,
            self.author_timestamp,
            self.author,
            self.committer_timestamp,
            self.committer,
            self.message
        )
        .into_bytes()
    }

    /// Parse commit content produced by [`Commit::serialize`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| CoreError::InvalidCommit("content is not utf-8".into()))?;
        let mut lines = text.splitn(5, '\n');

        let tree = field(lines.next(), "tree ")?;
        let parent = field(lines.next(), "parent ")?;
        let (author_timestamp, author) = identity(field(lines.next(), "author ")?)?;
        let (committer_timestamp, committer) = identity(field(lines.next(), "committer ")?)?;
        let message = lines.next().unwrap_or_default();

        Ok(Self {
            tree: tree.parse()?,
            parent: parent.parse()?,
            author: author.to_string(),
            author_timestamp,
            committer: committer.to_string(),
            committer_timestamp,
            message: message.to_string(),
        })
    }
}

fn identity_or_unknown(name: &str) -> String {
    if name.trim().is_empty() {
        UNKNOWN_IDENTITY.to_string()
    } else {
        name.to_string()
    }
}

fn field<'a>(line: Option<&'a str>, prefix: &str) -> Result<&'a str> {
    line.and_then(|l| l.strip_prefix(prefix))
        .ok_or_else(|| CoreError::InvalidCommit(format!("missing {:?} line", prefix.trim_end())))
}

fn identity(value: &str) -> Result<(i64, &str)> {
    let (timestamp, name) = value
        .split_once(' ')
        .ok_or_else(|| CoreError::InvalidCommit(format!("invalid identity {value:?}")))?;
    let timestamp = timestamp
        .parse()
        .map_err(|_| CoreError::InvalidCommit(format!("invalid timestamp {timestamp:?}")))?;
    Ok((timestamp, name))
}
