//! Tree objects: the snapshot listing a commit points at.

use crate::error::{CoreError, Result};
use crate::object::ObjectType;
use crate::types::Oid;

const FIELD_COUNT: usize = 9;
const DEFAULT_PARTITION: &str = "/";

/// One line of a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub partition: String,
    pub otype: ObjectType,
    pub oid: Oid,
    pub name: String,
    pub code_id: String,
    pub code_type: String,
    pub language: String,
    pub language_version: String,
    pub language_type: String,
}

impl TreeEntry {
    /// Create an entry. Text fields must be non-empty and free of whitespace;
    /// an empty partition becomes `/`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        partition: &str,
        otype: ObjectType,
        oid: Oid,
        name: &str,
        code_id: &str,
        code_type: &str,
        language: &str,
        language_version: &str,
        language_type: &str,
    ) -> Result<Self> {
        let partition = if partition.trim().is_empty() {
            DEFAULT_PARTITION
        } else {
            partition
        };
        for (label, value) in [
            ("partition", partition),
            ("name", name),
            ("code id", code_id),
            ("code type", code_type),
            ("language", language),
            ("language version", language_version),
            ("language type", language_type),
        ] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(CoreError::InvalidTree(format!("invalid {label} {value:?}")));
            }
        }
        Ok(Self {
            partition: partition.to_string(),
            otype,
            oid,
            name: name.to_string(),
            code_id: code_id.to_string(),
            code_type: code_type.to_string(),
            language: language.to_string(),
            language_version: language_version.to_string(),
            language_type: language_type.to_string(),
        })
    }

    fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {}",
            self.otype,
            self.partition,
            self.oid,
            self.name,
            self.code_id,
            self.code_type,
            self.language,
            self.language_version,
            self.language_type
        )
    }

    fn parse_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.splitn(FIELD_COUNT, ' ').collect();
        if parts.len() != FIELD_COUNT {
            return Err(CoreError::InvalidTree(format!("invalid entry format: {line:?}")));
        }
        Ok(Self {
            otype: parts[0].parse()?,
            partition: parts[1].to_string(),
            oid: parts[2].parse()?,
            name: parts[3].to_string(),
            code_id: parts[4].to_string(),
            code_type: parts[5].to_string(),
            language: parts[6].to_string(),
            language_version: parts[7].to_string(),
            language_type: parts[8].to_string(),
        })
    }
}

/// An ordered set of entries. Serialized sorted by OID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Names and `(code_id, code_type)` pairs must be unique.
    pub fn add_entry(&mut self, entry: TreeEntry) -> Result<()> {
        let duplicate = self.entries.iter().any(|e| {
            e.name == entry.name || (e.code_id == entry.code_id && e.code_type == entry.code_type)
        });
        if duplicate {
            return Err(CoreError::InvalidTree(format!(
                "entry {:?} already exists",
                entry.name
            )));
        }
        self.entries.push(entry);
        self.entries.sort_by(|a, b| a.oid.cmp(&b.oid));
        Ok(())
    }

    pub fn entries(&self) -> &[TreeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.entries
            .iter()
            .map(TreeEntry::to_line)
            .collect::<Vec<_>>()
            .join("\n")
            .into_bytes()
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| CoreError::InvalidTree("content is not utf-8".into()))?;
        let entries = text
            .trim()
            .lines()
            .map(TreeEntry::parse_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, oid: Oid) -> TreeEntry {
        TreeEntry::new(
            "", ObjectType::Blob, oid, name, name, "policy", "cedar", "0.0+", "policy",
        )
        .unwrap()
    }

    #[test]
    fn test_entries_sorted_by_oid() {
        let mut tree = Tree::new();
        tree.add_entry(entry("b", Oid::from_bytes([9; 32]))).unwrap();
        tree.add_entry(entry("a", Oid::from_bytes([1; 32]))).unwrap();

        let names: Vec<_> = tree.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let text = String::from_utf8(tree.serialize()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with(&format!("blob / {} a ", Oid::from_bytes([1; 32]))));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn test_parse_roundtrip() {
        let mut tree = Tree::new();
        tree.add_entry(entry("x", Oid::hash(b"x"))).unwrap();
        tree.add_entry(entry("y", Oid::hash(b"y"))).unwrap();
        assert_eq!(Tree::parse(&tree.serialize()).unwrap(), tree);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut tree = Tree::new();
        tree.add_entry(entry("x", Oid::hash(b"1"))).unwrap();
        assert!(tree.add_entry(entry("x", Oid::hash(b"2"))).is_err());

        let mut same_code = entry("z", Oid::hash(b"3"));
        same_code.code_id = "x".into();
        assert!(tree.add_entry(same_code).is_err());
    }

    #[test]
    fn test_invalid_fields_rejected() {
        assert!(TreeEntry::new(
            "/", ObjectType::Blob, Oid::ZERO, "has space", "c", "t", "l", "v", "t"
        )
        .is_err());
        assert!(TreeEntry::new("/", ObjectType::Blob, Oid::ZERO, "n", "", "t", "l", "v", "t")
            .is_err());
    }

    #[test]
    fn test_parse_rejects_short_lines() {
        assert!(Tree::parse(b"blob / abc name").is_err());
    }
}
