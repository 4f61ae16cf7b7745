//! Bitset-flag attribute values.
//!
//! A [`FlagType`] declares the member names of one flag vocabulary; a
//! [`FlagValue`] is a compact bitset over those members. The database
//! representation is the comma-separated member-name encoding.

use std::sync::Arc;

use moneta_core::error::{Error, Result};

/// A declared flag vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagType {
    name: String,
    members: Vec<String>,
}

impl FlagType {
    /// Declare a flag type with its member names.
    pub fn new(name: impl Into<String>, members: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members: members.iter().map(|m| (*m).to_string()).collect(),
        })
    }

    /// The vocabulary name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared member names, in declaration order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// A value with no members set.
    pub fn empty(self: &Arc<Self>) -> FlagValue {
        FlagValue {
            flag_type: Arc::clone(self),
            bits: 0,
        }
    }

    /// A value with exactly one member set.
    pub fn flag(self: &Arc<Self>, member: &str) -> Result<FlagValue> {
        let idx = self.member_index(member)?;
        Ok(FlagValue {
            flag_type: Arc::clone(self),
            bits: 1 << idx,
        })
    }

    /// Decode a comma-separated member-name string.
    pub fn decode(self: &Arc<Self>, text: &str) -> Result<FlagValue> {
        let mut bits = 0u64;
        for part in text.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            bits |= 1 << self.member_index(part)?;
        }
        Ok(FlagValue {
            flag_type: Arc::clone(self),
            bits,
        })
    }

    fn member_index(&self, member: &str) -> Result<usize> {
        self.members
            .iter()
            .position(|m| m == member)
            .ok_or_else(|| {
                Error::validation(format!(
                    "'{member}' is not a member of flag type '{}'",
                    self.name
                ))
            })
    }
}

/// A bitset over one flag vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagValue {
    flag_type: Arc<FlagType>,
    bits: u64,
}

impl FlagValue {
    /// The vocabulary this value belongs to.
    pub fn flag_type(&self) -> &Arc<FlagType> {
        &self.flag_type
    }

    /// True when `member` is set.
    pub fn contains(&self, member: &str) -> bool {
        match self.flag_type.member_index(member) {
            Ok(idx) => self.bits & (1 << idx) != 0,
            Err(_) => false,
        }
    }

    /// Set `member`.
    pub fn insert(&mut self, member: &str) -> Result<()> {
        let idx = self.flag_type.member_index(member)?;
        self.bits |= 1 << idx;
        Ok(())
    }

    /// Clear `member`.
    pub fn remove(&mut self, member: &str) -> Result<()> {
        let idx = self.flag_type.member_index(member)?;
        self.bits &= !(1 << idx);
        Ok(())
    }

    /// True when no member is set.
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// The comma-separated member-name encoding stored in the database.
    pub fn encode(&self) -> String {
        self.flag_type
            .members
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.bits & (1 << idx) != 0)
            .map(|(_, name)| name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}
