//! Column constraint flags as a compact bitset.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{Error, Result};

/// Constraint flags of one column definition.
///
/// Combinations are valid except the declared-incompatible ones, which are
/// rejected when the attribute is registered (see [`ColumnFlags::validate`]),
/// not at render time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ColumnFlags(u16);

impl ColumnFlags {
    /// No constraints.
    pub const NONE: Self = Self(0);
    /// NOT NULL.
    pub const NOT_NULL: Self = Self(1);
    /// PRIMARY KEY.
    pub const PRIMARY_KEY: Self = Self(1 << 1);
    /// Auto-incrementing value, only meaningful on a primary key.
    pub const AUTO_INCREMENT: Self = Self(1 << 2);
    /// Foreign key; the target table rides in the attribute's extra
    /// parameters.
    pub const FOREIGN_KEY: Self = Self(1 << 3);
    /// UNIQUE.
    pub const UNIQUE: Self = Self(1 << 4);
    /// DEFAULT with an explicit default expression.
    pub const DEFAULT: Self = Self(1 << 5);
    /// DEFAULT CURRENT_TIMESTAMP.
    pub const DEFAULT_CURRENT_TS: Self = Self(1 << 6);

    const ALL: [(Self, &'static str); 7] = [
        (Self::NOT_NULL, "not-null"),
        (Self::PRIMARY_KEY, "primary-key"),
        (Self::AUTO_INCREMENT, "auto-increment"),
        (Self::FOREIGN_KEY, "foreign-key"),
        (Self::UNIQUE, "unique"),
        (Self::DEFAULT, "default"),
        (Self::DEFAULT_CURRENT_TS, "default-current-timestamp"),
    ];

    /// True when every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when no flag is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Flags set in `self` but not in `other`.
    pub fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Iterate over the individual set flags.
    pub fn iter(self) -> impl Iterator<Item = ColumnFlags> {
        Self::ALL
            .into_iter()
            .filter_map(move |(flag, _)| self.contains(flag).then_some(flag))
    }

    /// Reject declared-incompatible combinations.
    ///
    /// Callers registering attribute descriptors are expected to run this
    /// once; render paths trust the flags.
    pub fn validate(self) -> Result<()> {
        if self.contains(Self::AUTO_INCREMENT) && !self.contains(Self::PRIMARY_KEY) {
            return Err(Error::validation(
                "auto-increment requires the primary-key flag",
            ));
        }
        if self.contains(Self::DEFAULT) && self.contains(Self::DEFAULT_CURRENT_TS) {
            return Err(Error::validation(
                "default and default-current-timestamp are mutually exclusive",
            ));
        }
        Ok(())
    }

    fn name(self) -> &'static str {
        Self::ALL
            .into_iter()
            .find_map(|(flag, name)| (flag == self).then_some(name))
            .unwrap_or("none")
    }
}

impl BitOr for ColumnFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ColumnFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for ColumnFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "ColumnFlags(none)");
        }
        let names: Vec<&str> = self.iter().map(ColumnFlags::name).collect();
        write!(f, "ColumnFlags({})", names.join("|"))
    }
}
