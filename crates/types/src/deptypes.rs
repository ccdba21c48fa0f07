//! Dependency types: when a dependency is needed

use serde::{Deserialize, Serialize};
use spackle_errors::ParseError;
use std::fmt;
use std::str::FromStr;

/// A set of `build`, `link`, `run` and `test`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepTypes(u8);

const NAMES: [(&str, DepTypes); 4] = [
    ("build", DepTypes::BUILD),
    ("link", DepTypes::LINK),
    ("run", DepTypes::RUN),
    ("test", DepTypes::TEST),
];

impl DepTypes {
    pub const BUILD: Self = Self(1);
    pub const LINK: Self = Self(1 << 1);
    pub const RUN: Self = Self(1 << 2);
    pub const TEST: Self = Self(1 << 3);
    pub const NONE: Self = Self(0);

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Needed only to run the package's tests
    #[must_use]
    pub const fn is_test_only(self) -> bool {
        self.0 == Self::TEST.0
    }

    /// Type names in canonical order
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        NAMES
            .into_iter()
            .filter(move |(_, t)| self.contains(*t))
            .map(|(name, _)| name)
    }
}

impl Default for DepTypes {
    fn default() -> Self {
        Self::BUILD.union(Self::LINK)
    }
}

impl std::ops::BitOr for DepTypes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for DepTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.names().collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for DepTypes {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut types = Self::NONE;
        let mut offset = 0;
        for part in s.split(',') {
            let name = part.trim();
            let found = NAMES.iter().find(|(n, _)| *n == name).map(|(_, t)| *t);
            match found {
                Some(t) => types = types | t,
                None => {
                    return Err(ParseError::new(
                        format!("unknown dependency type '{name}'"),
                        s,
                        offset,
                    ))
                }
            }
            offset += part.len() + 1;
        }
        Ok(types)
    }
}

impl Serialize for DepTypes {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DepTypes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
