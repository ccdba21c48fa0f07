//! Versions and version constraints
//!
//! Versions are sequences of segments split at `.`, `-`, `_` and at every
//! boundary between digits and letters:
//! - `1.2.3` → `[1, 2, 3]`
//! - `10.03.p03` → `[10, 3, p, 3]`
//! - `2.0rc1` → `[2, 0, rc, 1]`
//!
//! Ordering compares segment by segment. Numbers compare numerically and
//! are newer than words; words compare lexically; the development names
//! `develop`, `main`, `master`, `head` and `trunk` are newer than anything
//! else. When one version is a prefix of the other the shorter one is
//! older, so `1.2 < 1.2.0`.
//!
//! Constraints are unions of exact versions and inclusive ranges:
//! - `1.2` - exactly 1.2
//! - `1.2:1.4` - from 1.2 up to and including every 1.4.x
//! - `:1.4` / `1.2:` / `:` - half-open and unbounded ranges
//! - `1.0,1.2:1.4` - union

use serde::{Deserialize, Serialize};
use spackle_errors::VersionError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Development branch names, oldest first
const INFINITY_NAMES: [&str; 5] = ["trunk", "head", "master", "main", "develop"];

/// One component of a version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Segment {
    Word(String),
    Number(u64),
    Infinity(u8),
}

/// A package version
#[derive(Debug, Clone)]
pub struct Version {
    text: String,
    segments: Vec<Segment>,
}

impl Version {
    /// Parse a version string
    ///
    /// # Errors
    ///
    /// Returns `VersionError::InvalidVersion` for empty input or characters
    /// outside `[A-Za-z0-9._-]`, and `SegmentOverflow` for numbers that do
    /// not fit in 64 bits.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let text = input.trim();
        if text.is_empty()
            || !text
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        {
            return Err(VersionError::InvalidVersion {
                input: input.to_string(),
            });
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            let boundary = match current.chars().last() {
                Some(prev) => {
                    !c.is_ascii_alphanumeric() || prev.is_ascii_digit() != c.is_ascii_digit()
                }
                None => false,
            };
            if boundary {
                push_segment(&mut segments, &current)?;
                current.clear();
            }
            if c.is_ascii_alphanumeric() {
                current.push(c);
            }
        }
        push_segment(&mut segments, &current)?;

        if segments.is_empty() {
            return Err(VersionError::InvalidVersion {
                input: input.to_string(),
            });
        }

        Ok(Self {
            text: text.to_string(),
            segments,
        })
    }

    /// The version as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `prefix`'s segments are a leading subsequence of ours
    ///
    /// `1.2.3` has prefix `1.2`, and every version has itself as prefix.
    #[must_use]
    pub fn has_prefix(&self, prefix: &Version) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Segments joined by `.`, the form equal versions share
    ///
    /// `1.02`, `1-2` and `1.2` all canonicalize to `1.2`.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Word(word) => word.clone(),
                Segment::Number(n) => n.to_string(),
                Segment::Infinity(rank) => INFINITY_NAMES
                    .get(usize::from(*rank))
                    .map_or_else(String::new, |name| (*name).to_string()),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Whether this is one of the development names such as `develop`
    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self.segments.first(), Some(Segment::Infinity(_)))
    }
}

fn push_segment(segments: &mut Vec<Segment>, raw: &str) -> Result<(), VersionError> {
    if raw.is_empty() {
        return Ok(());
    }
    let segment = if raw.chars().all(|c| c.is_ascii_digit()) {
        Segment::Number(raw.parse().map_err(|_| VersionError::SegmentOverflow {
            segment: raw.to_string(),
        })?)
    } else if let Some(rank) = INFINITY_NAMES.iter().position(|name| *name == raw) {
        Segment::Infinity(u8::try_from(rank).unwrap_or(u8::MAX))
    } else {
        Segment::Word(raw.to_string())
    };
    segments.push(segment);
    Ok(())
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Inclusive range of versions; a missing bound is unbounded
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    lo: Option<Version>,
    hi: Option<Version>,
}

impl VersionRange {
    /// Create a range from optional bounds
    #[must_use]
    pub fn new(lo: Option<Version>, hi: Option<Version>) -> Self {
        Self { lo, hi }
    }

    /// Lower bound
    #[must_use]
    pub fn lo(&self) -> Option<&Version> {
        self.lo.as_ref()
    }

    /// Upper bound
    #[must_use]
    pub fn hi(&self) -> Option<&Version> {
        self.hi.as_ref()
    }

    /// Check whether a version lies in the range
    ///
    /// The upper bound admits its own extensions: `:1.4` contains `1.4.2`.
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        let above = self.lo.as_ref().is_none_or(|lo| version >= lo);
        let below = self
            .hi
            .as_ref()
            .is_none_or(|hi| version <= hi || version.has_prefix(hi));
        above && below
    }

    fn is_empty(&self) -> bool {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) => lo > hi && !lo.has_prefix(hi),
            _ => false,
        }
    }

    fn intersection(&self, other: &Self) -> Option<Self> {
        let lo = match (&self.lo, &other.lo) {
            (Some(a), Some(b)) => Some(a.max(b).clone()),
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        };
        let hi = match (&self.hi, &other.hi) {
            (Some(a), Some(b)) => Some(tighter_upper(a, b).clone()),
            (Some(a), None) | (None, Some(a)) => Some(a.clone()),
            (None, None) => None,
        };
        let range = Self { lo, hi };
        (!range.is_empty()).then_some(range)
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        let lo_ok = match (&self.lo, &other.lo) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(mine), Some(theirs)) => mine >= theirs,
        };
        let hi_ok = match (&self.hi, &other.hi) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(mine), Some(theirs)) => mine <= theirs || mine.has_prefix(theirs),
        };
        lo_ok && hi_ok
    }

    /// Ranges that overlap or touch can be merged into one
    fn overlaps(&self, other: &Self) -> bool {
        self.intersection(other).is_some()
    }

    fn merge(&self, other: &Self) -> Self {
        let lo = match (&self.lo, &other.lo) {
            (Some(a), Some(b)) => Some(a.min(b).clone()),
            _ => None,
        };
        let hi = match (&self.hi, &other.hi) {
            (Some(a), Some(b)) => Some(looser_upper(a, b).clone()),
            _ => None,
        };
        Self { lo, hi }
    }
}

fn tighter_upper<'a>(a: &'a Version, b: &'a Version) -> &'a Version {
    if a.has_prefix(b) {
        a
    } else if b.has_prefix(a) {
        b
    } else {
        a.min(b)
    }
}

fn looser_upper<'a>(a: &'a Version, b: &'a Version) -> &'a Version {
    if a.has_prefix(b) {
        b
    } else if b.has_prefix(a) {
        a
    } else {
        a.max(b)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(lo) = &self.lo {
            write!(f, "{lo}")?;
        }
        f.write_str(":")?;
        if let Some(hi) = &self.hi {
            write!(f, "{hi}")?;
        }
        Ok(())
    }
}

/// One member of a version list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionItem {
    Exact(Version),
    Range(VersionRange),
}

impl VersionItem {
    fn contains(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => v == version,
            Self::Range(r) => r.contains(version),
        }
    }

    fn lower(&self) -> Option<&Version> {
        match self {
            Self::Exact(v) => Some(v),
            Self::Range(r) => r.lo(),
        }
    }

    fn intersection(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => (a == b).then(|| Self::Exact(a.clone())),
            (Self::Exact(v), Self::Range(r)) | (Self::Range(r), Self::Exact(v)) => {
                r.contains(v).then(|| Self::Exact(v.clone()))
            }
            (Self::Range(a), Self::Range(b)) => a.intersection(b).map(Self::Range),
        }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(v), _) => other.contains(v),
            (Self::Range(_), Self::Exact(_)) => false,
            (Self::Range(a), Self::Range(b)) => a.is_subset_of(b),
        }
    }
}

impl fmt::Display for VersionItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "{v}"),
            Self::Range(r) => write!(f, "{r}"),
        }
    }
}

/// A normalized union of versions and ranges
///
/// The empty list is unsatisfiable; [`VersionList::any`] admits every version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionList {
    items: Vec<VersionItem>,
}

impl VersionList {
    /// The unconstrained list `:`
    #[must_use]
    pub fn any() -> Self {
        Self {
            items: vec![VersionItem::Range(VersionRange::new(None, None))],
        }
    }

    /// A list admitting exactly one version
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            items: vec![VersionItem::Exact(version)],
        }
    }

    /// A list holding a single range
    #[must_use]
    pub fn range(lo: Option<Version>, hi: Option<Version>) -> Self {
        Self::from_items(vec![VersionItem::Range(VersionRange::new(lo, hi))])
    }

    /// Build a list from items, normalizing it
    #[must_use]
    pub fn from_items(items: Vec<VersionItem>) -> Self {
        let mut list = Self { items };
        list.normalize();
        list
    }

    /// The normalized items
    #[must_use]
    pub fn items(&self) -> &[VersionItem] {
        &self.items
    }

    /// True for the unconstrained list
    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self.items.as_slice(), [VersionItem::Range(r)] if r.lo.is_none() && r.hi.is_none())
    }

    /// True when no version can satisfy the list
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The single version this list pins, if it pins one
    #[must_use]
    pub fn concrete(&self) -> Option<&Version> {
        match self.items.as_slice() {
            [VersionItem::Exact(v)] => Some(v),
            _ => None,
        }
    }

    /// Check if a version satisfies the list
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        self.items.iter().any(|item| item.contains(version))
    }

    /// Versions admitted by both lists
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut items = Vec::new();
        for mine in &self.items {
            for theirs in &other.items {
                if let Some(item) = mine.intersection(theirs) {
                    items.push(item);
                }
            }
        }
        Self::from_items(items)
    }

    /// Whether at least one version could satisfy both lists
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersection(other).is_empty()
    }

    /// Whether every version admitted by `self` is admitted by `other`
    #[must_use]
    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.items
            .iter()
            .all(|mine| other.items.iter().any(|theirs| mine.is_subset_of(theirs)))
    }

    /// Versions admitted by either list
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut items = self.items.clone();
        items.extend(other.items.iter().cloned());
        Self::from_items(items)
    }

    fn normalize(&mut self) {
        let mut ranges = Vec::new();
        let mut exacts = Vec::new();
        for item in std::mem::take(&mut self.items) {
            match item {
                VersionItem::Range(r) if !r.is_empty() => ranges.push(r),
                VersionItem::Range(_) => {}
                VersionItem::Exact(v) => exacts.push(v),
            }
        }

        // Unbounded lower ends sort first
        ranges.sort_by(|a, b| a.lo.cmp(&b.lo));
        let mut merged: Vec<VersionRange> = Vec::with_capacity(ranges.len());
        for range in ranges {
            match merged.last_mut() {
                Some(prev) if prev.overlaps(&range) => *prev = prev.merge(&range),
                _ => merged.push(range),
            }
        }

        exacts.sort();
        exacts.dedup();
        exacts.retain(|v| !merged.iter().any(|r| r.contains(v)));

        self.items = merged
            .into_iter()
            .map(VersionItem::Range)
            .chain(exacts.into_iter().map(VersionItem::Exact))
            .collect();
        self.items.sort_by(|a, b| a.lower().cmp(&b.lower()));
    }
}

impl Default for VersionList {
    fn default() -> Self {
        Self::any()
    }
}

impl FromStr for VersionList {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::InvalidConstraint {
                input: s.to_string(),
            });
        }

        let mut items = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(VersionError::InvalidConstraint {
                    input: s.to_string(),
                });
            }
            let item = match part.split_once(':') {
                Some((lo, hi)) => {
                    if hi.contains(':') {
                        return Err(VersionError::InvalidConstraint {
                            input: s.to_string(),
                        });
                    }
                    let lo = (!lo.is_empty()).then(|| Version::parse(lo)).transpose()?;
                    let hi = (!hi.is_empty()).then(|| Version::parse(hi)).transpose()?;
                    VersionItem::Range(VersionRange::new(lo, hi))
                }
                None => VersionItem::Exact(Version::parse(part)?),
            };
            items.push(item);
        }

        Ok(Self::from_items(items))
    }
}

impl fmt::Display for VersionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strs: Vec<_> = self.items.iter().map(ToString::to_string).collect();
        write!(f, "{}", strs.join(","))
    }
}

impl Serialize for VersionList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
