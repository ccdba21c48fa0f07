//! Matching abstract queries against installed concrete specs

use spackle_errors::{Error, QueryError};
use spackle_hash::{Hash, SHORT_HASH_LEN};
use spackle_spec::{ConcreteSpec, Spec};
use std::collections::HashSet;

/// Node format used when listing ambiguous matches
const MATCH_FORMAT: &str = "$_$@$%@$=";

/// Pick the single candidate that satisfies `query`
///
/// Candidates with the same full hash count once.
///
/// # Errors
///
/// Returns `QueryError::NoMatch` when nothing matches and
/// `QueryError::Ambiguous` listing every match when more than one does.
pub fn disambiguate<'a, I>(query: &Spec, candidates: I) -> Result<&'a ConcreteSpec, Error>
where
    I: IntoIterator<Item = &'a ConcreteSpec>,
{
    let mut seen = HashSet::new();
    let mut matches: Vec<&ConcreteSpec> = candidates
        .into_iter()
        .filter(|spec| spec.satisfies(query))
        .filter(|spec| seen.insert(spec.hash()))
        .collect();

    match matches.len() {
        0 => Err(QueryError::NoMatch {
            query: query.to_string(),
        }
        .into()),
        1 => Ok(matches[0]),
        _ => {
            matches.sort_by(|a, b| {
                let (ra, rb) = (&a.root().data, &b.root().data);
                (&ra.name, &ra.version, a.hash()).cmp(&(&rb.name, &rb.version, b.hash()))
            });
            let hashes: Vec<Hash> = matches.iter().map(|m| m.hash()).collect();
            let len = distinguishing_prefix(&hashes);

            let mut listed = Vec::with_capacity(matches.len());
            for spec in matches {
                listed.push(format!("{} {}", spec.dag_hash(Some(len)), spec.format(MATCH_FORMAT)?));
            }
            Err(QueryError::Ambiguous {
                query: query.to_string(),
                matches: listed,
            }
            .into())
        }
    }
}

/// Shortest hex prefix length, at least the short-hash length, that is
/// unique among `hashes`
#[must_use]
pub fn distinguishing_prefix(hashes: &[Hash]) -> usize {
    let full: Vec<String> = hashes.iter().map(Hash::to_hex).collect();
    let max = full.first().map_or(SHORT_HASH_LEN, String::len);
    (SHORT_HASH_LEN..max)
        .find(|&len| {
            let mut prefixes = HashSet::new();
            full.iter().all(|hex| prefixes.insert(&hex[..len]))
        })
        .unwrap_or(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash_with_prefix(prefix: &str) -> Hash {
        let mut hex = prefix.to_string();
        hex.extend(std::iter::repeat_n('0', 64 - prefix.len()));
        Hash::from_hex(&hex).unwrap()
    }

    #[test]
    fn test_prefix_never_below_seven() {
        let hashes = [hash_with_prefix("a"), hash_with_prefix("b")];
        assert_eq!(distinguishing_prefix(&hashes), 7);
    }

    #[test]
    fn test_prefix_grows_until_unique() {
        let hashes = [
            hash_with_prefix("abcdef012"),
            hash_with_prefix("abcdef013"),
            hash_with_prefix("ffffffff"),
        ];
        assert_eq!(distinguishing_prefix(&hashes), 9);
    }

    #[test]
    fn test_single_hash() {
        assert_eq!(distinguishing_prefix(&[hash_with_prefix("1")]), 7);
    }
}
