//! Dotted pattern helpers.
//!
//! A pattern is a `.`-separated list of segments; a segment equal to `*` is
//! a wildcard that stands for exactly one concrete segment.

use regex_lite::Regex;
use serde_json::Value;

use crate::Mapping;

/// The wildcard segment.
pub const WILDCARD: &str = "*";

/// Segment separator.
pub const SEPARATOR: char = '.';

/// Indices of the wildcard segments in `pattern`.
pub fn wildcard_positions(pattern: &str) -> Vec<usize> {
    pattern
        .split(SEPARATOR)
        .enumerate()
        .filter(|(_, segment)| *segment == WILDCARD)
        .map(|(index, _)| index)
        .collect()
}

/// Whether `pattern` contains at least one wildcard segment.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.split(SEPARATOR).any(|segment| segment == WILDCARD)
}

/// Default ordering weight: `(segments - wildcards) * 100`.
///
/// More concrete patterns get a higher weight and are expanded first.
pub fn concreteness(pattern: &str) -> i64 {
    let (segments, wildcards) = pattern
        .split(SEPARATOR)
        .fold((0i64, 0i64), |(segments, wildcards), segment| {
            (segments + 1, wildcards + i64::from(segment == WILDCARD))
        });
    (segments - wildcards) * 100
}

/// Anchored regex matching any pattern with the same shape.
///
/// Literal segments match themselves, `*` matches one segment (including a
/// literal `*`, so rule patterns can be matched against wildcard patterns).
pub fn to_regex(pattern: &str) -> Result<Regex, regex_lite::Error> {
    let body = pattern
        .split(SEPARATOR)
        .map(|segment| {
            if segment == WILDCARD {
                "[^.]+".to_string()
            } else {
                regex_lite::escape(segment)
            }
        })
        .collect::<Vec<_>>()
        .join(r"\.");
    Regex::new(&format!("^{}$", body))
}

/// Replace the segments at `positions` with `items`, in order.
pub fn fill(pattern: &str, positions: &[usize], items: &[String]) -> String {
    let mut segments: Vec<&str> = pattern.split(SEPARATOR).collect();
    for (position, item) in positions.iter().zip(items) {
        if let Some(slot) = segments.get_mut(*position) {
            *slot = item.as_str();
        }
    }
    segments.join(".")
}

/// Cartesian product of `lists`, first list varying slowest.
///
/// Any empty list yields an empty product.
pub fn cartesian(lists: &[Vec<String>]) -> Vec<Vec<String>> {
    if lists.is_empty() || lists.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let mut product = Vec::with_capacity(product_len(lists).unwrap_or(0));
    let mut cursor = vec![0usize; lists.len()];

    loop {
        product.push(
            cursor
                .iter()
                .zip(lists)
                .map(|(&index, list)| list[index].clone())
                .collect(),
        );

        // odometer increment, last position fastest
        let mut position = lists.len();
        loop {
            if position == 0 {
                return product;
            }
            position -= 1;
            cursor[position] += 1;
            if cursor[position] < lists[position].len() {
                break;
            }
            cursor[position] = 0;
        }
    }
}

/// Number of tuples in the product of `lists`, or `None` if it overflows `usize`.
fn product_len(lists: &[Vec<String>]) -> Option<usize> {
    lists
        .iter()
        .try_fold(1usize, |acc, list| acc.checked_mul(list.len()))
}

/// The single-entry mapping `{pattern: value}`.
pub fn identity(pattern: &str, value: &Value) -> Mapping {
    let mut mapping = Mapping::new();
    mapping.insert(pattern.to_string(), value.clone());
    mapping
}
