//! Take and file numbering policy
//!
//! Pure functions deciding what a valid take/file number is, how numbers are
//! ordered, and how numeric ranges are expanded, split and searched for gaps.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use thiserror::Error;

/// Highest take or file number a slate can carry
pub const MAX_NUMBER: u32 = 9999;

#[derive(Debug, Error, PartialEq)]
pub enum NumberingError {
    #[error("Invalid number: {0} (expected an integer between 1 and {max})", max = MAX_NUMBER)]
    InvalidNumber(String),

    #[error("Invalid range: {start}..{end}")]
    InvalidRange { start: u32, end: u32 },
}

/// Returns true if `n` is a usable take/file number
pub fn is_valid_number(n: i64) -> bool {
    (1..=MAX_NUMBER as i64).contains(&n)
}

/// Parses user input into a take/file number
pub fn parse_number(input: &str) -> Result<u32, NumberingError> {
    let trimmed = input.trim();
    match trimmed.parse::<i64>() {
        Ok(n) if is_valid_number(n) => Ok(n as u32),
        _ => Err(NumberingError::InvalidNumber(trimmed.to_string())),
    }
}

/// Numeric ascending order
pub fn compare(a: u32, b: u32) -> Ordering {
    a.cmp(&b)
}

/// Expands `start..=end` into the numbers it covers
pub fn expand_range(start: u32, end: u32) -> Result<Vec<u32>, NumberingError> {
    if !is_valid_number(start as i64) || !is_valid_number(end as i64) || start > end {
        return Err(NumberingError::InvalidRange { start, end });
    }
    Ok((start..=end).collect())
}

/// Smallest number `>= from` that is not already taken
///
/// Returns `None` when every number up to [`MAX_NUMBER`] is in use.
pub fn next_available(existing: &BTreeSet<u32>, from: u32) -> Option<u32> {
    let mut candidate = from.max(1);
    for &n in existing.range(candidate..) {
        if n != candidate {
            break;
        }
        candidate += 1;
    }
    (candidate <= MAX_NUMBER).then_some(candidate)
}

/// Splits a set of numbers into contiguous ascending runs
///
/// `[1, 2, 3, 5, 7, 8]` becomes `[1..=3, 5..=5, 7..=8]`.
pub fn split_runs(numbers: impl IntoIterator<Item = u32>) -> Vec<RangeInclusive<u32>> {
    let sorted: BTreeSet<u32> = numbers.into_iter().collect();
    let mut runs: Vec<RangeInclusive<u32>> = Vec::new();

    for n in sorted {
        match runs.last_mut() {
            Some(run) if *run.end() + 1 == n => *run = *run.start()..=n,
            _ => runs.push(n..=n),
        }
    }

    runs
}

/// Formats runs the way a logger writes them on a sheet: `1-3, 5, 7-8`
pub fn format_runs(runs: &[RangeInclusive<u32>]) -> String {
    runs.iter()
        .map(|r| {
            if r.start() == r.end() {
                r.start().to_string()
            } else {
                format!("{}-{}", r.start(), r.end())
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
