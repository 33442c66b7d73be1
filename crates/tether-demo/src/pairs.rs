//! Min/max difference pair computation.
//!
//! Given an array, find the ordered pair `(i, j)` with `i < j` that
//! minimizes the positive difference `arr[j] - arr[i]`, and the pair that
//! maximizes the drop `arr[i] - arr[j]`. Both run in O(n) via prefix/suffix
//! minimum scans. Ties resolve to the smallest first index, then the
//! smallest second index.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Smallest accepted array length.
pub const MIN_LEN: usize = 3;
/// Largest accepted array length.
pub const MAX_LEN: usize = 100_000;
/// Smallest accepted element value.
pub const MIN_ELEMENT: i64 = 1;
/// Largest accepted element value.
pub const MAX_ELEMENT: i64 = 100_000;

/// Input rejection reasons.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PairError {
    #[error("Input must be an array")]
    NotAnArray,

    #[error("Array length must be between {MIN_LEN} and {MAX_LEN}")]
    BadLength,

    #[error("Invalid element: {0}. Must be an integer between {MIN_ELEMENT} and {MAX_ELEMENT}")]
    BadElement(Value),

    #[error("Array must contain at least one increasing pair")]
    NoIncreasingPair,
}

/// The computed result, broadcast to every channel member.
///
/// Indices are 1-based for display.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PairResult {
    /// 1-based indices of the minimum-difference pair.
    pub min: [usize; 2],
    /// 1-based indices of the maximum-drop pair.
    pub max: [usize; 2],
    /// The validated input array.
    pub original_array: Vec<i64>,
    /// Values at the minimum-difference indices.
    pub min_values: [i64; 2],
    /// Values at the maximum-drop indices.
    pub max_values: [i64; 2],
    /// `arr[j] - arr[i]` for the minimum pair; always positive.
    pub min_difference: i64,
    /// `arr[i] - arr[j]` for the maximum pair; may be negative when the
    /// array is strictly increasing.
    pub max_difference: i64,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Parse an opaque JSON payload into a validated integer array.
pub fn parse_array(payload: &Value) -> Result<Vec<i64>, PairError> {
    let Value::Array(items) = payload else {
        return Err(PairError::NotAnArray);
    };
    if items.len() < MIN_LEN || items.len() > MAX_LEN {
        return Err(PairError::BadLength);
    }
    let mut arr = Vec::with_capacity(items.len());
    for item in items {
        let n = item
            .as_i64()
            .filter(|n| (MIN_ELEMENT..=MAX_ELEMENT).contains(n))
            .ok_or_else(|| PairError::BadElement(item.clone()))?;
        arr.push(n);
    }
    Ok(arr)
}

/// Validate, compute both pairs, and assemble the result.
pub fn calculate_pairs(payload: &Value) -> Result<PairResult, PairError> {
    let arr = parse_array(payload)?;

    let (min_i, min_j) = compute_min_pair(&arr).ok_or(PairError::NoIncreasingPair)?;
    let (max_i, max_j) = compute_max_pair(&arr).ok_or(PairError::BadLength)?;

    Ok(PairResult {
        min: [min_i + 1, min_j + 1],
        max: [max_i + 1, max_j + 1],
        min_values: [arr[min_i], arr[min_j]],
        max_values: [arr[max_i], arr[max_j]],
        min_difference: arr[min_j] - arr[min_i],
        max_difference: arr[max_i] - arr[max_j],
        original_array: arr,
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

/// The pair `(i, j)`, `i < j`, minimizing `arr[j] - arr[i]` over positive
/// differences. `None` when the array is non-increasing throughout or has
/// fewer than two elements.
///
/// Prefix scan: for each `j`, the best `i` is the index of the minimum
/// value left of `j` (earliest such index on ties).
pub fn compute_min_pair(arr: &[i64]) -> Option<(usize, usize)> {
    if arr.len() < 2 {
        return None;
    }
    let mut min_left = Vec::with_capacity(arr.len());
    min_left.push((arr[0], 0usize));
    for (j, &v) in arr.iter().enumerate().skip(1) {
        let prev = min_left[j - 1];
        min_left.push(if v < prev.0 { (v, j) } else { prev });
    }

    let mut best: Option<(i64, usize, usize)> = None;
    for j in 1..arr.len() {
        let (left_value, left_index) = min_left[j - 1];
        let diff = arr[j] - left_value;
        if diff <= 0 {
            continue;
        }
        best = match best {
            None => Some((diff, left_index, j)),
            Some((best_diff, bi, bj)) => {
                if diff < best_diff
                    || (diff == best_diff && (left_index < bi || (left_index == bi && j < bj)))
                {
                    Some((diff, left_index, j))
                } else {
                    Some((best_diff, bi, bj))
                }
            }
        };
    }
    best.map(|(_, i, j)| (i, j))
}

/// The pair `(i, j)`, `i < j`, maximizing `arr[i] - arr[j]`.
///
/// Suffix scan: for each `i`, the best `j` is the index of the minimum
/// value right of `i` (earliest such index on ties). Defined for any
/// array of two or more elements; `None` below that.
pub fn compute_max_pair(arr: &[i64]) -> Option<(usize, usize)> {
    let n = arr.len();
    if n < 2 {
        return None;
    }
    let mut min_right = vec![(0i64, 0usize); n];
    min_right[n - 1] = (arr[n - 1], n - 1);
    for i in (0..n - 1).rev() {
        let next = min_right[i + 1];
        min_right[i] = if arr[i] <= next.0 { (arr[i], i) } else { next };
    }

    let mut best = (i64::MIN, 0usize, 0usize);
    for (i, &v) in arr.iter().enumerate().take(n - 1) {
        let (right_value, right_index) = min_right[i + 1];
        let diff = v - right_value;
        let better = diff > best.0
            || (diff == best.0 && (i < best.1 || (i == best.1 && right_index < best.2)));
        if better {
            best = (diff, i, right_index);
        }
    }
    Some((best.1, best.2))
}
