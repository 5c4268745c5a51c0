/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Suffix array construction by prefix doubling: O(n log^2 n), no external
//! crate or native library needed. `text` is expected to end with the `\0`
//! sentinel the FM-index treats as smallest.

use std::cmp::Ordering;

/// Returns the suffix array of `text`: `sa[i]` is the starting offset of the
/// `i`-th lexicographically smallest suffix. `sa.len() == text.len()`.
pub fn build(text: &[u8]) -> Vec<u64> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }

    let mut sa: Vec<u64> = (0..n as u64).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| b as i64).collect();
    let mut tmp = vec![0i64; n];
    let mut k = 1usize;

    let key_at = |rank: &[i64], i: usize, k: usize| -> i64 {
        if i + k < n {
            rank[i + k]
        } else {
            -1
        }
    };
    let cmp = |rank: &[i64], a: u64, b: u64, k: usize| -> Ordering {
        let (a, b) = (a as usize, b as usize);
        rank[a].cmp(&rank[b]).then_with(|| key_at(rank, a, k).cmp(&key_at(rank, b, k)))
    };

    loop {
        sa.sort_by(|&a, &b| cmp(&rank, a, b, k));

        tmp[sa[0] as usize] = 0;
        for i in 1..n {
            let bump = if cmp(&rank, sa[i - 1], sa[i], k) == Ordering::Less { 1 } else { 0 };
            tmp[sa[i] as usize] = tmp[sa[i - 1] as usize] + bump;
        }
        rank.copy_from_slice(&tmp);

        if rank[sa[n - 1] as usize] as usize == n - 1 || k >= n {
            break;
        }
        k *= 2;
    }

    sa
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_sa(text: &[u8]) -> Vec<u64> {
        let n = text.len();
        let mut idx: Vec<u64> = (0..n as u64).collect();
        idx.sort_by(|&a, &b| text[a as usize..].cmp(&text[b as usize..]));
        idx
    }

    #[test]
    fn matches_naive_construction() {
        for text in [&b"banana\0"[..], b"mississippi\0", b"aaaaaa\0", b"\0", b"ab\0ab\0"] {
            assert_eq!(build(text), naive_sa(text), "text={:?}", text);
        }
    }
}
