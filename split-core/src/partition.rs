use std::ops::Range;

use crate::error::{Result, SplitError};

/// Contiguous byte range of the source destined for one bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkRange {
    pub bucket: usize,
    pub start: u64,
    pub end: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_usize_range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }
}

/// Split `len` bytes into `fan_out` contiguous ranges of `ceil(len / fan_out)` bytes.
///
/// Trailing ranges that would start past the end clamp to `[len, len)`, so small
/// inputs yield empty chunks rather than inverted ranges.
pub fn partition(len: u64, fan_out: usize) -> Result<Vec<ChunkRange>> {
    if fan_out == 0 {
        return Err(SplitError::InvalidFanOut(fan_out));
    }
    let n = fan_out as u64;
    let size = len.div_ceil(n);

    let ranges = (0..fan_out)
        .map(|i| {
            let i = i as u64;
            let start = i.saturating_mul(size).min(len);
            let end = if i == n - 1 {
                len
            } else {
                (i + 1).saturating_mul(size).min(len)
            };
            ChunkRange {
                bucket: i as usize,
                start,
                end,
            }
        })
        .collect();
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(len: u64, n: usize) -> Vec<(u64, u64)> {
        partition(len, n)
            .unwrap()
            .into_iter()
            .map(|r| (r.start, r.end))
            .collect()
    }

    #[test]
    fn nine_bytes_three_ways() {
        assert_eq!(spans(9, 3), vec![(0, 3), (3, 6), (6, 9)]);
    }

    #[test]
    fn single_byte_clamps_trailing_ranges() {
        assert_eq!(spans(1, 3), vec![(0, 1), (1, 1), (1, 1)]);
    }

    #[test]
    fn last_start_past_end_is_clamped() {
        // size = 2; unclamped r[3] would be [6, 5)
        assert_eq!(spans(5, 4), vec![(0, 2), (2, 4), (4, 5), (5, 5)]);
    }

    #[test]
    fn empty_input_gives_n_empty_ranges() {
        let r = partition(0, 3).unwrap();
        assert_eq!(r.len(), 3);
        assert!(r.iter().all(|c| c.is_empty() && c.start == 0));
    }

    #[test]
    fn uneven_split_puts_remainder_last() {
        assert_eq!(spans(10, 3), vec![(0, 4), (4, 8), (8, 10)]);
    }

    #[test]
    fn fan_out_of_one_is_whole_file() {
        assert_eq!(spans(17, 1), vec![(0, 17)]);
    }

    #[test]
    fn zero_fan_out_is_rejected() {
        assert!(matches!(partition(10, 0), Err(SplitError::InvalidFanOut(0))));
    }

    #[test]
    fn bucket_indices_are_ascending() {
        let r = partition(100, 7).unwrap();
        for (i, c) in r.iter().enumerate() {
            assert_eq!(c.bucket, i);
        }
    }
}
