//! An ordered set of half-open sequence-number intervals `[lo, hi)`, used
//! by the Index Manager to track which sequences a lazy index has already
//! reflected.
//!
//! Invariant, maintained by every mutator: intervals are kept sorted by
//! `lo` and non-overlapping; adjacent/overlapping intervals are coalesced
//! on insert.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub lo: i64,
    pub hi: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceSet {
    ranges: Vec<Range>,
}

impl SequenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ranges(&self) -> &[Range] {
        &self.ranges
    }

    /// Inserts `[lo, hi)`, merging with any overlapping or adjacent ranges.
    pub fn add(&mut self, lo: i64, hi: i64) {
        if lo >= hi {
            return;
        }
        let mut merged = Range { lo, hi };
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        let mut inserted = false;

        for &r in &self.ranges {
            if r.hi < merged.lo {
                out.push(r);
            } else if merged.hi < r.lo {
                if !inserted {
                    out.push(merged);
                    inserted = true;
                }
                out.push(r);
            } else {
                merged = Range {
                    lo: merged.lo.min(r.lo),
                    hi: merged.hi.max(r.hi),
                };
            }
        }
        if !inserted {
            out.push(merged);
        }
        self.ranges = out;
    }

    /// Removes the single sequence `seq`, splitting a range if it falls
    /// in the interior.
    pub fn remove(&mut self, seq: i64) {
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for r in &self.ranges {
            if seq < r.lo || seq >= r.hi {
                out.push(*r);
            } else {
                if r.lo < seq {
                    out.push(Range { lo: r.lo, hi: seq });
                }
                if seq + 1 < r.hi {
                    out.push(Range {
                        lo: seq + 1,
                        hi: r.hi,
                    });
                }
            }
        }
        self.ranges = out;
    }

    pub fn contains(&self, seq: i64) -> bool {
        self.ranges.iter().any(|r| seq >= r.lo && seq < r.hi)
    }

    /// `true` iff every sequence in `[lo, hi)` is covered by some range —
    /// a run of ranges may jointly span it, so this is not just a
    /// single-range membership test.
    pub fn contains_range(&self, lo: i64, hi: i64) -> bool {
        if lo >= hi {
            return true;
        }
        let mut cursor = lo;
        for r in &self.ranges {
            if r.lo > cursor {
                break;
            }
            if r.hi > cursor {
                cursor = r.hi;
            }
            if cursor >= hi {
                return true;
            }
        }
        false
    }

    /// The end of the initial `[1, x)` interval if the set starts there,
    /// used by the Lazy-Index Updater to pick up where it left off.
    pub fn initial_gap_end(&self) -> i64 {
        match self.ranges.first() {
            Some(r) if r.lo <= 1 => r.hi,
            _ => 1,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("SequenceSet serializes infallibly")
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn adjacent_ranges_coalesce() {
        let mut set = SequenceSet::new();
        set.add(1, 5);
        set.add(5, 10);
        assert_eq!(set.ranges(), &[Range { lo: 1, hi: 10 }]);
    }

    #[test]
    fn overlapping_ranges_coalesce() {
        let mut set = SequenceSet::new();
        set.add(1, 5);
        set.add(3, 8);
        assert_eq!(set.ranges(), &[Range { lo: 1, hi: 8 }]);
    }

    #[test]
    fn remove_splits_interior() {
        let mut set = SequenceSet::new();
        set.add(1, 10);
        set.remove(5);
        assert_eq!(
            set.ranges(),
            &[Range { lo: 1, hi: 5 }, Range { lo: 6, hi: 10 }]
        );
        assert!(!set.contains(5));
        assert!(set.contains(4));
        assert!(set.contains(6));
    }

    #[test]
    fn contains_range_spans_multiple_intervals() {
        let mut set = SequenceSet::new();
        set.add(1, 5);
        set.add(5, 10);
        assert!(set.contains_range(1, 10));
        assert!(!set.contains_range(1, 11));
    }

    #[test]
    fn initial_gap_end_tracks_leading_interval() {
        let mut set = SequenceSet::new();
        assert_eq!(set.initial_gap_end(), 1);
        set.add(1, 200);
        assert_eq!(set.initial_gap_end(), 200);
        set.add(300, 400);
        assert_eq!(set.initial_gap_end(), 200);
    }

    #[test]
    fn json_round_trip() {
        let mut set = SequenceSet::new();
        set.add(1, 5);
        set.add(10, 20);
        let json = set.to_json();
        assert_eq!(SequenceSet::from_json(&json).unwrap(), set);
    }

    #[quickcheck]
    fn ranges_stay_sorted_and_disjoint(ops: Vec<(i64, i64)>) -> bool {
        let mut set = SequenceSet::new();
        for (a, b) in ops {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            set.add(lo.clamp(-1000, 1000), hi.clamp(-1000, 1000));
        }
        set.ranges()
            .windows(2)
            .all(|w| w[0].hi < w[1].lo && w[0].lo < w[0].hi)
    }
}
