use crate::alignment::mapping::DecodedMapping;
use crate::error::StateError;
use crate::strand::Strand;
use serde::{Deserialize, Serialize};

/// Downstream category of a mapping, used to bucket coverage counts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Classification {
    Unique,
    MultiMapped,
}

impl Classification {
    pub const ALL: [Classification; 2] = [Classification::Unique, Classification::MultiMapped];

    fn index(self) -> usize {
        match self {
            Classification::Unique => 0,
            Classification::MultiMapped => 1,
        }
    }
}

const BUCKETS: usize = Strand::ALL.len() * Classification::ALL.len();

fn bucket(strand: Strand, classification: Classification) -> usize {
    strand.index() * Classification::ALL.len() + classification.index()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccumulatorState {
    Accumulating,
    Finalized,
}

/// Per-position, per-strand, per-classification read counts over a window.
#[derive(Debug, Clone)]
pub struct CoverageAccumulator {
    /// 1-based, inclusive.
    from: u64,

    /// 1-based, inclusive.
    to: u64,

    /// counts[position - from][bucket]
    counts: Vec<[u32; BUCKETS]>,

    mappings: usize,

    state: AccumulatorState,
}

impl CoverageAccumulator {
    /// Window `[from, to]`, 1-based, inclusive. Empty if `to < from`.
    /// Counts are allocated densely, so callers bound the window first.
    pub fn new(from: u64, to: u64) -> Self {
        let len = to.checked_sub(from).map_or(0, |span| span.saturating_add(1));
        Self {
            from,
            to,
            counts: vec![[0; BUCKETS]; len as usize],
            mappings: 0,
            state: AccumulatorState::Accumulating,
        }
    }

    pub fn from(&self) -> u64 {
        self.from
    }

    pub fn to(&self) -> u64 {
        self.to
    }

    /// Mappings folded in so far.
    pub fn mappings(&self) -> usize {
        self.mappings
    }

    pub fn is_finalized(&self) -> bool {
        self.state == AccumulatorState::Finalized
    }

    /// Count every reference position of every block. Blocks are clipped to the window.
    pub fn accumulate(
        &mut self,
        mapping: &DecodedMapping,
        classification: Classification,
    ) -> Result<(), StateError> {
        if self.is_finalized() {
            return Err(StateError::AlreadyFinalized);
        }

        let b = bucket(mapping.strand, classification);
        for block in &mapping.blocks {
            let Some((lo, hi)) = self.clip(block.start, block.stop) else {
                continue;
            };
            for counts in &mut self.counts[lo..=hi] {
                counts[b] += 1;
            }
        }
        self.mappings += 1;

        Ok(())
    }

    /// Window-relative index range of `[start, stop]`, or None if disjoint.
    fn clip(&self, start: i64, stop: i64) -> Option<(usize, usize)> {
        let stop = u64::try_from(stop).ok()?;
        let start = u64::try_from(start).unwrap_or(0);
        let lo = start.max(self.from);
        let hi = stop.min(self.to);
        if self.counts.is_empty() || lo > hi {
            return None;
        }
        Some(((lo - self.from) as usize, (hi - self.from) as usize))
    }

    /// Close the accumulator for writing. Calling it again does nothing.
    pub fn finalize(&mut self) {
        self.state = AccumulatorState::Finalized;
    }

    /// Add the counts of another finalized accumulator over the same window.
    pub fn merge(&mut self, other: &CoverageAccumulator) -> Result<(), StateError> {
        if self.is_finalized() {
            return Err(StateError::AlreadyFinalized);
        }
        if !other.is_finalized() {
            return Err(StateError::NotFinalized);
        }
        if (self.from, self.to) != (other.from, other.to) {
            return Err(StateError::WindowMismatch {
                from: self.from,
                to: self.to,
                other_from: other.from,
                other_to: other.to,
            });
        }

        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            for (a, b) in mine.iter_mut().zip(theirs.iter()) {
                *a += *b;
            }
        }
        self.mappings += other.mappings;

        Ok(())
    }

    fn counts_at(&self, position: u64) -> Option<&[u32; BUCKETS]> {
        if position < self.from || position > self.to {
            return None;
        }
        self.counts.get((position - self.from) as usize)
    }

    /// 1-based position. Zero outside the window.
    pub fn coverage_at(&self, position: u64, strand: Strand, classification: Classification) -> u32 {
        self.counts_at(position)
            .map(|counts| counts[bucket(strand, classification)])
            .unwrap_or(0)
    }

    /// Both strands, every classification.
    pub fn total_at(&self, position: u64) -> u32 {
        self.counts_at(position)
            .map(|counts| counts.iter().sum())
            .unwrap_or(0)
    }

    /// Read-only totals for reporting. Only available once finalized.
    pub fn summary(&self) -> Result<CoverageSummary, StateError> {
        if !self.is_finalized() {
            return Err(StateError::NotFinalized);
        }

        let mut summary = CoverageSummary {
            from: self.from,
            to: self.to,
            mappings: self.mappings,
            covered_positions: 0,
            max_depth: 0,
            bases: Vec::new(),
        };

        for strand in Strand::ALL {
            for classification in Classification::ALL {
                let b = bucket(strand, classification);
                summary.bases.push(BucketTotal {
                    strand,
                    classification,
                    bases: self.counts.iter().map(|counts| counts[b] as u64).sum(),
                });
            }
        }

        for counts in &self.counts {
            let depth: u32 = counts.iter().sum();
            if depth > 0 {
                summary.covered_positions += 1;
            }
            summary.max_depth = summary.max_depth.max(depth);
        }

        Ok(summary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketTotal {
    pub strand: Strand,
    pub classification: Classification,
    /// Sum of per-position counts.
    pub bases: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub from: u64,
    pub to: u64,
    pub mappings: usize,
    pub covered_positions: usize,
    pub max_depth: u32,
    pub bases: Vec<BucketTotal>,
}
