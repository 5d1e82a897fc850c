use crate::alignment::cigar::ReferenceBlock;
use crate::alignment::reconstruct::{Diff, DiffAndGapResult, ReferenceGap};
use crate::strand::Strand;
use serde::Serialize;

/// One alignment record as delivered by a record source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputRecord {
    pub read_name: String,

    pub flag: u16,

    /// Reference sequence name, e.g. "chr1". Empty when the record has none.
    pub chromosome: String,

    /// 1-based leftmost aligned position. Non-positive when absent.
    pub start: i64,

    /// Operation string, e.g. "3S10M2I5M".
    pub operations: String,

    /// Read bases, hard-clipped bases excluded.
    pub sequence: Vec<u8>,

    pub qualities: Option<Vec<u8>>,

    /// NH: number of reported alignments for this read.
    pub hit_count: Option<u32>,

    /// NM: edit distance to the reference.
    pub edit_distance: Option<i64>,
}

/// Base-level reconstruction of one aligned read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedMapping {
    /// 1-based, inclusive.
    pub start: i64,

    /// 1-based, inclusive.
    pub stop: i64,

    pub strand: Strand,

    pub diffs: Vec<Diff>,

    pub gaps: Vec<ReferenceGap>,

    pub mismatch_count: usize,

    /// Set once the read sequence went through the sequence id table.
    pub sequence_id: Option<u32>,

    /// Reference-contiguous blocks, more than one for spliced reads.
    pub blocks: Vec<ReferenceBlock>,
}

impl DecodedMapping {
    pub fn new(
        start: i64,
        stop: i64,
        strand: Strand,
        reconstruction: DiffAndGapResult,
        blocks: Vec<ReferenceBlock>,
    ) -> Self {
        Self {
            start,
            stop,
            strand,
            diffs: reconstruction.diffs,
            gaps: reconstruction.gaps,
            mismatch_count: reconstruction.mismatch_count,
            sequence_id: None,
            blocks,
        }
    }

    pub fn with_sequence_id(mut self, sequence_id: u32) -> Self {
        self.sequence_id = Some(sequence_id);
        self
    }

    pub fn is_spliced(&self) -> bool {
        self.blocks.len() > 1
    }

    pub fn is_perfect(&self) -> bool {
        self.mismatch_count == 0
    }
}
