use crate::alignment::cigar::{compute_stop, read_length, reference_length, AlignmentOperation, OperationKind};
use crate::error::{FormatError, SequenceAxis};
use crate::settings::UnknownBasePolicy;
use crate::strand::Strand;
use serde::Serialize;
use std::collections::HashMap;

/// Base stored for each reference position removed by a deletion.
pub const DELETION_MARKER: u8 = b'_';

/// A substitution (or deleted position) at an absolute reference coordinate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diff {
    /// 1-based.
    pub position: i64,

    /// Upper case, forward-reference orientation. [`DELETION_MARKER`] for deletions.
    pub base: u8,

    pub strand: Strand,

    /// False when the reference itself is ambiguous (N) at this position.
    pub counts_as_error: bool,
}

/// A read base inserted between reference positions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReferenceGap {
    /// 1-based anchor: `start + reference offset` at the insertion.
    pub position: i64,

    /// Upper case, forward-reference orientation.
    pub base: u8,

    /// 0-based rank among the gaps sharing `position`, first seen first.
    pub order: u32,

    pub strand: Strand,
}

/// Next free gap order per anchor coordinate. Lives for exactly one decode.
#[derive(Debug, Default)]
struct GapOrderTable {
    next: HashMap<i64, u32>,
}

impl GapOrderTable {
    fn next_order(&mut self, position: i64) -> u32 {
        let slot = self.next.entry(position).or_insert(0);
        let order = *slot;
        *slot += 1;
        order
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiffAndGapResult {
    /// Ascending by position.
    pub diffs: Vec<Diff>,

    /// Ascending by (position, order).
    pub gaps: Vec<ReferenceGap>,

    /// Substitutions against unambiguous reference bases, deleted positions and inserted bases.
    pub mismatch_count: usize,
}

fn same_base(a: u8, b: u8) -> bool {
    a.eq_ignore_ascii_case(&b)
}

/// Rebuild diffs and insertions for one read.
///
/// `reference` must already be sliced to `[start, stop]` of the alignment.
/// `read` is the stored read sequence, hard-clipped bases excluded.
pub fn reconstruct(
    read: &[u8],
    reference: &[u8],
    start: i64,
    strand: Strand,
    operations: &[AlignmentOperation],
    unknown_bases: UnknownBasePolicy,
) -> Result<DiffAndGapResult, FormatError> {
    let consumed_read = read_length(operations);
    if consumed_read != read.len() {
        return Err(FormatError::LengthMismatch {
            axis: SequenceAxis::Read,
            consumed: consumed_read,
            actual: read.len(),
        });
    }
    let consumed_reference = reference_length(operations);
    if consumed_reference != reference.len() {
        return Err(FormatError::LengthMismatch {
            axis: SequenceAxis::Reference,
            consumed: consumed_reference,
            actual: reference.len(),
        });
    }

    let stop = compute_stop(operations, start, read.len());
    if start >= stop {
        return Err(FormatError::EmptyAlignment { start, stop });
    }

    let stored_base = |offset: usize| -> Result<u8, FormatError> {
        let base = read[offset];
        match (strand.orient(base), unknown_bases) {
            (Some(oriented), _) => Ok(oriented),
            (None, UnknownBasePolicy::PassThrough) => {
                tracing::debug!(base = %(base as char), offset, "passing through unknown base");
                Ok(base.to_ascii_uppercase())
            }
            (None, UnknownBasePolicy::Reject) => Err(FormatError::UnknownBase {
                base: base as char,
                offset,
            }),
        }
    };

    let mut result = DiffAndGapResult::default();
    let mut gap_orders = GapOrderTable::default();

    let mut read_pos: usize = 0; // 0-based offset into read
    let mut ref_pos: usize = 0; // 0-based offset into reference

    for op in operations {
        let len = op.len();
        match op.kind {
            OperationKind::Match | OperationKind::SequenceMismatch => {
                let all_differ = op.kind == OperationKind::SequenceMismatch;
                for i in 0..len {
                    let reference_base = reference[ref_pos + i];
                    if !all_differ && same_base(read[read_pos + i], reference_base) {
                        continue;
                    }
                    let counts_as_error = !same_base(reference_base, b'N');
                    result.diffs.push(Diff {
                        position: start + (ref_pos + i) as i64,
                        base: stored_base(read_pos + i)?,
                        strand,
                        counts_as_error,
                    });
                    if counts_as_error {
                        result.mismatch_count += 1;
                    }
                }
                read_pos += len;
                ref_pos += len;
            }

            OperationKind::SequenceMatch => {
                read_pos += len;
                ref_pos += len;
            }

            OperationKind::Deletion => {
                for i in 0..len {
                    result.diffs.push(Diff {
                        position: start + (ref_pos + i) as i64,
                        base: DELETION_MARKER,
                        strand,
                        counts_as_error: true,
                    });
                }
                result.mismatch_count += len;
                ref_pos += len;
            }

            OperationKind::Skip => {
                ref_pos += len;
            }

            OperationKind::Insertion => {
                let position = start + ref_pos as i64;
                for i in 0..len {
                    result.gaps.push(ReferenceGap {
                        position,
                        base: stored_base(read_pos + i)?,
                        order: gap_orders.next_order(position),
                        strand,
                    });
                }
                result.mismatch_count += len;
                read_pos += len;
            }

            OperationKind::SoftClip => {
                read_pos += len;
            }

            OperationKind::HardClip | OperationKind::Padding => {}
        }
    }

    Ok(result)
}
