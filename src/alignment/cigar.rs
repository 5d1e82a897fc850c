use crate::error::FormatError;
use itertools::Itertools;
use nom::{
    character::complete::{one_of, u32 as length},
    IResult, Parser,
};
use serde::Serialize;
use std::fmt;

const OPERATION_LETTERS: &str = "MIDNSHP=X";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// M
    Match,
    /// I
    Insertion,
    /// D
    Deletion,
    /// N
    Skip,
    /// S
    SoftClip,
    /// H
    HardClip,
    /// P
    Padding,
    /// =
    SequenceMatch,
    /// X
    SequenceMismatch,
}

impl OperationKind {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'M' => Some(Self::Match),
            'I' => Some(Self::Insertion),
            'D' => Some(Self::Deletion),
            'N' => Some(Self::Skip),
            'S' => Some(Self::SoftClip),
            'H' => Some(Self::HardClip),
            'P' => Some(Self::Padding),
            '=' => Some(Self::SequenceMatch),
            'X' => Some(Self::SequenceMismatch),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Match => 'M',
            Self::Insertion => 'I',
            Self::Deletion => 'D',
            Self::Skip => 'N',
            Self::SoftClip => 'S',
            Self::HardClip => 'H',
            Self::Padding => 'P',
            Self::SequenceMatch => '=',
            Self::SequenceMismatch => 'X',
        }
    }

    /// Whether the operation consumes read bases.
    /// Yes: M/I/S/=/X
    /// No: D/N/H/P
    pub fn consumes_read(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::Insertion
                | Self::SoftClip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// Whether the operation consumes reference positions.
    /// Yes: M/D/N/=/X
    /// No: I/S/H/P
    ///
    /// Padding is treated as silent in both coordinate systems, which is
    /// what keeps [`compute_stop`] exact.
    pub fn consumes_reference(self) -> bool {
        matches!(
            self,
            Self::Match
                | Self::Deletion
                | Self::Skip
                | Self::SequenceMatch
                | Self::SequenceMismatch
        )
    }

    /// M/=/X: a read base sits on a reference base.
    pub fn is_aligned(self) -> bool {
        matches!(
            self,
            Self::Match | Self::SequenceMatch | Self::SequenceMismatch
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlignmentOperation {
    pub kind: OperationKind,
    /// Always positive.
    pub length: u32,
}

impl AlignmentOperation {
    pub fn new(kind: OperationKind, length: u32) -> Self {
        Self { kind, length }
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }
}

impl fmt::Display for AlignmentOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.length, self.kind.letter())
    }
}

pub fn format_operations(operations: &[AlignmentOperation]) -> String {
    operations.iter().join("")
}

fn operation(input: &str) -> IResult<&str, (u32, char)> {
    (length, one_of(OPERATION_LETTERS)).parse(input)
}

/// Parse an operation string such as `3S10M2I5M1D4M`.
///
/// Grammar: one or more `<positive length><letter>` pairs, no separators,
/// letters from `MIDNSHP=X` (case-sensitive).
pub fn parse_operations(input: &str) -> Result<Vec<AlignmentOperation>, FormatError> {
    if input.is_empty() {
        return Err(invalid(input, 0, "empty operation string".to_string()));
    }

    let mut operations = Vec::new();
    let mut rest = input;
    while !rest.is_empty() {
        let offset = input.len() - rest.len();
        match operation(rest) {
            Ok((remaining, (len, letter))) => {
                if len == 0 {
                    return Err(invalid(
                        input,
                        offset,
                        format!("zero-length '{}' operation", letter),
                    ));
                }
                // one_of only yields letters from the alphabet.
                let kind = OperationKind::from_letter(letter).ok_or_else(|| {
                    invalid(input, offset, format!("unknown operation '{}'", letter))
                })?;
                operations.push(AlignmentOperation::new(kind, len));
                rest = remaining;
            }
            Err(_) => {
                let (relative, reason) = describe_failure(rest);
                return Err(invalid(input, offset + relative, reason));
            }
        }
    }

    Ok(operations)
}

fn describe_failure(rest: &str) -> (usize, String) {
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        // rest is non-empty here
        let c = rest.chars().next().unwrap_or_default();
        if OPERATION_LETTERS.contains(c) {
            return (0, format!("operation '{}' has no length", c));
        }
        return (0, format!("unexpected character {:?}", c));
    }

    match rest[digits..].chars().next() {
        None => (digits, "length is not followed by an operation".to_string()),
        Some(c) if OPERATION_LETTERS.contains(c) => (0, "length out of range".to_string()),
        Some(c) => (digits, format!("unexpected character {:?}", c)),
    }
}

fn invalid(input: &str, offset: usize, reason: String) -> FormatError {
    FormatError::InvalidOperationString {
        input: input.to_string(),
        offset,
        reason,
    }
}

/// Number of read bases the operations account for (M/I/S/=/X).
pub fn read_length(operations: &[AlignmentOperation]) -> usize {
    operations
        .iter()
        .filter(|op| op.kind.consumes_read())
        .map(|op| op.len())
        .sum()
}

/// Number of reference positions the operations span (M/D/N/=/X).
pub fn reference_length(operations: &[AlignmentOperation]) -> usize {
    operations
        .iter()
        .filter(|op| op.kind.consumes_reference())
        .map(|op| op.len())
        .sum()
}

/// Alignment columns: reference span plus inserted bases.
pub fn alignment_length(operations: &[AlignmentOperation]) -> usize {
    reference_length(operations) + total_of(operations, OperationKind::Insertion)
}

fn total_of(operations: &[AlignmentOperation], kind: OperationKind) -> usize {
    operations
        .iter()
        .filter(|op| op.kind == kind)
        .map(|op| op.len())
        .sum()
}

/// Reference stop, 1-based, inclusive.
///
/// `start + read_length - 1 + D + N - I - S`. Hard clips and padding are
/// not part of `read_length` and do not move the stop.
pub fn compute_stop(operations: &[AlignmentOperation], start: i64, read_length: usize) -> i64 {
    let deletions = total_of(operations, OperationKind::Deletion) as i64;
    let skips = total_of(operations, OperationKind::Skip) as i64;
    let insertions = total_of(operations, OperationKind::Insertion) as i64;
    let soft_clips = total_of(operations, OperationKind::SoftClip) as i64;

    start + read_length as i64 - 1 + deletions + skips - insertions - soft_clips
}

/// A reference-contiguous piece of a (possibly spliced) alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceBlock {
    /// 1-based, inclusive.
    pub start: i64,
    /// 1-based, inclusive.
    pub stop: i64,
    /// 0-based offset into the read of the first base placed in this block.
    pub read_start: usize,
}

/// Split the alignment at skipped regions (N). Deletions stay inside a block.
pub fn reference_blocks(operations: &[AlignmentOperation], start: i64) -> Vec<ReferenceBlock> {
    let mut blocks = Vec::new();

    let mut reference_pivot = start;
    let mut query_pivot: usize = 0;
    let mut open: Option<ReferenceBlock> = None;

    for op in operations {
        let len = op.len();
        match op.kind {
            OperationKind::Skip => {
                if let Some(block) = open.take() {
                    blocks.push(block);
                }
            }
            kind if kind.consumes_reference() => {
                let block = open.get_or_insert(ReferenceBlock {
                    start: reference_pivot,
                    stop: reference_pivot,
                    read_start: query_pivot,
                });
                block.stop = reference_pivot + len as i64 - 1;
            }
            _ => {}
        }

        if op.kind.consumes_reference() {
            reference_pivot += len as i64;
        }
        if op.kind.consumes_read() {
            query_pivot += len;
        }
    }

    if let Some(block) = open {
        blocks.push(block);
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use OperationKind::*;

    fn ops(pairs: &[(OperationKind, u32)]) -> Vec<AlignmentOperation> {
        pairs
            .iter()
            .map(|(kind, len)| AlignmentOperation::new(*kind, *len))
            .collect()
    }

    #[rstest]
    #[case("10M", vec![(Match, 10)])]
    #[case("3S10M2I5M1D4M2H", vec![(SoftClip, 3), (Match, 10), (Insertion, 2), (Match, 5), (Deletion, 1), (Match, 4), (HardClip, 2)])]
    #[case("5=1X100N2P4=", vec![(SequenceMatch, 5), (SequenceMismatch, 1), (Skip, 100), (Padding, 2), (SequenceMatch, 4)])]
    fn test_parse_operations(#[case] input: &str, #[case] expected: Vec<(OperationKind, u32)>) {
        let parsed = parse_operations(input).unwrap();
        assert_eq!(parsed, ops(&expected));
        assert_eq!(format_operations(&parsed), input);
    }

    #[rstest]
    #[case("", 0)]
    #[case("M", 0)]
    #[case("10", 2)]
    #[case("10M5", 4)]
    #[case("10m", 2)]
    #[case("10M 5M", 3)]
    #[case("*", 0)]
    #[case("0M", 0)]
    #[case("5M3Q", 3)]
    #[case("99999999999M", 0)]
    fn test_parse_operations_rejects(#[case] input: &str, #[case] expected_offset: usize) {
        match parse_operations(input) {
            Err(FormatError::InvalidOperationString { offset, .. }) => {
                assert_eq!(offset, expected_offset)
            }
            other => panic!("expected InvalidOperationString, got {:?}", other),
        }
    }

    #[rstest]
    #[case("10M", 100, 10, 109)]
    #[case("3S10M", 100, 13, 109)]
    #[case("10M2I10M", 100, 22, 119)]
    #[case("5M3D5M", 100, 10, 112)]
    #[case("5M1000N5M", 1, 10, 1010)]
    #[case("2H10M2H", 100, 10, 109)]
    #[case("4M2P4M", 100, 8, 107)]
    #[case("2S3=1X4M1S", 50, 11, 57)]
    fn test_compute_stop(
        #[case] cigar: &str,
        #[case] start: i64,
        #[case] read_len: usize,
        #[case] expected: i64,
    ) {
        let operations = parse_operations(cigar).unwrap();
        assert_eq!(read_length(&operations), read_len);
        assert_eq!(compute_stop(&operations, start, read_len), expected);
        assert_eq!(
            expected - start + 1,
            reference_length(&operations) as i64,
            "stop must agree with the reference span"
        );
    }

    #[test]
    fn test_alignment_length_counts_insertions() {
        let operations = parse_operations("2S10M2I10M3D").unwrap();
        assert_eq!(reference_length(&operations), 23);
        assert_eq!(alignment_length(&operations), 25);
    }

    #[rstest]
    #[case("10M", 100, vec![(100, 109, 0)])]
    #[case("3S5M2D5M", 100, vec![(100, 111, 3)])]
    #[case("5M100N5M", 100, vec![(100, 104, 0), (205, 209, 5)])]
    #[case("2S5M2I3M50N4M1S", 10, vec![(10, 17, 2), (68, 71, 12)])]
    #[case("5M10N", 1, vec![(1, 5, 0)])]
    fn test_reference_blocks(
        #[case] cigar: &str,
        #[case] start: i64,
        #[case] expected: Vec<(i64, i64, usize)>,
    ) {
        let operations = parse_operations(cigar).unwrap();
        let blocks = reference_blocks(&operations, start)
            .into_iter()
            .map(|b| (b.start, b.stop, b.read_start))
            .collect::<Vec<_>>();
        assert_eq!(blocks, expected);
    }

    fn operation_strategy() -> impl Strategy<Value = AlignmentOperation> {
        (
            prop_oneof![
                Just(Match),
                Just(Insertion),
                Just(Deletion),
                Just(Skip),
                Just(SoftClip),
                Just(HardClip),
                Just(Padding),
                Just(SequenceMatch),
                Just(SequenceMismatch),
            ],
            1u32..50,
        )
            .prop_map(|(kind, len)| AlignmentOperation::new(kind, len))
    }

    proptest! {
        #[test]
        fn stop_spans_reference_length(operations in proptest::collection::vec(operation_strategy(), 1..12), start in 1i64..1_000_000) {
            let parsed = parse_operations(&format_operations(&operations)).unwrap();
            prop_assert_eq!(&parsed, &operations);

            let stop = compute_stop(&parsed, start, read_length(&parsed));
            prop_assert_eq!(stop - start + 1, reference_length(&parsed) as i64);
        }

        #[test]
        fn match_only_stop(lengths in proptest::collection::vec(1u32..200, 1..6), start in 1i64..1_000_000) {
            let cigar = lengths.iter().map(|l| format!("{}M", l)).collect::<String>();
            let operations = parse_operations(&cigar).unwrap();
            let total: i64 = lengths.iter().map(|l| *l as i64).sum();
            prop_assert_eq!(compute_stop(&operations, start, read_length(&operations)), start + total - 1);
        }
    }
}
