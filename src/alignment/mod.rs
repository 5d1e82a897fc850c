mod cigar;
mod coverage;
pub mod flags;
mod mapping;
mod reconstruct;
mod sequence_id;
mod validate;

pub use cigar::{
    alignment_length, compute_stop, format_operations, parse_operations, read_length,
    reference_blocks, reference_length, AlignmentOperation, OperationKind, ReferenceBlock,
};
pub use coverage::{BucketTotal, Classification, CoverageAccumulator, CoverageSummary};
pub use flags::MappingStatus;
pub use mapping::{DecodedMapping, InputRecord};
pub use reconstruct::{reconstruct, Diff, DiffAndGapResult, ReferenceGap, DELETION_MARKER};
pub use sequence_id::{normalize, SequenceIdAssigner};
pub use validate::{validate, MappingRecord};
