//! Bit tests on the SAM status flag.
//! See: https://samtools.github.io/hts-specs/SAMv1.pdf

use crate::strand::Strand;

pub const UNMAPPED: u16 = 0x4;
pub const REVERSE_STRAND: u16 = 0x10;
pub const SECONDARY: u16 = 0x100;
pub const SUPPLEMENTARY: u16 = 0x800;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    Mapped,

    /// The unmapped bit is set.
    Unmapped,

    /// Flagged as mapped but the start position is not positive.
    InvalidPosition,
}

pub fn mapping_status(flag: u16, start: i64) -> MappingStatus {
    if flag & UNMAPPED != 0 {
        MappingStatus::Unmapped
    } else if start <= 0 {
        MappingStatus::InvalidPosition
    } else {
        MappingStatus::Mapped
    }
}

pub fn is_mapped(flag: u16, start: i64) -> bool {
    mapping_status(flag, start) == MappingStatus::Mapped
}

pub fn is_forward_strand(flag: u16) -> bool {
    flag & REVERSE_STRAND == 0
}

pub fn strand(flag: u16) -> Strand {
    Strand::from_reverse_flag(!is_forward_strand(flag))
}

pub fn is_secondary(flag: u16) -> bool {
    flag & SECONDARY != 0
}
