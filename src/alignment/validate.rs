use crate::alignment::cigar::{
    alignment_length, compute_stop, parse_operations, read_length, reference_length,
};
use crate::error::{SequenceAxis, ValidationError};

/// The raw fields of one record, as seen before reconstruction.
#[derive(Debug, Clone, Copy)]
pub struct MappingRecord<'a> {
    pub read_name: &'a str,

    /// 1-based.
    pub start: i64,

    pub operations: &'a str,

    pub read_sequence: &'a [u8],

    /// The reference slice for `[start, stop]`. None when it could not be
    /// determined (e.g. the operations do not parse).
    pub reference_sequence: Option<&'a [u8]>,

    /// Reported mismatch count (NM), when the record carries one.
    pub mismatch_count: Option<i64>,
}

/// Run every check and report all failures, not just the first one.
pub fn validate(record: &MappingRecord) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if record.read_name.trim().is_empty() {
        errors.push(ValidationError::MissingReadName);
    }

    if record.read_sequence.is_empty() {
        errors.push(ValidationError::EmptySequence(SequenceAxis::Read));
    }
    if let Some(reference) = record.reference_sequence {
        if reference.is_empty() {
            errors.push(ValidationError::EmptySequence(SequenceAxis::Reference));
        }
    }

    match parse_operations(record.operations) {
        Ok(operations) => {
            let stop = compute_stop(&operations, record.start, record.read_sequence.len());
            if record.start >= stop {
                errors.push(ValidationError::StartNotBeforeStop {
                    start: record.start,
                    stop,
                });
            }

            let expected_read = read_length(&operations);
            if !record.read_sequence.is_empty() && expected_read != record.read_sequence.len() {
                errors.push(ValidationError::LengthMismatch {
                    axis: SequenceAxis::Read,
                    expected: expected_read,
                    actual: record.read_sequence.len(),
                });
            }

            if let Some(reference) = record.reference_sequence.filter(|r| !r.is_empty()) {
                let expected_reference = reference_length(&operations);
                if expected_reference != reference.len() {
                    errors.push(ValidationError::LengthMismatch {
                        axis: SequenceAxis::Reference,
                        expected: expected_reference,
                        actual: reference.len(),
                    });
                }
            }

            if let Some(count) = record.mismatch_count {
                let alignment_length = alignment_length(&operations);
                if count < 0 || count as usize > alignment_length {
                    errors.push(ValidationError::MismatchCountOutOfRange {
                        count,
                        alignment_length,
                    });
                }
            }
        }
        Err(e) => errors.push(ValidationError::MalformedOperations(e)),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
