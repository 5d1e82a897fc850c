use crate::alignment::{format_operations, AlignmentOperation, InputRecord, OperationKind};
use crate::error::SourceError;
use noodles::bam;
use noodles::sam::{
    self,
    alignment::{
        record::{cigar::op::Kind, data::field::Tag},
        RecordBuf,
    },
    Header,
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

fn operation_kind(kind: Kind) -> OperationKind {
    match kind {
        Kind::Match => OperationKind::Match,
        Kind::Insertion => OperationKind::Insertion,
        Kind::Deletion => OperationKind::Deletion,
        Kind::Skip => OperationKind::Skip,
        Kind::SoftClip => OperationKind::SoftClip,
        Kind::HardClip => OperationKind::HardClip,
        Kind::Pad => OperationKind::Padding,
        Kind::SequenceMatch => OperationKind::SequenceMatch,
        Kind::SequenceMismatch => OperationKind::SequenceMismatch,
    }
}

/// Flatten a noodles record into the core's input record.
/// The operation string is rendered back to text so the core decoder always parses it.
fn input_record(header: &Header, record: &RecordBuf) -> InputRecord {
    let operations = record
        .cigar()
        .as_ref()
        .iter()
        .map(|op| AlignmentOperation::new(operation_kind(op.kind()), op.len() as u32))
        .collect::<Vec<_>>();

    let chromosome = record
        .reference_sequence_id()
        .and_then(|id| header.reference_sequences().get_index(id))
        .map(|(name, _)| name.to_string())
        .unwrap_or_default();

    let qualities = record.quality_scores().as_ref();

    InputRecord {
        read_name: record.name().map(|name| name.to_string()).unwrap_or_default(),
        flag: record.flags().bits(),
        chromosome,
        start: record
            .alignment_start()
            .map(|position| position.get() as i64)
            .unwrap_or(0),
        operations: format_operations(&operations),
        sequence: record.sequence().as_ref().to_vec(),
        qualities: (!qualities.is_empty()).then(|| qualities.to_vec()),
        hit_count: record
            .data()
            .get(&Tag::ALIGNMENT_HIT_COUNT)
            .and_then(|value| value.as_int())
            .and_then(|count| u32::try_from(count).ok()),
        edit_distance: record
            .data()
            .get(&Tag::EDIT_DISTANCE)
            .and_then(|value| value.as_int()),
    }
}

/// Text SAM records, in file order.
pub struct SamRecordSource {
    header: Header,

    reader: sam::io::Reader<BufReader<File>>,

    record: RecordBuf,
}

impl SamRecordSource {
    pub fn new(path: &Path) -> Result<Self, SourceError> {
        let mut reader = File::open(path)
            .map(BufReader::new)
            .map(sam::io::Reader::new)?;
        let header = reader.read_header()?;

        Ok(Self {
            header,
            reader,
            record: RecordBuf::default(),
        })
    }
}

impl Iterator for SamRecordSource {
    type Item = Result<InputRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record_buf(&self.header, &mut self.record) {
            Ok(0) => None,
            Ok(_) => Some(Ok(input_record(&self.header, &self.record))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// BAM records, in file order. No index needed.
pub struct BamRecordSource {
    header: Header,

    reader: bam::io::Reader<noodles::bgzf::io::Reader<File>>,

    record: RecordBuf,
}

impl BamRecordSource {
    pub fn new(path: &Path) -> Result<Self, SourceError> {
        let mut reader = File::open(path).map(bam::io::Reader::new)?;
        let header = reader.read_header()?;

        Ok(Self {
            header,
            reader,
            record: RecordBuf::default(),
        })
    }
}

impl Iterator for BamRecordSource {
    type Item = Result<InputRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record_buf(&self.header, &mut self.record) {
            Ok(0) => None,
            Ok(_) => Some(Ok(input_record(&self.header, &self.record))),
            Err(e) => Some(Err(e.into())),
        }
    }
}

pub enum RecordSource {
    Sam(SamRecordSource),
    Bam(BamRecordSource),
}

impl RecordSource {
    /// Pick the reader by file extension (Currently supports: .sam, .bam).
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("sam") => Ok(RecordSource::Sam(SamRecordSource::new(path)?)),
            Some("bam") => Ok(RecordSource::Bam(BamRecordSource::new(path)?)),
            _ => Err(SourceError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

impl Iterator for RecordSource {
    type Item = Result<InputRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RecordSource::Sam(source) => source.next(),
            RecordSource::Bam(source) => source.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAM: &str = "@HD\tVN:1.6\tSO:coordinate\n\
@SQ\tSN:chr1\tLN:100\n\
@SQ\tSN:chr2\tLN:50\n\
r1\t0\tchr1\t5\t60\t2S4M1I3M\t*\t0\t0\tGGACGTTACG\tIIIIIIIIII\tNH:i:1\tNM:i:2\n\
r2\t16\tchr2\t10\t60\t4M\t*\t0\t0\tacgt\t*\n\
r3\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n";

    #[test]
    fn test_sam_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.sam");
        fs::write(&path, SAM).unwrap();

        let records = RecordSource::open(&path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(
            records[0],
            InputRecord {
                read_name: "r1".to_string(),
                flag: 0,
                chromosome: "chr1".to_string(),
                start: 5,
                operations: "2S4M1I3M".to_string(),
                sequence: b"GGACGTTACG".to_vec(),
                qualities: Some(vec![40; 10]),
                hit_count: Some(1),
                edit_distance: Some(2),
            }
        );

        assert_eq!(records[1].chromosome, "chr2");
        assert_eq!(records[1].flag, 16);
        assert_eq!(records[1].qualities, None);
        assert_eq!(records[1].hit_count, None);

        assert_eq!(records[2].chromosome, "");
        assert_eq!(records[2].start, 0);
        assert_eq!(records[2].operations, "");
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            RecordSource::open(Path::new("reads.cram")),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            RecordSource::open(Path::new("/nonexistent/reads.bam")),
            Err(SourceError::Io(_))
        ));
    }
}
