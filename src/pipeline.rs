use crate::alignment::{
    compute_stop, flags, normalize, parse_operations, reconstruct, reference_blocks, validate,
    Classification, CoverageAccumulator, CoverageSummary, DecodedMapping, InputRecord,
    MappingRecord, MappingStatus, SequenceIdAssigner,
};
use crate::error::{FormatError, ReaddiffError, ReferenceError, SourceError, ValidationError};
use crate::repository::RecordSource;
use crate::sequence::ReferenceSequenceProvider;
use crate::settings::DecoderSettings;
use itertools::Itertools;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Why a record was left out of a track.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RejectionKind {
    MissingReadName,
    StartNotBeforeStop,
    EmptySequence,
    LengthMismatch,
    MismatchCountOutOfRange,
    MalformedOperations,
    EmptyAlignment,
    UnknownBase,
    ReferenceUnavailable,
}

impl From<&ValidationError> for RejectionKind {
    fn from(error: &ValidationError) -> Self {
        match error {
            ValidationError::MissingReadName => RejectionKind::MissingReadName,
            ValidationError::StartNotBeforeStop { .. } => RejectionKind::StartNotBeforeStop,
            ValidationError::EmptySequence(_) => RejectionKind::EmptySequence,
            ValidationError::LengthMismatch { .. } => RejectionKind::LengthMismatch,
            ValidationError::MismatchCountOutOfRange { .. } => {
                RejectionKind::MismatchCountOutOfRange
            }
            ValidationError::MalformedOperations(_) => RejectionKind::MalformedOperations,
        }
    }
}

impl From<&FormatError> for RejectionKind {
    fn from(error: &FormatError) -> Self {
        match error {
            FormatError::InvalidOperationString { .. } => RejectionKind::MalformedOperations,
            FormatError::LengthMismatch { .. } => RejectionKind::LengthMismatch,
            FormatError::EmptyAlignment { .. } => RejectionKind::EmptyAlignment,
            FormatError::UnknownBase { .. } => RejectionKind::UnknownBase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectionSample {
    pub read_name: String,
    pub reasons: Vec<String>,
}

/// What happened to every record of one track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionReport {
    /// Records read from the source.
    pub records: usize,

    pub accepted: usize,

    /// Records that failed at least one check.
    pub rejected: usize,

    pub unmapped: usize,

    pub invalid_position: usize,

    /// Mapped to a chromosome other than the requested one.
    pub other_chromosome: usize,

    /// Mapped to the requested chromosome but not overlapping the window.
    pub outside_window: usize,

    /// Left out because multiply-mapped reads are not counted.
    pub multi_mapped_excluded: usize,

    /// A record rejected for several reasons counts once under each.
    pub by_kind: BTreeMap<RejectionKind, usize>,

    pub samples: Vec<RejectionSample>,

    #[serde(skip)]
    sample_size: usize,
}

impl RejectionReport {
    pub fn new(sample_size: usize) -> Self {
        Self {
            sample_size,
            ..Default::default()
        }
    }

    pub fn count(&self, kind: RejectionKind) -> usize {
        self.by_kind.get(&kind).copied().unwrap_or(0)
    }

    fn reject(&mut self, read_name: &str, reasons: Vec<(RejectionKind, String)>) {
        tracing::debug!(
            read_name,
            reasons = %reasons.iter().map(|(_, reason)| reason).join("; "),
            "rejected record"
        );

        self.rejected += 1;
        let mut kinds = reasons.iter().map(|(kind, _)| *kind).collect::<Vec<_>>();
        kinds.sort();
        kinds.dedup();
        for kind in kinds {
            *self.by_kind.entry(kind).or_insert(0) += 1;
        }

        if self.samples.len() < self.sample_size {
            self.samples.push(RejectionSample {
                read_name: read_name.to_string(),
                reasons: reasons.into_iter().map(|(_, reason)| reason).collect(),
            });
        }
    }
}

/// Reference interval a track is decoded against. 1-based, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackWindow {
    pub chromosome: String,
    pub from: u64,
    pub to: u64,
}

impl TrackWindow {
    pub fn new(chromosome: &str, from: u64, to: u64) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            from,
            to,
        }
    }

    /// Clamp `to` to the chromosome length. Fails if the reference does not know the chromosome.
    pub fn bounded_by(
        &self,
        reference: &dyn ReferenceSequenceProvider,
    ) -> Result<TrackWindow, ReferenceError> {
        let length = reference
            .sequence_length(&self.chromosome)
            .ok_or_else(|| ReferenceError::UnknownSequence(self.chromosome.clone()))?;
        if self.to > length {
            tracing::debug!(
                chromosome = %self.chromosome,
                to = self.to,
                length,
                "window clamped to chromosome length"
            );
        }

        Ok(TrackWindow {
            chromosome: self.chromosome.clone(),
            from: self.from,
            to: self.to.min(length),
        })
    }

    fn overlaps(&self, start: i64, stop: i64) -> bool {
        match (u64::try_from(start), u64::try_from(stop)) {
            (Ok(start), Ok(stop)) => start <= self.to && stop >= self.from,
            _ => false,
        }
    }
}

/// Multiply-mapped if the aligner reported more than one hit or marked the record secondary.
pub fn classify(record: &InputRecord) -> Classification {
    if record.hit_count.is_some_and(|hits| hits > 1) || flags::is_secondary(record.flag) {
        Classification::MultiMapped
    } else {
        Classification::Unique
    }
}

enum Step {
    Accepted(DecodedMapping, Classification),
    Rejected(Vec<(RejectionKind, String)>),
    Unmapped,
    InvalidPosition,
    OtherChromosome,
    OutsideWindow,
    MultiMappedExcluded,
}

/// Decodes the records of one track, in source order.
pub struct TrackParser {
    reference: Arc<dyn ReferenceSequenceProvider>,

    window: TrackWindow,

    settings: DecoderSettings,

    ids: SequenceIdAssigner,

    coverage: CoverageAccumulator,

    mappings: Vec<DecodedMapping>,

    report: RejectionReport,
}

impl TrackParser {
    /// The window is clamped to the chromosome length before coverage is allocated.
    pub fn new(
        reference: Arc<dyn ReferenceSequenceProvider>,
        window: TrackWindow,
        settings: DecoderSettings,
    ) -> Result<Self, ReaddiffError> {
        let window = window.bounded_by(reference.as_ref())?;
        Ok(Self {
            reference,
            coverage: CoverageAccumulator::new(window.from, window.to),
            report: RejectionReport::new(settings.rejection_sample_size),
            window,
            settings,
            ids: SequenceIdAssigner::new(),
            mappings: Vec::new(),
        })
    }

    /// Fold one record into the track. Only reference I/O and accumulator misuse are errors;
    /// bad records end up in the rejection report.
    pub fn push(&mut self, record: &InputRecord) -> Result<(), ReaddiffError> {
        self.report.records += 1;

        match self.decode(record)? {
            Step::Accepted(mapping, classification) => {
                self.coverage.accumulate(&mapping, classification)?;
                self.mappings.push(mapping);
                self.report.accepted += 1;
            }
            Step::Rejected(reasons) => self.report.reject(&record.read_name, reasons),
            Step::Unmapped => self.report.unmapped += 1,
            Step::InvalidPosition => self.report.invalid_position += 1,
            Step::OtherChromosome => self.report.other_chromosome += 1,
            Step::OutsideWindow => self.report.outside_window += 1,
            Step::MultiMappedExcluded => self.report.multi_mapped_excluded += 1,
        }

        Ok(())
    }

    fn decode(&mut self, record: &InputRecord) -> Result<Step, ReaddiffError> {
        match flags::mapping_status(record.flag, record.start) {
            MappingStatus::Mapped => {}
            MappingStatus::Unmapped => return Ok(Step::Unmapped),
            MappingStatus::InvalidPosition => return Ok(Step::InvalidPosition),
        }
        if record.chromosome != self.window.chromosome {
            return Ok(Step::OtherChromosome);
        }

        let mut mapping_record = MappingRecord {
            read_name: &record.read_name,
            start: record.start,
            operations: &record.operations,
            read_sequence: &record.sequence,
            reference_sequence: None,
            mismatch_count: record.edit_distance,
        };

        let Ok(operations) = parse_operations(&record.operations) else {
            return Ok(Step::Rejected(validation_reasons(&mapping_record)));
        };
        let stop = compute_stop(&operations, record.start, record.sequence.len());
        if record.start >= stop {
            return Ok(Step::Rejected(validation_reasons(&mapping_record)));
        }
        if !self.window.overlaps(record.start, stop) {
            return Ok(Step::OutsideWindow);
        }

        let reference = match self.reference.get_subsequence(
            &self.window.chromosome,
            record.start as u64,
            stop as u64,
        ) {
            Ok(reference) => reference,
            Err(e @ (ReferenceError::UnknownSequence(_) | ReferenceError::OutOfRange { .. })) => {
                let mut reasons = validation_reasons(&mapping_record);
                reasons.push((RejectionKind::ReferenceUnavailable, e.to_string()));
                return Ok(Step::Rejected(reasons));
            }
            Err(e) => return Err(e.into()),
        };
        mapping_record.reference_sequence = Some(&reference);

        let reasons = validation_reasons(&mapping_record);
        if !reasons.is_empty() {
            return Ok(Step::Rejected(reasons));
        }

        let strand = flags::strand(record.flag);
        let reconstruction = match reconstruct(
            &record.sequence,
            &reference,
            record.start,
            strand,
            &operations,
            self.settings.unknown_bases,
        ) {
            Ok(reconstruction) => reconstruction,
            Err(e) => return Ok(Step::Rejected(vec![((&e).into(), e.to_string())])),
        };

        let classification = classify(record);
        if classification == Classification::MultiMapped && !self.settings.count_multi_mapped {
            return Ok(Step::MultiMappedExcluded);
        }

        let sequence_id = self.ids.assign_id(&normalize(&record.sequence));
        let mapping = DecodedMapping::new(
            record.start,
            stop,
            strand,
            reconstruction,
            reference_blocks(&operations, record.start),
        )
        .with_sequence_id(sequence_id);

        Ok(Step::Accepted(mapping, classification))
    }

    /// Decode every record until the source ends or `cancel` fires.
    pub fn parse<I>(
        mut self,
        records: I,
        cancel: &CancellationToken,
    ) -> Result<TrackOutcome, ReaddiffError>
    where
        I: IntoIterator<Item = Result<InputRecord, SourceError>>,
    {
        let mut records = records.into_iter();
        let mut cancelled = false;
        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let Some(record) = records.next() else {
                break;
            };
            self.push(&record?)?;
        }

        self.finish(cancelled)
    }

    /// Finalize coverage and drop the sequence id table.
    pub fn finish(mut self, cancelled: bool) -> Result<TrackOutcome, ReaddiffError> {
        self.coverage.finalize();
        let distinct_sequences = self.ids.len();
        self.ids.reset();

        if cancelled {
            tracing::info!(
                chromosome = %self.window.chromosome,
                accepted = self.report.accepted,
                "track parse cancelled"
            );
        } else if self.mappings.is_empty() {
            tracing::warn!(
                chromosome = %self.window.chromosome,
                records = self.report.records,
                rejected = self.report.rejected,
                "no usable mappings"
            );
            return Ok(TrackOutcome::NoUsableMappings(self.report));
        } else {
            tracing::info!(
                chromosome = %self.window.chromosome,
                accepted = self.report.accepted,
                rejected = self.report.rejected,
                "track parsed"
            );
        }

        Ok(TrackOutcome::Parsed(ParsedTrack {
            mappings: self.mappings,
            coverage: self.coverage,
            report: self.report,
            distinct_sequences,
            cancelled,
        }))
    }
}

fn validation_reasons(record: &MappingRecord) -> Vec<(RejectionKind, String)> {
    match validate(record) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .iter()
            .map(|error| (error.into(), error.to_string()))
            .collect(),
    }
}

#[derive(Debug)]
pub struct ParsedTrack {
    /// In source order.
    pub mappings: Vec<DecodedMapping>,

    /// Finalized.
    pub coverage: CoverageAccumulator,

    pub report: RejectionReport,

    pub distinct_sequences: usize,

    /// Stopped early. Everything above covers the records read before that.
    pub cancelled: bool,
}

/// A cancelled track is always `Parsed`, even with no mappings.
#[derive(Debug)]
pub enum TrackOutcome {
    Parsed(ParsedTrack),
    NoUsableMappings(RejectionReport),
}

impl TrackOutcome {
    pub fn report(&self) -> &RejectionReport {
        match self {
            TrackOutcome::Parsed(track) => &track.report,
            TrackOutcome::NoUsableMappings(report) => report,
        }
    }

    pub fn summary(&self) -> Result<TrackSummary, ReaddiffError> {
        Ok(match self {
            TrackOutcome::Parsed(track) => TrackSummary {
                usable: true,
                cancelled: track.cancelled,
                mappings: track.mappings.len(),
                spliced: track.mappings.iter().filter(|m| m.is_spliced()).count(),
                perfect: track.mappings.iter().filter(|m| m.is_perfect()).count(),
                distinct_sequences: track.distinct_sequences,
                coverage: Some(track.coverage.summary()?),
                report: track.report.clone(),
            },
            TrackOutcome::NoUsableMappings(report) => TrackSummary {
                usable: false,
                cancelled: false,
                mappings: 0,
                spliced: 0,
                perfect: 0,
                distinct_sequences: 0,
                coverage: None,
                report: report.clone(),
            },
        })
    }
}

/// JSON-friendly overview of a track outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackSummary {
    pub usable: bool,
    pub cancelled: bool,
    pub mappings: usize,
    pub spliced: usize,
    pub perfect: usize,
    pub distinct_sequences: usize,
    pub coverage: Option<CoverageSummary>,
    pub report: RejectionReport,
}

pub enum TrackInput {
    /// A .sam or .bam file.
    Path(PathBuf),

    Records(Vec<InputRecord>),
}

pub struct TrackJob {
    pub name: String,
    pub input: TrackInput,
}

impl TrackJob {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            name: path.display().to_string(),
            input: TrackInput::Path(path),
        }
    }

    fn run(
        self,
        reference: Arc<dyn ReferenceSequenceProvider>,
        window: TrackWindow,
        settings: DecoderSettings,
        cancel: &CancellationToken,
    ) -> Result<TrackOutcome, ReaddiffError> {
        let parser = TrackParser::new(reference, window, settings)?;
        match self.input {
            TrackInput::Path(path) => parser.parse(RecordSource::open(&path)?, cancel),
            TrackInput::Records(records) => parser.parse(records.into_iter().map(Ok), cancel),
        }
    }
}

/// Parse tracks concurrently on the blocking pool, at most `settings.parallelism()` at a time.
/// Results come back in job order.
pub async fn parse_tracks(
    jobs: Vec<TrackJob>,
    reference: Arc<dyn ReferenceSequenceProvider>,
    window: TrackWindow,
    settings: DecoderSettings,
    cancel: CancellationToken,
) -> Vec<(String, Result<TrackOutcome, ReaddiffError>)> {
    let semaphore = Arc::new(Semaphore::new(settings.parallelism()));

    let mut handles = Vec::with_capacity(jobs.len());
    for job in jobs {
        let name = job.name.clone();
        let semaphore = semaphore.clone();
        let reference = reference.clone();
        let window = window.clone();
        let settings = settings.clone();
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| ReaddiffError::Worker(e.to_string()))?;
            tracing::debug!(track = %job.name, "parsing track");
            tokio::task::spawn_blocking(move || job.run(reference, window, settings, &cancel))
                .await?
        });
        handles.push((name, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &outcome {
            tracing::error!(track = %name, error = %e, "track failed");
        }
        outcomes.push((name, outcome));
    }
    outcomes
}
