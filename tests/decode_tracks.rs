//! End-to-end decoding of SAM and BAM tracks against an indexed FASTA reference.
use noodles::sam::alignment::io::Write as _;
use readdiff::alignment::Classification;
use readdiff::pipeline::{parse_tracks, RejectionKind, TrackJob, TrackOutcome, TrackWindow};
use readdiff::sequence::{IndexedFastaReference, ReferenceSequenceProvider};
use readdiff::settings::DecoderSettings;
use readdiff::Strand;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const SAM: &str = "@HD\tVN:1.6\n\
@SQ\tSN:chr1\tLN:100\n\
@SQ\tSN:chr2\tLN:4\n\
r1\t0\tchr1\t1\t60\t8M\t*\t0\t0\tACGTACCT\t*\tNH:i:1\n\
r2\t16\tchr1\t5\t60\t2M1I3M\t*\t0\t0\tACTGTA\t*\n\
r3\t0\tchr1\t11\t60\t2S4M2D4M\t*\t0\t0\tTTGTACACGT\t*\tNH:i:2\n\
r4\t0\tchr1\t38\t60\t4M\t*\t0\t0\tACGT\t*\n\
r5\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n\
r6\t0\tchr2\t1\t60\t4M\t*\t0\t0\tTTTT\t*\n";

const UNMAPPED_SAM: &str = "@HD\tVN:1.6\n\
@SQ\tSN:chr1\tLN:100\n\
u1\t4\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\n";

struct Fixture {
    _dir: tempfile::TempDir,
    reference: PathBuf,
    sam: PathBuf,
    bam: PathBuf,
    unmapped: PathBuf,
}

fn write_reference(dir: &Path) -> PathBuf {
    let path = dir.join("ref.fa");
    let sequence = "ACGT".repeat(10);
    let mut fasta = String::from(">chr1\n");
    for line in sequence.as_bytes().chunks(10) {
        fasta.push_str(std::str::from_utf8(line).unwrap());
        fasta.push('\n');
    }
    fs::write(&path, fasta).unwrap();
    fs::write(dir.join("ref.fa.fai"), "chr1\t40\t6\t10\t11\n").unwrap();
    path
}

fn sam_to_bam(sam: &Path, bam: &Path) {
    let mut reader = noodles::sam::io::Reader::new(BufReader::new(File::open(sam).unwrap()));
    let header = reader.read_header().unwrap();

    let mut writer = noodles::bam::io::Writer::new(File::create(bam).unwrap());
    writer.write_header(&header).unwrap();
    for result in reader.record_bufs(&header) {
        let record = result.unwrap();
        writer.write_alignment_record(&header, &record).unwrap();
    }
    // dropping the writer writes the BGZF EOF block
    drop(writer);
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let reference = write_reference(dir.path());

    let sam = dir.path().join("reads.sam");
    fs::write(&sam, SAM).unwrap();
    let bam = dir.path().join("reads.bam");
    sam_to_bam(&sam, &bam);

    let unmapped = dir.path().join("unmapped.sam");
    fs::write(&unmapped, UNMAPPED_SAM).unwrap();

    Fixture {
        _dir: dir,
        reference,
        sam,
        bam,
        unmapped,
    }
}

async fn decode(fixture: &Fixture, paths: Vec<PathBuf>) -> Vec<TrackOutcome> {
    let reference: Arc<dyn ReferenceSequenceProvider> =
        Arc::new(IndexedFastaReference::new(&fixture.reference).unwrap());
    let jobs = paths.into_iter().map(TrackJob::from_path).collect();

    parse_tracks(
        jobs,
        reference,
        TrackWindow::new("chr1", 1, 40),
        DecoderSettings::default(),
        CancellationToken::new(),
    )
    .await
    .into_iter()
    .map(|(name, outcome)| outcome.unwrap_or_else(|e| panic!("{}: {}", name, e)))
    .collect()
}

#[tokio::test]
async fn test_sam_track() {
    let fixture = fixture();
    let outcomes = decode(&fixture, vec![fixture.sam.clone()]).await;
    let TrackOutcome::Parsed(track) = &outcomes[0] else {
        panic!("expected a parsed track");
    };

    let report = &track.report;
    assert_eq!(report.records, 6);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.unmapped, 1);
    assert_eq!(report.other_chromosome, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.count(RejectionKind::ReferenceUnavailable), 1);
    assert_eq!(report.samples[0].read_name, "r4");

    let names = track
        .mappings
        .iter()
        .map(|m| (m.start, m.stop))
        .collect::<Vec<_>>();
    assert_eq!(names, vec![(1, 8), (5, 9), (11, 20)]);

    let r1 = &track.mappings[0];
    assert_eq!(r1.diffs.len(), 1);
    assert_eq!((r1.diffs[0].position, r1.diffs[0].base), (7, b'C'));

    let r2 = &track.mappings[1];
    assert_eq!(r2.strand, Strand::Reverse);
    assert_eq!(
        (r2.gaps[0].position, r2.gaps[0].base, r2.gaps[0].order),
        (7, b'A', 0)
    );

    // 2S4M2D4M at 11: soft clip skipped, positions 15 and 16 deleted
    let r3 = &track.mappings[2];
    let deleted = r3
        .diffs
        .iter()
        .map(|d| (d.position, d.base))
        .collect::<Vec<_>>();
    assert_eq!(deleted, vec![(15, b'_'), (16, b'_')]);
    assert_eq!(r3.mismatch_count, 2);

    let coverage = &track.coverage;
    assert_eq!(
        coverage.coverage_at(6, Strand::Forward, Classification::Unique),
        1
    );
    assert_eq!(
        coverage.coverage_at(6, Strand::Reverse, Classification::Unique),
        1
    );
    assert_eq!(
        coverage.coverage_at(15, Strand::Forward, Classification::MultiMapped),
        1
    );
    assert_eq!(coverage.total_at(21), 0);
}

#[tokio::test]
async fn test_bam_matches_sam() {
    let fixture = fixture();
    let outcomes = decode(&fixture, vec![fixture.sam.clone(), fixture.bam.clone()]).await;

    let summaries = outcomes
        .iter()
        .map(|o| o.summary().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(summaries[0], summaries[1]);

    let (TrackOutcome::Parsed(sam), TrackOutcome::Parsed(bam)) = (&outcomes[0], &outcomes[1])
    else {
        panic!("expected parsed tracks");
    };
    assert_eq!(sam.mappings, bam.mappings);
}

#[tokio::test]
async fn test_track_without_usable_mappings() {
    let fixture = fixture();
    let outcomes = decode(&fixture, vec![fixture.unmapped.clone()]).await;

    let TrackOutcome::NoUsableMappings(report) = &outcomes[0] else {
        panic!("expected no usable mappings");
    };
    assert_eq!(report.records, 1);
    assert_eq!(report.unmapped, 1);
}

#[test]
fn test_decode_command_prints_one_line_per_track() {
    let fixture = fixture();
    let output = Command::new(env!("CARGO_BIN_EXE_readdiff"))
        .arg("decode")
        .arg("-q")
        .arg("-r")
        .arg(&fixture.reference)
        .args(["-c", "chr1", "--to", "4000000000"])
        .arg(&fixture.sam)
        .arg(&fixture.unmapped)
        .output()
        .expect("failed to spawn readdiff");
    assert!(output.status.success(), "{:?}", output);

    let lines = String::from_utf8(output.stdout)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["summary"]["usable"], true);
    assert_eq!(lines[0]["summary"]["mappings"], 3);
    assert_eq!(
        lines[0]["summary"]["report"]["by_kind"]["reference_unavailable"],
        1
    );
    assert_eq!(lines[1]["summary"]["usable"], false);
}

#[test]
fn test_decode_command_rejects_unknown_chromosome() {
    let fixture = fixture();
    let output = Command::new(env!("CARGO_BIN_EXE_readdiff"))
        .arg("decode")
        .arg("-r")
        .arg(&fixture.reference)
        .args(["-c", "chrZ", "--to", "40"])
        .arg(&fixture.sam)
        .output()
        .expect("failed to spawn readdiff");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("chr1"));
}
