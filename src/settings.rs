use crate::error::ReaddiffError;
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do with a read base outside A/C/G/T/N.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownBasePolicy {
    /// Fail the record with an unknown-base error.
    #[default]
    Reject,

    /// Store the base as observed (upper-cased), without complementing.
    PassThrough,
}

/// Behavioral switches for decoding a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderSettings {
    /// Fold multiply-mapped records into coverage.
    pub count_multi_mapped: bool,

    pub unknown_bases: UnknownBasePolicy,

    /// Rejected records kept as examples in the report, per track.
    pub rejection_sample_size: usize,

    /// Tracks decoded at the same time. None: one per available core.
    pub max_parallel_tracks: Option<usize>,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            count_multi_mapped: true,
            unknown_bases: UnknownBasePolicy::default(),
            rejection_sample_size: 10,
            max_parallel_tracks: None,
        }
    }
}

impl DecoderSettings {
    pub fn from_json_str(json: &str) -> Result<Self, ReaddiffError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ReaddiffError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ReaddiffError::Settings(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn parallelism(&self) -> usize {
        self.max_parallel_tracks
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Only log warnings and errors.
    #[arg(short = 'q', long = "quiet", global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode alignment files against a reference window and print per-track summaries.
    Decode {
        /// Alignment files, one track each (Currently supports: .sam, .bam)
        #[arg(value_name = "PATHS", required = true)]
        paths: Vec<PathBuf>,

        /// Indexed FASTA reference (a .fai next to it is required).
        #[arg(short = 'r', long = "reference")]
        reference: PathBuf,

        /// Reference sequence name, e.g. "chr1".
        #[arg(short = 'c', long = "chromosome")]
        chromosome: String,

        /// Window start, 1-based, inclusive.
        #[arg(long = "from", default_value_t = 1)]
        from: u64,

        /// Window end, 1-based, inclusive.
        #[arg(long = "to")]
        to: u64,

        /// JSON file with decoder settings.
        #[arg(long = "settings")]
        settings: Option<PathBuf>,

        /// Override: leave multiply-mapped reads out of coverage.
        #[arg(long = "unique-only")]
        unique_only: bool,

        /// Override: handling of bases outside A/C/G/T/N.
        #[arg(long = "unknown-bases", value_enum)]
        unknown_bases: Option<UnknownBasePolicy>,
    },
}

/// Everything a `decode` run needs, after merging CLI flags over the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSettings {
    pub paths: Vec<PathBuf>,
    pub reference: PathBuf,
    pub chromosome: String,
    pub from: u64,
    pub to: u64,
    pub decoder: DecoderSettings,
}

impl DecodeSettings {
    pub fn new(command: Commands) -> Result<Self, ReaddiffError> {
        let Commands::Decode {
            paths,
            reference,
            chromosome,
            from,
            to,
            settings,
            unique_only,
            unknown_bases,
        } = command;

        if from == 0 || from > to {
            return Err(ReaddiffError::Settings(format!(
                "invalid window {}-{}",
                from, to
            )));
        }

        let mut decoder = match settings {
            Some(path) => DecoderSettings::from_json_file(&path)?,
            None => DecoderSettings::default(),
        };
        if unique_only {
            decoder.count_multi_mapped = false;
        }
        if let Some(policy) = unknown_bases {
            decoder.unknown_bases = policy;
        }

        Ok(Self {
            paths,
            reference,
            chromosome,
            from,
            to,
            decoder,
        })
    }
}
