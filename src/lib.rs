pub mod alignment;
pub mod error;
pub mod pipeline;
pub mod repository;
pub mod sequence;
pub mod settings;
pub mod strand;

pub use error::ReaddiffError;
pub use pipeline::{
    parse_tracks, ParsedTrack, RejectionKind, RejectionReport, TrackInput, TrackJob,
    TrackOutcome, TrackParser, TrackSummary, TrackWindow,
};
pub use strand::Strand;
