use crate::error::ReferenceError;
use crate::sequence::{check_range, ReferenceSequenceProvider};
use noodles::core::{Position, Region};
use noodles::fasta::{
    fai::Index,
    io::{
        indexed_reader::{Builder, IndexedReader},
        BufReader,
    },
};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

type Reader = IndexedReader<BufReader<File>>;

/// FASTA reference with a .fai index next to it.
///
/// Each query takes an idle reader out of the pool, or opens a new one, and puts it back
/// afterwards. Concurrent workers never wait on each other's reads.
pub struct IndexedFastaReference {
    path: PathBuf,

    index: Index,

    idle: Mutex<Vec<Reader>>,
}

impl IndexedFastaReference {
    pub fn new(path: &Path) -> Result<Self, ReferenceError> {
        let reader = Builder::default().build_from_path(path)?;
        let index = reader.index().clone();
        tracing::debug!(path = %path.display(), sequences = index.as_ref().len(), "opened reference");
        Ok(Self {
            path: path.to_path_buf(),
            index,
            idle: Mutex::new(vec![reader]),
        })
    }

    /// Sequence names in index order.
    pub fn sequence_names(&self) -> Vec<String> {
        self.index
            .as_ref()
            .iter()
            .map(|record| {
                let name: &[u8] = record.name().as_ref();
                String::from_utf8_lossy(name).to_string()
            })
            .collect()
    }

    fn checkout(&self) -> Result<Reader, ReferenceError> {
        let idle = self
            .idle
            .lock()
            .map_err(|_| io::Error::other("reference reader pool poisoned"))?
            .pop();
        match idle {
            Some(reader) => Ok(reader),
            None => {
                tracing::debug!(path = %self.path.display(), "opening another reference reader");
                Ok(Builder::default()
                    .set_index(self.index.clone())
                    .build_from_path(&self.path)?)
            }
        }
    }

    fn release(&self, reader: Reader) {
        if let Ok(mut idle) = self.idle.lock() {
            idle.push(reader);
        }
    }

    #[cfg(test)]
    fn idle_readers(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }
}

fn position(
    chromosome: &str,
    start: u64,
    stop: u64,
    length: u64,
    value: u64,
) -> Result<Position, ReferenceError> {
    Position::try_from(value as usize).map_err(|_| ReferenceError::OutOfRange {
        chromosome: chromosome.to_string(),
        start,
        stop,
        length,
    })
}

impl ReferenceSequenceProvider for IndexedFastaReference {
    fn get_subsequence(
        &self,
        chromosome: &str,
        start: u64,
        stop: u64,
    ) -> Result<Vec<u8>, ReferenceError> {
        let length = self
            .sequence_length(chromosome)
            .ok_or_else(|| ReferenceError::UnknownSequence(chromosome.to_string()))?;
        check_range(chromosome, start, stop, length)?;

        let region = Region::new(
            chromosome,
            position(chromosome, start, stop, length, start)?
                ..=position(chromosome, start, stop, length, stop)?,
        );

        let mut reader = self.checkout()?;
        let record = reader.query(&region);
        self.release(reader);
        Ok(record?.sequence().as_ref().to_vec())
    }

    fn sequence_length(&self, chromosome: &str) -> Option<u64> {
        self.index.as_ref().iter().find_map(|record| {
            let name: &[u8] = record.name().as_ref();
            (name == chromosome.as_bytes()).then(|| record.length())
        })
    }
}
