mod fasta;

use crate::error::ReferenceError;
use std::collections::HashMap;

pub use crate::sequence::fasta::IndexedFastaReference;

/// Read-only access to reference bases. Shared by every track worker.
pub trait ReferenceSequenceProvider: Send + Sync {
    /// Bases in [start, stop] of a chromosome. 1-based, inclusive.
    fn get_subsequence(
        &self,
        chromosome: &str,
        start: u64,
        stop: u64,
    ) -> Result<Vec<u8>, ReferenceError>;

    /// Chromosome length, None if the chromosome is unknown.
    fn sequence_length(&self, chromosome: &str) -> Option<u64>;
}

/// Reject [start, stop] unless it lies within a chromosome of `length` bases.
fn check_range(chromosome: &str, start: u64, stop: u64, length: u64) -> Result<(), ReferenceError> {
    if start == 0 || start > stop || stop > length {
        return Err(ReferenceError::OutOfRange {
            chromosome: chromosome.to_string(),
            start,
            stop,
            length,
        });
    }
    Ok(())
}

/// Whole chromosomes held in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryReference {
    sequences: HashMap<String, Vec<u8>>,
}

impl InMemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sequence(mut self, chromosome: &str, sequence: &[u8]) -> Self {
        self.insert(chromosome, sequence);
        self
    }

    pub fn insert(&mut self, chromosome: &str, sequence: &[u8]) {
        self.sequences
            .insert(chromosome.to_string(), sequence.to_vec());
    }
}

impl ReferenceSequenceProvider for InMemoryReference {
    fn get_subsequence(
        &self,
        chromosome: &str,
        start: u64,
        stop: u64,
    ) -> Result<Vec<u8>, ReferenceError> {
        let sequence = self
            .sequences
            .get(chromosome)
            .ok_or_else(|| ReferenceError::UnknownSequence(chromosome.to_string()))?;
        check_range(chromosome, start, stop, sequence.len() as u64)?;

        Ok(sequence[(start - 1) as usize..stop as usize].to_vec())
    }

    fn sequence_length(&self, chromosome: &str) -> Option<u64> {
        self.sequences.get(chromosome).map(|s| s.len() as u64)
    }
}
