use std::collections::HashMap;

/// Canonical form used as the id table key: upper case, as stored.
pub fn normalize(sequence: &[u8]) -> Vec<u8> {
    sequence.to_ascii_uppercase()
}

/// Compact integer ids for distinct read sequences within one parse session.
#[derive(Debug, Default)]
pub struct SequenceIdAssigner {
    ids: HashMap<Vec<u8>, u32>,
}

impl SequenceIdAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of a normalized sequence. New sequences get the next id, starting at 1.
    pub fn assign_id(&mut self, normalized: &[u8]) -> u32 {
        if let Some(id) = self.ids.get(normalized) {
            return *id;
        }
        let id = self.ids.len() as u32 + 1;
        self.ids.insert(normalized.to_vec(), id);
        id
    }

    /// Drop the table. The next new sequence gets id 1 again.
    pub fn reset(&mut self) {
        self.ids = HashMap::new();
    }

    /// Distinct sequences seen since the last reset.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_sequence_same_id() {
        let mut assigner = SequenceIdAssigner::new();
        assert_eq!(assigner.assign_id(b"ACGT"), 1);
        assert_eq!(assigner.assign_id(b"ACGT"), 1);
        assert_eq!(assigner.len(), 1);
    }

    #[test]
    fn test_distinct_sequences() {
        let mut assigner = SequenceIdAssigner::new();
        let first = assigner.assign_id(b"ACGG");
        let second = assigner.assign_id(b"ACGT");
        assert_ne!(first, second);
        assert_eq!(assigner.assign_id(b"ACGG"), first);
        assert_eq!(assigner.assign_id(b"ACGT"), second);
    }

    #[test]
    fn test_reset() {
        let mut assigner = SequenceIdAssigner::new();
        assigner.assign_id(b"ACGG");
        assigner.assign_id(b"ACGT");
        assigner.reset();
        assert!(assigner.is_empty());
        assert_eq!(assigner.assign_id(b"ACGT"), 1);
    }

    #[test]
    fn test_normalize() {
        let mut assigner = SequenceIdAssigner::new();
        let id = assigner.assign_id(&normalize(b"acgT"));
        assert_eq!(assigner.assign_id(&normalize(b"ACGT")), id);
    }
}
