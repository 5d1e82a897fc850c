use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub const ALL: [Strand; 2] = [Strand::Forward, Strand::Reverse];

    pub fn from_reverse_flag(is_reverse: bool) -> Self {
        if is_reverse {
            Strand::Reverse
        } else {
            Strand::Forward
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }

    /// Bring a read base into forward-reference orientation, upper case.
    /// None for anything outside A/C/G/T/N.
    pub fn orient(self, base: u8) -> Option<u8> {
        let upper = base.to_ascii_uppercase();
        match self {
            Strand::Forward => match upper {
                b'A' | b'C' | b'G' | b'T' | b'N' => Some(upper),
                _ => None,
            },
            Strand::Reverse => complement(upper),
        }
    }
}

/// A<->T, C<->G, N<->N. Upper case in, upper case out.
pub fn complement(base: u8) -> Option<u8> {
    match base {
        b'A' => Some(b'T'),
        b'T' => Some(b'A'),
        b'C' => Some(b'G'),
        b'G' => Some(b'C'),
        b'N' => Some(b'N'),
        _ => None,
    }
}
