/// Row-selection bitsets
///
/// One bit per dataset row. AND/OR/NOT combine selections of equal length;
/// indices come back in ascending row order.
use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowSelection {
    bits: BitVec,
}

impl RowSelection {
    pub fn none(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
        }
    }

    pub fn all(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(true, len),
        }
    }

    pub fn from_fn(len: usize, mut f: impl FnMut(usize) -> bool) -> Self {
        Self {
            bits: (0..len).map(&mut f).collect(),
        }
    }

    pub fn from_indices(len: usize, indices: &[usize]) -> Self {
        let mut selection = Self::none(len);
        for &i in indices {
            if i < len {
                selection.bits.set(i, true);
            }
        }
        selection
    }

    /// Number of rows covered (selected or not)
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Number of selected rows
    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn contains(&self, row: usize) -> bool {
        self.bits.get(row).map(|b| *b).unwrap_or(false)
    }

    pub fn is_full(&self) -> bool {
        self.bits.all()
    }

    pub fn is_none_selected(&self) -> bool {
        self.bits.not_any()
    }

    pub fn indices(&self) -> Vec<usize> {
        self.bits.iter_ones().collect()
    }

    /// Intersection
    pub fn and(&self, other: &RowSelection) -> RowSelection {
        Self {
            bits: self
                .bits
                .iter()
                .by_vals()
                .zip(other.bits.iter().by_vals())
                .map(|(a, b)| a && b)
                .collect(),
        }
    }

    /// Union
    pub fn or(&self, other: &RowSelection) -> RowSelection {
        Self {
            bits: self
                .bits
                .iter()
                .by_vals()
                .zip(other.bits.iter().by_vals())
                .map(|(a, b)| a || b)
                .collect(),
        }
    }

    /// Complement against the full row index set
    pub fn invert(&self) -> RowSelection {
        Self {
            bits: self.bits.iter().by_vals().map(|b| !b).collect(),
        }
    }
}

/// Serialized as its ascending index list
#[derive(Serialize, Deserialize)]
struct SelectionRepr {
    len: usize,
    rows: Vec<usize>,
}

impl Serialize for RowSelection {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        SelectionRepr {
            len: self.len(),
            rows: self.indices(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RowSelection {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = SelectionRepr::deserialize(deserializer)?;
        Ok(RowSelection::from_indices(repr.len, &repr.rows))
    }
}
