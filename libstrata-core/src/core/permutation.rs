//! The logical-to-physical qubit permutation.
//!
//! Two inverse tables of length `n`. Only the interchange protocol mutates
//! an installed permutation; gates read it during dispatch.

use crate::core::error::{Error, Result};
use crate::core::qubit::Qubit;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    to_physical: Vec<u32>,
    to_logical: Vec<u32>,
}

impl Permutation {
    pub fn identity(num_qubits: u32) -> Permutation {
        Permutation {
            to_physical: (0..num_qubits).collect(),
            to_logical: (0..num_qubits).collect(),
        }
    }

    /// Builds from a caller-supplied table mapping logical qubit `q` to
    /// physical position `table[q]`. The table must be a permutation of
    /// `[0, n)`.
    pub fn from_table(table: &[u32]) -> Result<Permutation> {
        let n = table.len() as u32;
        let mut to_logical = vec![u32::MAX; table.len()];
        for (logical, &physical) in table.iter().enumerate() {
            if physical >= n {
                return Err(Error::PermutationInvariant(format!(
                    "position {} out of range for {} qubits",
                    physical, n
                )));
            }
            if to_logical[physical as usize] != u32::MAX {
                return Err(Error::PermutationInvariant(format!(
                    "position {} mapped twice",
                    physical
                )));
            }
            to_logical[physical as usize] = logical as u32;
        }
        Ok(Permutation {
            to_physical: table.to_vec(),
            to_logical,
        })
    }

    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.to_physical.len() as u32
    }

    /// The physical position of a logical qubit.
    #[inline]
    pub fn to_physical(&self, qubit: Qubit) -> Qubit {
        Qubit(self.to_physical[qubit.0 as usize])
    }

    /// The logical qubit at a physical position.
    #[inline]
    pub fn to_logical(&self, position: Qubit) -> Qubit {
        Qubit(self.to_logical[position.0 as usize])
    }

    /// Records that the amplitudes addressed by positions `p1` and `p2`
    /// have been interchanged: the logical qubits at those positions swap
    /// images.
    pub fn swap_positions(&mut self, p1: Qubit, p2: Qubit) {
        let a = self.to_logical[p1.0 as usize];
        let b = self.to_logical[p2.0 as usize];
        self.to_logical.swap(p1.0 as usize, p2.0 as usize);
        self.to_physical[a as usize] = p2.0;
        self.to_physical[b as usize] = p1.0;
    }

    /// Maps a logical basis integer to its physical address: bit `q` of
    /// `logical` becomes bit `to_physical(q)` of the result.
    pub fn permute_bits(&self, logical: u64) -> u64 {
        let mut physical = 0u64;
        for (q, &p) in self.to_physical.iter().enumerate() {
            physical |= ((logical >> q) & 1) << p;
        }
        physical
    }

    /// Inverse of [`Permutation::permute_bits`].
    pub fn unpermute_bits(&self, physical: u64) -> u64 {
        let mut logical = 0u64;
        for (q, &p) in self.to_physical.iter().enumerate() {
            logical |= ((physical >> p) & 1) << q;
        }
        logical
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips() {
        let pi = Permutation::identity(5);
        for q in 0..5 {
            assert_eq!(pi.to_physical(Qubit(q)), Qubit(q));
            assert_eq!(pi.to_logical(Qubit(q)), Qubit(q));
        }
        assert_eq!(pi.permute_bits(0b10110), 0b10110);
    }

    #[test]
    fn from_table_validates() {
        assert!(Permutation::from_table(&[2, 0, 1]).is_ok());
        assert!(Permutation::from_table(&[0, 0, 1]).is_err());
        assert!(Permutation::from_table(&[0, 1, 3]).is_err());
    }

    #[test]
    fn tables_stay_inverse_under_swaps() {
        let mut pi = Permutation::from_table(&[2, 0, 1, 3]).unwrap();
        pi.swap_positions(Qubit(3), Qubit(0));
        for q in 0..4 {
            assert_eq!(pi.to_logical(pi.to_physical(Qubit(q))), Qubit(q));
        }
        // Logical 1 sat at position 0; it now sits at position 3.
        assert_eq!(pi.to_physical(Qubit(1)), Qubit(3));
        assert_eq!(pi.to_physical(Qubit(3)), Qubit(0));
    }

    #[test]
    fn permute_bits_follows_table() {
        let pi = Permutation::from_table(&[1, 2, 0]).unwrap();
        // logical 0b001 (qubit 0 set) -> physical bit 1.
        assert_eq!(pi.permute_bits(0b001), 0b010);
        assert_eq!(pi.permute_bits(0b100), 0b001);
        assert_eq!(pi.unpermute_bits(pi.permute_bits(0b101)), 0b101);
    }
}
