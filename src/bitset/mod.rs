// src/bitset/mod.rs

//! Fixed-width bit vectors over 32 bit limbs.
//!
//! Index `n` lives in limb `n / 32` at bit `31 - (n % 32)`, so walking a limb
//! with [`first_bit`] (leading zero count) yields indices in ascending order.
//!
//! [`BitList`] is the sparse form used by the dependency map: only the
//! non-zero limbs of a set, as `(limb index, limb mask)` pairs. Applying one
//! touches exactly those limbs.

use std::fmt;

const LIMB_BITS: usize = 32;

/// Position of the highest set bit counted from the top (`leading_zeros`).
///
/// Returns 32 for an empty word.
#[inline]
pub fn first_bit(word: u32) -> u32 {
    word.leading_zeros()
}

/// Limb mask selecting `bit` (counted from the top of the limb).
#[inline]
pub fn limb_mask(bit: u32) -> u32 {
    1 << (31 - (bit & 31))
}

/// Global index of `bit` inside limb number `limb`.
#[inline]
pub fn bit_index(limb: usize, bit: u32) -> usize {
    (limb << 5) + bit as usize
}

#[inline]
fn locate(n: usize) -> (usize, u32) {
    (n / LIMB_BITS, limb_mask((n % LIMB_BITS) as u32))
}

/// A set of small non-negative integers (task indices).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitset {
    limbs: Vec<u32>,
}

impl Bitset {
    /// Zero-filled bitset sized for `len` bits.
    pub fn with_len(len: usize) -> Self {
        Self {
            limbs: vec![0; len.div_ceil(LIMB_BITS)],
        }
    }

    pub fn limbs(&self) -> &[u32] {
        &self.limbs
    }

    pub fn limb(&self, index: usize) -> u32 {
        self.limbs.get(index).copied().unwrap_or(0)
    }

    pub fn limb_count(&self) -> usize {
        self.limbs.len()
    }

    pub fn set(&mut self, n: usize) {
        let (index, mask) = locate(n);
        self.ensure_limb(index);
        self.limbs[index] |= mask;
    }

    pub fn clear(&mut self, n: usize) {
        let (index, mask) = locate(n);
        if let Some(limb) = self.limbs.get_mut(index) {
            *limb &= !mask;
        }
    }

    pub fn test(&self, n: usize) -> bool {
        let (index, mask) = locate(n);
        self.limb(index) & mask != 0
    }

    /// OR every pair of `list` into this set.
    pub fn apply(&mut self, list: &BitList) {
        for &(index, mask) in &list.entries {
            self.ensure_limb(index);
            self.limbs[index] |= mask;
        }
    }

    /// Whether any index of `list` is present. Stops at the first hit.
    pub fn intersects(&self, list: &BitList) -> bool {
        list.entries
            .iter()
            .any(|&(index, mask)| self.limb(index) & mask != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    /// Present indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.limbs.iter().enumerate().flat_map(|(i, &limb)| {
            let mut rest = limb;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = first_bit(rest);
                rest &= !limb_mask(bit);
                Some(bit_index(i, bit))
            })
        })
    }

    fn ensure_limb(&mut self, index: usize) {
        if index >= self.limbs.len() {
            self.limbs.resize(index + 1, 0);
        }
    }
}

/// Comma separated limbs, e.g. `2147483648,0`.
impl fmt::Display for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, limb) in self.limbs.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{limb}")?;
        }
        Ok(())
    }
}

impl FromIterator<usize> for Bitset {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut set = Bitset::default();
        for n in iter {
            set.set(n);
        }
        set
    }
}

/// Sparse encoding of a set of indices: the non-zero limbs only, ordered by
/// limb index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitList {
    entries: Vec<(usize, u32)>,
}

impl BitList {
    /// Build from an unordered list of indices. Duplicates are harmless.
    pub fn from_indices(indices: &[usize]) -> Self {
        let set: Bitset = indices.iter().copied().collect();
        let entries = set
            .limbs
            .iter()
            .enumerate()
            .filter(|&(_, &limb)| limb != 0)
            .map(|(i, &limb)| (i, limb))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(usize, u32)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDICES: [usize; 7] = [3, 5, 6, 7, 24, 33, 67];

    #[test]
    fn set_test_and_clear() {
        const N: usize = 44;
        let mut set = Bitset::with_len(N);
        assert_eq!(set.limb_count(), 2);

        for i in 0..N {
            set.set(i);
            for j in 0..N {
                assert_eq!(set.test(j), i == j, "bit {j} after setting {i}");
            }
            set.clear(i);
            assert!(!set.test(i));
        }
        assert!(set.is_empty());
    }

    #[test]
    fn index_zero_is_top_bit_of_first_limb() {
        let mut set = Bitset::with_len(64);
        set.set(0);
        set.set(33);
        assert_eq!(set.limbs(), &[0x8000_0000, 0x4000_0000]);
        assert_eq!(set.to_string(), "2147483648,1073741824");
    }

    #[test]
    fn bit_list_keeps_only_non_zero_limbs() {
        let list = BitList::from_indices(&INDICES);
        let limbs: Vec<usize> = list.entries().iter().map(|&(i, _)| i).collect();
        assert_eq!(limbs, vec![0, 1, 2]);

        let sparse = BitList::from_indices(&[70]);
        assert_eq!(sparse.entries(), &[(2, limb_mask(6))]);
    }

    #[test]
    fn bit_list_intersects_and_applies() {
        const N: usize = 71;
        let list = BitList::from_indices(&INDICES);
        let mut set = Bitset::with_len(N);

        assert!(!set.intersects(&list));
        for i in 0..N {
            set.set(i);
            assert_eq!(set.intersects(&list), INDICES.contains(&i));
            set.clear(i);
        }

        set.apply(&list);
        for i in 0..N {
            assert_eq!(set.test(i), INDICES.contains(&i));
        }

        for &bit in &INDICES {
            set.clear(bit);
        }
        assert!(set.is_empty());
    }

    #[test]
    fn first_bit_walk_is_ascending() {
        let set: Bitset = INDICES.iter().rev().copied().collect();
        let mut walked = Vec::new();
        for (i, &limb) in set.limbs().iter().enumerate() {
            let mut rest = limb;
            while rest != 0 {
                let bit = first_bit(rest);
                walked.push(bit_index(i, bit));
                rest &= !limb_mask(bit);
            }
        }
        assert_eq!(walked, INDICES.to_vec());
        assert_eq!(set.iter().collect::<Vec<_>>(), INDICES.to_vec());
    }

    #[test]
    fn apply_grows_short_sets() {
        let mut set = Bitset::with_len(1);
        set.apply(&BitList::from_indices(&[100]));
        assert!(set.test(100));
        assert_eq!(set.limb_count(), 4);
    }
}
