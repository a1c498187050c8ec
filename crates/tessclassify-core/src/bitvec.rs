//! Bit vector - fixed-length bit set over u32 words
//!
//! Proto and config memberships are bit vectors throughout the matcher.
//! The packed word layout is part of the template format, so the words
//! are exposed directly for the inner matching loops and serialization.
//!
//! # See also
//!
//! C Tesseract: `BIT_VECTOR` with `SET_BIT` / `reset_bit` / `test_bit`
//! macros in `bitvec.h`

/// Bits per storage word; fixed by the template file layout.
pub const BITS_PER_WORD: usize = 32;

/// Number of u32 words needed to hold `num_bits` bits.
#[inline]
pub fn words_for_bits(num_bits: usize) -> usize {
    num_bits.div_ceil(BITS_PER_WORD)
}

/// Fixed-length bit vector backed by u32 words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitVec {
    words: Vec<u32>,
    num_bits: usize,
}

impl BitVec {
    /// Create a bit vector of `num_bits` bits, all zero.
    pub fn new(num_bits: usize) -> Self {
        Self {
            words: vec![0; words_for_bits(num_bits)],
            num_bits,
        }
    }

    /// Create a bit vector of `num_bits` bits, all one.
    ///
    /// Bits in the last word beyond `num_bits` are also set; the matcher
    /// masks against real proto/config words, so stray high bits select
    /// nothing.
    pub fn all_set(num_bits: usize) -> Self {
        Self {
            words: vec![u32::MAX; words_for_bits(num_bits)],
            num_bits,
        }
    }

    /// Rebuild from raw words, e.g. when deserializing.
    pub fn from_words(words: Vec<u32>, num_bits: usize) -> Self {
        debug_assert!(words.len() >= words_for_bits(num_bits));
        Self { words, num_bits }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.num_bits
    }

    /// True if the vector holds no bits.
    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Set a bit.
    #[inline]
    pub fn set(&mut self, bit: usize) {
        debug_assert!(bit < self.num_bits);
        self.words[bit / BITS_PER_WORD] |= 1 << (bit % BITS_PER_WORD);
    }

    /// Clear a bit.
    #[inline]
    pub fn clear(&mut self, bit: usize) {
        debug_assert!(bit < self.num_bits);
        self.words[bit / BITS_PER_WORD] &= !(1 << (bit % BITS_PER_WORD));
    }

    /// Test a bit. Out-of-range bits read as zero.
    #[inline]
    pub fn test(&self, bit: usize) -> bool {
        if bit >= self.num_bits {
            return false;
        }
        self.words[bit / BITS_PER_WORD] & (1 << (bit % BITS_PER_WORD)) != 0
    }

    /// Set all bits.
    pub fn set_all(&mut self) {
        self.words.fill(u32::MAX);
    }

    /// Clear all bits.
    pub fn clear_all(&mut self) {
        self.words.fill(0);
    }

    /// Raw word, zero when past the end. The matcher walks fixed word
    /// counts regardless of how long the caller's mask is.
    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// All backing words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Ids of all set bits, ascending.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_bits).filter(|&bit| self.test(bit))
    }
}
