//! Boolean and bitvector terms.

use varisat::Lit;

/// A boolean term: one solver literal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Bool(pub(crate) Lit);

impl std::ops::Not for Bool {
    type Output = Bool;

    fn not(self) -> Bool {
        Bool(!self.0)
    }
}

/// A fixed-width bitvector term, least significant bit first.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Bv {
    pub(crate) bits: Vec<Lit>,
}

impl Bv {
    /// Width in bits.
    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Bit `index` as a boolean term.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn bit(&self, index: usize) -> Bool {
        Bool(self.bits[index])
    }

    /// All bits, least significant first.
    pub fn bits(&self) -> impl Iterator<Item = Bool> + '_ {
        self.bits.iter().map(|&l| Bool(l))
    }

    /// Builds a vector from boolean terms, least significant first.
    pub fn from_bools(bits: &[Bool]) -> Self {
        Self {
            bits: bits.iter().map(|b| b.0).collect(),
        }
    }
}
