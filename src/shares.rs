//! Branch indices and XOR-shared 32-bit words
//!
//! Every wire of the circuit is a 32-bit word split into `N` shares whose XOR
//! is the real value. The prover holds all three branches (`N = 3`); the
//! verifier replays two of them (`N = 2`). The free gadgets (XOR, NOT,
//! rotate, shift) are defined here because they act share-by-share and never
//! touch randomness.
//!
//! Branch arithmetic is modulo 3 and lives in [`Branch::next`] /
//! [`Branch::prev`] so that call sites never spell out `(i + 1) % 3`.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fmt;
use std::ops::{Index, IndexMut};

/// Number of simulated parties.
pub const NUM_BRANCHES: usize = 3;

/// Number of parties opened to the verifier in each round.
pub const OPENED_BRANCHES: usize = 2;

/// Index of a branch `b ∈ {0, 1, 2}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Branch(u8);

impl Branch {
    /// All three branches in index order.
    pub const ALL: [Branch; NUM_BRANCHES] = [Branch(0), Branch(1), Branch(2)];

    /// Build a branch from any integer, reducing modulo 3.
    #[inline]
    pub fn wrapping(i: usize) -> Self {
        Branch((i % NUM_BRANCHES) as u8)
    }

    /// Neighbour `b + 1 mod 3`.
    #[inline]
    pub fn next(self) -> Self {
        Branch((self.0 + 1) % NUM_BRANCHES as u8)
    }

    /// Neighbour `b + 2 mod 3` (equivalently `b − 1`).
    #[inline]
    pub fn prev(self) -> Self {
        Branch((self.0 + 2) % NUM_BRANCHES as u8)
    }

    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 32-bit word held as `N` XOR shares.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shares<const N: usize>(pub [u32; N]);

impl<const N: usize> Shares<N> {
    /// Every branch holds the public constant `k`.
    ///
    /// With three branches the XOR reconstructs `k`; the two-branch form
    /// mirrors what the verifier sees of the same broadcast.
    #[inline]
    pub fn broadcast(k: u32) -> Self {
        Shares([k; N])
    }

    #[inline]
    pub fn xor(self, other: Self) -> Self {
        let mut out = self.0;
        for (o, y) in out.iter_mut().zip(other.0) {
            *o ^= y;
        }
        Shares(out)
    }

    #[inline]
    pub fn not(self) -> Self {
        Shares(self.0.map(|x| !x))
    }

    #[inline]
    pub fn rotr(self, n: u32) -> Self {
        Shares(self.0.map(|x| x.rotate_right(n)))
    }

    #[inline]
    pub fn shr(self, n: u32) -> Self {
        Shares(self.0.map(|x| x >> n))
    }

    /// XOR of all shares. Only meaningful when all branches are present.
    #[inline]
    pub fn reconstruct(self) -> u32 {
        self.0.iter().fold(0, |acc, x| acc ^ x)
    }
}

impl Shares<NUM_BRANCHES> {
    /// The two shares a verifier sees under challenge `e`: branches `e`, `e + 1`.
    #[inline]
    pub fn opened(self, e: Branch) -> Shares<OPENED_BRANCHES> {
        Shares([self[e], self[e.next()]])
    }
}

impl Index<Branch> for Shares<NUM_BRANCHES> {
    type Output = u32;

    #[inline]
    fn index(&self, b: Branch) -> &u32 {
        &self.0[b.as_usize()]
    }
}

impl IndexMut<Branch> for Shares<NUM_BRANCHES> {
    #[inline]
    fn index_mut(&mut self, b: Branch) -> &mut u32 {
        &mut self.0[b.as_usize()]
    }
}

/// `bit(x, i)` as `0` or `1`.
#[inline]
pub fn bit(x: u32, i: u32) -> u32 {
    (x >> i) & 1
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_neighbours_wrap() {
        let [b0, b1, b2] = Branch::ALL;
        assert_eq!(b0.next(), b1);
        assert_eq!(b2.next(), b0);
        assert_eq!(b0.prev(), b2);
        assert_eq!(b1.prev(), b0);
        for b in Branch::ALL {
            assert_eq!(b.next().prev(), b);
            assert_ne!(b.next(), b.prev());
        }
        assert_eq!(Branch::wrapping(7), b1);
    }

    #[test]
    fn free_gadgets_commute_with_reconstruction() {
        let x = Shares([0xdead_beef, 0x0123_4567, 0x89ab_cdef]);
        let y = Shares([0x1111_2222, 0x3333_4444, 0x5555_6666]);
        let (vx, vy) = (x.reconstruct(), y.reconstruct());

        assert_eq!(x.xor(y).reconstruct(), vx ^ vy);
        assert_eq!(x.rotr(7).reconstruct(), vx.rotate_right(7));
        assert_eq!(x.shr(10).reconstruct(), vx >> 10);
        // Three complements: !a ^ !b ^ !c == !(a ^ b ^ c).
        assert_eq!(x.not().reconstruct(), !vx);
        assert_eq!(Shares::<3>::broadcast(0x6a09_e667).reconstruct(), 0x6a09_e667);
    }

    #[test]
    fn bit_extracts_single_positions() {
        assert_eq!(bit(0b1010, 1), 1);
        assert_eq!(bit(0b1010, 2), 0);
        assert_eq!(bit(0x8000_0000, 31), 1);
    }
}
