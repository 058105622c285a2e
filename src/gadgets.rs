//! Randomness-consuming MPC gadgets (AND, ADD) and their composites
//!
//! The free gadgets live on [`Shares`]; this module covers the two gates that
//! draw one tape word per branch and append one word to each branch's trace:
//!
//! - **AND**: replicated 3-party multiplication over GF(2)^32 with a
//!   one-time pad `r_i ⊕ r_{i+1}` so a single branch's output is uniform.
//! - **ADD**: bit-serial ripple-carry built from the same multiplication;
//!   the trace word is the branch's full carry word.
//!
//! Both are expressed through the [`Gadgets`] trait so one circuit function
//! drives the prover ([`ProverGadgets`], three branches, records traces) and
//! the verifier ([`ReplayGadgets`], two branches, checks traces). A shared
//! [`GateCursor`] advances by one gate (four tape bytes) per call.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::fmt;

use crate::prg::RandomTape;
use crate::shares::{bit, Branch, Shares, NUM_BRANCHES, OPENED_BRANCHES};

/// Carry positions propagated by ADD: bits 1..=31 are computed from bits
/// 0..=30. A carry out of bit 31 would land outside the word, so this is
/// exact 32-bit modular addition. Bit 0 of a carry word is always zero and
/// the replay rejects a trace word that sets it.
pub const CARRY_BITS: u32 = 31;

/// Which randomness-consuming gate a trace word belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
    And,
    Add,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateKind::And => f.write_str("AND"),
            GateKind::Add => f.write_str("ADD"),
        }
    }
}

/// Errors surfaced by gadget evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GadgetError {
    /// The replayed output of the first opened branch differs from its trace.
    #[error("{kind} gate {gate} does not match the recorded trace{}", carry_suffix(.carry_bit))]
    Mismatch { gate: usize, kind: GateKind, carry_bit: Option<u32> },
    /// The circuit asked for more gates than the tape/trace holds.
    #[error("gate {gate} is past the end of the randomness tape or trace")]
    Exhausted { gate: usize },
}

fn carry_suffix(carry_bit: &Option<u32>) -> String {
    carry_bit.map(|b| format!(" (carry bit {b})")).unwrap_or_default()
}

/// Index of the next gate; the tape offset is derived from it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GateCursor {
    gate: usize,
}

impl GateCursor {
    /// Gates evaluated so far (= trace words written or consumed).
    #[inline]
    pub fn gate(&self) -> usize {
        self.gate
    }

    /// Byte offset of this gate's word in every branch tape.
    #[inline]
    pub fn tape_offset(&self) -> usize {
        self.gate * 4
    }

    #[inline]
    fn advance(&mut self) {
        self.gate += 1;
    }
}

/// Gate-level operations the SHA-256 circuit is written against.
pub trait Gadgets<const N: usize> {
    /// Error raised by a gate (replay mismatch, exhausted tape).
    type Error;

    /// Shared AND.
    fn and(&mut self, x: Shares<N>, y: Shares<N>) -> Result<Shares<N>, Self::Error>;

    /// Shared 32-bit addition.
    fn add(&mut self, x: Shares<N>, y: Shares<N>) -> Result<Shares<N>, Self::Error>;

    /// Addition of a public constant, broadcast to every branch.
    fn add_const(&mut self, x: Shares<N>, k: u32) -> Result<Shares<N>, Self::Error> {
        self.add(x, Shares::broadcast(k))
    }

    /// `maj(a, b, c) = ((a ⊕ b) ∧ (a ⊕ c)) ⊕ a`, one AND.
    fn maj(&mut self, a: Shares<N>, b: Shares<N>, c: Shares<N>) -> Result<Shares<N>, Self::Error> {
        let t = self.and(a.xor(b), a.xor(c))?;
        Ok(t.xor(a))
    }

    /// `ch(e, f, g) = (e ∧ (f ⊕ g)) ⊕ g`, one AND.
    fn ch(&mut self, e: Shares<N>, f: Shares<N>, g: Shares<N>) -> Result<Shares<N>, Self::Error> {
        let t = self.and(e, f.xor(g))?;
        Ok(t.xor(g))
    }

    /// Gates evaluated so far.
    fn gates(&self) -> usize;
}

// ============================================================================
// Prover side: three branches, traces recorded
// ============================================================================

/// Three-branch gadget context owned by one round's circuit evaluation.
pub struct ProverGadgets<'a> {
    tapes: [&'a RandomTape; NUM_BRANCHES],
    traces: [Vec<u32>; NUM_BRANCHES],
    cursor: GateCursor,
}

impl<'a> ProverGadgets<'a> {
    pub fn new(tapes: [&'a RandomTape; NUM_BRANCHES]) -> Self {
        Self { tapes, traces: Default::default(), cursor: GateCursor::default() }
    }

    /// Traces written so far, one per branch.
    pub fn into_traces(self) -> [Vec<u32>; NUM_BRANCHES] {
        self.traces
    }

    fn draw(&self) -> Result<Shares<NUM_BRANCHES>, GadgetError> {
        let offset = self.cursor.tape_offset();
        let mut r = Shares([0u32; NUM_BRANCHES]);
        for b in Branch::ALL {
            r[b] = self.tapes[b.as_usize()]
                .word(offset)
                .ok_or(GadgetError::Exhausted { gate: self.cursor.gate() })?;
        }
        Ok(r)
    }

    fn record(&mut self, words: Shares<NUM_BRANCHES>) {
        for b in Branch::ALL {
            self.traces[b.as_usize()].push(words[b]);
        }
        self.cursor.advance();
    }
}

impl Gadgets<NUM_BRANCHES> for ProverGadgets<'_> {
    type Error = GadgetError;

    fn and(
        &mut self,
        x: Shares<NUM_BRANCHES>,
        y: Shares<NUM_BRANCHES>,
    ) -> Result<Shares<NUM_BRANCHES>, GadgetError> {
        let r = self.draw()?;
        let mut z = Shares([0u32; NUM_BRANCHES]);
        for b in Branch::ALL {
            let n = b.next();
            z[b] = (x[b] & y[n]) ^ (x[n] & y[b]) ^ (x[b] & y[b]) ^ r[b] ^ r[n];
        }
        self.record(z);
        Ok(z)
    }

    fn add(
        &mut self,
        x: Shares<NUM_BRANCHES>,
        y: Shares<NUM_BRANCHES>,
    ) -> Result<Shares<NUM_BRANCHES>, GadgetError> {
        let r = self.draw()?;
        let mut c = Shares([0u32; NUM_BRANCHES]);
        for i in 0..CARRY_BITS {
            let a = x.xor(c);
            let bb = y.xor(c);
            let mut next = c;
            for b in Branch::ALL {
                let n = b.next();
                let (a_b, a_n) = (bit(a[b], i), bit(a[n], i));
                let (b_b, b_n) = (bit(bb[b], i), bit(bb[n], i));
                let t = (a_b & b_n) ^ (a_n & b_b) ^ bit(r[n], i);
                let carry = t ^ (a_b & b_b) ^ bit(c[b], i) ^ bit(r[b], i);
                // Bit i+1 of c is still zero here.
                next[b] |= carry << (i + 1);
            }
            c = next;
        }
        self.record(c);
        Ok(x.xor(y).xor(c))
    }

    fn gates(&self) -> usize {
        self.cursor.gate()
    }
}

// ============================================================================
// Verifier side: two opened branches, traces checked
// ============================================================================

/// Two-branch replay context for opened branches `e` (index 0) and `e + 1`
/// (index 1).
///
/// Branch `e`'s gate outputs are recomputed and compared against its trace;
/// branch `e + 1`'s outputs depend on the hidden branch and are taken from
/// its trace verbatim.
pub struct ReplayGadgets<'a> {
    tapes: [&'a RandomTape; OPENED_BRANCHES],
    traces: [&'a [u32]; OPENED_BRANCHES],
    cursor: GateCursor,
}

impl<'a> ReplayGadgets<'a> {
    pub fn new(
        tapes: [&'a RandomTape; OPENED_BRANCHES],
        traces: [&'a [u32]; OPENED_BRANCHES],
    ) -> Self {
        Self { tapes, traces, cursor: GateCursor::default() }
    }

    fn exhausted(&self) -> GadgetError {
        GadgetError::Exhausted { gate: self.cursor.gate() }
    }

    fn draw(&self) -> Result<[u32; OPENED_BRANCHES], GadgetError> {
        let offset = self.cursor.tape_offset();
        let r0 = self.tapes[0].word(offset).ok_or_else(|| self.exhausted())?;
        let r1 = self.tapes[1].word(offset).ok_or_else(|| self.exhausted())?;
        Ok([r0, r1])
    }

    fn recorded(&self) -> Result<[u32; OPENED_BRANCHES], GadgetError> {
        let g = self.cursor.gate();
        let v0 = self.traces[0].get(g).copied().ok_or_else(|| self.exhausted())?;
        let v1 = self.traces[1].get(g).copied().ok_or_else(|| self.exhausted())?;
        Ok([v0, v1])
    }

    fn mismatch(&self, kind: GateKind, carry_bit: Option<u32>) -> GadgetError {
        GadgetError::Mismatch { gate: self.cursor.gate(), kind, carry_bit }
    }
}

impl Gadgets<OPENED_BRANCHES> for ReplayGadgets<'_> {
    type Error = GadgetError;

    fn and(
        &mut self,
        x: Shares<OPENED_BRANCHES>,
        y: Shares<OPENED_BRANCHES>,
    ) -> Result<Shares<OPENED_BRANCHES>, GadgetError> {
        let [r0, r1] = self.draw()?;
        let [z0_rec, z1_rec] = self.recorded()?;
        let ([x0, x1], [y0, y1]) = (x.0, y.0);

        let z0 = (x0 & y1) ^ (x1 & y0) ^ (x0 & y0) ^ r0 ^ r1;
        if z0 != z0_rec {
            return Err(self.mismatch(GateKind::And, None));
        }
        self.cursor.advance();
        Ok(Shares([z0, z1_rec]))
    }

    fn add(
        &mut self,
        x: Shares<OPENED_BRANCHES>,
        y: Shares<OPENED_BRANCHES>,
    ) -> Result<Shares<OPENED_BRANCHES>, GadgetError> {
        let [r0, r1] = self.draw()?;
        let [c0, c1] = self.recorded()?;
        let ([x0, x1], [y0, y1]) = (x.0, y.0);

        // Nothing carries into bit 0.
        if bit(c0, 0) != 0 {
            return Err(self.mismatch(GateKind::Add, Some(0)));
        }

        for i in 0..CARRY_BITS {
            let (a0, a1) = (bit(x0 ^ c0, i), bit(x1 ^ c1, i));
            let (b0, b1) = (bit(y0 ^ c0, i), bit(y1 ^ c1, i));
            let t = (a0 & b1) ^ (a1 & b0) ^ bit(r1, i);
            if bit(c0, i + 1) != t ^ (a0 & b0) ^ bit(c0, i) ^ bit(r0, i) {
                return Err(self.mismatch(GateKind::Add, Some(i + 1)));
            }
        }
        self.cursor.advance();
        Ok(Shares([x0 ^ y0 ^ c0, x1 ^ y1 ^ c1]))
    }

    fn gates(&self) -> usize {
        self.cursor.gate()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn tapes(seed: u8) -> [RandomTape; NUM_BRANCHES] {
        [
            RandomTape::from_key(&[seed; 16]),
            RandomTape::from_key(&[seed.wrapping_add(1); 16]),
            RandomTape::from_key(&[seed.wrapping_add(2); 16]),
        ]
    }

    fn share(rng: &mut StdRng, v: u32) -> Shares<NUM_BRANCHES> {
        let (s0, s1): (u32, u32) = (rng.gen(), rng.gen());
        Shares([s0, s1, v ^ s0 ^ s1])
    }

    #[test]
    fn and_and_add_reconstruct_cleartext() {
        let t = tapes(1);
        let mut g = ProverGadgets::new([&t[0], &t[1], &t[2]]);
        let mut rng = StdRng::seed_from_u64(11);

        let cases = [(0u32, 0u32), (u32::MAX, 1), (0x8000_0000, 0x8000_0000), (0x1234_5678, 0x9abc_def0)];
        for (vx, vy) in cases {
            let (x, y) = (share(&mut rng, vx), share(&mut rng, vy));
            assert_eq!(g.and(x, y).unwrap().reconstruct(), vx & vy);
            assert_eq!(g.add(x, y).unwrap().reconstruct(), vx.wrapping_add(vy));
            assert_eq!(g.add_const(x, vy).unwrap().reconstruct(), vx.wrapping_add(vy));
        }
        for _ in 0..64 {
            let (vx, vy): (u32, u32) = (rng.gen(), rng.gen());
            let (x, y) = (share(&mut rng, vx), share(&mut rng, vy));
            assert_eq!(g.add(x, y).unwrap().reconstruct(), vx.wrapping_add(vy));
        }
    }

    #[test]
    fn composites_match_sha256_boolean_functions() {
        let t = tapes(3);
        let mut g = ProverGadgets::new([&t[0], &t[1], &t[2]]);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..16 {
            let (va, vb, vc): (u32, u32, u32) = (rng.gen(), rng.gen(), rng.gen());
            let (a, b, c) = (share(&mut rng, va), share(&mut rng, vb), share(&mut rng, vc));
            let maj = (va & vb) ^ (va & vc) ^ (vb & vc);
            let ch = (va & vb) ^ (!va & vc);
            assert_eq!(g.maj(a, b, c).unwrap().reconstruct(), maj);
            assert_eq!(g.ch(a, b, c).unwrap().reconstruct(), ch);
        }
        // One AND each.
        assert_eq!(g.gates(), 32);
    }

    #[test]
    fn every_gate_writes_one_word_per_branch() {
        let t = tapes(9);
        let mut g = ProverGadgets::new([&t[0], &t[1], &t[2]]);
        let x = Shares([1, 2, 3]);
        g.and(x, x).unwrap();
        g.add(x, x).unwrap();
        g.add_const(x, 7).unwrap();
        assert_eq!(g.gates(), 3);
        for trace in g.into_traces() {
            assert_eq!(trace.len(), 3);
        }
    }

    /// Run a short gate sequence on the prover, return inputs and traces.
    fn honest_run(
        t: &[RandomTape; NUM_BRANCHES],
    ) -> (Shares<NUM_BRANCHES>, Shares<NUM_BRANCHES>, [Vec<u32>; NUM_BRANCHES], Vec<Shares<NUM_BRANCHES>>) {
        let mut rng = StdRng::seed_from_u64(77);
        let (x, y) = (share(&mut rng, 0xcafe_babe), share(&mut rng, 0x0bad_f00d));
        let mut g = ProverGadgets::new([&t[0], &t[1], &t[2]]);
        let outs = vec![
            g.add(x, y).unwrap(),
            g.and(x, y).unwrap(),
            g.add_const(x, 0x428a_2f98).unwrap(),
        ];
        (x, y, g.into_traces(), outs)
    }

    #[test]
    fn replay_accepts_honest_traces_under_every_challenge() {
        let t = tapes(21);
        let (x, y, traces, outs) = honest_run(&t);
        for e in Branch::ALL {
            let n = e.next();
            let mut r = ReplayGadgets::new(
                [&t[e.as_usize()], &t[n.as_usize()]],
                [&traces[e.as_usize()], &traces[n.as_usize()]],
            );
            let (xo, yo) = (x.opened(e), y.opened(e));
            assert_eq!(r.add(xo, yo).unwrap(), outs[0].opened(e));
            assert_eq!(r.and(xo, yo).unwrap(), outs[1].opened(e));
            assert_eq!(r.add_const(xo, 0x428a_2f98).unwrap(), outs[2].opened(e));
            assert_eq!(r.gates(), 3);
        }
    }

    #[test]
    fn replay_pinpoints_flipped_carry_bit() {
        let t = tapes(33);
        let (x, y, mut traces, _) = honest_run(&t);
        let e = Branch::ALL[1];
        let n = e.next();
        traces[e.as_usize()][0] ^= 1 << 5;

        let mut r = ReplayGadgets::new(
            [&t[e.as_usize()], &t[n.as_usize()]],
            [&traces[e.as_usize()], &traces[n.as_usize()]],
        );
        let err = r.add(x.opened(e), y.opened(e)).unwrap_err();
        assert_eq!(err, GadgetError::Mismatch { gate: 0, kind: GateKind::Add, carry_bit: Some(5) });
    }

    #[test]
    fn replay_rejects_carry_into_bit_zero() {
        let t = tapes(35);
        let (x, y, mut traces, _) = honest_run(&t);
        let e = Branch::ALL[0];
        let n = e.next();
        assert_eq!(bit(traces[e.as_usize()][0], 0), 0);
        traces[e.as_usize()][0] |= 1;

        let mut r = ReplayGadgets::new(
            [&t[e.as_usize()], &t[n.as_usize()]],
            [&traces[e.as_usize()], &traces[n.as_usize()]],
        );
        let err = r.add(x.opened(e), y.opened(e)).unwrap_err();
        assert_eq!(err, GadgetError::Mismatch { gate: 0, kind: GateKind::Add, carry_bit: Some(0) });
    }

    #[test]
    fn replay_rejects_tampered_and_output() {
        let t = tapes(40);
        let (x, y, mut traces, _) = honest_run(&t);
        let e = Branch::ALL[2];
        let n = e.next();
        traces[e.as_usize()][1] ^= 0x0001_0000;

        let mut r = ReplayGadgets::new(
            [&t[e.as_usize()], &t[n.as_usize()]],
            [&traces[e.as_usize()], &traces[n.as_usize()]],
        );
        let (xo, yo) = (x.opened(e), y.opened(e));
        r.add(xo, yo).unwrap();
        let err = r.and(xo, yo).unwrap_err();
        assert_eq!(err, GadgetError::Mismatch { gate: 1, kind: GateKind::And, carry_bit: None });
    }

    #[test]
    fn replay_reports_exhausted_trace() {
        let t = tapes(50);
        let empty: [u32; 0] = [];
        let mut r = ReplayGadgets::new([&t[0], &t[1]], [&empty, &empty]);
        let x = Shares([0, 0]);
        assert_eq!(r.and(x, x).unwrap_err(), GadgetError::Exhausted { gate: 0 });
    }
}
