//! The bit-blasting solver.

use crate::error::SmtError;
use crate::term::{Bool, Bv};
use std::collections::HashMap;
use varisat::{ExtendFormula, Lit};

/// Outcome of a satisfiability check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SatResult {
    /// A model exists and can be read back.
    Sat,
    /// No model exists under the active assertions.
    Unsat,
}

/// Size counters for the underlying SAT problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SolverStats {
    /// Allocated SAT variables.
    pub variables: usize,
    /// Clauses added.
    pub clauses: usize,
    /// Satisfiability checks run.
    pub checks: usize,
}

/// A QF_BV solver with scoped assertions.
pub struct Solver {
    sat: varisat::Solver<'static>,
    true_lit: Lit,
    and_gates: HashMap<(Lit, Lit), Lit>,
    xor_gates: HashMap<(Lit, Lit), Lit>,
    scopes: Vec<Lit>,
    model: Option<Vec<bool>>,
    stats: SolverStats,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Creates an empty solver.
    pub fn new() -> Self {
        let mut sat = varisat::Solver::new();
        let true_lit = sat.new_lit();
        sat.add_clause(&[true_lit]);
        Self {
            sat,
            true_lit,
            and_gates: HashMap::new(),
            xor_gates: HashMap::new(),
            scopes: Vec::new(),
            model: None,
            stats: SolverStats {
                variables: 1,
                clauses: 1,
                checks: 0,
            },
        }
    }

    /// Discards every term, assertion and scope.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Size counters.
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Number of open scopes.
    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    fn new_lit(&mut self) -> Lit {
        self.stats.variables += 1;
        self.sat.new_lit()
    }

    fn clause(&mut self, lits: &[Lit]) {
        self.stats.clauses += 1;
        self.sat.add_clause(lits);
    }

    fn is_true(&self, l: Lit) -> bool {
        l == self.true_lit
    }

    fn is_false(&self, l: Lit) -> bool {
        l == !self.true_lit
    }

    // ------------------------------------------------------------------
    // Boolean terms
    // ------------------------------------------------------------------

    /// The constant `true`.
    pub fn tt(&self) -> Bool {
        Bool(self.true_lit)
    }

    /// The constant `false`.
    pub fn ff(&self) -> Bool {
        Bool(!self.true_lit)
    }

    /// A boolean constant.
    pub fn bool_const(&self, value: bool) -> Bool {
        if value {
            self.tt()
        } else {
            self.ff()
        }
    }

    /// An unconstrained boolean.
    pub fn fresh_bool(&mut self) -> Bool {
        Bool(self.new_lit())
    }

    /// Returns `Some(value)` if the term is a folded constant.
    pub fn as_const(&self, b: Bool) -> Option<bool> {
        if self.is_true(b.0) {
            Some(true)
        } else if self.is_false(b.0) {
            Some(false)
        } else {
            None
        }
    }

    /// Conjunction.
    pub fn and(&mut self, a: Bool, b: Bool) -> Bool {
        let (a, b) = (a.0, b.0);
        if self.is_false(a) || self.is_false(b) || a == !b {
            return self.ff();
        }
        if self.is_true(a) || a == b {
            return Bool(b);
        }
        if self.is_true(b) {
            return Bool(a);
        }
        let key = (a.min(b), a.max(b));
        if let Some(&out) = self.and_gates.get(&key) {
            return Bool(out);
        }
        let out = self.new_lit();
        self.clause(&[!out, a]);
        self.clause(&[!out, b]);
        self.clause(&[out, !a, !b]);
        self.and_gates.insert(key, out);
        Bool(out)
    }

    /// Disjunction.
    pub fn or(&mut self, a: Bool, b: Bool) -> Bool {
        !self.and(!a, !b)
    }

    /// Exclusive or.
    pub fn xor(&mut self, a: Bool, b: Bool) -> Bool {
        let (a, b) = (a.0, b.0);
        if self.is_false(a) {
            return Bool(b);
        }
        if self.is_false(b) {
            return Bool(a);
        }
        if self.is_true(a) {
            return Bool(!b);
        }
        if self.is_true(b) {
            return Bool(!a);
        }
        if a == b {
            return self.ff();
        }
        if a == !b {
            return self.tt();
        }
        // xor(!a, b) == !xor(a, b): normalize both inputs to positive literals
        let flip = a.is_negative() != b.is_negative();
        let (pa, pb) = (
            if a.is_negative() { !a } else { a },
            if b.is_negative() { !b } else { b },
        );
        let key = (pa.min(pb), pa.max(pb));
        let out = match self.xor_gates.get(&key) {
            Some(&out) => out,
            None => {
                let out = self.new_lit();
                self.clause(&[!out, pa, pb]);
                self.clause(&[!out, !pa, !pb]);
                self.clause(&[out, !pa, pb]);
                self.clause(&[out, pa, !pb]);
                self.xor_gates.insert(key, out);
                out
            }
        };
        Bool(if flip { !out } else { out })
    }

    /// Equivalence.
    pub fn iff(&mut self, a: Bool, b: Bool) -> Bool {
        !self.xor(a, b)
    }

    /// Implication `a => b`.
    pub fn implies(&mut self, a: Bool, b: Bool) -> Bool {
        self.or(!a, b)
    }

    /// If-then-else on booleans.
    pub fn ite(&mut self, cond: Bool, then: Bool, els: Bool) -> Bool {
        if let Some(c) = self.as_const(cond) {
            return if c { then } else { els };
        }
        if then == els {
            return then;
        }
        let t = self.and(cond, then);
        let e = self.and(!cond, els);
        self.or(t, e)
    }

    /// Conjunction of all terms; `true` when empty.
    pub fn and_all(&mut self, terms: &[Bool]) -> Bool {
        terms.iter().fold(self.tt(), |acc, &t| self.and(acc, t))
    }

    /// Disjunction of all terms; `false` when empty.
    pub fn or_all(&mut self, terms: &[Bool]) -> Bool {
        terms.iter().fold(self.ff(), |acc, &t| self.or(acc, t))
    }

    // ------------------------------------------------------------------
    // Bitvector terms
    // ------------------------------------------------------------------

    /// An unconstrained bitvector.
    pub fn fresh_bv(&mut self, width: usize) -> Bv {
        Bv {
            bits: (0..width).map(|_| self.new_lit()).collect(),
        }
    }

    /// A bitvector constant; bits of `value` above `width` are dropped.
    pub fn bv_const(&self, width: usize, value: u64) -> Bv {
        Bv {
            bits: (0..width)
                .map(|i| self.bool_const(i < 64 && (value >> i) & 1 == 1).0)
                .collect(),
        }
    }

    fn check_widths(a: &Bv, b: &Bv) -> Result<(), SmtError> {
        if a.width() == b.width() {
            Ok(())
        } else {
            Err(SmtError::WidthMismatch {
                left: a.width(),
                right: b.width(),
            })
        }
    }

    fn zip_bits(
        &mut self,
        a: &Bv,
        b: &Bv,
        mut f: impl FnMut(&mut Self, Bool, Bool) -> Bool,
    ) -> Result<Bv, SmtError> {
        Self::check_widths(a, b)?;
        let bits = a
            .bits
            .iter()
            .zip(&b.bits)
            .map(|(&x, &y)| f(self, Bool(x), Bool(y)).0)
            .collect();
        Ok(Bv { bits })
    }

    /// Bitwise NOT.
    pub fn bv_not(&self, a: &Bv) -> Bv {
        Bv {
            bits: a.bits.iter().map(|&l| !l).collect(),
        }
    }

    /// Bitwise AND.
    pub fn bv_and(&mut self, a: &Bv, b: &Bv) -> Result<Bv, SmtError> {
        self.zip_bits(a, b, Self::and)
    }

    /// Bitwise OR.
    pub fn bv_or(&mut self, a: &Bv, b: &Bv) -> Result<Bv, SmtError> {
        self.zip_bits(a, b, Self::or)
    }

    /// Bitwise XOR.
    pub fn bv_xor(&mut self, a: &Bv, b: &Bv) -> Result<Bv, SmtError> {
        self.zip_bits(a, b, Self::xor)
    }

    fn add_with_carry(&mut self, a: &Bv, b: &Bv, carry_in: Bool) -> Result<Bv, SmtError> {
        Self::check_widths(a, b)?;
        let mut carry = carry_in;
        let mut bits = Vec::with_capacity(a.width());
        for (&x, &y) in a.bits.iter().zip(&b.bits) {
            let (x, y) = (Bool(x), Bool(y));
            let half = self.xor(x, y);
            bits.push(self.xor(half, carry).0);
            let both = self.and(x, y);
            let propagate = self.and(half, carry);
            carry = self.or(both, propagate);
        }
        Ok(Bv { bits })
    }

    /// Modular addition.
    pub fn bv_add(&mut self, a: &Bv, b: &Bv) -> Result<Bv, SmtError> {
        let zero = self.ff();
        self.add_with_carry(a, b, zero)
    }

    /// Modular subtraction.
    pub fn bv_sub(&mut self, a: &Bv, b: &Bv) -> Result<Bv, SmtError> {
        let nb = self.bv_not(b);
        let one = self.tt();
        self.add_with_carry(a, &nb, one)
    }

    /// Logical shift right by a constant.
    pub fn bv_lshr(&self, a: &Bv, shift: usize) -> Bv {
        let zero = self.ff().0;
        Bv {
            bits: (0..a.width())
                .map(|i| a.bits.get(i + shift).copied().unwrap_or(zero))
                .collect(),
        }
    }

    /// Shift left by a constant.
    pub fn bv_shl(&self, a: &Bv, shift: usize) -> Bv {
        let zero = self.ff().0;
        Bv {
            bits: (0..a.width())
                .map(|i| if i >= shift { a.bits[i - shift] } else { zero })
                .collect(),
        }
    }

    /// Concatenation; `hi` supplies the most significant bits.
    pub fn bv_concat(&self, hi: &Bv, lo: &Bv) -> Bv {
        Bv {
            bits: lo.bits.iter().chain(&hi.bits).copied().collect(),
        }
    }

    /// Bits `hi..=lo`.
    pub fn bv_extract(&self, a: &Bv, hi: usize, lo: usize) -> Result<Bv, SmtError> {
        if hi < lo || hi >= a.width() {
            return Err(SmtError::OutOfRange {
                hi,
                lo,
                width: a.width(),
            });
        }
        Ok(Bv {
            bits: a.bits[lo..=hi].to_vec(),
        })
    }

    /// Widens by `extra` zero bits.
    pub fn bv_zero_extend(&self, a: &Bv, extra: usize) -> Bv {
        let zero = self.ff().0;
        Bv {
            bits: a
                .bits
                .iter()
                .copied()
                .chain(std::iter::repeat(zero).take(extra))
                .collect(),
        }
    }

    /// If-then-else on bitvectors.
    pub fn bv_ite(&mut self, cond: Bool, then: &Bv, els: &Bv) -> Result<Bv, SmtError> {
        self.zip_bits(then, els, |s, t, e| s.ite(cond, t, e))
    }

    /// Equality.
    pub fn bv_eq(&mut self, a: &Bv, b: &Bv) -> Result<Bool, SmtError> {
        let same = self.zip_bits(a, b, Self::iff)?;
        let bits: Vec<Bool> = same.bits().collect();
        Ok(self.and_all(&bits))
    }

    /// Unsigned `a < b`.
    pub fn bv_ult(&mut self, a: &Bv, b: &Bv) -> Result<Bool, SmtError> {
        Self::check_widths(a, b)?;
        let mut lt = self.ff();
        for (&x, &y) in a.bits.iter().zip(&b.bits) {
            let (x, y) = (Bool(x), Bool(y));
            let here = self.and(!x, y);
            let same = self.iff(x, y);
            let carried = self.and(same, lt);
            lt = self.or(here, carried);
        }
        Ok(lt)
    }

    /// Unsigned `a <= b`.
    pub fn bv_ule(&mut self, a: &Bv, b: &Bv) -> Result<Bool, SmtError> {
        Ok(!self.bv_ult(b, a)?)
    }

    /// `a == 0`.
    pub fn bv_is_zero(&mut self, a: &Bv) -> Bool {
        let bits: Vec<Bool> = a.bits().map(|b| !b).collect();
        self.and_all(&bits)
    }

    // ------------------------------------------------------------------
    // Assertions, scopes and models
    // ------------------------------------------------------------------

    /// Asserts `b` in the innermost open scope.
    pub fn assert(&mut self, b: Bool) {
        match self.scopes.last() {
            Some(&act) => self.clause(&[b.0, !act]),
            None => self.clause(&[b.0]),
        }
    }

    /// Opens a scope.
    pub fn push(&mut self) {
        let act = self.new_lit();
        self.scopes.push(act);
    }

    /// Closes the innermost scope, retracting its assertions.
    pub fn pop(&mut self) -> Result<(), SmtError> {
        let act = self.scopes.pop().ok_or(SmtError::EmptyScopeStack)?;
        self.clause(&[!act]);
        self.model = None;
        Ok(())
    }

    /// Checks the active assertions.
    pub fn check_sat(&mut self) -> Result<SatResult, SmtError> {
        self.stats.checks += 1;
        self.model = None;
        self.sat.assume(&self.scopes);
        let sat = self
            .sat
            .solve()
            .map_err(|e| SmtError::Engine(e.to_string()))?;
        if !sat {
            return Ok(SatResult::Unsat);
        }
        let lits = self
            .sat
            .model()
            .ok_or_else(|| SmtError::Engine("satisfiable without model".to_string()))?;
        let mut values = vec![false; self.stats.variables];
        for lit in lits {
            let index = lit.var().index();
            if index >= values.len() {
                values.resize(index + 1, false);
            }
            values[index] = lit.is_positive();
        }
        self.model = Some(values);
        Ok(SatResult::Sat)
    }

    fn lit_value(&self, model: &[bool], lit: Lit) -> bool {
        let value = model.get(lit.var().index()).copied().unwrap_or(false);
        value != lit.is_negative()
    }

    /// The value of `b` in the last model.
    pub fn bool_value(&self, b: Bool) -> Result<bool, SmtError> {
        let model = self.model.as_ref().ok_or(SmtError::NoModel)?;
        Ok(self.lit_value(model, b.0))
    }

    /// The value of `v` (at most 64 bits) in the last model.
    pub fn bv_value(&self, v: &Bv) -> Result<u64, SmtError> {
        let model = self.model.as_ref().ok_or(SmtError::NoModel)?;
        Ok(v
            .bits
            .iter()
            .take(64)
            .enumerate()
            .filter(|&(_, &l)| self.lit_value(model, l))
            .fold(0u64, |acc, (i, _)| acc | (1 << i)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(s: &mut Solver, v: &Bv) -> u64 {
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        s.bv_value(v).unwrap()
    }

    #[test]
    fn constant_folding() {
        let mut s = Solver::new();
        let x = s.fresh_bool();
        let (t, f) = (s.tt(), s.ff());
        assert_eq!(s.and(x, f), f);
        assert_eq!(s.and(x, t), x);
        assert_eq!(s.and(x, x), x);
        assert_eq!(s.and(x, !x), f);
        assert_eq!(s.or(x, !x), t);
        assert_eq!(s.xor(x, x), f);
        assert_eq!(s.xor(x, f), x);
        assert_eq!(s.ite(t, x, f), x);
        assert_eq!(s.as_const(x), None);
        assert_eq!(s.as_const(!f), Some(true));
    }

    #[test]
    fn gates_are_shared() {
        let mut s = Solver::new();
        let a = s.fresh_bool();
        let b = s.fresh_bool();
        let g1 = s.and(a, b);
        let before = s.stats().variables;
        let g2 = s.and(b, a);
        assert_eq!(g1, g2);
        let x1 = s.xor(!a, b);
        let x2 = s.xor(a, b);
        assert_eq!(x1, !x2);
        assert_eq!(s.stats().variables, before + 1);
    }

    #[test]
    fn addition_and_subtraction_wrap() {
        let mut s = Solver::new();
        let five = s.bv_const(4, 5);
        let nine = s.bv_const(4, 9);
        let three = s.bv_const(4, 3);
        let sum = s.bv_add(&five, &nine).unwrap();
        let diff = s.bv_sub(&three, &five).unwrap();
        let over = s.bv_add(&nine, &nine).unwrap();
        assert_eq!(value_of(&mut s, &sum), 14);
        assert_eq!(s.bv_value(&diff).unwrap(), 14);
        assert_eq!(s.bv_value(&over).unwrap(), 2);
    }

    #[test]
    fn solver_finds_bounded_value() {
        let mut s = Solver::new();
        let x = s.fresh_bv(4);
        let three = s.bv_const(4, 3);
        let one = s.bv_const(4, 1);
        let lt = s.bv_ult(&x, &three).unwrap();
        let gt = s.bv_ult(&one, &x).unwrap();
        s.assert(lt);
        s.assert(gt);
        assert_eq!(value_of(&mut s, &x), 2);
    }

    #[test]
    fn ule_and_eq() {
        let mut s = Solver::new();
        let x = s.fresh_bv(3);
        let seven = s.bv_const(3, 7);
        let le = s.bv_ule(&seven, &x).unwrap();
        s.assert(le);
        assert_eq!(value_of(&mut s, &x), 7);
        let six = s.bv_const(3, 6);
        let eq = s.bv_eq(&x, &six).unwrap();
        s.assert(eq);
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
    }

    #[test]
    fn shifts_extension_and_slicing() {
        let mut s = Solver::new();
        let v = s.bv_const(4, 0b1011);
        let r = s.bv_lshr(&v, 1);
        let l = s.bv_shl(&v, 2);
        let wide = s.bv_zero_extend(&v, 4);
        let mid = s.bv_extract(&v, 2, 1).unwrap();
        let joined = s.bv_concat(&mid, &v);
        assert_eq!(value_of(&mut s, &r), 0b0101);
        assert_eq!(s.bv_value(&l).unwrap(), 0b1100);
        assert_eq!(wide.width(), 8);
        assert_eq!(s.bv_value(&wide).unwrap(), 0b1011);
        assert_eq!(s.bv_value(&mid).unwrap(), 0b01);
        assert_eq!(s.bv_value(&joined).unwrap(), 0b01_1011);
    }

    #[test]
    fn bitwise_ops_and_ite() {
        let mut s = Solver::new();
        let a = s.bv_const(4, 0b1100);
        let b = s.bv_const(4, 0b1010);
        let and = s.bv_and(&a, &b).unwrap();
        let or = s.bv_or(&a, &b).unwrap();
        let xor = s.bv_xor(&a, &b).unwrap();
        let c = s.fresh_bool();
        s.assert(!c);
        let pick = s.bv_ite(c, &a, &b).unwrap();
        assert_eq!(value_of(&mut s, &and), 0b1000);
        assert_eq!(s.bv_value(&or).unwrap(), 0b1110);
        assert_eq!(s.bv_value(&xor).unwrap(), 0b0110);
        assert_eq!(s.bv_value(&pick).unwrap(), 0b1010);
    }

    #[test]
    fn is_zero() {
        let mut s = Solver::new();
        let x = s.fresh_bv(5);
        let z = s.bv_is_zero(&x);
        s.assert(!z);
        assert_ne!(value_of(&mut s, &x), 0);
    }

    #[test]
    fn scoped_assertions_are_retracted() {
        let mut s = Solver::new();
        let x = s.fresh_bool();
        s.push();
        s.assert(x);
        s.push();
        s.assert(!x);
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
        s.pop().unwrap();
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        assert!(s.bool_value(x).unwrap());
        s.pop().unwrap();
        s.assert(!x);
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        assert!(!s.bool_value(x).unwrap());
        assert_eq!(s.scope_depth(), 0);
    }

    #[test]
    fn pop_without_push_fails() {
        let mut s = Solver::new();
        assert!(matches!(s.pop(), Err(SmtError::EmptyScopeStack)));
    }

    #[test]
    fn no_model_before_check() {
        let mut s = Solver::new();
        let x = s.fresh_bool();
        assert!(matches!(s.bool_value(x), Err(SmtError::NoModel)));
        s.assert(x);
        s.assert(!x);
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
        assert!(matches!(s.bool_value(x), Err(SmtError::NoModel)));
    }

    #[test]
    fn width_errors() {
        let mut s = Solver::new();
        let a = s.fresh_bv(3);
        let b = s.fresh_bv(4);
        assert!(matches!(
            s.bv_add(&a, &b),
            Err(SmtError::WidthMismatch { left: 3, right: 4 })
        ));
        assert!(matches!(
            s.bv_extract(&a, 3, 0),
            Err(SmtError::OutOfRange { .. })
        ));
    }

    #[test]
    fn reset_drops_assertions() {
        let mut s = Solver::new();
        let f = s.ff();
        s.assert(f);
        assert_eq!(s.check_sat().unwrap(), SatResult::Unsat);
        s.reset();
        assert_eq!(s.check_sat().unwrap(), SatResult::Sat);
        assert_eq!(s.stats().checks, 1);
    }
}
