//! Candidates: constraints with evaluation evidence.
//!
//! A candidate caches its result per input tree, split by verdict. Composition
//! (`conj`, `disj`, `neg`) recombines the caches pointwise instead of
//! re-evaluating, which is what makes combination search affordable. Pointwise
//! recombination requires both operands to cover the same trees; combination
//! search skips pairs that do not.

use crate::common::*;

/// A fully instantiated constraint plus its evaluation evidence.
#[derive(Clone)]
pub struct Candidate {
    /// The constraint.
    cst: Cst,
    /// Result per failing input.
    fail: TreeMap<bool>,
    /// Result per passing input.
    pass: TreeMap<bool>,
    /// Inputs skipped because evaluation errored there.
    skipped: usize,
}

impl Candidate {
    /// Candidate with no evidence.
    pub fn new(cst: Cst) -> Self {
        Candidate {
            cst,
            fail: TreeMap::new(),
            pass: TreeMap::new(),
            skipped: 0,
        }
    }

    /// The constraint.
    #[inline]
    pub fn cst(&self) -> &Cst {
        &self.cst
    }
    /// Unique identifier, the constraint's.
    #[inline]
    pub fn uid(&self) -> u64 {
        self.cst.uid()
    }
    /// Formula size, in AST nodes.
    #[inline]
    pub fn size(&self) -> usize {
        self.cst.count()
    }
    /// Number of inputs skipped on evaluation errors.
    #[inline]
    pub fn skipped(&self) -> usize {
        self.skipped
    }
    /// Number of inputs the caches cover.
    #[inline]
    pub fn covered(&self) -> usize {
        self.fail.len() + self.pass.len()
    }

    /// Evaluates the candidate on some inputs, incrementally.
    ///
    /// Inputs already in the cache are not re-checked. Evaluation errors skip
    /// the input (it enters neither the lists nor the cache); any other error
    /// propagates.
    pub fn evaluate(&mut self, inputs: &[Input]) -> Res<()> {
        for input in inputs {
            let cache = match input.vrd {
                Verdict::Failing => &mut self.fail,
                Verdict::Passing => &mut self.pass,
                Verdict::Undefined => continue,
            };
            if cache.get(&input.tree).is_some() {
                continue;
            }
            match self.cst.check(&input.tree) {
                Ok(res) => {
                    let _ = cache.insert(input.tree.clone(), res);
                }
                Err(e) if e.is_eval() => {
                    self.skipped += 1;
                    log! { @debug
                        "candidate {} skips {}: {}", self.cst, input, e
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// True positives: failing inputs the constraint holds on.
    fn tp(&self) -> usize {
        self.fail.values().filter(|b| **b).count()
    }
    /// False negatives: failing inputs the constraint rejects.
    fn fun(&self) -> usize {
        self.fail.len() - self.tp()
    }
    /// False positives: passing inputs the constraint holds on.
    fn fp(&self) -> usize {
        self.pass.values().filter(|b| **b).count()
    }
    /// True negatives: passing inputs the constraint rejects.
    fn tn(&self) -> usize {
        self.pass.len() - self.fp()
    }

    /// TP / (TP + FP). Zero when undefined.
    pub fn precision(&self) -> f64 {
        let (tp, fp) = (self.tp(), self.fp());
        if tp + fp == 0 {
            0.0
        } else {
            tp as f64 / (tp + fp) as f64
        }
    }
    /// TP / (TP + FN). Zero when undefined.
    pub fn recall(&self) -> f64 {
        let (tp, fun) = (self.tp(), self.fun());
        if tp + fun == 0 {
            0.0
        } else {
            tp as f64 / (tp + fun) as f64
        }
    }
    /// TN / (TN + FP). Zero when undefined.
    pub fn specificity(&self) -> f64 {
        let (tn, fp) = (self.tn(), self.fp());
        if tn + fp == 0 {
            0.0
        } else {
            tn as f64 / (tn + fp) as f64
        }
    }

    /// True if both caches cover exactly the same trees.
    pub fn same_keys(&self, other: &Self) -> bool {
        self.fail.len() == other.fail.len()
            && self.pass.len() == other.pass.len()
            && self.fail.keys().all(|t| other.fail.get(t).is_some())
            && self.pass.keys().all(|t| other.pass.get(t).is_some())
    }

    /// Pointwise combination of two caches.
    fn combine<F: Fn(bool, bool) -> bool>(
        mine: &TreeMap<bool>,
        others: &TreeMap<bool>,
        f: &F,
    ) -> TreeMap<bool> {
        let mut res = TreeMap::with_capacity(mine.len());
        for (tree, val) in mine.iter() {
            if let Some(other) = others.get(tree) {
                let _ = res.insert(tree.clone(), f(*val, *other));
            }
        }
        res
    }

    /// Pointwise conjunction. Fails unless the caches cover the same trees.
    pub fn conj(&self, other: &Self) -> Res<Candidate> {
        if !self.same_keys(other) {
            bail!(
                "cannot combine candidates with different coverage ({} / {})",
                self.cst,
                other.cst
            )
        }
        Ok(Candidate {
            cst: cst::and(vec![self.cst.clone(), other.cst.clone()]),
            fail: Self::combine(&self.fail, &other.fail, &|l, r| l && r),
            pass: Self::combine(&self.pass, &other.pass, &|l, r| l && r),
            skipped: 0,
        })
    }

    /// Pointwise disjunction. Fails unless the caches cover the same trees.
    pub fn disj(&self, other: &Self) -> Res<Candidate> {
        if !self.same_keys(other) {
            bail!(
                "cannot combine candidates with different coverage ({} / {})",
                self.cst,
                other.cst
            )
        }
        Ok(Candidate {
            cst: cst::or(vec![self.cst.clone(), other.cst.clone()]),
            fail: Self::combine(&self.fail, &other.fail, &|l, r| l || r),
            pass: Self::combine(&self.pass, &other.pass, &|l, r| l || r),
            skipped: 0,
        })
    }

    /// Negation, with the exact pointwise complement of the caches.
    ///
    /// Comparisons come back with their operator flipped.
    pub fn neg(&self) -> Candidate {
        let mut fail = TreeMap::with_capacity(self.fail.len());
        for (tree, val) in self.fail.iter() {
            let _ = fail.insert(tree.clone(), !val);
        }
        let mut pass = TreeMap::with_capacity(self.pass.len());
        for (tree, val) in self.pass.iter() {
            let _ = pass.insert(tree.clone(), !val);
        }
        Candidate {
            cst: cst::not(self.cst.clone()),
            fail,
            pass,
            skipped: self.skipped,
        }
    }

    /// The cached result for a tree, if any.
    pub fn cached(&self, tree: &Tree) -> Option<bool> {
        self.fail
            .get(tree)
            .or_else(|| self.pass.get(tree))
            .cloned()
    }
}

impl_fmt! {
    Candidate(self, fmt) {
        write!(
            fmt,
            "{} [p {:.2}, r {:.2}, s {:.2}]",
            self.cst,
            self.precision(),
            self.recall(),
            self.specificity()
        )
    }
}

/// Hash-deduplicated candidate collection with O(1) amortized add and remove.
#[derive(Default)]
pub struct CandidateSet {
    /// The candidates.
    cands: Vec<Candidate>,
    /// Map from constraint uids to slots in `cands`.
    index: HashMap<u64, usize>,
}

impl CandidateSet {
    /// Empty set.
    pub fn new() -> Self {
        CandidateSet {
            cands: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.cands.len()
    }
    /// True if there are no candidates.
    pub fn is_empty(&self) -> bool {
        self.cands.is_empty()
    }

    /// True if a candidate with this constraint is in the set.
    pub fn contains(&self, cst: &Cst) -> bool {
        self.index.contains_key(&cst.uid())
    }

    /// Adds a candidate. False if an equal constraint was already there.
    pub fn add(&mut self, cand: Candidate) -> bool {
        use std::collections::hash_map::Entry;
        match self.index.entry(cand.uid()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(self.cands.len());
                self.cands.push(cand);
                true
            }
        }
    }

    /// Removes the candidate with this uid, swapping the last one into the
    /// freed slot.
    pub fn remove(&mut self, uid: u64) -> Option<Candidate> {
        let slot = self.index.remove(&uid)?;
        let cand = self.cands.swap_remove(slot);
        if let Some(moved) = self.cands.get(slot) {
            let prev = self.index.insert(moved.uid(), slot);
            debug_assert!(prev.is_some())
        }
        Some(cand)
    }

    /// Iterator over the candidates.
    pub fn iter(&self) -> ::std::slice::Iter<Candidate> {
        self.cands.iter()
    }
    /// Mutable iterator over the candidates.
    pub fn iter_mut(&mut self) -> ::std::slice::IterMut<Candidate> {
        self.cands.iter_mut()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a Candidate;
    type IntoIter = ::std::slice::Iter<'a, Candidate>;
    fn into_iter(self) -> Self::IntoIter {
        self.cands.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst::{Expr, Op, Ref};

    fn calc() -> (Grammar, Vec<Input>) {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos"
            <n> ::= "-1" | "2"
            "#,
        )
        .unwrap();
        let inputs = vec![
            Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing),
            Input::new(gram.parse("cos(2)").unwrap(), Verdict::Passing),
            Input::new(gram.parse("sqrt(2)").unwrap(), Verdict::Passing),
        ];
        (gram, inputs)
    }

    #[test]
    fn evaluation_is_idempotent() {
        let (gram, inputs) = calc();
        let f = gram.sym_of("f").unwrap();
        let mut cand = Candidate::new(cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(f)),
            Expr::SCst("sqrt".into()),
        ));
        cand.evaluate(&inputs).unwrap();
        let (p, r) = (cand.precision(), cand.recall());
        cand.evaluate(&inputs).unwrap();
        assert_eq!(p, cand.precision());
        assert_eq!(r, cand.recall());
        assert_eq!(cand.covered(), 3)
    }

    #[test]
    fn metrics() {
        let (gram, inputs) = calc();
        let f = gram.sym_of("f").unwrap();
        // Holds on sqrt(-1) (failing) and sqrt(2) (passing).
        let mut cand = Candidate::new(cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(f)),
            Expr::SCst("sqrt".into()),
        ));
        cand.evaluate(&inputs).unwrap();
        assert_eq!(cand.precision(), 0.5);
        assert_eq!(cand.recall(), 1.0);
        assert_eq!(cand.specificity(), 0.5)
    }

    #[test]
    fn conjunction_is_pointwise() {
        let (gram, inputs) = calc();
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();
        let mut is_sqrt = Candidate::new(cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(f)),
            Expr::SCst("sqrt".into()),
        ));
        let mut is_neg = Candidate::new(cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into())));
        is_sqrt.evaluate(&inputs).unwrap();
        is_neg.evaluate(&inputs).unwrap();
        let both = is_sqrt.conj(&is_neg).unwrap();
        assert_eq!(both.precision(), 1.0);
        assert_eq!(both.recall(), 1.0);
        for input in &inputs {
            assert_eq!(
                both.cached(&input.tree).unwrap(),
                is_sqrt.cached(&input.tree).unwrap() && is_neg.cached(&input.tree).unwrap()
            )
        }
    }

    #[test]
    fn negation_complements_the_cache() {
        let (gram, inputs) = calc();
        let n = gram.sym_of("n").unwrap();
        let mut cand = Candidate::new(cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into())));
        cand.evaluate(&inputs).unwrap();
        let neg = cand.neg();
        assert_eq!(neg.cst().to_string(), "(>= (num @2) 0)");
        for input in &inputs {
            assert_eq!(
                neg.cached(&input.tree).unwrap(),
                !cand.cached(&input.tree).unwrap()
            )
        }
    }

    #[test]
    fn set_dedups_and_swap_removes() {
        let (gram, inputs) = calc();
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();
        let mk = |cst: Cst| {
            let mut cand = Candidate::new(cst);
            cand.evaluate(&inputs).unwrap();
            cand
        };
        let a = mk(cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into())));
        let a_uid = a.uid();
        let b = mk(cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into())));
        let c = mk(cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into())));
        let c_uid = c.uid();

        let mut set = CandidateSet::new();
        assert!(set.add(a));
        assert!(!set.add(b));
        assert_eq!(set.len(), 1);
        assert!(set.add(c));
        assert_eq!(set.len(), 2);

        let removed = set.remove(a_uid).unwrap();
        assert_eq!(removed.uid(), a_uid);
        assert_eq!(set.len(), 1);
        // The swapped-in entry is still reachable through the index.
        let removed = set.remove(c_uid).unwrap();
        assert_eq!(removed.uid(), c_uid);
        assert!(set.is_empty())
    }
}
