//! Bounded-size combination search over surviving candidates.
//!
//! Conjunctions must *strictly* improve on every member's precision on top of
//! the global floor, so a kept conjunction always dominates its parents.
//! Disjunctions are symmetric on recall, with the acceptance policy pluggable.
//!
//! Subsets are enumerated in a deterministic order (members sorted by their
//! canonical constraint rendering) so runs are reproducible.

use crate::common::*;
use crate::learn::cand::Candidate;

/// Acceptance policy for a disjunction combination.
pub trait DisjAccept {
    /// Short description.
    fn name(&self) -> &'static str;
    /// True if the combination is worth keeping, given its members.
    fn accept(&self, comb: &Candidate, members: &[&Candidate]) -> bool;
}

/// Default policy: recall must strictly exceed the floor and every member's.
pub struct RecallFloor;
impl DisjAccept for RecallFloor {
    fn name(&self) -> &'static str {
        "recall floor"
    }
    fn accept(&self, comb: &Candidate, members: &[&Candidate]) -> bool {
        comb.recall() > conf.mine.min_recall
            && members.iter().all(|m| comb.recall() > m.recall())
    }
}

/// Precision must strictly exceed the floor and every member's.
pub struct PrecisionFloor;
impl DisjAccept for PrecisionFloor {
    fn name(&self) -> &'static str {
        "precision floor"
    }
    fn accept(&self, comb: &Candidate, members: &[&Candidate]) -> bool {
        comb.precision() > conf.mine.min_precision
            && members.iter().all(|m| comb.precision() > m.precision())
    }
}

/// Recall gain must outweigh the precision loss by some factor.
pub struct GainTradeOff {
    /// How much a point of recall gain is worth in precision loss.
    pub factor: f64,
}
impl Default for GainTradeOff {
    fn default() -> Self {
        GainTradeOff { factor: 2.0 }
    }
}
impl DisjAccept for GainTradeOff {
    fn name(&self) -> &'static str {
        "gain trade-off"
    }
    fn accept(&self, comb: &Candidate, members: &[&Candidate]) -> bool {
        let count = members.len() as f64;
        let avg_recall = members.iter().map(|m| m.recall()).sum::<f64>() / count;
        let avg_precision = members.iter().map(|m| m.precision()).sum::<f64>() / count;
        let gain = comb.recall() - avg_recall;
        let loss = avg_precision - comb.precision();
        gain * self.factor >= loss
    }
}

/// The combination must keep some ability to reject passing inputs.
pub struct MinSpecificity {
    /// Specificity floor.
    pub floor: f64,
}
impl Default for MinSpecificity {
    fn default() -> Self {
        MinSpecificity { floor: 0.1 }
    }
}
impl DisjAccept for MinSpecificity {
    fn name(&self) -> &'static str {
        "min specificity"
    }
    fn accept(&self, comb: &Candidate, _: &[&Candidate]) -> bool {
        comb.specificity() >= self.floor
    }
}

/// Precision may not drop below a fraction of the members' average.
pub struct PrecisionDrop {
    /// Tolerated fraction.
    pub fraction: f64,
}
impl Default for PrecisionDrop {
    fn default() -> Self {
        PrecisionDrop { fraction: 0.8 }
    }
}
impl DisjAccept for PrecisionDrop {
    fn name(&self) -> &'static str {
        "precision drop"
    }
    fn accept(&self, comb: &Candidate, members: &[&Candidate]) -> bool {
        let avg = members.iter().map(|m| m.precision()).sum::<f64>() / members.len() as f64;
        comb.precision() >= self.fraction * avg
    }
}

/// Deterministically ordered members: sorted by canonical rendering.
fn ordered<'a, F: Fn(&Candidate) -> bool>(
    cands: impl IntoIterator<Item = &'a Candidate>,
    keep: F,
) -> Vec<&'a Candidate> {
    let mut res: Vec<&Candidate> = cands.into_iter().filter(|c| keep(c)).collect();
    res.sort_by_key(|c| c.cst().to_string());
    res
}

/// All valid conjunctions of size `2..=max` over non-conjunction candidates.
///
/// A conjunction is valid iff its precision strictly exceeds the global floor
/// and every member's precision. Members with mismatched coverage are skipped.
pub fn conjunctions<'a>(
    cands: impl IntoIterator<Item = &'a Candidate>,
    max: usize,
) -> Vec<Candidate> {
    let members = ordered(cands, |c| !matches!(c.cst().get(), RCst::And(_)));
    let mut res = Vec::new();
    let mut stack: Vec<(usize, Vec<&Candidate>, Option<Candidate>)> = vec![(0, vec![], None)];

    while let Some((from, picked, comb)) = stack.pop() {
        if let Some(comb) = comb.as_ref() {
            if picked.len() >= 2 {
                let ok = comb.precision() > conf.mine.min_precision
                    && picked.iter().all(|m| comb.precision() > m.precision());
                if ok {
                    res.push(comb.clone())
                }
            }
        }
        if picked.len() >= max {
            continue;
        }
        for (idx, member) in members.iter().enumerate().skip(from) {
            let next = match comb.as_ref() {
                None => Some((*member).clone()),
                Some(comb) => match comb.conj(member) {
                    Ok(next) => Some(next),
                    Err(_) => None,
                },
            };
            if let Some(next) = next {
                let mut picked = picked.clone();
                picked.push(member);
                stack.push((idx + 1, picked, Some(next)))
            }
        }
    }
    res
}

/// All accepted disjunctions of size `2..=max` over non-disjunction
/// candidates, under some acceptance policy.
pub fn disjunctions<'a>(
    cands: impl IntoIterator<Item = &'a Candidate>,
    max: usize,
    policy: &dyn DisjAccept,
) -> Vec<Candidate> {
    let members = ordered(cands, |c| !matches!(c.cst().get(), RCst::Or(_)));
    let mut res = Vec::new();
    let mut stack: Vec<(usize, Vec<&Candidate>, Option<Candidate>)> = vec![(0, vec![], None)];

    while let Some((from, picked, comb)) = stack.pop() {
        if let Some(comb) = comb.as_ref() {
            if picked.len() >= 2 && policy.accept(comb, &picked) {
                res.push(comb.clone())
            }
        }
        if picked.len() >= max {
            continue;
        }
        for (idx, member) in members.iter().enumerate().skip(from) {
            let next = match comb.as_ref() {
                None => Some((*member).clone()),
                Some(comb) => match comb.disj(member) {
                    Ok(next) => Some(next),
                    Err(_) => None,
                },
            };
            if let Some(next) = next {
                let mut picked = picked.clone();
                picked.push(member);
                stack.push((idx + 1, picked, Some(next)))
            }
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst::{Expr, Op, Ref};

    fn setup() -> (Grammar, Vec<Input>) {
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
            Input::new(gram.parse("cos(-1)").unwrap(), Verdict::Passing),
        ];
        (gram, inputs)
    }

    fn mk(inputs: &[Input], cst: Cst) -> Candidate {
        let mut cand = Candidate::new(cst);
        cand.evaluate(inputs).unwrap();
        cand
    }

    #[test]
    fn kept_conjunctions_dominate_their_members() {
        let (gram, inputs) = setup();
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();
        let cands = vec![
            mk(&inputs, cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into()))),
            mk(&inputs, cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into()))),
        ];
        let combs = conjunctions(cands.iter(), conf.mine.max_conj);
        assert!(!combs.is_empty());
        for comb in &combs {
            assert!(comb.precision() > conf.mine.min_precision);
            for member in &cands {
                assert!(comb.precision() > member.precision())
            }
        }
    }

    #[test]
    fn non_improving_conjunctions_are_dropped() {
        let (gram, inputs) = setup();
        let f = gram.sym_of("f").unwrap();
        // Two copies of the same predicate: the conjunction's precision
        // cannot strictly improve.
        let a = mk(&inputs, cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into())));
        let b = mk(&inputs, cst::cmp(Op::Neq, Expr::Txt(Ref::Sym(f)), Expr::SCst("cos".into())));
        let combs = conjunctions(vec![a, b].iter(), 2);
        assert!(combs.is_empty())
    }

    #[test]
    fn disjunction_policy_is_pluggable() {
        let (gram, inputs) = setup();
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();
        // Each alone misses recall; together they cover all failing inputs.
        let sqrt_only = mk(
            &inputs,
            cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into())),
        );
        let neg_only = mk(&inputs, cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into())));
        let cands = vec![sqrt_only, neg_only];

        let by_spec = disjunctions(cands.iter(), 2, &MinSpecificity::default());
        assert_eq!(by_spec.len(), 1);
        // Both members already have recall 1.0, no disjunction can exceed it.
        let by_recall = disjunctions(cands.iter(), 2, &RecallFloor);
        assert!(by_recall.is_empty())
    }
}
