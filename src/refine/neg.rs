//! Negation-based candidate generation.
//!
//! A good candidate's negations are worth testing: inputs satisfying them sit
//! right outside the candidate's boundary, which is where mislabeled regions
//! hide. Plain candidates negate with their evidence complemented pointwise;
//! conjunctions and disjunctions expand into sign-flip variants that need
//! fresh evaluation.

use crate::common::*;
use crate::learn::cand::Candidate;

/// All negation variants of a candidate.
///
/// - a conjunction of `n` members yields the `2^n - 1` variants flipping at
///   least one member, without evidence;
/// - a disjunction yields the `n` variants flipping exactly one member,
///   without evidence;
/// - anything else yields its pointwise negation, evidence included.
pub fn negations(cand: &Candidate) -> Vec<Candidate> {
    match cand.cst().get() {
        RCst::And(kids) => flips(kids),
        RCst::Or(kids) => single_flips(kids),
        _ => vec![cand.neg()],
    }
}

/// Every non-trivial sign assignment over the members.
///
/// Capped implicitly by the combination search's size bound, so the
/// exponential never bites.
fn flips(kids: &[Cst]) -> Vec<Candidate> {
    let mut res = Vec::with_capacity((1 << kids.len()) - 1);
    for mask in 1..(1usize << kids.len()) {
        let members = kids
            .iter()
            .enumerate()
            .map(|(idx, kid)| {
                if mask & (1 << idx) != 0 {
                    cst::not(kid.clone())
                } else {
                    kid.clone()
                }
            })
            .collect();
        res.push(Candidate::new(cst::and(members)))
    }
    res
}

/// Variants flipping exactly one member.
fn single_flips(kids: &[Cst]) -> Vec<Candidate> {
    let mut res = Vec::with_capacity(kids.len());
    for flip in 0..kids.len() {
        let members = kids
            .iter()
            .enumerate()
            .map(|(idx, kid)| {
                if idx == flip {
                    cst::not(kid.clone())
                } else {
                    kid.clone()
                }
            })
            .collect();
        res.push(Candidate::new(cst::or(members)))
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst::{Expr, Op, Ref};

    fn leaves() -> (Cst, Cst) {
        let is_sqrt = cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(1.into())),
            Expr::SCst("sqrt".into()),
        );
        let is_neg = cst::cmp(Op::Lt, Expr::Num(Ref::Sym(2.into())), Expr::ICst(0.into()));
        (is_sqrt, is_neg)
    }

    #[test]
    fn conjunctions_expand_sign_flips() {
        let (a, b) = leaves();
        let cand = Candidate::new(cst::and(vec![a.clone(), b.clone()]));
        let negs = negations(&cand);
        assert_eq!(negs.len(), 3);
        let rendered: Vec<String> = negs.iter().map(|n| n.cst().to_string()).collect();
        // Comparison negation flips the operator.
        assert!(rendered.contains(&"(and (!= (txt @1) \"sqrt\") (< (num @2) 0))".to_string()));
        assert!(rendered.contains(&"(and (= (txt @1) \"sqrt\") (>= (num @2) 0))".to_string()));
        assert!(rendered.contains(&"(and (!= (txt @1) \"sqrt\") (>= (num @2) 0))".to_string()));
        // Variants carry no evidence and must be evaluated from scratch.
        for neg in &negs {
            assert_eq!(neg.covered(), 0)
        }
    }

    #[test]
    fn disjunctions_flip_one_member_at_a_time() {
        let (a, b) = leaves();
        let cand = Candidate::new(cst::or(vec![a, b]));
        let negs = negations(&cand);
        assert_eq!(negs.len(), 2);
        for neg in &negs {
            assert!(matches!(neg.cst().get(), RCst::Or(_)))
        }
    }

    #[test]
    fn plain_candidates_negate_in_place() {
        let (a, _) = leaves();
        let negs = negations(&Candidate::new(a));
        assert_eq!(negs.len(), 1);
        assert_eq!(negs[0].cst().to_string(), "(!= (txt @1) \"sqrt\")")
    }
}
