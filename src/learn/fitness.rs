//! Fitness orderings over candidates.
//!
//! A fitness decides which candidates `learn` returns: all candidates *tied*
//! for best under the ordering, not just one.

use std::cmp::Ordering;

use crate::common::*;
use crate::learn::cand::Candidate;

/// Total preference order over candidates. Greater is better.
pub trait Fitness {
    /// Short description.
    fn name(&self) -> &'static str;
    /// Compares two candidates.
    fn cmp(&self, lhs: &Candidate, rhs: &Candidate) -> Ordering;
}

/// Compares two metric values. Metrics live in `[0, 1]`, never NaN.
fn metric_cmp(lhs: f64, rhs: f64) -> Ordering {
    lhs.partial_cmp(&rhs).unwrap_or(Ordering::Equal)
}

/// Lexicographic recall then precision.
pub struct RecallPriority;
impl Fitness for RecallPriority {
    fn name(&self) -> &'static str {
        "recall, precision"
    }
    fn cmp(&self, lhs: &Candidate, rhs: &Candidate) -> Ordering {
        metric_cmp(lhs.recall(), rhs.recall())
            .then_with(|| metric_cmp(lhs.precision(), rhs.precision()))
    }
}

/// Lexicographic recall, precision, then smaller formulas. The default.
pub struct RecallPriorityLen;
impl Fitness for RecallPriorityLen {
    fn name(&self) -> &'static str {
        "recall, precision, size"
    }
    fn cmp(&self, lhs: &Candidate, rhs: &Candidate) -> Ordering {
        RecallPriority
            .cmp(lhs, rhs)
            .then_with(|| rhs.size().cmp(&lhs.size()))
    }
}

/// Harmonic mean of precision and recall.
pub struct F1;
impl Fitness for F1 {
    fn name(&self) -> &'static str {
        "f1"
    }
    fn cmp(&self, lhs: &Candidate, rhs: &Candidate) -> Ordering {
        metric_cmp(f1(lhs), f1(rhs))
    }
}

fn f1(cand: &Candidate) -> f64 {
    let (p, r) = (cand.precision(), cand.recall());
    if p + r == 0.0 {
        0.0
    } else {
        2.0 * p * r / (p + r)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst::{Expr, Op, Ref};

    fn candidates() -> (Candidate, Candidate, Candidate) {
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
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();
        let mk = |cst: Cst| {
            let mut cand = Candidate::new(cst);
            cand.evaluate(&inputs).unwrap();
            cand
        };
        // Recall 1.0, precision 0.5.
        let is_sqrt = mk(cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(f)),
            Expr::SCst("sqrt".into()),
        ));
        // Recall 1.0, precision 1.0.
        let is_neg = mk(cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into())));
        // Same metrics as `is_neg` but a bigger formula.
        let both = is_sqrt.conj(&is_neg).unwrap();
        (is_sqrt, is_neg, both)
    }

    #[test]
    fn precision_breaks_recall_ties() {
        let (is_sqrt, is_neg, _) = candidates();
        assert_eq!(RecallPriority.cmp(&is_neg, &is_sqrt), Ordering::Greater);
        assert_eq!(F1.cmp(&is_neg, &is_sqrt), Ordering::Greater)
    }

    #[test]
    fn size_breaks_metric_ties() {
        let (_, is_neg, both) = candidates();
        assert_eq!(RecallPriority.cmp(&is_neg, &both), Ordering::Equal);
        assert_eq!(RecallPriorityLen.cmp(&is_neg, &both), Ordering::Greater)
    }
}
