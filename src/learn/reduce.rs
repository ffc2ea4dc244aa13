//! Relevant-symbol reduction.
//!
//! Large grammars make template instantiation blow up. A reducer shrinks the
//! set of symbols candidates may talk about by scoring how differently each
//! symbol behaves on failing and passing inputs.

use crate::common::*;

/// Selects the symbols worth instantiating templates over.
pub trait Reduce {
    /// Short description.
    fn name(&self) -> &'static str;
    /// The symbols to keep.
    fn reduce(&self, gram: &Grammar, inputs: &[Input]) -> Res<SymSet>;
}

/// Scores symbols by the Jaccard distance between the value sets their
/// subtrees render to on failing versus passing inputs.
///
/// A symbol whose values fully overlap across both verdicts scores `0` and
/// carries no diagnostic signal. One whose failing values are disjoint from
/// its passing values scores `1`. Keeps the `keep` best, ties broken by
/// symbol index so the outcome is deterministic.
pub struct ValueDivergence {
    /// How many symbols to keep.
    pub keep: usize,
}
impl Default for ValueDivergence {
    fn default() -> Self {
        ValueDivergence { keep: 3 }
    }
}

impl ValueDivergence {
    fn values_of(sym: SymIdx, inputs: &[Input], vrd: Verdict) -> BTreeSet<String> {
        let mut res = BTreeSet::new();
        for input in inputs {
            if input.vrd == vrd {
                for sub in tree::find_all(&input.tree, sym) {
                    res.insert(sub.to_string());
                }
            }
        }
        res
    }
}

impl Reduce for ValueDivergence {
    fn name(&self) -> &'static str {
        "value divergence"
    }

    fn reduce(&self, gram: &Grammar, inputs: &[Input]) -> Res<SymSet> {
        let mut scored: Vec<(SymIdx, f64)> = Vec::with_capacity(gram.len());

        for sym in gram.all_syms() {
            let fail = Self::values_of(sym, inputs, Verdict::Failing);
            let pass = Self::values_of(sym, inputs, Verdict::Passing);
            let union = fail.union(&pass).count();
            if union == 0 {
                continue;
            }
            let inter = fail.intersection(&pass).count();
            let score = 1.0 - inter as f64 / union as f64;
            scored.push((sym, score))
        }

        scored.sort_by(|(l_sym, l_score), (r_sym, r_score)| {
            r_score
                .partial_cmp(l_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(l_sym.cmp(r_sym))
        });

        let res: SymSet = scored.into_iter().take(self.keep).map(|(sym, _)| sym).collect();
        if res.is_empty() {
            bail!("value divergence reduction kept no symbols")
        }
        log! { @debug
            "reduced to {} symbol(s)", res.len()
        }
        Ok(res)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn divergent_symbols_win() {
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
            Input::new(gram.parse("cos(-1)").unwrap(), Verdict::Passing),
        ];

        // `<f>` separates the verdicts perfectly, `<n>` does not, `<start>`
        // trivially does since whole inputs never repeat across verdicts.
        let reducer = ValueDivergence { keep: 2 };
        let kept = reducer.reduce(&gram, &inputs).unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.contains(&gram.start()));
        assert!(kept.contains(&gram.sym_of("f").unwrap()));

        let all = ValueDivergence { keep: 10 }.reduce(&gram, &inputs).unwrap();
        assert_eq!(all.len(), gram.len())
    }
}
