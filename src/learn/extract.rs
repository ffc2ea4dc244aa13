//! Value extraction from labeled inputs.
//!
//! For each relevant symbol, scans every matching subtree of the given inputs
//! and buckets the rendered text: numeric text goes to an integer bucket,
//! anything else to a string bucket. The longest substring common to all
//! string values (at least two characters) is added to the string bucket, it
//! often captures a shared structural marker. Buckets use ordered sets so
//! instantiation is deterministic.

use crate::common::*;

/// Extracted values, per symbol.
#[derive(Default)]
pub struct Extraction {
    /// Integer values seen under each symbol.
    ints: SymHMap<BTreeSet<Int>>,
    /// String values seen under each symbol, plus the common substring.
    strs: SymHMap<BTreeSet<String>>,
}

impl Extraction {
    /// Scans the inputs for values under the relevant symbols.
    pub fn scan(relevant: &SymSet, inputs: &[&Input]) -> Self {
        let mut ints: SymHMap<BTreeSet<Int>> = SymHMap::new();
        let mut strs: SymHMap<BTreeSet<String>> = SymHMap::new();

        for &sym in relevant {
            for input in inputs {
                for sub in tree::find_all(&input.tree, sym) {
                    let text = sub.to_string();
                    if let Ok(int) = text.trim().parse::<Int>() {
                        ints.entry(sym).or_default().insert(int);
                    } else {
                        strs.entry(sym).or_default().insert(text);
                    }
                }
            }
        }

        for bucket in strs.values_mut() {
            if let Some(common) = common_substring(bucket) {
                bucket.insert(common);
            }
        }

        Extraction { ints, strs }
    }

    /// Raw integer bucket of a symbol.
    pub fn ints(&self, sym: SymIdx) -> impl Iterator<Item = &Int> {
        self.ints.get(&sym).into_iter().flatten()
    }

    /// String bucket of a symbol.
    pub fn strs(&self, sym: SymIdx) -> impl Iterator<Item = &String> {
        self.strs.get(&sym).into_iter().flatten()
    }

    /// Integer bucket collapsed to its bounds.
    ///
    /// Comparing against every integer ever seen explodes the candidate count;
    /// the bounds are where the boundary bugs live.
    pub fn ints_filtered(&self, sym: SymIdx) -> Vec<Int> {
        let bucket = match self.ints.get(&sym) {
            Some(bucket) => bucket,
            None => return vec![],
        };
        let mut res = vec![];
        if let Some(min) = bucket.iter().next() {
            res.push(min.clone())
        }
        if let Some(max) = bucket.iter().next_back() {
            if res.first() != Some(max) {
                res.push(max.clone())
            }
        }
        res
    }
}

/// Longest substring common to all values, if at least two characters long.
///
/// Ties break towards the substring occurring first in the smallest value.
fn common_substring(values: &BTreeSet<String>) -> Option<String> {
    let shortest = values.iter().min_by_key(|s| s.len())?;
    let chars: Vec<char> = shortest.chars().collect();
    for len in (2..=chars.len()).rev() {
        for start in 0..=(chars.len() - len) {
            let sub: String = chars[start..start + len].iter().collect();
            if values.iter().all(|v| v.contains(&sub)) {
                return Some(sub);
            }
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn buckets_by_numericity() {
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
            Input::new(gram.parse("sqrt(2)").unwrap(), Verdict::Failing),
        ];
        let refs: Vec<&Input> = inputs.iter().collect();
        let mut relevant = SymSet::new();
        relevant.insert(gram.sym_of("f").unwrap());
        relevant.insert(gram.sym_of("n").unwrap());

        let ext = Extraction::scan(&relevant, &refs);
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();

        let strs: Vec<&String> = ext.strs(f).collect();
        assert_eq!(strs.len(), 1);
        assert_eq!(strs[0].as_str(), "sqrt");
        assert!(ext.strs(n).next().is_none());

        let ints: Vec<&Int> = ext.ints(n).collect();
        assert_eq!(ints, vec![&Int::from(-1), &Int::from(2)]);
        assert!(ext.ints(f).next().is_none())
    }

    #[test]
    fn filtered_ints_are_the_bounds() {
        let gram = Grammar::of_str(r#"<n> ::= "1" | "2" | "3""#).unwrap();
        let inputs = vec![
            Input::new(gram.parse("1").unwrap(), Verdict::Failing),
            Input::new(gram.parse("3").unwrap(), Verdict::Failing),
            Input::new(gram.parse("2").unwrap(), Verdict::Failing),
        ];
        let refs: Vec<&Input> = inputs.iter().collect();
        let mut relevant = SymSet::new();
        relevant.insert(gram.start());

        let ext = Extraction::scan(&relevant, &refs);
        assert_eq!(
            ext.ints_filtered(gram.start()),
            vec![Int::from(1), Int::from(3)]
        );
        // A single value collapses to one bound.
        let one = Extraction::scan(&relevant, &refs[0..1]);
        assert_eq!(one.ints_filtered(gram.start()), vec![Int::from(1)])
    }

    #[test]
    fn common_substrings() {
        let mut values = BTreeSet::new();
        values.insert("checksum_abc".to_string());
        values.insert("checksum_xyz".to_string());
        assert_eq!(common_substring(&values), Some("checksum_".to_string()));

        let mut short = BTreeSet::new();
        short.insert("ab".to_string());
        short.insert("cd".to_string());
        assert_eq!(common_substring(&short), None)
    }
}
