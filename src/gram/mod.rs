//! Grammars: parsing, fuzzing, reachability.
//!
//! A [`Grammar`](struct.Grammar.html) is a table of non-terminal symbols, each
//! with a list of alternatives over terminals and symbol references. It covers
//! exactly what mining needs: parse a text into a [`Tree`](../tree/type.Tree.html),
//! fuzz random trees under a depth limit, locate subtrees by symbol, and answer
//! symbol reachability queries for quantifier instantiation.
//!
//! Parsing is recursive descent with backtracking over alternatives. That is
//! enough for the input formats this tool targets; left-recursive rules are
//! rejected at construction.

use rand::Rng;

use crate::common::*;

mod parse;

pub use self::parse::err_at;

/// An item on the right-hand side of a rule alternative.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GramItem {
    /// A non-terminal reference.
    Sym(SymIdx),
    /// A literal terminal.
    Term(String),
}

/// A non-terminal symbol: its name and its alternatives.
#[derive(Clone, Debug)]
pub struct SymInfo {
    /// Name, without the angle brackets.
    pub name: String,
    /// Alternatives, one item sequence each. An empty sequence is epsilon.
    pub alts: Vec<Vec<GramItem>>,
}

/// A grammar.
///
/// Immutable once constructed; reachability and minimal derivation depths are
/// precomputed so that fuzzing and instantiation never recompute them.
#[derive(Clone)]
pub struct Grammar {
    /// Symbol table. The start symbol is the first one.
    syms: SymMap<SymInfo>,
    /// Map from names to symbols.
    ids: HashMap<String, SymIdx>,
    /// Reflexive, transitive reachability between non-terminals.
    reach: SymMap<SymSet>,
    /// Minimal depth of a derivation of each symbol.
    min_depth: SymMap<usize>,
}

impl Grammar {
    /// Parses the grammar text format.
    pub fn of_str(text: &str) -> Res<Self> {
        parse::grammar(text)
    }

    /// Constructor. Rejects left-recursive and bottomless grammars.
    fn new(syms: SymMap<SymInfo>, ids: HashMap<String, SymIdx>) -> Res<Self> {
        let min_depth = Self::min_depths(&syms)?;
        Self::check_left_recursion(&syms)?;
        let reach = Self::reachability(&syms);
        Ok(Grammar {
            syms,
            ids,
            reach,
            min_depth,
        })
    }

    /// Minimal derivation depth of each symbol, as a fixpoint.
    ///
    /// Fails if some symbol only has derivations of unbounded depth.
    fn min_depths(syms: &SymMap<SymInfo>) -> Res<SymMap<usize>> {
        let mut depth: SymMap<Option<usize>> = syms.iter().map(|_| None).collect::<Vec<_>>().into();
        let mut changed = true;
        while changed {
            changed = false;
            for (sym, info) in syms.index_iter() {
                let mut best: Option<usize> = depth[sym];
                'alts: for alt in &info.alts {
                    let mut max = 0;
                    for item in alt {
                        let item_depth = match item {
                            GramItem::Term(_) => 1,
                            GramItem::Sym(s) => match depth[*s] {
                                Some(d) => d,
                                None => continue 'alts,
                            },
                        };
                        max = ::std::cmp::max(max, item_depth)
                    }
                    let this = 1 + max;
                    if best.map(|b| this < b).unwrap_or(true) {
                        best = Some(this)
                    }
                }
                if best != depth[sym] {
                    depth[sym] = best;
                    changed = true
                }
            }
        }
        let mut res = SymMap::with_capacity(syms.len());
        for (sym, d) in depth.index_iter() {
            match d {
                Some(d) => {
                    res.push(*d);
                }
                None => bail!(
                    "symbol `{}` cannot produce a finite derivation",
                    syms[sym].name
                ),
            }
        }
        Ok(res)
    }

    /// Fails on left-recursive rules, which would not terminate under
    /// backtracking descent.
    fn check_left_recursion(syms: &SymMap<SymInfo>) -> Res<()> {
        // A symbol is nullable if some alternative only has nullable items.
        let mut nullable = SymSet::new();
        let mut changed = true;
        while changed {
            changed = false;
            for (sym, info) in syms.index_iter() {
                if nullable.contains(&sym) {
                    continue;
                }
                let is_nullable = info.alts.iter().any(|alt| {
                    alt.iter().all(|item| match item {
                        GramItem::Term(t) => t.is_empty(),
                        GramItem::Sym(s) => nullable.contains(s),
                    })
                });
                if is_nullable {
                    nullable.insert(sym);
                    changed = true
                }
            }
        }

        // Leftmost-derivable symbols, skipping nullable prefixes.
        let mut left: SymMap<SymSet> = syms.iter().map(|_| SymSet::new()).collect::<Vec<_>>().into();
        for (sym, info) in syms.index_iter() {
            for alt in &info.alts {
                for item in alt {
                    match item {
                        GramItem::Term(t) if t.is_empty() => continue,
                        GramItem::Term(_) => break,
                        GramItem::Sym(s) => {
                            left[sym].insert(*s);
                            if nullable.contains(s) {
                                continue;
                            }
                            break;
                        }
                    }
                }
            }
        }

        // Cycle detection by transitive closure.
        for start in SymRange::zero_to(syms.next_index()) {
            let mut seen = left[start].clone();
            let mut to_do: Vec<SymIdx> = seen.iter().cloned().collect();
            while let Some(sym) = to_do.pop() {
                if sym == start {
                    bail!("symbol `{}` is left-recursive", syms[start].name)
                }
                for next in &left[sym] {
                    if seen.insert(*next) {
                        to_do.push(*next)
                    }
                }
            }
        }
        Ok(())
    }

    /// Reflexive transitive closure of symbol reachability.
    fn reachability(syms: &SymMap<SymInfo>) -> SymMap<SymSet> {
        let mut res = SymMap::with_capacity(syms.len());
        for (start, _) in syms.index_iter() {
            let mut seen = SymSet::new();
            seen.insert(start);
            let mut to_do = vec![start];
            while let Some(sym) = to_do.pop() {
                for alt in &syms[sym].alts {
                    for item in alt {
                        if let GramItem::Sym(s) = item {
                            if seen.insert(*s) {
                                to_do.push(*s)
                            }
                        }
                    }
                }
            }
            res.push(seen);
        }
        res
    }

    /// The start symbol.
    #[inline]
    pub fn start(&self) -> SymIdx {
        0.into()
    }

    /// Number of symbols.
    #[inline]
    pub fn len(&self) -> usize {
        self.syms.len()
    }
    /// False: a grammar always has a start symbol.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The symbol with some name, if any.
    pub fn sym_of(&self, name: &str) -> Option<SymIdx> {
        self.ids.get(name).cloned()
    }

    /// Name of a symbol.
    pub fn name_of(&self, sym: SymIdx) -> &str {
        &self.syms[sym].name
    }

    /// Information about a symbol.
    pub fn info(&self, sym: SymIdx) -> &SymInfo {
        &self.syms[sym]
    }

    /// All symbols.
    pub fn all_syms(&self) -> SymSet {
        SymRange::zero_to(self.syms.next_index()).collect()
    }

    /// Symbols reachable from `sym`, itself included.
    pub fn reachable(&self, sym: SymIdx) -> &SymSet {
        &self.reach[sym]
    }

    /// Parses a text into a tree deriving the start symbol.
    ///
    /// Backtracking descent; the first derivation covering the whole input
    /// wins. The error points at the furthest position reached.
    pub fn parse(&self, text: &str) -> Res<Tree> {
        let mut furthest = 0;
        let parses = self.parse_sym(self.start(), text, 0, &mut furthest);
        for (tree, end) in parses {
            if end == text.len() {
                return Ok(tree);
            }
        }
        bail!(err_at(
            text,
            furthest,
            format!("input does not derive `<{}>`", self.name_of(self.start()))
        ))
    }

    /// All derivations of `sym` starting at `pos`, with their end positions.
    fn parse_sym(
        &self,
        sym: SymIdx,
        text: &str,
        pos: usize,
        furthest: &mut usize,
    ) -> Vec<(Tree, usize)> {
        let mut res = Vec::new();
        for alt in &self.syms[sym].alts {
            let mut states = vec![(Vec::new(), pos)];
            for item in alt {
                let mut next = Vec::with_capacity(states.len());
                for (kids, pos) in states {
                    match item {
                        GramItem::Term(t) => {
                            if text[pos..].starts_with(t.as_str()) {
                                let mut kids = kids.clone();
                                kids.push(tree::leaf(t.clone()));
                                let end = pos + t.len();
                                *furthest = ::std::cmp::max(*furthest, end);
                                next.push((kids, end))
                            }
                        }
                        GramItem::Sym(s) => {
                            for (sub, end) in self.parse_sym(*s, text, pos, furthest) {
                                let mut kids = kids.clone();
                                kids.push(sub);
                                next.push((kids, end))
                            }
                        }
                    }
                }
                states = next;
                if states.is_empty() {
                    break;
                }
            }
            for (kids, end) in states {
                res.push((tree::node(sym, kids), end))
            }
        }
        res
    }

    /// Fuzzes a random tree deriving `sym` (the start symbol by default).
    ///
    /// Alternatives are drawn uniformly among those that still fit in the
    /// configured depth limit; past the limit, a minimal-depth alternative is
    /// forced, so fuzzing always terminates.
    pub fn fuzz<R: Rng>(&self, rng: &mut R, sym: Option<SymIdx>) -> Tree {
        let sym = sym.unwrap_or_else(|| self.start());
        self.fuzz_at(rng, sym, conf.gen.fuzz_depth)
    }

    fn fuzz_at<R: Rng>(&self, rng: &mut R, sym: SymIdx, budget: usize) -> Tree {
        let alts = &self.syms[sym].alts;
        let fitting: Vec<&Vec<GramItem>> = alts
            .iter()
            .filter(|alt| self.alt_depth(alt) < budget)
            .collect();
        let alt = if fitting.is_empty() {
            let mut best = &alts[0];
            for alt in alts {
                if self.alt_depth(alt) < self.alt_depth(best) {
                    best = alt
                }
            }
            best
        } else {
            fitting[rng.gen_range(0..fitting.len())]
        };

        let mut kids = Vec::with_capacity(alt.len());
        for item in alt {
            match item {
                GramItem::Term(t) => kids.push(tree::leaf(t.clone())),
                GramItem::Sym(s) => kids.push(self.fuzz_at(
                    rng,
                    *s,
                    if budget > 0 { budget - 1 } else { 0 },
                )),
            }
        }
        tree::node(sym, kids)
    }

    /// Depth an alternative adds below its node.
    fn alt_depth(&self, alt: &[GramItem]) -> usize {
        alt.iter()
            .map(|item| match item {
                GramItem::Term(_) => 1,
                GramItem::Sym(s) => self.min_depth[*s],
            })
            .max()
            .unwrap_or(0)
    }
}

impl ::std::fmt::Display for Grammar {
    fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        for info in &self.syms {
            write!(fmt, "<{}> ::=", info.name)?;
            for (idx, alt) in info.alts.iter().enumerate() {
                if idx > 0 {
                    write!(fmt, " |")?
                }
                for item in alt {
                    match item {
                        GramItem::Sym(s) => write!(fmt, " <{}>", self.name_of(*s))?,
                        GramItem::Term(t) => write!(
                            fmt,
                            " \"{}\"",
                            t.replace('\\', "\\\\").replace('"', "\\\"")
                        )?,
                    }
                }
            }
            writeln!(fmt)?
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CALC: &str = r#"
        # tiny calculator calls
        <start> ::= <f> "(" <n> ")"
        <f> ::= "sqrt" | "cos"
        <n> ::= "-1" | "2"
    "#;

    #[test]
    fn parses_the_text_format() {
        let gram = Grammar::of_str(CALC).unwrap();
        assert_eq!(gram.len(), 3);
        assert_eq!(gram.name_of(gram.start()), "start");
        assert_eq!(gram.sym_of("n"), Some(2.into()));
        assert_eq!(gram.sym_of("unknown"), None)
    }

    #[test]
    fn parse_roundtrips() {
        let gram = Grammar::of_str(CALC).unwrap();
        for text in ["sqrt(-1)", "cos(2)", "sqrt(2)"] {
            let tree = gram.parse(text).unwrap();
            assert_eq!(tree.to_string(), text)
        }
        assert!(gram.parse("tan(2)").is_err());
        assert!(gram.parse("sqrt(2)trailing").is_err())
    }

    #[test]
    fn rejects_left_recursion() {
        let res = Grammar::of_str(r#"<e> ::= <e> "+" <e> | "1""#);
        assert!(res.is_err())
    }

    #[test]
    fn rejects_bottomless_rules() {
        let res = Grammar::of_str(r#"<a> ::= "(" <a> ")""#);
        assert!(res.is_err())
    }

    #[test]
    fn rejects_undefined_symbols() {
        let res = Grammar::of_str(r#"<a> ::= <b>"#);
        assert!(res.is_err())
    }

    #[test]
    fn reachability_is_reflexive_transitive() {
        let gram = Grammar::of_str(CALC).unwrap();
        let start = gram.start();
        let reach = gram.reachable(start);
        assert!(reach.contains(&start));
        assert!(reach.contains(&gram.sym_of("f").unwrap()));
        assert!(reach.contains(&gram.sym_of("n").unwrap()));
        let f = gram.sym_of("f").unwrap();
        assert!(!gram.reachable(f).contains(&start))
    }

    #[test]
    fn fuzzing_stays_in_the_grammar() {
        use rand::SeedableRng;
        let gram = Grammar::of_str(CALC).unwrap();
        let mut rng = ::rand_xorshift::XorShiftRng::seed_from_u64(42);
        for _ in 0..20 {
            let tree = gram.fuzz(&mut rng, None);
            let text = tree.to_string();
            assert!(gram.parse(&text).is_ok())
        }
    }
}
