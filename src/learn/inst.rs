//! Template instantiation.
//!
//! Turns templates (constraints with placeholders) into ground constraints:
//!
//! - each symbol placeholder ranges over the relevant symbols, so a template
//!   with `k` of them yields `|relevant|^k` combinations;
//! - each value placeholder draws from the extraction bucket of the symbol on
//!   the opposite side of its comparison, falling back to *runtime discovery*:
//!   the hole-free side is evaluated over the capped failing inputs and the
//!   observed values are substituted. Discovery recovers computed values (a
//!   length, a checksum) that never occur as literal substrings;
//! - quantifiers over a symbol placeholder restrict the relevant set of their
//!   body to the symbols reachable from the bound one;
//! - conjunction and implication branches instantiate independently and
//!   recombine as a cartesian product.
//!
//! Unresolvable placeholders drop their branch silently. A disjunction as the
//! template head is an explicit unsupported error.

use crate::common::*;
use crate::cst::eval::{self, EVal};
use crate::learn::extract::Extraction;

/// The built-in template repository.
pub fn default_templates() -> Vec<Cst> {
    let mut res = vec![cst::cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SHole)];
    for op in Op::all() {
        res.push(cst::cmp(op, Expr::Num(Ref::Hole), Expr::Len(Ref::Hole)))
    }
    for op in Op::all() {
        res.push(cst::cmp(op, Expr::Num(Ref::Hole), Expr::IHole))
    }
    for op in [Op::Eql, Op::Neq, Op::Lt, Op::Le] {
        res.push(cst::cmp(op, Expr::Num(Ref::Hole), Expr::Num(Ref::Hole)))
    }
    res.push(cst::all(
        Ref::Hole,
        cst::cmp(Op::Le, Expr::Num(Ref::Var(0.into())), Expr::IHole),
    ));
    res
}

/// Instantiates templates against one learning round's context.
pub struct Instantiator<'a> {
    /// The grammar, for reachability.
    gram: &'a Grammar,
    /// Extracted value buckets.
    extraction: &'a Extraction,
    /// Capped failing inputs, for runtime value discovery.
    inputs: &'a [&'a Input],
    /// Profiler.
    _profiler: &'a Profiler,
}

impl<'a> Instantiator<'a> {
    /// Constructor.
    pub fn new(
        gram: &'a Grammar,
        extraction: &'a Extraction,
        inputs: &'a [&'a Input],
        _profiler: &'a Profiler,
    ) -> Self {
        Instantiator {
            gram,
            extraction,
            inputs,
            _profiler,
        }
    }

    /// Instantiates one template over some relevant symbols.
    pub fn instantiate(&self, template: &Cst, relevant: &SymSet) -> Res<Vec<Cst>> {
        let mut ctx = Vec::new();
        self.inst_in(template, relevant, &mut ctx)
    }

    fn inst_in(&self, cst: &Cst, relevant: &SymSet, ctx: &mut Vec<SymIdx>) -> Res<Vec<Cst>> {
        match cst.get() {
            RCst::Or(_) => bail!(ErrorKind::Unsupported(
                "disjunction as a template head".into()
            )),

            RCst::Cmp { op, lft, rgt } => self.inst_cmp(*op, lft, rgt, relevant, ctx),

            RCst::Expr(e) => {
                if matches!(e, Expr::SHole | Expr::IHole) {
                    // A bare value placeholder has no opposite side to draw
                    // values from.
                    return Ok(vec![]);
                }
                Ok(assignments(relevant, count_holes(e))
                    .into_iter()
                    .map(|assign| {
                        let mut next = 0;
                        cst::some(fill(e, &assign, &mut next))
                    })
                    .collect())
            }

            RCst::And(kids) => {
                let mut lists = Vec::with_capacity(kids.len());
                for kid in kids {
                    lists.push(self.inst_in(kid, relevant, ctx)?)
                }
                Ok(product(lists).into_iter().map(cst::and).collect())
            }

            RCst::Imp(lhs, rhs) => {
                let lists = vec![
                    self.inst_in(lhs, relevant, ctx)?,
                    self.inst_in(rhs, relevant, ctx)?,
                ];
                Ok(product(lists)
                    .into_iter()
                    .map(|mut pair| {
                        let rhs = pair.pop().expect("pairs have two elements");
                        let lhs = pair.pop().expect("pairs have two elements");
                        cst::imp(lhs, rhs)
                    })
                    .collect())
            }

            RCst::Not(inner) => Ok(self
                .inst_in(inner, relevant, ctx)?
                .into_iter()
                .map(cst::not)
                .collect()),

            RCst::All { sym, body } => self.inst_quant(true, *sym, body, relevant, ctx),
            RCst::Any { sym, body } => self.inst_quant(false, *sym, body, relevant, ctx),
        }
    }

    /// Quantifier instantiation, threading reachability into the body.
    fn inst_quant(
        &self,
        universal: bool,
        sym: Ref,
        body: &Cst,
        relevant: &SymSet,
        ctx: &mut Vec<SymIdx>,
    ) -> Res<Vec<Cst>> {
        let targets: Vec<SymIdx> = match sym {
            Ref::Sym(s) => vec![s],
            Ref::Hole => relevant.iter().cloned().collect(),
            Ref::Var(_) => {
                log! { @debug "dropping quantifier over a bound variable" }
                return Ok(vec![]);
            }
        };
        let mut res = Vec::new();
        for target in targets {
            let inner: SymSet = relevant
                .intersection(self.gram.reachable(target))
                .cloned()
                .collect();
            ctx.push(target);
            let bodies = self.inst_in(body, &inner, ctx);
            ctx.pop();
            for body in bodies? {
                res.push(if universal {
                    cst::all(Ref::Sym(target), body)
                } else {
                    cst::any(Ref::Sym(target), body)
                })
            }
        }
        Ok(res)
    }

    /// Comparison instantiation: symbol holes first, then value holes.
    fn inst_cmp(
        &self,
        op: Op,
        lft: &Expr,
        rgt: &Expr,
        relevant: &SymSet,
        ctx: &[SymIdx],
    ) -> Res<Vec<Cst>> {
        let k = count_holes(lft) + count_holes(rgt);
        let mut res = Vec::new();
        for assign in assignments(relevant, k) {
            let mut next = 0;
            let lft = fill(lft, &assign, &mut next);
            let rgt = fill(rgt, &assign, &mut next);
            let lfts = self.values_for(&lft, &rgt, ctx);
            let rgts = self.values_for(&rgt, &lft, ctx);
            for l in &lfts {
                for r in &rgts {
                    res.push(cst::cmp(op, l.clone(), r.clone()))
                }
            }
        }
        Ok(res)
    }

    /// The expressions a comparison side expands to.
    ///
    /// A concrete side stays as is; a value placeholder substitutes the
    /// values of the symbol referenced by the opposite side.
    fn values_for(&self, side: &Expr, opposite: &Expr, ctx: &[SymIdx]) -> Vec<Expr> {
        let want_int = match side {
            Expr::IHole => true,
            Expr::SHole => false,
            _ => return vec![side.clone()],
        };
        let source = match opposite.reference() {
            Some(Ref::Sym(s)) => Some(s),
            Some(Ref::Var(v)) => ctx.get(*v).cloned(),
            _ => None,
        };
        let source = match source {
            Some(source) => source,
            // No symbol to draw values from, drop the branch.
            None => return vec![],
        };

        let mut res: Vec<Expr> = if want_int {
            self.extraction
                .ints_filtered(source)
                .into_iter()
                .map(Expr::ICst)
                .collect()
        } else {
            self.extraction
                .strs(source)
                .map(|s| Expr::SCst(s.clone()))
                .collect()
        };
        if res.is_empty() {
            res = self.discover(opposite, ctx, want_int)
        }
        res
    }

    /// Runtime value discovery: evaluates the hole-free side over the capped
    /// failing inputs and collects the observed values.
    ///
    /// Per-input evaluation errors are swallowed at debug level and counted.
    fn discover(&self, expr: &Expr, ctx: &[SymIdx], want_int: bool) -> Vec<Expr> {
        let expr = match deref_vars(expr, ctx) {
            Some(expr) => expr,
            None => return vec![],
        };
        let mut ints = BTreeSet::new();
        let mut strs = BTreeSet::new();
        for input in self.inputs {
            match eval::expr_vals(&expr, &input.tree, &[]) {
                Ok(vals) => {
                    for val in vals {
                        match val {
                            EVal::Int(i) => {
                                ints.insert(i);
                            }
                            EVal::Str(s) => {
                                strs.insert(s);
                            }
                        }
                    }
                }
                Err(e) => {
                    profile! { self "discovery errors" => add 1 }
                    log! { @debug
                        "value discovery for `{}` skips {}: {}", expr, input, e
                    }
                }
            }
        }
        if want_int {
            ints.into_iter().map(Expr::ICst).collect()
        } else {
            strs.into_iter().map(Expr::SCst).collect()
        }
    }
}

/// Number of symbol placeholders in an expression.
fn count_holes(e: &Expr) -> usize {
    match e.reference() {
        Some(Ref::Hole) => 1,
        _ => 0,
    }
}

/// Fills symbol placeholders positionally from an assignment.
fn fill(e: &Expr, assign: &[SymIdx], next: &mut usize) -> Expr {
    let mut sub = |r: &Ref| match r {
        Ref::Hole => {
            let sym = assign[*next];
            *next += 1;
            Ref::Sym(sym)
        }
        r => *r,
    };
    match e {
        Expr::Txt(r) => Expr::Txt(sub(r)),
        Expr::Num(r) => Expr::Num(sub(r)),
        Expr::Len(r) => Expr::Len(sub(r)),
        e => e.clone(),
    }
}

/// Replaces bound-variable references by their symbol, for discovery.
fn deref_vars(e: &Expr, ctx: &[SymIdx]) -> Option<Expr> {
    let sub = |r: &Ref| match r {
        Ref::Sym(s) => Some(Ref::Sym(*s)),
        Ref::Var(v) => ctx.get(**v).map(|s| Ref::Sym(*s)),
        Ref::Hole => None,
    };
    match e {
        Expr::Txt(r) => sub(r).map(Expr::Txt),
        Expr::Num(r) => sub(r).map(Expr::Num),
        Expr::Len(r) => sub(r).map(Expr::Len),
        Expr::SHole | Expr::IHole => None,
        e => Some(e.clone()),
    }
}

/// All `k`-tuples over a symbol set, in lexicographic order.
fn assignments(relevant: &SymSet, k: usize) -> Vec<Vec<SymIdx>> {
    let syms: Vec<SymIdx> = relevant.iter().cloned().collect();
    let mut res = vec![vec![]];
    for _ in 0..k {
        let mut next = Vec::with_capacity(res.len() * syms.len());
        for pre in &res {
            for &sym in &syms {
                let mut pre = pre.clone();
                pre.push(sym);
                next.push(pre)
            }
        }
        res = next
    }
    res
}

/// Cartesian product of per-branch instantiation lists.
fn product(lists: Vec<Vec<Cst>>) -> Vec<Vec<Cst>> {
    let mut res = vec![vec![]];
    for list in lists {
        let mut next = Vec::with_capacity(res.len() * list.len());
        for pre in &res {
            for item in &list {
                let mut pre = pre.clone();
                pre.push(item.clone());
                next.push(pre)
            }
        }
        res = next;
        if res.is_empty() {
            break;
        }
    }
    res
}

#[cfg(test)]
mod test {
    use super::*;

    fn setup() -> (Grammar, Vec<Input>, SymSet) {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos"
            <n> ::= "-1" | "2"
            "#,
        )
        .unwrap();
        let inputs = vec![Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing)];
        let mut relevant = SymSet::new();
        relevant.insert(gram.sym_of("f").unwrap());
        relevant.insert(gram.sym_of("n").unwrap());
        (gram, inputs, relevant)
    }

    #[test]
    fn one_hole_yields_one_candidate_per_symbol() {
        let (gram, inputs, relevant) = setup();
        let refs: Vec<&Input> = inputs.iter().collect();
        let ext = Extraction::scan(&relevant, &refs);
        let prof = Profiler::new();
        let inst = Instantiator::new(&gram, &ext, &refs, &prof);

        // No value holes, so exactly |relevant| candidates.
        let template = cst::cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SCst("sqrt".into()));
        let csts = inst.instantiate(&template, &relevant).unwrap();
        assert_eq!(csts.len(), relevant.len())
    }

    #[test]
    fn value_holes_draw_from_the_opposite_symbol() {
        let (gram, inputs, relevant) = setup();
        let refs: Vec<&Input> = inputs.iter().collect();
        let ext = Extraction::scan(&relevant, &refs);
        let prof = Profiler::new();
        let inst = Instantiator::new(&gram, &ext, &refs, &prof);

        let template = cst::cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SHole);
        let csts = inst.instantiate(&template, &relevant).unwrap();
        // `<f>` has one string value; `<n>` is numeric so its string bucket
        // is empty and discovery recovers the rendered text instead.
        assert_eq!(csts.len(), 2);
        assert_eq!(csts[0].to_string(), "(= (txt @1) \"sqrt\")");
        assert_eq!(csts[1].to_string(), "(= (txt @2) \"-1\")")
    }

    #[test]
    fn discovery_recovers_computed_values() {
        let (gram, inputs, relevant) = setup();
        let refs: Vec<&Input> = inputs.iter().collect();
        let ext = Extraction::scan(&relevant, &refs);
        let prof = Profiler::new();
        let inst = Instantiator::new(&gram, &ext, &refs, &prof);

        // No symbol has a literal `4` anywhere; only evaluating `len` over
        // the failing input can produce it.
        let f = gram.sym_of("f").unwrap();
        let template = cst::cmp(Op::Eql, Expr::Len(Ref::Sym(f)), Expr::IHole);
        let csts = inst.instantiate(&template, &relevant).unwrap();
        assert_eq!(csts.len(), 1);
        assert_eq!(csts[0].to_string(), "(= (len @1) 4)")
    }

    #[test]
    fn quantifier_holes_expand_over_relevant_symbols() {
        let (gram, inputs, relevant) = setup();
        let refs: Vec<&Input> = inputs.iter().collect();
        let ext = Extraction::scan(&relevant, &refs);
        let prof = Profiler::new();
        let inst = Instantiator::new(&gram, &ext, &refs, &prof);

        let template = cst::all(
            Ref::Hole,
            cst::cmp(Op::Le, Expr::Num(Ref::Var(0.into())), Expr::IHole),
        );
        let csts = inst.instantiate(&template, &relevant).unwrap();
        // Only `<n>` carries integer values: -1 and 2 give two bounds.
        assert_eq!(csts.len(), 1);
        assert_eq!(csts[0].to_string(), "(forall @2 (<= (num v0) -1))")
    }

    #[test]
    fn disjunction_head_is_unsupported() {
        let (gram, inputs, relevant) = setup();
        let refs: Vec<&Input> = inputs.iter().collect();
        let ext = Extraction::scan(&relevant, &refs);
        let prof = Profiler::new();
        let inst = Instantiator::new(&gram, &ext, &refs, &prof);

        let template = cst::or(vec![
            cst::cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SHole),
            cst::cmp(Op::Lt, Expr::Num(Ref::Hole), Expr::IHole),
        ]);
        let err = inst.instantiate(&template, &relevant).unwrap_err();
        assert!(matches!(*err.kind(), ErrorKind::Unsupported(_)))
    }

    #[test]
    fn conjunction_branches_product() {
        let (gram, inputs, relevant) = setup();
        let refs: Vec<&Input> = inputs.iter().collect();
        let ext = Extraction::scan(&relevant, &refs);
        let prof = Profiler::new();
        let inst = Instantiator::new(&gram, &ext, &refs, &prof);

        let template = cst::and(vec![
            cst::cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SCst("sqrt".into())),
            cst::cmp(Op::Lt, Expr::Num(Ref::Hole), Expr::ICst(0.into())),
        ]);
        let csts = inst.instantiate(&template, &relevant).unwrap();
        // 2 symbols per hole, 2 holes.
        assert_eq!(csts.len(), 4)
    }
}
