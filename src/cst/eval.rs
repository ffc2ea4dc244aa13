//! Constraint evaluation over parse trees.
//!
//! Symbol references resolve relative to the innermost quantifier-bound
//! subtree, or the whole tree outside any quantifier. A symbol reference is
//! multi-valued: a comparison holds iff it holds for *every* combination of
//! left and right values, and errors when a side yields no value at all.
//! Quantifiers are vacuous on empty targets (`forall` true, `exists` false).
//!
//! Errors here mean "this constraint is not evaluable on this tree" and are
//! always caught by callers; they never abort mining.

use crate::common::*;
use crate::cst::{Expr, Op, RCst, Ref};

/// A value an expression evaluates to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EVal {
    /// A string value.
    Str(String),
    /// An integer value.
    Int(Int),
}
impl EVal {
    /// The expression a discovered value substitutes back as.
    pub fn to_expr(&self) -> Expr {
        match self {
            EVal::Str(s) => Expr::SCst(s.clone()),
            EVal::Int(i) => Expr::ICst(i.clone()),
        }
    }
}
impl_fmt! {
    EVal(self, fmt) {
        match self {
            EVal::Str(s) => write!(fmt, "{:?}", s),
            EVal::Int(i) => write!(fmt, "{}", i),
        }
    }
}

impl Op {
    /// Applies the operator to two values.
    ///
    /// Integers compare numerically, strings lexicographically; comparing a
    /// string with an integer is an evaluation error.
    pub fn eval(self, lft: &EVal, rgt: &EVal) -> Res<bool> {
        match (lft, rgt) {
            (EVal::Int(l), EVal::Int(r)) => Ok(self.of_ordering(l.cmp(r))),
            (EVal::Str(l), EVal::Str(r)) => Ok(self.of_ordering(l.cmp(r))),
            _ => Err(eval_err(format!(
                "comparing a string with an integer ({} {} {})",
                lft, self, rgt
            ))),
        }
    }
}

/// Checks a constraint on a tree.
pub fn check(cst: &RCst, tree: &Tree) -> Res<bool> {
    let mut env = Vec::new();
    check_in(cst, tree, &mut env)
}

/// All values an expression takes on a tree, under an environment.
///
/// Empty when a symbol reference matches no subtree; callers decide whether
/// that is an error (comparisons) or plain falsity (existence).
pub fn expr_vals(expr: &Expr, tree: &Tree, env: &[Tree]) -> Res<Vec<EVal>> {
    match expr {
        Expr::SCst(s) => Ok(vec![EVal::Str(s.clone())]),
        Expr::ICst(i) => Ok(vec![EVal::Int(i.clone())]),
        Expr::Txt(r) => {
            let subs = resolve(*r, tree, env)?;
            Ok(subs.iter().map(|sub| EVal::Str(sub.to_string())).collect())
        }
        Expr::Num(r) => {
            let subs = resolve(*r, tree, env)?;
            let mut vals = Vec::with_capacity(subs.len());
            for sub in subs {
                let text = sub.to_string();
                let int = text
                    .trim()
                    .parse::<Int>()
                    .map_err(|_| eval_err(format!("`{}` is not an integer", text)))?;
                vals.push(EVal::Int(int))
            }
            Ok(vals)
        }
        Expr::Len(r) => {
            let subs = resolve(*r, tree, env)?;
            Ok(subs
                .iter()
                .map(|sub| EVal::Int(sub.to_string().chars().count().into()))
                .collect())
        }
        Expr::SHole | Expr::IHole => Err(eval_err("placeholder in an evaluated constraint")),
    }
}

/// The subtrees a reference denotes.
fn resolve(r: Ref, tree: &Tree, env: &[Tree]) -> Res<Vec<Tree>> {
    match r {
        Ref::Sym(sym) => Ok(tree::find_all(base(tree, env), sym)),
        Ref::Var(var) => match env.get(*var) {
            Some(sub) => Ok(vec![sub.clone()]),
            None => Err(eval_err(format!("unbound variable v{}", var))),
        },
        Ref::Hole => Err(eval_err("placeholder in an evaluated constraint")),
    }
}

/// The innermost bound subtree, or the whole tree.
fn base<'a>(tree: &'a Tree, env: &'a [Tree]) -> &'a Tree {
    env.last().unwrap_or(tree)
}

fn check_in(cst: &RCst, tree: &Tree, env: &mut Vec<Tree>) -> Res<bool> {
    match cst {
        RCst::Cmp { op, lft, rgt } => {
            let lfts = expr_vals(lft, tree, env)?;
            let rgts = expr_vals(rgt, tree, env)?;
            if lfts.is_empty() {
                bail!(eval_err(format!("`{}` matches nothing here", lft)))
            }
            if rgts.is_empty() {
                bail!(eval_err(format!("`{}` matches nothing here", rgt)))
            }
            for l in &lfts {
                for r in &rgts {
                    if !op.eval(l, r)? {
                        return Ok(false);
                    }
                }
            }
            Ok(true)
        }

        RCst::Expr(e) => {
            let vals = expr_vals(e, tree, env)?;
            Ok(!vals.is_empty())
        }

        RCst::And(kids) => {
            for kid in kids {
                if !check_in(kid, tree, env)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        RCst::Or(kids) => {
            for kid in kids {
                if check_in(kid, tree, env)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        RCst::Imp(lhs, rhs) => {
            if check_in(lhs, tree, env)? {
                check_in(rhs, tree, env)
            } else {
                Ok(true)
            }
        }

        RCst::Not(inner) => Ok(!check_in(inner, tree, env)?),

        RCst::All { sym, body } => {
            let subs = resolve(*sym, tree, env)?;
            for sub in subs {
                env.push(sub);
                let res = check_in(body, tree, env);
                env.pop();
                if !res? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        RCst::Any { sym, body } => {
            let subs = resolve(*sym, tree, env)?;
            for sub in subs {
                env.push(sub);
                let res = check_in(body, tree, env);
                env.pop();
                if res? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst;

    fn calc() -> (Grammar, Tree) {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos"
            <n> ::= "-1" | "2"
            "#,
        )
        .unwrap();
        let tree = gram.parse("sqrt(-1)").unwrap();
        (gram, tree)
    }

    #[test]
    fn comparison_on_text() {
        let (gram, tree) = calc();
        let f = gram.sym_of("f").unwrap();
        let yes = cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into()));
        assert_eq!(yes.check(&tree).unwrap(), true);
        let no = cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("cos".into()));
        assert_eq!(no.check(&tree).unwrap(), false)
    }

    #[test]
    fn comparison_on_numbers() {
        let (gram, tree) = calc();
        let n = gram.sym_of("n").unwrap();
        let neg = cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into()));
        assert_eq!(neg.check(&tree).unwrap(), true);
        // `<f>` renders "sqrt", not an integer.
        let f = gram.sym_of("f").unwrap();
        let bad = cst::cmp(Op::Lt, Expr::Num(Ref::Sym(f)), Expr::ICst(0.into()));
        assert!(bad.check(&tree).unwrap_err().is_eval())
    }

    #[test]
    fn missing_symbol_is_an_eval_error() {
        let (gram, tree) = calc();
        // A symbol the tree does not contain must error, not crash.
        let ghost = SymIdx::from(gram.len() + 7);
        let c = cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(ghost)), Expr::SCst("x".into()));
        assert!(c.check(&tree).unwrap_err().is_eval())
    }

    #[test]
    fn quantifiers_bind_subtrees() {
        let (gram, tree) = calc();
        let n = gram.sym_of("n").unwrap();
        let bounded = cst::all(
            Ref::Sym(n),
            cst::cmp(Op::Le, Expr::Num(Ref::Var(0.into())), Expr::ICst(100.into())),
        );
        assert_eq!(bounded.check(&tree).unwrap(), true);
        let all_pos = cst::all(
            Ref::Sym(n),
            cst::cmp(Op::Ge, Expr::Num(Ref::Var(0.into())), Expr::ICst(0.into())),
        );
        assert_eq!(all_pos.check(&tree).unwrap(), false)
    }

    #[test]
    fn quantifiers_are_vacuous_on_empty_targets() {
        let (gram, tree) = calc();
        let ghost = SymIdx::from(gram.len() + 7);
        let t = cst::cmp(Op::Eql, Expr::ICst(0.into()), Expr::ICst(0.into()));
        assert_eq!(cst::all(Ref::Sym(ghost), t.clone()).check(&tree).unwrap(), true);
        assert_eq!(cst::any(Ref::Sym(ghost), t).check(&tree).unwrap(), false)
    }

    #[test]
    fn existence_is_emptiness() {
        let (gram, tree) = calc();
        let n = gram.sym_of("n").unwrap();
        let ghost = SymIdx::from(gram.len() + 7);
        assert_eq!(cst::some(Expr::Txt(Ref::Sym(n))).check(&tree).unwrap(), true);
        assert_eq!(
            cst::some(Expr::Txt(Ref::Sym(ghost))).check(&tree).unwrap(),
            false
        )
    }

    #[test]
    fn holes_are_eval_errors() {
        let (_, tree) = calc();
        let template = cst::cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SHole);
        assert!(template.check(&tree).unwrap_err().is_eval())
    }
}
