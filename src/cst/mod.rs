//! Hashconsed boolean constraints over parse trees.
//!
//! The `R`eal constraint structure [`RCst`](enum.RCst.html) is a closed enum;
//! every operation over it (evaluation, instantiation, negation, printing) is
//! one exhaustive match. Code manipulates [`Cst`](type.Cst.html)s, hashconsed
//! constraints: two structurally equal constraints share one unique id, which
//! is what candidate deduplication keys off.
//!
//! `Display` prints the canonical, grammar-free rendering (`@i` for symbol
//! references, `v{i}` for bound variables, `?`/`?str`/`?int` for placeholders).
//! `PebcakFmt` threads a grammar through and prints actual symbol names.
//!
//! A *template* is just a `Cst` that still contains placeholders; it is only
//! ever instantiated, the evaluator errors on any hole.

use hashconsing::{HConsign, HashConsign};

use crate::common::*;

pub mod eval;

/// Hashconsed constraint.
pub type Cst = HConsed<RCst>;

/// Set of hashconsed constraints.
pub type CstSet = HConSet<Cst>;

/// A comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Op {
    /// Equality.
    Eql,
    /// Disequality.
    Neq,
    /// Strictly less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Strictly greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}
impl Op {
    /// All six operators.
    pub fn all() -> [Op; 6] {
        [Op::Eql, Op::Neq, Op::Lt, Op::Le, Op::Gt, Op::Ge]
    }

    /// The operator whose result is the exact complement.
    pub fn flip(self) -> Op {
        match self {
            Op::Eql => Op::Neq,
            Op::Neq => Op::Eql,
            Op::Lt => Op::Ge,
            Op::Ge => Op::Lt,
            Op::Le => Op::Gt,
            Op::Gt => Op::Le,
        }
    }

    /// Applies the operator to an ordering.
    pub fn of_ordering(self, ord: ::std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Op::Eql => ord == Equal,
            Op::Neq => ord != Equal,
            Op::Lt => ord == Less,
            Op::Le => ord != Greater,
            Op::Gt => ord == Greater,
            Op::Ge => ord != Less,
        }
    }
}
impl_fmt! {
    Op(self, fmt) {
        let op = match self {
            Op::Eql => "=",
            Op::Neq => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        };
        write!(fmt, "{}", op)
    }
}

/// A reference to one or more subtrees of the tree under evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ref {
    /// All subtrees expanding a symbol, relative to the innermost bound
    /// subtree.
    Sym(SymIdx),
    /// A quantifier-bound subtree, as a de Bruijn level.
    Var(VarIdx),
    /// The symbol placeholder of a template.
    Hole,
}
impl_fmt! {
    Ref(self, fmt) {
        match self {
            Ref::Sym(sym) => write!(fmt, "@{}", sym),
            Ref::Var(var) => write!(fmt, "v{}", var),
            Ref::Hole => write!(fmt, "?"),
        }
    }
}

/// A value expression, the operand of a comparison.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expr {
    /// A string literal.
    SCst(String),
    /// An integer literal.
    ICst(Int),
    /// The text a subtree renders.
    Txt(Ref),
    /// The text a subtree renders, read as an integer.
    Num(Ref),
    /// The length of the text a subtree renders.
    Len(Ref),
    /// The string value placeholder of a template.
    SHole,
    /// The integer value placeholder of a template.
    IHole,
}
impl Expr {
    /// The reference this expression reads, if any.
    pub fn reference(&self) -> Option<Ref> {
        match self {
            Expr::Txt(r) | Expr::Num(r) | Expr::Len(r) => Some(*r),
            Expr::SCst(_) | Expr::ICst(_) | Expr::SHole | Expr::IHole => None,
        }
    }

    /// True if this expression is or contains a placeholder.
    pub fn has_holes(&self) -> bool {
        match self {
            Expr::SHole | Expr::IHole => true,
            Expr::Txt(r) | Expr::Num(r) | Expr::Len(r) => *r == Ref::Hole,
            Expr::SCst(_) | Expr::ICst(_) => false,
        }
    }
}
impl_fmt! {
    Expr(self, fmt) {
        match self {
            Expr::SCst(s) => write!(fmt, "{:?}", s),
            Expr::ICst(i) => write!(fmt, "{}", i),
            Expr::Txt(r) => write!(fmt, "(txt {})", r),
            Expr::Num(r) => write!(fmt, "(num {})", r),
            Expr::Len(r) => write!(fmt, "(len {})", r),
            Expr::SHole => write!(fmt, "?str"),
            Expr::IHole => write!(fmt, "?int"),
        }
    }
}

/// A constraint over a parse tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RCst {
    /// A comparison between two value expressions.
    ///
    /// Symbol references make both sides multi-valued; the comparison holds
    /// iff it holds for every combination of values.
    Cmp {
        /// Operator.
        op: Op,
        /// Left operand.
        lft: Expr,
        /// Right operand.
        rgt: Expr,
    },
    /// Existence: holds iff the expression yields at least one value.
    Expr(Expr),
    /// Conjunction.
    And(Vec<Cst>),
    /// Disjunction.
    Or(Vec<Cst>),
    /// Implication.
    Imp(Cst, Cst),
    /// Negation.
    Not(Cst),
    /// Holds iff the body holds for every subtree of the target.
    ///
    /// Vacuously true when the target matches nothing.
    All {
        /// Search target, a symbol or a placeholder.
        sym: Ref,
        /// Body; sees the bound subtree as the innermost variable.
        body: Cst,
    },
    /// Holds iff the body holds for some subtree of the target.
    ///
    /// Vacuously false when the target matches nothing.
    Any {
        /// Search target, a symbol or a placeholder.
        sym: Ref,
        /// Body; sees the bound subtree as the innermost variable.
        body: Cst,
    },
}

impl RCst {
    /// Number of AST nodes, the formula size the fitness ordering penalizes.
    pub fn count(&self) -> usize {
        match self {
            RCst::Cmp { .. } => 3,
            RCst::Expr(_) => 2,
            RCst::And(kids) | RCst::Or(kids) => {
                1 + kids.iter().map(|kid| kid.count()).sum::<usize>()
            }
            RCst::Imp(lhs, rhs) => 1 + lhs.count() + rhs.count(),
            RCst::Not(inner) => 1 + inner.count(),
            RCst::All { body, .. } | RCst::Any { body, .. } => 2 + body.count(),
        }
    }

    /// True if the constraint still contains placeholders, *i.e.* is a
    /// template.
    pub fn has_holes(&self) -> bool {
        match self {
            RCst::Cmp { lft, rgt, .. } => lft.has_holes() || rgt.has_holes(),
            RCst::Expr(e) => e.has_holes(),
            RCst::And(kids) | RCst::Or(kids) => kids.iter().any(|kid| kid.has_holes()),
            RCst::Imp(lhs, rhs) => lhs.has_holes() || rhs.has_holes(),
            RCst::Not(inner) => inner.has_holes(),
            RCst::All { sym, body } | RCst::Any { sym, body } => {
                *sym == Ref::Hole || body.has_holes()
            }
        }
    }

    /// Checks the constraint on a tree.
    ///
    /// Errors when the constraint references a symbol the tree does not
    /// contain, or contains placeholders. Callers treat evaluation errors as
    /// "not evaluable here", never as fatal.
    pub fn check(&self, tree: &Tree) -> Res<bool> {
        eval::check(self, tree)
    }
}

impl ::std::fmt::Display for RCst {
    fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match self {
            RCst::Cmp { op, lft, rgt } => write!(fmt, "({} {} {})", op, lft, rgt),
            RCst::Expr(e) => write!(fmt, "(some {})", e),
            RCst::And(kids) => {
                write!(fmt, "(and")?;
                for kid in kids {
                    write!(fmt, " {}", kid)?
                }
                write!(fmt, ")")
            }
            RCst::Or(kids) => {
                write!(fmt, "(or")?;
                for kid in kids {
                    write!(fmt, " {}", kid)?
                }
                write!(fmt, ")")
            }
            RCst::Imp(lhs, rhs) => write!(fmt, "(=> {} {})", lhs, rhs),
            RCst::Not(inner) => write!(fmt, "(not {})", inner),
            RCst::All { sym, body } => write!(fmt, "(forall {} {})", sym, body),
            RCst::Any { sym, body } => write!(fmt, "(exists {} {})", sym, body),
        }
    }
}

impl<'a> PebcakFmt<'a> for RCst {
    type Info = &'a Grammar;
    fn pebcak_err(&self) -> ErrorKind {
        "during constraint pebcak formatting".into()
    }
    fn pebcak_io_fmt<W: Write>(&self, w: &mut W, gram: &'a Grammar) -> IoRes<()> {
        let fmt_ref = |w: &mut W, r: &Ref| match r {
            Ref::Sym(sym) => write!(w, "<{}>", gram.name_of(*sym)),
            Ref::Var(var) => write!(w, "v{}", var),
            Ref::Hole => write!(w, "?"),
        };
        let fmt_expr = |w: &mut W, e: &Expr| match e {
            Expr::SCst(s) => write!(w, "{:?}", s),
            Expr::ICst(i) => write!(w, "{}", i),
            Expr::Txt(r) => {
                write!(w, "(txt ")?;
                fmt_ref(w, r)?;
                write!(w, ")")
            }
            Expr::Num(r) => {
                write!(w, "(num ")?;
                fmt_ref(w, r)?;
                write!(w, ")")
            }
            Expr::Len(r) => {
                write!(w, "(len ")?;
                fmt_ref(w, r)?;
                write!(w, ")")
            }
            Expr::SHole => write!(w, "?str"),
            Expr::IHole => write!(w, "?int"),
        };
        match self {
            RCst::Cmp { op, lft, rgt } => {
                write!(w, "({} ", op)?;
                fmt_expr(w, lft)?;
                write!(w, " ")?;
                fmt_expr(w, rgt)?;
                write!(w, ")")
            }
            RCst::Expr(e) => {
                write!(w, "(some ")?;
                fmt_expr(w, e)?;
                write!(w, ")")
            }
            RCst::And(kids) => {
                write!(w, "(and")?;
                for kid in kids {
                    write!(w, " ")?;
                    kid.pebcak_io_fmt(w, gram)?
                }
                write!(w, ")")
            }
            RCst::Or(kids) => {
                write!(w, "(or")?;
                for kid in kids {
                    write!(w, " ")?;
                    kid.pebcak_io_fmt(w, gram)?
                }
                write!(w, ")")
            }
            RCst::Imp(lhs, rhs) => {
                write!(w, "(=> ")?;
                lhs.pebcak_io_fmt(w, gram)?;
                write!(w, " ")?;
                rhs.pebcak_io_fmt(w, gram)?;
                write!(w, ")")
            }
            RCst::Not(inner) => {
                write!(w, "(not ")?;
                inner.pebcak_io_fmt(w, gram)?;
                write!(w, ")")
            }
            RCst::All { sym, body } => {
                write!(w, "(forall ")?;
                fmt_ref(w, sym)?;
                write!(w, " ")?;
                body.pebcak_io_fmt(w, gram)?;
                write!(w, ")")
            }
            RCst::Any { sym, body } => {
                write!(w, "(exists ")?;
                fmt_ref(w, sym)?;
                write!(w, " ")?;
                body.pebcak_io_fmt(w, gram)?;
                write!(w, ")")
            }
        }
    }
}

// |===| Factory.

/// Type of the constraint factory.
type Factory = ::std::sync::RwLock<HConsign<RCst>>;

lazy_static! {
    /// Constraint factory.
    static ref factory: Factory = ::std::sync::RwLock::new(
        HConsign::with_capacity(conf.factory.cst_capa)
    );
}

/// Creates a constraint.
#[inline]
pub fn cst(c: RCst) -> Cst {
    factory.mk(c)
}

/// Creates a comparison.
#[inline]
pub fn cmp(op: Op, lft: Expr, rgt: Expr) -> Cst {
    factory.mk(RCst::Cmp { op, lft, rgt })
}

/// Creates an existence constraint.
#[inline]
pub fn some(e: Expr) -> Cst {
    factory.mk(RCst::Expr(e))
}

/// Creates a conjunction. Flattens nested conjunctions, unwraps singletons.
pub fn and(kids: Vec<Cst>) -> Cst {
    let mut flat = Vec::with_capacity(kids.len());
    for kid in kids {
        match kid.get() {
            RCst::And(sub) => flat.extend(sub.iter().cloned()),
            _ => flat.push(kid),
        }
    }
    if flat.len() == 1 {
        flat.pop().expect("flat has exactly one element")
    } else {
        factory.mk(RCst::And(flat))
    }
}

/// Creates a disjunction. Flattens nested disjunctions, unwraps singletons.
pub fn or(kids: Vec<Cst>) -> Cst {
    let mut flat = Vec::with_capacity(kids.len());
    for kid in kids {
        match kid.get() {
            RCst::Or(sub) => flat.extend(sub.iter().cloned()),
            _ => flat.push(kid),
        }
    }
    if flat.len() == 1 {
        flat.pop().expect("flat has exactly one element")
    } else {
        factory.mk(RCst::Or(flat))
    }
}

/// Creates an implication.
#[inline]
pub fn imp(lhs: Cst, rhs: Cst) -> Cst {
    factory.mk(RCst::Imp(lhs, rhs))
}

/// Creates a negation.
///
/// Comparisons flip their operator and a double negation unwraps, so the
/// result is always in a canonical shape.
pub fn not(inner: Cst) -> Cst {
    match inner.get() {
        RCst::Cmp { op, lft, rgt } => cmp(op.flip(), lft.clone(), rgt.clone()),
        RCst::Not(sub) => sub.clone(),
        _ => factory.mk(RCst::Not(inner)),
    }
}

/// Creates a universal quantification.
#[inline]
pub fn all(sym: Ref, body: Cst) -> Cst {
    factory.mk(RCst::All { sym, body })
}

/// Creates an existential quantification.
#[inline]
pub fn any(sym: Ref, body: Cst) -> Cst {
    factory.mk(RCst::Any { sym, body })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn consing_dedups() {
        let c1 = cmp(Op::Eql, Expr::Txt(Ref::Sym(1.into())), Expr::SCst("sqrt".into()));
        let c2 = cmp(Op::Eql, Expr::Txt(Ref::Sym(1.into())), Expr::SCst("sqrt".into()));
        assert_eq!(c1.uid(), c2.uid())
    }

    #[test]
    fn canonical_rendering() {
        let c = and(vec![
            cmp(Op::Eql, Expr::Txt(Ref::Sym(1.into())), Expr::SCst("sqrt".into())),
            cmp(Op::Lt, Expr::Num(Ref::Sym(2.into())), Expr::ICst(0.into())),
        ]);
        assert_eq!(c.to_string(), "(and (= (txt @1) \"sqrt\") (< (num @2) 0))")
    }

    #[test]
    fn negation_flips_comparisons() {
        let c = cmp(Op::Lt, Expr::Num(Ref::Sym(2.into())), Expr::ICst(0.into()));
        let n = not(c.clone());
        assert_eq!(n.to_string(), "(>= (num @2) 0)");
        assert_eq!(not(n).uid(), c.uid())
    }

    #[test]
    fn and_flattens_and_unwraps() {
        let a = cmp(Op::Eql, Expr::Len(Ref::Sym(1.into())), Expr::ICst(4.into()));
        let b = cmp(Op::Gt, Expr::Num(Ref::Sym(2.into())), Expr::ICst(0.into()));
        assert_eq!(and(vec![a.clone()]).uid(), a.uid());
        let nested = and(vec![and(vec![a.clone(), b.clone()]), a.clone()]);
        assert_eq!(nested.to_string(), format!("(and {} {} {})", a, b, a))
    }

    #[test]
    fn templates_have_holes() {
        let template = cmp(Op::Eql, Expr::Txt(Ref::Hole), Expr::SHole);
        assert!(template.has_holes());
        let ground = cmp(Op::Eql, Expr::Txt(Ref::Sym(0.into())), Expr::SCst("x".into()));
        assert!(!ground.has_holes());
        let quant = all(Ref::Hole, cmp(Op::Le, Expr::Num(Ref::Var(0.into())), Expr::IHole));
        assert!(quant.has_holes())
    }

    #[test]
    fn count_is_structural() {
        let leaf = cmp(Op::Eql, Expr::Txt(Ref::Sym(1.into())), Expr::SCst("x".into()));
        assert_eq!(leaf.count(), 3);
        let both = and(vec![
            leaf.clone(),
            cmp(Op::Lt, Expr::Num(Ref::Sym(2.into())), Expr::ICst(0.into())),
        ]);
        assert_eq!(both.count(), 7)
    }
}
