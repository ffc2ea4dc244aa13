//! Input generation strategies.

use rand_xorshift::XorShiftRng;

use crate::common::*;

/// Generates trees for a constraint. Best-effort: strategies return what they
/// found when the deadline hits, never more than `count` trees.
pub trait Generate: Send + Sync {
    /// Short description.
    fn name(&self) -> &'static str;
    /// Generates up to `count` trees before `deadline`.
    fn generate(
        &self,
        gram: &Grammar,
        rng: &mut XorShiftRng,
        cst: &Cst,
        count: usize,
        deadline: Instant,
    ) -> Vec<Tree>;
}

/// Pure grammar fuzzing, ignores the constraint.
pub struct GramGen;
impl Generate for GramGen {
    fn name(&self) -> &'static str {
        "grammar fuzz"
    }
    fn generate(
        &self,
        gram: &Grammar,
        rng: &mut XorShiftRng,
        _cst: &Cst,
        count: usize,
        deadline: Instant,
    ) -> Vec<Tree> {
        let mut seen = TreeSet::new();
        let mut res = Vec::with_capacity(count);
        while res.len() < count && Instant::now() < deadline {
            let tree = gram.fuzz(rng, None);
            if seen.insert(tree.clone()) {
                res.push(tree)
            }
        }
        res
    }
}

/// Rejection-filtered fuzzing: only trees satisfying the constraint make it
/// out. Trees the constraint cannot evaluate on are rejected too.
pub struct CstGen;
impl Generate for CstGen {
    fn name(&self) -> &'static str {
        "constraint-directed fuzz"
    }
    fn generate(
        &self,
        gram: &Grammar,
        rng: &mut XorShiftRng,
        cst: &Cst,
        count: usize,
        deadline: Instant,
    ) -> Vec<Tree> {
        let mut seen = TreeSet::new();
        let mut res = Vec::with_capacity(count);
        while res.len() < count && Instant::now() < deadline {
            let tree = gram.fuzz(rng, None);
            if !seen.insert(tree.clone()) {
                continue;
            }
            if let Ok(true) = cst.check(&tree) {
                res.push(tree)
            }
        }
        res
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst::{Expr, Op, Ref};
    use rand::SeedableRng;

    fn calc() -> Grammar {
        Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos" | "tan"
            <n> ::= <d> | "-" <d>
            <d> ::= "1" | "2" | "7" | "9"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn constraint_directed_generation_satisfies() {
        let gram = calc();
        let mut rng = XorShiftRng::seed_from_u64(42);
        let cst = cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(gram.sym_of("f").unwrap())),
            Expr::SCst("sqrt".into()),
        );
        let deadline = Instant::now() + Duration::from_secs(2);
        let trees = CstGen.generate(&gram, &mut rng, &cst, 5, deadline);
        assert!(!trees.is_empty());
        for tree in &trees {
            assert!(cst.check(tree).unwrap());
            assert!(tree.to_string().starts_with("sqrt("))
        }
    }

    #[test]
    fn grammar_generation_dedups() {
        let gram = calc();
        let mut rng = XorShiftRng::seed_from_u64(42);
        let cst = cst::cmp(
            Op::Eql,
            Expr::Txt(Ref::Sym(gram.sym_of("f").unwrap())),
            Expr::SCst("sqrt".into()),
        );
        let deadline = Instant::now() + Duration::from_secs(2);
        let trees = GramGen.generate(&gram, &mut rng, &cst, 10, deadline);
        let mut set = TreeSet::new();
        for tree in trees {
            assert!(set.insert(tree))
        }
    }
}
