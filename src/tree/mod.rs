//! Hashconsed parse trees.
//!
//! The factory is a `static_ref` for easy creation. The `R`eal tree structure
//! is [`RTree`](enum.RTree.html), but most of the code works on
//! [`Tree`](type.Tree.html)s, *i.e.* hashconsed trees. Equality, hashing and
//! set membership on `Tree`s go through the unique identifier, so deduping
//! generated inputs is constant-time.
//!
//! Two trees rendering the same string are *not* merged: the derivation
//! matters, not just the rendered input.

use crate::common::*;

mod factory;

pub use self::factory::*;

/// Hashconsed tree.
pub type Tree = HConsed<RTree>;

/// Set of hashconsed trees.
pub type TreeSet = HConSet<Tree>;
/// Map from hashconsed trees to something.
pub type TreeMap<T> = HConMap<Tree, T>;

/// A parse tree, as produced by parsing or fuzzing a grammar.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum RTree {
    /// A terminal, holding the exact substring it covers.
    Leaf(String),
    /// An expansion of a grammar symbol.
    Node {
        /// The symbol this node expands.
        sym: SymIdx,
        /// One child per item of the rule alternative used.
        kids: Vec<Tree>,
    },
}

impl RTree {
    /// The symbol this tree expands, if it is a node.
    pub fn sym(&self) -> Option<SymIdx> {
        match self {
            RTree::Node { sym, .. } => Some(*sym),
            RTree::Leaf(_) => None,
        }
    }

    /// Number of nodes and leaves in the tree.
    pub fn count(&self) -> usize {
        match self {
            RTree::Leaf(_) => 1,
            RTree::Node { kids, .. } => 1 + kids.iter().map(|kid| kid.count()).sum::<usize>(),
        }
    }

    /// Depth of the tree. A leaf has depth one.
    pub fn depth(&self) -> usize {
        match self {
            RTree::Leaf(_) => 1,
            RTree::Node { kids, .. } => {
                1 + kids.iter().map(|kid| kid.depth()).max().unwrap_or(0)
            }
        }
    }

    fn find_all_in(&self, sym: SymIdx, res: &mut Vec<Tree>) {
        if let RTree::Node { kids, .. } = self {
            for kid in kids {
                if kid.sym() == Some(sym) {
                    res.push(kid.clone())
                }
                kid.find_all_in(sym, res)
            }
        }
    }

    /// Paths to all inner nodes, paired with the symbol they expand.
    ///
    /// The empty path denotes the root. Prefix left-to-right order.
    pub fn positions(&self) -> Vec<(Vec<usize>, SymIdx)> {
        let mut res = Vec::new();
        let mut stack = vec![(vec![], self)];
        while let Some((path, tree)) = stack.pop() {
            if let RTree::Node { sym, kids } = tree {
                res.push((path.clone(), *sym));
                for (idx, kid) in kids.iter().enumerate().rev() {
                    let mut kid_path = path.clone();
                    kid_path.push(idx);
                    stack.push((kid_path, kid.get()))
                }
            }
        }
        res
    }

    /// Writes the string this tree renders, the concatenation of its leaves.
    pub fn write_rendered<W: Write>(&self, w: &mut W) -> IoRes<()> {
        match self {
            RTree::Leaf(s) => write!(w, "{}", s),
            RTree::Node { kids, .. } => {
                for kid in kids {
                    kid.write_rendered(w)?
                }
                Ok(())
            }
        }
    }
}

impl ::std::fmt::Display for RTree {
    fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
        match self {
            RTree::Leaf(s) => write!(fmt, "{}", s),
            RTree::Node { kids, .. } => {
                for kid in kids {
                    write!(fmt, "{}", kid)?
                }
                Ok(())
            }
        }
    }
}

/// All subtrees of `tree` expanding `sym`, in prefix left-to-right order.
///
/// Includes `tree` itself when its root expands `sym`.
pub fn find_all(tree: &Tree, sym: SymIdx) -> Vec<Tree> {
    let mut res = Vec::new();
    if tree.sym() == Some(sym) {
        res.push(tree.clone())
    }
    tree.find_all_in(sym, &mut res);
    res
}

/// Set of symbols expanded anywhere in `tree`, root included.
pub fn syms_of(tree: &Tree) -> SymSet {
    let mut res = SymSet::new();
    let mut stack = vec![tree.get()];
    while let Some(t) = stack.pop() {
        if let RTree::Node { sym, kids } = t {
            res.insert(*sym);
            for kid in kids {
                stack.push(kid.get())
            }
        }
    }
    res
}

/// The subtree of `tree` at some path, if any.
///
/// The empty path yields `tree` itself.
pub fn get_at(tree: &Tree, path: &[usize]) -> Option<Tree> {
    let mut crt = tree.clone();
    for &idx in path {
        let next = match crt.get() {
            RTree::Node { kids, .. } => kids.get(idx)?.clone(),
            RTree::Leaf(_) => return None,
        };
        crt = next
    }
    Some(crt)
}

#[cfg(test)]
mod test {
    use super::*;

    fn calc_tree() -> Tree {
        // <start> -> <f> "(" <n> ")" with <f> -> "sqrt", <n> -> "-" <d>.
        let f = node(1, vec![leaf("sqrt")]);
        let d = node(3, vec![leaf("1")]);
        let n = node(2, vec![leaf("-"), d]);
        node(0, vec![f, leaf("("), n, leaf(")")])
    }

    #[test]
    fn rendering_concatenates_leaves() {
        let tree = calc_tree();
        assert_eq!(tree.to_string(), "sqrt(-1)")
    }

    #[test]
    fn consing_dedups() {
        let t1 = calc_tree();
        let t2 = calc_tree();
        assert_eq!(t1.uid(), t2.uid());
        let mut set = TreeSet::new();
        assert!(set.insert(t1));
        assert!(!set.insert(t2))
    }

    #[test]
    fn find_all_is_prefix_ordered() {
        let tree = calc_tree();
        let ns = find_all(&tree, 2.into());
        assert_eq!(ns.len(), 1);
        assert_eq!(ns[0].to_string(), "-1");
        assert!(find_all(&tree, 7.into()).is_empty())
    }

    #[test]
    fn replace_at_path() {
        let tree = calc_tree();
        // Path to <n>, third child of the root.
        let n2 = node(2, vec![leaf("2")]);
        let swapped = replace(&tree, &[2], n2).unwrap();
        assert_eq!(swapped.to_string(), "sqrt(2)");
        assert!(replace(&tree, &[7], leaf("nope")).is_err())
    }

    #[test]
    fn positions_and_get_agree() {
        let tree = calc_tree();
        for (path, sym) in tree.positions() {
            let sub = get_at(&tree, &path).unwrap();
            assert_eq!(sub.sym(), Some(sym))
        }
    }
}
