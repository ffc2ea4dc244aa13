//! Tree creation functions.

use hashconsing::{HConsign, HashConsign};

use crate::common::*;
use crate::tree::RTree;

/// Type of the tree factory.
type Factory = ::std::sync::RwLock<HConsign<RTree>>;

lazy_static! {
    /// Tree factory.
    static ref factory: Factory = ::std::sync::RwLock::new(
        HConsign::with_capacity(conf.factory.tree_capa)
    );
}

/// Creates a tree.
#[inline]
pub fn tree(t: RTree) -> Tree {
    factory.mk(t)
}

/// Creates a leaf holding a terminal string.
#[inline]
pub fn leaf<S: Into<String>>(s: S) -> Tree {
    factory.mk(RTree::Leaf(s.into()))
}

/// Creates an inner node for a grammar symbol.
#[inline]
pub fn node<S: Into<SymIdx>>(sym: S, kids: Vec<Tree>) -> Tree {
    factory.mk(RTree::Node {
        sym: sym.into(),
        kids,
    })
}

/// Replaces the subtree at `path` with `sub`.
///
/// Fails if the path does not exist in the tree.
pub fn replace(t: &Tree, path: &[usize], sub: Tree) -> Res<Tree> {
    if let Some(&idx) = path.first() {
        match t.get() {
            RTree::Node { sym, kids } if idx < kids.len() => {
                let mut kids = kids.clone();
                kids[idx] = replace(&kids[idx], &path[1..], sub)?;
                Ok(node(*sym, kids))
            }
            _ => bail!("illegal path {:?} into tree `{}`", path, t),
        }
    } else {
        Ok(sub)
    }
}
