//! Labeled inputs and oracles.
//!
//! An [`Input`](struct.Input.html) is a parse tree with the verdict an oracle
//! gave for it. Equality and hashing go through the tree only: two
//! independently parsed copies of the same text are the same input, and the
//! verdict never disagrees for a deterministic oracle.

use std::hash::{Hash, Hasher};
use std::process::{Command, Stdio};

use crate::common::*;

/// What an oracle says about an input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The input triggers the failure under diagnosis.
    Failing,
    /// The input behaves correctly.
    Passing,
    /// The oracle could not classify the input; excluded from training.
    Undefined,
}
impl_fmt! {
    Verdict(self, fmt) {
        match self {
            Verdict::Failing => write!(fmt, "failing"),
            Verdict::Passing => write!(fmt, "passing"),
            Verdict::Undefined => write!(fmt, "undefined"),
        }
    }
}

/// A labeled input. Immutable once labeled.
#[derive(Clone, Debug)]
pub struct Input {
    /// The parse tree.
    pub tree: Tree,
    /// The oracle's verdict.
    pub vrd: Verdict,
}
impl Input {
    /// Constructor.
    pub fn new(tree: Tree, vrd: Verdict) -> Self {
        Input { tree, vrd }
    }
}
impl PartialEq for Input {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree
    }
}
impl Eq for Input {}
impl Hash for Input {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tree.hash(state)
    }
}
impl_fmt! {
    Input(self, fmt) {
        write!(fmt, "`{}` ({})", self.tree, self.vrd)
    }
}

/// Classifies concrete inputs.
///
/// Implementations must be deterministic and side-effect-free from the
/// miner's point of view: the same tree always gets the same verdict.
pub trait Oracle {
    /// Verdict for one input.
    fn judge(&self, tree: &Tree) -> Res<Verdict>;

    /// Labels a batch of trees, preserving order.
    fn label_all(&self, trees: &[Tree]) -> Res<Vec<Input>> {
        let mut res = Vec::with_capacity(trees.len());
        for tree in trees {
            let vrd = self.judge(tree)?;
            res.push(Input::new(tree.clone(), vrd))
        }
        Ok(res)
    }
}

impl<F> Oracle for F
where
    F: Fn(&str) -> Verdict,
{
    fn judge(&self, tree: &Tree) -> Res<Verdict> {
        Ok(self(&tree.to_string()))
    }
}

/// Oracle shelling out to a command.
///
/// The rendered input goes to the command's stdin; exit code `0` means
/// passing, `1` failing, anything else undefined.
pub struct CmdOracle {
    /// The command, run through `sh -c`.
    cmd: String,
}
impl CmdOracle {
    /// Constructor.
    pub fn new<S: Into<String>>(cmd: S) -> Self {
        CmdOracle { cmd: cmd.into() }
    }
}
impl Oracle for CmdOracle {
    fn judge(&self, tree: &Tree) -> Res<Verdict> {
        let mut kid = Command::new("sh")
            .arg("-c")
            .arg(&self.cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .chain_err(|| format!("while spawning oracle `{}`", conf.emph(&self.cmd)))?;
        {
            let stdin = kid
                .stdin
                .as_mut()
                .ok_or_else(|| Error::from("could not open the oracle's stdin"))?;
            stdin
                .write_all(tree.to_string().as_bytes())
                .chain_err(|| "while writing the input to the oracle")?
        }
        let status = kid
            .wait()
            .chain_err(|| format!("while waiting for oracle `{}`", conf.emph(&self.cmd)))?;
        match status.code() {
            Some(0) => Ok(Verdict::Passing),
            Some(1) => Ok(Verdict::Failing),
            _ => Ok(Verdict::Undefined),
        }
    }
}

/// Parses a seed file.
///
/// One seed per line: the word `fail` or `pass`, whitespace, then the input
/// text (taken verbatim to the end of the line). Blank lines and lines
/// starting with `#` are skipped. A seed that does not parse under the
/// grammar is fatal.
pub fn parse_seeds(gram: &Grammar, txt: &str) -> Res<Vec<Input>> {
    let mut res = Vec::new();
    for (idx, line) in txt.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (vrd, rest) = if let Some(rest) = trimmed.strip_prefix("fail") {
            (Verdict::Failing, rest)
        } else if let Some(rest) = trimmed.strip_prefix("pass") {
            (Verdict::Passing, rest)
        } else {
            bail!(
                "expected `fail` or `pass` at the start of seed line {}",
                idx + 1
            )
        };
        let tree = gram
            .parse(rest.trim_start())
            .chain_err(|| format!("while parsing the seed input at line {}", idx + 1))?;
        res.push(Input::new(tree, vrd))
    }
    Ok(res)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn input_identity_is_the_tree() {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos"
            <n> ::= "-1" | "2"
            "#,
        )
        .unwrap();
        let a = Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing);
        let b = Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Undefined);
        let c = Input::new(gram.parse("cos(2)").unwrap(), Verdict::Passing);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let mut set = HashSet::new();
        assert!(set.insert(a));
        assert!(!set.insert(b));
        assert!(set.insert(c))
    }

    #[test]
    fn closures_are_oracles() {
        let gram = Grammar::of_str(r#"<n> ::= "-1" | "2""#).unwrap();
        let oracle = |text: &str| {
            if text.starts_with('-') {
                Verdict::Failing
            } else {
                Verdict::Passing
            }
        };
        let tree = gram.parse("-1").unwrap();
        assert_eq!(oracle.judge(&tree).unwrap(), Verdict::Failing);
        let inputs = oracle
            .label_all(&[gram.parse("-1").unwrap(), gram.parse("2").unwrap()])
            .unwrap();
        assert_eq!(inputs[0].vrd, Verdict::Failing);
        assert_eq!(inputs[1].vrd, Verdict::Passing)
    }

    #[test]
    fn seed_files() {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos"
            <n> ::= "-1" | "2"
            "#,
        )
        .unwrap();
        let seeds = parse_seeds(
            &gram,
            "\
# calculator seeds
fail sqrt(-1)

pass cos(2)
",
        )
        .unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].vrd, Verdict::Failing);
        assert_eq!(seeds[1].tree.to_string(), "cos(2)");

        assert!(parse_seeds(&gram, "nope sqrt(-1)").is_err());
        assert!(parse_seeds(&gram, "fail tan(2)").is_err())
    }
}
