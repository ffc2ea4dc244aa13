//! Diagmine mines boolean diagnoses over parse trees: predicates separating
//! the inputs that trigger a failure from the ones that do not.
//!
//! Given a grammar, a handful of labeled seed inputs and an oracle command,
//! the [refinement loop][refine] alternates between mining candidate
//! diagnoses from the evidence and generating fresh inputs that stress-test
//! them, until the candidates stabilize or the budget runs out.
//!
//! [refine]: refine/index.html (refine module)

#![doc(test(attr(deny(warnings))))]
#![allow(non_upper_case_globals)]

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate error_chain;

#[macro_use]
pub mod common;
pub mod errors;

pub mod cst;
pub mod data;
pub mod engine;
pub mod gram;
pub mod learn;
pub mod refine;
pub mod tree;

use crate::common::*;
use crate::data::CmdOracle;
use crate::learn::cand::Candidate;
use crate::refine::Refiner;

/// Parses command-line arguments and works.
pub fn work() -> Res<()> {
    conf.check()?;

    let gram_path = match conf.in_file() {
        Some(path) => path,
        None => bail!("no grammar file given"),
    };
    let txt = ::std::fs::read_to_string(gram_path)
        .chain_err(|| format!("while reading grammar file `{}`", conf.emph(gram_path)))?;
    let gram = Grammar::of_str(&txt)
        .chain_err(|| format!("while parsing grammar file `{}`", conf.emph(gram_path)))?;
    log! { @verb
        "grammar `{}`: {} symbol(s)", gram_path, gram.len()
    }

    let seeds = match conf.seeds_file() {
        Some(path) => {
            let txt = ::std::fs::read_to_string(path)
                .chain_err(|| format!("while reading seed file `{}`", conf.emph(path)))?;
            data::parse_seeds(&gram, &txt)
                .chain_err(|| format!("while parsing seed file `{}`", conf.emph(path)))?
        }
        None => bail!("no seed file given (`--seeds`)"),
    };
    log! { @verb "{} seed input(s)", seeds.len() }

    let oracle = match conf.oracle_cmd() {
        Some(cmd) => CmdOracle::new(cmd.clone()),
        None => bail!("no oracle command given (`--oracle`)"),
    };

    let mut refiner = Refiner::new(gram.clone(), oracle);
    let best = refiner.explain(seeds)?;
    report(&gram, &best)?;
    print_stats("diagmine", refiner.finish());
    Ok(())
}

/// Prints the final candidates, constraint first, then the metrics.
fn report(gram: &Grammar, cands: &[Candidate]) -> Res<()> {
    if cands.is_empty() {
        println!("(no-diagnosis)");
        return Ok(());
    }
    println!("(diagnoses");
    for cand in cands {
        let rendered = cand.cst().to_string_info(gram)?;
        println!("  ({}", rendered);
        println!(
            "    (precision {:.2}) (recall {:.2}) (specificity {:.2})",
            cand.precision(),
            cand.recall(),
            cand.specificity()
        );
        println!("  )")
    }
    println!(")");
    Ok(())
}
