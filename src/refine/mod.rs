//! The refinement loop.
//!
//! One round: learn candidates from the evidence, search disjunctions, turn
//! the best candidates and their negations into generation jobs, label the
//! generated trees, then let the mutation fuzzer widen the failing
//! population. The freshly labeled inputs feed the next round.
//!
//! The loop stops on its iteration budget, on the deadline, or when a round
//! produces no new labeled input. Errors inside a round are reported and end
//! the loop, the best candidates found so far survive.

use crate::common::*;
use crate::cst::CstSet;
use crate::engine;
use crate::learn::cand::Candidate;
use crate::learn::comb::{DisjAccept, RecallFloor};
use crate::learn::Miner;

pub mod mutation;
pub mod neg;

use self::mutation::Mutation;

/// Drives refinement rounds over a miner and an oracle.
pub struct Refiner<O> {
    /// Labeling oracle.
    oracle: O,
    /// The learning session.
    miner: Miner,
    /// Forced relevant symbols, if any.
    relevant: Option<SymSet>,
    /// Disjunction acceptance policy.
    disj: Box<dyn DisjAccept>,
    /// Profiler.
    _profiler: Profiler,
}

impl<O: Oracle> Refiner<O> {
    /// Refiner with the default miner and disjunction policy.
    pub fn new(gram: Grammar, oracle: O) -> Self {
        Refiner {
            oracle,
            miner: Miner::new(gram),
            relevant: None,
            disj: Box::new(RecallFloor),
            _profiler: Profiler::new(),
        }
    }

    /// Forces the relevant symbols instead of inferring them.
    pub fn with_relevant(mut self, relevant: SymSet) -> Self {
        self.relevant = Some(relevant);
        self
    }
    /// Swaps in a disjunction acceptance policy.
    pub fn with_disj(mut self, disj: Box<dyn DisjAccept>) -> Self {
        self.disj = disj;
        self
    }
    /// The underlying learning session.
    pub fn miner(&self) -> &Miner {
        &self.miner
    }
    /// Mutable access to the learning session, to tune templates or fitness.
    pub fn miner_mut(&mut self) -> &mut Miner {
        &mut self.miner
    }

    /// Consumes the refiner, yielding its profiler with the miner's folded
    /// in.
    pub fn finish(mut self) -> Profiler {
        let miner_prof = self.miner.drain_profiler();
        self._profiler.add_other("miner", miner_prof);
        self._profiler
    }

    /// Runs refinement rounds from some seed inputs and returns the best
    /// candidates found.
    ///
    /// The seeds must contain at least one failing and one passing input.
    pub fn explain(&mut self, seeds: Vec<Input>) -> Res<Vec<Candidate>> {
        let has_failing = seeds.iter().any(|i| i.vrd == Verdict::Failing);
        let has_passing = seeds.iter().any(|i| i.vrd == Verdict::Passing);
        if !has_failing || !has_passing {
            bail!(ErrorKind::BadSeeds)
        }

        let gram = self.miner.gram().clone();
        let mut fuzzer = Mutation::new(&gram, &self.oracle, &[], &self._profiler);
        let mut batch = seeds;
        let mut best = Vec::new();

        for round in 1..=conf.refine.max_iters {
            if conf.check_timeout().is_err() {
                break;
            }
            log! { @info "refinement round {}", round }
            let outcome = refine_round(
                &mut self.miner,
                &mut fuzzer,
                &gram,
                &self.oracle,
                self.relevant.as_ref(),
                &*self.disj,
                &self._profiler,
                batch,
            );
            match outcome {
                Ok((pool, next)) => {
                    if !pool.is_empty() {
                        best = pool
                    }
                    if next.is_empty() {
                        log! { @info "no new inputs, stopping" }
                        break;
                    }
                    batch = next
                }
                Err(e) if e.is_timeout() => break,
                Err(e) => {
                    print_err(&e);
                    break;
                }
            }
        }
        Ok(best)
    }
}

/// One refinement round. Returns the round's candidate pool and the inputs
/// labeled along the way.
#[allow(clippy::too_many_arguments)]
fn refine_round<O: Oracle>(
    miner: &mut Miner,
    fuzzer: &mut Mutation<O>,
    gram: &Grammar,
    oracle: &O,
    relevant: Option<&SymSet>,
    disj: &dyn DisjAccept,
    profiler: &Profiler,
    batch: Vec<Input>,
) -> Res<(Vec<Candidate>, Vec<Input>)> {
    fuzzer.digest(&batch);
    let mut pool = miner.learn(batch, relevant)?;
    pool.extend(miner.disjoin(disj));

    // Each top candidate and its negations become generation jobs: inputs
    // near the boundary are the most informative to label.
    let mut job_set = CstSet::new();
    let mut jobs = Vec::new();
    for cand in pool.iter().take(conf.refine.take) {
        let mut csts = vec![cand.cst().clone()];
        for negated in neg::negations(cand) {
            csts.push(negated.cst().clone())
        }
        for cst in csts {
            if job_set.insert(cst.clone()) {
                jobs.push(cst)
            }
        }
    }

    let mut next = Vec::new();
    for tree in engine::run(gram, jobs, profiler)? {
        if miner.is_known(&tree) || fuzzer.is_known(&tree) {
            continue;
        }
        match oracle.judge(&tree) {
            Ok(vrd) => next.push(Input::new(tree, vrd)),
            Err(e) => {
                // A tree the oracle cannot label is dropped, not fatal.
                log! { @debug "skipping unlabelable input `{}`: {}", tree, e }
            }
        }
    }
    profile! { |profiler| "generated inputs labeled" => add next.len() }
    fuzzer.digest(&next);

    next.extend(fuzzer.run()?);
    Ok((pool, next))
}

#[cfg(test)]
mod test {
    use super::*;

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

    fn oracle() -> impl Fn(&str) -> Verdict {
        |text: &str| {
            if text.starts_with("sqrt(-") {
                Verdict::Failing
            } else {
                Verdict::Passing
            }
        }
    }

    #[test]
    fn rejects_one_sided_seeds() {
        let gram = calc();
        let seeds = vec![Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing)];
        let mut refiner = Refiner::new(gram, oracle());
        let err = match refiner.explain(seeds) {
            Ok(_) => panic!("one-sided seeds must be rejected"),
            Err(e) => e,
        };
        assert!(matches!(*err.kind(), ErrorKind::BadSeeds))
    }

    #[test]
    fn explains_sqrt_of_negative() {
        let gram = calc();
        let seeds = vec![
            Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing),
            Input::new(gram.parse("cos(2)").unwrap(), Verdict::Passing),
            Input::new(gram.parse("sqrt(2)").unwrap(), Verdict::Passing),
            // Shares its argument with the failing seed, so no explanation
            // ignoring the function can be perfectly precise.
            Input::new(gram.parse("cos(-1)").unwrap(), Verdict::Passing),
        ];
        let mut relevant = SymSet::new();
        relevant.insert(gram.sym_of("f").unwrap());
        relevant.insert(gram.sym_of("n").unwrap());

        let mut refiner = Refiner::new(gram, oracle()).with_relevant(relevant);
        let best = refiner.explain(seeds).unwrap();

        assert!(!best.is_empty());
        let top = &best[0];
        assert_eq!(top.recall(), 1.0);
        assert_eq!(top.precision(), 1.0);
        // The explanation talks about both the function and its argument.
        let rendered = top.cst().to_string();
        assert!(rendered.contains("@1"));
        assert!(rendered.contains("@2"));
    }
}
