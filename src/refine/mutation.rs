//! Mutation fuzzing over failing inputs.
//!
//! Grows the failing population by mutating known failing trees and asking
//! the oracle about the results. Mutations are grammar-aware: a subtree
//! expanding some symbol is only ever replaced by another tree expanding the
//! same symbol, so every mutant stays derivable.
//!
//! The fuzzer keeps a fragment pool indexed by symbol, harvested from every
//! failing tree it sees. Fragment reuse is what lets it cross features of
//! distinct failing inputs.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;

use crate::common::*;

/// Size of the rolling acceptance window. The fuzzer never stops on the
/// acceptance criterion before the window is full.
const WINDOW: usize = 100;

/// A single grammar-preserving tree rewrite.
pub trait Mutator {
    /// Short description.
    fn name(&self) -> &'static str;
    /// Attempts to rewrite the subtree of `tree` at `path`, which expands
    /// `sym`. `None` if no rewrite applies there.
    fn mutate(
        &self,
        gram: &Grammar,
        fragments: &SymHMap<Vec<Tree>>,
        rng: &mut XorShiftRng,
        tree: &Tree,
        path: &[usize],
        sym: SymIdx,
    ) -> Option<Tree>;
}

/// Replaces the subtree by a harvested fragment expanding the same symbol.
pub struct FragmentSwap;
impl Mutator for FragmentSwap {
    fn name(&self) -> &'static str {
        "fragment swap"
    }
    fn mutate(
        &self,
        _gram: &Grammar,
        fragments: &SymHMap<Vec<Tree>>,
        rng: &mut XorShiftRng,
        tree: &Tree,
        path: &[usize],
        sym: SymIdx,
    ) -> Option<Tree> {
        let pool = fragments.get(&sym)?;
        let old = tree::get_at(tree, path)?;
        let fresh: Vec<&Tree> = pool.iter().filter(|f| f.uid() != old.uid()).collect();
        if fresh.is_empty() {
            return None;
        }
        let pick = fresh[rng.gen_range(0..fresh.len())].clone();
        tree::replace(tree, path, pick).ok()
    }
}

/// Replaces the subtree by a freshly fuzzed derivation of the same symbol.
pub struct FreshFuzz;
impl Mutator for FreshFuzz {
    fn name(&self) -> &'static str {
        "fresh fuzz"
    }
    fn mutate(
        &self,
        gram: &Grammar,
        _fragments: &SymHMap<Vec<Tree>>,
        rng: &mut XorShiftRng,
        tree: &Tree,
        path: &[usize],
        sym: SymIdx,
    ) -> Option<Tree> {
        let old = tree::get_at(tree, path)?;
        let fresh = gram.fuzz(rng, Some(sym));
        if fresh.uid() == old.uid() {
            return None;
        }
        tree::replace(tree, path, fresh).ok()
    }
}

/// Replaces the subtree by another subtree of the same tree expanding the
/// same symbol.
pub struct SiblingSwap;
impl Mutator for SiblingSwap {
    fn name(&self) -> &'static str {
        "sibling swap"
    }
    fn mutate(
        &self,
        _gram: &Grammar,
        _fragments: &SymHMap<Vec<Tree>>,
        rng: &mut XorShiftRng,
        tree: &Tree,
        path: &[usize],
        sym: SymIdx,
    ) -> Option<Tree> {
        let old = tree::get_at(tree, path)?;
        let siblings: Vec<Tree> = tree::find_all(tree, sym)
            .into_iter()
            .filter(|s| s.uid() != old.uid())
            .collect();
        if siblings.is_empty() {
            return None;
        }
        let pick = siblings[rng.gen_range(0..siblings.len())].clone();
        tree::replace(tree, path, pick).ok()
    }
}

/// The mutation fuzzer.
pub struct Mutation<'a, O> {
    /// The grammar mutations must respect.
    gram: &'a Grammar,
    /// Labeling oracle.
    oracle: &'a O,
    /// Deterministic randomness.
    rng: XorShiftRng,
    /// Failing trees, the mutation base.
    pop: Vec<Tree>,
    /// Harvested fragments, by the symbol they expand.
    fragments: SymHMap<Vec<Tree>>,
    /// Fragment dedup.
    harvested: TreeSet,
    /// Trees already labeled, here or elsewhere.
    seen: TreeSet,
    /// The rewrites to draw from.
    mutators: Vec<Box<dyn Mutator>>,
    /// Profiler.
    _profiler: &'a Profiler,
}

impl<'a, O: Oracle> Mutation<'a, O> {
    /// Fuzzer over a population of known inputs.
    ///
    /// Failing inputs seed the population and the fragment pool; all inputs
    /// enter the dedup set so the oracle is never asked twice.
    pub fn new(
        gram: &'a Grammar,
        oracle: &'a O,
        inputs: &[Input],
        _profiler: &'a Profiler,
    ) -> Self {
        let mut slf = Mutation {
            gram,
            oracle,
            rng: XorShiftRng::seed_from_u64(conf.seed),
            pop: Vec::new(),
            fragments: SymHMap::new(),
            harvested: TreeSet::new(),
            seen: TreeSet::new(),
            mutators: vec![
                Box::new(FragmentSwap),
                Box::new(SiblingSwap),
                Box::new(FreshFuzz),
            ],
            _profiler,
        };
        slf.digest(inputs);
        slf
    }

    /// Feeds freshly labeled inputs to the population.
    pub fn digest(&mut self, inputs: &[Input]) {
        for input in inputs {
            let _ = self.seen.insert(input.tree.clone());
            if input.vrd == Verdict::Failing {
                self.absorb(&input.tree)
            }
        }
    }

    /// Failing-population size.
    pub fn pop_len(&self) -> usize {
        self.pop.len()
    }

    /// True if this tree has already been digested or labeled here.
    pub fn is_known(&self, tree: &Tree) -> bool {
        self.seen.contains(tree)
    }

    /// Adds a failing tree to the population and harvests its fragments.
    fn absorb(&mut self, tree: &Tree) {
        self.pop.push(tree.clone());
        for (path, sym) in tree.positions() {
            if let Some(sub) = tree::get_at(tree, &path) {
                if self.harvested.insert(sub.clone()) {
                    self.fragments.entry(sym).or_default().push(sub)
                }
            }
        }
    }

    /// One mutation step: a random rewrite at a random position, retrying
    /// other positions until one applies.
    fn mutate_once(&mut self, tree: &Tree) -> Option<Tree> {
        let mutator = &self.mutators[self.rng.gen_range(0..self.mutators.len())];
        let mut positions = tree.positions();
        while !positions.is_empty() {
            let slot = self.rng.gen_range(0..positions.len());
            let (path, sym) = positions.swap_remove(slot);
            if let Some(mutant) = mutator.mutate(
                self.gram,
                &self.fragments,
                &mut self.rng,
                tree,
                &path,
                sym,
            ) {
                return Some(mutant);
            }
        }
        None
    }

    /// Runs the fuzzing loop and returns the freshly labeled inputs.
    ///
    /// Stops on the iteration budget, on the deadline, or once the rolling
    /// acceptance rate falls under the configured threshold. Rejected
    /// (passing) mutants are part of the result under `--mut_keep_rejected`,
    /// they make precision estimates sharper.
    pub fn run(&mut self) -> Res<Vec<Input>> {
        let mut res = Vec::new();
        if self.pop.is_empty() {
            return Ok(res);
        }
        profile! { self tick "mutation" }

        let mut window = VecDeque::with_capacity(WINDOW);
        let mut accepted_in_window = 0;

        for _ in 0..conf.mutation.max_iters {
            if conf.check_timeout().is_err() {
                // The deadline is a normal stop here, findings survive.
                break;
            }
            if window.len() >= WINDOW
                && (accepted_in_window as f64) < conf.mutation.threshold * WINDOW as f64
            {
                log! { @debug "mutation acceptance fell under the threshold" }
                break;
            }

            let base = self.pop[self.rng.gen_range(0..self.pop.len())].clone();
            let muts = self
                .rng
                .gen_range(conf.mutation.min_muts..=conf.mutation.max_muts);
            let mut mutant = base;
            for _ in 0..muts {
                if let Some(next) = self.mutate_once(&mutant) {
                    mutant = next
                }
            }

            let mut accepted = false;
            if self.seen.insert(mutant.clone()) {
                let vrd = match self.oracle.judge(&mutant) {
                    Ok(vrd) => vrd,
                    Err(e) => {
                        // An unlabelable mutant is dropped, not fatal.
                        log! { @debug "skipping unlabelable mutant `{}`: {}", mutant, e }
                        continue;
                    }
                };
                profile! { self "oracle queries" => add 1 }
                match vrd {
                    Verdict::Failing => {
                        accepted = true;
                        self.absorb(&mutant);
                        res.push(Input::new(mutant, vrd))
                    }
                    Verdict::Passing if conf.mutation.keep_rejected => {
                        res.push(Input::new(mutant, vrd))
                    }
                    Verdict::Passing | Verdict::Undefined => (),
                }
            }

            if window.len() >= WINDOW {
                if window.pop_front() == Some(true) {
                    accepted_in_window -= 1
                }
            }
            window.push_back(accepted);
            if accepted {
                accepted_in_window += 1
            }
        }

        profile! { self mark "mutation" }
        profile! { self "mutants kept" => add
            res.iter().filter(|i| i.vrd == Verdict::Failing).count()
        }
        log! { @verb
            "mutation fuzzing labeled {} new input(s), population is {}",
            res.len(), self.pop.len()
        }
        Ok(res)
    }
}
