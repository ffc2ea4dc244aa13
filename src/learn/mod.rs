//! Constraint mining.
//!
//! The [`Miner`] is one long-lived learning session. Each call to [`learn`]
//! feeds it a batch of labeled inputs and runs a full round: template
//! instantiation over the relevant symbols, candidate evaluation, recall
//! filtering and conjunction search. Candidates, evidence and rejections are
//! cumulative, so later rounds only pay for what is new.
//!
//! [`Miner`]: struct.Miner.html (Miner struct)
//! [`learn`]: struct.Miner.html#method.learn (learn function over Miner)

use std::cmp::Ordering;

use crate::common::*;
use crate::cst::CstSet;

pub mod cand;
pub mod comb;
pub mod extract;
pub mod fitness;
pub mod inst;
pub mod reduce;

use self::cand::{Candidate, CandidateSet};
use self::comb::DisjAccept;
use self::extract::Extraction;
use self::fitness::{Fitness, RecallPriorityLen};
use self::inst::Instantiator;
use self::reduce::Reduce;

/// A learning session over a fixed grammar.
pub struct Miner {
    /// The grammar inputs are parsed against.
    gram: Grammar,
    /// Templates instantiated each round.
    templates: Vec<Cst>,
    /// Live candidates.
    cands: CandidateSet,
    /// All labeled inputs seen so far.
    inputs: Vec<Input>,
    /// Trees already labeled, for dedup.
    seen: TreeSet,
    /// Constraints that failed the recall floor, never re-evaluated.
    rejected: CstSet,
    /// Optional relevant-symbol reducer.
    reducer: Option<Box<dyn Reduce>>,
    /// Candidate ranking.
    fitness: Box<dyn Fitness>,
    /// Profiler.
    _profiler: Profiler,
}

impl Miner {
    /// Session with the built-in templates and the default fitness.
    pub fn new(gram: Grammar) -> Self {
        Miner {
            gram,
            templates: inst::default_templates(),
            cands: CandidateSet::new(),
            inputs: Vec::new(),
            seen: TreeSet::new(),
            rejected: CstSet::new(),
            reducer: None,
            fitness: Box::new(RecallPriorityLen),
            _profiler: Profiler::new(),
        }
    }

    /// Swaps in a relevant-symbol reducer.
    pub fn with_reducer(mut self, reducer: Box<dyn Reduce>) -> Self {
        self.reducer = Some(reducer);
        self
    }
    /// Swaps in a fitness.
    pub fn with_fitness(mut self, fitness: Box<dyn Fitness>) -> Self {
        self.fitness = fitness;
        self
    }
    /// Adds a template to the repository.
    pub fn add_template(&mut self, template: Cst) {
        self.templates.push(template)
    }

    /// The grammar.
    #[inline]
    pub fn gram(&self) -> &Grammar {
        &self.gram
    }
    /// All labeled inputs seen so far.
    #[inline]
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }
    /// True if this tree has already been fed to the session.
    #[inline]
    pub fn is_known(&self, tree: &Tree) -> bool {
        self.seen.contains(tree)
    }
    /// Number of live candidates.
    #[inline]
    pub fn cand_count(&self) -> usize {
        self.cands.len()
    }

    /// Hands the session's profiler over, leaving a fresh one behind.
    pub fn drain_profiler(&mut self) -> Profiler {
        ::std::mem::replace(&mut self._profiler, Profiler::new())
    }

    /// Runs one learning round over a batch of freshly labeled inputs.
    ///
    /// Returns all candidates tied for best under the session's fitness.
    /// When no relevant symbols are forced, relevance comes from the
    /// reducer if any, and otherwise defaults to every symbol occurring in
    /// a failing input (or the whole grammar under `--all_syms`).
    pub fn learn(&mut self, batch: Vec<Input>, relevant: Option<&SymSet>) -> Res<Vec<Candidate>> {
        profile! { self tick "learn" }
        let res = self.learn_round(batch, relevant);
        profile! { self mark "learn" }
        res
    }

    fn learn_round(
        &mut self,
        batch: Vec<Input>,
        relevant: Option<&SymSet>,
    ) -> Res<Vec<Candidate>> {
        conf.check_timeout()?;
        self.absorb(batch);
        let relevant = self.relevant_syms(relevant)?;
        log! { @info
            "learning over {} input(s), {} relevant symbol(s)",
            self.inputs.len(), relevant.len()
        }

        self.refresh()?;

        // Extraction and discovery only look at a capped slice of the
        // failing inputs, evaluation below sees everything.
        let capped: Vec<&Input> = self
            .inputs
            .iter()
            .filter(|i| i.vrd == Verdict::Failing)
            .take(conf.mine.fail_capa)
            .collect();

        profile! { self tick "learn", "instantiation" }
        let fresh = {
            let extraction = Extraction::scan(&relevant, &capped);
            let inst = Instantiator::new(&self.gram, &extraction, &capped, &self._profiler);
            let mut fresh = Vec::new();
            for template in &self.templates {
                for cst in inst.instantiate(template, &relevant)? {
                    if !self.rejected.contains(&cst) && !self.cands.contains(&cst) {
                        fresh.push(cst)
                    }
                }
            }
            fresh
        };
        profile! { self mark "learn", "instantiation" }
        profile! { self "fresh candidates" => add fresh.len() }

        profile! { self tick "learn", "evaluation" }
        for cst in fresh {
            conf.check_timeout()?;
            let mut cand = Candidate::new(cst);
            cand.evaluate(&self.inputs)?;
            if cand.covered() > 0 && cand.recall() >= conf.mine.min_recall {
                self.cands.add(cand);
            } else {
                self.rejected.insert(cand.cst().clone());
            }
        }
        profile! { self mark "learn", "evaluation" }

        profile! { self tick "learn", "conjunctions" }
        let combs = comb::conjunctions(self.cands.iter(), conf.mine.max_conj);
        let mut kept = 0;
        for comb in combs {
            // A conjunction dropped by an earlier refresh stays dropped.
            if self.rejected.contains(comb.cst()) {
                continue;
            }
            if self.cands.add(comb) {
                kept += 1
            }
        }
        profile! { self "conjunctions kept" => add kept }
        profile! { self mark "learn", "conjunctions" }

        log! { @verb
            "{} live candidate(s), {} rejected", self.cands.len(), self.rejected.len()
        }
        Ok(self.best())
    }

    /// Disjunction search over the live candidates.
    pub fn disjoin(&self, policy: &dyn DisjAccept) -> Vec<Candidate> {
        comb::disjunctions(self.cands.iter(), conf.mine.max_disj, policy)
    }

    /// All live candidates tied for best under the session's fitness.
    ///
    /// The result is sorted by canonical rendering so callers see a stable
    /// order.
    pub fn best(&self) -> Vec<Candidate> {
        let mut sorted: Vec<&Candidate> = self.cands.iter().collect();
        sorted.sort_by(|lhs, rhs| {
            self.fitness
                .cmp(rhs, lhs)
                .then_with(|| lhs.cst().to_string().cmp(&rhs.cst().to_string()))
        });
        let mut res = Vec::new();
        if let Some(&first) = sorted.first() {
            for cand in sorted {
                if self.fitness.cmp(first, cand) == Ordering::Equal {
                    res.push(cand.clone())
                } else {
                    break;
                }
            }
        }
        res
    }

    /// Merges a batch into the cumulative inputs, skipping duplicates and
    /// undefined verdicts.
    fn absorb(&mut self, batch: Vec<Input>) {
        for input in batch {
            if input.vrd == Verdict::Undefined {
                continue;
            }
            if self.seen.insert(input.tree.clone()) {
                self.inputs.push(input)
            }
        }
    }

    /// The symbols this round's candidates may talk about.
    fn relevant_syms(&self, forced: Option<&SymSet>) -> Res<SymSet> {
        if let Some(forced) = forced {
            return Ok(forced.clone());
        }
        if conf.mine.all_syms {
            return Ok(self.gram.all_syms());
        }
        if let Some(reducer) = &self.reducer {
            return reducer.reduce(&self.gram, &self.inputs);
        }
        let mut res = SymSet::new();
        for input in &self.inputs {
            if input.vrd == Verdict::Failing {
                res.extend(tree::syms_of(&input.tree))
            }
        }
        Ok(res)
    }

    /// Brings every live candidate's evidence up to date with the cumulative
    /// inputs and drops the ones falling under the recall floor.
    fn refresh(&mut self) -> Res<()> {
        let mut dropped = Vec::new();
        for cand in self.cands.iter_mut() {
            cand.evaluate(&self.inputs)?;
            if cand.recall() < conf.mine.min_recall {
                dropped.push(cand.uid())
            }
        }
        profile! { self "candidates dropped" => add dropped.len() }
        for uid in dropped {
            if let Some(cand) = self.cands.remove(uid) {
                self.rejected.insert(cand.cst().clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn calc() -> (Grammar, Vec<Input>) {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos" | "tan"
            <n> ::= "-1" | "-9" | "2" | "7"
            "#,
        )
        .unwrap();
        let mut inputs = Vec::new();
        for (text, vrd) in [
            ("sqrt(-1)", Verdict::Failing),
            ("sqrt(-9)", Verdict::Failing),
            ("sqrt(2)", Verdict::Passing),
            ("cos(-1)", Verdict::Passing),
            ("tan(7)", Verdict::Passing),
        ] {
            inputs.push(Input::new(gram.parse(text).unwrap(), vrd))
        }
        (gram, inputs)
    }

    fn relevant(gram: &Grammar) -> SymSet {
        let mut res = SymSet::new();
        res.insert(gram.sym_of("f").unwrap());
        res.insert(gram.sym_of("n").unwrap());
        res
    }

    #[test]
    fn finds_the_sqrt_of_negative_diagnosis() {
        let (gram, inputs) = calc();
        let relevant = relevant(&gram);
        let mut miner = Miner::new(gram);
        let best = miner.learn(inputs, Some(&relevant)).unwrap();

        assert!(!best.is_empty());
        for cand in &best {
            assert_eq!(cand.recall(), 1.0);
            assert_eq!(cand.precision(), 1.0)
        }
        // The conjunction explaining the failure is among the best.
        assert!(best.iter().any(|c| {
            let s = c.cst().to_string();
            s.contains("(= (txt @1) \"sqrt\")") && s.contains("num @2")
        }))
    }

    #[test]
    fn later_rounds_are_incremental() {
        let (gram, inputs) = calc();
        let relevant = relevant(&gram);
        let mut miner = Miner::new(gram.clone());

        let first: Vec<Input> = inputs[..3].to_vec();
        miner.learn(first, Some(&relevant)).unwrap();
        let count = miner.inputs().len();
        assert_eq!(count, 3);

        // Re-feeding known trees does not grow the evidence.
        let again: Vec<Input> = inputs[..3].to_vec();
        miner.learn(again, Some(&relevant)).unwrap();
        assert_eq!(miner.inputs().len(), 3);

        // New inputs do, and low-recall candidates get dropped for good.
        let best = miner.learn(inputs[3..].to_vec(), Some(&relevant)).unwrap();
        assert_eq!(miner.inputs().len(), 5);
        for cand in &best {
            assert!(cand.recall() >= conf.mine.min_recall)
        }
    }

    #[test]
    fn rejected_conjunctions_stay_dropped() {
        let (gram, inputs) = calc();
        let relevant = relevant(&gram);

        // Learn once to see which conjunction combination search keeps.
        let mut reference = Miner::new(gram.clone());
        let best = reference.learn(inputs.clone(), Some(&relevant)).unwrap();
        let conj = best
            .iter()
            .find(|c| matches!(c.cst().get(), RCst::And(_)))
            .expect("combination search keeps the explaining conjunction")
            .cst()
            .clone();

        // A session that already rejected it must not re-admit it.
        let mut rejected = CstSet::new();
        rejected.insert(conj.clone());
        let mut miner = Miner {
            rejected,
            ..Miner::new(gram)
        };
        miner.learn(inputs, Some(&relevant)).unwrap();
        assert!(miner.cands.iter().all(|c| c.uid() != conj.uid()))
    }

    #[test]
    fn default_relevance_is_failing_symbols() {
        let (gram, inputs) = calc();
        let miner = Miner {
            inputs: inputs.clone(),
            ..Miner::new(gram.clone())
        };
        let syms = miner.relevant_syms(None).unwrap();
        // Failing inputs only mention `<start>`, `<f>` and `<n>`.
        assert_eq!(syms.len(), 3)
    }

    #[test]
    fn disjunction_search_uses_the_live_candidates() {
        let gram = Grammar::of_str(
            r#"
            <start> ::= <f> "(" <n> ")"
            <f> ::= "sqrt" | "cos"
            <n> ::= "-1" | "2"
            "#,
        )
        .unwrap();
        let inputs = vec![
            Input::new(gram.parse("sqrt(-1)").unwrap(), Verdict::Failing),
            Input::new(gram.parse("cos(2)").unwrap(), Verdict::Passing),
            Input::new(gram.parse("sqrt(2)").unwrap(), Verdict::Passing),
            Input::new(gram.parse("cos(-1)").unwrap(), Verdict::Passing),
        ];
        let mut relevant = SymSet::new();
        relevant.insert(gram.sym_of("f").unwrap());
        relevant.insert(gram.sym_of("n").unwrap());

        let mut miner = Miner::new(gram);
        miner.learn(inputs, Some(&relevant)).unwrap();
        let disjs = miner.disjoin(&comb::MinSpecificity::default());
        for disj in &disjs {
            assert!(matches!(disj.cst().get(), RCst::Or(_)))
        }
    }
}
