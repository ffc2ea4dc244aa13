//! Parallel input generation engine.
//!
//! Takes a batch of constraints (the *jobs*) and produces unlabeled trees
//! satisfying them, fanning the jobs out over a pool of generation workers.
//! Workers pull jobs from a shared queue, fuzz under a per-job deadline and
//! stream their findings back over a channel. With one worker or fewer the
//! whole thing runs inline, no threads involved.
//!
//! Generation is best-effort by construction: a worker reports whatever it
//! found when its deadline hits, and an unsatisfiable job simply contributes
//! nothing.

use std::collections::VecDeque;
use std::sync::mpsc::TryRecvError;

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;

use crate::common::msg::{self, GenCore, MsgKind};
use crate::common::*;

pub mod gen;

use self::gen::{CstGen, Generate, GramGen};

/// The generation strategy the configuration selects.
fn generator() -> &'static dyn Generate {
    if conf.gen.pure_fuzz {
        &GramGen
    } else {
        &CstGen
    }
}

/// Generates trees for a batch of constraints.
///
/// The result is deduplicated. Worker profilers fold into `profiler` as
/// sub-profilers.
pub fn run(gram: &Grammar, jobs: Vec<Cst>, profiler: &Profiler) -> Res<Vec<Tree>> {
    if jobs.is_empty() {
        return Ok(vec![]);
    }
    log! { @verb
        "generating inputs for {} constraint(s) over {} worker(s)",
        jobs.len(), conf.gen.workers
    }
    if conf.gen.workers <= 1 {
        run_inline(gram, jobs, profiler)
    } else {
        run_pool(gram, jobs, profiler)
    }
}

/// Single-threaded generation, same semantics as the pool.
fn run_inline(gram: &Grammar, jobs: Vec<Cst>, profiler: &Profiler) -> Res<Vec<Tree>> {
    let mut rng = XorShiftRng::seed_from_u64(conf.seed);
    let mut seen = TreeSet::new();
    let mut res = Vec::new();
    for job in &jobs {
        conf.check_timeout()?;
        let deadline = Instant::now() + conf.gen.budget;
        profile! { |profiler| tick "generation" }
        let trees = generator().generate(gram, &mut rng, job, conf.gen.per_cand, deadline);
        profile! { |profiler| mark "generation" }
        for tree in trees {
            if seen.insert(tree.clone()) {
                res.push(tree)
            }
        }
    }
    Ok(res)
}

/// Worker-pool generation.
fn run_pool(gram: &Grammar, jobs: Vec<Cst>, profiler: &Profiler) -> Res<Vec<Tree>> {
    let queue: Arc<Mutex<VecDeque<Cst>>> = Arc::new(Mutex::new(jobs.into_iter().collect()));
    let (sender, from_workers) = msg::from_workers();

    let mut handles = Vec::with_capacity(conf.gen.workers);
    for idx in 0..conf.gen.workers {
        let core = GenCore::new(idx.into(), sender.clone());
        let gram = gram.clone();
        let queue = queue.clone();
        let seed = conf.seed.wrapping_add(idx as u64 + 1);
        let handle = ::std::thread::Builder::new()
            .name(format!("gen-{}", idx))
            .spawn(move || worker(core, gram, queue, seed))
            .chain_err(|| "while spawning a generation worker")?;
        handles.push(handle)
    }
    // Only workers hold senders now, so the channel closes when they are all
    // done.
    drop(sender);

    let mut seen = TreeSet::new();
    let mut res = Vec::new();
    let mut first_err = None;
    while let Ok(msg) = from_workers.recv() {
        match msg.kind {
            MsgKind::Trees(trees) => {
                for tree in trees {
                    if seen.insert(tree.clone()) {
                        res.push(tree)
                    }
                }
            }
            MsgKind::Msg(blah) => log! { @debug "worker {}: {}", msg.id, blah },
            MsgKind::Err(e) => {
                if first_err.is_none() {
                    first_err = Some(e)
                }
            }
            MsgKind::Done(prof) => profiler.add_other(format!("gen-{}", msg.id), *prof),
        }
    }
    debug_assert!(matches!(
        from_workers.try_recv(),
        Err(TryRecvError::Disconnected)
    ));

    for handle in handles {
        if handle.join().is_err() && first_err.is_none() {
            first_err = Some("a generation worker panicked".into())
        }
    }
    match first_err {
        Some(e) => Err(e),
        None => Ok(res),
    }
}

/// Generation worker: pulls jobs until the queue runs dry.
fn worker(core: GenCore, gram: Grammar, queue: Arc<Mutex<VecDeque<Cst>>>, seed: u64) {
    let prof = Profiler::new();
    let mut rng = XorShiftRng::seed_from_u64(seed);
    loop {
        let job = match queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(e) => {
                let _ = core.err(corrupted_err(e));
                return;
            }
        };
        let job = match job {
            Some(job) => job,
            None => break,
        };
        if conf.check_timeout().is_err() {
            break;
        }
        let deadline = Instant::now() + conf.gen.budget;
        profile! { |prof| tick "generation" }
        let trees = generator().generate(&gram, &mut rng, &job, conf.gen.per_cand, deadline);
        profile! { |prof| mark "generation" }
        profile! { |prof| "trees generated" => add trees.len() }
        if !core.send_trees(trees) {
            // Engine hung up, no point continuing.
            return;
        }
    }
    let _ = core.exit(prof);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cst::{Expr, Op, Ref};

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
    fn pool_results_satisfy_their_constraints() {
        let gram = calc();
        let f = gram.sym_of("f").unwrap();
        let n = gram.sym_of("n").unwrap();
        let jobs = vec![
            cst::cmp(Op::Eql, Expr::Txt(Ref::Sym(f)), Expr::SCst("sqrt".into())),
            cst::cmp(Op::Lt, Expr::Num(Ref::Sym(n)), Expr::ICst(0.into())),
        ];
        let profiler = Profiler::new();
        let trees = run(&gram, jobs.clone(), &profiler).unwrap();
        assert!(!trees.is_empty());
        // Every tree satisfies at least one of the jobs, and no tree shows
        // up twice.
        let mut seen = TreeSet::new();
        for tree in &trees {
            assert!(jobs.iter().any(|job| job.check(tree).unwrap()));
            assert!(seen.insert(tree.clone()))
        }
    }

    #[test]
    fn constraint_directed_is_the_default_strategy() {
        assert_eq!(generator().name(), "constraint-directed fuzz")
    }

    #[test]
    fn empty_job_batch_is_a_noop() {
        let gram = calc();
        let profiler = Profiler::new();
        assert!(run(&gram, vec![], &profiler).unwrap().is_empty())
    }
}
