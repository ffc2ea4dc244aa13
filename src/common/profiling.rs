//! Profiling stuff.
//!
//! In `bench` mode, `Profiler` is a unit structure and all profiling macros
//! compile to nothing.

use std::time::{Duration, Instant};

use crate::common::*;

/// Extends duration with a pretty printing.
pub trait DurationExt {
    /// Nice string representation.
    fn to_str(&self) -> String;
}
impl DurationExt for Duration {
    fn to_str(&self) -> String {
        format!("{}.{:0>9}", self.as_secs(), self.subsec_nanos())
    }
}

/// Profile tree.
#[derive(PartialEq, Eq)]
pub struct ProfileTree {
    /// Duration stored at this level.
    duration: Option<Duration>,
    /// Sub-branches.
    branches: HashMap<&'static str, ProfileTree>,
}
impl ProfileTree {
    /// Tree with nothing but the top level.
    pub fn top(top: Duration) -> Self {
        ProfileTree {
            duration: Some(top),
            branches: HashMap::new(),
        }
    }

    /// Empty tree, not visible outside.
    fn empty() -> Self {
        ProfileTree {
            duration: None,
            branches: HashMap::new(),
        }
    }

    /// Inserts something in the tree.
    pub fn insert(&mut self, scope: Vec<&'static str>, duration: Duration) {
        let (mut current, mut last_scope) = (self, "top");

        for scope in scope {
            let tmp = current;
            current = tmp.branches.entry(scope).or_insert_with(ProfileTree::empty);
            last_scope = scope
        }
        if current.duration.is_some() {
            panic!(
                "ProfileTree: trying to insert the same scope twice `{}`",
                conf.emph(last_scope)
            )
        }
        current.duration = Some(duration)
    }

    /// Iterator on the tree.
    ///
    /// Scopes are guaranteed to follow the topological order.
    pub fn iter<F>(&self, f: F)
    where
        F: Fn(&[&'static str], &Duration, Duration),
    {
        if let Some(duration) = self.duration.as_ref() {
            let sub_duration = self.branches.values().fold(Duration::from_secs(0), |acc, t| {
                acc + t.duration.unwrap_or_else(|| Duration::from_secs(0))
            });
            f(&[], duration, sub_duration)
        } else {
            panic!("ProfileTree: no top duration set but already iterating")
        }
        let mut stack: Vec<(_, Vec<_>)> = vec![(
            vec![],
            self.branches.iter().map(|(s, p)| (*s, p)).collect(),
        )];

        while let Some((scope, mut branches)) = stack.pop() {
            if let Some((s, profile)) = branches.pop() {
                let mut this_scope = scope.clone();
                stack.push((scope, branches));
                this_scope.push(s);
                let sub_duration =
                    profile
                        .branches
                        .values()
                        .fold(Duration::from_secs(0), |acc, t| {
                            acc + t.duration.unwrap_or_else(|| Duration::from_secs(0))
                        });
                if let Some(duration) = profile.duration.as_ref() {
                    f(&this_scope, duration, sub_duration)
                } else {
                    f(&this_scope, &sub_duration, sub_duration)
                }
                stack.push((
                    this_scope,
                    profile.branches.iter().map(|(s, p)| (*s, p)).collect(),
                ))
            }
        }
    }
}

/// Maps strings to counters.
pub type Stats = HashMap<String, usize>;

/// Provides a debug print function.
pub trait CanPrint {
    /// Debug print (multi-line).
    fn print(&self);
}
impl CanPrint for Stats {
    fn print(&self) {
        let mut stats: Vec<_> = self.iter().collect();
        stats.sort_unstable();
        for (stat, count) in stats {
            let stat_len = ::std::cmp::min(30, stat.len());
            println!(
                ";   {0: >1$}{2}: {3: >5}",
                "",
                30 - stat_len,
                conf.emph(stat),
                count
            )
        }
    }
}
impl CanPrint for ProfileTree {
    fn print(&self) {
        self.iter(|scope, time, sub_time| {
            if let Some(last) = scope.last() {
                println!(
                    "; {0: >1$}|- {2}s {3}{4}",
                    "",
                    2 * scope.len(),
                    time.to_str(),
                    last,
                    if sub_time != Duration::from_secs(0) {
                        format!(" ({}s)", sub_time.to_str())
                    } else {
                        "".into()
                    }
                )
            } else {
                println!(
                    "; total {}s{}",
                    time.to_str(),
                    if sub_time != Duration::from_secs(0) {
                        format!(" ({}s)", sub_time.to_str())
                    } else {
                        "".into()
                    }
                )
            }
        })
    }
}

/// Profiling structure, only in `not(bench)`.
///
/// Maintains statistics using a hashmap indexed by strings.
///
/// Internally, the structures are wrapped in `RefCell`s so that mutation
/// does not require `&mut self`.
#[cfg(not(feature = "bench"))]
pub struct Profiler {
    /// String-indexed durations.
    map: ::std::cell::RefCell<HashMap<Vec<&'static str>, (Option<Instant>, Duration)>>,
    /// Starting tick, for total time.
    start: Instant,
    /// Other statistics.
    stats: ::std::cell::RefCell<Stats>,
    /// Sub-profilers, from generation workers.
    others: ::std::cell::RefCell<Vec<(String, Profiler)>>,
}
#[cfg(feature = "bench")]
pub struct Profiler;

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    /// Constructor.
    #[cfg(not(feature = "bench"))]
    pub fn new() -> Self {
        use std::cell::RefCell;
        Profiler {
            map: RefCell::new(HashMap::new()),
            start: Instant::now(),
            stats: RefCell::new(HashMap::new()),
            others: RefCell::new(Vec::new()),
        }
    }
    #[cfg(feature = "bench")]
    pub fn new() -> Self {
        Profiler
    }

    /// Acts on a statistic.
    #[cfg(not(feature = "bench"))]
    pub fn stat_do<F, S>(&self, stat: S, f: F)
    where
        F: Fn(usize) -> usize,
        S: Into<String>,
    {
        let stat = stat.into();
        let mut map = self.stats.borrow_mut();
        let val = map.get(&stat).cloned().unwrap_or(0);
        let _ = map.insert(stat, f(val));
    }

    /// Ticks.
    #[cfg(not(feature = "bench"))]
    pub fn tick(&self, scope: Vec<&'static str>) {
        if scope.is_empty() {
            panic!("Profiler: can't use scope `total`")
        }
        let mut map = self.map.borrow_mut();
        let time = map
            .entry(scope)
            .or_insert_with(|| (None, Duration::from_secs(0)));
        time.0 = Some(Instant::now())
    }

    /// Registers the time since the last tick.
    ///
    /// Panics if there was no tick since the last time registration.
    #[cfg(not(feature = "bench"))]
    pub fn mark(&self, scope: Vec<&'static str>) {
        if scope.is_empty() {
            panic!("Profiler: can't use scope `total`")
        }
        let mut map = self.map.borrow_mut();
        if let Some(&mut (ref mut tick, ref mut sum)) = map.get_mut(&scope) {
            let mut instant = None;
            ::std::mem::swap(&mut instant, tick);
            if let Some(instant) = instant {
                *sum += Instant::now().duration_since(instant);
                *tick = None
            }
        } else {
            panic!("profiling: trying to mark the time without ticking first")
        }
    }

    /// Registers a sub-profiler, typically sent back by a worker.
    #[cfg(not(feature = "bench"))]
    pub fn add_other<S: Into<String>>(&self, name: S, other: Profiler) {
        self.others.borrow_mut().push((name.into(), other))
    }
    #[cfg(feature = "bench")]
    pub fn add_other<S: Into<String>>(&self, _: S, _: Profiler) {}

    /// Extracts a profile tree and the statistics, consuming the profiler.
    ///
    /// Sub-profilers are drained and printed as they go.
    #[cfg(not(feature = "bench"))]
    pub fn extract_tree(self) -> (ProfileTree, Stats) {
        for (name, sub) in self.others.into_inner() {
            println!("; {} {{", conf.emph(&name));
            let (tree, stats) = sub.extract_tree();
            tree.print();
            if !stats.is_empty() {
                println!("; stats:");
                stats.print()
            }
            println!("; }}")
        }
        let mut tree = ProfileTree::top(Instant::now().duration_since(self.start));
        for (scope, &(_, ref time)) in self.map.borrow().iter() {
            tree.insert(scope.clone(), *time)
        }
        (tree, self.stats.into_inner())
    }
}
