//! Diagmine's global configuration.
//!
//! Everything here is a *tuning knob*: floors, sizes, budgets, verbosity.
//! Session state (cumulative inputs, candidates...) lives in the session
//! objects, never here.

use std::time::{Duration, Instant};

use ansi::{Colour, Style};
use clap::Arg;

use crate::errors::*;

/// Clap `App`.
pub type App = clap::App<'static>;
/// Clap `ArgMatches`.
pub type Matches = clap::ArgMatches;

/// Functions all sub-configurations must have.
pub trait SubConf {
    /// Cross-field sanity check, run once after parsing.
    fn check(&self) -> Res<()>;
}

/// Tree and constraint factory configuration.
///
/// Currently, these options are static. They cannot be changed through clap.
pub struct FactoryConf {
    /// Initial capacity of the tree factory.
    pub tree_capa: usize,
    /// Initial capacity of the constraint factory.
    pub cst_capa: usize,
}
impl SubConf for FactoryConf {
    fn check(&self) -> Res<()> {
        Ok(())
    }
}
impl FactoryConf {
    /// Adds clap options to a clap App.
    pub fn add_args(app: App, _: usize) -> App {
        app
    }

    /// Creates itself from some matches.
    pub fn new(_: &Matches) -> Self {
        FactoryConf {
            tree_capa: 3_000,
            cst_capa: 1_000,
        }
    }
}

/// Mining configuration: floors, combination sizes, extraction cap.
pub struct MineConf {
    /// Minimum precision a combination must beat.
    pub min_precision: f64,
    /// Minimum recall below which a candidate is removed.
    pub min_recall: f64,
    /// Maximum conjunction size.
    pub max_conj: usize,
    /// Maximum disjunction size.
    pub max_disj: usize,
    /// Cap on the failing inputs used for extraction and instantiation.
    pub fail_capa: usize,
    /// Derive relevant symbols from the whole grammar instead of the failing
    /// trees.
    pub all_syms: bool,
}
impl SubConf for MineConf {
    fn check(&self) -> Res<()> {
        if self.max_conj < 2 {
            bail!("`--max_conj` must be at least 2")
        }
        if self.max_disj < 2 {
            bail!("`--max_disj` must be at least 2")
        }
        Ok(())
    }
}
impl MineConf {
    /// Adds clap options to a clap `App`.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.arg(
            Arg::new("min_precision")
                .long("min_precision")
                .help("sets the precision floor for combination search")
                .validator(unit_validator)
                .value_name("float in [0,1]")
                .default_value("0.6")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("min_recall")
                .long("min_recall")
                .help("sets the recall floor below which candidates are dropped")
                .validator(unit_validator)
                .value_name("float in [0,1]")
                .default_value("0.9")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("max_conj")
                .long("max_conj")
                .help("sets the maximal size of conjunction combinations")
                .validator(int_validator)
                .value_name("int")
                .default_value("2")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("max_disj")
                .long("max_disj")
                .help("sets the maximal size of disjunction combinations")
                .validator(int_validator)
                .value_name("int")
                .default_value("2")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("fail_capa")
                .long("fail_capa")
                .help("sets the cap on failing inputs used for value extraction")
                .validator(int_validator)
                .value_name("int")
                .default_value("5")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("all_syms")
                .long("all_syms")
                .help("(de)activates deriving relevant symbols from the whole grammar")
                .validator(bool_validator)
                .value_name(bool_format)
                .default_value("no")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
    }

    /// Creates itself from some matches.
    pub fn new(matches: &Matches) -> Self {
        let min_precision = f64_of_matches(matches, "min_precision");
        let min_recall = f64_of_matches(matches, "min_recall");
        let max_conj = int_of_matches(matches, "max_conj");
        let max_disj = int_of_matches(matches, "max_disj");
        let fail_capa = int_of_matches(matches, "fail_capa");
        let all_syms = bool_of_matches(matches, "all_syms");

        MineConf {
            min_precision,
            min_recall,
            max_conj,
            max_disj,
            fail_capa,
            all_syms,
        }
    }
}

/// Refinement loop configuration.
pub struct RefineConf {
    /// Maximal number of refinement rounds.
    pub max_iters: usize,
    /// Number of best candidates taken into each generation round.
    pub take: usize,
}
impl SubConf for RefineConf {
    fn check(&self) -> Res<()> {
        if self.max_iters == 0 {
            bail!("`--max_iters` must be positive")
        }
        Ok(())
    }
}
impl RefineConf {
    /// Adds clap options to a clap `App`.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.arg(
            Arg::new("max_iters")
                .long("max_iters")
                .help("sets the maximal number of refinement rounds")
                .validator(int_validator)
                .value_name("int")
                .default_value("10")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("take")
                .long("take")
                .help("sets how many best candidates each generation round stresses")
                .validator(int_validator)
                .value_name("int")
                .default_value("5")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
    }

    /// Creates itself from some matches.
    pub fn new(matches: &Matches) -> Self {
        let max_iters = int_of_matches(matches, "max_iters");
        let take = int_of_matches(matches, "take");

        RefineConf { max_iters, take }
    }
}

/// Generation engine configuration.
pub struct GenConf {
    /// Number of generation workers.
    pub workers: usize,
    /// Number of inputs requested per candidate.
    pub per_cand: usize,
    /// Per-candidate generation budget.
    pub budget: Duration,
    /// Depth limit for grammar fuzzing.
    pub fuzz_depth: usize,
    /// Ignore the constraints and fuzz the grammar directly.
    pub pure_fuzz: bool,
}
impl SubConf for GenConf {
    fn check(&self) -> Res<()> {
        if self.fuzz_depth == 0 {
            bail!("`--fuzz_depth` must be positive")
        }
        Ok(())
    }
}
impl GenConf {
    /// Adds clap options to a clap `App`.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.arg(
            Arg::new("workers")
                .long("workers")
                .help("sets the number of generation workers, 0 or 1 for sequential")
                .validator(int_validator)
                .value_name("int")
                .default_value("10")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("per_cand")
                .long("per_cand")
                .help("sets the number of inputs requested per candidate")
                .validator(int_validator)
                .value_name("int")
                .default_value("5")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("gen_budget")
                .long("gen_budget")
                .help("sets the per-candidate generation budget in milliseconds")
                .validator(int_validator)
                .value_name("int")
                .default_value("1000")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("fuzz_depth")
                .long("fuzz_depth")
                .help("sets the depth limit of grammar fuzzing")
                .validator(int_validator)
                .value_name("int")
                .default_value("64")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("pure_fuzz")
                .long("pure_fuzz")
                .help("(de)activates ignoring the constraints during generation")
                .validator(bool_validator)
                .value_name(bool_format)
                .default_value("no")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
    }

    /// Creates itself from some matches.
    pub fn new(matches: &Matches) -> Self {
        let workers = int_of_matches(matches, "workers");
        let per_cand = int_of_matches(matches, "per_cand");
        let budget = Duration::from_millis(int_of_matches(matches, "gen_budget") as u64);
        let fuzz_depth = int_of_matches(matches, "fuzz_depth");
        let pure_fuzz = bool_of_matches(matches, "pure_fuzz");

        GenConf {
            workers,
            per_cand,
            budget,
            fuzz_depth,
            pure_fuzz,
        }
    }
}

/// Mutation fuzzer configuration.
pub struct MutationConf {
    /// Minimal number of mutations per pick.
    pub min_muts: usize,
    /// Maximal number of mutations per pick.
    pub max_muts: usize,
    /// Iteration budget of a fuzzing run.
    pub max_iters: usize,
    /// Acceptance-rate threshold below which a run stops early.
    pub threshold: f64,
    /// Yield rejected (non-failing) inputs too.
    pub keep_rejected: bool,
}
impl SubConf for MutationConf {
    fn check(&self) -> Res<()> {
        if self.min_muts == 0 || self.min_muts > self.max_muts {
            bail!(
                "illegal mutation range [{}, {}]",
                self.min_muts,
                self.max_muts
            )
        }
        Ok(())
    }
}
impl MutationConf {
    /// Adds clap options to a clap `App`.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.arg(
            Arg::new("min_muts")
                .long("min_muts")
                .help("sets the minimal number of mutations applied per pick")
                .validator(int_validator)
                .value_name("int")
                .default_value("2")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("max_muts")
                .long("max_muts")
                .help("sets the maximal number of mutations applied per pick")
                .validator(int_validator)
                .value_name("int")
                .default_value("10")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("mut_iters")
                .long("mut_iters")
                .help("sets the iteration budget of a mutation fuzzing run")
                .validator(int_validator)
                .value_name("int")
                .default_value("500")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("mut_threshold")
                .long("mut_threshold")
                .help("sets the acceptance-rate threshold stopping a run early")
                .validator(unit_validator)
                .value_name("float in [0,1]")
                .default_value("0.1")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
        .arg(
            Arg::new("keep_rejected")
                .long("keep_rejected")
                .help("(de)activates yielding rejected inputs from mutation runs")
                .validator(bool_validator)
                .value_name(bool_format)
                .default_value("on")
                .takes_value(true)
                .number_of_values(1)
                .display_order(order()),
        )
    }

    /// Creates itself from some matches.
    pub fn new(matches: &Matches) -> Self {
        let min_muts = int_of_matches(matches, "min_muts");
        let max_muts = int_of_matches(matches, "max_muts");
        let max_iters = int_of_matches(matches, "mut_iters");
        let threshold = f64_of_matches(matches, "mut_threshold");
        let keep_rejected = bool_of_matches(matches, "keep_rejected");

        MutationConf {
            min_muts,
            max_muts,
            max_iters,
            threshold,
            keep_rejected,
        }
    }
}

/// Global configuration.
pub struct Config {
    /// Grammar file.
    file: Option<String>,
    /// Seed input file.
    seeds: Option<String>,
    /// Oracle command.
    oracle: Option<String>,
    /// Verbosity.
    pub verb: usize,
    /// Statistics flag.
    pub stats: bool,
    /// Rng seed, for reproducible runs.
    pub seed: u64,
    /// Instant at which we'll timeout.
    timeout: Option<Instant>,
    /// Styles, for coloring.
    styles: Styles,

    /// Factory configuration.
    pub factory: FactoryConf,
    /// Mining configuration.
    pub mine: MineConf,
    /// Refinement configuration.
    pub refine: RefineConf,
    /// Generation configuration.
    pub gen: GenConf,
    /// Mutation configuration.
    pub mutation: MutationConf,
}
impl ColorExt for Config {
    fn styles(&self) -> &Styles {
        &self.styles
    }
}
impl Config {
    /// Grammar file.
    #[inline]
    pub fn in_file(&self) -> Option<&String> {
        self.file.as_ref()
    }
    /// Seed input file.
    #[inline]
    pub fn seeds_file(&self) -> Option<&String> {
        self.seeds.as_ref()
    }
    /// Oracle command.
    #[inline]
    pub fn oracle_cmd(&self) -> Option<&String> {
        self.oracle.as_ref()
    }

    /// True if verbosity is at least `-v`.
    #[inline]
    pub fn verbose(&self) -> bool {
        self.verb > 0
    }
    /// True if verbosity is at least `-vvv`.
    #[inline]
    pub fn debug(&self) -> bool {
        self.verb > 2
    }

    /// Checks if we're out of time.
    #[inline]
    pub fn check_timeout(&self) -> Res<()> {
        if let Some(max) = self.timeout.as_ref() {
            if &Instant::now() > max {
                bail!(ErrorKind::Timeout)
            }
        }
        Ok(())
    }
    /// Time until timeout.
    #[inline]
    pub fn until_timeout(&self) -> Option<Duration> {
        if let Some(timeout) = self.timeout.as_ref() {
            let now = Instant::now();
            if &now > timeout {
                Some(Duration::new(0, 0))
            } else {
                Some(*timeout - now)
            }
        } else {
            None
        }
    }

    /// Runs the sub-configuration checks.
    pub fn check(&self) -> Res<()> {
        self.factory.check()?;
        self.mine.check()?;
        self.refine.check()?;
        self.gen.check()?;
        self.mutation.check()?;
        Ok(())
    }

    /// Parses command-line arguments and generates the configuration.
    pub fn clap() -> Self {
        let mut app = App::new(clap::crate_name!());
        app = Self::add_args(app, 0);
        app = FactoryConf::add_args(app, 100);
        app = MineConf::add_args(app, 200);
        app = RefineConf::add_args(app, 300);
        app = GenConf::add_args(app, 400);
        app = MutationConf::add_args(app, 500);

        let matches = app.get_matches();

        // Input files and oracle.
        let file = matches.value_of("grammar file").map(|s| s.to_string());
        let seeds = matches.value_of("seeds").map(|s| s.to_string());
        let oracle = matches.value_of("oracle").map(|s| s.to_string());

        // Verbosity.
        let mut verb = 0;
        for _ in 0..matches.occurrences_of("verb") {
            verb += 1
        }
        for _ in 0..matches.occurrences_of("quiet") {
            if verb > 0 {
                verb -= 1
            }
        }

        // Colors.
        let color = atty::is(atty::Stream::Stdout) && bool_of_matches(&matches, "color");
        let styles = Styles::new(color);

        // Profiling.
        let stats = bool_of_matches(&matches, "stats");

        // Rng seed.
        let seed = int_of_matches(&matches, "seed") as u64;

        // Timeout.
        let timeout = match int_of_matches(&matches, "timeout") {
            0 => None,
            n => Some(Instant::now() + Duration::new(n as u64, 0)),
        };

        let factory = FactoryConf::new(&matches);
        let mine = MineConf::new(&matches);
        let refine = RefineConf::new(&matches);
        let gen = GenConf::new(&matches);
        let mutation = MutationConf::new(&matches);

        Config {
            file,
            seeds,
            oracle,
            verb,
            stats,
            seed,
            timeout,
            styles,
            factory,
            mine,
            refine,
            gen,
            mutation,
        }
    }

    /// Adds clap options to a clap App.
    pub fn add_args(app: App, mut order: usize) -> App {
        let mut order = || {
            order += 1;
            order
        };

        app.author(clap::crate_authors!())
            .version(*crate::common::version)
            .about("Mines boolean diagnoses over parse trees from a pass/fail oracle.")
            .arg(
                Arg::new("grammar file")
                    .help("sets the grammar file to use")
                    .index(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("seeds")
                    .long("seeds")
                    .help("sets the seed input file (one input per line)")
                    .value_name("FILE")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("oracle")
                    .long("oracle")
                    .help(
                        "sets the oracle command; receives the input on stdin, \
                         exit code 0 means passing, 1 failing, anything else undefined",
                    )
                    .value_name("CMD")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("verb")
                    .short('v')
                    .help("increases verbosity")
                    .takes_value(false)
                    .multiple_occurrences(true)
                    .display_order(order()),
            )
            .arg(
                Arg::new("quiet")
                    .short('q')
                    .help("decreases verbosity")
                    .takes_value(false)
                    .multiple_occurrences(true)
                    .display_order(order()),
            )
            .arg(
                Arg::new("color")
                    .long("color")
                    .short('c')
                    .help("(de)activates coloring (off if output is not a tty)")
                    .validator(bool_validator)
                    .value_name(bool_format)
                    .default_value("on")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("stats")
                    .long("stats")
                    .short('s')
                    .help("reports some statistics at the end of the run")
                    .validator(bool_validator)
                    .value_name(bool_format)
                    .default_value("no")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("timeout")
                    .long("timeout")
                    .short('t')
                    .help("sets a timeout in seconds, `0` for none")
                    .validator(int_validator)
                    .value_name("int")
                    .default_value("3600")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
            .arg(
                Arg::new("seed")
                    .long("seed")
                    .help("sets the rng seed, for reproducible runs")
                    .validator(int_validator)
                    .value_name("int")
                    .default_value("42")
                    .takes_value(true)
                    .number_of_values(1)
                    .display_order(order()),
            )
    }
}

/// Contains some styles for coloring.
#[derive(Debug, Clone)]
pub struct Styles {
    /// Emphasis style.
    emph: Style,
    /// Happy style.
    hap: Style,
    /// Sad style.
    sad: Style,
    /// Bad style.
    bad: Style,
}
impl Default for Styles {
    fn default() -> Self {
        Styles::new(true)
    }
}
impl ColorExt for Styles {
    fn styles(&self) -> &Styles {
        self
    }
}
impl Styles {
    /// Creates some styles.
    pub fn new(colored: bool) -> Self {
        Styles {
            emph: if colored {
                Style::new().bold()
            } else {
                Style::new()
            },
            hap: if colored {
                Colour::Green.normal().bold()
            } else {
                Style::new()
            },
            sad: if colored {
                Colour::Yellow.normal().bold()
            } else {
                Style::new()
            },
            bad: if colored {
                Colour::Red.normal().bold()
            } else {
                Style::new()
            },
        }
    }
}

/// Can color things.
pub trait ColorExt {
    /// The styles in the colorizer: emph, happy, sad, and bad.
    fn styles(&self) -> &Styles;
    /// String emphasis.
    #[inline]
    fn emph<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().emph.paint(s.as_ref()))
    }
    /// Happy string.
    #[inline]
    fn happy<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().hap.paint(s.as_ref()))
    }
    /// Sad string.
    #[inline]
    fn sad<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().sad.paint(s.as_ref()))
    }
    /// Bad string.
    #[inline]
    fn bad<S: AsRef<str>>(&self, s: S) -> String {
        format!("{}", self.styles().bad.paint(s.as_ref()))
    }
}

/// Format for booleans.
pub static bool_format: &str = "on/true|no/off/false";

/// Boolean of a string.
pub fn bool_of_str(s: &str) -> Option<bool> {
    match s {
        "on" | "true" => Some(true),
        "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

/// Boolean of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `bool_validator`.
pub fn bool_of_matches(matches: &Matches, key: &str) -> bool {
    matches
        .value_of(key)
        .and_then(bool_of_str)
        .expect("failed to retrieve boolean argument")
}

/// Integer of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `int_validator`.
pub fn int_of_matches(matches: &Matches, key: &str) -> usize {
    use std::str::FromStr;
    matches
        .value_of(key)
        .map(usize::from_str)
        .expect("failed to retrieve integer argument")
        .expect("failed to retrieve integer argument")
}

/// Float of some matches.
///
/// Assumes a default is provided and the input has been validated with
/// `unit_validator`.
pub fn f64_of_matches(matches: &Matches, key: &str) -> f64 {
    use std::str::FromStr;
    matches
        .value_of(key)
        .map(f64::from_str)
        .expect("failed to retrieve float argument")
        .expect("failed to retrieve float argument")
}

/// Validates integer input.
pub fn int_validator(s: &str) -> Result<(), String> {
    use std::str::FromStr;
    match usize::from_str(s) {
        Ok(_) => Ok(()),
        Err(_) => Err(format!("expected an integer, got `{}`", s)),
    }
}

/// Validates boolean input.
pub fn bool_validator(s: &str) -> Result<(), String> {
    if bool_of_str(s).is_some() {
        Ok(())
    } else {
        Err(format!("expected `on/true` or `off/false`, got `{}`", s))
    }
}

/// Validates floats in the unit interval.
pub fn unit_validator(s: &str) -> Result<(), String> {
    use std::str::FromStr;
    match f64::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(()),
        _ => Err(format!("expected a float between 0 and 1, got `{}`", s)),
    }
}
