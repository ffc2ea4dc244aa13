//! Base types and functions.

pub use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
pub use std::io::Result as IoRes;
pub use std::io::{Read, Write};
pub use std::sync::mpsc::{Receiver, Sender};
pub use std::sync::{Arc, Mutex};
pub use std::time::{Duration, Instant};

pub use hashconsing::coll::*;
pub use hashconsing::{HConsed, HashConsign};
pub use num::{One, Signed, Zero};

pub use crate::cst::{self, Cst, Expr, Op, RCst, Ref};
pub use crate::data::{Input, Oracle, Verdict};
pub use crate::errors::*;
pub use crate::gram::Grammar;
pub use crate::tree::{self, RTree, Tree, TreeMap, TreeSet};

#[macro_use]
pub mod macros;
mod wrappers;

pub mod config;
pub mod msg;
pub mod profiling;
mod revision;

pub use self::config::*;
pub use self::profiling::{CanPrint, DurationExt, Profiler};
pub use self::wrappers::*;

lazy_static! {
    /// Configuration from clap.
    pub static ref conf: Config = Config::clap();
    static ref version_string: String = match revision::REVISION {
        Some(rev) => format!("{} (revision {})", clap::crate_version!(), rev),
        None => clap::crate_version!().to_string(),
    };
    /// Version with revision info.
    pub static ref version: &'static str = &version_string;
}

// |===| Helpers.

/// Stdout.
pub use std::io::stdout;

/// Prints the stats if asked. Does nothing in bench mode.
#[cfg(feature = "bench")]
pub fn print_stats(_: &'static str, _: Profiler) {}
/// Prints the stats if asked. Does nothing in bench mode.
#[cfg(not(feature = "bench"))]
pub fn print_stats(name: &str, profiler: Profiler) {
    if conf.stats {
        println!();
        println!("; {} {{", conf.emph(name));
        let (tree, stats) = profiler.extract_tree();
        tree.print();
        if !stats.is_empty() {
            println!("; stats:");
            stats.print()
        }
        println!("; }}")
    }
}

/// Lock corrupted error.
pub fn corrupted_err<T>(_: T) -> Error {
    "[bug] lock on the job queue is corrupted...".into()
}

/// Identity function.
pub fn identity<T>(t: T) -> T {
    t
}

// |===| Type and trait aliases.

/// Integers.
pub type Int = ::num::BigInt;

// |===| Helper traits.

/// Provides user-friendly formatting: `pebcak_fmt`.
///
/// Constraints print as grammar-free canonical expressions by default.
/// Pebcak formatting threads the grammar through so that symbol references
/// print with their actual names.
pub trait PebcakFmt<'a> {
    /// Info needed.
    type Info;
    /// User-friendly formatting.
    fn pebcak_io_fmt<Writer: Write>(&self, w: &mut Writer, i: Self::Info) -> IoRes<()>;
    /// Error specific to the implementor.
    fn pebcak_err(&self) -> ErrorKind;
    /// User-friendly formatting.
    fn pebcak_fmt<Writer: Write>(&self, w: &mut Writer, i: Self::Info) -> Res<()> {
        self.pebcak_io_fmt(w, i).chain_err(|| self.pebcak_err())
    }
    /// Formatted string.
    fn string_do<T, F>(&self, i: Self::Info, f: F) -> Res<T>
    where
        F: FnOnce(&str) -> T,
    {
        let mut v = vec![];
        self.pebcak_fmt(&mut v, i)?;
        ::std::str::from_utf8(&v)
            .chain_err(|| self.pebcak_err())
            .map(f)
    }
    /// Formatted string.
    fn to_string_info(&self, i: Self::Info) -> Res<String> {
        self.string_do(i, |s| s.to_string())
    }
}
