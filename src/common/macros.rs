//! Macros.

/// Implements `Display` for a type.
#[macro_export]
macro_rules! impl_fmt {
    ($typ:ident ($slf:ident, $fmt:ident) $body:block) => {
        impl ::std::fmt::Display for $typ {
            fn fmt(&$slf, $fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result $body
        }
    };
}

/// Creates a `usize` wrapper with a range, a set, a hash map and a total map.
///
/// The set is a `BTreeSet` so that iterating over indices is deterministic,
/// which instantiation and combination search rely on.
#[macro_export]
macro_rules! wrap_usize {
    (
        $(#[$meta:meta])* $t:ident
        $(#[$rmeta:meta])* range: $range:ident
        $(#[$smeta:meta])* set: $set:ident
        $(#[$hmeta:meta])* hash map: $hmap:ident
        $(#[$mmeta:meta])* map: $map:ident with iter: $iter:ident
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $t {
            val: usize,
        }
        impl $t {
            /// Wrapped value.
            #[inline]
            pub fn get(self) -> usize {
                self.val
            }
            /// Increments the wrapped value.
            #[inline]
            pub fn inc(&mut self) {
                self.val += 1
            }
        }
        impl From<usize> for $t {
            fn from(val: usize) -> Self {
                $t { val }
            }
        }
        impl ::std::ops::Deref for $t {
            type Target = usize;
            fn deref(&self) -> &usize {
                &self.val
            }
        }
        impl ::std::fmt::Display for $t {
            fn fmt(&self, fmt: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(fmt, "{}", self.val)
            }
        }

        $(#[$rmeta])*
        #[derive(Clone, Copy, Debug)]
        pub struct $range {
            crt: usize,
            end: usize,
        }
        impl $range {
            /// Range from zero to some value (exclusive).
            pub fn zero_to<T: Into<$t>>(end: T) -> Self {
                $range {
                    crt: 0,
                    end: end.into().val,
                }
            }
        }
        impl Iterator for $range {
            type Item = $t;
            fn next(&mut self) -> Option<$t> {
                if self.crt >= self.end {
                    None
                } else {
                    let res = $t { val: self.crt };
                    self.crt += 1;
                    Some(res)
                }
            }
        }

        $(#[$smeta])*
        pub type $set = ::std::collections::BTreeSet<$t>;

        $(#[$hmeta])*
        pub type $hmap<T> = ::std::collections::HashMap<$t, T>;

        $(#[$mmeta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $map<T> {
            vec: Vec<T>,
        }
        impl<T> $map<T> {
            /// Empty map.
            pub fn new() -> Self {
                $map { vec: Vec::new() }
            }
            /// Empty map with some capacity.
            pub fn with_capacity(capa: usize) -> Self {
                $map {
                    vec: Vec::with_capacity(capa),
                }
            }
            /// Number of elements.
            pub fn len(&self) -> usize {
                self.vec.len()
            }
            /// True if the map is empty.
            pub fn is_empty(&self) -> bool {
                self.vec.is_empty()
            }
            /// Index the next `push` will use.
            pub fn next_index(&self) -> $t {
                $t {
                    val: self.vec.len(),
                }
            }
            /// Pushes an element, returns its index.
            pub fn push(&mut self, elem: T) -> $t {
                let idx = self.next_index();
                self.vec.push(elem);
                idx
            }
            /// Iterator over the elements.
            pub fn iter(&self) -> ::std::slice::Iter<T> {
                self.vec.iter()
            }
            /// Mutable iterator over the elements.
            pub fn iter_mut(&mut self) -> ::std::slice::IterMut<T> {
                self.vec.iter_mut()
            }
            /// Iterator over indices and elements.
            pub fn index_iter(&self) -> $iter<T> {
                $iter {
                    iter: self.vec.iter().enumerate(),
                }
            }
        }
        impl<T> Default for $map<T> {
            fn default() -> Self {
                Self::new()
            }
        }
        impl<T> From<Vec<T>> for $map<T> {
            fn from(vec: Vec<T>) -> Self {
                $map { vec }
            }
        }
        impl<T> ::std::ops::Index<$t> for $map<T> {
            type Output = T;
            fn index(&self, idx: $t) -> &T {
                &self.vec[idx.val]
            }
        }
        impl<T> ::std::ops::IndexMut<$t> for $map<T> {
            fn index_mut(&mut self, idx: $t) -> &mut T {
                &mut self.vec[idx.val]
            }
        }
        impl<'a, T> IntoIterator for &'a $map<T> {
            type Item = &'a T;
            type IntoIter = ::std::slice::Iter<'a, T>;
            fn into_iter(self) -> Self::IntoIter {
                self.vec.iter()
            }
        }

        #[doc = "Iterator over indices and elements of the total map."]
        pub struct $iter<'a, T> {
            iter: ::std::iter::Enumerate<::std::slice::Iter<'a, T>>,
        }
        impl<'a, T> Iterator for $iter<'a, T> {
            type Item = ($t, &'a T);
            fn next(&mut self) -> Option<Self::Item> {
                self.iter.next().map(|(val, elem)| ($t { val }, elem))
            }
        }
    };
}

/// Logging macro, verbosity-gated.
///
/// Levels: `@verb` (`-v`), `@info` (`-vv`), `@debug` (`-vvv`). Every line is
/// prefixed with `; ` so logs never collide with result lines.
#[macro_export]
#[cfg(not(feature = "bench"))]
macro_rules! log {
    (@verb $($tail:tt)*) => {
        log! { 1 => $($tail)* }
    };
    (@info $($tail:tt)*) => {
        log! { 2 => $($tail)* }
    };
    (@debug $($tail:tt)*) => {
        log! { 3 => $($tail)* }
    };
    ( $lvl:expr => $( $fmt:expr $(, $args:expr)* $(,)? );* $(;)? ) => {
        if $crate::common::conf.verb >= $lvl {
            $(
                println!("; {}", format!($fmt $(, $args)*));
            )*
        }
    };
}
#[cfg(feature = "bench")]
macro_rules! log {
    ($($tt:tt)*) => {
        ()
    };
}

/// Gates something by an `if conf.verbose()`. Inactive in bench mode.
#[macro_export]
#[cfg(not(feature = "bench"))]
macro_rules! if_verb {
    ($($blah:tt)*) => {
        if $crate::common::conf.verbose() {
            $($blah)*
        }
    };
}
#[cfg(feature = "bench")]
macro_rules! if_verb {
    ($($blah:tt)*) => {
        ()
    };
}

/// Profiling macro, compiled to nothing in `bench` mode.
///
/// If passed `self`, assumes `self` has a `_profiler` field.
#[macro_export]
#[cfg(not(feature = "bench"))]
macro_rules! profile {
    ( | $prof:ident | wrap $b:block $( $scope:expr ),+ $(,)* ) => {{
        profile! { |$prof| tick $($scope),+ }
        let res = $b;
        profile! { |$prof| mark $($scope),+ }
        res
    }};
    ( | $prof:ident | $stat:expr => add $e:expr ) => {
        $prof.stat_do($stat, |val| val + $e)
    };
    ( | $prof:ident | $meth:ident $( $scope:expr ),+ $(,)* ) => {
        $prof.$meth(vec![ $($scope),+ ])
    };
    ( $slf:ident wrap $b:block $( $scope:expr ),+ $(,)* ) => {{
        let prof = &$slf._profiler;
        profile! { |prof| wrap $b $($scope),+ }
    }};
    ( $slf:ident $stat:expr => add $e:expr ) => {{
        let prof = &$slf._profiler;
        profile! { |prof| $stat => add $e }
    }};
    ( $slf:ident $meth:ident $( $scope:expr ),+ $(,)* ) => {{
        let prof = &$slf._profiler;
        profile! { |prof| $meth $($scope),+ }
    }};
}
#[cfg(feature = "bench")]
macro_rules! profile {
    ( | $prof:ident | wrap $b:block $( $scope:expr ),+ $(,)* ) => {
        $b
    };
    ( $slf:ident wrap $b:block $( $scope:expr ),+ $(,)* ) => {
        $b
    };
    ( $($tt:tt)* ) => {
        ()
    };
}
