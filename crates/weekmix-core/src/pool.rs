//! Candidate pools and the draw/sample primitives the allocator is built on.
//!
//! A [`Pool`] is a value: drawing from it never mutates the pool itself but
//! hands back a reduced copy, so every allocation pass works on private
//! snapshots of the configured pools.

use std::collections::HashSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a draw or sample is attempted on a pool with no candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("attempted to draw from an empty pool")]
pub struct EmptyPoolError;

/// Supplies the indices used by draws and samples.
pub trait IndexSource {
    /// Returns an index in `0..len`. Callers never pass a zero `len`.
    fn next_index(&mut self, len: usize) -> usize;
}

/// Uniform index source backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R> {
    rng: R,
}

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

impl<R: Rng> IndexSource for RngSource<R> {
    fn next_index(&mut self, len: usize) -> usize {
        self.rng.random_range(0..len)
    }
}

/// Replays a fixed cycle of indices, reduced modulo the pool length.
///
/// Used to force specific draw orders, e.g. to reproduce a rejected pair on
/// every attempt.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    script: Vec<usize>,
    cursor: usize,
}

impl ScriptedSource {
    pub fn new(script: impl Into<Vec<usize>>) -> Self {
        Self {
            script: script.into(),
            cursor: 0,
        }
    }

    /// Number of indices handed out so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl IndexSource for ScriptedSource {
    fn next_index(&mut self, len: usize) -> usize {
        if self.script.is_empty() {
            return 0;
        }
        let raw = self.script[self.cursor % self.script.len()];
        self.cursor += 1;
        raw % len
    }
}

/// Ordered multiset of candidate values. Duplicates are distinct slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pool {
    values: Vec<String>,
}

impl Pool {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|candidate| candidate == value)
    }

    /// Removes one uniformly chosen slot, returning it with the reduced pool.
    pub fn draw_one(&self, source: &mut dyn IndexSource) -> Result<(String, Pool), EmptyPoolError> {
        if self.values.is_empty() {
            return Err(EmptyPoolError);
        }
        let index = source.next_index(self.values.len()) % self.values.len();
        let mut remaining = self.values.clone();
        let selected = remaining.remove(index);
        Ok((selected, Pool { values: remaining }))
    }

    /// Draws `count` values without replacement, in draw order.
    pub fn draw_many(
        &self,
        count: usize,
        source: &mut dyn IndexSource,
    ) -> Result<(Vec<String>, Pool), EmptyPoolError> {
        let mut drawn = Vec::with_capacity(count);
        let mut remaining = self.clone();
        for _ in 0..count {
            let (value, rest) = remaining.draw_one(source)?;
            drawn.push(value);
            remaining = rest;
        }
        Ok((drawn, remaining))
    }

    /// Picks one value with replacement.
    pub fn sample_one(&self, source: &mut dyn IndexSource) -> Result<String, EmptyPoolError> {
        if self.values.is_empty() {
            return Err(EmptyPoolError);
        }
        let index = source.next_index(self.values.len()) % self.values.len();
        Ok(self.values[index].clone())
    }

    /// Copy of the pool with every slot holding one of `excluded` removed.
    pub fn without<'a, I>(&self, excluded: I) -> Pool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let excluded: HashSet<&str> = excluded.into_iter().collect();
        Pool {
            values: self
                .values
                .iter()
                .filter(|value| !excluded.contains(value.as_str()))
                .cloned()
                .collect(),
        }
    }
}

impl From<Vec<String>> for Pool {
    fn from(values: Vec<String>) -> Self {
        Self { values }
    }
}

impl<S: Into<String>> FromIterator<S> for Pool {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Pool::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn letters() -> Pool {
        Pool::new(["a", "b", "c", "d"])
    }

    #[test]
    fn draw_one_removes_only_the_selected_slot() {
        let pool = letters();
        let mut source = ScriptedSource::new([1]);
        let (selected, remaining) = pool.draw_one(&mut source).unwrap();

        assert_eq!(selected, "b");
        assert_eq!(remaining.values(), ["a", "c", "d"]);
        // Source pool is untouched.
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn draw_one_on_empty_pool_fails() {
        let mut source = ScriptedSource::new([0]);
        assert_eq!(Pool::default().draw_one(&mut source), Err(EmptyPoolError));
    }

    #[test]
    fn sample_one_on_empty_pool_fails() {
        let mut source = ScriptedSource::new([0]);
        assert_eq!(Pool::default().sample_one(&mut source), Err(EmptyPoolError));
    }

    #[test]
    fn duplicates_are_distinct_slots() {
        let pool = Pool::new(["x", "x", "y"]);
        let mut source = ScriptedSource::new([0, 0]);
        let (drawn, remaining) = pool.draw_many(2, &mut source).unwrap();

        assert_eq!(drawn, vec!["x", "x"]);
        assert_eq!(remaining.values(), ["y"]);
    }

    #[test]
    fn draw_many_past_the_end_reports_empty_pool() {
        let mut source = ScriptedSource::new([0]);
        assert_eq!(
            Pool::new(["only"]).draw_many(2, &mut source),
            Err(EmptyPoolError)
        );
    }

    #[test]
    fn draw_many_yields_distinct_values_under_random_source() {
        let pool = Pool::new(["a", "b", "c", "d", "e"]);
        let mut source = RngSource::new(StdRng::seed_from_u64(7));
        for _ in 0..200 {
            let (drawn, remaining) = pool.draw_many(5, &mut source).unwrap();
            let unique: HashSet<_> = drawn.iter().collect();
            assert_eq!(unique.len(), 5);
            assert!(remaining.is_empty());
        }
    }

    #[test]
    fn sample_one_keeps_the_pool_intact() {
        let pool = letters();
        let mut source = ScriptedSource::new([3, 3]);
        assert_eq!(pool.sample_one(&mut source).unwrap(), "d");
        assert_eq!(pool.sample_one(&mut source).unwrap(), "d");
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn scripted_source_wraps_indices_and_cycles() {
        let mut source = ScriptedSource::new([5, 1]);
        assert_eq!(source.next_index(3), 2);
        assert_eq!(source.next_index(3), 1);
        assert_eq!(source.next_index(4), 1);
        assert_eq!(source.consumed(), 3);
    }

    #[test]
    fn without_filters_every_matching_slot() {
        let pool = Pool::new(["s1", "s2", "c1", "s1"]);
        let filtered = pool.without(["s1"]);
        assert_eq!(filtered.values(), ["s2", "c1"]);
    }
}
