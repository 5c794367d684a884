//! Range iteration over an ordered map engine
//!
//! [`RangeIterator`] turns an engine cursor into a pull-based scan with
//! independent start/stop inclusion, prefix scans and key/value projection.
//! The engine is always asked for the closed interval `[start, stop]`;
//! boundary exclusion happens here, so every open/closed combination behaves
//! the same whatever the engine's own convention.

use std::ops::Bound;

use crate::engine::{Cursor, OrderedMap};
use crate::error::{Result, VbaError};

/// Which keys a scan covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSpec {
    /// Keys between two optional bounds
    Interval {
        start: Option<Vec<u8>>,
        stop: Option<Vec<u8>>,
        include_start: bool,
        include_stop: bool,
    },
    /// Keys beginning with the given bytes
    Prefix(Vec<u8>),
}

impl RangeSpec {
    /// The usual half-open interval `[start, stop)`
    pub fn half_open(start: Option<Vec<u8>>, stop: Option<Vec<u8>>) -> Self {
        RangeSpec::Interval {
            start,
            stop,
            include_start: true,
            include_stop: false,
        }
    }

    /// Every key
    pub fn all() -> Self {
        Self::half_open(None, None)
    }

    /// Bounds to request from the engine
    fn engine_bounds(&self) -> (Bound<&[u8]>, Bound<Vec<u8>>) {
        match self {
            RangeSpec::Interval { start, stop, .. } => (
                start.as_deref().map_or(Bound::Unbounded, Bound::Included),
                stop.clone().map_or(Bound::Unbounded, Bound::Included),
            ),
            RangeSpec::Prefix(prefix) => (
                Bound::Included(prefix.as_slice()),
                closure_key(prefix).map_or(Bound::Unbounded, Bound::Excluded),
            ),
        }
    }

    /// Whether a key produced by the engine belongs to the scan
    fn accepts(&self, key: &[u8]) -> bool {
        match self {
            RangeSpec::Interval {
                start,
                stop,
                include_start,
                include_stop,
            } => {
                let after_start = match start.as_deref() {
                    Some(s) if *include_start => key >= s,
                    Some(s) => key > s,
                    None => true,
                };
                let before_stop = match stop.as_deref() {
                    Some(s) if *include_stop => key <= s,
                    Some(s) => key < s,
                    None => true,
                };
                after_start && before_stop
            }
            // Guards against cursors that overshoot the closure key
            RangeSpec::Prefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// Parts of each entry a scan returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    KeyValue,
    Key,
    Value,
}

impl Projection {
    /// Build from include flags; at least one must be set
    pub fn from_flags(include_key: bool, include_value: bool) -> Result<Self> {
        match (include_key, include_value) {
            (true, true) => Ok(Projection::KeyValue),
            (true, false) => Ok(Projection::Key),
            (false, true) => Ok(Projection::Value),
            (false, false) => Err(VbaError::InvalidOptions(
                "iterator must include the key, the value, or both".to_string(),
            )),
        }
    }

    fn project(self, key: Vec<u8>, value: Vec<u8>) -> Entry {
        match self {
            Projection::KeyValue => Entry::Pair(key, value),
            Projection::Key => Entry::Key(key),
            Projection::Value => Entry::Value(value),
        }
    }
}

/// One projected scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Pair(Vec<u8>, Vec<u8>),
    Key(Vec<u8>),
    Value(Vec<u8>),
}

impl Entry {
    pub fn key(&self) -> Option<&[u8]> {
        match self {
            Entry::Pair(k, _) | Entry::Key(k) => Some(k),
            Entry::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Entry::Pair(_, v) | Entry::Value(v) => Some(v),
            Entry::Key(_) => None,
        }
    }

    /// Replace the value part, leaving the key untouched
    pub fn map_value<F>(self, f: F) -> Result<Entry>
    where
        F: FnOnce(Vec<u8>) -> Result<Vec<u8>>,
    {
        Ok(match self {
            Entry::Pair(k, v) => Entry::Pair(k, f(v)?),
            Entry::Value(v) => Entry::Value(f(v)?),
            key_only @ Entry::Key(_) => key_only,
        })
    }
}

/// Smallest key greater than every key starting with `prefix`
///
/// Increments the last byte below `0xFF` after dropping trailing `0xFF`s.
/// `None` when no such key exists (empty or all-`0xFF` prefix).
pub fn closure_key(prefix: &[u8]) -> Option<Vec<u8>> {
    let keep = prefix.iter().rposition(|&b| b != 0xFF)?;
    let mut closure = prefix[..=keep].to_vec();
    closure[keep] += 1;
    Some(closure)
}

/// Pull-based, restart-free scan over an engine
///
/// `has_next` buffers one entry; `get_next` hands it out. Once the engine
/// cursor is exhausted (or fails) the iterator stays finished.
pub struct RangeIterator<'a> {
    cursor: Cursor<'a>,
    spec: RangeSpec,
    projection: Projection,
    reverse: bool,
    cur_kv: Option<Entry>,
    iter_finish: bool,
}

impl<'a> RangeIterator<'a> {
    pub fn new<E: OrderedMap + ?Sized>(
        engine: &'a E,
        spec: RangeSpec,
        projection: Projection,
        reverse: bool,
    ) -> Result<Self> {
        let cursor = {
            let (lower, upper) = spec.engine_bounds();
            let upper = match &upper {
                Bound::Included(k) => Bound::Included(k.as_slice()),
                Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
                Bound::Unbounded => Bound::Unbounded,
            };
            engine.range(lower, upper, reverse)?
        };
        Ok(Self {
            cursor,
            spec,
            projection,
            reverse,
            cur_kv: None,
            iter_finish: false,
        })
    }

    /// Whether another entry is available; buffers it without consuming
    pub fn has_next(&mut self) -> Result<bool> {
        if self.cur_kv.is_some() {
            return Ok(true);
        }
        if self.iter_finish {
            return Ok(false);
        }

        loop {
            match self.cursor.next() {
                None => {
                    self.iter_finish = true;
                    return Ok(false);
                }
                Some(Err(e)) => {
                    self.iter_finish = true;
                    return Err(e);
                }
                Some(Ok((key, value))) => {
                    if self.spec.accepts(&key) {
                        self.cur_kv = Some(self.projection.project(key, value));
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// Take the buffered entry, or `None` when the scan is done
    pub fn get_next(&mut self) -> Result<Option<Entry>> {
        if !self.has_next()? {
            return Ok(None);
        }
        Ok(self.cur_kv.take())
    }

    pub fn spec(&self) -> &RangeSpec {
        &self.spec
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn is_reverse(&self) -> bool {
        self.reverse
    }
}

impl Iterator for RangeIterator<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}
