//! Iterator construction for KvStore

use crate::byte_array::VariableByteStore;
use crate::encoding::decode_record_id;
use crate::error::{Result, VbaError};
use crate::kv_iter::{Entry, Projection, RangeIterator, RangeSpec};

/// Options for [`KvStore::iterator`](super::KvStore::iterator)
///
/// Defaults: whole key space, `include_start = true`,
/// `include_stop = false`, keys and values, ascending.
#[derive(Debug, Clone)]
pub struct IterOptions {
    pub start: Option<Vec<u8>>,
    pub stop: Option<Vec<u8>>,
    pub prefix: Option<Vec<u8>>,
    pub include_start: bool,
    pub include_stop: bool,
    pub include_key: bool,
    pub include_value: bool,
    pub reverse: bool,
}

impl Default for IterOptions {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            prefix: None,
            include_start: true,
            include_stop: false,
            include_key: true,
            include_value: true,
            reverse: false,
        }
    }
}

impl IterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.start = Some(key.into());
        self
    }

    pub fn stop(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.stop = Some(key.into());
        self
    }

    pub fn prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn include_start(mut self, include: bool) -> Self {
        self.include_start = include;
        self
    }

    pub fn include_stop(mut self, include: bool) -> Self {
        self.include_stop = include;
        self
    }

    pub fn include_key(mut self, include: bool) -> Self {
        self.include_key = include;
        self
    }

    pub fn include_value(mut self, include: bool) -> Self {
        self.include_value = include;
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Split into scan bounds and projection
    pub(crate) fn into_parts(self) -> Result<(RangeSpec, Projection, bool)> {
        let projection = Projection::from_flags(self.include_key, self.include_value)?;
        let spec = match self.prefix {
            Some(_) if self.start.is_some() || self.stop.is_some() => {
                return Err(VbaError::InvalidOptions(
                    "prefix cannot be combined with start/stop".to_string(),
                ));
            }
            Some(prefix) => RangeSpec::Prefix(prefix),
            None => RangeSpec::Interval {
                start: self.start,
                stop: self.stop,
                include_start: self.include_start,
                include_stop: self.include_stop,
            },
        };
        Ok((spec, projection, self.reverse))
    }
}

/// Scan over a KvStore
///
/// In vba mode each value is a record pointer that gets resolved through the
/// byte store as it is handed out; keys pass through unchanged.
pub struct KvIterator<'a> {
    inner: RangeIterator<'a>,
    blobs: Option<&'a VariableByteStore>,
}

impl<'a> KvIterator<'a> {
    pub(crate) fn new(inner: RangeIterator<'a>, blobs: Option<&'a VariableByteStore>) -> Self {
        Self { inner, blobs }
    }

    pub fn has_next(&mut self) -> Result<bool> {
        self.inner.has_next()
    }

    pub fn get_next(&mut self) -> Result<Option<Entry>> {
        let entry = match self.inner.get_next()? {
            Some(entry) => entry,
            None => return Ok(None),
        };
        match self.blobs {
            Some(blobs) => entry
                .map_value(|pointer| blobs.select_id(decode_record_id(&pointer)?))
                .map(Some),
            None => Ok(Some(entry)),
        }
    }
}

impl Iterator for KvIterator<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}
