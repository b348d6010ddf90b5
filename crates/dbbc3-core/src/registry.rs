//! Version-floor registry.
//!
//! Command grammars, telemetry layouts, and validation rule sets all change
//! at specific firmware releases and then stay valid until the next
//! breaking release. A [`FloorRegistry`] stores one entry per
//! `(mode, minimum version)` and resolves an actual [`ModeVersion`] to the
//! entry with the greatest minimum version not exceeding it.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::version::{Mode, ModeVersion};

/// Registry of values keyed by mode and minimum version.
#[derive(Debug, Clone)]
pub struct FloorRegistry<T> {
    entries: BTreeMap<ModeVersion, T>,
}

impl<T> FloorRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register `value` for `mode` starting at `min_version`.
    ///
    /// Each `(mode, min_version)` may be registered once.
    pub fn register(&mut self, mode: Mode, min_version: u32, value: T) -> Result<()> {
        let key = ModeVersion::new(mode, min_version);
        if self.entries.contains_key(&key) {
            return Err(Error::InvalidParameter(format!(
                "registry already has an entry for {key}"
            )));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Select the entry with the greatest floor `<= actual.version` for
    /// `actual.mode`. Returns the matched floor with the value.
    pub fn resolve(&self, actual: ModeVersion) -> Result<(ModeVersion, &T)> {
        let lowest = ModeVersion::new(actual.mode, 0);
        self.entries
            .range(lowest..=actual)
            .next_back()
            .map(|(floor, value)| (*floor, value))
            .ok_or_else(|| Error::UnsupportedVersion {
                mode: actual.mode.to_string(),
                version: actual.version,
            })
    }

    /// All registered floors, in ascending order.
    pub fn floors(&self) -> impl Iterator<Item = ModeVersion> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for FloorRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
