// Copyright 2014 The Prometheus Authors
// Copyright 2016 PingCAP, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hasher;

use fnv::FnvHasher;

use crate::errors::{Error, Result};
use crate::metrics::SEPARATOR_BYTE;
use crate::scrub::{scrub_label_value, scrub_name};
use crate::snapshot::LabelPair;

/// The descriptor used by every metric managed by a registry. It is the
/// scrubbed, immutable form of a metric's identity: name, help, constant
/// label pairs and variable label names, plus the digests the registry
/// indexes by. Identity excludes the help string and constant-label values;
/// those are covered by `dim_hash` and `id` respectively.
#[derive(Clone, Debug)]
pub struct Desc {
    /// The metric name after scrubbing.
    pub name: String,
    /// help provides some helpful information about this metric.
    pub help: String,
    /// Constant label pairs, scrubbed and sorted by name.
    pub const_label_pairs: Vec<LabelPair>,
    /// Variable label names, scrubbed, in the positional order lookups use.
    pub variable_labels: Vec<String>,
    /// If set, the metric is visible to scrape but skipped by the push loop.
    pub push_disabled: bool,
    /// A hash of the name, constant label pairs (names and values) and
    /// sorted variable label names. Two registrations with equal `id`
    /// conflict outright.
    pub id: u64,
    /// A hash of the help string and the sorted set of all label names.
    /// All descriptors sharing a name must share `dim_hash`.
    pub dim_hash: u64,
}

impl Desc {
    /// Initialize a new descriptor from raw, unscrubbed options. Validation
    /// covers everything that can be decided without the registry: the name
    /// and help must be non-empty, no label name may be empty, and no two
    /// label names may collide after scrubbing.
    pub fn new(
        name: String,
        help: String,
        variable_labels: Vec<String>,
        const_labels: HashMap<String, String>,
        push_disabled: bool,
    ) -> Result<Desc> {
        if help.is_empty() {
            return Err(Error::Msg("empty help string".into()));
        }

        let scrubbed_name = scrub_name(&name);
        if scrubbed_name.is_empty() {
            return Err(Error::InvalidName(name));
        }

        let mut const_label_pairs = Vec::with_capacity(const_labels.len());
        for (n, v) in &const_labels {
            let ln = scrub_name(n);
            if ln.is_empty() {
                return Err(Error::InvalidLabel(n.clone()));
            }
            const_label_pairs.push(LabelPair {
                name: ln,
                value: scrub_label_value(v),
            });
        }
        const_label_pairs.sort();

        let mut scrubbed_variable_labels = Vec::with_capacity(variable_labels.len());
        for n in &variable_labels {
            let ln = scrub_name(n);
            if ln.is_empty() {
                return Err(Error::InvalidLabel(n.clone()));
            }
            scrubbed_variable_labels.push(ln);
        }

        // Constant and variable label names must be disjoint after
        // scrubbing, and unique within each set.
        let mut label_names = BTreeSet::new();
        for pair in &const_label_pairs {
            if !label_names.insert(pair.name.clone()) {
                return Err(Error::DuplicateLabelAfterScrub(pair.name.clone()));
            }
        }
        for ln in &scrubbed_variable_labels {
            if !label_names.insert(ln.clone()) {
                return Err(Error::DuplicateLabelAfterScrub(ln.clone()));
            }
        }

        let mut desc = Desc {
            name: scrubbed_name,
            help,
            const_label_pairs,
            variable_labels: scrubbed_variable_labels,
            push_disabled,
            id: 0,
            dim_hash: 0,
        };

        // id: name + constant name=value pairs + sorted variable names.
        // Scrubbed strings never contain the separator byte, so the double
        // separator unambiguously marks the section boundary.
        let mut h = FnvHasher::default();
        h.write(desc.name.as_bytes());
        for pair in &desc.const_label_pairs {
            h.write_u8(SEPARATOR_BYTE);
            h.write(pair.name.as_bytes());
            h.write_u8(SEPARATOR_BYTE);
            h.write(pair.value.as_bytes());
        }
        h.write_u8(SEPARATOR_BYTE);
        h.write_u8(SEPARATOR_BYTE);
        let mut sorted_variable_labels = desc.variable_labels.clone();
        sorted_variable_labels.sort();
        for ln in &sorted_variable_labels {
            h.write_u8(SEPARATOR_BYTE);
            h.write(ln.as_bytes());
        }
        desc.id = h.finish();

        // dim_hash: help + the sorted set of all label names. Folding help
        // in here pins the help string per name, alongside the schema.
        let mut h = FnvHasher::default();
        h.write(desc.help.as_bytes());
        for ln in &label_names {
            h.write_u8(SEPARATOR_BYTE);
            h.write(ln.as_bytes());
        }
        desc.dim_hash = h.finish();

        Ok(desc)
    }

    /// Whether this descriptor belongs to a vector metric.
    pub fn is_vector(&self) -> bool {
        !self.variable_labels.is_empty()
    }

    /// The sorted set of all label names, constant and variable.
    pub(crate) fn label_name_set(&self) -> BTreeSet<&str> {
        self.const_label_pairs
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.variable_labels.iter().map(|l| l.as_str()))
            .collect()
    }
}

/// An interface for describing a metric from its creation options.
pub trait Describer {
    /// Build a [`Desc`] after scrubbing every identifier involved.
    fn describe(&self) -> Result<Desc>;
}
