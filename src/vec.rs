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

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::Arc;

use fnv::FnvHasher;
use parking_lot::RwLock;

use crate::desc::{Desc, Describer};
use crate::errors::{Error, Result};
use crate::metrics::{Collector, Metric, SEPARATOR_BYTE};
use crate::scrub::scrub_label_value;
use crate::snapshot::{MetricFamily, MetricType};

/// An interface for building a child metric of a vector out of the vector's
/// options and a tuple of variable-label values.
pub trait MetricVecBuilder: Send + Sync + Clone {
    /// The kind of the child metric.
    type M: Metric;
    /// The kind of the options used to build the child metric.
    type P: Describer + Sync + Send + Clone;

    /// `build` builds a new child with the given options and scrubbed,
    /// positionally ordered label values.
    fn build(&self, opts: &Self::P, vals: &[&str]) -> Result<Self::M>;
}

pub(crate) struct MetricVecCore<T: MetricVecBuilder> {
    pub children: RwLock<HashMap<u64, T::M>>,
    pub desc: Desc,
    pub metric_type: MetricType,
    pub new_metric: T,
    pub opts: T::P,
}

impl<T: MetricVecBuilder> MetricVecCore<T> {
    pub fn collect(&self) -> MetricFamily {
        let children = self.children.read();
        MetricFamily {
            name: self.desc.name.clone(),
            help: self.desc.help.clone(),
            metric_type: self.metric_type,
            samples: children.values().map(|m| m.metric()).collect(),
        }
    }

    pub fn get_metric_with_label_values(&self, vals: &[&str]) -> Result<T::M> {
        let scrubbed = self.scrub_label_values(vals)?;
        let h = self.hash_label_values(&scrubbed);

        if let Some(metric) = self.children.read().get(&h).cloned() {
            return Ok(metric);
        }

        self.get_or_create_metric(h, &scrubbed)
    }

    pub fn get_metric_with(&self, labels: &HashMap<&str, &str>) -> Result<T::M> {
        let vals = self.label_values_by_name(labels)?;
        self.get_metric_with_label_values(&vals)
    }

    fn scrub_label_values(&self, vals: &[&str]) -> Result<Vec<String>> {
        if self.desc.variable_labels.len() != vals.len() {
            return Err(Error::LookupMismatch(format!(
                "expected {} label values, but got {}",
                self.desc.variable_labels.len(),
                vals.len()
            )));
        }

        Ok(vals.iter().map(|v| scrub_label_value(v)).collect())
    }

    /// Reorder a map of supplied labels into the declared positional order.
    /// The scrubbed keys must exactly equal the declared variable-label
    /// name set.
    fn label_values_by_name<'a>(&self, labels: &HashMap<&str, &'a str>) -> Result<Vec<&'a str>> {
        if self.desc.variable_labels.len() != labels.len() {
            return Err(Error::LookupMismatch(format!(
                "expected {} label values, but got {}",
                self.desc.variable_labels.len(),
                labels.len()
            )));
        }

        let scrubbed: HashMap<String, &str> = labels
            .iter()
            .map(|(k, v)| (crate::scrub::scrub_name(k), *v))
            .collect();
        if scrubbed.len() != labels.len() {
            return Err(Error::LookupMismatch(
                "label names collide after scrubbing".to_owned(),
            ));
        }

        let mut values = Vec::with_capacity(self.desc.variable_labels.len());
        for name in &self.desc.variable_labels {
            match scrubbed.get(name) {
                Some(value) => values.push(*value),
                None => {
                    return Err(Error::LookupMismatch(format!(
                        "label name {:?} missing in label map",
                        name
                    )))
                }
            }
        }
        Ok(values)
    }

    fn hash_label_values(&self, vals: &[String]) -> u64 {
        let mut h = FnvHasher::default();
        for val in vals {
            h.write(val.as_bytes());
            h.write_u8(SEPARATOR_BYTE);
        }
        h.finish()
    }

    fn get_or_create_metric(&self, hash: u64, scrubbed_vals: &[String]) -> Result<T::M> {
        let mut children = self.children.write();
        // Check again in case another thread created it in the meantime.
        if let Some(metric) = children.get(&hash).cloned() {
            return Ok(metric);
        }

        let vals: Vec<&str> = scrubbed_vals.iter().map(|v| v.as_str()).collect();
        let metric = self.new_metric.build(&self.opts, &vals)?;
        children.insert(hash, metric.clone());
        Ok(metric)
    }
}

/// A [`Collector`] that bundles a set of metrics sharing one identity but
/// differing in their variable-label values. Children materialize lazily on
/// first lookup and are never evicted.
pub struct MetricVec<T: MetricVecBuilder> {
    pub(crate) v: Arc<MetricVecCore<T>>,
}

impl<T: MetricVecBuilder> Clone for MetricVec<T> {
    fn clone(&self) -> Self {
        MetricVec {
            v: Arc::clone(&self.v),
        }
    }
}

impl<T: MetricVecBuilder> MetricVec<T> {
    /// `create` creates a MetricVec with description `desc`, a metric type
    /// `metric_type` and a MetricVecBuilder `new_metric`.
    pub fn create(metric_type: MetricType, new_metric: T, opts: T::P) -> Result<MetricVec<T>> {
        let desc = opts.describe()?;
        if desc.variable_labels.is_empty() {
            return Err(Error::VariableLabelsMissing);
        }

        let v = MetricVecCore {
            children: RwLock::new(HashMap::new()),
            desc,
            metric_type,
            new_metric,
            opts,
        };

        Ok(MetricVec { v: Arc::new(v) })
    }

    /// `get_metric_with_label_values` returns the child for the given
    /// scrubbed values, in the declared positional order, creating it on
    /// first use. An incorrect number of values is a `LookupMismatch`.
    pub fn get_metric_with_label_values(&self, vals: &[&str]) -> Result<T::M> {
        self.v.get_metric_with_label_values(vals)
    }

    /// `get_metric_with` returns the child identified by the label map,
    /// whose scrubbed keys must exactly equal the declared variable-label
    /// names, in any order.
    pub fn get_metric_with(&self, labels: &HashMap<&str, &str>) -> Result<T::M> {
        self.v.get_metric_with(labels)
    }

    /// `with_label_values` works as `get_metric_with_label_values`, but
    /// panics on mismatch.
    pub fn with_label_values(&self, vals: &[&str]) -> T::M {
        self.get_metric_with_label_values(vals).unwrap()
    }

    /// `with` works as `get_metric_with`, but panics on mismatch.
    pub fn with(&self, labels: &HashMap<&str, &str>) -> T::M {
        self.get_metric_with(labels).unwrap()
    }
}

impl<T: MetricVecBuilder> Collector for MetricVec<T> {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.v.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![self.v.collect()]
    }
}
