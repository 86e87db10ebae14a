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

use std::sync::Arc;

use crate::atomic64::AtomicI64;
use crate::desc::Desc;
use crate::errors::{Error, Result};
use crate::metrics::{Collector, Metric, Opts};
use crate::snapshot::{MetricFamily, MetricType, Sample};
use crate::value::{Value, ValueType};
use crate::vec::{MetricVec, MetricVecBuilder};

/// A [`Metric`] that represents a single signed value that can arbitrarily
/// go up and down.
#[derive(Clone)]
pub struct Gauge {
    v: Arc<Value<AtomicI64>>,
}

impl Gauge {
    /// Create a [`Gauge`] with the `name` and `help` arguments.
    pub fn new<S: Into<String>>(name: S, help: S) -> Result<Gauge> {
        let opts = Opts::new(name, help);
        Gauge::with_opts(opts)
    }

    /// Create a [`Gauge`] with the `opts` options.
    pub fn with_opts(opts: Opts) -> Result<Gauge> {
        if !opts.variable_labels.is_empty() {
            return Err(Error::VariableLabelsForbidden);
        }
        Gauge::with_opts_and_label_values(&opts, &[])
    }

    pub(crate) fn with_opts_and_label_values(opts: &Opts, label_values: &[&str]) -> Result<Gauge> {
        let v = Value::new(opts, ValueType::Gauge, 0, label_values)?;
        Ok(Gauge { v: Arc::new(v) })
    }

    /// Set the gauge to the given value.
    #[inline]
    pub fn set(&self, v: i64) {
        self.v.set(v);
    }

    /// Increase the gauge by 1.
    #[inline]
    pub fn inc(&self) {
        self.v.inc();
    }

    /// Decrease the gauge by 1.
    #[inline]
    pub fn dec(&self) {
        self.v.dec();
    }

    /// Add the given signed value to the gauge.
    #[inline]
    pub fn add(&self, v: i64) {
        self.v.inc_by(v);
    }

    /// Subtract the given value from the gauge.
    #[inline]
    pub fn sub(&self, v: i64) {
        self.v.dec_by(v);
    }

    /// Return the gauge value.
    #[inline]
    pub fn get(&self) -> i64 {
        self.v.get()
    }
}

impl Collector for Gauge {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.v.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![self.v.collect()]
    }
}

impl Metric for Gauge {
    fn metric(&self) -> Sample {
        self.v.metric()
    }
}

#[derive(Clone)]
pub struct GaugeVecBuilder;

impl MetricVecBuilder for GaugeVecBuilder {
    type M = Gauge;
    type P = Opts;

    fn build(&self, opts: &Opts, vals: &[&str]) -> Result<Gauge> {
        Gauge::with_opts_and_label_values(opts, vals)
    }
}

/// A [`Collector`] that bundles a set of [`Gauge`]s that all share the same
/// identity, but have different values for their variable labels.
pub type GaugeVec = MetricVec<GaugeVecBuilder>;

impl GaugeVec {
    /// Create a new [`GaugeVec`] based on the provided [`Opts`] and
    /// partitioned by the given label names. At least one label name must be
    /// provided.
    pub fn new(opts: Opts, label_names: &[&str]) -> Result<GaugeVec> {
        let variable_names = label_names.iter().map(|s| (*s).to_owned()).collect();
        let opts = opts.variable_labels(variable_names);
        MetricVec::create(MetricType::Gauge, GaugeVecBuilder, opts)
    }
}
