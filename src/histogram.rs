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
use std::sync::Arc;
use std::time::Instant;

use crate::atomic64::{Atomic, AtomicI64, AtomicU64};
use crate::desc::{Desc, Describer};
use crate::errors::{Error, Result};
use crate::metrics::{Collector, Metric, Opts};
use crate::snapshot::{Bucket, HistogramSnapshot, MetricFamily, MetricType, Sample, SampleValue};
use crate::value::make_label_pairs;
use crate::vec::{MetricVec, MetricVecBuilder};

/// The default [`Histogram`] buckets, tailored to broadly measure the
/// response time in milliseconds of a network service. Most likely, however,
/// you will be required to define buckets customized to your use case.
pub const DEFAULT_BUCKETS: &[i64; 11] = &[5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];

/// No scaling: observations are emitted as recorded.
pub const UNIT_NONE: f64 = 1.0;
/// Observations are milliseconds; emission scales them to seconds.
pub const UNIT_MILLISECONDS: f64 = 1e-3;
/// Observations are microseconds; emission scales them to seconds.
pub const UNIT_MICROSECONDS: f64 = 1e-6;
/// Observations are nanoseconds; emission scales them to seconds.
pub const UNIT_NANOSECONDS: f64 = 1e-9;

/// Used for the label that defines the upper bound of a bucket of a
/// histogram ("le" -> "less or equal").
pub const BUCKET_LABEL: &str = "le";

#[inline]
fn check_bucket_label(label: &str) -> Result<()> {
    if label == BUCKET_LABEL {
        return Err(Error::Msg(
            "`le` is not allowed as label name in histograms".to_owned(),
        ));
    }

    Ok(())
}

fn check_buckets(buckets: Vec<i64>) -> Result<Vec<i64>> {
    if buckets.is_empty() {
        return Ok(Vec::from(DEFAULT_BUCKETS as &'static [i64]));
    }

    for (i, upper_bound) in buckets.iter().enumerate() {
        if i < (buckets.len() - 1) && *upper_bound >= buckets[i + 1] {
            return Err(Error::BucketsNotMonotonic(*upper_bound, buckets[i + 1]));
        }
    }

    Ok(buckets)
}

/// A struct that bundles the options for creating a [`Histogram`] metric. It
/// is mandatory to set Name and Help to a non-empty string. All other fields
/// are optional and can safely be left at their zero value.
#[derive(Clone)]
pub struct HistogramOpts {
    pub common_opts: Opts,

    /// Defines the buckets into which observations are counted. Each element
    /// in the slice is the upper inclusive bound of a bucket, in the
    /// metric's native unit. The values must be sorted in strictly
    /// increasing order. The `+Inf` overflow bucket is implicit. The default
    /// value is [`DEFAULT_BUCKETS`].
    pub buckets: Vec<i64>,

    /// Scale factor applied to bounds and sum at emission time, for
    /// consumers that want floats (e.g. [`UNIT_MILLISECONDS`] for
    /// observations recorded in milliseconds). Observation and bucket
    /// selection always happen in the native unit.
    pub unit: f64,
}

impl HistogramOpts {
    /// Create a [`HistogramOpts`] with the `name` and `help` arguments.
    pub fn new<S: Into<String>>(name: S, help: S) -> HistogramOpts {
        HistogramOpts {
            common_opts: Opts::new(name, help),
            buckets: Vec::from(DEFAULT_BUCKETS as &'static [i64]),
            unit: UNIT_NONE,
        }
    }

    /// `const_labels` sets the const labels.
    pub fn const_labels(mut self, const_labels: HashMap<String, String>) -> Self {
        self.common_opts = self.common_opts.const_labels(const_labels);
        self
    }

    /// `const_label` adds a const label.
    pub fn const_label<S: Into<String>>(mut self, name: S, value: S) -> Self {
        self.common_opts = self.common_opts.const_label(name, value);
        self
    }

    /// `variable_labels` sets the variable labels.
    pub fn variable_labels(mut self, variable_labels: Vec<String>) -> Self {
        self.common_opts = self.common_opts.variable_labels(variable_labels);
        self
    }

    /// `variable_label` adds a variable label.
    pub fn variable_label<S: Into<String>>(mut self, name: S) -> Self {
        self.common_opts = self.common_opts.variable_label(name);
        self
    }

    /// `disable_push` hides the metric from the push loop.
    pub fn disable_push(mut self, disable: bool) -> Self {
        self.common_opts = self.common_opts.disable_push(disable);
        self
    }

    /// `buckets` sets the bucket upper bounds.
    pub fn buckets(mut self, buckets: Vec<i64>) -> Self {
        self.buckets = buckets;
        self
    }

    /// `unit` sets the emission scale factor.
    pub fn unit(mut self, unit: f64) -> Self {
        self.unit = unit;
        self
    }
}

impl Describer for HistogramOpts {
    fn describe(&self) -> Result<Desc> {
        self.common_opts.describe()
    }
}

impl From<Opts> for HistogramOpts {
    fn from(opts: Opts) -> HistogramOpts {
        HistogramOpts {
            common_opts: opts,
            buckets: Vec::from(DEFAULT_BUCKETS as &'static [i64]),
            unit: UNIT_NONE,
        }
    }
}

pub struct HistogramCore {
    desc: Desc,
    label_pairs: Vec<crate::snapshot::LabelPair>,

    sum: AtomicI64,
    count: AtomicU64,

    unit: f64,
    upper_bounds: Vec<i64>,
    counts: Vec<AtomicU64>,
    inf_count: AtomicU64,
}

impl HistogramCore {
    pub fn new(opts: &HistogramOpts, label_values: &[&str]) -> Result<HistogramCore> {
        let desc = opts.describe()?;

        for name in &desc.variable_labels {
            check_bucket_label(name)?;
        }
        for pair in &desc.const_label_pairs {
            check_bucket_label(&pair.name)?;
        }
        if desc.variable_labels.len() != label_values.len() {
            return Err(Error::LookupMismatch(format!(
                "expected {} label values, but got {}",
                desc.variable_labels.len(),
                label_values.len()
            )));
        }
        let label_pairs = make_label_pairs(&desc, label_values);

        let upper_bounds = check_buckets(opts.buckets.clone())?;

        let mut counts = Vec::with_capacity(upper_bounds.len());
        for _ in 0..upper_bounds.len() {
            counts.push(AtomicU64::new(0));
        }

        Ok(HistogramCore {
            desc,
            label_pairs,
            sum: AtomicI64::new(0),
            count: AtomicU64::new(0),
            unit: opts.unit,
            upper_bounds,
            counts,
            inf_count: AtomicU64::new(0),
        })
    }

    pub fn observe(&self, v: i64) {
        // Negative observations are dropped unless the bucket layout itself
        // extends below zero.
        if v < 0 && self.upper_bounds.first().map_or(true, |b| *b >= 0) {
            return;
        }

        // The lowest bucket whose upper bound covers the observation wins;
        // anything above the last finite bound lands in the +Inf bucket.
        let mut iter = self
            .upper_bounds
            .iter()
            .enumerate()
            .filter(|&(_, b)| v <= *b);
        if let Some((i, _)) = iter.next() {
            self.counts[i].inc_by(1);
        } else {
            self.inf_count.inc_by(1);
        }

        self.count.inc_by(1);
        self.sum.inc_by(v);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let buckets = self
            .upper_bounds
            .iter()
            .zip(self.counts.iter())
            .map(|(upper_bound, count)| Bucket {
                upper_bound: *upper_bound,
                count: count.get(),
            })
            .collect();

        HistogramSnapshot {
            sample_count: self.count.get(),
            sample_sum: self.sum.get(),
            unit: self.unit,
            buckets,
            inf_count: self.inf_count.get(),
        }
    }
}

/// A struct that represents an event being timed in the histogram's native
/// unit. When the timer goes out of scope, the duration is observed, or call
/// `observe_duration` to observe manually.
///
/// NOTICE: A timer can be observed only once (automatically or manually).
#[must_use = "Timer should be kept in a variable otherwise it cannot observe duration"]
pub struct HistogramTimer {
    histogram: Histogram,
    start: Instant,
}

impl HistogramTimer {
    fn new(histogram: Histogram) -> HistogramTimer {
        HistogramTimer {
            histogram,
            start: Instant::now(),
        }
    }

    /// `observe_duration` observes the amount of time since
    /// `Histogram::start_timer` was called.
    pub fn observe_duration(self) {
        drop(self);
    }

    fn observe(&mut self) {
        let unit = self.histogram.core.unit;
        let v = self.start.elapsed().as_secs_f64() / unit;
        self.histogram.observe(v as i64)
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.observe();
    }
}

/// A [`Metric`] that counts individual observations from an event or sample
/// stream in configurable, pre-declared buckets, along with a sum and a
/// total count of observations.
///
/// On the Prometheus server, quantiles can be calculated from a
/// [`Histogram`] using the `histogram_quantile` function in the query
/// language.
#[derive(Clone)]
pub struct Histogram {
    core: Arc<HistogramCore>,
}

impl Histogram {
    /// `with_opts` creates a [`Histogram`] with the `opts` options.
    pub fn with_opts(opts: HistogramOpts) -> Result<Histogram> {
        if !opts.common_opts.variable_labels.is_empty() {
            return Err(Error::VariableLabelsForbidden);
        }
        Histogram::with_opts_and_label_values(&opts, &[])
    }

    fn with_opts_and_label_values(opts: &HistogramOpts, label_values: &[&str]) -> Result<Histogram> {
        let core = HistogramCore::new(opts, label_values)?;

        Ok(Histogram {
            core: Arc::new(core),
        })
    }

    /// Add a single observation, in the metric's native unit, to the
    /// [`Histogram`].
    pub fn observe(&self, v: i64) {
        self.core.observe(v)
    }

    /// Return a [`HistogramTimer`] to track a duration in the metric's
    /// native unit.
    pub fn start_timer(&self) -> HistogramTimer {
        HistogramTimer::new(self.clone())
    }

    /// Return the current number of observations.
    pub fn get_sample_count(&self) -> u64 {
        self.core.count.get()
    }

    /// Return the current sum of observed values.
    pub fn get_sample_sum(&self) -> i64 {
        self.core.sum.get()
    }
}

impl Metric for Histogram {
    fn metric(&self) -> Sample {
        Sample {
            label_pairs: self.core.label_pairs.clone(),
            value: SampleValue::Histogram(self.core.snapshot()),
        }
    }
}

impl Collector for Histogram {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.core.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![MetricFamily {
            name: self.core.desc.name.clone(),
            help: self.core.desc.help.clone(),
            metric_type: MetricType::Histogram,
            samples: vec![self.metric()],
        }]
    }
}

#[derive(Clone)]
pub struct HistogramVecBuilder;

impl MetricVecBuilder for HistogramVecBuilder {
    type M = Histogram;
    type P = HistogramOpts;

    fn build(&self, opts: &HistogramOpts, vals: &[&str]) -> Result<Histogram> {
        Histogram::with_opts_and_label_values(opts, vals)
    }
}

/// A [`Collector`] that bundles a set of [`Histogram`]s that all share the
/// same identity, but have different values for their variable labels.
pub type HistogramVec = MetricVec<HistogramVecBuilder>;

impl HistogramVec {
    /// Create a new [`HistogramVec`] based on the provided [`HistogramOpts`]
    /// and partitioned by the given label names. At least one label name
    /// must be provided.
    pub fn new(opts: HistogramOpts, label_names: &[&str]) -> Result<HistogramVec> {
        for name in label_names {
            check_bucket_label(name)?;
        }
        for name in opts.common_opts.const_labels.keys() {
            check_bucket_label(name)?;
        }
        let buckets = check_buckets(opts.buckets.clone())?;
        let variable_names = label_names.iter().map(|s| (*s).to_owned()).collect();
        let opts = opts.variable_labels(variable_names).buckets(buckets);
        MetricVec::create(MetricType::Histogram, HistogramVecBuilder, opts)
    }
}
