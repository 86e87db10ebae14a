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

use crate::atomic64::AtomicU64;
use crate::desc::Desc;
use crate::errors::{Error, Result};
use crate::metrics::{Collector, Metric, Opts};
use crate::snapshot::{MetricFamily, MetricType, Sample};
use crate::value::{Value, ValueType};
use crate::vec::{MetricVec, MetricVecBuilder};

/// A [`Metric`] that represents a single numerical value that only ever
/// goes up. The delta type is unsigned, so the reported value can never
/// decrease.
#[derive(Clone)]
pub struct Counter {
    v: Arc<Value<AtomicU64>>,
}

impl Counter {
    /// Create a [`Counter`] with the `name` and `help` arguments.
    pub fn new<S: Into<String>>(name: S, help: S) -> Result<Counter> {
        let opts = Opts::new(name, help);
        Counter::with_opts(opts)
    }

    /// Create a [`Counter`] with the `opts` options.
    pub fn with_opts(opts: Opts) -> Result<Counter> {
        if !opts.variable_labels.is_empty() {
            return Err(Error::VariableLabelsForbidden);
        }
        Counter::with_opts_and_label_values(&opts, &[])
    }

    pub(crate) fn with_opts_and_label_values(opts: &Opts, label_values: &[&str]) -> Result<Counter> {
        let v = Value::new(opts, ValueType::Counter, 0, label_values)?;
        Ok(Counter { v: Arc::new(v) })
    }

    /// Increase the counter by the given amount.
    #[inline]
    pub fn inc_by(&self, v: u64) {
        self.v.inc_by(v);
    }

    /// Increase the counter by 1.
    #[inline]
    pub fn inc(&self) {
        self.v.inc();
    }

    /// Return the counter value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.v.get()
    }
}

impl Collector for Counter {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.v.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        vec![self.v.collect()]
    }
}

impl Metric for Counter {
    fn metric(&self) -> Sample {
        self.v.metric()
    }
}

#[derive(Clone)]
pub struct CounterVecBuilder;

impl MetricVecBuilder for CounterVecBuilder {
    type M = Counter;
    type P = Opts;

    fn build(&self, opts: &Opts, vals: &[&str]) -> Result<Counter> {
        Counter::with_opts_and_label_values(opts, vals)
    }
}

/// A [`Collector`] that bundles a set of [`Counter`]s that all share the
/// same identity, but have different values for their variable labels. This
/// is used if you want to count the same thing partitioned by various
/// dimensions (e.g. number of HTTP requests, partitioned by response code
/// and method).
pub type CounterVec = MetricVec<CounterVecBuilder>;

impl CounterVec {
    /// Create a new [`CounterVec`] based on the provided [`Opts`] and
    /// partitioned by the given label names. At least one label name must be
    /// provided.
    pub fn new(opts: Opts, label_names: &[&str]) -> Result<CounterVec> {
        let variable_names = label_names.iter().map(|s| (*s).to_owned()).collect();
        let opts = opts.variable_labels(variable_names);
        MetricVec::create(MetricType::Counter, CounterVecBuilder, opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::SampleValue;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counter() {
        let opts = Opts::new("test", "test help")
            .const_label("a", "1")
            .const_label("b", "2");
        let counter = Counter::with_opts(opts).unwrap();
        counter.inc();
        assert_eq!(counter.get(), 1);
        counter.inc_by(42);
        assert_eq!(counter.get(), 43);

        let mut mfs = counter.collect();
        assert_eq!(mfs.len(), 1);

        let mf = mfs.pop().unwrap();
        let m = &mf.samples[0];
        assert_eq!(m.label_pairs.len(), 2);
        assert_eq!(m.value, SampleValue::Counter(43));
    }

    #[test]
    fn test_counter_variable_labels_forbidden() {
        let opts = Opts::new("test", "test help").variable_label("code");
        match Counter::with_opts(opts) {
            Err(Error::VariableLabelsForbidden) => {}
            other => panic!("expected VariableLabelsForbidden, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_counter_vec_with_labels() {
        let vec = CounterVec::new(
            Opts::new("test_counter_vec", "test counter vec help"),
            &["l1", "l2"],
        )
        .unwrap();

        let mut labels = HashMap::new();
        labels.insert("l1", "v1");
        labels.insert("l2", "v2");

        vec.with(&labels).inc();
        assert_eq!(vec.with(&labels).get(), 1);

        let mut wrong = HashMap::new();
        wrong.insert("l1", "v1");
        assert!(vec.get_metric_with(&wrong).is_err());
    }

    #[test]
    fn test_counter_vec_with_label_values() {
        let vec = CounterVec::new(Opts::new("foo", "bar"), &["l1", "l2"]).unwrap();

        vec.with_label_values(&["v1", "v3"]).inc();
        assert_eq!(vec.with_label_values(&["v1", "v3"]).get(), 1);

        vec.with_label_values(&["v1", "v2"]).inc_by(12);
        assert_eq!(vec.with_label_values(&["v1", "v3"]).get(), 1);
        assert_eq!(vec.with_label_values(&["v1", "v2"]).get(), 12);

        assert!(vec.get_metric_with_label_values(&["v1"]).is_err());
    }

    #[test]
    fn test_counter_concurrent_inc() {
        let counter = Arc::new(Counter::new("concurrent", "concurrent help").unwrap());
        let threads: u64 = 8;
        let per_thread: u64 = 1_000;

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..per_thread {
                        counter.inc();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counter.get(), threads * per_thread);
    }
}
