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

//! Snapshot form of metric state, produced by [`Registry::gather`] and
//! consumed by the text encoder and the push loop. A snapshot is
//! per-metric-consistent but not atomic across metrics.
//!
//! [`Registry::gather`]: crate::Registry::gather

use std::cmp::Ordering;

/// The kind of a metric family, used to dispatch emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    /// The `# TYPE` keyword of the text exposition format.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
        }
    }
}

/// A scrubbed label name/value pair. Pairs order by name so that a sorted
/// pair list yields the alphabetical label ordering the exposition format
/// requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

impl LabelPair {
    pub fn new<S: Into<String>>(name: S, value: S) -> LabelPair {
        LabelPair {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Ord for LabelPair {
    fn cmp(&self, other: &LabelPair) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl PartialOrd for LabelPair {
    fn partial_cmp(&self, other: &LabelPair) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One finite histogram bucket: its upper bound in the metric's native unit
/// and its own (non-cumulative) observation count. The cumulative form the
/// exposition format wants is computed while encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub upper_bound: i64,
    pub count: u64,
}

/// The captured state of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    /// Total number of observations, including `+Inf` overflows.
    pub sample_count: u64,
    /// Sum of all observed values in the native unit.
    pub sample_sum: i64,
    /// Scale factor applied to bounds and sum at emission time.
    pub unit: f64,
    /// Finite buckets in increasing bound order.
    pub buckets: Vec<Bucket>,
    /// Observations above the last finite bound.
    pub inf_count: u64,
}

/// The value captured for one series.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    Counter(u64),
    Gauge(i64),
    Histogram(HistogramSnapshot),
}

/// One series: its full label set (constant plus variable-label values,
/// sorted by name) and its captured value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub label_pairs: Vec<LabelPair>,
    pub value: SampleValue,
}

/// All series sharing one metric identity, with the immutable metadata the
/// exposition header lines need.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    pub help: String,
    pub metric_type: MetricType,
    pub samples: Vec<Sample>,
}

impl MetricFamily {
    /// Sort samples lexicographically by their label values so that scrapes
    /// of identical state are byte-identical.
    pub(crate) fn sort_samples(&mut self) {
        self.samples.sort_by(|s1, s2| {
            let lps1 = &s1.label_pairs;
            let lps2 = &s2.label_pairs;
            if lps1.len() != lps2.len() {
                // Inconsistent label sets should not appear within one
                // family; still give a reproducible order.
                return lps1.len().cmp(&lps2.len());
            }
            for (lp1, lp2) in lps1.iter().zip(lps2.iter()) {
                if lp1.value != lp2.value {
                    return lp1.value.cmp(&lp2.value);
                }
            }
            Ordering::Equal
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(values: &[(&str, &str)]) -> Sample {
        Sample {
            label_pairs: values
                .iter()
                .map(|(n, v)| LabelPair::new(*n, *v))
                .collect(),
            value: SampleValue::Counter(1),
        }
    }

    #[test]
    fn test_label_pair_cmp() {
        let tbl = vec![
            ("k1", "k2", Ordering::Less),
            ("k1", "k1", Ordering::Equal),
            ("k1", "k0", Ordering::Greater),
        ];
        for (l1, l2, order) in tbl {
            let lhs = LabelPair::new(l1, l1);
            let rhs = LabelPair::new(l2, l2);
            assert_eq!(lhs.cmp(&rhs), order);
        }
    }

    #[test]
    fn test_sort_samples() {
        let mut mf = MetricFamily {
            name: "test".to_owned(),
            help: "test help".to_owned(),
            metric_type: MetricType::Counter,
            samples: vec![
                sample(&[("a", "2"), ("b", "x")]),
                sample(&[("a", "1"), ("b", "y")]),
                sample(&[("a", "1"), ("b", "x")]),
            ],
        };
        mf.sort_samples();
        let firsts: Vec<_> = mf
            .samples
            .iter()
            .map(|s| {
                (
                    s.label_pairs[0].value.as_str(),
                    s.label_pairs[1].value.as_str(),
                )
            })
            .collect();
        assert_eq!(firsts, vec![("1", "x"), ("1", "y"), ("2", "x")]);
    }
}
