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

use crate::atomic64::{Atomic, Number};
use crate::desc::{Desc, Describer};
use crate::errors::{Error, Result};
use crate::scrub::scrub_label_value;
use crate::snapshot::{LabelPair, MetricFamily, MetricType, Sample, SampleValue};

/// `ValueType` is an enumeration of the single-value metric kinds,
/// [`Counter`](crate::Counter) and [`Gauge`](crate::Gauge).
pub enum ValueType {
    Counter,
    Gauge,
}

impl ValueType {
    /// `metric_type` returns the corresponding snapshot metric type.
    pub fn metric_type(&self) -> MetricType {
        match *self {
            ValueType::Counter => MetricType::Counter,
            ValueType::Gauge => MetricType::Gauge,
        }
    }
}

/// A generic single-value metric backing [`Counter`](crate::Counter) and
/// [`Gauge`](crate::Gauge). Its effective type is determined by `ValueType`.
pub struct Value<P: Atomic> {
    pub desc: Desc,
    pub val: P,
    pub val_type: ValueType,
    pub label_pairs: Vec<LabelPair>,
}

impl<P: Atomic> Value<P> {
    pub fn new<D: Describer>(
        describer: &D,
        val_type: ValueType,
        val: P::T,
        label_values: &[&str],
    ) -> Result<Self> {
        let desc = describer.describe()?;
        if desc.variable_labels.len() != label_values.len() {
            return Err(Error::LookupMismatch(format!(
                "expected {} label values, but got {}",
                desc.variable_labels.len(),
                label_values.len()
            )));
        }

        let label_pairs = make_label_pairs(&desc, label_values);

        Ok(Self {
            desc,
            val: P::new(val),
            val_type,
            label_pairs,
        })
    }

    #[inline]
    pub fn get(&self) -> P::T {
        self.val.get()
    }

    #[inline]
    pub fn set(&self, val: P::T) {
        self.val.set(val);
    }

    #[inline]
    pub fn inc_by(&self, val: P::T) {
        self.val.inc_by(val);
    }

    #[inline]
    pub fn inc(&self) {
        self.inc_by(P::T::from_i64(1));
    }

    #[inline]
    pub fn dec(&self) {
        self.dec_by(P::T::from_i64(1));
    }

    #[inline]
    pub fn dec_by(&self, val: P::T) {
        self.val.dec_by(val)
    }

    pub fn metric(&self) -> Sample {
        let val = self.get();
        let value = match self.val_type {
            ValueType::Counter => SampleValue::Counter(val.into_u64()),
            ValueType::Gauge => SampleValue::Gauge(val.into_i64()),
        };

        Sample {
            label_pairs: self.label_pairs.clone(),
            value,
        }
    }

    pub fn collect(&self) -> MetricFamily {
        MetricFamily {
            name: self.desc.name.clone(),
            help: self.desc.help.clone(),
            metric_type: self.val_type.metric_type(),
            samples: vec![self.metric()],
        }
    }
}

/// Build the full, sorted label set of one series out of its descriptor's
/// constant pairs and the supplied variable-label values. Values are
/// scrubbed here so every series key and every emitted label went through
/// the same normalization.
pub fn make_label_pairs(desc: &Desc, label_values: &[&str]) -> Vec<LabelPair> {
    let total_len = desc.variable_labels.len() + desc.const_label_pairs.len();
    if total_len == 0 {
        return vec![];
    }

    if desc.variable_labels.is_empty() {
        return desc.const_label_pairs.clone();
    }

    let mut label_pairs = Vec::with_capacity(total_len);
    for (i, n) in desc.variable_labels.iter().enumerate() {
        label_pairs.push(LabelPair {
            name: n.clone(),
            value: scrub_label_value(label_values[i]),
        });
    }

    for label_pair in &desc.const_label_pairs {
        label_pairs.push(label_pair.clone());
    }
    label_pairs.sort();
    label_pairs
}
