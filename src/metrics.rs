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

use crate::desc::{Desc, Describer};
use crate::errors::Result;
use crate::snapshot::{MetricFamily, Sample};

pub const SEPARATOR_BYTE: u8 = 0xFF;

/// `Collector` is the trait implemented by anything a registry can own and
/// project into snapshots. All metrics built by this library implement it;
/// custom collectors may be registered as well.
pub trait Collector: Sync + Send {
    /// `desc` returns the descriptors for the metrics this collector owns.
    fn desc(&self) -> Vec<&Desc>;

    /// `collect` captures the current state as snapshot families.
    fn collect(&self) -> Vec<MetricFamily>;
}

/// `Metric` is the trait that models a single sample value with its full
/// label set.
pub trait Metric: Sync + Send + Clone {
    /// `metric` captures this series as a snapshot sample.
    fn metric(&self) -> Sample;
}

/// `Opts` bundles the options for creating most metric types.
#[derive(Debug, Clone)]
pub struct Opts {
    /// The metric name. Scrubbed before use; must be non-empty after
    /// scrubbing.
    pub name: String,

    /// help provides information about this metric. Mandatory!
    ///
    /// It is not part of the metric's identity, but metrics sharing a name
    /// must share the same help string.
    pub help: String,

    /// const_labels are used to attach fixed labels to this metric. Both
    /// names and values are scrubbed.
    ///
    /// Labels whose values vary over the process lifetime belong on a
    /// vector metric instead; constant labels are for things like the
    /// service name or the revision of the running binary.
    pub const_labels: HashMap<String, String>,

    /// variable_labels contains names of labels for which the metric
    /// maintains variable values. Only vector constructors accept them; the
    /// order given here defines the positional meaning of values on lookup.
    pub variable_labels: Vec<String>,

    /// If set, the metric is visible to scrape but invisible to the push
    /// loop.
    pub disable_push: bool,
}

impl Opts {
    /// `new` creates the Opts with the `name` and `help` arguments.
    pub fn new<S: Into<String>>(name: S, help: S) -> Opts {
        Opts {
            name: name.into(),
            help: help.into(),
            const_labels: HashMap::new(),
            variable_labels: Vec::new(),
            disable_push: false,
        }
    }

    /// `const_labels` sets the const labels.
    pub fn const_labels(mut self, const_labels: HashMap<String, String>) -> Self {
        self.const_labels = const_labels;
        self
    }

    /// `const_label` adds a const label.
    pub fn const_label<S: Into<String>>(mut self, name: S, value: S) -> Self {
        self.const_labels.insert(name.into(), value.into());
        self
    }

    /// `variable_labels` sets the variable labels.
    pub fn variable_labels(mut self, variable_labels: Vec<String>) -> Self {
        self.variable_labels = variable_labels;
        self
    }

    /// `variable_label` adds a variable label.
    pub fn variable_label<S: Into<String>>(mut self, name: S) -> Self {
        self.variable_labels.push(name.into());
        self
    }

    /// `disable_push` hides the metric from the push loop.
    pub fn disable_push(mut self, disable: bool) -> Self {
        self.disable_push = disable;
        self
    }
}

impl Describer for Opts {
    fn describe(&self) -> Result<Desc> {
        Desc::new(
            self.name.clone(),
            self.help.clone(),
            self.variable_labels.clone(),
            self.const_labels.clone(),
            self.disable_push,
        )
    }
}
