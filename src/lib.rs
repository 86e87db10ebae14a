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

/*!
An in-process metrics library.

Application code declares counters, gauges and histograms against a
[`Registry`], optionally partitioned by variable labels, and records
measurements on the returned handles at high frequency. The accumulated
state is consumed two ways: a scrape endpoint serves the Prometheus text
exposition produced by [`TextEncoder`] over [`Registry::gather`], and a
background push loop driven by [`PushController`] periodically projects
every metric into a pluggable [`Sink`].

```
use telemeter::{Opts, Registry};

let (registry, _controller) = Registry::new();
let requests = registry
    .new_counter(Opts::new("requests_total", "Total requests served."))
    .unwrap();
requests.inc();
assert_eq!(requests.get(), 1);
```

Metric and label names, and label values, are scrubbed into the Prometheus
character set before any identity comparison; a registry enforces that no
two metrics share an identity, that a name keeps a single label-name
schema, and that vectors own the label dimensions they declare.
*/

mod atomic64;
mod counter;
mod desc;
mod encoder;
mod errors;
mod gauge;
mod histogram;
#[macro_use]
mod macros;
mod metrics;
mod push;
mod registry;
mod scrub;
mod snapshot;
mod value;
mod vec;

pub use self::counter::{Counter, CounterVec};
pub use self::desc::{Desc, Describer};
pub use self::encoder::{Encoder, TextEncoder, TEXT_FORMAT};
pub use self::errors::{Error, Result};
pub use self::gauge::{Gauge, GaugeVec};
pub use self::histogram::{
    Histogram, HistogramOpts, HistogramTimer, HistogramVec, DEFAULT_BUCKETS, UNIT_MICROSECONDS,
    UNIT_MILLISECONDS, UNIT_NANOSECONDS, UNIT_NONE,
};
pub use self::metrics::{Collector, Metric, Opts};
pub use self::push::{PushController, PushHandle, Sink};
pub use self::registry::Registry;
pub use self::scrub::{scrub_label_value, scrub_name};
pub use self::snapshot::{
    Bucket, HistogramSnapshot, LabelPair, MetricFamily, MetricType, Sample, SampleValue,
};
pub use self::vec::{MetricVec, MetricVecBuilder};
