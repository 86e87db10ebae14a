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

//! Drives the push controller against a sink that prints every emission,
//! while a worker records measurements.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use telemeter::{HistogramOpts, Opts, Registry, Result, Sink, UNIT_MILLISECONDS};

struct StdoutSink;

impl Sink for StdoutSink {
    fn emit_counter(
        &mut self,
        name: &str,
        labels: &HashMap<String, String>,
        value: u64,
    ) -> Result<()> {
        println!("counter   {} {:?} = {}", name, labels, value);
        Ok(())
    }

    fn emit_gauge(
        &mut self,
        name: &str,
        labels: &HashMap<String, String>,
        value: i64,
    ) -> Result<()> {
        println!("gauge     {} {:?} = {}", name, labels, value);
        Ok(())
    }

    fn emit_histogram(
        &mut self,
        name: &str,
        labels: &HashMap<String, String>,
        unit: f64,
        buckets: &[(i64, u64)],
    ) -> Result<()> {
        println!("histogram {} {:?} unit={} {:?}", name, labels, unit, buckets);
        Ok(())
    }
}

fn main() {
    let (registry, controller) = Registry::new();

    let jobs = registry
        .new_counter(Opts::new("jobs_total", "Jobs processed."))
        .unwrap();
    let queue_depth = registry
        .new_gauge(Opts::new("queue_depth", "Jobs currently queued."))
        .unwrap();
    let latency = registry
        .new_histogram(
            HistogramOpts::new("job_duration", "Job latency.")
                .buckets(vec![10, 100, 1000])
                .unit(UNIT_MILLISECONDS),
        )
        .unwrap();

    let mut handle = controller
        .push(StdoutSink, Duration::from_secs(1))
        .unwrap();

    for i in 0..10i64 {
        jobs.inc();
        queue_depth.set(10 - i);
        latency.observe(i * 25);
        thread::sleep(Duration::from_millis(400));
    }

    handle.stop();
}
