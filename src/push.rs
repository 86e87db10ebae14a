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

//! Periodic emission of metric state into a pluggable sink. One background
//! loop per registry at most; starting, stopping and restarting are cheap.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::errors::{Error, Result};
use crate::registry::Registry;
use crate::snapshot::{MetricFamily, Sample, SampleValue};

/// A `Sink` receives the projected state of every push-enabled metric once
/// per tick. `labels` carries the full scrubbed label set of the series,
/// constant and variable-label values alike. Counter and gauge values are
/// absolute; histogram buckets are the finite buckets with their own
/// (non-cumulative) counts, in increasing bound order.
///
/// Errors returned by a sink are swallowed by the loop; sinks own their own
/// retry policy.
pub trait Sink: Send {
    fn emit_counter(&mut self, name: &str, labels: &HashMap<String, String>, value: u64)
        -> Result<()>;

    fn emit_gauge(&mut self, name: &str, labels: &HashMap<String, String>, value: i64)
        -> Result<()>;

    fn emit_histogram(
        &mut self,
        name: &str,
        labels: &HashMap<String, String>,
        unit: f64,
        buckets: &[(i64, u64)],
    ) -> Result<()>;
}

/// `PushController` drives the single background push loop of a registry.
/// It is created alongside the registry by [`Registry::new`]; the two are
/// peers over the same state.
pub struct PushController {
    registry: Registry,
    running: Arc<AtomicBool>,
}

impl PushController {
    pub(crate) fn new(registry: Registry) -> PushController {
        PushController {
            registry,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `push` starts a background loop that projects the registry into
    /// `sink` immediately and then once every `interval`, skipping metrics
    /// registered with `disable_push`.
    ///
    /// At most one push loop may be active per registry; a second call
    /// while one is running returns [`Error::PushAlreadyRunning`] and
    /// starts nothing. After [`PushHandle::stop`] returns, `push` may be
    /// called again.
    pub fn push<S>(&self, sink: S, interval: Duration) -> Result<PushHandle>
    where
        S: Sink + 'static,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::PushAlreadyRunning);
        }

        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let registry = self.registry.clone();
        let running = Arc::clone(&self.running);
        let loop_stop = Arc::clone(&stop);

        let spawned = thread::Builder::new()
            .name("metrics-push".to_owned())
            .spawn(move || {
                let mut sink = sink;
                loop {
                    emit_tick(&registry, &mut sink);

                    let (lock, cvar) = &*loop_stop;
                    let mut stopped = lock.lock();
                    if *stopped {
                        break;
                    }
                    let _ = cvar.wait_for(&mut stopped, interval);
                    if *stopped {
                        break;
                    }
                }
                running.store(false, Ordering::SeqCst);
            });

        match spawned {
            Ok(thread) => Ok(PushHandle {
                stop,
                thread: Some(thread),
            }),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                Err(Error::Io(e))
            }
        }
    }
}

/// Handle to a running push loop. Stopping is idempotent and returns only
/// once the loop has observably ceased emission; dropping the handle stops
/// the loop as well.
pub struct PushHandle {
    stop: Arc<(Mutex<bool>, Condvar)>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PushHandle {
    /// `stop` terminates the loop, interrupting the sleep between ticks,
    /// and waits for the push thread to finish. At most one outstanding
    /// tick runs to completion.
    pub fn stop(&mut self) {
        {
            let (lock, cvar) = &*self.stop;
            let mut stopped = lock.lock();
            *stopped = true;
            cvar.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for PushHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn emit_tick<S: Sink>(registry: &Registry, sink: &mut S) {
    for family in registry.gather_pushable() {
        for sample in &family.samples {
            // Sink failures do not stop the loop; the next tick retries
            // from current state.
            let _ = emit_sample(sink, &family, sample);
        }
    }
}

fn emit_sample<S: Sink>(sink: &mut S, family: &MetricFamily, sample: &Sample) -> Result<()> {
    let labels: HashMap<String, String> = sample
        .label_pairs
        .iter()
        .map(|pair| (pair.name.clone(), pair.value.clone()))
        .collect();

    match &sample.value {
        SampleValue::Counter(v) => sink.emit_counter(&family.name, &labels, *v),
        SampleValue::Gauge(v) => sink.emit_gauge(&family.name, &labels, *v),
        SampleValue::Histogram(h) => {
            let buckets: Vec<(i64, u64)> = h
                .buckets
                .iter()
                .map(|b| (b.upper_bound, b.count))
                .collect();
            sink.emit_histogram(&family.name, &labels, h.unit, &buckets)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::HistogramOpts;
    use crate::metrics::Opts;
    use std::sync::Mutex as StdMutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Emitted {
        Counter(String, u64),
        Gauge(String, i64),
        Histogram(String, Vec<(i64, u64)>),
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        emitted: Arc<StdMutex<Vec<Emitted>>>,
        fail: bool,
    }

    impl Sink for RecordingSink {
        fn emit_counter(
            &mut self,
            name: &str,
            _labels: &HashMap<String, String>,
            value: u64,
        ) -> Result<()> {
            if self.fail {
                return Err(Error::Msg("sink down".to_owned()));
            }
            self.emitted
                .lock()
                .unwrap()
                .push(Emitted::Counter(name.to_owned(), value));
            Ok(())
        }

        fn emit_gauge(
            &mut self,
            name: &str,
            _labels: &HashMap<String, String>,
            value: i64,
        ) -> Result<()> {
            self.emitted
                .lock()
                .unwrap()
                .push(Emitted::Gauge(name.to_owned(), value));
            Ok(())
        }

        fn emit_histogram(
            &mut self,
            name: &str,
            _labels: &HashMap<String, String>,
            _unit: f64,
            buckets: &[(i64, u64)],
        ) -> Result<()> {
            self.emitted
                .lock()
                .unwrap()
                .push(Emitted::Histogram(name.to_owned(), buckets.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_push_emits_absolute_values() {
        let (r, controller) = Registry::new();
        let counter = r.new_counter(Opts::new("pushed_total", "test help")).unwrap();
        counter.inc_by(3);

        let sink = RecordingSink::default();
        let emitted = Arc::clone(&sink.emitted);

        let mut handle = controller
            .push(sink, Duration::from_secs(3600))
            .unwrap();
        // The initial projection happens right away; wait for it.
        for _ in 0..100 {
            if !emitted.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();

        let emitted = emitted.lock().unwrap();
        assert_eq!(emitted[0], Emitted::Counter("pushed_total".to_owned(), 3));
    }

    #[test]
    fn test_push_single_flight() {
        let (_, controller) = Registry::new();

        let first = RecordingSink::default();
        let second = RecordingSink::default();

        let mut handle = controller.push(first, Duration::from_secs(3600)).unwrap();
        match controller.push(second, Duration::from_secs(3600)) {
            Err(Error::PushAlreadyRunning) => {}
            other => panic!("expected PushAlreadyRunning, got {:?}", other.map(|_| ())),
        }

        // Stop is idempotent, and a new push is allowed afterwards.
        handle.stop();
        handle.stop();

        let third = RecordingSink::default();
        let mut handle = controller.push(third, Duration::from_secs(3600)).unwrap();
        handle.stop();
    }

    #[test]
    fn test_push_skips_disabled_metrics() {
        let (r, controller) = Registry::new();
        r.new_counter(Opts::new("visible_total", "test help"))
            .unwrap()
            .inc();
        r.new_counter(Opts::new("hidden_total", "test help").disable_push(true))
            .unwrap()
            .inc();

        let sink = RecordingSink::default();
        let emitted = Arc::clone(&sink.emitted);
        let mut handle = controller.push(sink, Duration::from_secs(3600)).unwrap();
        for _ in 0..100 {
            if !emitted.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();

        let emitted = emitted.lock().unwrap();
        assert!(emitted
            .iter()
            .all(|e| *e == Emitted::Counter("visible_total".to_owned(), 1)));
        assert!(!emitted.is_empty());
    }

    #[test]
    fn test_push_survives_sink_errors() {
        let (r, controller) = Registry::new();
        r.new_counter(Opts::new("failing_total", "test help"))
            .unwrap()
            .inc();
        let gauge = r.new_gauge(Opts::new("alive", "test help")).unwrap();
        gauge.set(1);

        let mut sink = RecordingSink::default();
        sink.fail = true; // counters error, gauges still record
        let emitted = Arc::clone(&sink.emitted);

        let mut handle = controller.push(sink, Duration::from_secs(3600)).unwrap();
        for _ in 0..100 {
            if !emitted.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();

        let emitted = emitted.lock().unwrap();
        assert!(emitted.contains(&Emitted::Gauge("alive".to_owned(), 1)));
    }

    #[test]
    fn test_push_histogram_buckets() {
        let (r, controller) = Registry::new();
        let histogram = r
            .new_histogram(
                HistogramOpts::new("latency", "test help").buckets(vec![1000, 60000]),
            )
            .unwrap();
        histogram.observe(1);

        let sink = RecordingSink::default();
        let emitted = Arc::clone(&sink.emitted);
        let mut handle = controller.push(sink, Duration::from_secs(3600)).unwrap();
        for _ in 0..100 {
            if !emitted.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        handle.stop();

        let emitted = emitted.lock().unwrap();
        assert_eq!(
            emitted[0],
            Emitted::Histogram("latency".to_owned(), vec![(1000, 1), (60000, 0)])
        );
    }

    #[test]
    fn test_push_stop_cycles_emit_only_initial_projections() {
        let (r, controller) = Registry::new();
        r.new_counter(Opts::new("idle_total", "test help"))
            .unwrap()
            .inc();

        let mut total = 0;
        for _ in 0..3 {
            let sink = RecordingSink::default();
            let emitted = Arc::clone(&sink.emitted);
            let mut handle = controller.push(sink, Duration::from_secs(3600)).unwrap();
            for _ in 0..100 {
                if !emitted.lock().unwrap().is_empty() {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
            handle.stop();
            total += emitted.lock().unwrap().len();
        }

        // One initial projection per start, nothing else: the interval is
        // far longer than the test.
        assert_eq!(total, 3);
    }
}
