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

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use telemeter::{Histogram, HistogramOpts, HistogramVec};

fn bench_histogram_observe(c: &mut Criterion) {
    let opts = HistogramOpts::new("bench_histogram", "bench histogram help");
    let histogram = Histogram::with_opts(opts).unwrap();
    c.bench_function("histogram_observe", |b| {
        b.iter(|| histogram.observe(black_box(750)))
    });
}

fn bench_histogram_vec_observe(c: &mut Criterion) {
    let vec = HistogramVec::new(
        HistogramOpts::new("bench_histogram_vec", "bench histogram vec help"),
        &["handler"],
    )
    .unwrap();
    c.bench_function("histogram_vec_observe", |b| {
        b.iter(|| vec.with_label_values(&["users"]).observe(black_box(750)))
    });
}

criterion_group!(benches, bench_histogram_observe, bench_histogram_vec_observe);
criterion_main!(benches);
