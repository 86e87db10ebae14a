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

//! A minimal scrape endpoint: every request is counted and timed, and the
//! response body is the registry's current text exposition.

use std::convert::Infallible;
use std::time::Instant;

use hyper::header::CONTENT_TYPE;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};

use telemeter::{
    labels, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder, UNIT_MILLISECONDS,
};

async fn serve_metrics(
    req: Request<Body>,
    registry: Registry,
    latency: HistogramVec,
) -> Result<Response<Body>, Infallible> {
    let start = Instant::now();
    let path = req.uri().path().to_owned();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer).unwrap();

    let elapsed_ms = start.elapsed().as_millis() as i64;
    latency.with_label_values(&[path.as_str()]).observe(elapsed_ms);

    Ok(Response::builder()
        .status(200)
        .header(CONTENT_TYPE, encoder.format_type())
        .body(Body::from(buffer))
        .unwrap())
}

#[tokio::main]
async fn main() {
    let (registry, _controller) = Registry::new();
    let app = registry
        .labeled(labels! {"service".to_owned() => "demo".to_owned(),})
        .unwrap();

    let requests = app
        .new_counter_vec(
            Opts::new("http_requests_total", "Number of HTTP requests received.")
                .variable_label("path"),
        )
        .unwrap();
    let latency = app
        .new_histogram_vec(
            HistogramOpts::new("http_request_duration", "HTTP request latency.")
                .unit(UNIT_MILLISECONDS)
                .variable_label("path"),
        )
        .unwrap();

    let addr = ([127, 0, 0, 1], 9898).into();
    let make_svc = make_service_fn(move |_conn| {
        let registry = registry.clone();
        let requests = requests.clone();
        let latency = latency.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                requests.with_label_values(&[req.uri().path()]).inc();
                serve_metrics(req, registry.clone(), latency.clone())
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_svc);
    println!("listening on http://{}", addr);
    if let Err(e) = server.await {
        eprintln!("server error: {}", e);
    }
}
