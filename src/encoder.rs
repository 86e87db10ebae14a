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

use std::borrow::Cow;
use std::io::Write;

use memchr::{memchr2, memchr3};

use crate::errors::{Error, Result};
use crate::histogram::BUCKET_LABEL;
use crate::snapshot::{HistogramSnapshot, LabelPair, MetricFamily, SampleValue};

pub trait Encoder {
    /// `encode` converts a slice of MetricFamily snapshots into the target
    /// format and writes the resulting lines to `writer`.
    fn encode(&self, mfs: &[MetricFamily], writer: &mut dyn Write) -> Result<()>;

    /// `format_type` returns target format.
    fn format_type(&self) -> &str;
}

pub type Format = &'static str;

pub const TEXT_FORMAT: Format = "text/plain; version=0.0.4";

/// Implementation of an [`Encoder`] that converts [`MetricFamily`]
/// snapshots into the Prometheus text exposition format. Given identical
/// snapshots, the output is byte-identical across invocations.
#[derive(Debug, Default)]
pub struct TextEncoder;

impl TextEncoder {
    pub fn new() -> TextEncoder {
        TextEncoder
    }
}

impl Encoder for TextEncoder {
    fn encode(&self, mfs: &[MetricFamily], writer: &mut dyn Write) -> Result<()> {
        for mf in mfs {
            if mf.samples.is_empty() {
                return Err(Error::Msg("MetricFamily has no metrics".to_owned()));
            }

            let name = &mf.name;
            if name.is_empty() {
                return Err(Error::Msg("MetricFamily has no name".to_owned()));
            }

            let help = &mf.help;
            if !help.is_empty() {
                writeln!(writer, "# HELP {} {}", name, escape_string(help, false))?;
            }

            writeln!(writer, "# TYPE {} {}", name, mf.metric_type.as_str())?;

            for sample in &mf.samples {
                match &sample.value {
                    SampleValue::Counter(v) => {
                        write_sample(name, &sample.label_pairs, "", "", &v.to_string(), writer)?;
                    }
                    SampleValue::Gauge(v) => {
                        write_sample(name, &sample.label_pairs, "", "", &v.to_string(), writer)?;
                    }
                    SampleValue::Histogram(h) => {
                        write_histogram(name, &sample.label_pairs, h, writer)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn format_type(&self) -> &str {
        TEXT_FORMAT
    }
}

/// `write_sample` writes a single sample line in text format to `writer`,
/// given the metric name, the sorted label pairs, optionally an additional
/// label name and value (use empty strings if not required), and the
/// already formatted value.
fn write_sample(
    name: &str,
    pairs: &[LabelPair],
    additional_label_name: &str,
    additional_label_value: &str,
    value: &str,
    writer: &mut dyn Write,
) -> Result<()> {
    writer.write_all(name.as_bytes())?;

    label_pairs_to_text(pairs, additional_label_name, additional_label_value, writer)?;

    writeln!(writer, " {}", value)?;

    Ok(())
}

/// Histograms expand into one `_bucket` line per bucket with cumulative
/// counts and the `le` bound, the mandatory `+Inf` bucket, then `_sum` and
/// `_count`. Bounds and sum are scaled by the metric's unit.
fn write_histogram(
    name: &str,
    pairs: &[LabelPair],
    h: &HistogramSnapshot,
    writer: &mut dyn Write,
) -> Result<()> {
    let bucket_name = format!("{}_bucket", name);
    let mut cumulative = 0;
    for bucket in &h.buckets {
        cumulative += bucket.count;
        let upper_bound = bucket.upper_bound as f64 * h.unit;
        write_sample(
            &bucket_name,
            pairs,
            BUCKET_LABEL,
            &upper_bound.to_string(),
            &cumulative.to_string(),
            writer,
        )?;
    }
    cumulative += h.inf_count;
    write_sample(
        &bucket_name,
        pairs,
        BUCKET_LABEL,
        "+Inf",
        &cumulative.to_string(),
        writer,
    )?;

    let sum = h.sample_sum as f64 * h.unit;
    write_sample(
        &format!("{}_sum", name),
        pairs,
        "",
        "",
        &sum.to_string(),
        writer,
    )?;
    write_sample(
        &format!("{}_count", name),
        pairs,
        "",
        "",
        &h.sample_count.to_string(),
        writer,
    )?;

    Ok(())
}

/// `label_pairs_to_text` converts a slice of sorted label pairs plus the
/// explicitly given additional label pair into the text form required by
/// the format and writes it to `writer`. An empty slice in combination with
/// an empty `additional_label_name` results in nothing being written.
/// Otherwise, the label pairs are written, escaped as required by the text
/// format, and enclosed in '{...}'.
fn label_pairs_to_text(
    pairs: &[LabelPair],
    additional_label_name: &str,
    additional_label_value: &str,
    writer: &mut dyn Write,
) -> Result<()> {
    if pairs.is_empty() && additional_label_name.is_empty() {
        return Ok(());
    }

    let mut separator = "{";
    for lp in pairs {
        write!(
            writer,
            "{}{}=\"{}\"",
            separator,
            lp.name,
            escape_string(&lp.value, true)
        )?;

        separator = ",";
    }

    if !additional_label_name.is_empty() {
        write!(
            writer,
            "{}{}=\"{}\"",
            separator,
            additional_label_name,
            escape_string(additional_label_value, true)
        )?;
    }

    writer.write_all(b"}")?;

    Ok(())
}

fn find_first_occurence(v: &str, include_double_quote: bool) -> Option<usize> {
    if include_double_quote {
        memchr3(b'\\', b'\n', b'"', v.as_bytes())
    } else {
        memchr2(b'\\', b'\n', v.as_bytes())
    }
}

/// `escape_string` replaces `\` by `\\`, new line character by `\n`, and -
/// if `include_double_quote` is true - `"` by `\"`. Implemented to avoid
/// allocation in the common case where nothing needs escaping.
pub fn escape_string(v: &str, include_double_quote: bool) -> Cow<'_, str> {
    let first_occurence = match find_first_occurence(v, include_double_quote) {
        Some(i) => i,
        None => return Cow::Borrowed(v),
    };

    let mut escaped = String::with_capacity(v.len() * 2);
    escaped.push_str(&v[..first_occurence]);

    for c in v[first_occurence..].chars() {
        match c {
            '\\' => escaped.push_str(r"\\"),
            '\n' => escaped.push_str(r"\n"),
            '"' if include_double_quote => escaped.push_str("\\\""),
            _ => escaped.push(c),
        }
    }

    escaped.shrink_to_fit();
    Cow::Owned(escaped)
}
