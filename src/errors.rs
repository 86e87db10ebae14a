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

use std::io::Error as IoError;
use std::result;

use thiserror::Error;

/// The error types for metric registration, vector lookup and push start.
/// Hot-path observations never fail.
#[derive(Debug, Error)]
pub enum Error {
    /// The metric name is empty after scrubbing.
    #[error("metric name {0:?} is empty after scrubbing")]
    InvalidName(String),
    /// A label name is empty or otherwise unusable after scrubbing.
    #[error("invalid label name {0:?}")]
    InvalidLabel(String),
    /// Two labels of one metric collapse to the same name after scrubbing.
    #[error("label {0:?} occurs more than once after scrubbing")]
    DuplicateLabelAfterScrub(String),
    /// The name is already registered with a different label-name schema or
    /// a different help string. A registration that only changes the help,
    /// with identical constant label values, collides on identity first and
    /// surfaces as `IdentityConflict`.
    #[error(
        "metric {0:?} is already registered with different label names or a \
         different help string"
    )]
    DimensionMismatch(String),
    /// A metric with the same identity and constant-label values exists.
    #[error("metric {0:?} is already registered with the same constant label values")]
    IdentityConflict(String),
    /// A scalar falls inside the label space covered by a vector, or a new
    /// vector would cover an existing scalar.
    #[error("metric {0:?} collides with the label space owned by a vector")]
    VectorOwnership(String),
    /// Histogram bucket upper bounds are not strictly increasing.
    #[error("histogram buckets must be strictly increasing: {0} >= {1}")]
    BucketsNotMonotonic(i64, i64),
    /// A vector constructor was called without variable labels.
    #[error("vector metrics require at least one variable label")]
    VariableLabelsMissing,
    /// A scalar constructor was called with variable labels.
    #[error("variable labels are not allowed on scalar metrics")]
    VariableLabelsForbidden,
    /// A vector lookup supplied labels that do not match the declared
    /// variable-label names.
    #[error("vector lookup mismatch: {0}")]
    LookupMismatch(String),
    /// A push loop is already running for this registry.
    #[error("a push loop is already running for this registry")]
    PushAlreadyRunning,
    /// A custom error message.
    #[error("{0}")]
    Msg(String),
    /// An error from writing the text exposition or spawning the push thread.
    #[error("io error: {0}")]
    Io(#[from] IoError),
}

/// A specialized Result type for metric operations.
pub type Result<T> = result::Result<T, Error>;
