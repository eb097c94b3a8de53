/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-call request metrics

use std::collections::HashMap;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// A metric recorded while executing a call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Metric {
    /// Wall time of the whole call, retries included
    ClientExecuteTime,
    /// Number of attempts
    RequestCount,
    /// Time spent in backoff between attempts
    RetryPauseTime,
    /// Time spent waiting for the transport
    HttpRequestTime,
    /// Time spent in response handlers
    ResponseProcessingTime,
    /// Time spent signing
    RequestSigningTime,
    /// Failures
    Exception,
    /// Status code of each response
    StatusCode,
    /// Request id of each response
    AwsRequestId,
    /// Target of followed redirects
    RedirectLocation,
    /// Name of the service called
    ServiceName,
    /// Endpoint the call was sent to
    ServiceEndpoint,
}

impl Metric {
    /// The name of the metric
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::ClientExecuteTime => "ClientExecuteTime",
            Metric::RequestCount => "RequestCount",
            Metric::RetryPauseTime => "RetryPauseTime",
            Metric::HttpRequestTime => "HttpRequestTime",
            Metric::ResponseProcessingTime => "ResponseProcessingTime",
            Metric::RequestSigningTime => "RequestSigningTime",
            Metric::Exception => "Exception",
            Metric::StatusCode => "StatusCode",
            Metric::AwsRequestId => "AWSRequestID",
            Metric::RedirectLocation => "RedirectLocation",
            Metric::ServiceName => "ServiceName",
            Metric::ServiceEndpoint => "ServiceEndpoint",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for the metrics of one call
pub trait RequestMetrics: Debug + Send + Sync {
    /// Adds one to a counter
    fn increment(&self, metric: Metric);

    /// Records a value. Properties recorded more than once keep every value.
    fn set_property(&self, metric: Metric, value: String);

    /// Records a measured duration
    fn record_duration(&self, metric: Metric, duration: Duration);

    /// False if recording is a no-op, so callers can skip computing values
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Discards everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl RequestMetrics for NoOpMetrics {
    fn increment(&self, _metric: Metric) {}

    fn set_property(&self, _metric: Metric, _value: String) {}

    fn record_duration(&self, _metric: Metric, _duration: Duration) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct Recorded {
    counters: HashMap<Metric, u64>,
    properties: HashMap<Metric, Vec<String>>,
    durations: HashMap<Metric, Vec<Duration>>,
}

/// Keeps every recorded metric in memory
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    recorded: Mutex<Recorded>,
}

impl RecordingMetrics {
    /// Creates an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current value of a counter
    pub fn count(&self, metric: Metric) -> u64 {
        self.recorded()
            .counters
            .get(&metric)
            .copied()
            .unwrap_or_default()
    }

    /// Every value recorded for a property
    pub fn properties(&self, metric: Metric) -> Vec<String> {
        self.recorded()
            .properties
            .get(&metric)
            .cloned()
            .unwrap_or_default()
    }

    /// Every duration recorded for a metric
    pub fn durations(&self, metric: Metric) -> Vec<Duration> {
        self.recorded()
            .durations
            .get(&metric)
            .cloned()
            .unwrap_or_default()
    }

    /// Emits everything recorded so far as one debug event
    pub fn log(&self) {
        let recorded = self.recorded();
        let mut line = Vec::new();
        for (metric, value) in &recorded.counters {
            line.push(format!("{}={}", metric, value));
        }
        for (metric, values) in &recorded.properties {
            line.push(format!("{}=[{}]", metric, values.join(", ")));
        }
        for (metric, values) in &recorded.durations {
            let millis = values
                .iter()
                .map(|duration| format!("{:.3}", duration.as_secs_f64() * 1000.0))
                .collect::<Vec<_>>();
            line.push(format!("{}=[{}]", metric, millis.join(", ")));
        }
        line.sort();
        tracing::debug!(metrics = %line.join(", "), "request metrics");
    }
}

impl RequestMetrics for RecordingMetrics {
    fn increment(&self, metric: Metric) {
        *self.recorded().counters.entry(metric).or_default() += 1;
    }

    fn set_property(&self, metric: Metric, value: String) {
        self.recorded()
            .properties
            .entry(metric)
            .or_default()
            .push(value);
    }

    fn record_duration(&self, metric: Metric, duration: Duration) {
        self.recorded()
            .durations
            .entry(metric)
            .or_default()
            .push(duration);
    }
}
