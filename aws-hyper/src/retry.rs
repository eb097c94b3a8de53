/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Retry policies for the execution engine
//!
//! A [`RetryPolicy`] bundles a [`RetryCondition`] (is this failure worth another attempt?),
//! a [`BackoffStrategy`] (how long to wait before it), and a retry budget. The engine consults
//! the policy once per failed attempt, see [`Client::execute`](crate::Client::execute).

use aws_http::retry_utils::{is_clock_skew_error, is_throttling_error};
use smithy_http::retry::AttemptError;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

/// The typed request a call was built from, if the caller attached one
pub type OriginalRequest<'a> = Option<&'a (dyn Any + Send + Sync)>;

/// Decides whether a failed attempt should be retried
pub trait RetryCondition: Debug + Send + Sync {
    /// `retries_attempted` is the number of retries that already happened for this call.
    fn should_retry(
        &self,
        original: OriginalRequest<'_>,
        error: &AttemptError<'_>,
        retries_attempted: u32,
    ) -> bool;
}

/// Computes the delay before the next retry
pub trait BackoffStrategy: Debug + Send + Sync {
    /// `retries_attempted` is the number of retries that already happened for this call.
    fn delay_before_next_retry(
        &self,
        original: OriginalRequest<'_>,
        error: &AttemptError<'_>,
        retries_attempted: u32,
    ) -> Duration;
}

const MAX_BACKOFF: Duration = Duration::from_secs(20);
const MAX_RETRIES: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(100);
const DYNAMODB_MAX_RETRIES: u32 = 10;
const DYNAMODB_BASE_DELAY: Duration = Duration::from_millis(25);

/// A retry condition, backoff strategy and retry budget
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    condition: Arc<dyn RetryCondition>,
    backoff: Arc<dyn BackoffStrategy>,
    max_error_retry: u32,
    honor_max_error_retry_in_client_config: bool,
}

impl RetryPolicy {
    /// Creates a policy.
    ///
    /// When `honor_max_error_retry_in_client_config` is set, a `max_error_retry` configured on the
    /// client replaces `max_error_retry`. Otherwise the policy's own budget always applies.
    pub fn new(
        condition: impl RetryCondition + 'static,
        backoff: impl BackoffStrategy + 'static,
        max_error_retry: u32,
        honor_max_error_retry_in_client_config: bool,
    ) -> Self {
        RetryPolicy {
            condition: Arc::new(condition),
            backoff: Arc::new(backoff),
            max_error_retry,
            honor_max_error_retry_in_client_config,
        }
    }

    /// Never retries
    pub fn none() -> Self {
        RetryPolicy::new(NeverRetry, NeverRetry, 0, false)
    }

    /// The SDK default: 3 retries with exponential backoff from 100ms
    pub fn standard() -> Self {
        RetryPolicy::new(
            DefaultRetryCondition,
            ExponentialBackoff::new(BASE_DELAY, MAX_BACKOFF),
            MAX_RETRIES,
            true,
        )
    }

    /// The DynamoDB default: 10 retries with exponential backoff from 25ms
    pub fn dynamodb() -> Self {
        RetryPolicy::new(
            DefaultRetryCondition,
            ExponentialBackoff::new(DYNAMODB_BASE_DELAY, MAX_BACKOFF),
            DYNAMODB_MAX_RETRIES,
            true,
        )
    }

    /// Replaces the backoff strategy
    pub fn with_backoff(mut self, backoff: impl BackoffStrategy + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// The retry condition
    pub fn condition(&self) -> &dyn RetryCondition {
        self.condition.as_ref()
    }

    /// The backoff strategy
    pub fn backoff(&self) -> &dyn BackoffStrategy {
        self.backoff.as_ref()
    }

    /// The policy's own retry budget
    pub fn max_error_retry(&self) -> u32 {
        self.max_error_retry
    }

    /// True if a budget configured on the client overrides this policy's budget
    pub fn honors_max_error_retry_in_client_config(&self) -> bool {
        self.honor_max_error_retry_in_client_config
    }

    /// The retry budget that applies given the client's configured value.
    ///
    /// The client value wins only when it is set *and* the policy allows it.
    pub fn effective_max_error_retry(&self, client_max_error_retry: Option<u32>) -> u32 {
        match client_max_error_retry {
            Some(max) if self.honor_max_error_retry_in_client_config => max,
            _ => self.max_error_retry,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::standard()
    }
}

/// Retries dispatch failures, 5xx errors the service is likely to recover from, throttling
/// errors and clock skew errors.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryCondition;

impl RetryCondition for DefaultRetryCondition {
    fn should_retry(
        &self,
        _original: OriginalRequest<'_>,
        error: &AttemptError<'_>,
        _retries_attempted: u32,
    ) -> bool {
        let status = match error {
            AttemptError::Dispatch(_) => return true,
            AttemptError::Service { status, .. } => status.as_u16(),
        };
        matches!(status, 500 | 502 | 503 | 504)
            || is_throttling_error(error.code(), status)
            || is_clock_skew_error(error.code())
    }
}

/// Exponential backoff with full jitter:
/// `delay = random[0, 1) * min(base * 2^retries, max)`
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_backoff: Duration,
    random: fn() -> f64,
}

impl ExponentialBackoff {
    /// Backoff starting at `base_delay`, capped at `max_backoff`
    pub fn new(base_delay: Duration, max_backoff: Duration) -> Self {
        ExponentialBackoff {
            base_delay,
            max_backoff,
            // by default, use a random base for exponential backoff
            random: fastrand::f64,
        }
    }

    /// For deterministic tests, enable using a static base instead of random base for exponential backoff
    pub fn with_random(mut self, random: fn() -> f64) -> Self {
        self.random = random;
        self
    }

    fn ceiling(&self, retries_attempted: u32) -> Duration {
        // Beyond 2^30 the delay is far past any reasonable cap
        let exponent = retries_attempted.min(30) as i32;
        let scaled = self.base_delay.as_secs_f64() * 2_f64.powi(exponent);
        Duration::from_secs_f64(scaled.min(self.max_backoff.as_secs_f64()))
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn delay_before_next_retry(
        &self,
        _original: OriginalRequest<'_>,
        _error: &AttemptError<'_>,
        retries_attempted: u32,
    ) -> Duration {
        let jitter = (self.random)().max(0.0).min(1.0);
        self.ceiling(retries_attempted).mul_f64(jitter)
    }
}

#[derive(Clone, Copy, Debug)]
struct NeverRetry;

impl RetryCondition for NeverRetry {
    fn should_retry(&self, _: OriginalRequest<'_>, _: &AttemptError<'_>, _: u32) -> bool {
        false
    }
}

impl BackoffStrategy for NeverRetry {
    fn delay_before_next_retry(&self, _: OriginalRequest<'_>, _: &AttemptError<'_>, _: u32) -> Duration {
        Duration::from_secs(0)
    }
}
