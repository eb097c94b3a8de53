/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! A retrying, signing HTTP execution engine for AWS service calls.
//!
//! A [`Client`] takes a protocol-level [`Request`] and turns it into a typed result. Every call
//! runs the same loop: restore the request, sign it, build the wire request, send it, then either
//! hand the response to the success handler, follow a redirect, or ask the retry policy whether
//! the failure is worth another attempt.

#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]

pub mod builder;
pub mod clock_skew;
pub mod config;
pub mod conn;
pub mod context;
pub mod factory;
pub mod hyper_client;
pub mod invocation_id;
pub mod metrics;
pub mod reaper;
pub mod retry;
pub mod sleep;
#[cfg(feature = "test-util")]
pub mod test_connection;

pub use builder::Builder;
pub use smithy_http::result::{SdkError, SdkSuccess};

use crate::clock_skew::parse_clock_skew_offset;
use crate::config::{ClientConfiguration, NO_OP_SIGNER_TYPE};
use crate::conn::HttpClient;
use crate::context::ExecutionContext;
use crate::factory::RequestFactory;
use crate::hyper_client::HyperClient;
use crate::invocation_id::{new_invocation_id, INVOCATION_ID_HEADER};
use crate::metrics::{Metric, RequestMetrics};
use crate::sleep::AsyncSleep;
use aws_http::retry_utils::is_clock_skew_error;
use aws_http::user_agent::{append_user_agent, default_user_agent};
use aws_sig_auth::clock_skew::ClockSkew;
use aws_types::time::{SharedTimeSource, TimeSource};
use http::{StatusCode, Uri};
use percent_encoding::percent_decode_str;
use smithy_http::error::{BoxError, ErrorMetadata, ErrorType, ProvideErrorMetadata};
use smithy_http::operation::{Parameters, Request, RequestSnapshot};
use smithy_http::response::{HandlerError, HttpResponse, HttpResponseHandler};
use std::convert::TryFrom;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

const RETRY_HEADER: &str = "aws-sdk-retry";
const MAX_REDIRECTS: u32 = 10;

/// A response could not be turned into a result or a service error
#[derive(Debug, thiserror::Error)]
#[error(
    "unable to unmarshall {kind}: {source}. Response code: {status}, response text: {status_text}"
)]
pub struct UnmarshallResponseError {
    kind: &'static str,
    status: u16,
    status_text: String,
    source: BoxError,
}

impl UnmarshallResponseError {
    fn new(kind: &'static str, response: &HttpResponse, source: BoxError) -> Self {
        UnmarshallResponseError {
            kind,
            status: response.status().as_u16(),
            status_text: response.status_text().to_string(),
            source,
        }
    }

    /// The HTTP status of the response that could not be unmarshalled
    pub fn status(&self) -> u16 {
        self.status
    }
}

/// Executes requests against AWS services.
///
/// The client owns the transport, the configuration and the retry machinery; everything
/// specific to a single call travels in the [`ExecutionContext`]. Clients are cheap to share
/// behind an `Arc` and safe to use from many tasks at once.
pub struct Client<C = HyperClient> {
    connector: C,
    config: ClientConfiguration,
    sleep_impl: Arc<dyn AsyncSleep>,
    clock_skew: ClockSkew,
    time_source: SharedTimeSource,
    factory: RequestFactory,
}

impl<C> fmt::Debug for Client<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("sleep_impl", &self.sleep_impl)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl<C> Client<C> {
    /// A client with the default configuration that sends requests through `connector`
    pub fn new(connector: C) -> Self {
        Builder::new().connector(connector).build()
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ClientConfiguration {
        &self.config
    }

    /// The transport
    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl Client<HyperClient> {
    /// A client sending requests over hyper, configured by `config`
    pub fn https(config: ClientConfiguration) -> Result<Self, BoxError> {
        Ok(Builder::new().config(config).https()?.build())
    }
}

enum RetryDecision<E> {
    Retry(SdkError<E>),
    GiveUp(SdkError<E>),
}

impl<C> Client<C>
where
    C: HttpClient,
{
    /// Releases the connections held by the transport. Calls made afterwards may fail.
    pub fn shutdown(&self) {
        self.connector.shutdown();
    }

    /// Executes `request`, retrying and following redirects as configured.
    ///
    /// 2xx responses are handed to `handler`. Every other response that is not followed as a
    /// redirect goes to `error_handler`, whose typed error is offered to the retry policy.
    /// Request hooks in `context` run once before the first attempt and once after the call.
    pub async fn execute<H, EH, T, E>(
        &self,
        mut request: Request,
        handler: &H,
        error_handler: &EH,
        context: &ExecutionContext,
    ) -> Result<SdkSuccess<T>, SdkError<E>>
    where
        H: HttpResponseHandler<Output = T>,
        EH: HttpResponseHandler<Output = E>,
        E: ProvideErrorMetadata + From<ErrorMetadata> + Error + Send + Sync + 'static,
    {
        let start = Instant::now();
        let metrics = context.metrics();
        metrics.set_property(Metric::ServiceName, request.service_name().to_string());
        if let Some(endpoint) = request.endpoint() {
            metrics.set_property(Metric::ServiceEndpoint, endpoint.to_string());
        }
        for request_handler in context.request_handlers() {
            request_handler.before_request(&mut request);
        }
        self.set_user_agent(&mut request);
        request.add_header(INVOCATION_ID_HEADER, new_invocation_id());
        let snapshot = request.snapshot();

        let result = self
            .execute_attempts(&mut request, &snapshot, handler, error_handler, context)
            .await;

        match &result {
            Ok(success) => {
                for request_handler in context.request_handlers() {
                    request_handler.after_response(&request, &success.raw);
                }
            }
            Err(err) => {
                for request_handler in context.request_handlers() {
                    request_handler.after_error(&request, err.raw_response(), err);
                }
            }
        }
        metrics.record_duration(Metric::ClientExecuteTime, start.elapsed());
        result
    }

    async fn execute_attempts<H, EH, T, E>(
        &self,
        request: &mut Request,
        snapshot: &RequestSnapshot,
        handler: &H,
        error_handler: &EH,
        context: &ExecutionContext,
    ) -> Result<SdkSuccess<T>, SdkError<E>>
    where
        H: HttpResponseHandler<Output = T>,
        EH: HttpResponseHandler<Output = E>,
        E: ProvideErrorMetadata + From<ErrorMetadata> + Error + Send + Sync + 'static,
    {
        let metrics = context.metrics();
        let mut attempt: u32 = 0;
        let mut redirects: u32 = 0;
        let mut redirect: Option<RedirectTarget> = None;
        let mut last_error: Option<SdkError<E>> = None;
        let mut last_backoff = Duration::from_secs(0);

        loop {
            attempt += 1;
            metrics.increment(Metric::RequestCount);
            if attempt > 1 {
                request.restore(snapshot);
            }
            if let Some(target) = &redirect {
                target.apply(request);
            }

            if let Some(err) = &last_error {
                let delay = self.backoff_delay(request, err, attempt - 2);
                trace!(attempt = attempt, delay = ?delay, "backing off before retrying");
                self.sleep_impl.sleep(delay).await;
                metrics.record_duration(Metric::RetryPauseTime, delay);
                last_backoff = delay;
            }
            request.add_header(
                RETRY_HEADER,
                format!("{}/{}", attempt - 1, last_backoff.as_millis()),
            );

            if let Err(err) = self.sign(request, context) {
                metrics.increment(Metric::Exception);
                return Err(SdkError::ConstructionFailure(err));
            }

            let http_request = match self.factory.create_http_request(request, &self.config, context)
            {
                Ok(http_request) => http_request,
                Err(err) => {
                    metrics.increment(Metric::Exception);
                    return Err(SdkError::ConstructionFailure(err));
                }
            };

            let send_start = Instant::now();
            let sent = self.connector.execute(http_request).await;
            metrics.record_duration(Metric::HttpRequestTime, send_start.elapsed());
            let mut response = match sent {
                Ok(response) => response,
                Err(err) => {
                    info!(error = %err, attempt = attempt, "unable to execute HTTP request");
                    match self.should_retry(request, snapshot, SdkError::DispatchFailure(err), attempt)
                    {
                        RetryDecision::Retry(err) => {
                            last_error = Some(err);
                            continue;
                        }
                        RetryDecision::GiveUp(err) => return Err(err),
                    }
                }
            };

            let status = response.status();
            metrics.set_property(Metric::StatusCode, status.as_u16().to_string());
            if let Some(request_id) = request_id(&response) {
                metrics.set_property(Metric::AwsRequestId, request_id.to_string());
            }

            if status.is_success() {
                return self.handle_success(response, handler, metrics).await;
            }

            if status == StatusCode::TEMPORARY_REDIRECT && redirects < MAX_REDIRECTS {
                if let Some(target) = response.header("location").and_then(RedirectTarget::parse) {
                    if !snapshot.is_replayable() {
                        let location = target.location;
                        return Err(SdkError::NonReplayableBody(Box::new(
                            SdkError::ResponseError {
                                raw: response,
                                err: format!("redirect to {} requires resending the body", location)
                                    .into(),
                            },
                        )));
                    }
                    // release the connection before following the redirect
                    if let Err(err) = response.load_body().await {
                        debug!(error = %err, "failed to read the body of a redirect response");
                    }
                    redirects += 1;
                    debug!(location = %target.location, "following redirect");
                    metrics.set_property(Metric::RedirectLocation, target.location.clone());
                    request.set_endpoint(None);
                    request.set_resource_path(None);
                    redirect = Some(target);
                    last_error = None;
                    continue;
                }
            }

            let err = self
                .handle_error_response(response, error_handler, request, metrics)
                .await;
            if !matches!(err, SdkError::ServiceError { .. }) {
                return Err(err);
            }
            metrics.increment(Metric::Exception);
            match self.should_retry(request, snapshot, err, attempt) {
                RetryDecision::Retry(err) => {
                    self.correct_clock_skew(request, &err);
                    last_error = Some(err);
                }
                RetryDecision::GiveUp(err) => return Err(err),
            }
        }
    }

    /// `default user agent [marker] [configured user agent]`
    fn set_user_agent(&self, request: &mut Request) {
        let default = default_user_agent();
        let mut user_agent = default.clone();
        if let Some(marker) = request.user_agent_marker() {
            user_agent = append_user_agent(&user_agent, marker);
        }
        if self.config.user_agent() != default {
            user_agent = append_user_agent(&user_agent, self.config.user_agent());
        }
        request.add_header("User-Agent", user_agent);
    }

    fn backoff_delay<E: ProvideErrorMetadata>(
        &self,
        request: &Request,
        err: &SdkError<E>,
        retries_attempted: u32,
    ) -> Duration {
        match err.as_attempt_error() {
            Some(attempt_error) => self.config.retry_policy().backoff().delay_before_next_retry(
                request.original_request_any(),
                &attempt_error,
                retries_attempted,
            ),
            None => Duration::from_secs(0),
        }
    }

    fn sign(&self, request: &mut Request, context: &ExecutionContext) -> Result<(), BoxError> {
        if self.config.signer_override() == Some(NO_OP_SIGNER_TYPE) {
            return Ok(());
        }
        let (endpoint, credentials) = match (request.endpoint(), context.credentials()) {
            (Some(endpoint), Some(credentials)) => (endpoint.clone(), credentials),
            _ => return Ok(()),
        };
        let signer = match context.signer_for(&endpoint) {
            Some(signer) => signer,
            None => return Ok(()),
        };
        let start = Instant::now();
        signer.sign(request, credentials)?;
        context
            .metrics()
            .record_duration(Metric::RequestSigningTime, start.elapsed());
        Ok(())
    }

    async fn handle_success<H, T, E>(
        &self,
        mut response: HttpResponse,
        handler: &H,
        metrics: &dyn RequestMetrics,
    ) -> Result<SdkSuccess<T>, SdkError<E>>
    where
        H: HttpResponseHandler<Output = T>,
    {
        if !handler.needs_connection_left_open() {
            if let Err(err) = response.load_body().await {
                metrics.increment(Metric::Exception);
                return Err(SdkError::ResponseError { raw: response, err });
            }
        }
        let start = Instant::now();
        let parsed = handler.handle(&mut response);
        metrics.record_duration(Metric::ResponseProcessingTime, start.elapsed());
        match parsed {
            Ok(parsed) => Ok(SdkSuccess {
                raw: response,
                parsed,
            }),
            Err(HandlerError::Crc32Mismatch(err)) => {
                metrics.increment(Metric::Exception);
                Err(SdkError::ChecksumMismatch { raw: response, err })
            }
            Err(HandlerError::Unmarshall(source)) => {
                metrics.increment(Metric::Exception);
                let err = UnmarshallResponseError::new("response", &response, source);
                Err(SdkError::ResponseError {
                    raw: response,
                    err: err.into(),
                })
            }
        }
    }

    async fn handle_error_response<EH, E>(
        &self,
        mut response: HttpResponse,
        error_handler: &EH,
        request: &Request,
        metrics: &dyn RequestMetrics,
    ) -> SdkError<E>
    where
        EH: HttpResponseHandler<Output = E>,
        E: From<ErrorMetadata>,
    {
        if !error_handler.needs_connection_left_open() {
            if let Err(err) = response.load_body().await {
                metrics.increment(Metric::Exception);
                return SdkError::ResponseError { raw: response, err };
            }
        }
        let start = Instant::now();
        let handled = error_handler.handle(&mut response);
        metrics.record_duration(Metric::ResponseProcessingTime, start.elapsed());
        match handled {
            Ok(err) => SdkError::ServiceError { raw: response, err },
            Err(handler_err) => match synthesize_error(&response, request.service_name()) {
                Some(meta) => {
                    debug!(
                        status = response.status().as_u16(),
                        error = %handler_err,
                        "error response could not be unmarshalled, using the status instead"
                    );
                    SdkError::ServiceError {
                        raw: response,
                        err: E::from(meta),
                    }
                }
                None => {
                    metrics.increment(Metric::Exception);
                    let err = UnmarshallResponseError::new(
                        "error response",
                        &response,
                        Box::new(handler_err),
                    );
                    SdkError::ResponseError {
                        raw: response,
                        err: err.into(),
                    }
                }
            },
        }
    }

    fn should_retry<E: ProvideErrorMetadata>(
        &self,
        request: &Request,
        snapshot: &RequestSnapshot,
        err: SdkError<E>,
        attempt: u32,
    ) -> RetryDecision<E> {
        let policy = self.config.retry_policy();
        let retries_attempted = attempt - 1;
        let max_error_retry = policy.effective_max_error_retry(self.config.max_error_retry());
        if retries_attempted >= max_error_retry {
            debug!(
                retries = retries_attempted,
                max = max_error_retry,
                "retry budget exhausted"
            );
            return RetryDecision::GiveUp(err);
        }
        let retryable = match err.as_attempt_error() {
            Some(attempt_error) => policy.condition().should_retry(
                request.original_request_any(),
                &attempt_error,
                retries_attempted,
            ),
            None => false,
        };
        if !retryable {
            return RetryDecision::GiveUp(err);
        }
        if !snapshot.is_replayable() {
            debug!("request body can not be replayed, not retrying");
            return RetryDecision::GiveUp(SdkError::NonReplayableBody(Box::new(err)));
        }
        debug!(retries = retries_attempted, "retrying request");
        RetryDecision::Retry(err)
    }

    fn correct_clock_skew<E: ProvideErrorMetadata>(&self, request: &mut Request, err: &SdkError<E>) {
        if let SdkError::ServiceError { raw, err } = err {
            if is_clock_skew_error(err.code()) {
                let offset = parse_clock_skew_offset(raw, err.message(), self.time_source.now());
                debug!(offset = offset, "correcting clock skew");
                self.clock_skew.set(offset);
                request.set_time_offset(offset);
            }
        }
    }
}

fn request_id(response: &HttpResponse) -> Option<&str> {
    response
        .header("x-amzn-RequestId")
        .or_else(|| response.header("x-amz-request-id"))
}

/// Error metadata for well known statuses whose bodies are often not parsable
fn synthesize_error(response: &HttpResponse, service_name: &str) -> Option<ErrorMetadata> {
    let status = response.status();
    let (message, error_type) = match status {
        StatusCode::PAYLOAD_TOO_LARGE => ("Request entity too large", ErrorType::Client),
        StatusCode::SERVICE_UNAVAILABLE
            if response
                .status_text()
                .eq_ignore_ascii_case("Service Unavailable") =>
        {
            ("Service unavailable", ErrorType::Service)
        }
        _ => return None,
    };
    let mut builder = ErrorMetadata::builder()
        .code(message)
        .message(message)
        .error_type(error_type)
        .status_code(status.as_u16())
        .service_name(service_name);
    if let Some(request_id) = request_id(response) {
        builder = builder.request_id(request_id);
    }
    Some(builder.build())
}

/// Where a `307 Temporary Redirect` sends the next attempt
#[derive(Debug)]
struct RedirectTarget {
    location: String,
    endpoint: Uri,
    resource_path: Option<String>,
    parameters: Option<Parameters>,
}

impl RedirectTarget {
    /// Only absolute locations are followed
    fn parse(location: &str) -> Option<Self> {
        let location = location.trim();
        let uri = Uri::try_from(location).ok()?;
        let endpoint =
            Uri::try_from(format!("{}://{}/", uri.scheme_str()?, uri.authority()?)).ok()?;
        let resource_path = match uri.path() {
            "" | "/" => None,
            path => Some(decode(path)),
        };
        let parameters = uri.query().map(|query| {
            let mut parameters = Parameters::new();
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
                parameters.add(decode(name), decode(value));
            }
            parameters
        });
        Some(RedirectTarget {
            location: location.to_string(),
            endpoint,
            resource_path,
            parameters,
        })
    }

    fn apply(&self, request: &mut Request) {
        if request.endpoint().is_none() && request.resource_path().is_none() {
            request.set_endpoint(Some(self.endpoint.clone()));
            request.set_resource_path(self.resource_path.clone());
        }
        if let Some(parameters) = &self.parameters {
            *request.parameters_mut() = parameters.clone();
        }
    }
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
