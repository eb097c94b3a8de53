/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Per-call execution context: hooks, metrics, credentials and signing

use crate::metrics::{NoOpMetrics, RequestMetrics};
use aws_sig_auth::signer::{Signer, SignerProvider};
use aws_types::credentials::{CredentialsError, ProvideCredentials};
use aws_types::Credentials;
use http::Uri;
use smithy_http::operation::Request;
use smithy_http::response::HttpResponse;
use std::error::Error;
use std::fmt::Debug;
use std::sync::Arc;

/// Hooks invoked around a call.
///
/// `before_request` runs once, before the first attempt. Exactly one of `after_response` or
/// `after_error` runs once the call completes.
pub trait RequestHandler: Debug + Send + Sync {
    /// Called before the first attempt. Changes to `request` apply to every attempt.
    fn before_request(&self, _request: &mut Request) {}

    /// Called after a successful call with the final response
    fn after_response(&self, _request: &Request, _response: &HttpResponse) {}

    /// Called after a failed call. `response` is the final response if one was received.
    fn after_error(
        &self,
        _request: &Request,
        _response: Option<&HttpResponse>,
        _error: &(dyn Error + 'static),
    ) {
    }
}

/// Everything about a call that is not part of the request itself
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    request_handlers: Vec<Arc<dyn RequestHandler>>,
    metrics: Arc<dyn RequestMetrics>,
    credentials: Option<Credentials>,
    context_user_agent: Option<String>,
    signer_provider: Option<Arc<dyn SignerProvider>>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        ExecutionContext {
            request_handlers: Vec::new(),
            metrics: Arc::new(NoOpMetrics),
            credentials: None,
            context_user_agent: None,
            signer_provider: None,
        }
    }
}

impl ExecutionContext {
    /// A context without hooks, metrics, credentials or signer
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hook. Hooks run in the order they were added.
    pub fn with_request_handler(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.request_handlers.push(Arc::new(handler));
        self
    }

    /// Records metrics for the call in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<dyn RequestMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Signs with `credentials`
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Appends `user_agent` to the `User-Agent` header of the call
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.context_user_agent = Some(user_agent.into());
        self
    }

    /// Resolves signers from `provider`
    pub fn with_signer_provider(mut self, provider: impl SignerProvider + 'static) -> Self {
        self.signer_provider = Some(Arc::new(provider));
        self
    }

    /// The hooks of this call
    pub fn request_handlers(&self) -> &[Arc<dyn RequestHandler>] {
        &self.request_handlers
    }

    /// The metrics sink of this call
    pub fn metrics(&self) -> &dyn RequestMetrics {
        self.metrics.as_ref()
    }

    /// The credentials used to sign
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Extra `User-Agent` for this call
    pub fn context_user_agent(&self) -> Option<&str> {
        self.context_user_agent.as_deref()
    }

    /// The signer for requests sent to `endpoint`, if there is one
    pub fn signer_for(&self, endpoint: &Uri) -> Option<Arc<dyn Signer>> {
        self.signer_provider.as_ref()?.signer_for(endpoint)
    }
}

/// Picks the credentials of a call. Credentials set on the request win over the provider.
pub fn resolve_credentials(
    request_credentials: Option<&Credentials>,
    provider: Option<&dyn ProvideCredentials>,
) -> Result<Option<Credentials>, CredentialsError> {
    if let Some(credentials) = request_credentials {
        return Ok(Some(credentials.clone()));
    }
    provider.map(|p| p.provide_credentials()).transpose()
}
