/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Converts a service [`Request`] into the [`HttpRequest`] of one attempt

use crate::config::ClientConfiguration;
use crate::context::ExecutionContext;
use aws_http::user_agent::append_user_agent;
use http::header::{HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Uri};
use smithy_http::body::SdkBody;
use smithy_http::error::BoxError;
use smithy_http::operation::Request;
use smithy_http::query::{append_uri, encode_parameters, endpoint_base, host_header};
use smithy_http::request::HttpRequest;
use std::convert::TryFrom;

const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const METHOD_OVERRIDE: &str = "X-HTTP-Method-Override";

/// Failure to build the wire request
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RequestFactoryError {
    /// The request has no endpoint
    #[error("request has no endpoint")]
    MissingEndpoint,

    /// The endpoint, path and parameters do not form a valid URI
    #[error("invalid request URI {uri}")]
    InvalidUri {
        /// The assembled URI
        uri: String,
        /// Why it was rejected
        #[source]
        source: http::uri::InvalidUri,
    },

    /// A header name or value can not be sent
    #[error("invalid header {0}")]
    InvalidHeader(String),
}

/// Builds wire requests.
///
/// Stateless: the same factory serves every attempt of every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestFactory;

impl RequestFactory {
    /// Creates a factory
    pub fn new() -> Self {
        RequestFactory
    }

    /// Builds the wire request for the current state of `request`.
    ///
    /// The content of `request` is moved into the result; the engine restores it from its
    /// snapshot before the next attempt.
    pub fn create_http_request(
        &self,
        request: &mut Request,
        config: &ClientConfiguration,
        context: &ExecutionContext,
    ) -> Result<HttpRequest, BoxError> {
        let endpoint = request
            .endpoint()
            .ok_or(RequestFactoryError::MissingEndpoint)?
            .clone();
        let mut uri = append_uri(
            &base_with_scheme(&endpoint, config),
            request.resource_path(),
            true,
        );

        let is_patch = request.method() == Method::PATCH;
        // PATCH is tunneled as POST but its parameters still belong in the URI
        let params_in_uri = request.method() != Method::POST || request.content().is_some();
        let encoded_params = encode_parameters(request.parameters());
        if params_in_uri {
            if let Some(query) = &encoded_params {
                uri.push('?');
                uri.push_str(query);
            }
        }
        let uri = Uri::try_from(uri.as_str()).map_err(|source| RequestFactoryError::InvalidUri {
            uri: uri.clone(),
            source,
        })?;

        let method = if is_patch {
            Method::POST
        } else {
            request.method().clone()
        };

        let mut builder = http::Request::builder().method(method).uri(uri);
        let headers = builder
            .headers_mut()
            .ok_or_else(|| RequestFactoryError::InvalidHeader("request builder".to_string()))?;

        if let Some(host) = host_header(&endpoint) {
            headers.insert(HOST, header_value(&host)?);
        }
        for (name, value) in request.headers() {
            let name = HeaderName::try_from(name.as_str())
                .map_err(|_| RequestFactoryError::InvalidHeader(name.clone()))?;
            headers.insert(name, header_value(value)?);
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        }
        if let Some(context_user_agent) = context.context_user_agent() {
            let base = headers
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .unwrap_or_else(|| config.user_agent())
                .to_string();
            headers.insert(
                USER_AGENT,
                header_value(&append_user_agent(&base, context_user_agent))?,
            );
        }
        // anything but a defaulted gzip is pinned to identity so the transport never negotiates
        let encoding = if config.enable_gzip() && !headers.contains_key(ACCEPT_ENCODING) {
            "gzip"
        } else {
            "identity"
        };
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(encoding));
        if is_patch {
            headers.insert(METHOD_OVERRIDE, HeaderValue::from_static("PATCH"));
        }

        let body = match (params_in_uri, encoded_params) {
            (false, Some(form)) => {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(form.len()));
                SdkBody::from(form)
            }
            _ => request.take_content().unwrap_or_else(SdkBody::empty),
        };

        let inner = builder.body(body)?;
        Ok(HttpRequest::new(inner, request.is_streaming()))
    }
}

/// Endpoints configured without a scheme use the configured protocol
fn base_with_scheme(endpoint: &Uri, config: &ClientConfiguration) -> String {
    match endpoint.scheme_str() {
        Some(_) => endpoint_base(endpoint),
        None => {
            let authority = endpoint
                .authority()
                .map(|authority| authority.as_str())
                .unwrap_or_default();
            format!("{}://{}", config.protocol().scheme(), authority)
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, RequestFactoryError> {
    HeaderValue::from_str(value).map_err(|_| RequestFactoryError::InvalidHeader(value.to_string()))
}
