/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The service-level request envelope.

use crate::body::SdkBody;
use http::{Method, Uri};
use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Ordered, multi-valued request parameters.
///
/// Values added under an existing name are grouped with that name, which keeps its original
/// position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, Vec<String>)>);

impl Parameters {
    /// Creates an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value for `name`
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => values.push(value.into()),
            None => self.0.push((name, vec![value.into()])),
        }
    }

    /// Replaces every value of `name` with `value`
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, values)) => *values = vec![value.into()],
            None => self.0.push((name, vec![value.into()])),
        }
    }

    /// All values of `name`
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, values)| values.as_slice())
    }

    /// True if no parameters are present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates `(name, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0.iter().flat_map(|(name, values)| {
            values
                .iter()
                .map(move |value| (name.as_str(), value.as_str()))
        })
    }
}

/// The mutable envelope for one logical service call.
///
/// A `Request` carries everything the execution engine needs to produce one wire request per
/// attempt: method, endpoint, resource path, parameters, headers, and content. Before the first
/// attempt, the engine takes a [`RequestSnapshot`] and [`restores`](Request::restore) it on
/// every retry so each attempt starts from a clean, unsigned state.
pub struct Request {
    service_name: Cow<'static, str>,
    method: Method,
    endpoint: Option<Uri>,
    resource_path: Option<String>,
    parameters: Parameters,
    headers: BTreeMap<String, String>,
    content: Option<SdkBody>,
    streaming: bool,
    time_offset: i64,
    user_agent_marker: Option<String>,
    original_request: Option<Arc<dyn Any + Send + Sync>>,
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("service_name", &self.service_name)
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("resource_path", &self.resource_path)
            .field("parameters", &self.parameters)
            .field("headers", &self.headers)
            .field("content", &self.content)
            .field("streaming", &self.streaming)
            .field("time_offset", &self.time_offset)
            .finish()
    }
}

impl Request {
    /// Creates a request for `service_name` using `method`
    pub fn new(service_name: impl Into<Cow<'static, str>>, method: Method) -> Self {
        Request {
            service_name: service_name.into(),
            method,
            endpoint: None,
            resource_path: None,
            parameters: Parameters::new(),
            headers: BTreeMap::new(),
            content: None,
            streaming: false,
            time_offset: 0,
            user_agent_marker: None,
            original_request: None,
        }
    }

    /// Sets the endpoint
    pub fn with_endpoint(mut self, endpoint: Uri) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Sets the resource path
    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    /// Sets the content
    pub fn with_content(mut self, content: impl Into<SdkBody>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Adds a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_header(name, value);
        self
    }

    /// Adds a parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.add(name, value);
        self
    }

    /// Attaches the typed request this envelope was marshalled from
    pub fn with_original_request(mut self, original: impl Any + Send + Sync) -> Self {
        self.original_request = Some(Arc::new(original));
        self
    }

    /// Attaches a marker appended to the `User-Agent` of this call
    pub fn with_user_agent_marker(mut self, marker: impl Into<String>) -> Self {
        self.user_agent_marker = Some(marker.into());
        self
    }

    /// Name of the service this request is for
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The HTTP method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Overrides the HTTP method
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The endpoint, `None` after a redirect cleared it
    pub fn endpoint(&self) -> Option<&Uri> {
        self.endpoint.as_ref()
    }

    /// Sets or clears the endpoint
    pub fn set_endpoint(&mut self, endpoint: Option<Uri>) {
        self.endpoint = endpoint;
    }

    /// The resource path below the endpoint
    pub fn resource_path(&self) -> Option<&str> {
        self.resource_path.as_deref()
    }

    /// Sets or clears the resource path
    pub fn set_resource_path(&mut self, path: Option<String>) {
        self.resource_path = path;
    }

    /// Request parameters
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Mutable request parameters
    pub fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.parameters
    }

    /// Adds a parameter value
    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.add(name, value);
    }

    /// Request headers. Names are case sensitive.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Sets a header, replacing any previous value stored under the same name
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }

    /// Looks up a header by exact name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|value| value.as_str())
    }

    /// Looks up a header ignoring case
    pub fn header_ignore_case(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Removes a header
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        self.headers.remove(name)
    }

    /// The request content
    pub fn content(&self) -> Option<&SdkBody> {
        self.content.as_ref()
    }

    /// Sets or clears the content
    pub fn set_content(&mut self, content: Option<SdkBody>) {
        self.content = content;
    }

    /// Moves the content out of the request
    pub fn take_content(&mut self) -> Option<SdkBody> {
        self.content.take()
    }

    /// True if the content is streamed rather than sent from memory
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Marks the content as streamed
    pub fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Clock offset in seconds applied when signing this request
    pub fn time_offset(&self) -> i64 {
        self.time_offset
    }

    /// Sets the clock offset in seconds
    pub fn set_time_offset(&mut self, offset: i64) {
        self.time_offset = offset;
    }

    /// Marker appended to the `User-Agent` of this call
    pub fn user_agent_marker(&self) -> Option<&str> {
        self.user_agent_marker.as_deref()
    }

    /// The typed request this envelope was built from, if it is a `T`
    pub fn original_request<T: Any>(&self) -> Option<&T> {
        self.original_request.as_ref()?.downcast_ref::<T>()
    }

    /// The typed request this envelope was built from
    pub fn original_request_any(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.original_request.as_deref()
    }

    /// Captures the state that every attempt must start from
    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            parameters: self.parameters.clone(),
            headers: self.headers.clone(),
            content: self.content.as_ref().and_then(SdkBody::try_clone),
            had_content: self.content.is_some(),
        }
    }

    /// Resets parameters, headers and content to `snapshot`, discarding anything a previous
    /// attempt added (signatures, retry headers).
    pub fn restore(&mut self, snapshot: &RequestSnapshot) {
        self.parameters = snapshot.parameters.clone();
        self.headers = snapshot.headers.clone();
        self.content = snapshot.content.as_ref().and_then(SdkBody::try_clone);
    }
}

/// Pre-loop state of a [`Request`]
#[derive(Debug)]
pub struct RequestSnapshot {
    parameters: Parameters,
    headers: BTreeMap<String, String>,
    content: Option<SdkBody>,
    had_content: bool,
}

impl RequestSnapshot {
    /// False if the request carried content that can not be sent a second time
    pub fn is_replayable(&self) -> bool {
        !self.had_content || self.content.is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn request() -> Request {
        Request::new("DynamoDB", Method::POST)
            .with_endpoint(Uri::from_static("https://dynamodb.us-east-1.amazonaws.com"))
            .with_header("X-Amz-Target", "DynamoDB_20120810.ListTables")
            .with_parameter("a", "1")
            .with_content("{}")
    }

    #[test]
    fn restore_discards_attempt_state() {
        let mut req = request();
        let snapshot = req.snapshot();
        assert!(snapshot.is_replayable());

        req.add_header("Authorization", "AWS4-HMAC-SHA256 ...");
        req.add_parameter("b", "2");
        let sent = req.take_content();
        assert!(sent.is_some());

        req.restore(&snapshot);
        assert_eq!(req.header("Authorization"), None);
        assert_eq!(req.parameters().get("b"), None);
        assert_eq!(
            req.content().and_then(SdkBody::bytes),
            Some(&b"{}"[..])
        );
    }

    #[test]
    fn streaming_content_is_not_replayable() {
        let req = request().with_content(hyper::Body::from("stream"));
        assert!(!req.snapshot().is_replayable());
        let empty = Request::new("svc", Method::GET);
        assert!(empty.snapshot().is_replayable());
    }

    #[test]
    fn original_request_downcast() {
        #[derive(Debug, PartialEq)]
        struct ListTablesInput {
            limit: i32,
        }
        let req = request().with_original_request(ListTablesInput { limit: 5 });
        assert_eq!(
            req.original_request::<ListTablesInput>(),
            Some(&ListTablesInput { limit: 5 })
        );
        assert_eq!(req.original_request::<String>(), None);
    }

    #[test]
    fn headers_are_case_sensitive() {
        let mut req = request();
        req.add_header("content-type", "a");
        req.add_header("Content-Type", "b");
        assert_eq!(req.header("content-type"), Some("a"));
        assert_eq!(req.header("Content-Type"), Some("b"));
        assert!(req.header_ignore_case("CONTENT-TYPE").is_some());
    }
}
