/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use aws_http::json::JsonResponseHandler;
use aws_http::json_error::JsonErrorResponseHandler;
use aws_http::protocol::{amz_target, prepare_json_request, JsonVersion};
use aws_hyper::config::ClientConfiguration;
use aws_hyper::context::{ExecutionContext, RequestHandler};
use aws_hyper::metrics::{Metric, RecordingMetrics};
use aws_hyper::retry::{ExponentialBackoff, RetryPolicy};
use aws_hyper::test_connection::{InstantSleep, TestConnection};
use aws_hyper::{Builder, Client, SdkError};
use aws_sig_auth::clock_skew::ClockSkew;
use aws_sig_auth::signer::SigV4SignerProvider;
use aws_types::time::{SharedTimeSource, StaticTimeSource};
use aws_types::Credentials;
use http::{Method, Uri};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use smithy_http::body::SdkBody;
use smithy_http::error::{BoxError, ErrorMetadata};
use smithy_http::operation::Request;
use smithy_http::response::HttpResponse;
use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// 2021-01-01T12:15:00Z
const LOCAL_EPOCH_SECONDS: u64 = 1_609_503_300;

fn now() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(LOCAL_EPOCH_SECONDS)
}

fn parse_json(body: &[u8]) -> Result<Value, BoxError> {
    Ok(serde_json::from_slice(body)?)
}

fn list_tables() -> Request {
    let mut request = Request::new("dynamodb", Method::POST)
        .with_endpoint(Uri::from_static("https://dynamodb.us-east-1.amazonaws.com"))
        .with_content(r#"{"Limit":10}"#);
    prepare_json_request(
        &mut request,
        amz_target("DynamoDB", "20120810", "ListTables"),
        JsonVersion::V1_0,
    );
    request
}

fn error_response(status: u16, code: &str) -> http::Response<&'static str> {
    let body: &'static str = Box::leak(
        json!({ "__type": code, "message": "something went wrong" })
            .to_string()
            .into_boxed_str(),
    );
    http::Response::builder()
        .status(status)
        .header("x-amzn-RequestId", "req-error")
        .body(body)
        .unwrap()
}

fn ok_response() -> http::Response<&'static str> {
    http::Response::builder()
        .status(200)
        .header("x-amzn-RequestId", "req-ok")
        .body(r#"{"TableNames":["a","b"]}"#)
        .unwrap()
}

fn placeholder() -> http::Request<SdkBody> {
    http::Request::new(SdkBody::empty())
}

struct Harness {
    conn: TestConnection<&'static str>,
    sleep: InstantSleep,
    skew: ClockSkew,
    client: Client<TestConnection<&'static str>>,
}

fn harness(
    responses: Vec<Result<http::Response<&'static str>, &'static str>>,
    config: ClientConfiguration,
) -> Harness {
    let conn = TestConnection::from_results(
        responses
            .into_iter()
            .map(|response| (placeholder(), response))
            .collect(),
    );
    let sleep = InstantSleep::new();
    let skew = ClockSkew::new();
    let client = Builder::new()
        .connector(conn.clone())
        .config(config)
        .sleep_impl(sleep.clone())
        .clock_skew(skew.clone())
        .time_source(StaticTimeSource::new(now()))
        .build();
    Harness {
        conn,
        sleep,
        skew,
        client,
    }
}

fn deterministic_retries(max_error_retry: u32) -> ClientConfiguration {
    ClientConfiguration::builder()
        .max_error_retry(max_error_retry)
        .retry_policy(RetryPolicy::standard().with_backoff(
            ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(20))
                .with_random(|| 1.0),
        ))
        .build()
}

fn context(skew: &ClockSkew) -> ExecutionContext {
    ExecutionContext::new()
        .with_credentials(Credentials::from_keys("AKIDEXAMPLE", "secret", None))
        .with_signer_provider(
            SigV4SignerProvider::new("dynamodb")
                .with_clock_skew(skew.clone())
                .with_time_source(SharedTimeSource::new(StaticTimeSource::new(now()))),
        )
}

fn header(harness: &Harness, index: usize, name: &str) -> Option<String> {
    harness.conn.requests()[index]
        .actual
        .headers()
        .get(name)
        .map(|value| value.to_str().unwrap().to_string())
}

async fn call(
    harness: &Harness,
    request: Request,
    context: &ExecutionContext,
) -> Result<aws_hyper::SdkSuccess<aws_http::json::ServiceResponse<Value>>, SdkError<ErrorMetadata>>
{
    let handler = JsonResponseHandler::new(parse_json);
    let error_handler = JsonErrorResponseHandler::<ErrorMetadata>::new().with_service_name("dynamodb");
    harness
        .client
        .execute(request, &handler, &error_handler, context)
        .await
}

#[tokio::test]
async fn success_is_sent_once() {
    let harness = harness(vec![Ok(ok_response())], deterministic_retries(3));
    let metrics = Arc::new(RecordingMetrics::new());
    let context = context(&harness.skew).with_metrics(metrics.clone());

    let success = call(&harness, list_tables(), &context).await.expect("call succeeds");

    assert_eq!(success.parsed.result, json!({"TableNames": ["a", "b"]}));
    assert_eq!(success.parsed.request_id.as_deref(), Some("req-ok"));
    assert_eq!(harness.conn.requests().len(), 1);
    assert_eq!(header(&harness, 0, "aws-sdk-retry").as_deref(), Some("0/0"));
    assert!(header(&harness, 0, "authorization")
        .unwrap()
        .contains("/us-east-1/dynamodb/aws4_request"));
    assert_eq!(metrics.count(Metric::RequestCount), 1);
    assert_eq!(metrics.properties(Metric::StatusCode), vec!["200".to_string()]);
    assert_eq!(metrics.properties(Metric::AwsRequestId), vec!["req-ok".to_string()]);
    assert_eq!(metrics.durations(Metric::ClientExecuteTime).len(), 1);
    assert!(harness.sleep.logs().is_empty());
}

#[tokio::test]
async fn server_errors_are_retried_until_the_budget_is_spent() {
    let harness = harness(
        vec![
            Ok(error_response(500, "InternalServerError")),
            Ok(error_response(500, "InternalServerError")),
            Ok(error_response(500, "InternalServerError")),
        ],
        deterministic_retries(2),
    );
    let metrics = Arc::new(RecordingMetrics::new());
    let context = context(&harness.skew).with_metrics(metrics.clone());

    let err = call(&harness, list_tables(), &context)
        .await
        .expect_err("every attempt fails");

    match &err {
        SdkError::ServiceError { raw, err } => {
            assert_eq!(raw.status().as_u16(), 500);
            assert_eq!(err.code(), Some("InternalServerError"));
            assert_eq!(err.service_name(), Some("dynamodb"));
        }
        other => panic!("expected a service error, got {:?}", other),
    }
    assert_eq!(harness.conn.requests().len(), 3);
    assert_eq!(
        harness.sleep.logs(),
        vec![Duration::from_millis(100), Duration::from_millis(200)]
    );
    assert_eq!(header(&harness, 0, "aws-sdk-retry").as_deref(), Some("0/0"));
    assert_eq!(header(&harness, 1, "aws-sdk-retry").as_deref(), Some("1/100"));
    assert_eq!(header(&harness, 2, "aws-sdk-retry").as_deref(), Some("2/200"));

    let invocation_ids: Vec<_> = (0..3)
        .map(|i| header(&harness, i, "aws-sdk-invocation-id").unwrap())
        .collect();
    assert!(invocation_ids.iter().all(|id| id == &invocation_ids[0]));

    assert_eq!(metrics.count(Metric::RequestCount), 3);
    assert_eq!(metrics.durations(Metric::RetryPauseTime).len(), 2);
}

#[tokio::test]
async fn throttling_is_retried_then_succeeds() {
    let harness = harness(
        vec![Ok(error_response(400, "ThrottlingException")), Ok(ok_response())],
        deterministic_retries(3),
    );
    let context = context(&harness.skew);
    let success = call(&harness, list_tables(), &context).await.expect("second attempt succeeds");
    assert_eq!(success.raw.status().as_u16(), 200);
    assert_eq!(harness.conn.requests().len(), 2);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let harness = harness(
        vec![Ok(error_response(400, "ValidationException"))],
        deterministic_retries(3),
    );
    let err = call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect_err("validation fails");
    assert_eq!(err.request_id(), Some("req-error"));
    assert_eq!(harness.conn.requests().len(), 1);
}

#[tokio::test]
async fn dispatch_failures_are_retried() {
    let harness = harness(
        vec![Err("connection reset by peer"), Ok(ok_response())],
        deterministic_retries(3),
    );
    call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect("second attempt succeeds");
    assert_eq!(harness.conn.requests().len(), 2);
}

#[tokio::test]
async fn non_replayable_body_is_sent_once() {
    let harness = harness(
        vec![Ok(error_response(500, "InternalServerError"))],
        deterministic_retries(3),
    );
    let mut request = list_tables();
    request.set_content(Some(SdkBody::from(hyper::Body::from("streamed"))));

    let err = call(&harness, request, &context(&harness.skew))
        .await
        .expect_err("streamed body can not be retried");

    match err {
        SdkError::NonReplayableBody(inner) => {
            assert_eq!(inner.status().map(|s| s.as_u16()), Some(500));
        }
        other => panic!("expected NonReplayableBody, got {:?}", other),
    }
    assert_eq!(harness.conn.requests().len(), 1);
}

#[tokio::test]
async fn temporary_redirect_is_followed_and_resigned() {
    let redirect = http::Response::builder()
        .status(307)
        .header("Location", "https://dynamodb.us-west-2.amazonaws.com/")
        .body("")
        .unwrap();
    let harness = harness(vec![Ok(redirect), Ok(ok_response())], deterministic_retries(3));
    let metrics = Arc::new(RecordingMetrics::new());
    let context = context(&harness.skew).with_metrics(metrics.clone());

    call(&harness, list_tables(), &context)
        .await
        .expect("redirected call succeeds");

    let requests = harness.conn.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(
        requests[0].actual.uri().host(),
        Some("dynamodb.us-east-1.amazonaws.com")
    );
    assert_eq!(
        requests[1].actual.uri().host(),
        Some("dynamodb.us-west-2.amazonaws.com")
    );
    drop(requests);
    assert!(header(&harness, 1, "authorization")
        .unwrap()
        .contains("/us-west-2/dynamodb/aws4_request"));
    assert_eq!(
        header(&harness, 1, "host").as_deref(),
        Some("dynamodb.us-west-2.amazonaws.com")
    );
    assert_eq!(
        metrics.properties(Metric::RedirectLocation),
        vec!["https://dynamodb.us-west-2.amazonaws.com/".to_string()]
    );
    // a redirect is not a failure, nothing to back off from
    assert!(harness.sleep.logs().is_empty());
}

#[tokio::test]
async fn redirect_with_non_replayable_body_is_not_followed() {
    let redirect = http::Response::builder()
        .status(307)
        .header("Location", "https://dynamodb.us-west-2.amazonaws.com/")
        .body("")
        .unwrap();
    let harness = harness(vec![Ok(redirect), Ok(ok_response())], deterministic_retries(3));
    let mut request = list_tables();
    request.set_content(Some(SdkBody::from(hyper::Body::from("streamed"))));

    let err = call(&harness, request, &context(&harness.skew))
        .await
        .expect_err("streamed body can not be resent");

    match err {
        SdkError::NonReplayableBody(inner) => {
            assert_eq!(inner.status().map(|s| s.as_u16()), Some(307));
            assert!(inner.to_string().contains("us-west-2"), "{}", inner);
        }
        other => panic!("expected NonReplayableBody, got {:?}", other),
    }
    assert_eq!(harness.conn.requests().len(), 1);
    assert!(harness.sleep.logs().is_empty());
}

#[tokio::test]
async fn checksum_mismatch_is_reported_distinctly() {
    let corrupted = http::Response::builder()
        .status(200)
        .header("x-amz-crc32", "1")
        .body(r#"{"TableNames":[]}"#)
        .unwrap();
    let harness = harness(vec![Ok(corrupted)], deterministic_retries(3));
    let err = call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect_err("checksum does not match");
    assert!(err.is_checksum_mismatch());
    assert_eq!(harness.conn.requests().len(), 1);
}

#[tokio::test]
async fn unparsable_service_unavailable_is_synthesized_and_retried() {
    let unavailable = || {
        http::Response::builder()
            .status(503)
            .body("<html>Service Unavailable</html>")
            .unwrap()
    };
    let harness = harness(
        vec![Ok(unavailable()), Ok(unavailable())],
        deterministic_retries(1),
    );
    let err = call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect_err("service stays unavailable");
    match err {
        SdkError::ServiceError { err, .. } => {
            assert_eq!(err.code(), Some("Service unavailable"));
            assert_eq!(err.status_code(), Some(503));
        }
        other => panic!("expected a synthesized service error, got {:?}", other),
    }
    assert_eq!(harness.conn.requests().len(), 2);
}

#[tokio::test]
async fn service_unavailable_with_another_phrase_is_not_synthesized() {
    let slow_down = http::Response::builder()
        .status(503)
        .extension(hyper::ext::ReasonPhrase::from_static(b"Slow Down"))
        .body("<html>Slow Down</html>")
        .unwrap();
    let harness = harness(vec![Ok(slow_down), Ok(ok_response())], deterministic_retries(3));
    let err = call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect_err("body is not an error document");
    match err {
        SdkError::ResponseError { raw, .. } => {
            assert_eq!(raw.status().as_u16(), 503);
            assert_eq!(raw.status_text(), "Slow Down");
        }
        other => panic!("expected a response error, got {:?}", other),
    }
    assert_eq!(harness.conn.requests().len(), 1);
}

#[tokio::test]
async fn unparsable_error_response_is_a_response_error() {
    let teapot = http::Response::builder()
        .status(418)
        .body("not json")
        .unwrap();
    let harness = harness(vec![Ok(teapot)], deterministic_retries(3));
    let err = call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect_err("body is not an error document");
    match err {
        SdkError::ResponseError { raw, err } => {
            assert_eq!(raw.status().as_u16(), 418);
            assert!(err.to_string().contains("Response code: 418"));
        }
        other => panic!("expected a response error, got {:?}", other),
    }
    assert_eq!(harness.conn.requests().len(), 1);
}

#[tokio::test]
async fn clock_skew_is_corrected_before_the_retry() {
    let skewed = http::Response::builder()
        .status(400)
        .header("Date", "Fri, 01 Jan 2021 12:00:00 GMT")
        .body(r#"{"__type":"InvalidSignatureException","message":"Signature expired"}"#)
        .unwrap();
    let harness = harness(vec![Ok(skewed), Ok(ok_response())], deterministic_retries(3));
    let context = context(&harness.skew);

    call(&harness, list_tables(), &context)
        .await
        .expect("retry with the corrected clock succeeds");

    assert_eq!(harness.skew.get(), 900);
    assert_eq!(
        header(&harness, 0, "x-amz-date").as_deref(),
        Some("20210101T121500Z")
    );
    assert_eq!(
        header(&harness, 1, "x-amz-date").as_deref(),
        Some("20210101T120000Z")
    );
}

#[derive(Clone, Debug, Default)]
struct RecordingHandler {
    events: Arc<Mutex<Vec<String>>>,
}

impl RecordingHandler {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RequestHandler for RecordingHandler {
    fn before_request(&self, request: &mut Request) {
        request.add_header("x-hooked", "yes");
        self.events.lock().unwrap().push("before".to_string());
    }

    fn after_response(&self, _request: &Request, response: &HttpResponse) {
        self.events
            .lock()
            .unwrap()
            .push(format!("response {}", response.status().as_u16()));
    }

    fn after_error(
        &self,
        _request: &Request,
        response: Option<&HttpResponse>,
        error: &(dyn Error + 'static),
    ) {
        self.events.lock().unwrap().push(format!(
            "error {:?} {}",
            response.map(|r| r.status().as_u16()),
            error
        ));
    }
}

#[tokio::test]
async fn request_handlers_run_once_per_call() {
    let harness = harness(
        vec![Ok(error_response(500, "InternalServerError")), Ok(ok_response())],
        deterministic_retries(3),
    );
    let hooks = RecordingHandler::default();
    let context = context(&harness.skew).with_request_handler(hooks.clone());

    call(&harness, list_tables(), &context).await.expect("retry succeeds");

    assert_eq!(hooks.events(), vec!["before", "response 200"]);
    assert_eq!(header(&harness, 0, "x-hooked").as_deref(), Some("yes"));
    assert_eq!(header(&harness, 1, "x-hooked").as_deref(), Some("yes"));

    let harness = self::harness(
        vec![Ok(error_response(400, "ValidationException"))],
        deterministic_retries(3),
    );
    let hooks = RecordingHandler::default();
    let context = self::context(&harness.skew).with_request_handler(hooks.clone());
    call(&harness, list_tables(), &context)
        .await
        .expect_err("validation fails");
    let events = hooks.events();
    assert_eq!(events.len(), 2);
    assert!(events[1].starts_with("error Some(400)"));
}

#[tokio::test]
async fn user_agent_combines_marker_configuration_and_context() {
    let config = ClientConfiguration::builder().user_agent("my-app/2.0").build();
    let harness = harness(vec![Ok(ok_response())], config);
    let context = context(&harness.skew).with_user_agent("ctx/1.0");
    let request = list_tables().with_user_agent_marker("marker/3");

    call(&harness, request, &context).await.expect("call succeeds");

    let user_agent = header(&harness, 0, "user-agent").unwrap();
    assert!(user_agent.starts_with("aws-sdk-rust/"));
    assert!(user_agent.contains("marker/3"));
    assert!(user_agent.contains("my-app/2.0"));
    assert!(user_agent.ends_with("ctx/1.0"));
}

#[tokio::test]
async fn no_op_signer_override_skips_signing() {
    let config = ClientConfiguration::builder()
        .signer_override(aws_hyper::config::NO_OP_SIGNER_TYPE)
        .build();
    let harness = harness(vec![Ok(ok_response())], config);
    call(&harness, list_tables(), &context(&harness.skew))
        .await
        .expect("call succeeds");
    assert_eq!(header(&harness, 0, "authorization"), None);
}
