/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! AWS Signature Version 4

use crate::clock_skew::ClockSkew;
use crate::signer::{Signer, SigningError};
use aws_types::region::Region;
use aws_types::time::{SharedTimeSource, TimeSource};
use aws_types::Credentials;
use chrono::{DateTime, Utc};
use hmac::{digest::FixedOutput, Hmac, Mac};
use http::Method;
use sha2::{Digest, Sha256};
use smithy_http::operation::Request;
use smithy_http::query;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime};

/// Signing algorithm name
pub const HMAC_256: &str = "AWS4-HMAC-SHA256";

const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";
const X_AMZ_DATE: &str = "X-Amz-Date";
const X_AMZ_SECURITY_TOKEN: &str = "x-amz-security-token";
const AUTHORIZATION: &str = "Authorization";
const HOST: &str = "Host";

/// Signs requests with AWS Signature Version 4, using the `Authorization` header.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    service: String,
    region: Region,
    double_url_encode: bool,
    clock_skew: ClockSkew,
    time_source: SharedTimeSource,
}

impl SigV4Signer {
    /// Signs for `service` in `region`
    pub fn new(service: impl Into<String>, region: Region) -> Self {
        SigV4Signer {
            service: service.into(),
            region,
            double_url_encode: true,
            clock_skew: ClockSkew::global(),
            time_source: SharedTimeSource::default(),
        }
    }

    /// Uses `clock_skew` instead of the process-wide offset
    pub fn with_clock_skew(mut self, clock_skew: ClockSkew) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Uses `time_source` instead of the system clock
    pub fn with_time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    /// S3 signs the path encoded once; every other service encodes it twice.
    pub fn with_double_url_encode(mut self, double_url_encode: bool) -> Self {
        self.double_url_encode = double_url_encode;
        self
    }

    /// The time to sign with: now, corrected by the clock offset.
    ///
    /// The process-wide offset wins when it is set; otherwise the request's own offset applies.
    fn signing_time(&self, request: &Request) -> SystemTime {
        let global = self.clock_skew.get();
        let offset = if global != 0 {
            global
        } else {
            request.time_offset()
        };
        apply_offset(self.time_source.now(), offset)
    }
}

fn apply_offset(now: SystemTime, offset_seconds: i64) -> SystemTime {
    let delta = Duration::from_secs(offset_seconds.unsigned_abs());
    let adjusted = if offset_seconds >= 0 {
        now.checked_sub(delta)
    } else {
        now.checked_add(delta)
    };
    adjusted.unwrap_or(now)
}

impl Signer for SigV4Signer {
    fn sign(&self, request: &mut Request, credentials: &Credentials) -> Result<(), SigningError> {
        let endpoint = request
            .endpoint()
            .cloned()
            .ok_or(SigningError::MissingEndpoint)?;
        let host = query::host_header(&endpoint).ok_or(SigningError::MissingEndpoint)?;

        let date_time = DateTime::<Utc>::from(self.signing_time(request));
        let amz_date = format_date_time(&date_time);

        request.remove_header(AUTHORIZATION);
        if request.header_ignore_case(HOST).is_none() {
            request.add_header(HOST, host);
        }
        request.add_header(X_AMZ_DATE, amz_date.clone());
        if let Some(token) = credentials.session_token() {
            request.add_header(X_AMZ_SECURITY_TOKEN, token);
        }

        let creq = CanonicalRequest::from_request(request, self.double_url_encode);
        let scope = format!(
            "{}/{}/{}/aws4_request",
            format_date(&date_time),
            self.region,
            self.service
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            HMAC_256,
            amz_date,
            scope,
            sha256_hex_string(creq.to_string())
        );
        let signing_key = generate_signing_key(
            credentials.secret_access_key(),
            &date_time,
            self.region.as_ref(),
            &self.service,
        );
        let signature = calculate_signature(signing_key, string_to_sign.as_bytes());
        tracing::trace!(canonical_request = %creq, string_to_sign = %string_to_sign, "calculated signature");

        request.add_header(
            AUTHORIZATION,
            format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                HMAC_256,
                credentials.access_key_id(),
                scope,
                creq.signed_headers,
                signature
            ),
        );
        Ok(())
    }
}

/// HashedPayload = Lowercase(HexEncode(Hash(requestPayload)))
fn sha256_hex_string(bytes: impl AsRef<[u8]>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize_fixed())
}

/// Calculates a Sigv4 signature
pub fn calculate_signature(signing_key: impl AsRef<[u8]>, string_to_sign: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key.as_ref())
        .expect("HMAC can take key of any size");
    mac.update(string_to_sign);
    hex::encode(mac.finalize_fixed())
}

/// Generates a signing key for Sigv4
pub fn generate_signing_key(
    secret: &str,
    date: &DateTime<Utc>,
    region: &str,
    service: &str,
) -> impl AsRef<[u8]> {
    // kSecret = your secret access key
    // kDate = HMAC("AWS4" + kSecret, Date)
    // kRegion = HMAC(kDate, Region)
    // kService = HMAC(kRegion, Service)
    // kSigning = HMAC(kService, "aws4_request")
    let secret = format!("AWS4{}", secret);
    let mut tag = hmac_sha256(secret.as_bytes(), format_date(date).as_bytes());
    for part in &[region, service, "aws4_request"] {
        tag = hmac_sha256(&tag, part.as_bytes());
    }
    tag
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize_fixed().to_vec()
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%Y%m%d").to_string()
}

fn format_date_time(date: &DateTime<Utc>) -> String {
    date.format("%Y%m%dT%H%M%SZ").to_string()
}

struct CanonicalRequest {
    method: Method,
    path: String,
    params: String,
    headers: BTreeMap<String, Vec<String>>,
    signed_headers: String,
    payload_hash: String,
}

impl CanonicalRequest {
    fn from_request(request: &Request, double_url_encode: bool) -> Self {
        let endpoint_path = request
            .endpoint()
            .map(|endpoint| endpoint.path())
            .filter(|path| *path != "/")
            .unwrap_or_default();
        let mut path = query::append_uri(endpoint_path, request.resource_path(), true);
        if double_url_encode {
            path = query::url_encode(&path, true);
        }

        // A bare POST carries its parameters as the form-encoded body
        let params_in_body = request.method() == Method::POST && request.content().is_none();
        let params = if params_in_body {
            String::new()
        } else {
            let mut pairs = request
                .parameters()
                .iter()
                .map(|(name, value)| (query::url_encode(name, false), query::url_encode(value, false)))
                .collect::<Vec<_>>();
            pairs.sort();
            pairs
                .into_iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("&")
        };

        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in request.headers() {
            let name = name.to_ascii_lowercase();
            // The user agent header should not be signed because it may be altered by proxies
            if name == "user-agent" {
                continue;
            }
            headers
                .entry(name)
                .or_default()
                .push(normalize_header_value(value));
        }
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

        let payload_hash = match request.content() {
            None if params_in_body => sha256_hex_string(
                query::encode_parameters(request.parameters()).unwrap_or_default(),
            ),
            None => sha256_hex_string(""),
            Some(body) => match body.bytes() {
                Some(bytes) => sha256_hex_string(bytes),
                None => UNSIGNED_PAYLOAD.to_string(),
            },
        };

        CanonicalRequest {
            method: request.method().clone(),
            path,
            params,
            headers,
            signed_headers,
            payload_hash,
        }
    }
}

/// Trims the value and collapses runs of spaces into one
fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.method)?;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "{}", self.params)?;
        for (name, values) in &self.headers {
            writeln!(f, "{}:{}", name, values.join(","))?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_headers)?;
        write!(f, "{}", self.payload_hash)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use aws_types::time::StaticTimeSource;
    use http::Uri;
    use pretty_assertions::assert_eq;
    use std::time::UNIX_EPOCH;

    // 2015-08-30T12:36:00Z
    const TEST_SUITE_TIME: u64 = 1_440_938_160;

    fn test_signer() -> SigV4Signer {
        SigV4Signer::new("service", Region::from_static("us-east-1"))
            .with_clock_skew(ClockSkew::new())
            .with_time_source(SharedTimeSource::new(StaticTimeSource::new(
                UNIX_EPOCH + Duration::from_secs(TEST_SUITE_TIME),
            )))
    }

    fn test_credentials() -> Credentials {
        Credentials::from_keys(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            None,
        )
    }

    fn vanilla_request() -> Request {
        Request::new("service", Method::GET)
            .with_endpoint(Uri::from_static("https://example.amazonaws.com"))
    }

    #[test]
    fn get_vanilla() {
        let mut request = vanilla_request();
        test_signer()
            .sign(&mut request, &test_credentials())
            .expect("signs");
        assert_eq!(request.header("X-Amz-Date"), Some("20150830T123600Z"));
        assert_eq!(request.header("Host"), Some("example.amazonaws.com"));
        assert_eq!(
            request.header("Authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;x-amz-date, \
                 Signature=5fa00fa31553b73ebf1942676e86291e8372ff2a2260956d9b8aae1d763fbf31"
            )
        );
    }

    #[test]
    fn get_vanilla_query_order_key_case() {
        let mut request = vanilla_request()
            .with_parameter("Param2", "value2")
            .with_parameter("Param1", "value1");
        test_signer()
            .sign(&mut request, &test_credentials())
            .expect("signs");
        let auth = request.header("Authorization").expect("signed");
        assert!(auth.ends_with(
            "Signature=b97d918cfa904a5beff61c982a1b6f458b799221646efd99d3219ec94cdf2500"
        ));
    }

    #[test]
    fn utf8_header_values_are_signed() {
        let mut request = Request::new("service", Method::GET)
            .with_endpoint(Uri::from_static(
                "https://some-endpoint.some-region.amazonaws.com",
            ))
            .with_header("some-header", "テスト")
            .with_content("");
        test_signer()
            .sign(&mut request, &test_credentials())
            .expect("signs");
        assert_eq!(
            request.header("Authorization"),
            Some(
                "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/service/aws4_request, \
                 SignedHeaders=host;some-header;x-amz-date, \
                 Signature=4596b207a7fc6bdf18725369bc0cd7022cf20efbd2c19730549f42d1a403648e"
            )
        );
    }

    #[test]
    fn user_agent_is_not_signed() {
        let mut request = vanilla_request().with_header("User-Agent", "aws-sdk-rust/0.1");
        test_signer()
            .sign(&mut request, &test_credentials())
            .expect("signs");
        assert!(request
            .header("Authorization")
            .unwrap()
            .contains("SignedHeaders=host;x-amz-date,"));
    }

    #[test]
    fn session_token_is_signed() {
        let mut request = vanilla_request();
        let credentials = Credentials::from_keys("AKID", "secret", Some("token".to_string()));
        test_signer().sign(&mut request, &credentials).expect("signs");
        assert_eq!(request.header("x-amz-security-token"), Some("token"));
        assert!(request
            .header("Authorization")
            .unwrap()
            .contains("SignedHeaders=host;x-amz-date;x-amz-security-token,"));
    }

    #[test]
    fn signing_time_uses_global_offset_first() {
        let skew = ClockSkew::new();
        let signer = test_signer().with_clock_skew(skew.clone());

        let mut request = vanilla_request();
        request.set_time_offset(60);
        signer.sign(&mut request, &test_credentials()).unwrap();
        assert_eq!(request.header("X-Amz-Date"), Some("20150830T123500Z"));

        skew.set(900);
        let mut request = vanilla_request();
        request.set_time_offset(60);
        signer.sign(&mut request, &test_credentials()).unwrap();
        assert_eq!(request.header("X-Amz-Date"), Some("20150830T122100Z"));
    }

    #[test]
    fn bare_post_signs_parameters_as_payload() {
        let mut request = Request::new("service", Method::POST)
            .with_endpoint(Uri::from_static("https://example.amazonaws.com"))
            .with_parameter("Action", "ListUsers");
        let creq = CanonicalRequest::from_request(&request, true);
        assert_eq!(creq.params, "");
        assert_eq!(creq.payload_hash, sha256_hex_string("Action=ListUsers"));

        request.set_content(Some("{}".into()));
        let creq = CanonicalRequest::from_request(&request, true);
        assert_eq!(creq.params, "Action=ListUsers");
    }

    #[test]
    fn canonical_path_is_double_encoded() {
        let request = vanilla_request().with_resource_path("/my key/a%b");
        assert_eq!(
            CanonicalRequest::from_request(&request, true).path,
            "/my%2520key/a%2525b"
        );
        assert_eq!(
            CanonicalRequest::from_request(&request, false).path,
            "/my%20key/a%25b"
        );
    }

    #[test]
    fn missing_endpoint_fails() {
        let mut request = Request::new("service", Method::GET);
        assert!(matches!(
            test_signer().sign(&mut request, &test_credentials()),
            Err(SigningError::MissingEndpoint)
        ));
    }
}
