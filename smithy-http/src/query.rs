/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! URI and query string utilities.
//!
//! The request factory and the request signer both derive the request URI and `Host` header
//! from these helpers so the two always agree byte for byte.

use crate::operation::Parameters;
use http::Uri;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Everything except RFC 3986 unreserved characters is percent encoded.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Like [`UNRESERVED`], but path separators are kept.
const PATH: &AsciiSet = &UNRESERVED.remove(b'/');

/// Percent encode `value`. Spaces become `%20`, never `+`.
///
/// When `is_path` is true, `/` is left untouched.
pub fn url_encode(value: &str, is_path: bool) -> String {
    let set = if is_path { PATH } else { UNRESERVED };
    utf8_percent_encode(value, set).to_string()
}

/// Form-encodes parameters as `name=value` pairs joined by `&`, in insertion order.
///
/// Returns `None` when there are no parameters.
pub fn encode_parameters(params: &Parameters) -> Option<String> {
    if params.is_empty() {
        return None;
    }
    let encoded = params
        .iter()
        .map(|(name, value)| format!("{}={}", url_encode(name, false), url_encode(value, false)))
        .collect::<Vec<_>>()
        .join("&");
    Some(encoded)
}

/// Appends `path` to `base`, making sure exactly one `/` separates them.
///
/// The path is percent encoded. When `escape_double_slash` is set, `//` in the encoded path is
/// rewritten to `/%2F`: some services collapse empty path segments.
pub fn append_uri(base: &str, path: Option<&str>, escape_double_slash: bool) -> String {
    let mut result = base.to_string();
    match path {
        Some(path) if !path.is_empty() => {
            if path.starts_with('/') {
                if result.ends_with('/') {
                    result.pop();
                }
            } else if !result.ends_with('/') {
                result.push('/');
            }
            let mut encoded = url_encode(path, true);
            if escape_double_slash {
                encoded = encoded.replace("//", "/%2F");
            }
            result.push_str(&encoded);
        }
        _ => {
            if !result.ends_with('/') {
                result.push('/');
            }
        }
    }
    result
}

/// `scheme://authority[/path]` for an endpoint, without a trailing bare `/`.
pub fn endpoint_base(endpoint: &Uri) -> String {
    let scheme = endpoint.scheme_str().unwrap_or("https");
    let authority = endpoint
        .authority()
        .map(|authority| authority.as_str())
        .unwrap_or_default();
    let path = endpoint.path();
    if path == "/" || path.is_empty() {
        format!("{}://{}", scheme, authority)
    } else {
        format!("{}://{}{}", scheme, authority, path)
    }
}

/// True if the endpoint names a port other than its scheme's default.
pub fn is_using_non_default_port(endpoint: &Uri) -> bool {
    let port = match endpoint.port_u16() {
        Some(port) => port,
        None => return false,
    };
    let scheme = endpoint.scheme_str().unwrap_or("https");
    !matches!(
        (scheme.to_ascii_lowercase().as_str(), port),
        ("http", 80) | ("https", 443)
    )
}

/// The value of the `Host` header for an endpoint. The port is included only if it is not the
/// default port for the scheme.
pub fn host_header(endpoint: &Uri) -> Option<String> {
    let host = endpoint.host()?;
    match endpoint.port_u16() {
        Some(port) if is_using_non_default_port(endpoint) => Some(format!("{}:{}", host, port)),
        _ => Some(host.to_string()),
    }
}
