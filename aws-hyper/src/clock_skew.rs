/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Clock skew detection from clock skew error responses

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use smithy_http::response::HttpResponse;
use std::time::SystemTime;

const SERVER_TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Seconds the local clock is ahead of the server clock, according to a clock skew error.
///
/// The server time is read from the `Date` header, or failing that from the error message,
/// which embeds it as `(20210101T120000Z + 15 min.)` or `(... - 15 min.)`. Returns `0` if
/// neither can be parsed.
pub fn parse_clock_skew_offset(
    response: &HttpResponse,
    message: Option<&str>,
    now: SystemTime,
) -> i64 {
    let server_time = response
        .header("date")
        .and_then(parse_date_header)
        .or_else(|| message.and_then(parse_message_time));
    match server_time {
        Some(server_time) => (DateTime::<Utc>::from(now) - server_time).num_seconds(),
        None => {
            tracing::warn!(
                date = ?response.header("date"),
                message = ?message,
                "unable to parse clock skew offset from response"
            );
            0
        }
    }
}

fn parse_date_header(date: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(date.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn parse_message_time(message: &str) -> Option<DateTime<Utc>> {
    let start = message.find('(')? + 1;
    let rest = &message[start..];
    let end = rest.find(" + 15").or_else(|| rest.find(" - 15"))?;
    let time = NaiveDateTime::parse_from_str(rest[..end].trim(), SERVER_TIME_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&time))
}
