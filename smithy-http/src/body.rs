/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Request and response bodies, either in memory or streaming

use crate::error::BoxError;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue};
use http_body::{Body, SizeHint};
use std::fmt::{self, Debug, Formatter};
use std::pin::Pin;
use std::task::{Context, Poll};

type DynBody = Pin<Box<dyn Body<Data = Bytes, Error = BoxError> + Send + Sync>>;

/// SdkBody type
///
/// This is the Body used for dispatching all HTTP Requests and for holding the content of
/// every response.
///
/// Only in-memory bodies can be replayed: [`SdkBody::try_clone`] returns `None` for streaming
/// bodies, and the execution engine refuses to retry a request whose body can not be cloned.
pub struct SdkBody {
    inner: Inner,
}

enum Inner {
    Once(Option<Bytes>),
    Streaming(hyper::Body),
    Dyn(DynBody),
    /// When a streaming body is transferred out to a stream parser, the body is replaced with
    /// `Taken`. This will return an Error when polled. Attempting to read data out of a `Taken`
    /// Body is a bug.
    Taken,
}

impl Debug for SdkBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Once(once) => f.debug_tuple("Once").field(once).finish(),
            Inner::Streaming(streaming) => f.debug_tuple("Streaming").field(streaming).finish(),
            Inner::Dyn(_) => f.write_str("Dyn"),
            Inner::Taken => f.write_str("Taken"),
        }
    }
}

impl SdkBody {
    /// Construct an SdkBody from a Boxed implementation of http::Body
    pub fn from_dyn<B>(body: B) -> Self
    where
        B: Body<Data = Bytes, Error = BoxError> + Send + Sync + 'static,
    {
        Self {
            inner: Inner::Dyn(Box::pin(body)),
        }
    }

    /// A body with no content
    pub fn empty() -> Self {
        Self {
            inner: Inner::Once(None),
        }
    }

    /// A body that has been moved out and must not be read again
    pub fn taken() -> Self {
        Self {
            inner: Inner::Taken,
        }
    }

    /// Returns the in-memory content of this body, or `None` if it is a stream.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.inner {
            Inner::Once(Some(bytes)) => Some(bytes),
            Inner::Once(None) => Some(&[]),
            _ => None,
        }
    }

    /// Attempt to clone this body. Only in-memory bodies can be cloned.
    pub fn try_clone(&self) -> Option<Self> {
        match &self.inner {
            Inner::Once(bytes) => Some(Self {
                inner: Inner::Once(bytes.clone()),
            }),
            _ => None,
        }
    }

    /// True if the body can be resent after a failed attempt
    pub fn is_replayable(&self) -> bool {
        matches!(self.inner, Inner::Once(_))
    }

    /// The exact length of the body, when it is known up front
    pub fn content_length(&self) -> Option<u64> {
        self.size_hint().exact()
    }

    fn poll_inner(
        &mut self,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Bytes, BoxError>>> {
        match &mut self.inner {
            Inner::Once(opt) => Poll::Ready(opt.take().map(Ok)),
            Inner::Streaming(body) => Pin::new(body)
                .poll_data(cx)
                .map_err(|e| Box::new(e) as BoxError),
            Inner::Dyn(body) => body.as_mut().poll_data(cx),
            Inner::Taken => {
                Poll::Ready(Some(Err("A `Taken` body should never be polled".into())))
            }
        }
    }
}

impl From<&str> for SdkBody {
    fn from(s: &str) -> Self {
        SdkBody::from(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for SdkBody {
    fn from(s: String) -> Self {
        SdkBody::from(Bytes::from(s))
    }
}

impl From<Bytes> for SdkBody {
    fn from(bytes: Bytes) -> Self {
        SdkBody {
            inner: Inner::Once(Some(bytes)),
        }
    }
}

impl From<Vec<u8>> for SdkBody {
    fn from(data: Vec<u8>) -> SdkBody {
        Self::from(Bytes::from(data))
    }
}

impl From<hyper::Body> for SdkBody {
    fn from(body: hyper::Body) -> Self {
        SdkBody {
            inner: Inner::Streaming(body),
        }
    }
}

impl Body for SdkBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_data(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Self::Data, Self::Error>>> {
        self.poll_inner(cx)
    }

    fn poll_trailers(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<HeaderMap<HeaderValue>>, Self::Error>> {
        Poll::Ready(Ok(None))
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            Inner::Once(None) => true,
            Inner::Once(Some(bytes)) => bytes.is_empty(),
            Inner::Streaming(body) => body.is_end_stream(),
            Inner::Dyn(body) => body.is_end_stream(),
            Inner::Taken => true,
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            Inner::Once(None) => SizeHint::with_exact(0),
            Inner::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Inner::Streaming(body) => body.size_hint(),
            Inner::Dyn(body) => body.size_hint(),
            Inner::Taken => SizeHint::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::SdkBody;

    #[test]
    fn in_memory_bodies_are_replayable() {
        let body = SdkBody::from("hello");
        let copy = body.try_clone().expect("in-memory body");
        assert_eq!(copy.bytes(), Some(&b"hello"[..]));
        assert_eq!(body.content_length(), Some(5));
        assert!(SdkBody::empty().is_replayable());
    }

    #[test]
    fn streaming_bodies_are_not_replayable() {
        let body = SdkBody::from(hyper::Body::from("hello"));
        assert!(body.try_clone().is_none());
        assert!(!body.is_replayable());
        assert!(body.bytes().is_none());
    }

    #[tokio::test]
    async fn read_to_end() {
        let bytes = hyper::body::to_bytes(SdkBody::from("some data"))
            .await
            .expect("in-memory body");
        assert_eq!(&bytes[..], b"some data");

        let streamed = hyper::body::to_bytes(SdkBody::from(hyper::Body::from("streamed")))
            .await
            .expect("streaming body");
        assert_eq!(&streamed[..], b"streamed");
    }

    #[tokio::test]
    async fn taken_body_errors() {
        assert!(hyper::body::to_bytes(SdkBody::taken()).await.is_err());
    }
}
