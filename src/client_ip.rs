use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use forwarded_header_value::ForwardedHeaderValue;
use tracing::warn;

use crate::http_err::ApiError;

/// The IP address of the client making a request.
///
/// Proxies are trusted to set `Forwarded` or `X-Forwarded-For`; without
/// either header the peer address of the connection is used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientIp(pub IpAddr);

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    if let Some(value) = headers.get("forwarded").and_then(|v| v.to_str().ok()) {
        if let Some(ip) = ForwardedHeaderValue::from_forwarded(value)
            .ok()
            .and_then(|forwarded| forwarded.remotest_forwarded_for_ip())
        {
            return Some(ip);
        }
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|value| ForwardedHeaderValue::from_x_forwarded_for(value).ok())
        .and_then(|forwarded| forwarded.remotest_forwarded_for_ip())
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ip) = forwarded_ip(&parts.headers) {
            return Ok(Self(ip));
        }

        match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(address)) => Ok(Self(address.ip())),
            None => {
                warn!("Could not determine client IP address.");

                Err(ApiError::InternalServerError)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("forwarded", HeaderValue::from_static("for=192.0.2.60;proto=http"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.17"));

        assert_eq!(Some("192.0.2.60".parse().unwrap()), forwarded_ip(&headers));
    }

    #[test]
    fn uses_client_end_of_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.195, 70.41.3.18, 150.172.238.178"),
        );

        assert_eq!(Some("203.0.113.195".parse().unwrap()), forwarded_ip(&headers));
    }

    #[test]
    fn no_headers_no_ip() {
        assert_eq!(None, forwarded_ip(&HeaderMap::new()));
    }
}
