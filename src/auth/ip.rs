//! Client IP extraction utilities.

use std::net::{IpAddr, SocketAddr};

use axum::{extract::ConnectInfo, http::request::Parts};

/// Proxy header to trust for the client address.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `X-Forwarded-For` (first hop)
    XForwardedFor,
    /// `X-Real-IP`
    XRealIp,
    /// `CF-Connecting-IP`
    CfConnectingIp,
}

/// Reads the client IP from a configured proxy header.
#[derive(Clone, Debug)]
pub struct IpExtractor {
    pub header_name: &'static str,
    first_of_list: bool,
}

impl From<ClientIpHeader> for IpExtractor {
    fn from(header: ClientIpHeader) -> Self {
        match header {
            ClientIpHeader::XForwardedFor => Self {
                header_name: "x-forwarded-for",
                first_of_list: true,
            },
            ClientIpHeader::XRealIp => Self {
                header_name: "x-real-ip",
                first_of_list: false,
            },
            ClientIpHeader::CfConnectingIp => Self {
                header_name: "cf-connecting-ip",
                first_of_list: false,
            },
        }
    }
}

impl IpExtractor {
    /// Parse the header value into a normalized IP string.
    pub fn extract(&self, header_value: &str) -> Result<String, &'static str> {
        let candidate = if self.first_of_list {
            header_value.split(',').next().unwrap_or("")
        } else {
            header_value
        };

        candidate
            .trim()
            .parse::<IpAddr>()
            .map(|ip| ip.to_string())
            .map_err(|_| "IP header does not contain a valid address")
    }
}

/// Trait for types that provide access to HTTP headers and extensions.
/// Implemented for both `Parts` and `Request` to allow flexible IP extraction.
pub trait HasHeadersAndExtensions {
    fn headers(&self) -> &axum::http::HeaderMap;
    fn extensions(&self) -> &axum::http::Extensions;
}

impl HasHeadersAndExtensions for Parts {
    fn headers(&self) -> &axum::http::HeaderMap {
        &self.headers
    }
    fn extensions(&self) -> &axum::http::Extensions {
        &self.extensions
    }
}

impl<B> HasHeadersAndExtensions for axum::http::Request<B> {
    fn headers(&self) -> &axum::http::HeaderMap {
        axum::http::Request::headers(self)
    }
    fn extensions(&self) -> &axum::http::Extensions {
        axum::http::Request::extensions(self)
    }
}

/// Extract client IP address based on configuration.
///
/// If `ip_extractor` is set, extracts IP from the configured header and returns an error
/// if the header is missing or invalid (does NOT fall back to SocketAddr).
///
/// If `ip_extractor` is None, uses the SocketAddr from ConnectInfo.
pub fn extract_client_ip<T: HasHeadersAndExtensions>(
    source: &T,
    ip_extractor: Option<&IpExtractor>,
) -> Result<String, &'static str> {
    match ip_extractor {
        Some(extractor) => {
            let header_value = source
                .headers()
                .get(extractor.header_name)
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            extractor.extract(header_value)
        }
        None => source
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
