use axum::http::HeaderMap;
use lc_forms::submission::ClientInfo;
use std::net::SocketAddr;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The submitting client's address and user agent.
///
/// `X-Forwarded-For: <client>, <proxy1>, <proxy2>` wins, then `X-Real-IP`, then the
/// socket peer.
pub fn client_info(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientInfo {
    let forwarded = header(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let ip_address = forwarded
        .or_else(|| header(headers, "x-real-ip"))
        .map(str::to_string)
        .or_else(|| peer.map(|p| p.ip().to_string()));

    ClientInfo {
        ip_address,
        user_agent: header(headers, "user-agent").map(str::to_string),
    }
}

pub fn referrer(headers: &HeaderMap) -> Option<&str> {
    header(headers, "referer")
}
