//! # 限流中间件
//!
//! 客户端标识默认取连接地址；连接来自受信任代理时，
//! 依次取 `X-Forwarded-For` 第一跳与 `X-Real-IP`。

use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::api::server::AppState;
use crate::error::GateError;
use crate::{lwarn, logging::{LogComponent, LogStage}};

/// 无法识别来源时共用的标识
pub const UNKNOWN_CLIENT: &str = "unknown";

/// 解析客户端 IP
///
/// 连接地址未知或不在 `trusted_proxies` 中时忽略转发头。
#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return UNKNOWN_CLIENT.to_string();
    };
    if !trusted_proxies.contains(&peer.ip()) {
        return peer.ip().to_string();
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    peer.ip().to_string()
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    if !state.rate_limiter.is_enabled() {
        return Ok(next.run(request).await);
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(request.headers(), peer, &state.config.rate_limit.trusted_proxies);

    if !state.rate_limiter.allow(&client) {
        lwarn!(
            "system",
            LogStage::Throttle,
            LogComponent::RateLimiter,
            "rate_limited",
            &format!("请求过于频繁: client={client}")
        );
        return Err(GateError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    fn peer() -> Option<SocketAddr> {
        Some("192.168.1.10:55000".parse().unwrap())
    }

    fn trusted() -> Vec<IpAddr> {
        vec!["192.168.1.10".parse().unwrap()]
    }

    fn forwarded_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        headers
    }

    #[test]
    fn test_forwarded_for_first_hop_wins_behind_trusted_proxy() {
        assert_eq!(client_ip(&forwarded_headers(), peer(), &trusted()), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_then_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers, peer(), &trusted()), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new(), peer(), &trusted()), "192.168.1.10");
        assert_eq!(client_ip(&HeaderMap::new(), None, &trusted()), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_untrusted_peer_cannot_spoof_forwarded_headers() {
        assert_eq!(client_ip(&forwarded_headers(), peer(), &[]), "192.168.1.10");
        assert_eq!(client_ip(&forwarded_headers(), None, &trusted()), UNKNOWN_CLIENT);
    }
}
