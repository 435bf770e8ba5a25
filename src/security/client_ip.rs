/// Client identifier derivation
///
/// Precedence: `X-Real-IP`, then the first entry of `X-Forwarded-For`, then
/// the socket peer address. Proxy headers are ignored unless the deployment
/// sits behind a proxy that sets them.

use actix_web::dev::ServiceRequest;
use actix_web::http::header::HeaderMap;
use std::net::SocketAddr;

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

pub fn resolve_client_ip(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy_headers: bool,
) -> String {
    if trust_proxy_headers {
        let real_ip = headers
            .get(X_REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }

        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn client_ip(req: &ServiceRequest, trust_proxy_headers: bool) -> String {
    resolve_client_ip(req.headers(), req.peer_addr(), trust_proxy_headers)
}
