//! 端点解析

use http::Uri;

use crate::error::{BalancerError, Result};

/// 根据是否加密得到期望的协议名，如 `grpc` / `grpcs`
pub fn scheme_for(base: &str, secure: bool) -> String {
    if secure {
        format!("{base}s")
    } else {
        base.to_string()
    }
}

/// 校验端点协议并返回 `host:port`
pub fn parse_endpoint(raw: &str, scheme: &str) -> Result<String> {
    let uri: Uri = raw
        .parse()
        .map_err(|e: http::uri::InvalidUri| BalancerError::invalid_endpoint(raw, e.to_string()))?;

    match uri.scheme_str() {
        Some(s) if s == scheme => {}
        Some(s) => {
            return Err(BalancerError::invalid_endpoint(
                raw,
                format!("scheme {s} does not match {scheme}"),
            ));
        }
        None => return Err(BalancerError::invalid_endpoint(raw, "missing scheme")),
    }

    let authority = uri
        .authority()
        .ok_or_else(|| BalancerError::invalid_endpoint(raw, "missing host"))?;
    let host = authority.host();
    if host.is_empty() {
        return Err(BalancerError::invalid_endpoint(raw, "missing host"));
    }

    Ok(match authority.port_u16() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// 端点是否声明了 `isSecure=true`
pub fn is_secure(raw: &str) -> bool {
    let Ok(uri) = raw.parse::<Uri>() else {
        return false;
    };
    uri.query()
        .map(|query| {
            query.split('&').any(|pair| {
                pair.split_once('=')
                    .map(|(k, v)| k == "isSecure" && v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}
