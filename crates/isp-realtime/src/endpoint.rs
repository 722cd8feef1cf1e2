//! Endpoint resolution
//!
//! An explicit URL wins. Without one, the endpoint is derived from the
//! dashboard's origin: `https` pages talk `wss`, everything else talks `ws`.

use crate::error::{ClientError, ClientResult};
use url::Url;

/// Default socket path appended to an origin
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Resolve the socket URL from an explicit URL or an origin plus path
pub fn resolve_endpoint(explicit: Option<&str>, origin: Option<&str>, path: &str) -> ClientResult<Url> {
    match (explicit, origin) {
        (Some(url), _) => parse_ws_url(url),
        (None, Some(origin)) => derive_from_origin(origin, path),
        (None, None) => Err(ClientError::MissingEndpoint),
    }
}

/// Parse an explicit endpoint, which must already be `ws` or `wss`
pub fn parse_ws_url(raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ClientError::invalid_endpoint(raw, e))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ClientError::invalid_endpoint(raw, "missing host"));
    }

    Ok(url)
}

/// Build `ws[s]://<host>[:port]<path>` from a page origin
pub fn derive_from_origin(origin: &str, path: &str) -> ClientResult<Url> {
    let mut url = Url::parse(origin.trim()).map_err(|e| ClientError::invalid_endpoint(origin, e))?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => return Err(ClientError::UnsupportedScheme(other.to_string())),
    };
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ClientError::invalid_endpoint(origin, "missing host"));
    }

    url.set_scheme(scheme)
        .map_err(|()| ClientError::invalid_endpoint(origin, "cannot switch to websocket scheme"))?;

    let path = path.trim();
    if path.is_empty() {
        url.set_path(DEFAULT_WS_PATH);
    } else if path.starts_with('/') {
        url.set_path(path);
    } else {
        url.set_path(&format!("/{path}"));
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}
