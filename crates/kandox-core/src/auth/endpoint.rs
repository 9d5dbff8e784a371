//! Fixed auth endpoint paths and the unauthenticated-endpoint predicate.

pub const LOGIN_PATH: &str = "/api/v1/auth/login";
pub const REFRESH_PATH: &str = "/api/v1/auth/refresh";
pub const ACCOUNT_PATH: &str = "/api/v1/auth/account";
pub const LOGOUT_PATH: &str = "/api/v1/auth/logout";

/// Endpoints that must never carry the stored credential or trigger a refresh.
const AUTH_ENDPOINTS: [&str; 2] = [LOGIN_PATH, REFRESH_PATH];

/// Reduce a target to its path relative to the origin: drops scheme/host
/// when absolute, one leading `/`, and any query string or fragment.
///
/// `api/v1/x` and `/api/v1/x` resolve to the same URL, so both reduce to
/// `api/v1/x`.
fn request_path(url: &str) -> &str {
    let path = match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => url,
    };
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    path.strip_prefix('/').unwrap_or(path)
}

fn targets(url: &str, endpoint: &str) -> bool {
    request_path(url) == request_path(endpoint)
}

/// Is this target one of the bootstrap endpoints (login, refresh)?
pub fn is_auth_endpoint(url: &str) -> bool {
    AUTH_ENDPOINTS.iter().any(|endpoint| targets(url, endpoint))
}

pub fn is_refresh_endpoint(url: &str) -> bool {
    targets(url, REFRESH_PATH)
}
