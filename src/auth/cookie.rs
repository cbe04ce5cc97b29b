//! Cookie parsing and construction for token transport.

use axum::http::header;

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "access_token";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

/// Both token cookies are scoped to the API.
const COOKIE_PATH: &str = "/api";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Build a `Set-Cookie` value carrying a token.
pub fn token_cookie(name: &str, token: &str, max_age: u64, secure: bool) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path={}; Max-Age={}{}",
        name,
        token,
        COOKIE_PATH,
        max_age,
        secure_suffix(secure)
    )
}

/// Build a `Set-Cookie` value that removes a token cookie.
pub fn clear_cookie(name: &str, secure: bool) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path={}; Max-Age=0{}",
        name,
        COOKIE_PATH,
        secure_suffix(secure)
    )
}

fn secure_suffix(secure: bool) -> &'static str {
    if secure { "; Secure" } else { "" }
}
