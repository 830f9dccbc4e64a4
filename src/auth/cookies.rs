/// Token transport
///
/// Issued tokens go out both as `HttpOnly; Secure` cookies and in the JSON
/// body. Incoming tokens are read from the cookie first and from the
/// request body or `Authorization` header second.

use actix_web::cookie::{time::Duration, Cookie, CookieBuilder};
use actix_web::HttpRequest;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn base_cookie(name: &'static str, value: String) -> CookieBuilder<'static> {
    Cookie::build(name, value)
        .http_only(true)
        .secure(true)
        .path("/")
}

pub fn access_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    base_cookie(ACCESS_COOKIE, token.to_string())
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

pub fn refresh_cookie(token: &str, max_age_secs: i64) -> Cookie<'static> {
    base_cookie(REFRESH_COOKIE, token.to_string())
        .max_age(Duration::seconds(max_age_secs))
        .finish()
}

/// Expired cookie with the same flags and path as the one it replaces
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = base_cookie(name, String::new()).finish();
    cookie.make_removal();
    cookie
}

/// Blank values count as absent; anything else is passed on byte for byte
fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Refresh token from the `refreshToken` cookie, falling back to the body field
pub fn refresh_token_from(req: &HttpRequest, body_value: Option<&str>) -> Option<String> {
    req.cookie(REFRESH_COOKIE)
        .and_then(|cookie| non_empty(cookie.value()))
        .or_else(|| body_value.and_then(non_empty))
}

/// Access token from the `accessToken` cookie value, falling back to `Authorization: Bearer`
pub fn access_token_from(cookie_value: Option<&str>, authorization: Option<&str>) -> Option<String> {
    cookie_value.and_then(non_empty).or_else(|| {
        authorization
            .and_then(|header| header.strip_prefix("Bearer "))
            .and_then(non_empty)
    })
}
