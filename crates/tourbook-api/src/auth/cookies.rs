//! Session cookie helpers

use axum::http::{header, HeaderMap, HeaderValue};
use cookie::{time::Duration, Cookie, SameSite};
use tourbook_core::CookieConfig;

/// HttpOnly, SameSite=None cookie living as long as the token it carries
pub fn session_cookie(
    name: &str,
    value: &str,
    max_age_secs: u64,
    config: &CookieConfig,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .max_age(Duration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::None)
        .build();

    if let Some(domain) = config.domain.as_deref().filter(|d| !d.is_empty()) {
        cookie.set_domain(domain.to_string());
    }

    cookie
}

/// Expired, empty cookie that makes the browser drop `name`
pub fn cleared_cookie(name: &str, config: &CookieConfig) -> Cookie<'static> {
    session_cookie(name, "", 0, config)
}

fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!(cookie = %cookie.name(), error = %e, "Unencodable cookie dropped"),
    }
}

/// Set `accessToken` and `refreshToken` on a response
pub fn set_session_cookies(
    headers: &mut HeaderMap,
    config: &CookieConfig,
    access_token: &str,
    access_ttl_secs: u64,
    refresh_token: &str,
    refresh_ttl_secs: u64,
) {
    append(
        headers,
        &session_cookie(&config.access_name, access_token, access_ttl_secs, config),
    );
    append(
        headers,
        &session_cookie(&config.refresh_name, refresh_token, refresh_ttl_secs, config),
    );
}

/// Replace only the access cookie (after a refresh)
pub fn set_access_cookie(
    headers: &mut HeaderMap,
    config: &CookieConfig,
    access_token: &str,
    access_ttl_secs: u64,
) {
    append(
        headers,
        &session_cookie(&config.access_name, access_token, access_ttl_secs, config),
    );
}

/// Clear both session cookies
pub fn clear_session_cookies(headers: &mut HeaderMap, config: &CookieConfig) {
    append(headers, &cleared_cookie(&config.access_name, config));
    append(headers, &cleared_cookie(&config.refresh_name, config));
}

/// Value of the first non-empty cookie called `name` in the request
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_string()))
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie_attributes() {
        let config = CookieConfig::default();
        let rendered = session_cookie("accessToken", "abc.def.ghi", 3600, &config).to_string();

        assert!(rendered.starts_with("accessToken=abc.def.ghi"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("SameSite=None"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=3600"));
    }

    #[test]
    fn test_insecure_cookie_with_domain() {
        let config = CookieConfig {
            secure: false,
            domain: Some("tours.example.com".to_string()),
            ..Default::default()
        };
        let rendered = session_cookie("refreshToken", "r", 60, &config).to_string();

        assert!(!rendered.contains("Secure"));
        assert!(rendered.contains("Domain=tours.example.com"));
    }

    #[test]
    fn test_clear_sets_both_cookies_expired() {
        let mut headers = HeaderMap::new();
        clear_session_cookies(&mut headers, &CookieConfig::default());

        let values: Vec<_> = headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.contains("Max-Age=0")));
        assert!(values[0].starts_with("accessToken="));
        assert!(values[1].starts_with("refreshToken="));
    }

    #[test]
    fn test_read_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; accessToken=tok123; refreshToken="),
        );

        assert_eq!(read_cookie(&headers, "accessToken").as_deref(), Some("tok123"));
        assert_eq!(read_cookie(&headers, "refreshToken"), None);
        assert_eq!(read_cookie(&headers, "missing"), None);
        assert_eq!(read_cookie(&HeaderMap::new(), "accessToken"), None);
    }
}
