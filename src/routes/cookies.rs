use axum_extra::extract::PrivateCookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;
use ulid::Ulid;

/// Create the session-binding cookie for an authorization attempt.
pub(super) fn session_cookie(
    name: &str,
    session_id: &str,
    ttl_minutes: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name.to_string(), session_id.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::minutes(ttl_minutes))
        .build()
}

/// Create the removal cookie for the session binding.
pub(super) fn clear_session_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), ""))
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

/// Get the bound session id from cookies, if present and well-formed.
pub(super) fn get_session_id(jar: &PrivateCookieJar, name: &str) -> Option<Ulid> {
    jar.get(name).and_then(|c| c.value().parse::<Ulid>().ok())
}
