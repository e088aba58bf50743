//! Credential cookie extraction.
//!
//! A missing or invalid cookie is not a rejection: the handler receives no
//! identity and the operation's own authorization check decides.

use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap},
};
use cookie::Cookie;

use crate::auth::Identity;
use crate::state::AppState;

/// Extractor that yields the verified caller, if any.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
///     match identity {
///         Some(i) => format!("Hello, {}!", i.email),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct CurrentIdentity(pub Option<Identity>);

impl CurrentIdentity {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let identity = cookie_value(&parts.headers, &state.cookie_name).and_then(|token| state.verifier.verify(&token));
        Ok(Self(identity))
    }
}

/// Finds the cookie called `name` across every `Cookie` header, percent-decoded.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse_encoded)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("lang=ar; token=abc.def.ghi"));
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(cookie_value(&headers, "token").as_deref(), Some("abc.def.ghi"));
        assert_eq!(cookie_value(&headers, "theme").as_deref(), Some("dark"));
        assert_eq!(cookie_value(&headers, "session"), None);
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("admin_token=x; token2=y"));
        assert_eq!(cookie_value(&headers, "token"), None);
    }

    #[test]
    fn test_cookie_value_is_decoded() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("token=\"a%2Eb.c\"; broken"));
        assert_eq!(cookie_value(&headers, "token").as_deref(), Some("a.b.c"));
    }
}
