//! Shared HTTP response helpers for provider clients.
//!
//! Centralizes status-code checks (rate limiting with `Retry-After`
//! parsing, credential rejection, missing entities, other non-success
//! statuses) so individual provider modules stay focused on request
//! construction and response mapping.

use reqwest::StatusCode;

use crate::error::RemoteError;

/// Check an HTTP response for common error conditions.
///
/// Returns the response unchanged on success. Handles:
/// - **429**, or **403** with an exhausted `X-RateLimit-Remaining` →
///   [`RemoteError::RateLimited`] (`Retry-After` parsed, 60 s fallback).
/// - **401 / 403** → [`RemoteError::Unauthorized`].
/// - **404 / 410** → [`RemoteError::NotFound`] carrying the request URL.
/// - **Other non-success** → [`RemoteError::Api`] with the response body.
pub async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = resp.status();
    if !status.is_success() {
        tracing::debug!(status = status.as_u16(), url = %resp.url(), "provider request failed");
    }
    if status == StatusCode::TOO_MANY_REQUESTS || is_exhausted_rate_limit(&resp) {
        return Err(RemoteError::RateLimited {
            retry_after_secs: parse_retry_after(&resp),
        });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(RemoteError::NotFound(resp.url().to_string()));
    }
    if !status.is_success() {
        return Err(RemoteError::Api {
            status: status.as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}

/// Turn a not-found error into `None`.
pub fn found<T>(result: Result<T, RemoteError>) -> Result<Option<T>, RemoteError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RemoteError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// The `rel="next"` target of an RFC 8288 `Link` header, if any.
pub fn next_link(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let value = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    value.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| matches!(param.trim(), "rel=\"next\"" | "rel=next"));
        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}

fn is_exhausted_rate_limit(resp: &reqwest::Response) -> bool {
    resp.status() == StatusCode::FORBIDDEN
        && resp
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

/// Parse the `Retry-After` header as seconds, falling back to 60 s.
fn parse_retry_after(resp: &reqwest::Response) -> u64 {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_response(status: u16) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .body("")
                .unwrap(),
        )
    }

    fn mock_response_with_header(status: u16, name: &str, value: &str) -> reqwest::Response {
        reqwest::Response::from(
            ::http::Response::builder()
                .status(status)
                .header(name, value)
                .body("")
                .unwrap(),
        )
    }

    #[test]
    fn next_link_picks_the_next_relation() {
        let resp = mock_response_with_header(
            200,
            "Link",
            r#"<https://api.github.com/search/issues?q=x&page=2>; rel="next", <https://api.github.com/search/issues?q=x&page=5>; rel="last""#,
        );
        assert_eq!(
            next_link(resp.headers()).as_deref(),
            Some("https://api.github.com/search/issues?q=x&page=2")
        );
    }

    #[test]
    fn next_link_absent_on_last_page() {
        let resp = mock_response_with_header(
            200,
            "Link",
            r#"<https://api.github.com/search/issues?q=x&page=1>; rel="prev""#,
        );
        assert_eq!(next_link(resp.headers()), None);
        assert_eq!(next_link(mock_response(200).headers()), None);
    }

    #[test]
    fn parse_retry_after_from_header() {
        let resp = mock_response_with_header(429, "Retry-After", "120");
        assert_eq!(parse_retry_after(&resp), 120);
    }

    #[test]
    fn parse_retry_after_missing_or_bad_header() {
        assert_eq!(parse_retry_after(&mock_response(429)), 60);
        let resp = mock_response_with_header(429, "Retry-After", "soon");
        assert_eq!(parse_retry_after(&resp), 60);
    }

    #[tokio::test]
    async fn check_response_rate_limited() {
        let resp = mock_response_with_header(429, "Retry-After", "30");
        let err = check_response(resp).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::RateLimited {
                retry_after_secs: 30
            }
        ));
    }

    #[tokio::test]
    async fn exhausted_403_is_rate_limit_not_revocation() {
        let resp = mock_response_with_header(403, "X-RateLimit-Remaining", "0");
        let err = check_response(resp).await.unwrap_err();
        assert!(err.is_transient());
        assert!(!err.is_revoked());
    }

    #[tokio::test]
    async fn check_response_unauthorized() {
        let err = check_response(mock_response(401)).await.unwrap_err();
        assert!(err.is_revoked());
    }

    #[tokio::test]
    async fn check_response_not_found() {
        let err = check_response(mock_response(404)).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(matches!(found::<()>(Err(err)), Ok(None)));
    }

    #[tokio::test]
    async fn check_response_api_error() {
        let err = check_response(mock_response(500)).await.unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn check_response_success() {
        assert!(check_response(mock_response(200)).await.is_ok());
    }
}
