//! Bounded retry for bearer-token requests.

use super::http::HttpResponse;
use anyhow::Result;

pub fn is_auth_status(status: u16) -> bool {
    status == 401 || status == 403
}

/// Runs `request` with the caller's current token, and on an authentication
/// failure refreshes once and retries once.
///
/// `request` receives `None` on the first attempt (use the current token)
/// and `Some(new_token)` on the retry. A refresh error propagates; a refresh
/// that yields an empty token (nothing to refresh) returns the original
/// still-failing response. There is never more than one retry, so a
/// permanently invalid credential cannot loop while a single stale-token
/// race still recovers.
pub fn retry_once_on_auth<Req, Ref>(mut request: Req, refresh: Ref) -> Result<HttpResponse>
where
    Req: FnMut(Option<&str>) -> Result<HttpResponse>,
    Ref: FnOnce() -> Result<String>,
{
    let first = request(None)?;
    if !is_auth_status(first.status) {
        return Ok(first);
    }

    let token = refresh()?;
    if token.is_empty() {
        return Ok(first);
    }

    request(Some(&token))
}
