use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// How an HTTP-backed provider reacts to `429 Too Many Requests`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Exponential backoff for the given zero-based attempt, saturating on overflow.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        match 1u32.checked_shl(attempt) {
            Some(factor) => self
                .base_backoff
                .checked_mul(factor)
                .unwrap_or(Duration::MAX),
            None => Duration::MAX,
        }
    }
}

/// `Retry-After` in seconds when present and numeric, otherwise the policy backoff.
pub(crate) fn retry_delay(
    response: &reqwest::Response,
    policy: &RetryPolicy,
    attempt: u32,
) -> Duration {
    if let Some(val) = response.headers().get(reqwest::header::RETRY_AFTER)
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    policy.backoff(attempt)
}

/// Send an HTTP request, retrying on 429 responses according to `policy`.
///
/// `f` builds and sends a fresh request on each call. The first non-429
/// response is returned as-is for the caller to inspect.
///
/// # Errors
///
/// Returns `LlmError::RateLimited` if every attempt is rate limited, or the
/// transport error wrapped as `LlmError::Http`.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    for attempt in 0..=policy.max_retries {
        let response = f().await?;

        if response.status() != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }
        if attempt == policy.max_retries {
            break;
        }

        let delay = retry_delay(&response, policy, attempt);
        tracing::warn!(
            provider = provider_name,
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay_secs = delay.as_secs(),
            "rate limited, backing off"
        );
        tokio::time::sleep(delay).await;
    }

    Err(LlmError::RateLimited)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(64), Duration::MAX);
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = format!("{}/ok", server.uri());
        let result = send_with_retry("test", &fast_policy(3), || client.get(&url).send()).await;

        assert_eq!(result.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn succeeds_after_one_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let result = send_with_retry("test", &fast_policy(2), || client.get(&url).send()).await;

        assert_eq!(result.unwrap().status(), 200);
    }

    #[tokio::test]
    async fn exhausted_retries_return_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let result = send_with_retry("test", &fast_policy(1), || client.get(&url).send()).await;

        assert!(
            matches!(result, Err(LlmError::RateLimited)),
            "expected RateLimited, got: {result:?}"
        );
    }

    #[tokio::test]
    async fn non_429_errors_are_returned_to_caller() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let url = server.uri();
        let result = send_with_retry("test", &fast_policy(3), || client.get(&url).send()).await;

        assert_eq!(result.unwrap().status(), 500);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn backoff_is_monotonic(attempt in 0u32..40) {
            let policy = RetryPolicy::default();
            prop_assert!(policy.backoff(attempt + 1) >= policy.backoff(attempt));
        }
    }
}
