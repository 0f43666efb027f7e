//! Provider failure classification.
//!
//! Structured signals (error variant, HTTP status, vendor error type) are
//! consulted first. Only when none applies does the message text get matched
//! against the configured marker lists.

use domiclaw_core::agent::LoopConfig;
use domiclaw_core::error::ProviderError;

/// What the loop should do about a failed model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; back off and retry.
    RateLimited,
    /// The transcript no longer fits; run recovery.
    ContextOverflow,
    /// Anything else ends the run.
    Fatal,
}

pub fn classify(err: &ProviderError, config: &LoopConfig) -> ErrorClass {
    if matches!(err, ProviderError::Cancelled) {
        return ErrorClass::Fatal;
    }

    if matches!(err, ProviderError::RateLimited { .. })
        || err.status_code() == Some(429)
        || err.error_type() == Some("rate_limit_error")
    {
        return ErrorClass::RateLimited;
    }
    if err.error_type() == Some("context_length_exceeded") {
        return ErrorClass::ContextOverflow;
    }

    // Overflow markers go first: "too many" also matches "too many tokens".
    let message = err.to_string().to_lowercase();
    if matches_any(&message, &config.overflow_markers) {
        ErrorClass::ContextOverflow
    } else if matches_any(&message, &config.rate_limit_markers) {
        ErrorClass::RateLimited
    } else {
        ErrorClass::Fatal
    }
}

fn matches_any(message: &str, markers: &[String]) -> bool {
    markers
        .iter()
        .any(|m| !m.is_empty() && message.contains(&m.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status_code: u16, error_type: Option<&str>, message: &str) -> ProviderError {
        ProviderError::Api {
            status_code,
            error_type: error_type.map(String::from),
            message: message.into(),
        }
    }

    #[test]
    fn structured_rate_limits() {
        let cfg = LoopConfig::default();
        assert_eq!(
            classify(&ProviderError::RateLimited { message: "slow down".into() }, &cfg),
            ErrorClass::RateLimited
        );
        assert_eq!(classify(&api(429, None, "x"), &cfg), ErrorClass::RateLimited);
        assert_eq!(
            classify(
                &ProviderError::Stream {
                    error_type: "rate_limit_error".into(),
                    message: "x".into()
                },
                &cfg
            ),
            ErrorClass::RateLimited
        );
    }

    #[test]
    fn structured_overflow_code() {
        let cfg = LoopConfig::default();
        assert_eq!(
            classify(&api(400, Some("context_length_exceeded"), "too long"), &cfg),
            ErrorClass::ContextOverflow
        );
    }

    #[test]
    fn overflow_by_message() {
        let cfg = LoopConfig::default();
        let err = api(
            400,
            Some("invalid_request_error"),
            "This model's Maximum Context Length is 200000 tokens, you requested 204290",
        );
        assert_eq!(classify(&err, &cfg), ErrorClass::ContextOverflow);
    }

    #[test]
    fn rate_limit_by_message() {
        let cfg = LoopConfig::default();
        let err = ProviderError::Network("upstream said: Too Many Requests".into());
        assert_eq!(classify(&err, &cfg), ErrorClass::RateLimited);

        let err = api(503, None, "Too many concurrent requests for this model");
        assert_eq!(classify(&err, &cfg), ErrorClass::RateLimited);
    }

    #[test]
    fn status_digits_in_text_are_not_a_rate_limit() {
        let cfg = LoopConfig::default();
        let err = api(500, Some("api_error"), "Internal server error (request req_01429abc)");
        assert_eq!(classify(&err, &cfg), ErrorClass::Fatal);
    }

    #[test]
    fn too_many_tokens_is_overflow_not_rate_limit() {
        let cfg = LoopConfig::default();
        let err = api(400, Some("invalid_request_error"), "too many tokens in prompt");
        assert_eq!(classify(&err, &cfg), ErrorClass::ContextOverflow);
    }

    #[test]
    fn markers_are_configurable() {
        let mut cfg = LoopConfig::default();
        cfg.overflow_markers = vec!["prompt is too long".into()];
        let err = api(400, Some("invalid_request_error"), "prompt is too long: 210000 tokens");
        assert_eq!(classify(&err, &cfg), ErrorClass::ContextOverflow);

        cfg.overflow_markers.clear();
        assert_eq!(classify(&err, &cfg), ErrorClass::Fatal);
    }

    #[test]
    fn other_failures_are_fatal() {
        let cfg = LoopConfig::default();
        assert_eq!(classify(&api(401, Some("authentication_error"), "bad key"), &cfg), ErrorClass::Fatal);
        assert_eq!(classify(&ProviderError::Cancelled, &cfg), ErrorClass::Fatal);
    }
}
