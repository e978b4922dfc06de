//! Shared helpers for the HTTP provider adapters.

/// Describe a failed request without leaking the URL.
///
/// Timeouts always read "request timed out" so they classify as timeouts.
/// Gemini passes its key in the query string, so the URL never reaches a
/// message that could end up in a chat.
pub(crate) fn request_failed(e: reqwest::Error) -> String {
    if e.is_timeout() {
        return "HTTP request timed out".to_string();
    }
    redact_url_key(&format!("HTTP request failed: {}", e.without_url()))
}

/// Replace the value of any `key=` query parameter.
pub(crate) fn redact_url_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("key=") {
        out.push_str(&rest[..idx + 4]);
        out.push_str("[REDACTED]");
        let tail = &rest[idx + 4..];
        let end = tail
            .find(|c: char| c == '&' || c == ')' || c.is_whitespace())
            .unwrap_or(tail.len());
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider_error::{ProviderErrorKind, classify};
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_redact_url_key() {
        assert_eq!(
            redact_url_key("http://h/x:gen?key=AIzaSECRET&alt=sse"),
            "http://h/x:gen?key=[REDACTED]&alt=sse"
        );
        assert_eq!(
            redact_url_key("failed (http://h/x?key=AIzaSECRET)"),
            "failed (http://h/x?key=[REDACTED])"
        );
        assert_eq!(redact_url_key("no secrets here"), "no secrets here");
    }

    #[tokio::test]
    async fn test_timeout_is_classified_and_url_dropped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let err = client
            .post(format!("{}/v1?key=AIzaSECRET", server.uri()))
            .send()
            .await
            .unwrap_err();

        let text = request_failed(err);
        assert!(!text.contains("AIzaSECRET"));
        assert_eq!(classify(&text), ProviderErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_connection_error_drops_url() {
        let client = reqwest::Client::new();
        let err = client
            .get("http://127.0.0.1:1/v1?key=AIzaSECRET")
            .send()
            .await
            .unwrap_err();
        let text = request_failed(err);
        assert!(text.starts_with("HTTP request failed"));
        assert!(!text.contains("AIzaSECRET"));
    }
}
