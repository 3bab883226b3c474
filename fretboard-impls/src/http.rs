use fretboard_core::{ProviderError, ProviderResult};
use log::warn;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Sent to sites that turn away requests without a browser-like agent
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:126.0) Gecko/20100101 Firefox/126.0";

pub(crate) fn request_error(error: reqwest::Error) -> ProviderError {
    ProviderError::Request(error.to_string())
}

pub(crate) fn parse_error(error: impl ToString) -> ProviderError {
    ProviderError::Parse(error.to_string())
}

/// Fails with the status and the provider's message unless the response is a success
pub(crate) async fn ensure_success(response: Response) -> ProviderResult<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    warn!("{} answered {}: {}", url.host_str().unwrap_or_default(), status, message);

    Err(ProviderError::Status {
        code: status.as_u16(),
        message,
    })
}

pub(crate) async fn json<T>(response: Response) -> ProviderResult<T>
where
    T: DeserializeOwned,
{
    ensure_success(response)
        .await?
        .json::<T>()
        .await
        .map_err(parse_error)
}

/// Pulls the human readable part out of an error body, which every provider shapes differently
fn error_message(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.chars().take(200).collect(),
    };

    let candidates = [
        &value["error"]["message"],
        &value["error_description"],
        &value["error"],
        &value["message"],
    ];

    let message = candidates
        .into_iter()
        .find_map(|v| v.as_str())
        .map(String::from)
        .unwrap_or_else(|| body.chars().take(200).collect());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_messages_in_error_bodies() {
        assert_eq!(
            error_message(r#"{"error":{"message":"No such customer"}}"#),
            "No such customer"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Bad code"}"#),
            "Bad code"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
