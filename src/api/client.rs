//! Game REST API client

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use crate::config::Config;

/// `status` field every API response carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// `{status, message?, ...payload}` response body
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: T,
}

/// Client for the `/{app}/{view}/` endpoints behind the page origin
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    origin: String,
    access_token: Option<String>,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self::with_origin(
            config.origin.clone(),
            config.access_token.clone(),
            config.csrf_token.clone(),
        )
    }

    pub fn with_origin(
        origin: impl Into<String>,
        access_token: Option<String>,
        csrf_token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            origin: origin.into().trim_end_matches('/').to_string(),
            access_token,
            csrf_token,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Get the URL for a view, e.g. `game/get_game_status/<id>`
    pub fn view_url(&self, app: &str, view: &str) -> String {
        format!("{}/{}/{}/", self.origin, app, view.trim_matches('/'))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = match &self.csrf_token {
            Some(token) => builder.header("X-CSRFToken", token),
            None => builder,
        };
        match &self.access_token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        }
    }

    /// Make an authenticated GET request
    pub async fn get<T: DeserializeOwned>(&self, app: &str, view: &str) -> Result<T, ApiError> {
        let url = self.view_url(app, view);
        debug!(%url, "GET");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(ApiError::Request)?;

        Self::read_envelope(response).await
    }

    /// Make an authenticated POST request with a form body
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        app: &str,
        view: &str,
        form: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = self.view_url(app, view);
        debug!(%url, fields = form.len(), "POST");

        let response = self
            .authorize(self.client.post(&url))
            .form(form)
            .send()
            .await
            .map_err(ApiError::Request)?;

        Self::read_envelope(response).await
    }

    async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        let status = response.status().as_u16();
        let body = response.text().await.map_err(ApiError::Request)?;
        decode_envelope(status, &body)
    }
}

/// Decode a response body into its payload.
///
/// A body with `status: "error"` becomes [`ApiError::Rejected`] whatever the
/// HTTP status; a non-JSON body on a failed request becomes [`ApiError::Api`].
pub fn decode_envelope<T: DeserializeOwned>(http_status: u16, body: &str) -> Result<T, ApiError> {
    let envelope: Envelope<serde_json::Value> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !(200..300).contains(&http_status) => {
            return Err(ApiError::Api {
                status: http_status,
                body: body.to_string(),
            });
        }
        Err(e) => return Err(ApiError::Parse(e)),
    };

    match envelope.status {
        ResponseStatus::Error => Err(ApiError::Rejected {
            message: envelope
                .message
                .unwrap_or_else(|| format!("request failed with status {http_status}")),
        }),
        ResponseStatus::Success => serde_json::from_value(envelope.payload).map_err(ApiError::Parse),
    }
}

/// API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{message}")]
    Rejected { message: String },
}

impl ApiError {
    /// Text suitable for a status line
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message } => message.clone(),
            ApiError::Api { status, .. } => format!("Server error ({status})"),
            ApiError::Request(_) => "Network error, please try again".to_string(),
            ApiError::Parse(_) => "Unexpected server response".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::IgnoredAny;
    use uuid::Uuid;

    #[derive(Debug, Deserialize)]
    struct Created {
        game_id: Uuid,
    }

    #[test]
    fn success_payload_is_flattened() {
        let id = Uuid::new_v4();
        let body = format!(r#"{{"status":"success","game_id":"{id}"}}"#);
        let created: Created = decode_envelope(200, &body).unwrap();
        assert_eq!(created.game_id, id);
    }

    #[test]
    fn error_status_carries_the_message() {
        let body = r#"{"status":"error","message":"Friend not found"}"#;
        let err = decode_envelope::<IgnoredAny>(400, body).unwrap_err();
        assert!(matches!(&err, ApiError::Rejected { message } if message == "Friend not found"));
        assert_eq!(err.user_message(), "Friend not found");

        let err = decode_envelope::<IgnoredAny>(200, r#"{"status":"error"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Rejected { .. }));
    }

    #[test]
    fn non_json_failure_is_an_api_error() {
        let err = decode_envelope::<IgnoredAny>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 502, .. }));

        let err = decode_envelope::<IgnoredAny>(200, "not json").unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[test]
    fn missing_payload_field_is_a_parse_error() {
        let err = decode_envelope::<Created>(200, r#"{"status":"success"}"#).unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[test]
    fn view_urls() {
        let api = ApiClient::with_origin("https://pong.example/", None, None);
        assert_eq!(
            api.view_url("game", "get_game_status/42"),
            "https://pong.example/game/get_game_status/42/"
        );
        assert_eq!(api.view_url("game", "/create_local_game/"), "https://pong.example/game/create_local_game/");
    }
}
