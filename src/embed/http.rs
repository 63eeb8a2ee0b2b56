use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};

/// POST a JSON body and decode a JSON response, off the async runtime.
///
/// Upstream failures become `AppError::Embed` carrying the provider's own
/// error message when the body has one.
pub async fn post_json<T>(
    agent: &ureq::Agent,
    url: String,
    bearer: Option<&str>,
    body: serde_json::Value,
    label: &'static str,
) -> Result<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let agent = agent.clone();
    let auth = bearer.map(|k| format!("Bearer {k}"));

    tokio::task::spawn_blocking(move || {
        let mut request = agent.post(&url).set("Content-Type", "application/json");
        if let Some(auth) = &auth {
            request = request.set("Authorization", auth);
        }
        match request.send_json(body) {
            Ok(response) => response.into_json::<T>().map_err(|e| {
                AppError::Embed(format!("Invalid response from {label} API: {e}"))
            }),
            Err(ureq::Error::Status(code, response)) => {
                let status_text = response.status_text().to_string();
                let body = response.into_string().unwrap_or_default();
                let message = upstream_message(&body)
                    .unwrap_or_else(|| fallback_message(code, &status_text, &body));
                Err(AppError::Embed(format!("{label} API error: {message}")))
            }
            Err(e) => Err(AppError::Embed(format!("{label} request failed: {e}"))),
        }
    })
    .await
    .map_err(|e| AppError::Other(e.into()))?
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Object { message: Option<String> },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorField,
}

/// Extract `{"error": "..."}` or `{"error": {"message": "..."}}`.
pub fn upstream_message(body: &str) -> Option<String> {
    match serde_json::from_str::<ErrorBody>(body).ok()?.error {
        ErrorField::Text(s) => Some(s),
        ErrorField::Object { message } => message,
    }
}

fn fallback_message(code: u16, status_text: &str, body: &str) -> String {
    if body.trim().is_empty() {
        format!("HTTP {code}: {status_text}")
    } else {
        body.trim().to_string()
    }
}

/// `data` array returned by OpenAI-compatible `/embeddings` endpoints.
#[derive(Debug, Deserialize)]
pub struct DataResponse {
    #[serde(default)]
    pub data: Option<Vec<DataItem>>,
}

#[derive(Debug, Deserialize)]
pub struct DataItem {
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl DataResponse {
    /// Validate item count and presence, returning vectors in request order.
    pub fn into_vectors(self, expected: usize, label: &str) -> Result<Vec<Vec<f32>>> {
        let data = self.data.unwrap_or_default();
        if data.len() != expected {
            return Err(AppError::Embed(format!(
                "Invalid response from {label} API: expected {expected} embeddings, got {}",
                data.len()
            )));
        }
        data.into_iter()
            .enumerate()
            .map(|(i, item)| {
                item.embedding
                    .ok_or_else(|| AppError::Embed(format!("Invalid embedding at index {i}")))
            })
            .collect()
    }
}
