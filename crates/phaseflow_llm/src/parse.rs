//! Structured-response extraction.

use serde::de::DeserializeOwned;

use crate::client::LlmClient;
use crate::error::{LlmError, LlmResult};

/// The outermost `{ ... }` span in a model response.
///
/// Models often wrap JSON in prose or code fences; everything before the first
/// `{` and after the last `}` is ignored.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a model response into `T`. Anything that does not fit the schema is an error.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> LlmResult<T> {
    let json = extract_json_object(text)
        .ok_or_else(|| LlmError::Malformed("no JSON object in response".to_string()))?;
    serde_json::from_str(json).map_err(|e| LlmError::Malformed(e.to_string()))
}

/// Complete a prompt and parse the response into `T`.
pub async fn complete_structured<T: DeserializeOwned>(
    client: &dyn LlmClient,
    prompt: &str,
) -> LlmResult<T> {
    let text = client.complete(prompt).await?;
    parse_structured(&text)
}
