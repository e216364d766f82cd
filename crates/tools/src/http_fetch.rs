//! HTTP fetch tool — GET a URL and return the body text.
//!
//! Only `http`/`https` schemes are accepted and the body is capped at
//! 256 KiB so a pathological endpoint cannot flood the transcript.

use async_trait::async_trait;
use tracing::debug;
use workloom_core::error::ToolError;
use workloom_core::tool::{Tool, ToolOutput};

const MAX_BODY_BYTES: usize = 256 * 1024;

pub struct HttpFetchTool {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl HttpFetchTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

impl Default for HttpFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HttpFetchTool {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetch the contents of an http or https URL with a GET request."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http or https URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let url = arguments
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "http_fetch".into(),
                reason: "missing 'url'".into(),
            })?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidArguments {
                tool_name: "http_fetch".into(),
                reason: format!("unsupported scheme in '{url}'; only http/https allowed"),
            });
        }

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "http_fetch".into(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(format!("request to '{url}' failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| failed(format!("reading body from '{url}' failed: {e}")))?;

        let mut content = body;
        if content.len() > self.max_body_bytes {
            let mut cut = self.max_body_bytes;
            while !content.is_char_boundary(cut) {
                cut -= 1;
            }
            content.truncate(cut);
            content.push_str("\n[truncated]");
        }

        debug!(url, status = status.as_u16(), bytes = content.len(), "Fetched URL");
        Ok(ToolOutput {
            content,
            data: Some(serde_json::json!({ "status": status.as_u16() })),
        })
    }
}
