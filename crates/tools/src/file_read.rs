//! File read tool — UTF-8 text files only, capped at 1 MiB.

use async_trait::async_trait;
use tracing::debug;
use workloom_core::error::ToolError;
use workloom_core::tool::{Tool, ToolOutput};

/// Files larger than this are refused outright rather than truncated,
/// so the model never reasons over a silently clipped document.
const MAX_FILE_BYTES: u64 = 1024 * 1024;

pub struct FileReadTool {
    max_bytes: u64,
}

impl FileReadTool {
    pub fn new() -> Self {
        Self {
            max_bytes: MAX_FILE_BYTES,
        }
    }

    #[cfg(test)]
    fn with_max_bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read a UTF-8 text file from the local filesystem and return its contents."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> std::result::Result<ToolOutput, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool_name: "file_read".into(),
                reason: "missing 'path'".into(),
            })?;

        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: "file_read".into(),
            reason,
        };

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| failed(format!("cannot stat '{path}': {e}")))?;
        if !metadata.is_file() {
            return Err(failed(format!("'{path}' is not a regular file")));
        }
        if metadata.len() > self.max_bytes {
            return Err(failed(format!(
                "'{path}' is {} bytes, exceeding the {} byte limit",
                metadata.len(),
                self.max_bytes
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| failed(format!("cannot read '{path}': {e}")))?;
        let content = String::from_utf8(bytes)
            .map_err(|_| failed(format!("'{path}' is not valid UTF-8")))?;

        debug!(path, bytes = content.len(), "Read file");
        Ok(ToolOutput::text(content))
    }
}
