//! Built-in tool implementations for WorkLoom agents.
//!
//! A deliberately small set: `echo` for diagnostics and loop testing,
//! `file_read` for workspace inspection, `http_fetch` for pulling a URL
//! into the transcript.

pub mod echo;
pub mod file_read;
pub mod http_fetch;

use workloom_core::error::ToolError;
use workloom_core::tool::ToolRegistry;

/// Create a registry with all built-in tools.
pub fn builtin_registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(echo::EchoTool))?;
    registry.register(Box::new(file_read::FileReadTool::new()))?;
    registry.register(Box::new(http_fetch::HttpFetchTool::new()))?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_all_tools() {
        let registry = builtin_registry().unwrap();
        let mut names: Vec<&str> = registry.names();
        names.sort();
        assert_eq!(names, vec!["echo", "file_read", "http_fetch"]);
    }
}
