//! LanguageModel port implementations.
//!
//! The OpenAI-compatible client covers the vast majority of backends
//! (OpenAI, OpenRouter, Ollama, vLLM, and anything else exposing a
//! `/v1/chat/completions` endpoint).

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;
