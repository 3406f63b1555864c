//! LLM integration for comprende.
//!
//! The scorer and the content generator both talk to a chat model through the
//! [`LlmProvider`] trait, so tests can substitute a canned provider.
//!
//! ```ignore
//! use comprende::llm::{ChatClient, complete};
//!
//! let client = ChatClient::from_env()?;
//! let text = complete(&client, "", 0.2, "You are terse.", "Say hi".to_string()).await?;
//! ```

pub mod client;

pub use client::{
    complete, ChatClient, Choice, GenerationRequest, GenerationResponse, LlmProvider, Message,
    Usage, DEFAULT_API_BASE, DEFAULT_MODEL,
};
