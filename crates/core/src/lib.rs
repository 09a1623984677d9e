//! # AlterEgo Core
//!
//! Domain types, traits, and error definitions for the AlterEgo persona
//! chat runtime. Every collaborator of the response loop (completion
//! service, tools, notifier) is a trait here; implementations live in
//! their own crates.

pub mod error;
pub mod event;
pub mod message;
pub mod notify;
pub mod persona;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, NotifyError, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, MessageToolCall, Role, Transcript};
pub use notify::Notifier;
pub use persona::{Persona, PersonaPaths};
pub use provider::{
    ChunkReceiver, FinishReason, Provider, ProviderRequest, ProviderResponse, StreamChunk,
    ToolDefinition, Usage,
};
pub use tool::{Tool, ToolArguments, ToolCall, ToolRegistry, ToolResult};
