//! Remote collaborators for ragrec.
//!
//! Async HTTP adapters implementing the core collaborator traits against
//! OpenAI-compatible servers (vLLM, text-embeddings-inference, OpenAI):
//!
//! | Type | Trait | Endpoint |
//! |------|-------|----------|
//! | [`OpenAiEmbedder`] | [`ragrec_core::Embedder`] | `POST {base}/embeddings` |
//! | [`HttpReranker`] | [`ragrec_core::Reranker`] | `POST {base}/rerank` |
//! | [`ChatGenerator`] | [`ragrec_core::Generator`] | `POST {base}/chat/completions` |
//!
//! Each call is a single attempt. Non-success statuses and transport failures
//! become `Request` errors, undecodable bodies become `InvalidResponse`.

pub mod chat;
pub mod client;
pub mod embedding;
pub mod rerank;

pub use chat::{ChatGenerator, ChatOptions};
pub use client::EndpointSettings;
pub use embedding::OpenAiEmbedder;
pub use rerank::HttpReranker;
