//! Fanfold Reasoner adapters.
//!
//! Implements the [`pipeline::Reasoner`] port. The processor only ever sees
//! `Arc<dyn Reasoner>`, so providers are added here without touching the
//! `pipeline` or `processor` crates.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, response parsing,
//! and error classification live here.
//!
//! | Adapter | Use |
//! |---------|-----|
//! | [`AnthropicReasoner`] | Anthropic Messages API |
//! | [`EchoReasoner`] | Offline runs; deterministic, no network |

mod anthropic;
mod echo;

pub use anthropic::{
    AnthropicConfig, AnthropicReasoner, ANTHROPIC_VERSION, DEFAULT_MAX_TOKENS, MAX_OUTPUT_TOKENS,
};
pub use echo::EchoReasoner;
