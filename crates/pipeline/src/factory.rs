//! Envelope factory: mints identifiers and builds payloads with their
//! default semantic properties.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::{
    Envelope, EnvelopeId, Graph, GraphId, GraphKind, Payload, Progress, Timestamp, Token,
    TokenContent, TokenId, TokenKind,
};

/// Builds tokens, graphs, and envelopes.
///
/// Identifiers have the form `<prefix>_<unix-nanos>_<counter>`. The counter is
/// per factory, so two envelopes minted by the same factory never share an ID.
#[derive(Debug, Default)]
pub struct EnvelopeFactory {
    counter: AtomicU64,
}

impl EnvelopeFactory {
    /// Creates a factory with its counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}_{}_{n}", Timestamp::now().unix_nanos())
    }

    /// Creates a token with neutral semantic properties.
    pub fn create_token(
        &self,
        text: impl Into<String>,
        kind: TokenKind,
        source: impl Into<String>,
    ) -> Token {
        Token {
            id: TokenId::generated(self.next_id("tok")),
            parent_id: None,
            created_at: Timestamp::now(),
            kind,
            content: TokenContent {
                text: text.into(),
                source: source.into(),
                references: Vec::new(),
            },
            salience: 0.5,
            relevance: 0.5,
            valence: 0.0,
            confidence: 0.5,
            tags: Vec::new(),
            progress: Progress::new(),
        }
    }

    /// Creates an empty graph.
    pub fn create_graph(&self, kind: GraphKind) -> Graph {
        Graph {
            id: GraphId::generated(self.next_id("grp")),
            created_at: Timestamp::now(),
            kind,
            nodes: Vec::new(),
            edges: Vec::new(),
            root: None,
            coherence: 1.0,
            complexity: 0.0,
            depth: 0,
            progress: Progress::new(),
        }
    }

    /// Wraps a payload in a fresh envelope.
    pub fn create_envelope(&self, payload: impl Into<Payload>, priority: i32) -> Envelope {
        Envelope::new(
            EnvelopeId::generated(self.next_id("env")),
            payload.into(),
            priority,
        )
    }
}
