//! Newtype domain identifiers.
//!
//! Every payload concept that has an identity is represented as a distinct
//! newtype wrapping a `String`. This prevents accidentally interchanging an
//! [`EnvelopeId`] with a [`TokenId`] even though both are strings under the
//! hood.
//!
//! Envelope, token, and graph identifiers are minted by
//! [`crate::EnvelopeFactory`]; graph node and edge identifiers are chosen by
//! whoever builds the graph.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, generated(), as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Wraps a value the caller knows is non-empty.
            #[allow(dead_code)]
            pub(crate) fn generated(value: String) -> Self {
                debug_assert!(!value.is_empty());
                Self(value)
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: factory-minted
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies an [`crate::Envelope`] travelling through the pipeline.
    ///
    /// Unique among in-flight envelopes; the processor rejects a second
    /// envelope carrying an ID that is still being processed.
    EnvelopeId
}

impl EnvelopeId {
    /// Identifier of the sub-envelope wrapping item `index` of a batch.
    pub fn batch_item(&self, index: usize) -> Self {
        Self(format!("{}#{index}", self.0))
    }
}

string_id! {
    /// Identifies a [`crate::Token`] payload.
    TokenId
}

string_id! {
    /// Identifies a [`crate::Graph`] payload.
    GraphId
}

// ---------------------------------------------------------------------------
// Identifiers: caller-chosen graph structure
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies a node within one [`crate::Graph`].
    NodeId
}

string_id! {
    /// Identifies an edge within one [`crate::Graph`].
    EdgeId
}
