//! Payload types: single tokens, graphs, and batches of either.

use serde::{Deserialize, Serialize};

use crate::{EdgeId, GraphId, NodeId, Progress, Timestamp, TokenId};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Category of a token's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Sensory input.
    Percept,
    /// Internal cognition.
    Thought,
    /// Retrieved memory.
    Memory,
    /// Goal state.
    Goal,
    /// Action intention.
    Action,
    /// Emotional state.
    Emotion,
    /// Question or inquiry.
    Query,
    /// Answer or response.
    Response,
    /// Derived understanding.
    Insight,
    /// Perceived opportunity.
    Affordance,
    /// Attention marker.
    Salience,
}

impl TokenKind {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Percept => "percept",
            Self::Thought => "thought",
            Self::Memory => "memory",
            Self::Goal => "goal",
            Self::Action => "action",
            Self::Emotion => "emotion",
            Self::Query => "query",
            Self::Response => "response",
            Self::Insight => "insight",
            Self::Affordance => "affordance",
            Self::Salience => "salience",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TokenKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s {
            "percept" => Self::Percept,
            "thought" => Self::Thought,
            "memory" => Self::Memory,
            "goal" => Self::Goal,
            "action" => Self::Action,
            "emotion" => Self::Emotion,
            "query" => Self::Query,
            "response" => Self::Response,
            "insight" => Self::Insight,
            "affordance" => Self::Affordance,
            "salience" => Self::Salience,
            other => return Err(format!("unknown token kind '{other}'")),
        };
        Ok(kind)
    }
}

/// Text content of a token and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenContent {
    /// The text handed to the Reasoner.
    pub text: String,
    /// Origin label (e.g. `"perception"`, `"memory"`, `"external"`).
    pub source: String,
    /// IDs of related tokens or graph nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// A discrete unit of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    /// Token this one was derived from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TokenId>,
    pub created_at: Timestamp,
    pub kind: TokenKind,
    pub content: TokenContent,
    /// How attention-grabbing, `0.0..=1.0`.
    pub salience: f64,
    /// How goal-relevant, `0.0..=1.0`.
    pub relevance: f64,
    /// Emotional tone, `-1.0..=1.0`.
    pub valence: f64,
    /// Certainty, `0.0..=1.0`.
    pub confidence: f64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub progress: Progress,
}

// ---------------------------------------------------------------------------
// Graphs
// ---------------------------------------------------------------------------

/// Category of a graph's relational structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphKind {
    Causal,
    Semantic,
    Temporal,
    Spatial,
    Hierarchical,
    Associative,
    Inferential,
    GoalTree,
}

impl GraphKind {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Causal => "causal",
            Self::Semantic => "semantic",
            Self::Temporal => "temporal",
            Self::Spatial => "spatial",
            Self::Hierarchical => "hierarchical",
            Self::Associative => "associative",
            Self::Inferential => "inferential",
            Self::GoalTree => "goal_tree",
        }
    }
}

impl std::fmt::Display for GraphKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Concept,
    Entity,
    Event,
    State,
    Action,
    Goal,
    Condition,
    Result,
}

impl NodeKind {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Entity => "entity",
            Self::Event => "event",
            Self::State => "state",
            Self::Action => "action",
            Self::Goal => "goal",
            Self::Condition => "condition",
            Self::Result => "result",
        }
    }
}

/// Category of a directed graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Causes,
    Enables,
    Inhibits,
    Precedes,
    Contains,
    IsA,
    HasProperty,
    RelatesTo,
    Supports,
    Conflicts,
}

impl EdgeKind {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Causes => "causes",
            Self::Enables => "enables",
            Self::Inhibits => "inhibits",
            Self::Precedes => "precedes",
            Self::Contains => "contains",
            Self::IsA => "is_a",
            Self::HasProperty => "has_property",
            Self::RelatesTo => "relates_to",
            Self::Supports => "supports",
            Self::Conflicts => "conflicts",
        }
    }
}

/// A node in a [`Graph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub content: String,
    /// Token this node stands for, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ref: Option<TokenId>,
    /// Activation level, `0.0..=1.0`.
    #[serde(default)]
    pub activation: f64,
}

/// A directed edge in a [`Graph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Relationship strength, `0.0..=1.0`.
    #[serde(default)]
    pub weight: f64,
}

/// A relational structure connecting content elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub created_at: Timestamp,
    pub kind: GraphKind,
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    /// Entry point for traversal, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<NodeId>,
    /// Internal consistency, `0.0..=1.0`.
    pub coherence: f64,
    /// Structural complexity, `0.0..=1.0`.
    pub complexity: f64,
    /// Longest path length from the root.
    pub depth: u32,
    pub progress: Progress,
}

impl Graph {
    /// Appends a node.
    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.push(node);
    }

    /// Appends an edge.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        self.edges.push(edge);
    }

    /// Renders the graph as text: a node list followed by an edge list.
    pub fn describe(&self) -> String {
        let mut desc = format!("Nodes ({}):\n", self.nodes.len());
        for node in &self.nodes {
            desc.push_str(&format!(
                "  - {} ({}): {}\n",
                node.id,
                node.kind.as_str(),
                node.label
            ));
        }
        desc.push_str(&format!("\nEdges ({}):\n", self.edges.len()));
        for edge in &self.edges {
            desc.push_str(&format!(
                "  - {} -[{}]-> {}\n",
                edge.source,
                edge.kind.as_str(),
                edge.target
            ));
        }
        desc
    }
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// Read-only view of a single payload item, used to build Reasoner prompts.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Token(&'a Token),
    Graph(&'a Graph),
}

/// A single payload item the pipeline can route through its stages.
pub trait WorkItem: Send {
    /// Prompt-building view of the item.
    fn subject(&self) -> Subject<'_>;

    /// The item's progress record.
    fn progress(&self) -> &Progress;

    /// Mutable access to the item's progress record.
    fn progress_mut(&mut self) -> &mut Progress;
}

impl WorkItem for Token {
    fn subject(&self) -> Subject<'_> {
        Subject::Token(self)
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn progress_mut(&mut self) -> &mut Progress {
        &mut self.progress
    }
}

impl WorkItem for Graph {
    fn subject(&self) -> Subject<'_> {
        Subject::Graph(self)
    }

    fn progress(&self) -> &Progress {
        &self.progress
    }

    fn progress_mut(&mut self) -> &mut Progress {
        &mut self.progress
    }
}

// ---------------------------------------------------------------------------
// Payload variants
// ---------------------------------------------------------------------------

/// The content of an [`crate::Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload_type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Token(Token),
    TokenBatch(Vec<Token>),
    Graph(Graph),
    GraphBatch(Vec<Graph>),
}

impl Payload {
    /// The variant tag.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Token(_) => PayloadKind::Token,
            Self::TokenBatch(_) => PayloadKind::TokenBatch,
            Self::Graph(_) => PayloadKind::Graph,
            Self::GraphBatch(_) => PayloadKind::GraphBatch,
        }
    }

    /// Every item carried, in order.
    pub fn items(&self) -> Vec<&dyn WorkItem> {
        match self {
            Self::Token(t) => vec![t as &dyn WorkItem],
            Self::Graph(g) => vec![g as &dyn WorkItem],
            Self::TokenBatch(ts) => ts.iter().map(|t| t as &dyn WorkItem).collect(),
            Self::GraphBatch(gs) => gs.iter().map(|g| g as &dyn WorkItem).collect(),
        }
    }
}

impl From<Token> for Payload {
    fn from(token: Token) -> Self {
        Self::Token(token)
    }
}

impl From<Graph> for Payload {
    fn from(graph: Graph) -> Self {
        Self::Graph(graph)
    }
}

impl From<Vec<Token>> for Payload {
    fn from(tokens: Vec<Token>) -> Self {
        Self::TokenBatch(tokens)
    }
}

impl From<Vec<Graph>> for Payload {
    fn from(graphs: Vec<Graph>) -> Self {
        Self::GraphBatch(graphs)
    }
}

/// Variant tag of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Token,
    TokenBatch,
    Graph,
    GraphBatch,
}

impl PayloadKind {
    /// Lower-case label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::TokenBatch => "token_batch",
            Self::Graph => "graph",
            Self::GraphBatch => "graph_batch",
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
