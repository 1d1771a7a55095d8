//! Reasoner prompt construction for the branch stages and Integration.
//!
//! Every prompt is built before its task is spawned, so branch tasks own
//! their inputs outright and never borrow the payload.
//!
//! | Call | Max output tokens | Temperature |
//! |------|-------------------|-------------|
//! | Branch-A / Branch-B on a token | 150 | 0.7 |
//! | Branch-A / Branch-B on a graph | 200 | 0.7 |
//! | Integration | 300 | 0.7 |
//!
//! The first line of every branch system prompt is `Descriptor: <name>`.

use std::fmt::Write as _;

use crate::{
    BranchADescriptor, BranchAResult, BranchBDescriptor, BranchBResult, BranchSlots, ClockStep,
    GatingState, GenerateOptions, Subject,
};

/// Output-token limit for a branch call on a token.
pub const BRANCH_TOKEN_MAX_OUTPUT: u32 = 150;

/// Output-token limit for a branch call on a graph.
pub const BRANCH_GRAPH_MAX_OUTPUT: u32 = 200;

/// Output-token limit for the Integration call.
pub const INTEGRATION_MAX_OUTPUT: u32 = 300;

/// Sampling temperature used for every call.
pub const TEMPERATURE: f32 = 0.7;

/// Prefix of the first system-prompt line of every branch call.
pub const DESCRIPTOR_LINE_PREFIX: &str = "Descriptor: ";

/// A fully built Reasoner request.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    /// User prompt.
    pub prompt: String,
    /// System prompt and generation parameters.
    pub options: GenerateOptions,
}

impl PromptRequest {
    fn new(prompt: String, system_prompt: String, max_output_tokens: u32) -> Self {
        Self {
            prompt,
            options: GenerateOptions {
                system_prompt,
                max_output_tokens,
                temperature: TEMPERATURE,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Branch prompts
// ---------------------------------------------------------------------------

fn subject_prompt(subject: Subject<'_>) -> String {
    match subject {
        Subject::Token(token) => format!(
            "Content type: {}\nContent: {}\nSalience: {:.2}\nRelevance: {:.2}",
            token.kind, token.content.text, token.salience, token.relevance
        ),
        Subject::Graph(graph) => format!("Graph type: {}\n{}", graph.kind, graph.describe()),
    }
}

fn branch_max_output(subject: Subject<'_>) -> u32 {
    match subject {
        Subject::Token(_) => BRANCH_TOKEN_MAX_OUTPUT,
        Subject::Graph(_) => BRANCH_GRAPH_MAX_OUTPUT,
    }
}

/// Builds the request for one Branch-A task.
pub fn branch_a_prompt(subject: Subject<'_>, descriptor: &BranchADescriptor) -> PromptRequest {
    let task = match subject {
        Subject::Token(_) => {
            "Analyze the input and provide insights from this specific angle.\n\
             Consider perception vs expression, action vs reflection, and \
             learning vs integration as they apply to this angle.\n\
             Be concise but insightful."
        }
        Subject::Graph(_) => {
            "Analyze the graph structure and suggest modifications or insights from this angle.\n\
             Consider how nodes and edges relate to it."
        }
    };
    let system_prompt = format!(
        "{DESCRIPTOR_LINE_PREFIX}{}\nCode: {}\nDescription: {}\n\n{task}",
        descriptor.name, descriptor.code, descriptor.description
    );
    PromptRequest::new(
        subject_prompt(subject),
        system_prompt,
        branch_max_output(subject),
    )
}

/// Builds the request for one Branch-B task.
pub fn branch_b_prompt(subject: Subject<'_>, descriptor: &BranchBDescriptor) -> PromptRequest {
    let mut system_prompt = format!(
        "{DESCRIPTOR_LINE_PREFIX}{}\nTemporal: {}\nScope: {}\nDescription: {}\n\n",
        descriptor.name,
        descriptor.temporal.as_str(),
        descriptor.scope.as_str(),
        descriptor.description
    );
    match subject {
        Subject::Token(_) => {
            let _ = write!(
                system_prompt,
                "Analyze the input through this lens:\n- {}: {}\n- {}: {}\n\n\
                 Provide insights that emerge from this combination of time and scope.\n\
                 Be concise but insightful.",
                descriptor.temporal.as_str(),
                descriptor.temporal.guiding_question(),
                descriptor.scope.as_str(),
                descriptor.scope.guiding_question()
            );
        }
        Subject::Graph(_) => {
            system_prompt
                .push_str("Extract or transform the graph according to this temporal-scope lens.");
        }
    }

    // Token branch-B calls omit the salience/relevance lines.
    let prompt = match subject {
        Subject::Token(token) => format!(
            "Content type: {}\nContent: {}",
            token.kind, token.content.text
        ),
        Subject::Graph(_) => subject_prompt(subject),
    };
    PromptRequest::new(prompt, system_prompt, branch_max_output(subject))
}

// ---------------------------------------------------------------------------
// Integration prompt
// ---------------------------------------------------------------------------

/// Header of the Branch-A section of the integration prompt.
pub const BRANCH_A_SECTION: &str = "BRANCH A RESULTS:";

/// Header of the Branch-B section of the integration prompt.
pub const BRANCH_B_SECTION: &str = "BRANCH B RESULTS:";

/// Renders present Branch-A results as `[name]: output` lines. Unset slots
/// are skipped.
pub fn summarize_branch_a(slots: &BranchSlots<BranchAResult>) -> String {
    let mut summary = String::new();
    for (_, result) in slots.results() {
        let _ = writeln!(summary, "[{}]: {}", result.descriptor, result.output);
    }
    summary
}

/// Renders present Branch-B results as `[name]: output` lines. Unset slots
/// are skipped.
pub fn summarize_branch_b(slots: &BranchSlots<BranchBResult>) -> String {
    let mut summary = String::new();
    for (_, result) in slots.results() {
        let _ = writeln!(summary, "[{}]: {}", result.descriptor, result.output);
    }
    summary
}

/// Builds the Integration request.
///
/// The focus instruction comes from `gating` alone; see
/// [`GatingState::integration_focus`] for the precedence rule.
pub fn integration_prompt(
    subject: Subject<'_>,
    step: ClockStep,
    gating: GatingState,
    branch_a: &BranchSlots<BranchAResult>,
    branch_b: &BranchSlots<BranchBResult>,
) -> PromptRequest {
    let focus = gating.integration_focus();
    let system_prompt = format!(
        "You are performing the integration fold.\n\
         Current state: step {step}, holdA {}, holdB {}\n\
         {}\n\n\
         Synthesize the parallel results into a coherent integrated understanding.\n\
         Identify key insights, contradictions, and emergent patterns.",
        gating.hold_a,
        gating.hold_b,
        focus.instruction()
    );

    let closing = match subject {
        Subject::Token(token) => format!(
            "Original content: {}\n\nProvide an integrated synthesis.",
            token.content.text
        ),
        Subject::Graph(_) => "Provide integrated graph transformation recommendations.".to_owned(),
    };
    let prompt = format!(
        "{BRANCH_A_SECTION}\n{}\n{BRANCH_B_SECTION}\n{}\n{closing}",
        summarize_branch_a(branch_a),
        summarize_branch_b(branch_b)
    );

    PromptRequest::new(prompt, system_prompt, INTEGRATION_MAX_OUTPUT)
}
