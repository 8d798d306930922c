//! Generation collaborator seam.
//!
//! Each pipeline step delegates its actual generation work to an external
//! collaborator behind [`GenerateAgent`]. The orchestrator treats the
//! collaborator as an opaque capability keyed by step kind: it hands over
//! the session, takes back an artifact plus a token count, and merges the
//! artifact without inspecting it beyond the step-specific placement.

use crate::sequencer::Step;
use crate::session::Session;
use serde_json::Value;
use std::collections::HashMap;

/// Caller-supplied arguments for one step execution.
#[derive(Debug, Clone, Default)]
pub struct StepArgs {
    /// Content region override for a bare `content` step.
    pub page: Option<String>,
    /// Refinement instruction for the mockup iterate step.
    pub instruction: Option<String>,
}

/// Successful collaborator output.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub artifact: Value,
    pub tokens_used: u64,
}

impl AgentOutput {
    pub fn new(artifact: Value) -> Self {
        Self {
            artifact,
            tokens_used: 0,
        }
    }

    pub fn with_tokens(mut self, tokens_used: u64) -> Self {
        self.tokens_used = tokens_used;
        self
    }
}

/// An external generation capability for one step kind.
///
/// Failure is a plain message, passed through to the caller verbatim as a
/// collaborator error; the orchestrator does not retry.
pub trait GenerateAgent: Send + Sync {
    fn generate(&self, session: &Session, args: &StepArgs) -> Result<AgentOutput, String>;
}

/// Step kinds that dispatch to an external collaborator. `Assemble` is
/// absent: final assembly is a pure merge the orchestrator performs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    Mockup,
    IterateMockup,
    Architect,
    Content,
    Stylist,
    Seo,
    Images,
}

impl AgentKind {
    /// The collaborator a step dispatches to, if any.
    pub fn for_step(step: &Step) -> Option<Self> {
        match step {
            Step::Mockup => Some(Self::Mockup),
            Step::IterateMockup => Some(Self::IterateMockup),
            Step::Architect => Some(Self::Architect),
            Step::Content { .. } => Some(Self::Content),
            Step::Stylist => Some(Self::Stylist),
            Step::Seo => Some(Self::Seo),
            Step::Images => Some(Self::Images),
            Step::Assemble => None,
        }
    }
}

/// Capability table mapping step kinds to collaborator implementations.
///
/// Steps whose kind has no registered agent fail with a collaborator error
/// at execution time, so a partially wired registry is usable for
/// lifecycle-only workflows (the CLI registers nothing).
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentKind, Box<dyn GenerateAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: AgentKind, agent: Box<dyn GenerateAgent>) -> Self {
        self.agents.insert(kind, agent);
        self
    }

    pub fn get(&self, kind: AgentKind) -> Option<&dyn GenerateAgent> {
        self.agents.get(&kind).map(Box::as_ref)
    }
}

impl<F> GenerateAgent for F
where
    F: Fn(&Session, &StepArgs) -> Result<AgentOutput, String> + Send + Sync,
{
    fn generate(&self, session: &Session, args: &StepArgs) -> Result<AgentOutput, String> {
        self(session, args)
    }
}
