//! Session orchestration: lifecycle, phase transitions, step execution.

pub mod agents;
pub mod runner;

pub use agents::{AgentKind, AgentOutput, AgentRegistry, GenerateAgent, StepArgs};
pub use runner::{Orchestrator, StartOptions, StepResult, detect_industry};
