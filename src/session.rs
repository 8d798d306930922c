//! Session model for the generation pipeline.
//!
//! A session is the persisted unit of work for one end-to-end generation
//! request. It moves through two phases: a mockup preview phase and a build
//! phase that runs the full step pipeline. The record is serialized as JSON,
//! one file per session id (see `store`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Coarse stage of a session.
///
/// Starts at `Mockup` and transitions exactly once, irreversibly, to `Build`
/// when the caller accepts the mockup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Mockup,
    Build,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Mockup => write!(f, "mockup"),
            Phase::Build => write!(f, "build"),
        }
    }
}

/// Monotonically accumulating counters for one session.
///
/// Merged by addition on every update: a `SessionStats` carried in a
/// [`SessionUpdate`] is a delta, not a replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    #[serde(default)]
    pub total_time_ms: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub steps_completed: u32,
    #[serde(default)]
    pub mockup_iterations: u32,
}

impl SessionStats {
    /// Add a delta into these counters.
    pub fn accumulate(&mut self, delta: &SessionStats) {
        self.total_time_ms += delta.total_time_ms;
        self.total_tokens += delta.total_tokens;
        self.steps_completed += delta.steps_completed;
        self.mockup_iterations += delta.mockup_iterations;
    }
}

/// One recorded mockup refinement instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockupIteration {
    pub instruction: String,
    pub timestamp: DateTime<Utc>,
}

/// Artifacts accumulated as steps complete.
///
/// Later steps depend on earlier ones being present: content, styles, and
/// images are keyed by the path map the architect step produces, and the
/// final assembly merges everything into the skeleton.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOutputs {
    /// Mockup-phase HTML preview.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mockup_html: Option<String>,
    /// Structural outline extracted alongside the mockup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Value>,
    /// Refinement instructions applied to the mockup, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mockup_iterations: Vec<MockupIteration>,

    /// Page/section skeleton produced by the architect step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Value>,
    /// Logical path → element id, produced by the architect step.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_map: BTreeMap<String, String>,
    /// Color scheme chosen by the architect step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<Value>,
    /// Per-path content attributes, merged across content steps.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub content: Map<String, Value>,
    /// Per-path style attributes.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub styles: Map<String, Value>,
    /// SEO metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seo: Option<Value>,
    /// Per-path (or per-id) image assignments.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub images: Map<String, Value>,
    /// Fully assembled website, present once the assemble step has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_website: Option<Value>,
}

/// The persisted unit of state for one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique token, immutable after creation.
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Refreshed to now + TTL on every successful update (sliding expiry).
    pub expires_at: DateTime<Utc>,
    pub phase: Phase,
    /// Free-form progress label. Informational only, never used for control
    /// flow decisions.
    pub status: String,

    /// The natural-language request this session was started from.
    pub prompt: String,
    pub industry: String,
    pub style: String,
    pub pages: Vec<String>,
    #[serde(default)]
    pub language: String,
    /// Provider/model passthrough for the generation collaborators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_model: Option<String>,

    /// Ordered build-phase step identifiers. Computed at creation so callers
    /// can preview the total step count, recomputed on phase entry.
    pub steps: Vec<String>,
    /// Caller-advanced cursor into `steps`. Only meaningful in build phase.
    pub current_step_index: usize,

    #[serde(default)]
    pub outputs: SessionOutputs,
    #[serde(default)]
    pub stats: SessionStats,
}

impl Session {
    /// Allocate a fresh session id: `sess_` + 16 hex chars of a v4 uuid.
    pub fn new_id() -> String {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        format!("sess_{}", &uuid[..16])
    }

    /// Whether the session is past its expiry instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Push the expiry window forward from `now`.
    pub fn refresh_expiry(&mut self, now: DateTime<Utc>, ttl_secs: u64) {
        self.expires_at = now + Duration::seconds(ttl_secs as i64);
    }
}

/// A non-destructive partial update applied by [`crate::store::SessionStore::update`].
///
/// Scalar fields overwrite when present; `stats` is merged by addition;
/// output fields overwrite individually so one step's merge never clobbers
/// another step's artifact.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub status: Option<String>,
    pub phase: Option<Phase>,
    pub steps: Option<Vec<String>>,
    pub current_step_index: Option<usize>,

    pub mockup_html: Option<String>,
    pub structure: Option<Value>,
    pub mockup_iterations: Option<Vec<MockupIteration>>,
    pub skeleton: Option<Value>,
    pub path_map: Option<BTreeMap<String, String>>,
    pub color_scheme: Option<Value>,
    pub content: Option<Map<String, Value>>,
    pub styles: Option<Map<String, Value>>,
    pub seo: Option<Value>,
    pub images: Option<Map<String, Value>>,
    pub final_website: Option<Value>,

    /// Delta added into the session's counters.
    pub stats: Option<SessionStats>,
}

impl SessionUpdate {
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn stats(mut self, delta: SessionStats) -> Self {
        self.stats = Some(delta);
        self
    }

    /// Apply this update to a session. Does not touch `expires_at`; the
    /// store owns expiry refresh.
    pub fn apply(self, session: &mut Session) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(phase) = self.phase {
            session.phase = phase;
        }
        if let Some(steps) = self.steps {
            session.steps = steps;
        }
        if let Some(index) = self.current_step_index {
            session.current_step_index = index;
        }
        if let Some(html) = self.mockup_html {
            session.outputs.mockup_html = Some(html);
        }
        if let Some(structure) = self.structure {
            session.outputs.structure = Some(structure);
        }
        if let Some(iterations) = self.mockup_iterations {
            session.outputs.mockup_iterations = iterations;
        }
        if let Some(skeleton) = self.skeleton {
            session.outputs.skeleton = Some(skeleton);
        }
        if let Some(path_map) = self.path_map {
            session.outputs.path_map = path_map;
        }
        if let Some(scheme) = self.color_scheme {
            session.outputs.color_scheme = Some(scheme);
        }
        if let Some(content) = self.content {
            session.outputs.content = content;
        }
        if let Some(styles) = self.styles {
            session.outputs.styles = styles;
        }
        if let Some(seo) = self.seo {
            session.outputs.seo = Some(seo);
        }
        if let Some(images) = self.images {
            session.outputs.images = images;
        }
        if let Some(website) = self.final_website {
            session.outputs.final_website = Some(website);
        }
        if let Some(delta) = self.stats {
            session.stats.accumulate(&delta);
        }
    }
}
