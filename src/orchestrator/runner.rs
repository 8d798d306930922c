//! Top-level coordination of the generation pipeline.
//!
//! The orchestrator owns the session store and the collaborator registry.
//! Every public operation returns a typed [`OrchestratorError`] for the
//! expected failure conditions (missing session, wrong phase, busy lock,
//! unknown step, collaborator failure) so a long-running client loop can
//! branch on them without exception handling.

use crate::config::Config;
use crate::errors::{OrchestratorError, StoreError};
use crate::orchestrator::agents::{AgentKind, AgentOutput, AgentRegistry, StepArgs};
use crate::sequencer::{self, Step, UnknownStepError};
use crate::session::{
    MockupIteration, Phase, Session, SessionOutputs, SessionStats, SessionUpdate,
};
use crate::store::SessionStore;
use crate::tree;
use chrono::{Duration, Utc};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

/// Options accepted when starting a session.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    /// Explicit industry, or `auto`/absent to detect from the prompt.
    pub industry: Option<String>,
    pub style: Option<String>,
    pub pages: Option<Vec<String>>,
    pub language: Option<String>,
    pub ai_provider: Option<String>,
    pub ai_model: Option<String>,
}

/// Outcome of one successful step execution.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// The session as persisted after the step's merge.
    pub session: Session,
    pub step: Step,
    /// The collaborator's artifact (or the assembled website).
    pub artifact: Option<Value>,
    pub tokens_used: u64,
    pub time_ms: u64,
}

/// Keyword table for prompt-based industry detection.
const INDUSTRY_KEYWORDS: [(&str, &[&str]); 9] = [
    ("legal", &["law", "lawyer", "attorney", "legal"]),
    ("healthcare", &["health", "medical", "doctor", "clinic", "dental"]),
    ("technology", &["tech", "software", "app", "saas", "startup"]),
    ("restaurant", &["restaurant", "food", "cafe", "catering"]),
    ("real_estate", &["real estate", "property", "realty"]),
    ("fitness", &["fitness", "gym", "workout", "yoga"]),
    ("agency", &["agency", "marketing", "creative"]),
    ("ecommerce", &["shop", "store", "ecommerce", "retail"]),
    ("education", &["education", "school", "course", "learning"]),
];

const DEFAULT_PAGES: [&str; 4] = ["home", "about", "services", "contact"];

/// Top-level API for driving generation sessions.
pub struct Orchestrator {
    store: SessionStore,
    registry: AgentRegistry,
}

impl Orchestrator {
    pub fn new(config: &Config, registry: AgentRegistry) -> Result<Self, StoreError> {
        let store = SessionStore::open(&config.session_dir, config.session_ttl_secs)?;
        Ok(Self { store, registry })
    }

    /// Build directly on an opened store (tests, embedding).
    pub fn with_store(store: SessionStore, registry: AgentRegistry) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Create a session in the mockup phase.
    ///
    /// The build step list is computed eagerly, even though it is unused
    /// until the phase transition, so callers can preview the total step
    /// count.
    pub fn start_session(
        &self,
        prompt: &str,
        options: StartOptions,
    ) -> Result<Session, OrchestratorError> {
        let industry = match options.industry.as_deref() {
            Some("auto") | Some("") | None => detect_industry(prompt).to_string(),
            Some(industry) => industry.to_string(),
        };
        let pages = options
            .pages
            .unwrap_or_else(|| DEFAULT_PAGES.iter().map(|p| p.to_string()).collect());
        let steps = sequencer::build_step_names(&pages);

        let now = Utc::now();
        let session = Session {
            id: Session::new_id(),
            created_at: now,
            expires_at: now + Duration::seconds(self.store.ttl_secs() as i64),
            phase: Phase::Mockup,
            status: "initialized".into(),
            prompt: prompt.to_string(),
            industry,
            style: options.style.unwrap_or_else(|| "modern".into()),
            pages,
            language: options.language.unwrap_or_default(),
            ai_provider: options.ai_provider,
            ai_model: options.ai_model,
            steps,
            current_step_index: 0,
            outputs: SessionOutputs::default(),
            stats: SessionStats::default(),
        };
        self.store.create(&session)?;
        info!(id = %session.id, industry = %session.industry, "session started");
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<Session, OrchestratorError> {
        Ok(self.store.get(id)?)
    }

    /// Generate the mockup preview. Convenience for `run_step(id, "mockup")`.
    pub fn generate_mockup(&self, id: &str) -> Result<StepResult, OrchestratorError> {
        self.run_step(id, "mockup", StepArgs::default())
    }

    /// Apply a refinement instruction to the mockup. Convenience for
    /// `run_step(id, "iterate")`.
    pub fn iterate_mockup(
        &self,
        id: &str,
        instruction: &str,
    ) -> Result<StepResult, OrchestratorError> {
        self.run_step(
            id,
            "iterate",
            StepArgs {
                instruction: Some(instruction.to_string()),
                ..Default::default()
            },
        )
    }

    /// Accept the mockup and enter the build phase. One-way transition:
    /// recomputes the step list from the current page selection and resets
    /// the cursor.
    pub fn accept_mockup(&self, id: &str) -> Result<Session, OrchestratorError> {
        self.store
            .with_lock(id, || {
                let session = self.store.get(id)?;
                if session.outputs.mockup_html.is_none() {
                    return Err(OrchestratorError::Validation(
                        "No mockup to accept. Generate a mockup first.".into(),
                    ));
                }
                let steps = sequencer::build_step_names(&session.pages);
                let update = SessionUpdate {
                    status: Some("mockup_accepted".into()),
                    phase: Some(Phase::Build),
                    steps: Some(steps),
                    current_step_index: Some(0),
                    ..Default::default()
                };
                let session = self.store.update(id, update)?;
                info!(id = %session.id, total_steps = session.steps.len(), "entered build phase");
                Ok(session)
            })
            .map_err(OrchestratorError::from)?
    }

    /// Execute a named step under the session's exclusive lock.
    ///
    /// The step's phase requirement is validated against the session, the
    /// matching collaborator runs, and on success its output is merged into
    /// the session's accumulated artifacts and stats. Collaborator failure
    /// is passed through verbatim and mutates nothing.
    pub fn run_step(
        &self,
        id: &str,
        step_name: &str,
        args: StepArgs,
    ) -> Result<StepResult, OrchestratorError> {
        let mut step: Step = step_name
            .parse()
            .map_err(|UnknownStepError(step)| OrchestratorError::UnknownStep { step })?;
        // A bare "content" takes its region from the args
        if step_name == "content" {
            if let (Step::Content { region }, Some(page)) = (&mut step, args.page.as_deref()) {
                *region = page.to_string();
            }
        }

        self.store
            .with_lock(id, || self.run_step_locked(id, &step, &args))
            .map_err(OrchestratorError::from)?
    }

    /// Delete the session. Returns false if it did not exist.
    pub fn cancel_session(&self, id: &str) -> Result<bool, OrchestratorError> {
        Ok(self.store.delete(id)?)
    }

    fn run_step_locked(
        &self,
        id: &str,
        step: &Step,
        args: &StepArgs,
    ) -> Result<StepResult, OrchestratorError> {
        let session = self.store.get(id)?;

        let required = step.required_phase();
        if session.phase != required {
            return Err(OrchestratorError::InvalidPhase {
                id: id.to_string(),
                required: required.to_string(),
                actual: session.phase.to_string(),
            });
        }

        debug!(id, step = %step, "running step");
        let started = Instant::now();

        let (update, artifact, tokens_used) = match step {
            Step::Mockup => self.dispatch_mockup(&session, args)?,
            Step::IterateMockup => self.dispatch_iterate(&session, args)?,
            Step::Architect => self.dispatch_architect(&session, args)?,
            Step::Content { region } => self.dispatch_content(&session, region)?,
            Step::Stylist => self.dispatch_stylist(&session, args)?,
            Step::Seo => self.dispatch_seo(&session, args)?,
            Step::Images => self.dispatch_images(&session, args)?,
            Step::Assemble => self.assemble(&session)?,
        };

        let time_ms = started.elapsed().as_millis() as u64;
        let mut update = update;
        let mut stats = update.stats.unwrap_or_default();
        stats.total_time_ms += time_ms;
        stats.total_tokens += tokens_used;
        if required == Phase::Build {
            stats.steps_completed += 1;
        }
        update.stats = Some(stats);

        let session = self.store.update(id, update)?;
        Ok(StepResult {
            session,
            step: step.clone(),
            artifact,
            tokens_used,
            time_ms,
        })
    }

    fn call_agent(
        &self,
        kind: AgentKind,
        step: &Step,
        session: &Session,
        args: &StepArgs,
    ) -> Result<AgentOutput, OrchestratorError> {
        let agent = self
            .registry
            .get(kind)
            .ok_or_else(|| OrchestratorError::Collaborator {
                step: step.to_string(),
                message: "no collaborator registered".into(),
            })?;
        agent
            .generate(session, args)
            .map_err(|message| OrchestratorError::Collaborator {
                step: step.to_string(),
                message,
            })
    }

    fn dispatch_mockup(
        &self,
        session: &Session,
        args: &StepArgs,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        let output = self.call_agent(AgentKind::Mockup, &Step::Mockup, session, args)?;
        let html = output
            .artifact
            .get("mockup_html")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OrchestratorError::Validation("Mockup collaborator returned no HTML".into())
            })?
            .to_string();
        let update = SessionUpdate {
            status: Some("mockup_ready".into()),
            mockup_html: Some(html),
            structure: output.artifact.get("structure").cloned(),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    fn dispatch_iterate(
        &self,
        session: &Session,
        args: &StepArgs,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        if session.outputs.mockup_html.is_none() {
            return Err(OrchestratorError::Validation(
                "No mockup to iterate on".into(),
            ));
        }
        let instruction = args.instruction.clone().ok_or_else(|| {
            OrchestratorError::Validation("No iteration instruction provided".into())
        })?;

        let output = self.call_agent(AgentKind::IterateMockup, &Step::IterateMockup, session, args)?;
        let html = output
            .artifact
            .get("mockup_html")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OrchestratorError::Validation("Mockup collaborator returned no HTML".into())
            })?
            .to_string();

        let mut iterations = session.outputs.mockup_iterations.clone();
        iterations.push(MockupIteration {
            instruction,
            timestamp: Utc::now(),
        });
        let update = SessionUpdate {
            mockup_html: Some(html),
            structure: output
                .artifact
                .get("structure")
                .cloned()
                .or_else(|| session.outputs.structure.clone()),
            mockup_iterations: Some(iterations),
            stats: Some(SessionStats {
                mockup_iterations: 1,
                ..Default::default()
            }),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    fn dispatch_architect(
        &self,
        session: &Session,
        args: &StepArgs,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        if session.outputs.mockup_html.is_none() {
            return Err(OrchestratorError::Validation(
                "No mockup HTML to architect".into(),
            ));
        }
        let output = self.call_agent(AgentKind::Architect, &Step::Architect, session, args)?;
        let path_map = output
            .artifact
            .get("path_map")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(path, id)| {
                        id.as_str().map(|id| (path.clone(), id.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let update = SessionUpdate {
            status: Some("architect_done".into()),
            skeleton: output.artifact.get("skeleton").cloned(),
            path_map: Some(path_map),
            color_scheme: output.artifact.get("color_scheme").cloned(),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    fn dispatch_content(
        &self,
        session: &Session,
        region: &str,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        if session.outputs.skeleton.is_none() || session.outputs.path_map.is_empty() {
            return Err(OrchestratorError::Validation(
                "Architect step must run first".into(),
            ));
        }
        let step = Step::Content {
            region: region.to_string(),
        };
        let args = StepArgs {
            page: Some(region.to_string()),
            instruction: None,
        };
        let output = self.call_agent(AgentKind::Content, &step, session, &args)?;

        // Merge over the content accumulated by earlier regions
        let mut merged = session.outputs.content.clone();
        if let Some(map) = output.artifact.as_object() {
            for (path, attrs) in map {
                merged.insert(path.clone(), attrs.clone());
            }
        }
        let update = SessionUpdate {
            content: Some(merged),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    fn dispatch_stylist(
        &self,
        session: &Session,
        args: &StepArgs,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        if session.outputs.path_map.is_empty() {
            return Err(OrchestratorError::Validation(
                "No path map found. Run the architect step first.".into(),
            ));
        }
        let output = self.call_agent(AgentKind::Stylist, &Step::Stylist, session, args)?;
        let styles = output.artifact.as_object().cloned().unwrap_or_default();
        let update = SessionUpdate {
            styles: Some(styles),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    fn dispatch_seo(
        &self,
        session: &Session,
        args: &StepArgs,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        let output = self.call_agent(AgentKind::Seo, &Step::Seo, session, args)?;
        let update = SessionUpdate {
            seo: Some(output.artifact.clone()),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    fn dispatch_images(
        &self,
        session: &Session,
        args: &StepArgs,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        let output = self.call_agent(AgentKind::Images, &Step::Images, session, args)?;
        let images = output.artifact.as_object().cloned().unwrap_or_default();
        let update = SessionUpdate {
            images: Some(images),
            ..Default::default()
        };
        Ok((update, Some(output.artifact), output.tokens_used))
    }

    /// Final assembly: merge every accumulated artifact into the skeleton.
    /// Runs entirely inside the orchestrator; no collaborator involved.
    fn assemble(
        &self,
        session: &Session,
    ) -> Result<(SessionUpdate, Option<Value>, u64), OrchestratorError> {
        let Some(skeleton) = session.outputs.skeleton.clone() else {
            return Err(OrchestratorError::Validation(
                "No skeleton to assemble".into(),
            ));
        };

        let mut website = merge_into_skeleton(skeleton, &session.outputs);

        if let Some(obj) = website.as_object_mut() {
            if let Some(seo) = &session.outputs.seo {
                obj.insert("seo".into(), seo.clone());
            }
            if let Some(colors) = &session.outputs.color_scheme {
                obj.insert(
                    "theme_settings".into(),
                    json!({"colors": colors, "style": session.style}),
                );
            }
            obj.insert(
                "_meta".into(),
                json!({
                    "generated_at": Utc::now().to_rfc3339(),
                    "generator": "sitewright",
                    "industry": session.industry,
                    "style": session.style,
                }),
            );
        }

        let update = SessionUpdate {
            status: Some("complete".into()),
            final_website: Some(website.clone()),
            ..Default::default()
        };
        Ok((update, Some(website), 0))
    }
}

/// Merge per-path content, styles, and images into the skeleton's element
/// attributes, resolving elements through the id/path map with the shared
/// tree walk.
fn merge_into_skeleton(mut skeleton: Value, outputs: &SessionOutputs) -> Value {
    let id_to_path: HashMap<&str, &str> = outputs
        .path_map
        .iter()
        .map(|(path, id)| (id.as_str(), path.as_str()))
        .collect();

    let mut merge_node = |obj: &mut Map<String, Value>| {
        let Some(id) = obj.get("id").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        let path = id_to_path.get(id.as_str()).copied();

        let mut incoming: Vec<&Value> = Vec::new();
        if let Some(path) = path {
            if let Some(content) = outputs.content.get(path) {
                incoming.push(content);
            }
            if let Some(styles) = outputs.styles.get(path) {
                incoming.push(styles);
            }
        }
        if let Some(images) = path
            .and_then(|p| outputs.images.get(p))
            .or_else(|| outputs.images.get(id.as_str()))
        {
            incoming.push(images);
        }
        if incoming.is_empty() {
            return;
        }

        let attrs = obj
            .entry("attrs".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(attrs) = attrs.as_object_mut() {
            for value in incoming {
                if let Some(map) = value.as_object() {
                    for (key, item) in map {
                        attrs.insert(key.clone(), item.clone());
                    }
                }
            }
        }
    };

    if let Some(obj) = skeleton.as_object_mut() {
        for part in ["header", "footer"] {
            if let Some(node) = obj.get_mut(part) {
                tree::visit_nodes_mut(node, &mut merge_node);
            }
        }
        if let Some(pages) = obj.get_mut("pages").and_then(Value::as_array_mut) {
            for page in pages {
                tree::visit_nodes_mut(page, &mut merge_node);
            }
        }
    }
    skeleton
}

/// Detect an industry label from prompt keywords; `general` when nothing
/// matches.
pub fn detect_industry(prompt: &str) -> &'static str {
    let prompt = prompt.to_lowercase();
    for (industry, keywords) in INDUSTRY_KEYWORDS {
        if keywords.iter().any(|keyword| prompt.contains(keyword)) {
            return industry;
        }
    }
    "general"
}
