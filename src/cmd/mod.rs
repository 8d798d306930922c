//! CLI command implementations.
//!
//! Lifecycle and inspection only: starting, inspecting, accepting,
//! cancelling, and reaping sessions works without any generation
//! collaborator wired in. Step execution belongs to embedding clients that
//! register agents on the [`sitewright::orchestrator::AgentRegistry`].

use anyhow::Result;
use console::style;
use sitewright::config::Config;
use sitewright::orchestrator::{AgentRegistry, Orchestrator, StartOptions};

fn orchestrator(config: &Config) -> Result<Orchestrator> {
    Ok(Orchestrator::new(config, AgentRegistry::new())?)
}

pub fn cmd_start(
    config: &Config,
    prompt: &str,
    industry: Option<String>,
    pages: Option<Vec<String>>,
    site_style: Option<String>,
) -> Result<()> {
    let orch = orchestrator(config)?;
    let session = orch.start_session(
        prompt,
        StartOptions {
            industry,
            pages,
            style: site_style,
            ..Default::default()
        },
    )?;

    println!();
    println!("Started session {}", style(&session.id).cyan().bold());
    println!("  industry: {}", session.industry);
    println!("  style:    {}", session.style);
    println!("  pages:    {}", session.pages.join(", "));
    println!("  steps:    {} (build phase)", session.steps.len());
    println!();
    Ok(())
}

pub fn cmd_status(config: &Config, id: &str) -> Result<()> {
    let orch = orchestrator(config)?;
    let session = orch.get_session(id)?;

    println!();
    println!("Session {}", style(&session.id).cyan().bold());
    println!("  phase:   {}", session.phase);
    println!("  status:  {}", session.status);
    println!("  expires: {}", session.expires_at.to_rfc3339());
    println!(
        "  cursor:  {}/{}",
        session.current_step_index,
        session.steps.len()
    );
    println!(
        "  stats:   {} steps, {} tokens, {} ms, {} mockup iterations",
        session.stats.steps_completed,
        session.stats.total_tokens,
        session.stats.total_time_ms,
        session.stats.mockup_iterations
    );
    println!();
    Ok(())
}

pub fn cmd_steps(config: &Config, id: &str) -> Result<()> {
    let orch = orchestrator(config)?;
    let session = orch.get_session(id)?;

    println!();
    for (index, step) in session.steps.iter().enumerate() {
        let marker = if index < session.current_step_index {
            style("done").green().to_string()
        } else if index == session.current_step_index {
            style("next").yellow().to_string()
        } else {
            style("    ").dim().to_string()
        };
        println!("  {:>2}  [{}]  {}", index, marker, step);
    }
    println!();
    Ok(())
}

pub fn cmd_accept(config: &Config, id: &str) -> Result<()> {
    let orch = orchestrator(config)?;
    let session = orch.accept_mockup(id)?;
    println!(
        "Session {} entered build phase ({} steps)",
        style(&session.id).cyan().bold(),
        session.steps.len()
    );
    Ok(())
}

pub fn cmd_cancel(config: &Config, id: &str) -> Result<()> {
    let orch = orchestrator(config)?;
    if orch.cancel_session(id)? {
        println!("Session {} cancelled", style(id).cyan());
    } else {
        println!("Session {} did not exist", style(id).dim());
    }
    Ok(())
}

pub fn cmd_list(config: &Config) -> Result<()> {
    let orch = orchestrator(config)?;
    let ids = orch.store().list_ids()?;
    if ids.is_empty() {
        println!("No sessions");
        return Ok(());
    }

    println!();
    println!("{:<24} {:<8} {:<18} Expires", "Session", "Phase", "Status");
    for id in ids {
        // Expired records vanish on read; skip them silently
        match orch.get_session(&id) {
            Ok(session) => println!(
                "{:<24} {:<8} {:<18} {}",
                session.id,
                session.phase.to_string(),
                session.status,
                session.expires_at.to_rfc3339()
            ),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err.into()),
        }
    }
    println!();
    Ok(())
}

pub fn cmd_reap(config: &Config) -> Result<()> {
    let orch = orchestrator(config)?;
    let reaped = orch.store().reap_expired()?;
    println!("Reaped {} expired session(s)", reaped);
    Ok(())
}
