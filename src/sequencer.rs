//! Step sequencing for the build phase.
//!
//! The pipeline is a closed set of step kinds dispatched by tagged variant,
//! not by raw string: unknown names surface as a distinct parse error. The
//! build-phase step list is derived deterministically from the session's
//! page selection and fully replaces any previous list when recomputed.

use crate::session::Phase;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The shared header/footer region handled by the first content step.
pub const HEADER_FOOTER_REGION: &str = "header_footer";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown step '{0}'")]
pub struct UnknownStepError(pub String);

/// One named unit of pipeline work.
///
/// `Mockup` and `IterateMockup` run in the mockup phase; everything else
/// requires the build phase. String forms round-trip through
/// `Display`/`parse` (`content:<region>` carries its region).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Step {
    Mockup,
    IterateMockup,
    Architect,
    Content { region: String },
    Stylist,
    Seo,
    Images,
    Assemble,
}

impl Step {
    /// The phase this step may execute in.
    pub fn required_phase(&self) -> Phase {
        match self {
            Step::Mockup | Step::IterateMockup => Phase::Mockup,
            _ => Phase::Build,
        }
    }

    /// The step's content region, for `Content` steps.
    pub fn region(&self) -> Option<&str> {
        match self {
            Step::Content { region } => Some(region),
            _ => None,
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Mockup => write!(f, "mockup"),
            Step::IterateMockup => write!(f, "iterate"),
            Step::Architect => write!(f, "architect"),
            Step::Content { region } => write!(f, "content:{region}"),
            Step::Stylist => write!(f, "stylist"),
            Step::Seo => write!(f, "seo"),
            Step::Images => write!(f, "images"),
            Step::Assemble => write!(f, "assemble"),
        }
    }
}

impl std::str::FromStr for Step {
    type Err = UnknownStepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mockup" => Ok(Step::Mockup),
            "iterate" => Ok(Step::IterateMockup),
            "architect" => Ok(Step::Architect),
            "stylist" => Ok(Step::Stylist),
            "seo" => Ok(Step::Seo),
            "images" => Ok(Step::Images),
            "assemble" => Ok(Step::Assemble),
            other => match other.split_once(':') {
                Some(("content", region)) if !region.is_empty() => Ok(Step::Content {
                    region: region.to_string(),
                }),
                // Bare "content" defaults to the shared region, as the
                // original endpoint did.
                _ if other == "content" => Ok(Step::Content {
                    region: HEADER_FOOTER_REGION.to_string(),
                }),
                _ => Err(UnknownStepError(other.to_string())),
            },
        }
    }
}

impl TryFrom<String> for Step {
    type Error = UnknownStepError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        step.to_string()
    }
}

/// Derive the ordered build-phase step list from the selected pages.
///
/// Always: architect, content for the shared header/footer region, one
/// content step per page in the given order, then stylist, seo, images,
/// assemble. Pages drive the only variable portion; the output never
/// depends on map iteration order.
pub fn build_steps(pages: &[String]) -> Vec<Step> {
    let mut steps = vec![
        Step::Architect,
        Step::Content {
            region: HEADER_FOOTER_REGION.to_string(),
        },
    ];
    for page in pages {
        steps.push(Step::Content {
            region: page.clone(),
        });
    }
    steps.extend([Step::Stylist, Step::Seo, Step::Images, Step::Assemble]);
    steps
}

/// String forms of [`build_steps`], the shape persisted on the session.
pub fn build_step_names(pages: &[String]) -> Vec<String> {
    build_steps(pages).iter().map(Step::to_string).collect()
}
