use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::StepName;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("{0} phase must contain at least one step")]
    EmptyPhase(Phase),

    #[error("step names cannot be blank")]
    BlankStep,

    #[error("duplicate step name: {0}")]
    DuplicateStep(StepName),

    #[error("review gate {0} is not a pre-production step")]
    GateOutsidePre(StepName),
}

//
// ─── PHASE ─────────────────────────────────────────────────────────────────────
//

/// One of the two ordered step groups a lesson moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Pre, Phase::Post];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Phase::Pre => "pre-production",
            Phase::Post => "post-production",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

//
// ─── PIPELINE DEFINITION ───────────────────────────────────────────────────────
//

/// Static, read-only description of the production pipeline.
///
/// Holds the ordered pre- and post-production steps and the subset of
/// pre-production steps that act as review gates. Step order defines the
/// "next pending step" of a lesson, so it is preserved exactly as given.
///
/// # Examples
///
/// ```
/// # use lesson_core::pipeline::{Phase, PipelineDefinition};
/// let pipeline = PipelineDefinition::new(["Draft", "Review"], ["Publish"], ["Review"])?;
/// assert_eq!(pipeline.total_steps(), 3);
/// assert_eq!(pipeline.phase_of("Publish"), Some(Phase::Post));
/// assert!(pipeline.is_review_gate("Review"));
/// # Ok::<(), lesson_core::pipeline::PipelineError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    pre: Vec<StepName>,
    post: Vec<StepName>,
    review_gates: Vec<StepName>,
}

impl PipelineDefinition {
    /// Build a pipeline from ordered step lists.
    ///
    /// # Errors
    ///
    /// - `EmptyPhase` if either phase has no steps
    /// - `BlankStep` if a step name is empty or whitespace
    /// - `DuplicateStep` if a name appears twice across both phases
    /// - `GateOutsidePre` if a review gate is not a pre-production step
    pub fn new<P, Q, G>(pre: P, post: Q, review_gates: G) -> Result<Self, PipelineError>
    where
        P: IntoIterator,
        P::Item: Into<StepName>,
        Q: IntoIterator,
        Q::Item: Into<StepName>,
        G: IntoIterator,
        G::Item: Into<StepName>,
    {
        let pre: Vec<StepName> = pre.into_iter().map(Into::into).collect();
        let post: Vec<StepName> = post.into_iter().map(Into::into).collect();
        let review_gates: Vec<StepName> = review_gates.into_iter().map(Into::into).collect();

        if pre.is_empty() {
            return Err(PipelineError::EmptyPhase(Phase::Pre));
        }
        if post.is_empty() {
            return Err(PipelineError::EmptyPhase(Phase::Post));
        }

        let mut seen = HashSet::new();
        for step in pre.iter().chain(post.iter()) {
            if step.as_str().trim().is_empty() {
                return Err(PipelineError::BlankStep);
            }
            if !seen.insert(step.as_str()) {
                return Err(PipelineError::DuplicateStep(step.clone()));
            }
        }

        if let Some(gate) = review_gates.iter().find(|gate| !pre.contains(*gate)) {
            return Err(PipelineError::GateOutsidePre(gate.clone()));
        }

        Ok(Self {
            pre,
            post,
            review_gates,
        })
    }

    /// The production checklist used by the team.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            pre: to_steps(&STANDARD_PRE_STEPS),
            post: to_steps(&STANDARD_POST_STEPS),
            review_gates: to_steps(&STANDARD_REVIEW_GATES),
        }
    }

    #[must_use]
    pub fn steps(&self, phase: Phase) -> &[StepName] {
        match phase {
            Phase::Pre => &self.pre,
            Phase::Post => &self.post,
        }
    }

    #[must_use]
    pub fn pre_steps(&self) -> &[StepName] {
        &self.pre
    }

    #[must_use]
    pub fn post_steps(&self) -> &[StepName] {
        &self.post
    }

    #[must_use]
    pub fn review_gates(&self) -> &[StepName] {
        &self.review_gates
    }

    #[must_use]
    pub fn total_steps(&self) -> usize {
        self.pre.len() + self.post.len()
    }

    /// Every step in pipeline order, paired with its phase.
    pub fn ordered(&self) -> impl Iterator<Item = (Phase, &StepName)> {
        self.pre
            .iter()
            .map(|step| (Phase::Pre, step))
            .chain(self.post.iter().map(|step| (Phase::Post, step)))
    }

    /// Phase a step belongs to, or `None` for names outside the pipeline.
    #[must_use]
    pub fn phase_of(&self, step: &str) -> Option<Phase> {
        if self.pre.iter().any(|s| s.as_str() == step) {
            Some(Phase::Pre)
        } else if self.post.iter().any(|s| s.as_str() == step) {
            Some(Phase::Post)
        } else {
            None
        }
    }

    /// Position of a step in the combined pre ++ post ordering.
    #[must_use]
    pub fn position(&self, step: &str) -> Option<usize> {
        self.ordered().position(|(_, s)| s.as_str() == step)
    }

    #[must_use]
    pub fn is_review_gate(&self, step: &str) -> bool {
        self.review_gates.iter().any(|s| s.as_str() == step)
    }
}

impl Default for PipelineDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

fn to_steps(names: &[&str]) -> Vec<StepName> {
    names.iter().copied().map(StepName::from).collect()
}

pub const STANDARD_PRE_STEPS: [&str; 13] = [
    "Kickoff",
    "Research",
    "Outline Draft",
    "Outline Review",
    "Slide Plan Draft",
    "Slide Plan Review",
    "Slide Production Request",
    "Slide Completion Check",
    "Script Draft",
    "Script Check",
    "Script Review",
    "Avatar Voice Request",
    "Avatar Voice Complete",
];

pub const STANDARD_POST_STEPS: [&str; 10] = [
    "Video Edit Request",
    "Video First Cut Check",
    "Video Final Approval",
    "Thumbnail Request",
    "Thumbnail Check",
    "Thumbnail Final",
    "Announcement Request",
    "Upload Request",
    "Upload Check",
    "Announcement Complete",
];

pub const STANDARD_REVIEW_GATES: [&str; 3] = ["Outline Review", "Slide Plan Review", "Script Review"];

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_pipeline_is_valid() {
        let standard = PipelineDefinition::standard();
        let rebuilt = PipelineDefinition::new(
            STANDARD_PRE_STEPS,
            STANDARD_POST_STEPS,
            STANDARD_REVIEW_GATES,
        )
        .unwrap();
        assert_eq!(standard, rebuilt);
        assert_eq!(standard.total_steps(), 23);
    }

    #[test]
    fn rejects_empty_phase() {
        let err = PipelineDefinition::new(Vec::<&str>::new(), ["Publish"], Vec::<&str>::new())
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyPhase(Phase::Pre));

        let err = PipelineDefinition::new(["Draft"], Vec::<&str>::new(), Vec::<&str>::new())
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyPhase(Phase::Post));
    }

    #[test]
    fn rejects_duplicate_across_phases() {
        let err = PipelineDefinition::new(["Draft", "Check"], ["Check"], Vec::<&str>::new())
            .unwrap_err();
        assert_eq!(err, PipelineError::DuplicateStep(StepName::new("Check")));
    }

    #[test]
    fn rejects_blank_step() {
        let err = PipelineDefinition::new(["Draft", "  "], ["Publish"], Vec::<&str>::new())
            .unwrap_err();
        assert_eq!(err, PipelineError::BlankStep);
    }

    #[test]
    fn rejects_post_phase_gate() {
        let err = PipelineDefinition::new(["Draft"], ["Publish"], ["Publish"]).unwrap_err();
        assert_eq!(err, PipelineError::GateOutsidePre(StepName::new("Publish")));
    }

    #[test]
    fn ordered_walks_pre_then_post() {
        let pipeline = PipelineDefinition::new(["A", "B"], ["C"], Vec::<&str>::new()).unwrap();
        let order: Vec<_> = pipeline
            .ordered()
            .map(|(phase, step)| (phase, step.as_str().to_owned()))
            .collect();
        assert_eq!(
            order,
            vec![
                (Phase::Pre, "A".to_owned()),
                (Phase::Pre, "B".to_owned()),
                (Phase::Post, "C".to_owned()),
            ]
        );
        assert_eq!(pipeline.position("C"), Some(2));
        assert_eq!(pipeline.phase_of("Z"), None);
    }
}
