use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::field::{validate_text, FieldEditError, LessonField};
use crate::model::ids::{RowIndex, StepName};
use crate::model::lesson::{Lesson, LessonFields, StepMap};
use crate::pipeline::{Phase, PipelineDefinition};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonDraftError {
    #[error("invalid assignee: {0}")]
    Assignee(#[source] FieldEditError),

    #[error("invalid title: {0}")]
    Title(#[source] FieldEditError),

    #[error("initial step {0} is not part of the pipeline")]
    UnknownStep(StepName),
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// A lesson creation request as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonDraft {
    pub assignee: String,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub release_date: Option<NaiveDate>,
    /// Steps already done when the lesson is registered.
    pub initial_steps: Vec<StepName>,
}

impl LessonDraft {
    #[must_use]
    pub fn new(assignee: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            assignee: assignee.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Check required fields and initial steps before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns `LessonDraftError` for a blank or oversized assignee/title or a
    /// step outside the pipeline.
    pub fn validate(
        self,
        pipeline: &PipelineDefinition,
    ) -> Result<ValidatedDraft, LessonDraftError> {
        let assignee =
            validate_text(LessonField::Assignee, &self.assignee).map_err(LessonDraftError::Assignee)?;
        let title =
            validate_text(LessonField::Title, &self.title).map_err(LessonDraftError::Title)?;

        let mut pre = StepMap::new();
        let mut post = StepMap::new();
        for step in self.initial_steps {
            match pipeline.phase_of(step.as_str()) {
                Some(Phase::Pre) => pre.insert(step, true),
                Some(Phase::Post) => post.insert(step, true),
                None => return Err(LessonDraftError::UnknownStep(step)),
            };
        }

        Ok(ValidatedDraft {
            fields: LessonFields {
                assignee,
                title,
                start_date: self.start_date,
                due_date: self.due_date,
                release_date: self.release_date,
            },
            pre_steps: pre,
            post_steps: post,
        })
    }
}

/// A draft whose fields passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedDraft {
    pub fields: LessonFields,
    pub pre_steps: StepMap,
    pub post_steps: StepMap,
}

impl ValidatedDraft {
    /// Checked steps in pipeline order.
    #[must_use]
    pub fn initial_steps(&self, pipeline: &PipelineDefinition) -> Vec<StepName> {
        pipeline
            .ordered()
            .filter(|(phase, step)| {
                let map = match phase {
                    Phase::Pre => &self.pre_steps,
                    Phase::Post => &self.post_steps,
                };
                map.get(step.as_str()) == Some(&true)
            })
            .map(|(_, step)| step.clone())
            .collect()
    }

    /// Turn the draft into a lesson once the backend has assigned a row.
    ///
    /// # Errors
    ///
    /// Returns `LessonError` if the draft was validated against a different pipeline.
    pub fn assign_row(
        self,
        pipeline: &PipelineDefinition,
        row_index: RowIndex,
    ) -> Result<Lesson, crate::model::LessonError> {
        Lesson::new(
            pipeline,
            row_index,
            self.fields,
            self.pre_steps,
            self.post_steps,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(["Draft", "Review"], ["Edit", "Publish"], ["Review"]).unwrap()
    }

    #[test]
    fn draft_fails_without_assignee() {
        let err = LessonDraft::new("  ", "Lesson 01")
            .validate(&pipeline())
            .unwrap_err();
        assert!(matches!(err, LessonDraftError::Assignee(FieldEditError::Empty(_))));
    }

    #[test]
    fn draft_fails_without_title() {
        let err = LessonDraft::new("Aoi", "")
            .validate(&pipeline())
            .unwrap_err();
        assert!(matches!(err, LessonDraftError::Title(_)));
    }

    #[test]
    fn draft_rejects_unknown_initial_step() {
        let mut draft = LessonDraft::new("Aoi", "Lesson 01");
        draft.initial_steps = vec![StepName::new("Shoot")];
        let err = draft.validate(&pipeline()).unwrap_err();
        assert_eq!(err, LessonDraftError::UnknownStep(StepName::new("Shoot")));
    }

    #[test]
    fn valid_draft_assigns_row_with_progress() {
        let pipeline = pipeline();
        let mut draft = LessonDraft::new(" Aoi ", "Lesson 01");
        draft.initial_steps = vec![StepName::new("Edit"), StepName::new("Draft")];

        let validated = draft.validate(&pipeline).unwrap();
        assert_eq!(
            validated.initial_steps(&pipeline),
            vec![StepName::new("Draft"), StepName::new("Edit")]
        );

        let lesson = validated.assign_row(&pipeline, RowIndex::new(9)).unwrap();
        assert_eq!(lesson.row_index(), RowIndex::new(9));
        assert_eq!(lesson.assignee(), "Aoi");
        assert_eq!(lesson.progress().overall, 50);
    }
}
