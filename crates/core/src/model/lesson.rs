use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::field::{FieldValue, LessonField};
use crate::model::ids::{RowIndex, StepName};
use crate::pipeline::{Phase, PipelineDefinition};
use crate::progress::{compute_progress, Progress};

/// Completion flags of one phase, keyed by step name.
pub type StepMap = BTreeMap<StepName, bool>;

/// Placeholder used when a lesson has no assignee.
pub const UNASSIGNED: &str = "(unassigned)";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("step {step} is not part of the {phase} phase")]
    UnknownStep { phase: Phase, step: StepName },

    #[error("step {0} is not part of the pipeline")]
    NotInPipeline(String),

    #[error("field {field} cannot hold this value")]
    FieldTypeMismatch { field: LessonField },
}

//
// ─── FIELDS ────────────────────────────────────────────────────────────────────
//

/// Scalar attributes of a lesson.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonFields {
    pub assignee: String,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub release_date: Option<NaiveDate>,
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A lesson and its two-phase step-completion state.
///
/// `progress` is private and only written by [`Lesson::recompute_progress`],
/// which every step mutator calls before returning. Step maps always carry an
/// entry for every pipeline step of their phase (missing flags read as `false`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    row_index: RowIndex,
    #[serde(flatten)]
    fields: LessonFields,
    pre_steps: StepMap,
    post_steps: StepMap,
    progress: Progress,
}

impl Lesson {
    /// Build a lesson from backend data, validating step names against the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::UnknownStep` if a map holds a step outside its phase.
    pub fn new(
        pipeline: &PipelineDefinition,
        row_index: RowIndex,
        fields: LessonFields,
        pre_steps: StepMap,
        post_steps: StepMap,
    ) -> Result<Self, LessonError> {
        let pre_steps = normalize_steps(pipeline, Phase::Pre, pre_steps)?;
        let post_steps = normalize_steps(pipeline, Phase::Post, post_steps)?;

        let mut lesson = Self {
            row_index,
            fields,
            pre_steps,
            post_steps,
            progress: Progress::default(),
        };
        lesson.recompute_progress(pipeline);
        Ok(lesson)
    }

    #[must_use]
    pub fn row_index(&self) -> RowIndex {
        self.row_index
    }

    #[must_use]
    pub fn fields(&self) -> &LessonFields {
        &self.fields
    }

    #[must_use]
    pub fn assignee(&self) -> &str {
        &self.fields.assignee
    }

    /// Assignee name, or [`UNASSIGNED`] when blank.
    #[must_use]
    pub fn assignee_key(&self) -> &str {
        let name = self.fields.assignee.trim();
        if name.is_empty() { UNASSIGNED } else { name }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.fields.title
    }

    #[must_use]
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.fields.start_date
    }

    #[must_use]
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.fields.due_date
    }

    #[must_use]
    pub fn release_date(&self) -> Option<NaiveDate> {
        self.fields.release_date
    }

    #[must_use]
    pub fn progress(&self) -> Progress {
        self.progress
    }

    #[must_use]
    pub fn steps(&self, phase: Phase) -> &StepMap {
        match phase {
            Phase::Pre => &self.pre_steps,
            Phase::Post => &self.post_steps,
        }
    }

    #[must_use]
    pub fn is_checked(&self, phase: Phase, step: &str) -> bool {
        self.steps(phase).get(step).copied().unwrap_or(false)
    }

    /// Current flag of a step in either phase, `None` if the step is unknown.
    #[must_use]
    pub fn step(&self, step: &str) -> Option<bool> {
        self.pre_steps
            .get(step)
            .or_else(|| self.post_steps.get(step))
            .copied()
    }

    /// Number of checked steps of a phase, counted over the pipeline's steps.
    #[must_use]
    pub fn checked_count(&self, pipeline: &PipelineDefinition, phase: Phase) -> usize {
        pipeline
            .steps(phase)
            .iter()
            .filter(|step| self.is_checked(phase, step.as_str()))
            .count()
    }

    #[must_use]
    pub fn any_checked(&self, phase: Phase) -> bool {
        self.steps(phase).values().any(|checked| *checked)
    }

    /// Set a step flag and recompute progress. Returns the previous flag.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::NotInPipeline` if the step is unknown.
    pub fn set_step(
        &mut self,
        pipeline: &PipelineDefinition,
        step: &str,
        value: bool,
    ) -> Result<bool, LessonError> {
        let phase = pipeline
            .phase_of(step)
            .ok_or_else(|| LessonError::NotInPipeline(step.to_owned()))?;
        let map = match phase {
            Phase::Pre => &mut self.pre_steps,
            Phase::Post => &mut self.post_steps,
        };
        let previous = map.insert(StepName::new(step), value).unwrap_or(false);
        self.recompute_progress(pipeline);
        Ok(previous)
    }

    /// Current value of a scalar field.
    #[must_use]
    pub fn field(&self, field: LessonField) -> FieldValue {
        match field {
            LessonField::Assignee => FieldValue::Text(self.fields.assignee.clone()),
            LessonField::Title => FieldValue::Text(self.fields.title.clone()),
            LessonField::StartDate => FieldValue::Date(self.fields.start_date),
            LessonField::DueDate => FieldValue::Date(self.fields.due_date),
            LessonField::ReleaseDate => FieldValue::Date(self.fields.release_date),
        }
    }

    /// Replace a scalar field. Returns the previous value.
    ///
    /// Fields carry no step state, so progress is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::FieldTypeMismatch` if a text field receives a date or vice versa.
    pub fn set_field(
        &mut self,
        field: LessonField,
        value: FieldValue,
    ) -> Result<FieldValue, LessonError> {
        let previous = self.field(field);
        match (field, value) {
            (LessonField::Assignee, FieldValue::Text(text)) => self.fields.assignee = text,
            (LessonField::Title, FieldValue::Text(text)) => self.fields.title = text,
            (LessonField::StartDate, FieldValue::Date(date)) => self.fields.start_date = date,
            (LessonField::DueDate, FieldValue::Date(date)) => self.fields.due_date = date,
            (LessonField::ReleaseDate, FieldValue::Date(date)) => self.fields.release_date = date,
            (field, _) => return Err(LessonError::FieldTypeMismatch { field }),
        }
        Ok(previous)
    }

    /// Recompute the derived progress from the step maps.
    pub fn recompute_progress(&mut self, pipeline: &PipelineDefinition) {
        self.progress = compute_progress(pipeline, self);
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress.overall == 100
    }
}

fn normalize_steps(
    pipeline: &PipelineDefinition,
    phase: Phase,
    mut given: StepMap,
) -> Result<StepMap, LessonError> {
    let mut steps = StepMap::new();
    for step in pipeline.steps(phase) {
        let checked = given.remove(step.as_str()).unwrap_or(false);
        steps.insert(step.clone(), checked);
    }
    if let Some((step, _)) = given.into_iter().next() {
        return Err(LessonError::UnknownStep { phase, step });
    }
    Ok(steps)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
