use serde::{Deserialize, Serialize};

use crate::model::{Lesson, StepName};
use crate::pipeline::{Phase, PipelineDefinition};

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Completion percentages of a lesson, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Progress {
    pub overall: u8,
    pub pre: u8,
    pub post: u8,
}

impl Progress {
    #[must_use]
    pub fn phase(&self, phase: Phase) -> u8 {
        match phase {
            Phase::Pre => self.pre,
            Phase::Post => self.post,
        }
    }
}

/// Derive per-phase and overall completion from a lesson's step flags.
///
/// Pure and idempotent. Percentages are rounded half-up.
///
/// # Examples
///
/// ```
/// # use lesson_core::model::{Lesson, LessonFields, RowIndex, StepMap, StepName};
/// # use lesson_core::pipeline::PipelineDefinition;
/// # use lesson_core::progress::compute_progress;
/// let pipeline = PipelineDefinition::new(["A", "B", "C"], ["D"], Vec::<&str>::new())?;
/// let mut pre = StepMap::new();
/// pre.insert(StepName::new("A"), true);
/// let lesson = Lesson::new(&pipeline, RowIndex::new(1), LessonFields::default(), pre, StepMap::new())?;
///
/// let progress = compute_progress(&pipeline, &lesson);
/// assert_eq!(progress.pre, 33);
/// assert_eq!(progress.post, 0);
/// assert_eq!(progress.overall, 25);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use]
pub fn compute_progress(pipeline: &PipelineDefinition, lesson: &Lesson) -> Progress {
    let pre_checked = lesson.checked_count(pipeline, Phase::Pre);
    let post_checked = lesson.checked_count(pipeline, Phase::Post);

    Progress {
        overall: percent(pre_checked + post_checked, pipeline.total_steps()),
        pre: percent(pre_checked, pipeline.pre_steps().len()),
        post: percent(post_checked, pipeline.post_steps().len()),
    }
}

/// `round(100 * part / total)` with halves rounded up.
///
/// `total` is never zero for a constructed pipeline; a zero total yields 0.
#[must_use]
pub fn percent(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let part = part.min(total);
    let rounded = (200 * part + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

/// Average of a sequence of percentages, rounded half-up; 0 when empty.
#[must_use]
pub fn average_percent(values: impl IntoIterator<Item = u8>) -> u8 {
    let (sum, count) = values
        .into_iter()
        .fold((0_usize, 0_usize), |(sum, count), v| (sum + usize::from(v), count + 1));
    if count == 0 {
        return 0;
    }
    let rounded = (2 * sum + count) / (2 * count);
    u8::try_from(rounded).unwrap_or(100)
}

//
// ─── NEXT / LAST STEP ──────────────────────────────────────────────────────────
//

/// A step located in the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PipelineStep {
    pub phase: Phase,
    pub step: StepName,
}

/// First unchecked step over pre ++ post, or `None` when every step is done.
///
/// This is the "stuck point" shown to users and the unit of bottleneck counting.
#[must_use]
pub fn next_pending_step(pipeline: &PipelineDefinition, lesson: &Lesson) -> Option<PipelineStep> {
    pipeline
        .ordered()
        .find(|(phase, step)| !lesson.is_checked(*phase, step.as_str()))
        .map(|(phase, step)| PipelineStep {
            phase,
            step: step.clone(),
        })
}

/// Last checked step in pipeline order, or `None` if nothing is checked.
#[must_use]
pub fn last_completed_step(pipeline: &PipelineDefinition, lesson: &Lesson) -> Option<PipelineStep> {
    pipeline
        .ordered()
        .filter(|(phase, step)| lesson.is_checked(*phase, step.as_str()))
        .last()
        .map(|(phase, step)| PipelineStep {
            phase,
            step: step.clone(),
        })
}

//
// ─── PHASE OVERVIEW ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PhaseStatus {
    Pending,
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseState {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub checked: usize,
    pub total: usize,
}

/// The step a lesson is currently working on, with its phase tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentStep {
    pub step: StepName,
    pub phase: Phase,
    pub done: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseOverview {
    pub phases: Vec<PhaseState>,
    pub current_step: Option<CurrentStep>,
}

/// Per-phase status badges plus the step in progress.
#[must_use]
pub fn phase_overview(pipeline: &PipelineDefinition, lesson: &Lesson) -> PhaseOverview {
    let phases = Phase::ALL
        .iter()
        .map(|&phase| {
            let total = pipeline.steps(phase).len();
            let checked = lesson.checked_count(pipeline, phase);
            let status = if checked == 0 {
                PhaseStatus::Pending
            } else if checked == total {
                PhaseStatus::Completed
            } else {
                PhaseStatus::Active
            };
            PhaseState {
                phase,
                status,
                checked,
                total,
            }
        })
        .collect();

    let current_step = next_pending_step(pipeline, lesson).map(|next| CurrentStep {
        done: lesson.checked_count(pipeline, next.phase),
        total: pipeline.steps(next.phase).len(),
        step: next.step,
        phase: next.phase,
    });

    PhaseOverview {
        phases,
        current_step,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
