use chrono::NaiveDate;
use lesson_core::classify::{classify, detect_delay, LessonStatus};
use lesson_core::model::{Lesson, RowIndex, StepName};
use lesson_core::pipeline::{Phase, PipelineDefinition};
use lesson_core::progress::{
    last_completed_step, next_pending_step, phase_overview, PhaseOverview, PipelineStep, Progress,
};
use serde::Serialize;

/// Schedule alert shown on top of a card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DelayBanner {
    Overdue {
        days: i64,
        stuck_at: Option<StepName>,
    },
    DueSoon {
        days_remaining: i64,
        stuck_at: Option<StepName>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCheck {
    pub step: StepName,
    pub phase: Phase,
    pub checked: bool,
    /// Checking this step may be followed by a review request.
    pub review_gate: bool,
}

/// Everything a lesson card displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCard {
    pub row_index: RowIndex,
    pub assignee: String,
    pub title: String,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub release_date: Option<NaiveDate>,
    pub progress: Progress,
    pub status: LessonStatus,
    pub banner: Option<DelayBanner>,
    pub overview: PhaseOverview,
    /// Most advanced checked step.
    pub last_completed: Option<PipelineStep>,
    pub checklist: Vec<StepCheck>,
}

impl LessonCard {
    #[must_use]
    pub fn build(pipeline: &PipelineDefinition, lesson: &Lesson, today: NaiveDate) -> Self {
        let verdict = detect_delay(lesson, today);
        let stuck_at = || next_pending_step(pipeline, lesson).map(|next| next.step);
        let banner = if verdict.is_delayed {
            Some(DelayBanner::Overdue {
                days: verdict.days_overdue,
                stuck_at: stuck_at(),
            })
        } else if verdict.is_warning {
            Some(DelayBanner::DueSoon {
                days_remaining: verdict.days_remaining(),
                stuck_at: stuck_at(),
            })
        } else {
            None
        };

        let checklist = pipeline
            .ordered()
            .map(|(phase, step)| StepCheck {
                step: step.clone(),
                phase,
                checked: lesson.is_checked(phase, step.as_str()),
                review_gate: pipeline.is_review_gate(step.as_str()),
            })
            .collect();

        Self {
            row_index: lesson.row_index(),
            assignee: lesson.assignee().to_owned(),
            title: lesson.title().to_owned(),
            start_date: lesson.start_date(),
            due_date: lesson.due_date(),
            release_date: lesson.release_date(),
            progress: lesson.progress(),
            status: classify(lesson, today),
            banner,
            overview: phase_overview(pipeline, lesson),
            last_completed: last_completed_step(pipeline, lesson),
            checklist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lesson_core::model::{LessonFields, StepMap};
    use lesson_core::time::fixed_today;

    fn card(checked: &[&str], due: i64) -> LessonCard {
        let pipeline = PipelineDefinition::new(["A", "B"], ["C"], ["B"]).unwrap();
        let fields = LessonFields {
            title: "Lesson".into(),
            due_date: Some(fixed_today() + Duration::days(due)),
            ..LessonFields::default()
        };
        let mut lesson =
            Lesson::new(&pipeline, RowIndex::new(2), fields, StepMap::new(), StepMap::new())
                .unwrap();
        for step in checked {
            lesson.set_step(&pipeline, step, true).unwrap();
        }
        LessonCard::build(&pipeline, &lesson, fixed_today())
    }

    #[test]
    fn overdue_banner_names_stuck_step() {
        let card = card(&["A"], -2);
        assert_eq!(
            card.banner,
            Some(DelayBanner::Overdue {
                days: 2,
                stuck_at: Some(StepName::new("B")),
            })
        );
        assert_eq!(card.status, LessonStatus::InProgress);
        assert_eq!(
            card.last_completed.map(|last| last.step),
            Some(StepName::new("A"))
        );
    }

    #[test]
    fn due_soon_banner_counts_remaining_days() {
        let card = card(&[], 3);
        assert_eq!(
            card.banner,
            Some(DelayBanner::DueSoon {
                days_remaining: 3,
                stuck_at: Some(StepName::new("A")),
            })
        );
    }

    #[test]
    fn checklist_marks_review_gates() {
        let card = card(&["A"], 30);
        assert_eq!(card.banner, None);
        let gates: Vec<&str> = card
            .checklist
            .iter()
            .filter(|c| c.review_gate)
            .map(|c| c.step.as_str())
            .collect();
        assert_eq!(gates, vec!["B"]);
        assert!(card.checklist[0].checked);
    }
}
