use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Lesson;
use crate::pipeline::Phase;

/// Days before the due date at which an unfinished lesson starts warning.
pub const WARNING_WINDOW_DAYS: i64 = 7;

/// Lessons at or above this overall percentage do not raise warnings.
pub const WARNING_PROGRESS_CEILING: u8 = 80;

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle bucket of a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LessonStatus {
    Released,
    NearRelease,
    InProgress,
    NotStarted,
}

impl LessonStatus {
    pub const ALL: [LessonStatus; 4] = [
        LessonStatus::Released,
        LessonStatus::NearRelease,
        LessonStatus::InProgress,
        LessonStatus::NotStarted,
    ];

    /// Stable key used by presentation code.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            LessonStatus::Released => "released",
            LessonStatus::NearRelease => "nearRelease",
            LessonStatus::InProgress => "inProgress",
            LessonStatus::NotStarted => "notStarted",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            LessonStatus::Released => "Released",
            LessonStatus::NearRelease => "Near release",
            LessonStatus::InProgress => "In progress",
            LessonStatus::NotStarted => "Not started",
        }
    }
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `true` when the lesson is complete or its release date has arrived.
#[must_use]
pub fn is_released(lesson: &Lesson, today: NaiveDate) -> bool {
    lesson.is_complete() || lesson.release_date().is_some_and(|release| release <= today)
}

/// Map a lesson to its lifecycle bucket. First matching rule wins:
///
/// 1. `Released`: overall progress is 100, or the release date is on or before `today`
/// 2. `NearRelease`: any post-production step is checked
/// 3. `InProgress`: any pre-production step is checked
/// 4. `NotStarted`
#[must_use]
pub fn classify(lesson: &Lesson, today: NaiveDate) -> LessonStatus {
    if is_released(lesson, today) {
        LessonStatus::Released
    } else if lesson.any_checked(Phase::Post) {
        LessonStatus::NearRelease
    } else if lesson.any_checked(Phase::Pre) {
        LessonStatus::InProgress
    } else {
        LessonStatus::NotStarted
    }
}

//
// ─── DELAY ─────────────────────────────────────────────────────────────────────
//

/// Schedule verdict of a lesson relative to a given day.
///
/// `days_overdue` is positive when late and negative (days remaining) when a
/// warning is raised; it is 0 whenever neither flag is set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayVerdict {
    pub is_delayed: bool,
    pub is_warning: bool,
    pub days_overdue: i64,
}

impl DelayVerdict {
    /// `true` if the verdict is either delayed or warning.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.is_delayed || self.is_warning
    }

    /// Days left before the due date for a warning verdict.
    #[must_use]
    pub fn days_remaining(&self) -> i64 {
        if self.is_warning {
            -self.days_overdue
        } else {
            0
        }
    }
}

/// Detect whether a lesson is past due or close to its due date.
///
/// No verdict when the due date is unset or the lesson is already released.
/// A warning fires from [`WARNING_WINDOW_DAYS`] days before the due date unless
/// overall progress has reached [`WARNING_PROGRESS_CEILING`].
///
/// # Examples
///
/// ```
/// # use chrono::NaiveDate;
/// # use lesson_core::classify::detect_delay;
/// # use lesson_core::model::{Lesson, LessonFields, RowIndex, StepMap};
/// # use lesson_core::pipeline::PipelineDefinition;
/// let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
/// let fields = LessonFields {
///     due_date: NaiveDate::from_ymd_opt(2024, 5, 8),
///     ..LessonFields::default()
/// };
/// let pipeline = PipelineDefinition::standard();
/// let lesson = Lesson::new(&pipeline, RowIndex::new(2), fields, StepMap::new(), StepMap::new())?;
///
/// let verdict = detect_delay(&lesson, today);
/// assert!(verdict.is_delayed);
/// assert_eq!(verdict.days_overdue, 2);
/// # Ok::<(), lesson_core::model::LessonError>(())
/// ```
#[must_use]
pub fn detect_delay(lesson: &Lesson, today: NaiveDate) -> DelayVerdict {
    let Some(due) = lesson.due_date() else {
        return DelayVerdict::default();
    };
    if is_released(lesson, today) {
        return DelayVerdict::default();
    }

    let days = (today - due).num_days();
    if days > 0 {
        DelayVerdict {
            is_delayed: true,
            is_warning: false,
            days_overdue: days,
        }
    } else if days >= -WARNING_WINDOW_DAYS && lesson.progress().overall < WARNING_PROGRESS_CEILING
    {
        DelayVerdict {
            is_delayed: false,
            is_warning: true,
            days_overdue: days,
        }
    } else {
        DelayVerdict::default()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonFields, RowIndex, StepMap};
    use crate::pipeline::PipelineDefinition;
    use crate::time::fixed_today;
    use chrono::Duration;
    use yare::parameterized;

    // Two steps per phase: each checked step is 25% overall.
    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(["Draft", "Review"], ["Edit", "Publish"], ["Review"]).unwrap()
    }

    fn lesson(checked: &[&str], fields: LessonFields) -> Lesson {
        let pipeline = pipeline();
        let mut lesson = Lesson::new(
            &pipeline,
            RowIndex::new(2),
            fields,
            StepMap::new(),
            StepMap::new(),
        )
        .unwrap();
        for step in checked {
            lesson.set_step(&pipeline, step, true).unwrap();
        }
        lesson
    }

    fn due_in(days: i64) -> LessonFields {
        LessonFields {
            due_date: Some(fixed_today() + Duration::days(days)),
            ..LessonFields::default()
        }
    }

    #[parameterized(
        untouched = { &[], LessonStatus::NotStarted },
        pre_only = { &["Draft"], LessonStatus::InProgress },
        post_without_pre = { &["Edit"], LessonStatus::NearRelease },
        pre_and_post = { &["Draft", "Review", "Edit"], LessonStatus::NearRelease },
        complete = { &["Draft", "Review", "Edit", "Publish"], LessonStatus::Released },
    )]
    fn classify_by_checked_steps(checked: &[&str], expected: LessonStatus) {
        let lesson = lesson(checked, LessonFields::default());
        assert_eq!(classify(&lesson, fixed_today()), expected);
    }

    #[parameterized(
        released_yesterday = { -1, LessonStatus::Released },
        released_today = { 0, LessonStatus::Released },
        releases_tomorrow = { 1, LessonStatus::InProgress },
    )]
    fn classify_by_release_date(offset: i64, expected: LessonStatus) {
        let fields = LessonFields {
            release_date: Some(fixed_today() + Duration::days(offset)),
            ..LessonFields::default()
        };
        let lesson = lesson(&["Draft"], fields);
        assert_eq!(classify(&lesson, fixed_today()), expected);
    }

    #[test]
    fn classification_is_total_over_all_flag_combinations() {
        let steps = ["Draft", "Review", "Edit", "Publish"];
        for mask in 0_u8..16 {
            let checked: Vec<&str> = steps
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, s)| *s)
                .collect();
            let lesson = lesson(&checked, LessonFields::default());
            let status = classify(&lesson, fixed_today());
            let matches = LessonStatus::ALL.iter().filter(|s| **s == status).count();
            assert_eq!(matches, 1);
        }
    }

    #[parameterized(
        overdue_one_day = { &["Draft", "Review"], -1, true, false, 1 },
        overdue_ten_days = { &[], -10, true, false, 10 },
        due_today_warns = { &["Draft"], 0, false, true, 0 },
        due_in_three_days = { &["Draft", "Review"], 3, false, true, -3 },
        edge_of_window = { &[], 7, false, true, -7 },
        outside_window = { &[], 8, false, false, 0 },
        three_quarters_still_warns = { &["Draft", "Review", "Edit"], 3, false, true, -3 },
    )]
    fn detect_delay_cases(
        checked: &[&str],
        due_offset: i64,
        delayed: bool,
        warning: bool,
        days: i64,
    ) {
        let lesson = lesson(checked, due_in(due_offset));
        let verdict = detect_delay(&lesson, fixed_today());
        assert_eq!(
            verdict,
            DelayVerdict {
                is_delayed: delayed,
                is_warning: warning,
                days_overdue: days,
            }
        );
    }

    #[test]
    fn no_verdict_without_due_date() {
        let lesson = lesson(&["Draft"], LessonFields::default());
        assert_eq!(detect_delay(&lesson, fixed_today()), DelayVerdict::default());
    }

    #[test]
    fn complete_lesson_is_never_delayed() {
        let lesson = lesson(&["Draft", "Review", "Edit", "Publish"], due_in(-30));
        assert_eq!(detect_delay(&lesson, fixed_today()), DelayVerdict::default());
    }

    #[test]
    fn released_by_date_is_never_delayed() {
        let mut fields = due_in(-5);
        fields.release_date = Some(fixed_today() - Duration::days(1));
        let lesson = lesson(&["Draft"], fields);
        assert!(!detect_delay(&lesson, fixed_today()).is_flagged());
    }

    #[test]
    fn nearly_done_lesson_does_not_warn() {
        let pipeline = PipelineDefinition::standard();
        let mut lesson = Lesson::new(
            &pipeline,
            RowIndex::new(3),
            due_in(2),
            StepMap::new(),
            StepMap::new(),
        )
        .unwrap();
        let steps: Vec<_> = pipeline.ordered().map(|(_, s)| s.clone()).take(19).collect();
        for step in &steps {
            lesson.set_step(&pipeline, step.as_str(), true).unwrap();
        }
        assert_eq!(lesson.progress().overall, 83);
        assert_eq!(detect_delay(&lesson, fixed_today()), DelayVerdict::default());
    }

    #[test]
    fn warning_reports_days_remaining() {
        let lesson = lesson(&[], due_in(4));
        let verdict = detect_delay(&lesson, fixed_today());
        assert_eq!(verdict.days_remaining(), 4);
    }
}
