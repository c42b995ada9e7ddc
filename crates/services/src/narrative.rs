//! Plain-language summary lines over a [`ReviewData`] report.

use std::fmt;

use lesson_core::classify::WARNING_WINDOW_DAYS;

use crate::analytics::{AssigneeGroup, ReviewData};

/// Assignees below this many lessons are not called out.
pub const HEAVY_ASSIGNEE_MIN: usize = 2;

/// Compose the summary statements in display order: overall totals, the top
/// bottleneck, the schedule situation, then the busiest assignee when one
/// stands out.
#[must_use]
pub fn compose_narrative(data: &ReviewData<'_>) -> Vec<String> {
    let stats = &data.stats;
    let mut lines = Vec::with_capacity(4);

    if stats.released > 0 {
        lines.push(format!(
            "{} of {} released, {} in progress",
            stats.released,
            count(stats.total, "lesson"),
            stats.in_progress
        ));
    } else {
        lines.push(format!(
            "{} of {} in progress, none released yet",
            stats.in_progress,
            count(stats.total, "lesson")
        ));
    }

    match stats.bottleneck_steps.first() {
        Some(top) => lines.push(format!(
            "{} waiting at {} ({}), possibly pending review",
            count(top.count, "lesson"),
            top.step,
            top.phase.label()
        )),
        None => lines.push("No step is holding lessons up".to_owned()),
    }

    if let Some(worst) = stats.worst_delays.first() {
        lines.push(format!(
            "\"{}\" is {} overdue and needs attention",
            worst.lesson.title(),
            count(worst.verdict.days_overdue, "day")
        ));
    } else if stats.warning_count > 0 {
        lines.push(format!(
            "{} due within {} days",
            count(stats.warning_count, "lesson"),
            WARNING_WINDOW_DAYS
        ));
    } else {
        lines.push("Schedule on track".to_owned());
    }

    if let Some(busiest) = busiest_assignee(&data.assignee_groups) {
        if busiest.lessons.len() >= HEAVY_ASSIGNEE_MIN {
            lines.push(format!(
                "{} carries the heaviest load with {} lessons",
                busiest.name,
                busiest.lessons.len()
            ));
        }
    }

    lines
}

/// `1 lesson`, `3 lessons`.
fn count<N>(n: N, noun: &str) -> String
where
    N: fmt::Display + PartialEq + From<u8>,
{
    if n == N::from(1) {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

/// Largest group; ties go to the assignee seen first in the collection.
fn busiest_assignee<'g, 'a>(groups: &'g [AssigneeGroup<'a>]) -> Option<&'g AssigneeGroup<'a>> {
    groups
        .iter()
        .max_by(|a, b| {
            a.lessons
                .len()
                .cmp(&b.lessons.len())
                .then(b.first_seen.cmp(&a.first_seen))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::compute_review_data;
    use chrono::Duration;
    use lesson_core::model::{Lesson, LessonFields, RowIndex, StepMap};
    use lesson_core::pipeline::PipelineDefinition;
    use lesson_core::time::fixed_today;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(["A", "B"], ["C", "D"], ["B"]).unwrap()
    }

    fn lesson(row: u64, assignee: &str, checked: &[&str], due: Option<i64>) -> Lesson {
        let pipeline = pipeline();
        let fields = LessonFields {
            assignee: assignee.into(),
            title: format!("Lesson {row}"),
            due_date: due.map(|d| fixed_today() + Duration::days(d)),
            ..LessonFields::default()
        };
        let mut lesson =
            Lesson::new(&pipeline, RowIndex::new(row), fields, StepMap::new(), StepMap::new())
                .unwrap();
        for step in checked {
            lesson.set_step(&pipeline, step, true).unwrap();
        }
        lesson
    }

    #[test]
    fn quiet_collection_reads_as_on_track() {
        let lessons = vec![lesson(2, "Aoi", &[], None)];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());
        let lines = compose_narrative(&data);

        assert_eq!(
            lines,
            vec![
                "0 of 1 lesson in progress, none released yet".to_owned(),
                "No step is holding lessons up".to_owned(),
                "Schedule on track".to_owned(),
            ]
        );
    }

    #[test]
    fn busy_collection_names_bottleneck_delay_and_assignee() {
        let lessons = vec![
            lesson(2, "Ren", &["A", "B", "C", "D"], None),
            lesson(3, "Ren", &["A"], Some(-4)),
            lesson(4, "Aoi", &["A"], Some(2)),
            lesson(5, "Ren", &[], None),
        ];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());
        let lines = compose_narrative(&data);

        assert_eq!(lines[0], "1 of 4 lessons released, 2 in progress");
        assert_eq!(lines[1], "2 lessons waiting at B (pre-production), possibly pending review");
        assert_eq!(lines[2], "\"Lesson 3\" is 4 days overdue and needs attention");
        assert_eq!(lines[3], "Ren carries the heaviest load with 3 lessons");
    }

    #[test]
    fn warnings_reported_when_nothing_is_late() {
        let lessons = vec![lesson(2, "Aoi", &["A"], Some(5))];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());
        assert_eq!(compose_narrative(&data)[2], "1 lesson due within 7 days");
    }

    #[test]
    fn single_counts_read_in_singular() {
        let lessons = vec![
            lesson(2, "Ren", &["A"], Some(-1)),
            lesson(3, "Aoi", &["A", "B", "C", "D"], None),
        ];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());
        let lines = compose_narrative(&data);

        assert_eq!(lines[0], "1 of 2 lessons released, 1 in progress");
        assert_eq!(lines[1], "1 lesson waiting at B (pre-production), possibly pending review");
        assert_eq!(lines[2], "\"Lesson 2\" is 1 day overdue and needs attention");
    }

    #[test]
    fn ties_pick_assignee_seen_first() {
        let lessons = vec![
            lesson(2, "Ren", &[], None),
            lesson(3, "Aoi", &[], None),
            lesson(4, "Ren", &[], None),
            lesson(5, "Aoi", &[], None),
        ];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());
        assert_eq!(
            compose_narrative(&data).last().map(String::as_str),
            Some("Ren carries the heaviest load with 2 lessons")
        );
    }
}
