use std::collections::BTreeMap;

use chrono::NaiveDate;
use lesson_core::classify::{classify, detect_delay, DelayVerdict, LessonStatus};
use lesson_core::model::Lesson;
use lesson_core::pipeline::PipelineDefinition;
use lesson_core::progress::{average_percent, next_pending_step, PipelineStep};
use serde::Serialize;

use super::bottleneck::{compute_bottleneck_steps, BottleneckStep};
use super::workload::{compute_workload, Workload};

/// Number of delayed lessons highlighted in the stats.
pub const WORST_DELAY_LIMIT: usize = 2;

//
// ─── REPORT TYPES ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusGroups<'a> {
    pub released: Vec<&'a Lesson>,
    pub near_release: Vec<&'a Lesson>,
    pub in_progress: Vec<&'a Lesson>,
    pub not_started: Vec<&'a Lesson>,
}

impl<'a> StatusGroups<'a> {
    #[must_use]
    pub fn get(&self, status: LessonStatus) -> &[&'a Lesson] {
        match status {
            LessonStatus::Released => &self.released,
            LessonStatus::NearRelease => &self.near_release,
            LessonStatus::InProgress => &self.in_progress,
            LessonStatus::NotStarted => &self.not_started,
        }
    }

    fn push(&mut self, status: LessonStatus, lesson: &'a Lesson) {
        match status {
            LessonStatus::Released => self.released.push(lesson),
            LessonStatus::NearRelease => self.near_release.push(lesson),
            LessonStatus::InProgress => self.in_progress.push(lesson),
            LessonStatus::NotStarted => self.not_started.push(lesson),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssigneeGroup<'a> {
    pub name: String,
    pub lessons: Vec<&'a Lesson>,
    pub workload: Workload,
    pub average_progress: u8,
    /// Collection position of the group's first lesson.
    pub first_seen: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayEntry<'a> {
    pub lesson: &'a Lesson,
    #[serde(flatten)]
    pub verdict: DelayVerdict,
    /// Where the lesson is stuck.
    pub next_step: Option<PipelineStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats<'a> {
    pub total: usize,
    pub released: usize,
    pub near_release: usize,
    pub in_progress: usize,
    pub not_started: usize,
    pub delay_count: usize,
    pub warning_count: usize,
    pub average_overall: u8,
    pub average_pre: u8,
    pub average_post: u8,
    pub bottleneck_steps: Vec<BottleneckStep>,
    pub worst_delays: Vec<DelayEntry<'a>>,
}

/// Everything the review screen and the narrative need, borrowed from the
/// lesson collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewData<'a> {
    pub status_groups: StatusGroups<'a>,
    pub assignee_groups: Vec<AssigneeGroup<'a>>,
    pub delays: Vec<DelayEntry<'a>>,
    pub stats: ReviewStats<'a>,
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

/// Build the review report for `lessons` as of `today`.
///
/// Pure; recomputed from scratch on every call.
#[must_use]
pub fn compute_review_data<'a>(
    pipeline: &PipelineDefinition,
    lessons: &'a [Lesson],
    today: NaiveDate,
) -> ReviewData<'a> {
    let mut status_groups = StatusGroups::default();
    let mut by_assignee: BTreeMap<&'a str, (usize, Vec<&'a Lesson>)> = BTreeMap::new();
    let mut delays = Vec::new();

    for (position, lesson) in lessons.iter().enumerate() {
        status_groups.push(classify(lesson, today), lesson);
        by_assignee
            .entry(lesson.assignee_key())
            .or_insert_with(|| (position, Vec::new()))
            .1
            .push(lesson);

        let verdict = detect_delay(lesson, today);
        if verdict.is_flagged() {
            delays.push(DelayEntry {
                lesson,
                verdict,
                next_step: next_pending_step(pipeline, lesson),
            });
        }
    }

    // Delayed before warning, then most overdue first.
    delays.sort_by(|a, b| {
        b.verdict
            .is_delayed
            .cmp(&a.verdict.is_delayed)
            .then(b.verdict.days_overdue.cmp(&a.verdict.days_overdue))
    });

    let assignee_groups = by_assignee
        .into_iter()
        .map(|(name, (first_seen, lessons))| AssigneeGroup {
            name: name.to_owned(),
            workload: compute_workload(lessons.len()),
            average_progress: average_percent(lessons.iter().map(|l| l.progress().overall)),
            lessons,
            first_seen,
        })
        .collect();

    let stats = ReviewStats {
        total: lessons.len(),
        released: status_groups.released.len(),
        near_release: status_groups.near_release.len(),
        in_progress: status_groups.in_progress.len(),
        not_started: status_groups.not_started.len(),
        delay_count: delays.iter().filter(|d| d.verdict.is_delayed).count(),
        warning_count: delays.iter().filter(|d| d.verdict.is_warning).count(),
        average_overall: average_percent(lessons.iter().map(|l| l.progress().overall)),
        average_pre: average_percent(lessons.iter().map(|l| l.progress().pre)),
        average_post: average_percent(lessons.iter().map(|l| l.progress().post)),
        bottleneck_steps: compute_bottleneck_steps(pipeline, lessons),
        worst_delays: delays
            .iter()
            .filter(|d| d.verdict.is_delayed)
            .take(WORST_DELAY_LIMIT)
            .cloned()
            .collect(),
    };

    ReviewData {
        status_groups,
        assignee_groups,
        delays,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lesson_core::model::{LessonFields, RowIndex, StepMap, UNASSIGNED};
    use lesson_core::time::fixed_today;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(["A", "B"], ["C", "D"], ["B"]).unwrap()
    }

    fn lesson(row: u64, assignee: &str, checked: &[&str], due: Option<i64>) -> Lesson {
        let pipeline = pipeline();
        let fields = LessonFields {
            assignee: assignee.into(),
            title: format!("L{row}"),
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
    fn assignee_groups_are_sorted_with_unassigned_bucket() {
        let lessons = vec![
            lesson(2, "Ren", &["A"], None),
            lesson(3, "", &[], None),
            lesson(4, "Aoi", &["A", "B"], None),
            lesson(5, "Ren", &[], None),
        ];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());

        let names: Vec<&str> = data.assignee_groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec![UNASSIGNED, "Aoi", "Ren"]);
        let ren = &data.assignee_groups[2];
        assert_eq!(ren.lessons.len(), 2);
        assert_eq!(ren.workload, Workload::Light);
        assert_eq!(ren.average_progress, 13); // (25 + 0) / 2 = 12.5
    }

    #[test]
    fn delays_sort_delayed_first_then_by_days() {
        let lessons = vec![
            lesson(2, "A", &["A"], Some(3)),  // warning, -3
            lesson(3, "A", &["A"], Some(-1)), // delayed 1
            lesson(4, "A", &["A"], Some(-5)), // delayed 5
            lesson(5, "A", &["A"], Some(1)),  // warning, -1
            lesson(6, "A", &["A"], Some(-2)), // delayed 2
        ];
        let data = compute_review_data(&pipeline(), &lessons, fixed_today());

        let order: Vec<(u64, i64)> = data
            .delays
            .iter()
            .map(|d| (d.lesson.row_index().value(), d.verdict.days_overdue))
            .collect();
        assert_eq!(order, vec![(4, 5), (6, 2), (3, 1), (5, -1), (2, -3)]);
        assert_eq!(data.stats.delay_count, 3);
        assert_eq!(data.stats.warning_count, 2);

        let worst: Vec<u64> = data
            .stats
            .worst_delays
            .iter()
            .map(|d| d.lesson.row_index().value())
            .collect();
        assert_eq!(worst, vec![4, 6]);
    }

    #[test]
    fn empty_collection_yields_zeroes() {
        let data = compute_review_data(&pipeline(), &[], fixed_today());
        assert_eq!(data.stats.total, 0);
        assert_eq!(data.stats.average_overall, 0);
        assert!(data.assignee_groups.is_empty());
        assert!(data.stats.bottleneck_steps.is_empty());
    }
}
