use std::fmt::Write as _;

use chrono::NaiveDate;
use lesson_core::model::Lesson;
use lesson_core::pipeline::{Phase, PipelineDefinition};
use serde::Serialize;
use services::analytics::{compute_review_data, ReviewData};
use services::compose_narrative;
use services::views::{AssigneeFilter, DashboardSummary, DelayBanner, LessonCard, MatrixCell, MatrixSort, StepMatrix};

/// Everything one `report` invocation prints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
    pub today: NaiveDate,
    pub filter: AssigneeFilter,
    pub summary: DashboardSummary,
    pub cards: Vec<LessonCard>,
    pub review: ReviewData<'a>,
    pub narrative: Vec<String>,
    pub matrix: Option<StepMatrix>,
}

impl<'a> Report<'a> {
    /// `visible` is the collection after the assignee filter was applied.
    #[must_use]
    pub fn build(
        pipeline: &PipelineDefinition,
        visible: &'a [Lesson],
        today: NaiveDate,
        filter: AssigneeFilter,
        matrix: Option<(Phase, MatrixSort)>,
    ) -> Self {
        let review = compute_review_data(pipeline, visible, today);
        let narrative = compose_narrative(&review);
        Self {
            today,
            filter,
            summary: DashboardSummary::compute(visible),
            cards: visible
                .iter()
                .map(|lesson| LessonCard::build(pipeline, lesson, today))
                .collect(),
            review,
            narrative,
            matrix: matrix.map(|(phase, sort)| StepMatrix::build(pipeline, phase, visible, sort)),
        }
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> std::fmt::Result {
        let s = &self.summary;
        writeln!(out, "Lessons as of {} ({})", self.today, self.filter)?;
        writeln!(
            out,
            "  {} total, {} complete, {} remaining | avg {}% (pre {}%, post {}%)",
            s.total, s.completed, s.remaining, s.average_overall, s.average_pre, s.average_post
        )?;

        writeln!(out)?;
        writeln!(out, "Summary")?;
        for line in &self.narrative {
            writeln!(out, "  - {line}")?;
        }

        let stats = &self.review.stats;
        writeln!(out)?;
        writeln!(
            out,
            "Status: {} released, {} near release, {} in progress, {} not started",
            stats.released, stats.near_release, stats.in_progress, stats.not_started
        )?;
        writeln!(
            out,
            "Schedule: {} overdue, {} due within a week",
            stats.delay_count, stats.warning_count
        )?;

        if !stats.bottleneck_steps.is_empty() {
            writeln!(out)?;
            writeln!(out, "Bottlenecks")?;
            for b in &stats.bottleneck_steps {
                writeln!(out, "  {:<24} {:<16} {}", b.step, b.phase.label(), b.count)?;
            }
        }

        if !self.review.assignee_groups.is_empty() {
            writeln!(out)?;
            writeln!(out, "Assignees")?;
            for group in &self.review.assignee_groups {
                writeln!(
                    out,
                    "  {:<16} {:>2} lessons  {:<6} avg {}%",
                    group.name,
                    group.lessons.len(),
                    group.workload.label(),
                    group.average_progress
                )?;
            }
        }

        writeln!(out)?;
        writeln!(out, "Lessons")?;
        for card in &self.cards {
            writeln!(
                out,
                "  [{}] {} / {}  {}%  {}",
                card.row_index,
                card.assignee,
                card.title,
                card.progress.overall,
                card.status.label()
            )?;
            if let Some(last) = &card.last_completed {
                writeln!(out, "      last done: {} ({})", last.step, last.phase.label())?;
            }
            match &card.banner {
                Some(DelayBanner::Overdue { days, stuck_at }) => {
                    write!(out, "      overdue by {days} days")?;
                    if let Some(step) = stuck_at {
                        write!(out, ", stuck at {step}")?;
                    }
                    writeln!(out)?;
                }
                Some(DelayBanner::DueSoon {
                    days_remaining,
                    stuck_at,
                }) => {
                    write!(out, "      due in {days_remaining} days")?;
                    if let Some(step) = stuck_at {
                        write!(out, ", next {step}")?;
                    }
                    writeln!(out)?;
                }
                None => {}
            }
        }

        if let Some(matrix) = &self.matrix {
            writeln!(out)?;
            writeln!(out, "Matrix ({})", matrix.phase.label())?;
            for (i, step) in matrix.steps.iter().enumerate() {
                writeln!(out, "  {:>2}. {step}", i + 1)?;
            }
            for row in &matrix.rows {
                let cells: String = row
                    .cells
                    .iter()
                    .map(|cell| match cell {
                        MatrixCell::Done => '#',
                        MatrixCell::Current => '>',
                        MatrixCell::Pending => '.',
                    })
                    .collect();
                writeln!(
                    out,
                    "  [{}] {:<16} {} {:>3}%",
                    row.row_index, row.assignee, cells, row.phase_percent
                )?;
            }
            let counts: Vec<String> = matrix.done_counts().iter().map(ToString::to_string).collect();
            writeln!(out, "  done per step: {}", counts.join(" "))?;
        }

        Ok(())
    }
}
