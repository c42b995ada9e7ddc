use std::fmt;
use std::str::FromStr;

use lesson_core::model::{Lesson, RowIndex, StepName};
use lesson_core::pipeline::{Phase, PipelineDefinition};
use lesson_core::progress::next_pending_step;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatrixCell {
    Done,
    /// The lesson's next pending step, when it lies in this phase.
    Current,
    Pending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatrixSort {
    #[default]
    Default,
    ProgressAsc,
    ProgressDesc,
    Assignee,
}

impl MatrixSort {
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            MatrixSort::Default => "default",
            MatrixSort::ProgressAsc => "progress-asc",
            MatrixSort::ProgressDesc => "progress-desc",
            MatrixSort::Assignee => "assignee",
        }
    }
}

impl fmt::Display for MatrixSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MatrixSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "progress-asc" => Ok(Self::ProgressAsc),
            "progress-desc" => Ok(Self::ProgressDesc),
            "assignee" => Ok(Self::Assignee),
            other => Err(format!("unknown sort: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub row_index: RowIndex,
    pub assignee: String,
    pub title: String,
    pub cells: Vec<MatrixCell>,
    pub phase_percent: u8,
}

/// Lessons against the steps of one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMatrix {
    pub phase: Phase,
    pub steps: Vec<StepName>,
    pub rows: Vec<MatrixRow>,
}

impl StepMatrix {
    /// Build the matrix. Sorting is stable, so equal keys keep collection order.
    #[must_use]
    pub fn build<'a>(
        pipeline: &PipelineDefinition,
        phase: Phase,
        lessons: impl IntoIterator<Item = &'a Lesson>,
        sort: MatrixSort,
    ) -> Self {
        let steps = pipeline.steps(phase).to_vec();
        let mut rows: Vec<MatrixRow> = lessons
            .into_iter()
            .map(|lesson| {
                let current = next_pending_step(pipeline, lesson)
                    .filter(|next| next.phase == phase)
                    .map(|next| next.step);
                let cells = steps
                    .iter()
                    .map(|step| {
                        if lesson.is_checked(phase, step.as_str()) {
                            MatrixCell::Done
                        } else if current.as_ref() == Some(step) {
                            MatrixCell::Current
                        } else {
                            MatrixCell::Pending
                        }
                    })
                    .collect();
                MatrixRow {
                    row_index: lesson.row_index(),
                    assignee: lesson.assignee().to_owned(),
                    title: lesson.title().to_owned(),
                    cells,
                    phase_percent: lesson.progress().phase(phase),
                }
            })
            .collect();

        match sort {
            MatrixSort::Default => {}
            MatrixSort::ProgressAsc => rows.sort_by_key(|row| row.phase_percent),
            MatrixSort::ProgressDesc => {
                rows.sort_by(|a, b| b.phase_percent.cmp(&a.phase_percent));
            }
            MatrixSort::Assignee => rows.sort_by(|a, b| a.assignee.cmp(&b.assignee)),
        }

        Self { phase, steps, rows }
    }

    /// Number of lessons that finished each step, aligned with `steps`.
    #[must_use]
    pub fn done_counts(&self) -> Vec<usize> {
        (0..self.steps.len())
            .map(|i| {
                self.rows
                    .iter()
                    .filter(|row| row.cells[i] == MatrixCell::Done)
                    .count()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{LessonFields, StepMap};

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(["A", "B", "C"], ["D", "E"], Vec::<&str>::new()).unwrap()
    }

    fn lesson(pipeline: &PipelineDefinition, row: u64, assignee: &str, checked: &[&str]) -> Lesson {
        let fields = LessonFields {
            assignee: assignee.into(),
            ..LessonFields::default()
        };
        let mut lesson =
            Lesson::new(pipeline, RowIndex::new(row), fields, StepMap::new(), StepMap::new())
                .unwrap();
        for step in checked {
            lesson.set_step(pipeline, step, true).unwrap();
        }
        lesson
    }

    #[test]
    fn current_marks_next_pending_only_inside_phase() {
        let pipeline = pipeline();
        let lessons = vec![
            lesson(&pipeline, 2, "Ren", &["A"]),
            lesson(&pipeline, 3, "Aoi", &["A", "B", "C"]),
        ];

        let pre = StepMatrix::build(&pipeline, Phase::Pre, &lessons, MatrixSort::Default);
        assert_eq!(
            pre.rows[0].cells,
            vec![MatrixCell::Done, MatrixCell::Current, MatrixCell::Pending]
        );
        assert_eq!(pre.rows[1].cells, vec![MatrixCell::Done; 3]);
        assert_eq!(pre.done_counts(), vec![2, 1, 1]);

        let post = StepMatrix::build(&pipeline, Phase::Post, &lessons, MatrixSort::Default);
        assert_eq!(post.rows[0].cells, vec![MatrixCell::Pending; 2]);
        assert_eq!(post.rows[1].cells, vec![MatrixCell::Current, MatrixCell::Pending]);
    }

    #[test]
    fn sorts_by_phase_progress_and_assignee() {
        let pipeline = pipeline();
        let lessons = vec![
            lesson(&pipeline, 2, "Ren", &["A"]),
            lesson(&pipeline, 3, "Aoi", &["A", "B", "C"]),
            lesson(&pipeline, 4, "Mio", &[]),
        ];
        let rows = |sort| -> Vec<u64> {
            StepMatrix::build(&pipeline, Phase::Pre, &lessons, sort)
                .rows
                .iter()
                .map(|r| r.row_index.value())
                .collect()
        };

        assert_eq!(rows(MatrixSort::Default), vec![2, 3, 4]);
        assert_eq!(rows(MatrixSort::ProgressAsc), vec![4, 2, 3]);
        assert_eq!(rows(MatrixSort::ProgressDesc), vec![3, 2, 4]);
        assert_eq!(rows(MatrixSort::Assignee), vec![3, 4, 2]);
    }

    #[test]
    fn parses_sort_keys() {
        assert_eq!("progress-desc".parse::<MatrixSort>(), Ok(MatrixSort::ProgressDesc));
        assert!("newest".parse::<MatrixSort>().is_err());
    }
}
