use chrono::{Duration, NaiveDate};
use lesson_core::model::{LessonFields, RowIndex, StepMap};
use lesson_core::pipeline::{Phase, PipelineDefinition};

use crate::repository::{FIRST_ROW, LessonRecord};

struct DemoLesson {
    assignee: &'static str,
    title: &'static str,
    /// Number of leading pipeline steps already checked.
    done: usize,
    start_offset: i64,
    due_offset: Option<i64>,
    release_offset: Option<i64>,
}

const DEMO_LESSONS: &[DemoLesson] = &[
    DemoLesson {
        assignee: "Aoi",
        title: "Intro to Watercolor",
        done: usize::MAX,
        start_offset: -60,
        due_offset: Some(-20),
        release_offset: Some(-10),
    },
    DemoLesson {
        assignee: "Aoi",
        title: "Color Mixing Basics",
        done: 15,
        start_offset: -30,
        due_offset: Some(5),
        release_offset: Some(20),
    },
    DemoLesson {
        assignee: "Ren",
        title: "Brush Control",
        done: 4,
        start_offset: -25,
        due_offset: Some(-3),
        release_offset: None,
    },
    DemoLesson {
        assignee: "Ren",
        title: "Wet on Wet",
        done: 2,
        start_offset: -10,
        due_offset: Some(14),
        release_offset: None,
    },
    DemoLesson {
        assignee: "Mio",
        title: "Layering Techniques",
        done: 2,
        start_offset: -12,
        due_offset: Some(2),
        release_offset: None,
    },
    DemoLesson {
        assignee: "Mio",
        title: "Landscape Study",
        done: 0,
        start_offset: 7,
        due_offset: Some(40),
        release_offset: None,
    },
    DemoLesson {
        assignee: "",
        title: "Portrait Sketching",
        done: 0,
        start_offset: 14,
        due_offset: None,
        release_offset: None,
    },
];

/// Sample sheet rows, dated relative to `today`.
#[must_use]
pub fn demo_records(pipeline: &PipelineDefinition, today: NaiveDate) -> Vec<LessonRecord> {
    let at = |offset: i64| today + Duration::days(offset);

    DEMO_LESSONS
        .iter()
        .zip(FIRST_ROW..)
        .map(|(demo, row)| {
            let mut pre_steps = StepMap::new();
            let mut post_steps = StepMap::new();
            for (index, (phase, step)) in pipeline.ordered().enumerate() {
                let map = match phase {
                    Phase::Pre => &mut pre_steps,
                    Phase::Post => &mut post_steps,
                };
                map.insert(step.clone(), index < demo.done);
            }
            LessonRecord {
                row_index: RowIndex::new(row),
                fields: LessonFields {
                    assignee: demo.assignee.to_owned(),
                    title: demo.title.to_owned(),
                    start_date: Some(at(demo.start_offset)),
                    due_date: demo.due_offset.map(at),
                    release_date: demo.release_offset.map(at),
                },
                pre_steps,
                post_steps,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_rows_are_valid_lessons() {
        let pipeline = PipelineDefinition::standard();
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let lessons: Vec<_> = demo_records(&pipeline, today)
            .into_iter()
            .map(|record| record.into_lesson(&pipeline).unwrap())
            .collect();

        assert_eq!(lessons.len(), DEMO_LESSONS.len());
        assert_eq!(lessons[0].row_index(), RowIndex::new(FIRST_ROW));
        assert!(lessons[0].is_complete());
        assert_eq!(lessons[5].progress().overall, 0);
    }
}
