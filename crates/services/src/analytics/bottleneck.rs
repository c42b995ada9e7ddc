use std::collections::BTreeMap;

use lesson_core::model::{Lesson, StepName};
use lesson_core::pipeline::{Phase, PipelineDefinition};
use lesson_core::progress::next_pending_step;
use serde::Serialize;

/// Number of steps reported as bottlenecks.
pub const BOTTLENECK_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BottleneckStep {
    pub step: StepName,
    pub phase: Phase,
    pub count: usize,
}

/// Steps where the most in-progress lessons are waiting.
///
/// Only lessons with `0 < overall < 100` are counted, each at its next
/// pending step. Highest count first; ties keep pipeline order.
#[must_use]
pub fn compute_bottleneck_steps(
    pipeline: &PipelineDefinition,
    lessons: &[Lesson],
) -> Vec<BottleneckStep> {
    let mut by_position: BTreeMap<usize, BottleneckStep> = BTreeMap::new();

    for lesson in lessons {
        let overall = lesson.progress().overall;
        if overall == 0 || overall == 100 {
            continue;
        }
        let Some(next) = next_pending_step(pipeline, lesson) else {
            continue;
        };
        let position = pipeline.position(next.step.as_str()).unwrap_or(usize::MAX);
        by_position
            .entry(position)
            .or_insert_with(|| BottleneckStep {
                step: next.step,
                phase: next.phase,
                count: 0,
            })
            .count += 1;
    }

    let mut steps: Vec<BottleneckStep> = by_position.into_values().collect();
    steps.sort_by(|a, b| b.count.cmp(&a.count));
    steps.truncate(BOTTLENECK_LIMIT);
    steps
}
