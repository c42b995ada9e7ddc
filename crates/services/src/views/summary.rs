use lesson_core::model::Lesson;
use lesson_core::progress::average_percent;
use serde::Serialize;

/// Headline counters for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub average_overall: u8,
    pub average_pre: u8,
    pub average_post: u8,
}

impl DashboardSummary {
    #[must_use]
    pub fn compute<'a>(lessons: impl IntoIterator<Item = &'a Lesson>) -> Self {
        let lessons: Vec<&Lesson> = lessons.into_iter().collect();
        let completed = lessons.iter().filter(|l| l.is_complete()).count();
        Self {
            total: lessons.len(),
            completed,
            remaining: lessons.len() - completed,
            average_overall: average_percent(lessons.iter().map(|l| l.progress().overall)),
            average_pre: average_percent(lessons.iter().map(|l| l.progress().pre)),
            average_post: average_percent(lessons.iter().map(|l| l.progress().post)),
        }
    }
}
