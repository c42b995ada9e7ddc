use serde::Serialize;
use std::fmt;

/// Load bucket of an assignee by number of assigned lessons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Workload {
    Light,
    Medium,
    Heavy,
}

impl Workload {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Workload::Light => "Light",
            Workload::Medium => "Medium",
            Workload::Heavy => "Heavy",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `Light` up to 2 lessons, `Medium` up to 4, `Heavy` beyond.
#[must_use]
pub fn compute_workload(count: usize) -> Workload {
    match count {
        0..=2 => Workload::Light,
        3..=4 => Workload::Medium,
        _ => Workload::Heavy,
    }
}
