use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use lesson_core::model::Lesson;
use serde::Serialize;

/// Dashboard assignee selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssigneeFilter {
    #[default]
    All,
    Named(String),
}

impl AssigneeFilter {
    #[must_use]
    pub fn matches(&self, lesson: &Lesson) -> bool {
        match self {
            AssigneeFilter::All => true,
            AssigneeFilter::Named(name) => lesson.assignee() == name,
        }
    }

    /// Lessons passing the filter, in collection order.
    #[must_use]
    pub fn apply<'a>(&self, lessons: &'a [Lesson]) -> Vec<&'a Lesson> {
        lessons.iter().filter(|lesson| self.matches(lesson)).collect()
    }

    /// Keep the selection only while the assignee still exists.
    #[must_use]
    pub fn retain_within(self, options: &[String]) -> Self {
        match self {
            AssigneeFilter::Named(name) if !options.contains(&name) => AssigneeFilter::All,
            other => other,
        }
    }
}

impl FromStr for AssigneeFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            Ok(Self::Named(s.to_owned()))
        }
    }
}

impl fmt::Display for AssigneeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssigneeFilter::All => f.write_str("all"),
            AssigneeFilter::Named(name) => f.write_str(name),
        }
    }
}

/// Distinct non-empty assignee names in first-seen order.
#[must_use]
pub fn assignee_options(lessons: &[Lesson]) -> Vec<String> {
    let mut options: Vec<String> = Vec::new();
    for lesson in lessons {
        let name = lesson.assignee();
        if !name.is_empty() && !options.iter().any(|known| known == name) {
            options.push(name.to_owned());
        }
    }
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use lesson_core::model::{LessonFields, RowIndex, StepMap};
    use lesson_core::pipeline::PipelineDefinition;

    fn lessons(names: &[&str]) -> Vec<Lesson> {
        let pipeline = PipelineDefinition::standard();
        names
            .iter()
            .zip(2..)
            .map(|(name, row)| {
                let fields = LessonFields {
                    assignee: (*name).into(),
                    ..LessonFields::default()
                };
                Lesson::new(&pipeline, RowIndex::new(row), fields, StepMap::new(), StepMap::new())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn options_are_distinct_in_first_seen_order() {
        let lessons = lessons(&["Ren", "", "Aoi", "Ren"]);
        assert_eq!(assignee_options(&lessons), vec!["Ren".to_owned(), "Aoi".to_owned()]);
    }

    #[test]
    fn vanished_assignee_falls_back_to_all() {
        let lessons = lessons(&["Ren"]);
        let options = assignee_options(&lessons);
        let filter = AssigneeFilter::Named("Mio".into()).retain_within(&options);
        assert_eq!(filter, AssigneeFilter::All);

        let kept = AssigneeFilter::Named("Ren".into()).retain_within(&options);
        assert_eq!(kept, AssigneeFilter::Named("Ren".into()));
    }

    #[test]
    fn named_filter_selects_matching_lessons() {
        let lessons = lessons(&["Ren", "Aoi", "Ren"]);
        let filter: AssigneeFilter = "Ren".parse().unwrap();
        let rows: Vec<u64> = filter
            .apply(&lessons)
            .iter()
            .map(|l| l.row_index().value())
            .collect();
        assert_eq!(rows, vec![2, 4]);
        assert_eq!("all".parse::<AssigneeFilter>().unwrap(), AssigneeFilter::All);
    }
}
