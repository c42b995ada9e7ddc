use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use lesson_core::model::{
    FieldEdit, FieldEditError, FieldValue, Lesson, LessonField, RowIndex, StepName,
};
use serde::Serialize;
use storage::repository::{LessonBackend, StorageError};

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

/// A user intent against one cell of one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleStep {
        row: RowIndex,
        step: StepName,
        value: bool,
    },
    EditField {
        row: RowIndex,
        edit: FieldEdit,
    },
}

impl Command {
    #[must_use]
    pub fn toggle_step(row: RowIndex, step: impl Into<StepName>, value: bool) -> Self {
        Self::ToggleStep {
            row,
            step: step.into(),
            value,
        }
    }

    /// Build a field edit, validating the value first.
    ///
    /// # Errors
    ///
    /// Returns `FieldEditError` for blank text or a value of the wrong kind.
    pub fn edit_field(
        row: RowIndex,
        field: LessonField,
        value: FieldValue,
    ) -> Result<Self, FieldEditError> {
        Ok(Self::EditField {
            row,
            edit: FieldEdit::new(field, value)?,
        })
    }

    #[must_use]
    pub fn row(&self) -> RowIndex {
        match self {
            Command::ToggleStep { row, .. } | Command::EditField { row, .. } => *row,
        }
    }

    #[must_use]
    pub fn cell_key(&self) -> CellKey {
        let cell = match self {
            Command::ToggleStep { step, .. } => Cell::Step(step.clone()),
            Command::EditField { edit, .. } => Cell::Field(edit.field()),
        };
        CellKey {
            row: self.row(),
            cell,
        }
    }

    #[must_use]
    pub fn value(&self) -> CellValue {
        match self {
            Command::ToggleStep { value, .. } => CellValue::Flag(*value),
            Command::EditField { edit, .. } => CellValue::Field(edit.value().clone()),
        }
    }
}

//
// ─── CELLS ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cell {
    Step(StepName),
    Field(LessonField),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Step(step) => write!(f, "{step}"),
            Cell::Field(field) => write!(f, "{field}"),
        }
    }
}

/// Address of a mutable cell: one step flag or one field of one lesson.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellKey {
    pub row: RowIndex,
    pub cell: Cell,
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} / {}", self.row, self.cell)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Flag(bool),
    Field(FieldValue),
}

impl CellValue {
    /// Read the cell's current value from a lesson.
    #[must_use]
    pub fn read(lesson: &Lesson, cell: &Cell) -> Self {
        match cell {
            Cell::Step(step) => CellValue::Flag(lesson.step(step.as_str()).unwrap_or(false)),
            Cell::Field(field) => CellValue::Field(lesson.field(*field)),
        }
    }
}

//
// ─── REMOTE CALLS ──────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MutationId(u64);

impl MutationId {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The backend request that confirms an optimistic change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    SetStep {
        row: RowIndex,
        step: StepName,
        value: bool,
    },
    SetField {
        row: RowIndex,
        field: LessonField,
        value: FieldValue,
    },
}

impl RemoteCall {
    #[must_use]
    pub fn from_command(command: &Command) -> Self {
        match command {
            Command::ToggleStep { row, step, value } => RemoteCall::SetStep {
                row: *row,
                step: step.clone(),
                value: *value,
            },
            Command::EditField { row, edit } => RemoteCall::SetField {
                row: *row,
                field: edit.field(),
                value: edit.value().clone(),
            },
        }
    }

    /// Send the call to `backend`.
    ///
    /// # Errors
    ///
    /// Returns whatever `StorageError` the backend reports.
    pub async fn perform(&self, backend: &dyn LessonBackend) -> Result<(), StorageError> {
        match self {
            RemoteCall::SetStep { row, step, value } => {
                backend.mutate_step(*row, step, *value).await
            }
            RemoteCall::SetField { row, field, value } => {
                backend.mutate_field(*row, *field, value).await
            }
        }
    }

    fn value(&self) -> CellValue {
        match self {
            RemoteCall::SetStep { value, .. } => CellValue::Flag(*value),
            RemoteCall::SetField { value, .. } => CellValue::Field(value.clone()),
        }
    }
}

/// A remote call released for sending. Report its outcome through
/// `LessonSession::settle` with the same id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMutation {
    pub id: MutationId,
    pub call: RemoteCall,
}

//
// ─── QUEUE ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
struct CellState {
    known_good: CellValue,
    in_flight: PendingMutation,
    waiting: VecDeque<PendingMutation>,
}

/// A settled call whose cell has more work queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmed {
    pub key: CellKey,
    pub next: Option<PendingMutation>,
}

/// A failed call: the cell must return to `known_good`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub key: CellKey,
    pub known_good: CellValue,
    pub discarded: Vec<MutationId>,
}

/// Serializes remote calls per cell.
///
/// A cell is tracked only while it has a call in flight. At most one call per
/// cell is in flight; later calls wait in arrival order.
#[derive(Debug, Default)]
pub struct MutationQueue {
    cells: BTreeMap<CellKey, CellState>,
}

impl MutationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `mutation` for `key`. Returns it back when the cell was idle and
    /// the call may be sent right away.
    ///
    /// `current` is the cell's value before the optimistic change; it becomes
    /// the known-good value when the cell starts being tracked.
    pub fn enqueue(
        &mut self,
        key: CellKey,
        current: CellValue,
        mutation: PendingMutation,
    ) -> Option<PendingMutation> {
        if let Some(state) = self.cells.get_mut(&key) {
            state.waiting.push_back(mutation);
            return None;
        }
        self.cells.insert(
            key,
            CellState {
                known_good: current,
                in_flight: mutation.clone(),
                waiting: VecDeque::new(),
            },
        );
        Some(mutation)
    }

    /// Record success of the in-flight call `id`, releasing the cell's next call.
    ///
    /// Returns `None` if `id` is not in flight.
    pub fn confirm(&mut self, id: MutationId) -> Option<Confirmed> {
        let key = self.key_in_flight(id)?;
        let state = self.cells.get_mut(&key)?;
        state.known_good = state.in_flight.call.value();

        let next = state.waiting.pop_front();
        match &next {
            Some(next) => state.in_flight = next.clone(),
            None => {
                self.cells.remove(&key);
            }
        }
        Some(Confirmed { key, next })
    }

    /// Record failure of the in-flight call `id`, dropping the cell's queue.
    ///
    /// Returns `None` if `id` is not in flight.
    pub fn reject(&mut self, id: MutationId) -> Option<Rejected> {
        let key = self.key_in_flight(id)?;
        let state = self.cells.remove(&key)?;
        Some(Rejected {
            key,
            known_good: state.known_good,
            discarded: state.waiting.into_iter().map(|m| m.id).collect(),
        })
    }

    /// Adopt a fresh snapshot as the known-good baseline.
    ///
    /// Cells of lessons missing from the snapshot are forgotten; their
    /// in-flight outcomes will no longer match.
    pub fn rebase(&mut self, lessons: &[Lesson]) {
        self.cells.retain(|key, state| {
            match lessons.iter().find(|lesson| lesson.row_index() == key.row) {
                Some(lesson) => {
                    state.known_good = CellValue::read(lesson, &key.cell);
                    true
                }
                None => false,
            }
        });
    }

    /// Forget every cell of a row.
    pub fn forget_row(&mut self, row: RowIndex) {
        self.cells.retain(|key, _| key.row != row);
    }

    /// Number of calls in flight or waiting.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.cells.values().map(|state| 1 + state.waiting.len()).sum()
    }

    fn key_in_flight(&self, id: MutationId) -> Option<CellKey> {
        self.cells
            .iter()
            .find(|(_, state)| state.in_flight.id == id)
            .map(|(key, _)| key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(step: &str) -> CellKey {
        CellKey {
            row: RowIndex::new(2),
            cell: Cell::Step(StepName::new(step)),
        }
    }

    fn mutation(id: u64, step: &str, value: bool) -> PendingMutation {
        PendingMutation {
            id: MutationId::new(id),
            call: RemoteCall::SetStep {
                row: RowIndex::new(2),
                step: StepName::new(step),
                value,
            },
        }
    }

    #[test]
    fn second_call_waits_until_first_confirms() {
        let mut queue = MutationQueue::new();
        let first = queue.enqueue(key("Kickoff"), CellValue::Flag(false), mutation(1, "Kickoff", true));
        assert!(first.is_some());

        let second = queue.enqueue(key("Kickoff"), CellValue::Flag(true), mutation(2, "Kickoff", false));
        assert!(second.is_none());
        assert_eq!(queue.pending(), 2);

        let confirmed = queue.confirm(MutationId::new(1)).unwrap();
        assert_eq!(confirmed.next, Some(mutation(2, "Kickoff", false)));

        let confirmed = queue.confirm(MutationId::new(2)).unwrap();
        assert_eq!(confirmed.next, None);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn other_cells_are_independent() {
        let mut queue = MutationQueue::new();
        queue.enqueue(key("Kickoff"), CellValue::Flag(false), mutation(1, "Kickoff", true));
        let other = queue.enqueue(key("Research"), CellValue::Flag(false), mutation(2, "Research", true));
        assert!(other.is_some());
    }

    #[test]
    fn rejection_restores_last_confirmed_value_and_drops_queue() {
        let mut queue = MutationQueue::new();
        queue.enqueue(key("Kickoff"), CellValue::Flag(false), mutation(1, "Kickoff", true));
        queue.enqueue(key("Kickoff"), CellValue::Flag(true), mutation(2, "Kickoff", false));
        queue.enqueue(key("Kickoff"), CellValue::Flag(false), mutation(3, "Kickoff", true));

        queue.confirm(MutationId::new(1)).unwrap();
        let rejected = queue.reject(MutationId::new(2)).unwrap();

        assert_eq!(rejected.known_good, CellValue::Flag(true));
        assert_eq!(rejected.discarded, vec![MutationId::new(3)]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut queue = MutationQueue::new();
        assert!(queue.confirm(MutationId::new(9)).is_none());
        assert!(queue.reject(MutationId::new(9)).is_none());
    }

    #[test]
    fn queued_call_is_not_settleable_before_release() {
        let mut queue = MutationQueue::new();
        queue.enqueue(key("Kickoff"), CellValue::Flag(false), mutation(1, "Kickoff", true));
        queue.enqueue(key("Kickoff"), CellValue::Flag(true), mutation(2, "Kickoff", false));
        assert!(queue.confirm(MutationId::new(2)).is_none());
    }
}
