use std::collections::BTreeSet;
use std::sync::Arc;

use lesson_core::model::{Lesson, LessonDraft, RowIndex, StepName};
use lesson_core::pipeline::PipelineDefinition;
use lesson_core::Clock;
use serde::Serialize;
use storage::repository::{LessonBackend, LessonRecord, Storage, StorageError};

use crate::analytics::{compute_review_data, ReviewData};
use crate::error::SessionError;
use crate::mutation::{
    Cell, CellKey, CellValue, Command, MutationId, MutationQueue, PendingMutation, RemoteCall,
};

//
// ─── EVENTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing message, the equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Change notifications delivered synchronously to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    SnapshotReplaced { count: usize },
    LessonChanged { row: RowIndex },
    LessonAdded { row: RowIndex },
    LessonRemoved { row: RowIndex },
    MutationConfirmed { id: MutationId, key: CellKey },
    MutationRolledBack { id: MutationId, key: CellKey },
    Notice(Notice),
}

pub trait SessionObserver: Send {
    fn on_event(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send,
{
    fn on_event(&self, event: &SessionEvent) {
        self(event);
    }
}

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of [`LessonSession::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub id: MutationId,
    /// The call to send now, or `None` when it waits behind another call on
    /// the same cell; it is then handed out by a later `settle`.
    pub ready: Option<PendingMutation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationOutcome {
    Confirmed,
    RolledBack,
    /// Still waiting behind another call on the same cell.
    Queued,
    /// The mutation was no longer tracked, e.g. its lesson left the snapshot.
    Stale,
}

/// Result of [`LessonSession::settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub outcome: MutationOutcome,
    /// Next call released for the same cell.
    pub next: Option<PendingMutation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    pub row_index: RowIndex,
    pub folder_url: Option<String>,
    pub folder_error: Option<String>,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Owns the lesson collection and coordinates optimistic mutations against
/// the backend.
///
/// Local changes are applied and announced before any network activity.
/// Remote calls are serialized per cell; a failed call restores the cell's
/// last confirmed value and requests a full refresh.
pub struct LessonSession {
    backend: Arc<dyn LessonBackend>,
    pipeline: Arc<PipelineDefinition>,
    clock: Clock,
    lessons: Vec<Lesson>,
    queue: MutationQueue,
    next_mutation: u64,
    refresh_requested: bool,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl LessonSession {
    #[must_use]
    pub fn new(
        backend: Arc<dyn LessonBackend>,
        pipeline: Arc<PipelineDefinition>,
        clock: Clock,
    ) -> Self {
        Self {
            backend,
            pipeline,
            clock,
            lessons: Vec::new(),
            queue: MutationQueue::new(),
            next_mutation: 1,
            refresh_requested: false,
            observers: Vec::new(),
        }
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, pipeline: Arc<PipelineDefinition>, clock: Clock) -> Self {
        Self::new(Arc::clone(&storage.lessons), pipeline, clock)
    }

    pub fn subscribe(&mut self, observer: impl SessionObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, row: RowIndex) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.row_index() == row)
    }

    #[must_use]
    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// `true` after a rollback or a deletion until the next successful refresh.
    #[must_use]
    pub fn refresh_requested(&self) -> bool {
        self.refresh_requested
    }

    /// Calls in flight or waiting.
    #[must_use]
    pub fn pending_mutations(&self) -> usize {
        self.queue.pending()
    }

    /// Analytics over the current collection, for the clock's today.
    #[must_use]
    pub fn review_data(&self) -> ReviewData<'_> {
        compute_review_data(&self.pipeline, &self.lessons, self.clock.today())
    }

    //
    // ─── REFRESH ───────────────────────────────────────────────────────────────
    //

    /// Fetch the full snapshot and replace the collection.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the fetch fails or the snapshot is invalid;
    /// the previous collection is kept.
    pub async fn refresh(&mut self) -> Result<usize, SessionError> {
        let records = match self.backend.fetch_all().await {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(error = %err, "snapshot fetch failed");
                self.emit(SessionEvent::Notice(Notice::new(
                    NoticeLevel::Error,
                    format!("Could not load lessons: {err}"),
                )));
                return Err(err.into());
            }
        };
        self.replace_snapshot(records)
    }

    /// Replace the collection with a snapshot, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DuplicateRow` or `SessionError::Lesson` and keeps
    /// the previous collection.
    pub fn replace_snapshot(&mut self, records: Vec<LessonRecord>) -> Result<usize, SessionError> {
        let lessons = match self.convert_snapshot(records) {
            Ok(lessons) => lessons,
            Err(err) => {
                tracing::warn!(error = %err, "rejected snapshot");
                return Err(err);
            }
        };

        let count = lessons.len();
        self.lessons = lessons;
        self.queue.rebase(&self.lessons);
        self.refresh_requested = false;
        tracing::info!(count, "snapshot replaced");
        self.emit(SessionEvent::SnapshotReplaced { count });
        Ok(count)
    }

    fn convert_snapshot(&self, records: Vec<LessonRecord>) -> Result<Vec<Lesson>, SessionError> {
        let mut seen = BTreeSet::new();
        records
            .into_iter()
            .map(|record| {
                if !seen.insert(record.row_index) {
                    return Err(SessionError::DuplicateRow(record.row_index));
                }
                Ok(record.into_lesson(&self.pipeline)?)
            })
            .collect()
    }

    //
    // ─── MUTATIONS ─────────────────────────────────────────────────────────────
    //

    /// Apply a command locally and hand out its remote call.
    ///
    /// Observers hear `LessonChanged` before this returns. The caller sends
    /// `ready` (if any) and reports back through [`settle`](Self::settle).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownLesson` or `SessionError::Lesson` without
    /// touching any state.
    pub fn dispatch(&mut self, command: Command) -> Result<Dispatched, SessionError> {
        let row = command.row();
        let index = self
            .position(row)
            .ok_or(SessionError::UnknownLesson(row))?;
        let lesson = &mut self.lessons[index];

        let previous = match &command {
            Command::ToggleStep { step, value, .. } => {
                CellValue::Flag(lesson.set_step(&self.pipeline, step.as_str(), *value)?)
            }
            Command::EditField { edit, .. } => {
                CellValue::Field(lesson.set_field(edit.field(), edit.value().clone())?)
            }
        };

        let id = MutationId::new(self.next_mutation);
        self.next_mutation += 1;
        let key = command.cell_key();
        tracing::debug!(mutation_id = id.value(), row_index = row.value(), cell = %key.cell, "dispatched mutation");
        self.emit(SessionEvent::LessonChanged { row });

        let ready = self.queue.enqueue(
            key,
            previous,
            PendingMutation {
                id,
                call: RemoteCall::from_command(&command),
            },
        );
        if ready.is_none() {
            tracing::debug!(mutation_id = id.value(), "cell busy, call queued");
        }
        Ok(Dispatched { id, ready })
    }

    /// Report the outcome of a remote call handed out by `dispatch` or a
    /// previous `settle`.
    pub fn settle(&mut self, id: MutationId, result: Result<(), StorageError>) -> Settled {
        match result {
            Ok(()) => match self.queue.confirm(id) {
                Some(confirmed) => {
                    tracing::debug!(mutation_id = id.value(), cell = %confirmed.key, "mutation confirmed");
                    self.emit(SessionEvent::MutationConfirmed {
                        id,
                        key: confirmed.key,
                    });
                    Settled {
                        outcome: MutationOutcome::Confirmed,
                        next: confirmed.next,
                    }
                }
                None => self.stale(id),
            },
            Err(err) => match self.queue.reject(id) {
                Some(rejected) => {
                    tracing::warn!(
                        mutation_id = id.value(),
                        cell = %rejected.key,
                        discarded = rejected.discarded.len(),
                        error = %err,
                        "mutation rolled back"
                    );
                    self.restore(&rejected.key, rejected.known_good);
                    self.refresh_requested = true;
                    self.emit(SessionEvent::MutationRolledBack {
                        id,
                        key: rejected.key,
                    });
                    self.emit(SessionEvent::Notice(Notice::new(
                        NoticeLevel::Error,
                        format!("Update failed and was reverted: {err}"),
                    )));
                    Settled {
                        outcome: MutationOutcome::RolledBack,
                        next: None,
                    }
                }
                None => self.stale(id),
            },
        }
    }

    /// Dispatch a command and drive its cell's calls to completion.
    ///
    /// A rollback triggers the requested refresh before returning.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` only if the command is rejected locally; remote
    /// failures surface as `MutationOutcome::RolledBack`.
    pub async fn execute(&mut self, command: Command) -> Result<MutationOutcome, SessionError> {
        let dispatched = self.dispatch(command)?;
        let mut outcome = MutationOutcome::Queued;
        let mut next = dispatched.ready;

        while let Some(mutation) = next {
            let result = mutation.call.perform(self.backend.as_ref()).await;
            let settled = self.settle(mutation.id, result);
            if mutation.id == dispatched.id {
                outcome = settled.outcome;
            }
            next = settled.next;
        }

        if self.refresh_requested {
            if let Err(err) = self.refresh().await {
                tracing::warn!(error = %err, "refresh after rollback failed");
            }
        }
        Ok(outcome)
    }

    fn stale(&self, id: MutationId) -> Settled {
        tracing::debug!(mutation_id = id.value(), "settled mutation is no longer tracked");
        Settled {
            outcome: MutationOutcome::Stale,
            next: None,
        }
    }

    fn restore(&mut self, key: &CellKey, value: CellValue) {
        let Some(index) = self.position(key.row) else {
            return;
        };
        let lesson = &mut self.lessons[index];
        let restored = match (&key.cell, value) {
            (Cell::Step(step), CellValue::Flag(flag)) => lesson
                .set_step(&self.pipeline, step.as_str(), flag)
                .map(|_| ()),
            (Cell::Field(field), CellValue::Field(value)) => {
                lesson.set_field(*field, value).map(|_| ())
            }
            _ => Ok(()),
        };
        if let Err(err) = restored {
            tracing::warn!(cell = %key, error = %err, "could not restore cell");
        }
        self.emit(SessionEvent::LessonChanged { row: key.row });
    }

    //
    // ─── LESSON LIFECYCLE ──────────────────────────────────────────────────────
    //

    /// Validate and register a new lesson.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Draft` before any remote call for invalid input,
    /// or `SessionError::Storage` when the backend refuses.
    pub async fn create_lesson(&mut self, draft: LessonDraft) -> Result<CreateOutcome, SessionError> {
        let validated = draft.validate(&self.pipeline)?;
        let ack = match self.backend.create_lesson(&validated).await {
            Ok(ack) => ack,
            Err(err) => {
                self.emit(SessionEvent::Notice(Notice::new(
                    NoticeLevel::Error,
                    format!("Could not add lesson: {err}"),
                )));
                return Err(err.into());
            }
        };

        let title = validated.fields.title.clone();
        let lesson = validated.assign_row(&self.pipeline, ack.row_index)?;
        let row = lesson.row_index();
        match self.position(row) {
            Some(index) => self.lessons[index] = lesson,
            None => self.lessons.push(lesson),
        }
        tracing::info!(row_index = row.value(), "lesson created");
        self.emit(SessionEvent::LessonAdded { row });
        self.emit(SessionEvent::Notice(Notice::new(
            NoticeLevel::Success,
            format!("Added lesson \"{title}\""),
        )));
        if let Some(folder_error) = &ack.folder_error {
            self.emit(SessionEvent::Notice(Notice::new(
                NoticeLevel::Warning,
                format!("Lesson added but its folder was not created: {folder_error}"),
            )));
        }

        Ok(CreateOutcome {
            row_index: row,
            folder_url: ack.folder_url,
            folder_error: ack.folder_error,
        })
    }

    /// Delete a lesson, then refresh because later rows shift.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownLesson` or `SessionError::Storage`; the
    /// lesson stays in place on failure.
    pub async fn delete_lesson(&mut self, row: RowIndex) -> Result<(), SessionError> {
        let index = self
            .position(row)
            .ok_or(SessionError::UnknownLesson(row))?;
        if let Err(err) = self.backend.delete_lesson(row).await {
            self.emit(SessionEvent::Notice(Notice::new(
                NoticeLevel::Error,
                format!("Could not delete lesson: {err}"),
            )));
            return Err(err.into());
        }

        let removed = self.lessons.remove(index);
        self.queue.forget_row(row);
        self.refresh_requested = true;
        tracing::info!(row_index = row.value(), "lesson deleted");
        self.emit(SessionEvent::LessonRemoved { row });
        self.emit(SessionEvent::Notice(Notice::new(
            NoticeLevel::Success,
            format!("Deleted lesson \"{}\"", removed.title()),
        )));

        if let Err(err) = self.refresh().await {
            tracing::warn!(error = %err, "refresh after delete failed");
        }
        Ok(())
    }

    /// Notify reviewers that a gate step is ready.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotReviewGate` before any remote call for a
    /// non-gate step, or `SessionError::Storage` when the backend refuses.
    pub async fn request_review(&mut self, row: RowIndex, step: StepName) -> Result<(), SessionError> {
        let title = self
            .lesson(row)
            .ok_or(SessionError::UnknownLesson(row))?
            .title()
            .to_owned();
        if !self.pipeline.is_review_gate(step.as_str()) {
            return Err(SessionError::NotReviewGate(step));
        }

        match self.backend.request_review(row, &step).await {
            Ok(()) => {
                tracing::info!(row_index = row.value(), step = %step, "review requested");
                self.emit(SessionEvent::Notice(Notice::new(
                    NoticeLevel::Success,
                    format!("Review requested for \"{title}\" ({step})"),
                )));
                Ok(())
            }
            Err(err) => {
                self.emit(SessionEvent::Notice(Notice::new(
                    NoticeLevel::Error,
                    format!("Review request failed: {err}"),
                )));
                Err(err.into())
            }
        }
    }

    fn position(&self, row: RowIndex) -> Option<usize> {
        self.lessons
            .iter()
            .position(|lesson| lesson.row_index() == row)
    }

    fn emit(&self, event: SessionEvent) {
        for observer in &self.observers {
            observer.on_event(&event);
        }
    }
}
