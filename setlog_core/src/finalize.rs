//! Freezing a live session into an immutable historical record.

use crate::session::ExecutionSession;
use crate::store::ExecutionStore;
use crate::{
    CompletedExecution, Error, ExecutedExercise, ExecutedSet, ExecutionStatus, Result,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Caller-supplied details captured when the user finishes
#[derive(Clone, Debug)]
pub struct FinalizeOptions {
    pub finished_at: DateTime<Utc>,
    /// Overrides the duration derived from start/finish timestamps
    pub duration_minutes: Option<u32>,
    pub general_notes: Option<String>,
}

impl FinalizeOptions {
    pub fn at(finished_at: DateTime<Utc>) -> Self {
        Self {
            finished_at,
            duration_minutes: None,
            general_notes: None,
        }
    }
}

/// Resolve a workout's duration in whole minutes
///
/// An explicit value wins; otherwise the elapsed time is floored to minutes.
/// A finish before the start yields `None`.
pub fn resolve_duration_minutes(
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    explicit: Option<u32>,
) -> Option<u32> {
    if explicit.is_some() {
        return explicit;
    }
    let elapsed = finished_at - started_at;
    if elapsed < chrono::Duration::zero() {
        return None;
    }
    u32::try_from(elapsed.num_minutes()).ok()
}

/// Check that a session can be finalized
fn check_finalizable(session: &ExecutionSession) -> Result<()> {
    match session.status() {
        ExecutionStatus::InProgress => {}
        ExecutionStatus::Completed => return Err(Error::AlreadyFinalized),
        other => return Err(Error::SessionClosed(other)),
    }

    if session.completed_sets() == 0 {
        return Err(Error::NoProgress);
    }
    Ok(())
}

/// Build the historical record without touching session status
fn build_record(session: &ExecutionSession, options: &FinalizeOptions) -> CompletedExecution {
    let exercises = session
        .exercises()
        .iter()
        .map(|progress| ExecutedExercise {
            exercise_id: progress.exercise_id.clone(),
            name: progress.name.clone(),
            order: progress.order,
            notes: progress.notes.clone(),
            sets: progress
                .sets
                .iter()
                .map(|set| ExecutedSet {
                    order: set.order,
                    reps: set.actual_reps,
                    weight: set.actual_weight,
                    duration_seconds: set.actual_duration_seconds,
                    completed: set.completed,
                })
                .collect(),
        })
        .collect();

    CompletedExecution {
        id: session.id(),
        user_id: session.user_id().to_string(),
        template_id: Some(session.template_id().to_string()),
        template_name: Some(session.template_name().to_string()),
        started_at: session.started_at(),
        finished_at: options.finished_at,
        duration_minutes: resolve_duration_minutes(
            session.started_at(),
            options.finished_at,
            options.duration_minutes,
        ),
        body_weight: session.body_weight(),
        general_notes: options
            .general_notes
            .clone()
            .filter(|n| !n.trim().is_empty()),
        exercises,
    }
}

/// Freeze a session into a `CompletedExecution`
///
/// Every exercise and set is emitted in session order, including sets that
/// were never completed. On success the session is `Completed`.
pub fn finalize(
    session: &mut ExecutionSession,
    options: FinalizeOptions,
) -> Result<CompletedExecution> {
    check_finalizable(session)?;

    session.set_status(ExecutionStatus::Finalizing);
    let record = build_record(session, &options);
    session.set_status(ExecutionStatus::Completed);

    tracing::info!(
        "Finalized session {}: {} exercises, {} of {} sets completed",
        record.id,
        record.exercises.len(),
        record.completed_sets(),
        record.total_sets()
    );
    Ok(record)
}

/// Finalize a session and hand the record to a store as one step
///
/// If the store rejects the record the session goes back to `InProgress`
/// with everything recorded so far, and the store error is returned.
pub fn finalize_and_save(
    session: &mut ExecutionSession,
    options: FinalizeOptions,
    store: &mut impl ExecutionStore,
) -> Result<(Uuid, CompletedExecution)> {
    check_finalizable(session)?;

    session.set_status(ExecutionStatus::Finalizing);
    let record = build_record(session, &options);

    match store.save_completed_execution(&record) {
        Ok(id) => {
            session.set_status(ExecutionStatus::Completed);
            tracing::info!("Saved execution {} ({} sets)", id, record.total_sets());
            Ok((id, record))
        }
        Err(e) => {
            session.set_status(ExecutionStatus::InProgress);
            tracing::warn!("Failed to save session {}: {}. Session kept open.", session.id(), e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Page};
    use crate::{SetInput, TemplateExercise, WorkoutTemplate};
    use chrono::{Duration, TimeZone};

    /// Store that refuses every write
    struct FailingStore;

    impl ExecutionStore for FailingStore {
        fn save_completed_execution(&mut self, _: &CompletedExecution) -> Result<Uuid> {
            Err(Error::Store("connection refused".into()))
        }

        fn list_completed_executions(&self, _: &str, _: Page) -> Result<Vec<CompletedExecution>> {
            Ok(Vec::new())
        }

        fn delete_completed_execution(&mut self, id: Uuid) -> Result<()> {
            Err(Error::ExecutionNotFound(id))
        }
    }

    fn two_by_three() -> WorkoutTemplate {
        let exercise = |id: &str, order| TemplateExercise {
            exercise_id: id.into(),
            name: None,
            order,
            target_sets: 3,
            target_reps_range: Some("8-12".into()),
            rest_seconds: 90,
            use_global_rest: true,
        };
        WorkoutTemplate {
            id: "ab".into(),
            name: "A and B".into(),
            description: None,
            global_rest_seconds: 60,
            exercises: vec![exercise("a", 1), exercise("b", 2)],
        }
    }

    fn started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap()
    }

    fn session() -> ExecutionSession {
        ExecutionSession::start(&two_by_three(), "user", Some(75.5), started_at()).unwrap()
    }

    #[test]
    fn test_no_completed_sets_fails() {
        let mut session = session();
        session
            .record_set(0, 0, SetInput { reps: Some(8), ..SetInput::default() })
            .unwrap();

        let result = finalize(&mut session, FinalizeOptions::at(started_at()));
        assert!(matches!(result, Err(Error::NoProgress)));
        assert_eq!(session.status(), ExecutionStatus::InProgress);
    }

    #[test]
    fn test_full_workout_scenario() {
        crate::logging::init_test();
        let mut session = session();

        session.complete_set(0, 0).unwrap();
        let timer = session.rest_timer(0).unwrap();
        assert_eq!(timer.remaining_seconds(), 60);
        assert!(timer.is_running());

        for _ in 0..60 {
            session.tick_all().unwrap();
        }
        let timer = session.rest_timer(0).unwrap();
        assert_eq!(timer.remaining_seconds(), 0);
        assert!(!timer.is_running());

        session.complete_set(0, 1).unwrap();
        session.complete_set(0, 2).unwrap();
        for set in 0..3 {
            session.complete_set(1, set).unwrap();
        }

        let record = finalize(
            &mut session,
            FinalizeOptions::at(started_at() + Duration::minutes(52)),
        )
        .unwrap();

        assert_eq!(record.exercises.len(), 2);
        assert_eq!(record.total_sets(), 6);
        assert_eq!(record.completed_sets(), 6);
        assert_eq!(record.exercises[0].exercise_id, "a");
        assert_eq!(record.exercises[1].exercise_id, "b");
        assert_eq!(record.duration_minutes, Some(52));
        assert_eq!(record.body_weight, Some(75.5));
        assert_eq!(session.status(), ExecutionStatus::Completed);
    }

    #[test]
    fn test_incomplete_sets_are_kept_in_order() {
        let mut session = session();
        session.add_set(1).unwrap();
        session
            .record_set(1, 3, SetInput { reps: Some(4), weight: Some(20.0), duration_seconds: None })
            .unwrap();
        session.complete_set(1, 3).unwrap();

        let record = finalize(&mut session, FinalizeOptions::at(started_at())).unwrap();

        let orders: Vec<u32> = record.exercises[1].sets.iter().map(|s| s.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        assert!(!record.exercises[0].sets[0].completed);
        assert_eq!(record.exercises[0].sets[0].reps, None);
        assert_eq!(record.exercises[1].sets[3].reps, Some(4));
        assert_eq!(record.exercises[1].sets[3].weight, Some(20.0));
    }

    #[test]
    fn test_refinalize_fails() {
        let mut session = session();
        session.complete_set(0, 0).unwrap();
        finalize(&mut session, FinalizeOptions::at(started_at())).unwrap();

        assert!(matches!(
            finalize(&mut session, FinalizeOptions::at(started_at())),
            Err(Error::AlreadyFinalized)
        ));
        assert!(matches!(
            session.complete_set(0, 1),
            Err(Error::SessionClosed(ExecutionStatus::Completed))
        ));
    }

    #[test]
    fn test_abandoned_session_cannot_finalize() {
        let mut session = session();
        session.complete_set(0, 0).unwrap();
        session.abandon().unwrap();

        assert!(matches!(
            finalize(&mut session, FinalizeOptions::at(started_at())),
            Err(Error::SessionClosed(ExecutionStatus::Abandoned))
        ));
    }

    #[test]
    fn test_duration_resolution() {
        let start = started_at();
        assert_eq!(
            resolve_duration_minutes(start, start + Duration::seconds(59 * 60 + 59), None),
            Some(59)
        );
        assert_eq!(
            resolve_duration_minutes(start, start + Duration::minutes(10), Some(45)),
            Some(45)
        );
        assert_eq!(
            resolve_duration_minutes(start, start - Duration::minutes(1), None),
            None
        );
    }

    #[test]
    fn test_notes_carried_over() {
        let mut session = session();
        session.complete_set(0, 0).unwrap();
        session
            .set_exercise_notes(0, Some("felt heavy".into()))
            .unwrap();

        let options = FinalizeOptions {
            finished_at: started_at(),
            duration_minutes: Some(30),
            general_notes: Some("good session".into()),
        };
        let record = finalize(&mut session, options).unwrap();

        assert_eq!(record.exercises[0].notes.as_deref(), Some("felt heavy"));
        assert_eq!(record.general_notes.as_deref(), Some("good session"));
        assert_eq!(record.duration_minutes, Some(30));
    }

    #[test]
    fn test_finalize_and_save_success() {
        let mut session = session();
        session.complete_set(0, 0).unwrap();
        let mut store = MemoryStore::new();

        let (id, record) =
            finalize_and_save(&mut session, FinalizeOptions::at(started_at()), &mut store)
                .unwrap();

        assert_eq!(id, record.id);
        assert_eq!(session.status(), ExecutionStatus::Completed);
        let saved = store.list_completed_executions("user", Page::default()).unwrap();
        assert_eq!(saved, vec![record]);
    }

    #[test]
    fn test_store_failure_keeps_session_open() {
        let mut session = session();
        session.complete_set(0, 0).unwrap();
        let before = session.exercises().to_vec();

        let result =
            finalize_and_save(&mut session, FinalizeOptions::at(started_at()), &mut FailingStore);

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(session.status(), ExecutionStatus::InProgress);
        assert_eq!(session.exercises(), before.as_slice());

        // Retry against a working store succeeds
        let mut store = MemoryStore::new();
        finalize_and_save(&mut session, FinalizeOptions::at(started_at()), &mut store).unwrap();
        assert_eq!(store.len(), 1);
    }
}
