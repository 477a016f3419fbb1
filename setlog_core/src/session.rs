//! Live workout execution state machine.
//!
//! An [`ExecutionSession`] is seeded from a template and mutated set by set
//! until it is finalized (see `finalize`) or abandoned. Each exercise owns an
//! independent rest timer that restarts whenever one of its sets is completed.
//!
//! ```text
//! InProgress ──► Finalizing ──► Completed
//!     │              │
//!     │              └──► InProgress (store handoff failed)
//!     └──► Abandoned
//! ```

use crate::templates::{parse_recommended_reps, TemplateStore};
use crate::timer::{RestEvent, RestTimer};
use crate::{
    Error, ExecutionStatus, ExerciseProgress, Result, SetInput, SetRecord, WorkoutTemplate,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Result of moving the exercise cursor forward
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorMove {
    /// Cursor now points at this exercise index
    Moved(usize),
    /// Cursor was already on the last exercise
    ReadyToFinalize,
}

/// One live performance of a workout template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(from = "SessionSnapshot")]
pub struct ExecutionSession {
    id: Uuid,
    template_id: String,
    template_name: String,
    user_id: String,
    started_at: DateTime<Utc>,
    body_weight: Option<f64>,
    global_rest_seconds: u32,
    exercises: Vec<ExerciseProgress>,
    status: ExecutionStatus,
    cursor: usize,
    rest_timers: Vec<RestTimer>,
}

/// Serialized form of a session; timers may be missing or stale
#[derive(Deserialize)]
struct SessionSnapshot {
    id: Uuid,
    template_id: String,
    template_name: String,
    user_id: String,
    started_at: DateTime<Utc>,
    body_weight: Option<f64>,
    global_rest_seconds: u32,
    exercises: Vec<ExerciseProgress>,
    status: ExecutionStatus,
    cursor: usize,
    #[serde(default)]
    rest_timers: Vec<RestTimer>,
}

impl From<SessionSnapshot> for ExecutionSession {
    fn from(snapshot: SessionSnapshot) -> Self {
        let mut session = Self {
            id: snapshot.id,
            template_id: snapshot.template_id,
            template_name: snapshot.template_name,
            user_id: snapshot.user_id,
            started_at: snapshot.started_at,
            body_weight: snapshot.body_weight,
            global_rest_seconds: snapshot.global_rest_seconds,
            exercises: snapshot.exercises,
            status: snapshot.status,
            cursor: snapshot.cursor,
            rest_timers: snapshot.rest_timers,
        };
        session.ensure_timers();
        session
    }
}

/// Look up a template and start a session from it
pub fn start_session(
    templates: &impl TemplateStore,
    template_id: &str,
    user_id: &str,
    body_weight: Option<f64>,
    now: DateTime<Utc>,
) -> Result<ExecutionSession> {
    let template = templates.get_template(template_id)?;
    ExecutionSession::start(&template, user_id, body_weight, now)
}

impl ExecutionSession {
    /// Seed a new session from a template
    ///
    /// Every template exercise gets `target_sets` empty set records whose
    /// target reps come from the template's recommended-reps string.
    pub fn start(
        template: &WorkoutTemplate,
        user_id: &str,
        body_weight: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if template.exercises.is_empty() {
            return Err(Error::EmptyTemplate(template.id.clone()));
        }

        let exercises: Vec<ExerciseProgress> = template
            .exercises
            .iter()
            .map(|te| {
                let target_reps = te
                    .target_reps_range
                    .as_deref()
                    .and_then(parse_recommended_reps);

                ExerciseProgress {
                    exercise_id: te.exercise_id.clone(),
                    name: te.name.clone(),
                    order: te.order,
                    rest_seconds: te.rest_seconds,
                    use_global_rest: te.use_global_rest,
                    sets: (1..=te.target_sets)
                        .map(|order| SetRecord {
                            order,
                            target_reps,
                            ..SetRecord::default()
                        })
                        .collect(),
                    notes: None,
                }
            })
            .collect();

        let session = Self {
            id: Uuid::new_v4(),
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            user_id: user_id.to_string(),
            started_at: now,
            body_weight,
            global_rest_seconds: template.global_rest_seconds,
            rest_timers: vec![RestTimer::new(); exercises.len()],
            exercises,
            status: ExecutionStatus::InProgress,
            cursor: 0,
        };

        tracing::info!(
            "Started session {} from template '{}' ({} exercises)",
            session.id,
            session.template_id,
            session.exercises.len()
        );

        Ok(session)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn body_weight(&self) -> Option<f64> {
        self.body_weight
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn exercises(&self) -> &[ExerciseProgress] {
        &self.exercises
    }

    /// Index of the exercise currently shown
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn exercise(&self, exercise_index: usize) -> Result<&ExerciseProgress> {
        self.exercises.get(exercise_index).ok_or(Error::IndexOutOfRange {
            exercise: exercise_index,
            set: None,
        })
    }

    pub fn rest_timer(&self, exercise_index: usize) -> Result<&RestTimer> {
        self.rest_timers.get(exercise_index).ok_or(Error::IndexOutOfRange {
            exercise: exercise_index,
            set: None,
        })
    }

    /// Total number of completed sets across all exercises
    pub fn completed_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.completed_sets()).sum()
    }

    /// Rest duration that applies to an exercise
    pub fn resolved_rest_seconds(&self, exercise_index: usize) -> Result<u32> {
        let exercise = self.exercise(exercise_index)?;
        Ok(if exercise.use_global_rest {
            self.global_rest_seconds
        } else {
            exercise.rest_seconds
        })
    }

    // ------------------------------------------------------------------------
    // Set operations
    // ------------------------------------------------------------------------

    /// Record actual values for a set without completing it
    ///
    /// Only the fields present in `input` are written. Returns `false` when
    /// nothing changed.
    pub fn record_set(
        &mut self,
        exercise_index: usize,
        set_index: usize,
        input: SetInput,
    ) -> Result<bool> {
        self.ensure_in_progress()?;
        let set = self.set_mut(exercise_index, set_index)?;

        let before = set.clone();
        if let Some(reps) = input.reps {
            set.actual_reps = Some(reps);
        }
        if let Some(weight) = input.weight {
            set.actual_weight = Some(weight);
        }
        if let Some(duration) = input.duration_seconds {
            set.actual_duration_seconds = Some(duration);
        }

        let changed = *set != before;
        if changed {
            tracing::debug!(
                "Recorded exercise {} set {}: {:?}",
                exercise_index,
                set_index,
                set
            );
        }
        Ok(changed)
    }

    /// Mark a set completed and restart that exercise's rest timer
    ///
    /// Completing an already-completed set is allowed and restarts the timer
    /// again. Reps are pre-filled from the target when none were recorded.
    /// Returns the rest duration the timer was started with. A zero rest
    /// completes immediately and leaves the timer stopped.
    pub fn complete_set(&mut self, exercise_index: usize, set_index: usize) -> Result<u32> {
        self.ensure_in_progress()?;
        let rest_seconds = self.resolved_rest_seconds(exercise_index)?;

        let set = self.set_mut(exercise_index, set_index)?;
        set.completed = true;
        if set.actual_reps.is_none() {
            set.actual_reps = set.target_reps;
        }

        if self.timer_mut(exercise_index)?.start(rest_seconds).is_some() {
            tracing::debug!("Exercise {} has no rest configured", exercise_index);
        }

        tracing::debug!(
            "Completed exercise {} set {}, resting {}s",
            exercise_index,
            set_index,
            rest_seconds
        );
        Ok(rest_seconds)
    }

    /// Clear a set's completed flag and stop that exercise's rest timer
    ///
    /// Recorded reps and weight are kept.
    pub fn uncomplete_set(&mut self, exercise_index: usize, set_index: usize) -> Result<()> {
        self.ensure_in_progress()?;
        let set = self.set_mut(exercise_index, set_index)?;
        set.completed = false;
        self.timer_mut(exercise_index)?.pause();

        tracing::debug!("Uncompleted exercise {} set {}", exercise_index, set_index);
        Ok(())
    }

    /// Flip a set's completed flag; returns the new state
    pub fn toggle_set(&mut self, exercise_index: usize, set_index: usize) -> Result<bool> {
        let completed = self.exercise(exercise_index)?
            .sets
            .get(set_index)
            .ok_or(Error::IndexOutOfRange {
                exercise: exercise_index,
                set: Some(set_index),
            })?
            .completed;

        if completed {
            self.uncomplete_set(exercise_index, set_index)?;
        } else {
            self.complete_set(exercise_index, set_index)?;
        }
        Ok(!completed)
    }

    /// Append an extra set beyond the template target
    ///
    /// Returns the index of the new set.
    pub fn add_set(&mut self, exercise_index: usize) -> Result<usize> {
        self.ensure_in_progress()?;
        let exercise = self
            .exercises
            .get_mut(exercise_index)
            .ok_or(Error::IndexOutOfRange {
                exercise: exercise_index,
                set: None,
            })?;

        let target_reps = exercise.sets.first().and_then(|s| s.target_reps);
        exercise.sets.push(SetRecord {
            order: exercise.sets.len() as u32 + 1,
            target_reps,
            ..SetRecord::default()
        });

        tracing::debug!(
            "Added set {} to exercise {}",
            exercise.sets.len(),
            exercise_index
        );
        Ok(exercise.sets.len() - 1)
    }

    pub fn set_exercise_notes(&mut self, exercise_index: usize, notes: Option<String>) -> Result<()> {
        self.ensure_in_progress()?;
        let exercise = self
            .exercises
            .get_mut(exercise_index)
            .ok_or(Error::IndexOutOfRange {
                exercise: exercise_index,
                set: None,
            })?;
        exercise.notes = notes.filter(|n| !n.trim().is_empty());
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------------

    /// Move to the next exercise
    pub fn advance(&mut self) -> Result<CursorMove> {
        self.ensure_in_progress()?;
        if self.cursor + 1 < self.exercises.len() {
            self.cursor += 1;
            Ok(CursorMove::Moved(self.cursor))
        } else {
            Ok(CursorMove::ReadyToFinalize)
        }
    }

    /// Move to the previous exercise, stopping at the first
    pub fn retreat(&mut self) -> Result<usize> {
        self.ensure_in_progress()?;
        self.cursor = self.cursor.saturating_sub(1);
        Ok(self.cursor)
    }

    // ------------------------------------------------------------------------
    // Rest timers
    // ------------------------------------------------------------------------

    /// Advance one exercise's rest timer by a second
    pub fn tick_rest(&mut self, exercise_index: usize) -> Result<Option<RestEvent>> {
        self.ensure_in_progress()?;
        Ok(self.timer_mut(exercise_index)?.tick())
    }

    /// Advance every rest timer by a second
    ///
    /// Returns the exercises whose rest finished on this tick.
    pub fn tick_all(&mut self) -> Result<Vec<(usize, RestEvent)>> {
        self.ensure_in_progress()?;
        Ok(self
            .rest_timers
            .iter_mut()
            .enumerate()
            .filter_map(|(idx, timer)| timer.tick().map(|event| (idx, event)))
            .collect())
    }

    pub fn pause_rest(&mut self, exercise_index: usize) -> Result<()> {
        self.ensure_in_progress()?;
        self.timer_mut(exercise_index)?.pause();
        Ok(())
    }

    pub fn resume_rest(&mut self, exercise_index: usize) -> Result<()> {
        self.ensure_in_progress()?;
        self.timer_mut(exercise_index)?.resume();
        Ok(())
    }

    /// Stop and refill a rest timer; `None` refills with the resolved rest
    /// duration if the timer was never started
    pub fn reset_rest(&mut self, exercise_index: usize, total_seconds: Option<u32>) -> Result<()> {
        self.ensure_in_progress()?;
        let fallback = self.resolved_rest_seconds(exercise_index)?;
        let timer = self.timer_mut(exercise_index)?;
        let total = total_seconds.or_else(|| (timer.total_seconds() == 0).then_some(fallback));
        timer.reset(total);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Leave the session without recording anything
    pub fn abandon(&mut self) -> Result<()> {
        self.ensure_in_progress()?;
        self.status = ExecutionStatus::Abandoned;
        for timer in &mut self.rest_timers {
            timer.pause();
        }
        tracing::info!("Abandoned session {}", self.id);
        Ok(())
    }

    pub(crate) fn set_status(&mut self, status: ExecutionStatus) {
        tracing::debug!("Session {}: {:?} -> {:?}", self.id, self.status, status);
        self.status = status;
    }

    /// Restore one timer per exercise and a valid cursor after deserializing
    fn ensure_timers(&mut self) {
        self.rest_timers.resize(self.exercises.len(), RestTimer::new());
        self.cursor = self.cursor.min(self.exercises.len().saturating_sub(1));
    }

    fn ensure_in_progress(&self) -> Result<()> {
        match self.status {
            ExecutionStatus::InProgress => Ok(()),
            other => Err(Error::SessionClosed(other)),
        }
    }

    fn set_mut(&mut self, exercise_index: usize, set_index: usize) -> Result<&mut SetRecord> {
        self.exercises
            .get_mut(exercise_index)
            .and_then(|e| e.sets.get_mut(set_index))
            .ok_or(Error::IndexOutOfRange {
                exercise: exercise_index,
                set: Some(set_index),
            })
    }

    fn timer_mut(&mut self, exercise_index: usize) -> Result<&mut RestTimer> {
        self.rest_timers
            .get_mut(exercise_index)
            .ok_or(Error::IndexOutOfRange {
                exercise: exercise_index,
                set: None,
            })
    }
}
