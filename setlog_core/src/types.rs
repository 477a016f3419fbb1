//! Core domain types for the setlog system.
//!
//! This module defines the data shared across the workspace:
//! - Workout templates and their exercises
//! - Live set records and per-exercise progress
//! - Frozen historical records produced by the finalizer
//! - Dashboard goals

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Template Types
// ============================================================================

/// One exercise slot in a workout template
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TemplateExercise {
    pub exercise_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub order: u32,
    #[serde(default = "default_target_sets")]
    pub target_sets: u32,
    /// Recommended reps as entered by the user, e.g. "8-12" or "10"
    #[serde(default)]
    pub target_reps_range: Option<String>,
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: u32,
    #[serde(default = "default_use_global_rest")]
    pub use_global_rest: bool,
}

/// A reusable, ordered plan of exercises
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_rest_seconds")]
    pub global_rest_seconds: u32,
    #[serde(default)]
    pub exercises: Vec<TemplateExercise>,
}

fn default_target_sets() -> u32 {
    3
}

fn default_rest_seconds() -> u32 {
    60
}

fn default_use_global_rest() -> bool {
    true
}

// ============================================================================
// Live Session Types
// ============================================================================

/// Lifecycle of an execution session
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    InProgress,
    Finalizing,
    Completed,
    Abandoned,
}

/// One planned or performed set inside a live session
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SetRecord {
    pub order: u32,
    pub target_reps: Option<u32>,
    pub actual_reps: Option<u32>,
    pub actual_weight: Option<f64>,
    pub actual_duration_seconds: Option<u32>,
    pub completed: bool,
}

/// Values entered by the user for a set; `None` fields are left untouched
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SetInput {
    pub reps: Option<u32>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<u32>,
}

/// Progress on a single exercise within a live session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseProgress {
    pub exercise_id: String,
    pub name: Option<String>,
    pub order: u32,
    pub rest_seconds: u32,
    pub use_global_rest: bool,
    pub sets: Vec<SetRecord>,
    pub notes: Option<String>,
}

impl ExerciseProgress {
    /// Number of sets marked completed
    pub fn completed_sets(&self) -> usize {
        self.sets.iter().filter(|s| s.completed).count()
    }
}

// ============================================================================
// Historical Record Types
// ============================================================================

/// A set as frozen into history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutedSet {
    pub order: u32,
    pub reps: Option<u32>,
    pub weight: Option<f64>,
    pub duration_seconds: Option<u32>,
    pub completed: bool,
}

/// An exercise as frozen into history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExecutedExercise {
    pub exercise_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub order: u32,
    #[serde(default)]
    pub notes: Option<String>,
    pub sets: Vec<ExecutedSet>,
}

/// Immutable record of a finished workout
///
/// Produced only by the finalizer. Once handed to an `ExecutionStore` it is
/// never edited, only deleted as a whole.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CompletedExecution {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub body_weight: Option<f64>,
    #[serde(default)]
    pub general_notes: Option<String>,
    pub exercises: Vec<ExecutedExercise>,
}

impl CompletedExecution {
    /// Total number of sets recorded, completed or not
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    /// Number of sets marked completed
    pub fn completed_sets(&self) -> usize {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .filter(|s| s.completed)
            .count()
    }
}

// ============================================================================
// Goal Types
// ============================================================================

/// Which aggregate a goal is measured against
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    Count,
    TotalMinutes,
    ActiveDayCount,
}

/// A dashboard target, e.g. "12 workouts this month"
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub metric: GoalMetric,
    pub target: f64,
}
