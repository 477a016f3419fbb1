//! Workout template store.
//!
//! Templates are owned outside the execution core; this module only reads
//! them. It provides the [`TemplateStore`] seam, an in-memory store, a set of
//! built-in templates, and a loader for user-defined TOML templates.

use crate::{Error, Result, TemplateExercise, WorkoutTemplate};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

/// Read-only access to workout templates
pub trait TemplateStore {
    fn get_template(&self, id: &str) -> Result<WorkoutTemplate>;
}

/// Parse a recommended-reps string into a single target
///
/// A range like "8-12" resolves to its midpoint rounded half-up (10), a
/// single value parses directly, and anything else yields `None`.
pub fn parse_recommended_reps(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.split_once(['-', '–']) {
        Some((lo, hi)) => {
            let lo: u32 = lo.trim().parse().ok()?;
            let hi: u32 = hi.trim().parse().ok()?;
            Some((lo + hi + 1) / 2)
        }
        None => trimmed.parse().ok(),
    }
}

impl WorkoutTemplate {
    /// Validate template structure
    ///
    /// Returns a list of problems; an empty list means the template is usable.
    /// An empty exercise list is not reported here since it is only an error
    /// at session start.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.id.trim().is_empty() {
            errors.push("Template has empty id".to_string());
        }
        if self.name.trim().is_empty() {
            errors.push(format!("Template '{}': empty name", self.id));
        }

        for (idx, exercise) in self.exercises.iter().enumerate() {
            let expected = idx as u32 + 1;
            if exercise.order != expected {
                errors.push(format!(
                    "Template '{}': exercise '{}' has order {}, expected {}",
                    self.id, exercise.exercise_id, exercise.order, expected
                ));
            }
            if exercise.target_sets == 0 {
                errors.push(format!(
                    "Template '{}': exercise '{}' has zero target sets",
                    self.id, exercise.exercise_id
                ));
            }
            if exercise.exercise_id.trim().is_empty() {
                errors.push(format!(
                    "Template '{}': exercise at position {} has empty id",
                    self.id, expected
                ));
            }
        }

        errors
    }

    /// Sort exercises by their declared order
    pub fn normalize(&mut self) {
        self.exercises.sort_by_key(|e| e.order);
    }
}

/// In-memory template store keyed by template id
#[derive(Clone, Debug, Default)]
pub struct MemoryTemplateStore {
    templates: HashMap<String, WorkoutTemplate>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the built-in templates
    pub fn with_defaults() -> Self {
        let mut store = Self::new();
        for template in default_templates() {
            store.insert(template.clone());
        }
        store
    }

    /// Insert or replace a template
    pub fn insert(&mut self, template: WorkoutTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    /// All templates, sorted by id
    pub fn list(&self) -> Vec<&WorkoutTemplate> {
        let mut templates: Vec<_> = self.templates.values().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    /// Load every `*.toml` template in `dir` into the store
    ///
    /// Files that fail to parse or validate are logged and skipped.
    /// Returns the number of templates loaded.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize> {
        if !dir.exists() {
            tracing::debug!("No template directory at {:?}", dir);
            return Ok(0);
        }

        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != "toml") {
                continue;
            }

            match load_template_file(&path) {
                Ok(template) => {
                    tracing::debug!("Loaded template '{}' from {:?}", template.id, path);
                    self.insert(template);
                    count += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping template file {:?}: {}", path, e);
                }
            }
        }

        tracing::info!("Loaded {} templates from {:?}", count, dir);
        Ok(count)
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn get_template(&self, id: &str) -> Result<WorkoutTemplate> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| Error::TemplateNotFound(id.to_string()))
    }
}

/// Parse, normalize and validate a single TOML template file
pub fn load_template_file(path: &Path) -> Result<WorkoutTemplate> {
    let contents = std::fs::read_to_string(path)?;
    let mut template: WorkoutTemplate = toml::from_str(&contents)?;
    template.normalize();

    let errors = template.validate();
    if !errors.is_empty() {
        return Err(Error::TemplateValidation(errors.join("; ")));
    }
    Ok(template)
}

static DEFAULT_TEMPLATES: Lazy<Vec<WorkoutTemplate>> = Lazy::new(build_default_templates);

/// Built-in templates, built once and shared
pub fn default_templates() -> &'static [WorkoutTemplate] {
    &DEFAULT_TEMPLATES
}

fn exercise(id: &str, name: &str, order: u32, sets: u32, reps: &str) -> TemplateExercise {
    TemplateExercise {
        exercise_id: id.into(),
        name: Some(name.into()),
        order,
        target_sets: sets,
        target_reps_range: Some(reps.into()),
        rest_seconds: 60,
        use_global_rest: true,
    }
}

fn build_default_templates() -> Vec<WorkoutTemplate> {
    let mut deadlift = exercise("deadlift", "Deadlift", 3, 3, "5");
    deadlift.use_global_rest = false;
    deadlift.rest_seconds = 180;

    vec![
        WorkoutTemplate {
            id: "full_body_a".into(),
            name: "Full Body A".into(),
            description: Some("Squat, press and row".into()),
            global_rest_seconds: 90,
            exercises: vec![
                exercise("back_squat", "Back Squat", 1, 3, "8-12"),
                exercise("bench_press", "Bench Press", 2, 3, "8-12"),
                exercise("barbell_row", "Barbell Row", 3, 3, "10"),
            ],
        },
        WorkoutTemplate {
            id: "full_body_b".into(),
            name: "Full Body B".into(),
            description: Some("Hinge, overhead press and pull".into()),
            global_rest_seconds: 90,
            exercises: vec![
                exercise("overhead_press", "Overhead Press", 1, 3, "6-10"),
                exercise("pullup", "Pull-up", 2, 3, "AMRAP"),
                deadlift,
            ],
        },
        WorkoutTemplate {
            id: "core_finisher".into(),
            name: "Core Finisher".into(),
            description: None,
            global_rest_seconds: 45,
            exercises: vec![
                exercise("plank", "Plank", 1, 3, ""),
                exercise("hanging_leg_raise", "Hanging Leg Raise", 2, 3, "10-15"),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_midpoint() {
        assert_eq!(parse_recommended_reps("8-12"), Some(10));
        assert_eq!(parse_recommended_reps("10-15"), Some(13));
        assert_eq!(parse_recommended_reps(" 6 - 10 "), Some(8));
        assert_eq!(parse_recommended_reps("8–12"), Some(10));
    }

    #[test]
    fn test_parse_single_value() {
        assert_eq!(parse_recommended_reps("10"), Some(10));
        assert_eq!(parse_recommended_reps(" 5 "), Some(5));
    }

    #[test]
    fn test_parse_unparsable_is_none() {
        assert_eq!(parse_recommended_reps(""), None);
        assert_eq!(parse_recommended_reps("AMRAP"), None);
        assert_eq!(parse_recommended_reps("8-"), None);
        assert_eq!(parse_recommended_reps("abc-12"), None);
    }

    #[test]
    fn test_default_templates_validate() {
        for template in default_templates() {
            let errors = template.validate();
            assert!(
                errors.is_empty(),
                "Template {} has validation errors: {:?}",
                template.id,
                errors
            );
            assert!(!template.exercises.is_empty());
        }
    }

    #[test]
    fn test_validate_catches_gaps_in_order() {
        let mut template = default_templates()[0].clone();
        template.exercises[1].order = 5;
        let errors = template.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expected 2"));
    }

    #[test]
    fn test_memory_store_lookup() {
        let store = MemoryTemplateStore::with_defaults();
        let template = store.get_template("full_body_a").unwrap();
        assert_eq!(template.exercises.len(), 3);

        assert!(matches!(
            store.get_template("missing"),
            Err(Error::TemplateNotFound(_))
        ));
    }

    #[test]
    fn test_load_dir_normalizes_and_skips_invalid() {
        let temp_dir = tempfile::tempdir().unwrap();

        let good = r#"
id = "legs"
name = "Leg Day"
global_rest_seconds = 120

[[exercises]]
exercise_id = "leg_press"
order = 2
target_reps_range = "10-12"

[[exercises]]
exercise_id = "squat"
order = 1
target_sets = 5
target_reps_range = "5"
use_global_rest = false
rest_seconds = 180
"#;
        std::fs::write(temp_dir.path().join("legs.toml"), good).unwrap();
        std::fs::write(temp_dir.path().join("broken.toml"), "id = ").unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let mut store = MemoryTemplateStore::new();
        let count = store.load_dir(temp_dir.path()).unwrap();
        assert_eq!(count, 1);

        let legs = store.get_template("legs").unwrap();
        assert_eq!(legs.exercises[0].exercise_id, "squat");
        assert_eq!(legs.exercises[0].target_sets, 5);
        assert_eq!(legs.exercises[1].target_sets, 3); // default
        assert!(legs.exercises[1].use_global_rest); // default
    }

    #[test]
    fn test_load_dir_missing_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut store = MemoryTemplateStore::new();
        let count = store.load_dir(&temp_dir.path().join("nope")).unwrap();
        assert_eq!(count, 0);
    }
}
