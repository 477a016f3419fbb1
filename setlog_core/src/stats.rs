//! Dashboard aggregation over completed executions.
//!
//! Every function here is pure: the caller supplies the records, the current
//! instant and the timezone used to truncate timestamps to calendar days.
//! Nothing reads the wall clock.

use crate::{CompletedExecution, Error, Goal, GoalMetric, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Largest dashboard window accepted from users and config
pub const MAX_PERIOD_DAYS: i64 = 36_500;

/// Label used for executions with no template linkage
pub const UNNAMED_TEMPLATE: &str = "Unnamed";

/// Standard dashboard windows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn days(self) -> i64 {
        match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter => 90,
            Period::Year => 365,
        }
    }

    pub fn from_days(days: i64) -> Option<Self> {
        match days {
            7 => Some(Period::Week),
            30 => Some(Period::Month),
            90 => Some(Period::Quarter),
            365 => Some(Period::Year),
            _ => None,
        }
    }
}

/// Headline numbers for a window
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Totals {
    pub count: usize,
    pub total_minutes: u64,
    pub active_day_count: usize,
    /// All recorded sets, completed or not
    pub total_sets: usize,
    pub sets_per_workout: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TemplateCount {
    pub template_name: String,
    pub count: usize,
}

/// How far along a goal is
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GoalProgress {
    /// Metric value capped at the target
    pub progress: f64,
    /// Uncapped; above 100 means the goal was exceeded
    pub percent: f64,
}

/// Everything the dashboard shows for one window
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Dashboard {
    pub period_days: i64,
    pub totals: Totals,
    pub by_day: Vec<DayCount>,
    pub by_template: Vec<TemplateCount>,
    pub streak_days: u32,
    pub total_volume: f64,
    pub goals: Vec<(Goal, GoalProgress)>,
}

fn local_date<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    ts.with_timezone(tz).date_naive()
}

/// Keep records that started within the last `days` days, up to and
/// including `now`'s lower bound
///
/// A window reaching past the representable date range keeps everything.
pub fn filter_by_period<Tz: TimeZone>(
    executions: &[CompletedExecution],
    days: i64,
    now: &DateTime<Tz>,
) -> Vec<CompletedExecution> {
    let cutoff = Duration::try_days(days)
        .and_then(|window| now.with_timezone(&Utc).checked_sub_signed(window));
    if cutoff.is_none() {
        tracing::debug!("Window of {} days has no lower bound", days);
    }

    executions
        .iter()
        .filter(|e| cutoff.map_or(true, |cutoff| e.started_at >= cutoff))
        .cloned()
        .collect()
}

/// Count, minutes, active days and sets
///
/// Records without a duration contribute zero minutes.
pub fn compute_totals<Tz: TimeZone>(executions: &[CompletedExecution], tz: &Tz) -> Totals {
    let count = executions.len();
    let total_minutes = executions
        .iter()
        .map(|e| u64::from(e.duration_minutes.unwrap_or(0)))
        .sum();
    let active_day_count = executions
        .iter()
        .map(|e| local_date(&e.started_at, tz))
        .collect::<BTreeSet<_>>()
        .len();
    let total_sets: usize = executions.iter().map(|e| e.total_sets()).sum();
    let sets_per_workout = if count == 0 {
        0.0
    } else {
        total_sets as f64 / count as f64
    };

    Totals {
        count,
        total_minutes,
        active_day_count,
        total_sets,
        sets_per_workout,
    }
}

/// Executions per calendar day, oldest first
///
/// Days without executions are not included.
pub fn group_by_day<Tz: TimeZone>(executions: &[CompletedExecution], tz: &Tz) -> Vec<DayCount> {
    let mut days: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for execution in executions {
        *days.entry(local_date(&execution.started_at, tz)).or_insert(0) += 1;
    }
    days.into_iter()
        .map(|(date, count)| DayCount { date, count })
        .collect()
}

/// Executions per template name, most frequent first
pub fn group_by_template(executions: &[CompletedExecution]) -> Vec<TemplateCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for execution in executions {
        let name = execution
            .template_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(UNNAMED_TEMPLATE);
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut grouped: Vec<TemplateCount> = counts
        .into_iter()
        .map(|(name, count)| TemplateCount {
            template_name: name.to_string(),
            count,
        })
        .collect();
    grouped.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.template_name.cmp(&b.template_name))
    });
    grouped
}

/// Consecutive active days ending today
///
/// Returns zero unless `now`'s calendar day has at least one execution.
pub fn compute_streak_days<Tz: TimeZone>(
    executions: &[CompletedExecution],
    now: &DateTime<Tz>,
) -> u32 {
    let tz = now.timezone();
    let active: BTreeSet<NaiveDate> = executions
        .iter()
        .map(|e| local_date(&e.started_at, &tz))
        .collect();

    let mut day = now.date_naive();
    let mut streak = 0;
    while active.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

/// Sum of reps × weight over completed sets
pub fn total_volume(executions: &[CompletedExecution]) -> f64 {
    executions
        .iter()
        .flat_map(|e| e.exercises.iter())
        .flat_map(|ex| ex.sets.iter())
        .filter(|s| s.completed)
        .filter_map(|s| Some(f64::from(s.reps?) * s.weight?))
        .sum()
}

/// Measure a goal against a set of executions
pub fn evaluate_goal<Tz: TimeZone>(
    executions: &[CompletedExecution],
    goal: &Goal,
    tz: &Tz,
) -> Result<GoalProgress> {
    if !goal.target.is_finite() || goal.target <= 0.0 {
        return Err(Error::InvalidGoal(format!(
            "target must be a positive number, got {}",
            goal.target
        )));
    }

    let totals = compute_totals(executions, tz);
    let raw = match goal.metric {
        GoalMetric::Count => totals.count as f64,
        GoalMetric::TotalMinutes => totals.total_minutes as f64,
        GoalMetric::ActiveDayCount => totals.active_day_count as f64,
    };

    Ok(GoalProgress {
        progress: raw.min(goal.target),
        percent: raw / goal.target * 100.0,
    })
}

/// Build the full dashboard for the last `days` days
///
/// The streak looks at the whole input, not just the window.
pub fn dashboard<Tz: TimeZone>(
    executions: &[CompletedExecution],
    days: i64,
    now: &DateTime<Tz>,
    goals: &[Goal],
) -> Result<Dashboard> {
    let tz = now.timezone();
    let window = filter_by_period(executions, days, now);

    let goals = goals
        .iter()
        .map(|goal| Ok((goal.clone(), evaluate_goal(&window, goal, &tz)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Dashboard {
        period_days: days,
        totals: compute_totals(&window, &tz),
        by_day: group_by_day(&window, &tz),
        by_template: group_by_template(&window),
        streak_days: compute_streak_days(executions, now),
        total_volume: total_volume(&window),
        goals,
    })
}
