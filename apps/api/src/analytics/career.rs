//! Career Progression Model: forward-only stage machine over monthly indicator scores.
//!
//! Algorithm:
//! 1. Merge all activity records into one chronological event stream
//! 2. Sweep calendar months. Activity (commits, PRs, reviews) counts only
//!    within its own month; standing (skills, roles, milestones) accumulates
//! 3. Map both to four indicators in [0, 100] and a weighted composite
//! 4. Promote when a higher stage's gate holds for `SUSTAIN_PERIODS` consecutive months
//! 5. Project the next stage from the recent indicator slope

use std::collections::HashMap;

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analytics::forecast::{LinearTrend, MAX_PROJECTION_MONTHS};
use crate::models::activity::{
    CommitRecord, PullRequestRecord, RepositoryRole, SkillTimelineEntry,
};

/// Consecutive qualifying months required before a promotion fires.
pub const SUSTAIN_PERIODS: usize = 3;
/// Trailing months used to estimate indicator growth.
pub const GROWTH_WINDOW: usize = 6;
/// Oldest month considered, counted back from the latest activity.
const MAX_PERIODS: i32 = 600;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Junior,
    Mid,
    Senior,
    Lead,
    Principal,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Junior,
        Stage::Mid,
        Stage::Senior,
        Stage::Lead,
        Stage::Principal,
    ];

    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.rank() + 1).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Junior => "junior",
            Stage::Mid => "mid",
            Stage::Senior => "senior",
            Stage::Lead => "lead",
            Stage::Principal => "principal",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneKind {
    Skill,
    Achievement,
    Contribution,
    Recognition,
    Leadership,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneImpact {
    Low,
    Medium,
    High,
    Critical,
}

impl MilestoneImpact {
    pub fn points(self) -> f64 {
        match self {
            MilestoneImpact::Low => 1.0,
            MilestoneImpact::Medium => 2.0,
            MilestoneImpact::High => 4.0,
            MilestoneImpact::Critical => 8.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CareerMilestone {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: MilestoneKind,
    pub title: String,
    pub date: DateTime<Utc>,
    pub impact: MilestoneImpact,
}

impl CareerMilestone {
    pub fn new(
        kind: MilestoneKind,
        title: impl Into<String>,
        date: DateTime<Utc>,
        impact: MilestoneImpact,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            date,
            impact,
        }
    }
}

/// Indicator scores, each 0 – 100.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Indicators {
    pub technical_skills: f64,
    pub leadership: f64,
    pub impact: f64,
    pub communication: f64,
}

impl Indicators {
    /// 0.35·technical + 0.25·leadership + 0.25·impact + 0.15·communication
    pub fn composite(&self) -> f64 {
        (0.35 * self.technical_skills
            + 0.25 * self.leadership
            + 0.25 * self.impact
            + 0.15 * self.communication)
            .clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerStage {
    pub stage: Stage,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub indicators: Indicators,
}

/// Indicator snapshot at the end of one calendar month.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodSnapshot {
    pub period_start: DateTime<Utc>,
    pub indicators: Indicators,
    pub composite: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectedStage {
    pub stage: Stage,
    pub estimated_date: Option<DateTime<Utc>>,
    pub requirements: Vec<String>,
    pub progress: f64, // 0.0 – 1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareerTrajectory {
    pub stages: Vec<CareerStage>,
    pub projected_next_stage: Option<ProjectedStage>,
    pub milestones: Vec<CareerMilestone>,
    pub periods: Vec<PeriodSnapshot>,
    /// Composite points per month over the trailing growth window.
    pub growth_rate: f64,
}

impl CareerTrajectory {
    /// The last stage without an end date.
    pub fn current_stage(&self) -> Option<&CareerStage> {
        self.stages.iter().rev().find(|s| s.end_date.is_none())
    }
}

/// Raw activity feeding `analyze_progression`. Every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressionData {
    #[serde(default)]
    pub commits: Vec<CommitRecord>,
    #[serde(default)]
    pub pull_requests: Vec<PullRequestRecord>,
    #[serde(default)]
    pub repository_roles: Vec<RepositoryRole>,
    #[serde(default)]
    pub skills: Vec<SkillTimelineEntry>,
    #[serde(default)]
    pub milestones: Vec<CareerMilestone>,
}

// ────────────────────────────────────────────────────────────────────────────
// Stage gates
// ────────────────────────────────────────────────────────────────────────────

/// Minimum scores required to enter a stage.
#[derive(Debug, Clone, Copy)]
pub struct StageGate {
    pub composite: f64,
    pub min_leadership: Option<f64>,
    pub min_impact: Option<f64>,
}

pub fn stage_gate(stage: Stage) -> StageGate {
    let (composite, min_leadership, min_impact) = match stage {
        Stage::Junior => (0.0, None, None),
        Stage::Mid => (30.0, None, None),
        Stage::Senior => (50.0, None, None),
        Stage::Lead => (65.0, Some(50.0), None),
        Stage::Principal => (80.0, Some(65.0), Some(70.0)),
    };
    StageGate {
        composite,
        min_leadership,
        min_impact,
    }
}

/// (label, current, required) for every dimension the gate checks.
fn gate_dimensions(gate: &StageGate, indicators: &Indicators) -> Vec<(&'static str, f64, f64)> {
    let mut dims = vec![("composite", indicators.composite(), gate.composite)];
    if let Some(min) = gate.min_leadership {
        dims.push(("leadership", indicators.leadership, min));
    }
    if let Some(min) = gate.min_impact {
        dims.push(("impact", indicators.impact, min));
    }
    dims
}

fn qualifies(stage: Stage, indicators: &Indicators) -> bool {
    gate_dimensions(&stage_gate(stage), indicators)
        .iter()
        .all(|(_, current, required)| current >= required)
}

// ────────────────────────────────────────────────────────────────────────────
// Activity accumulation
// ────────────────────────────────────────────────────────────────────────────

enum Event<'a> {
    Commit,
    PullRequest { merged: bool, reviews: u32 },
    Role { repository: &'a str, weight: f64 },
    Skill { name: String, proficiency: f64 },
    Milestone { kind: MilestoneKind, points: f64 },
}

#[derive(Default)]
struct ActivityTotals {
    // activity within the current month
    commits: f64,
    pull_requests: f64,
    merged_pull_requests: f64,
    reviews_received: f64,
    // standing, never reset
    /// repository → strongest role weight held
    roles: HashMap<String, f64>,
    /// lowercased skill → best proficiency
    skills: HashMap<String, f64>,
    skill_points: f64,
    leadership_points: f64,
    impact_points: f64,
}

/// Maps an unbounded count onto [0, 100); `half` is the count scoring 50.
fn saturate(x: f64, half: f64) -> f64 {
    if x <= 0.0 || !x.is_finite() {
        0.0
    } else {
        100.0 * x / (x + half)
    }
}

impl ActivityTotals {
    /// Drops last month's activity; standing carries over.
    fn start_period(&mut self) {
        self.commits = 0.0;
        self.pull_requests = 0.0;
        self.merged_pull_requests = 0.0;
        self.reviews_received = 0.0;
    }

    fn apply(&mut self, event: &Event<'_>) {
        match event {
            Event::Commit => self.commits += 1.0,
            Event::PullRequest { merged, reviews } => {
                self.pull_requests += 1.0;
                if *merged {
                    self.merged_pull_requests += 1.0;
                }
                self.reviews_received += f64::from(*reviews);
            }
            Event::Role { repository, weight } => {
                let held = self.roles.entry(repository.to_string()).or_insert(0.0);
                *held = held.max(*weight);
            }
            Event::Skill { name, proficiency } => {
                let best = self.skills.entry(name.clone()).or_insert(0.0);
                *best = best.max(*proficiency);
            }
            Event::Milestone { kind, points } => match kind {
                MilestoneKind::Skill => self.skill_points += points,
                MilestoneKind::Leadership => self.leadership_points += points,
                MilestoneKind::Achievement
                | MilestoneKind::Contribution
                | MilestoneKind::Recognition => self.impact_points += points,
            },
        }
    }

    fn indicators(&self) -> Indicators {
        let distinct_skills = self.skills.len() as f64;
        let avg_proficiency = if self.skills.is_empty() {
            0.0
        } else {
            self.skills.values().sum::<f64>() / distinct_skills
        };
        let role_points: f64 = self.roles.values().sum();

        Indicators {
            technical_skills: (0.45 * saturate(distinct_skills + 0.5 * self.skill_points, 8.0)
                + 0.20 * avg_proficiency
                + 0.35 * saturate(self.commits, 40.0))
            .clamp(0.0, 100.0),
            leadership: (0.7 * saturate(role_points, 3.0)
                + 0.3 * saturate(self.leadership_points, 6.0))
            .clamp(0.0, 100.0),
            impact: (0.5 * saturate(self.merged_pull_requests, 6.0)
                + 0.5 * saturate(self.impact_points, 10.0))
            .clamp(0.0, 100.0),
            communication: (0.6 * saturate(self.reviews_received, 15.0)
                + 0.4 * saturate(self.pull_requests, 8.0))
            .clamp(0.0, 100.0),
        }
    }
}

fn collect_events(data: &ProgressionData) -> Vec<(DateTime<Utc>, Event<'_>)> {
    let mut events: Vec<(DateTime<Utc>, Event<'_>)> = Vec::new();
    events.extend(data.commits.iter().map(|c| (c.date, Event::Commit)));
    events.extend(data.pull_requests.iter().map(|pr| {
        (
            pr.date,
            Event::PullRequest {
                merged: pr.merged,
                reviews: pr.review_count,
            },
        )
    }));
    events.extend(data.repository_roles.iter().map(|r| {
        (
            r.since,
            Event::Role {
                repository: r.repository.as_str(),
                weight: r.role.weight(),
            },
        )
    }));
    events.extend(data.skills.iter().map(|s| {
        let proficiency = if s.proficiency.is_finite() {
            s.proficiency.clamp(0.0, 100.0)
        } else {
            0.0
        };
        (
            s.acquired_at,
            Event::Skill {
                name: s.skill.trim().to_lowercase(),
                proficiency,
            },
        )
    }));
    events.extend(data.milestones.iter().map(|m| {
        (
            m.date,
            Event::Milestone {
                kind: m.kind,
                points: m.impact.points(),
            },
        )
    }));
    events.sort_by_key(|(date, _)| *date);
    events
}

// ────────────────────────────────────────────────────────────────────────────
// Month arithmetic
// ────────────────────────────────────────────────────────────────────────────

fn month_index(date: DateTime<Utc>) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn month_start(index: i32) -> Option<DateTime<Utc>> {
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

/// Builds one snapshot per calendar month spanned by the events.
fn build_periods(events: &[(DateTime<Utc>, Event<'_>)]) -> Vec<PeriodSnapshot> {
    let (Some((first, _)), Some((last, _))) = (events.first(), events.last()) else {
        return vec![];
    };
    let last_idx = month_index(*last);
    let first_idx = month_index(*first).max(last_idx - MAX_PERIODS + 1);

    let mut totals = ActivityTotals::default();
    let mut cursor = 0;
    let mut periods = Vec::new();

    for idx in first_idx..=last_idx {
        let (Some(period_start), Some(period_end)) = (month_start(idx), month_start(idx + 1))
        else {
            continue;
        };
        // only reached for activity older than MAX_PERIODS
        while cursor < events.len() && events[cursor].0 < period_start {
            totals.apply(&events[cursor].1);
            cursor += 1;
        }
        totals.start_period();
        while cursor < events.len() && events[cursor].0 < period_end {
            totals.apply(&events[cursor].1);
            cursor += 1;
        }
        let indicators = totals.indicators();
        periods.push(PeriodSnapshot {
            period_start,
            composite: indicators.composite(),
            indicators,
        });
    }
    periods
}

// ────────────────────────────────────────────────────────────────────────────
// Progression
// ────────────────────────────────────────────────────────────────────────────

pub fn analyze_progression(data: &ProgressionData) -> CareerTrajectory {
    analyze_progression_at(data, Utc::now())
}

/// `now` only dates the default junior stage when there is no activity at all.
pub fn analyze_progression_at(data: &ProgressionData, now: DateTime<Utc>) -> CareerTrajectory {
    let mut milestones = data.milestones.clone();
    milestones.sort_by_key(|m| m.date);

    let events = collect_events(data);
    let periods = build_periods(&events);

    let Some(first) = periods.first() else {
        return CareerTrajectory {
            stages: vec![CareerStage {
                stage: Stage::Junior,
                start_date: now,
                end_date: None,
                indicators: Indicators::default(),
            }],
            projected_next_stage: None,
            milestones,
            periods,
            growth_rate: 0.0,
        };
    };

    let mut stages = vec![CareerStage {
        stage: Stage::Junior,
        start_date: first.period_start,
        end_date: None,
        indicators: first.indicators,
    }];
    // index of the first period of the current qualifying streak, per stage
    let mut streak_start: [Option<usize>; 5] = [None; 5];

    for (i, snapshot) in periods.iter().enumerate() {
        let current = stages.last().map(|s| s.stage).unwrap_or(Stage::Junior);

        for stage in Stage::ALL.into_iter().filter(|s| *s > current) {
            let slot = &mut streak_start[stage.rank()];
            if !qualifies(stage, &snapshot.indicators) {
                *slot = None;
            } else if slot.is_none() {
                *slot = Some(i);
            }
        }

        let promotion = Stage::ALL
            .into_iter()
            .rev()
            .filter(|s| *s > current)
            .find_map(|s| {
                streak_start[s.rank()]
                    .filter(|start| i + 1 - start >= SUSTAIN_PERIODS)
                    .map(|start| (s, start))
            });

        let Some(open) = stages.last_mut() else {
            continue;
        };
        match promotion {
            // the streak began with the open stage itself: it never really held
            Some((stage, start)) if periods[start].period_start <= open.start_date => {
                open.stage = stage;
                open.indicators = snapshot.indicators;
            }
            Some((stage, start)) => {
                let start_date = periods[start].period_start;
                open.end_date = Some(start_date);
                stages.push(CareerStage {
                    stage,
                    start_date,
                    end_date: None,
                    indicators: snapshot.indicators,
                });
            }
            None => open.indicators = snapshot.indicators,
        }
    }

    let growth_rate = recent_slope(&periods, |p| p.composite);
    let projected_next_stage = stages
        .last()
        .and_then(|current| project_next_stage(current.stage, &periods));

    CareerTrajectory {
        stages,
        projected_next_stage,
        milestones,
        periods,
        growth_rate,
    }
}

fn recent_slope(periods: &[PeriodSnapshot], value: impl Fn(&PeriodSnapshot) -> f64) -> f64 {
    let window = &periods[periods.len().saturating_sub(GROWTH_WINDOW)..];
    let values: Vec<f64> = window.iter().map(value).collect();
    LinearTrend::fit(&values).map(|fit| fit.slope).unwrap_or(0.0)
}

/// Extrapolates each gate dimension along its recent slope. The estimate
/// includes the sustain window a promotion needs.
fn project_next_stage(current: Stage, periods: &[PeriodSnapshot]) -> Option<ProjectedStage> {
    let next = current.next()?;
    let latest = periods.last()?;
    let gate = stage_gate(next);

    let slope_of = |label: &str| match label {
        "leadership" => recent_slope(periods, |p| p.indicators.leadership),
        "impact" => recent_slope(periods, |p| p.indicators.impact),
        _ => recent_slope(periods, |p| p.composite),
    };

    let dims = gate_dimensions(&gate, &latest.indicators);
    let mut requirements = Vec::new();
    let mut progress_sum = 0.0;
    let mut months_needed: Option<f64> = Some(0.0);

    for (label, current_value, required) in &dims {
        progress_sum += if *required > 0.0 {
            (current_value / required).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if current_value >= required {
            continue;
        }
        requirements.push(format!("{label}: {current_value:.1} of {required:.1}"));

        let slope = slope_of(*label);
        let months = (slope > 0.0).then(|| (required - current_value) / slope);
        months_needed = match (months_needed, months) {
            (Some(acc), Some(m)) if m.is_finite() => Some(acc.max(m)),
            _ => None,
        };
    }

    let estimated_date = months_needed
        .map(|m| m.ceil() + (SUSTAIN_PERIODS - 1) as f64)
        .filter(|m| *m <= MAX_PROJECTION_MONTHS)
        .and_then(|m| month_start(month_index(latest.period_start) + m as i32));

    Some(ProjectedStage {
        stage: next,
        estimated_date,
        requirements,
        progress: progress_sum / dims.len() as f64,
    })
}
