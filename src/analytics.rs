//! Derived productivity and financial metrics
//!
//! Everything here is a pure function of the collections passed in. Calendar
//! boundaries (days, ISO weeks, months) are taken in the local time zone of
//! the `now` argument. Every ratio yields 0 when its denominator is zero or
//! negative; display code relies on never seeing NaN or infinity.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Priority, Project, Task, User};
use crate::store::DataStore;

/// Days covered by [`ProjectAnalytics::completion_trend`]
pub const TREND_DAYS: i64 = 7;
/// How far back [`user_productivity`] looks for a streak
pub const STREAK_LOOKBACK_DAYS: i64 = 30;
/// Months covered by [`FinancialSummary::monthly_spending`]
pub const SPENDING_MONTHS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionTrendPoint {
    pub date: NaiveDate,
    pub completed_tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySpending {
    /// Full month name, e.g. "September"
    pub month: String,
    /// First day of the month
    pub start: NaiveDate,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectAnalytics {
    pub project_id: Uuid,
    pub project_name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// 0.0 ..= 1.0
    pub progress: f64,
    /// Sum of task budgets; the project's own budget is not included
    pub total_budget: f64,
    pub actual_cost: f64,
    pub profit_margin: f64,
    pub budget_utilization: f64,
    /// Always holds all four priorities
    pub tasks_by_priority: BTreeMap<Priority, usize>,
    /// Oldest day first, ending today
    pub completion_trend: Vec<CompletionTrendPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserProductivity {
    pub total_tasks_completed: usize,
    pub tasks_this_week: usize,
    pub tasks_this_month: usize,
    pub average_tasks_per_day: f64,
    pub coins_earned: u64,
    pub productivity_score: f64,
    pub streak_days: u32,
    /// Percentage of assigned tasks that are completed
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinancialSummary {
    pub total_budget: f64,
    pub total_actual_cost: f64,
    pub total_profit: f64,
    pub profit_margin: f64,
    pub over_budget_items: usize,
    pub average_cost_per_task: f64,
    pub budget_utilization: f64,
    /// Oldest month first, ending with the current month
    pub monthly_spending: Vec<MonthlySpending>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberProductivity {
    pub user_id: Uuid,
    pub name: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
    pub average_task_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProductivity {
    pub project_id: Uuid,
    pub project_name: String,
    /// Owner plus members
    pub total_members: usize,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    /// Percentage, 0 ..= 100
    pub overall_progress: f64,
    pub members: Vec<MemberProductivity>,
}

/// `numerator / denominator`, or 0 when the denominator is not positive
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn percent(numerator: f64, denominator: f64) -> f64 {
    ratio(numerator, denominator) * 100.0
}

/// Sum that starts from positive zero, so an empty input serializes as `0.0`
fn total(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(0.0, |acc, x| acc + x)
}

fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

fn completion_days<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<NaiveDate> {
    tasks
        .into_iter()
        .filter(|t| t.completed)
        .filter_map(|t| t.completed_at)
        .map(local_day)
        .collect()
}

/// First day of the month `back` months before the month containing `today`
fn month_start(today: NaiveDate, back: u32) -> NaiveDate {
    let index = today.year() * 12 + today.month0() as i32 - back as i32;
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(today)
}

pub fn project_analytics<'a>(
    project: &Project,
    tasks: impl IntoIterator<Item = &'a Task>,
) -> ProjectAnalytics {
    project_analytics_at(project, tasks, Local::now())
}

/// Metrics for one project from its own tasks
pub fn project_analytics_at<'a>(
    project: &Project,
    tasks: impl IntoIterator<Item = &'a Task>,
    now: DateTime<Local>,
) -> ProjectAnalytics {
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.completed).count();

    let total_budget = total(tasks.iter().filter_map(|t| t.budget));
    let actual_cost = total(tasks.iter().map(|t| t.actual_cost));

    let mut tasks_by_priority: BTreeMap<Priority, usize> =
        Priority::ALL.iter().map(|p| (*p, 0)).collect();
    for task in &tasks {
        *tasks_by_priority.entry(task.priority).or_default() += 1;
    }

    let days = completion_days(tasks.iter().copied());
    let today = now.date_naive();
    let completion_trend = (0..TREND_DAYS)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            CompletionTrendPoint {
                date,
                completed_tasks: days.iter().filter(|d| **d == date).count(),
            }
        })
        .collect();

    ProjectAnalytics {
        project_id: project.id,
        project_name: project.name.clone(),
        total_tasks,
        completed_tasks,
        progress: ratio(completed_tasks as f64, total_tasks as f64),
        total_budget,
        actual_cost,
        profit_margin: percent(total_budget - actual_cost, total_budget),
        budget_utilization: percent(actual_cost, total_budget),
        tasks_by_priority,
        completion_trend,
    }
}

pub fn all_project_analytics(projects: &[Project], tasks: &[Task]) -> Vec<ProjectAnalytics> {
    all_project_analytics_at(projects, tasks, Local::now())
}

/// One record per project, each fed with the tasks that reference it
pub fn all_project_analytics_at(
    projects: &[Project],
    tasks: &[Task],
    now: DateTime<Local>,
) -> Vec<ProjectAnalytics> {
    let mut by_project: HashMap<Uuid, Vec<&Task>> = HashMap::new();
    for task in tasks {
        if let Some(project_id) = task.project_id {
            by_project.entry(project_id).or_default().push(task);
        }
    }

    projects
        .iter()
        .map(|project| {
            let own = by_project.get(&project.id).map(Vec::as_slice).unwrap_or(&[]);
            project_analytics_at(project, own.iter().copied(), now)
        })
        .collect()
}

pub fn user_productivity<'a>(
    user: &User,
    assigned_tasks: impl IntoIterator<Item = &'a Task>,
) -> UserProductivity {
    user_productivity_at(user, assigned_tasks, Local::now())
}

/// Productivity of `user` over the tasks assigned to them
pub fn user_productivity_at<'a>(
    user: &User,
    assigned_tasks: impl IntoIterator<Item = &'a Task>,
    now: DateTime<Local>,
) -> UserProductivity {
    let assigned: Vec<&Task> = assigned_tasks.into_iter().collect();
    let completed = assigned.iter().filter(|t| t.completed).count();
    let today = now.date_naive();

    let mut stamps: Vec<DateTime<Utc>> = assigned
        .iter()
        .filter(|t| t.completed)
        .filter_map(|t| t.completed_at)
        .collect();
    stamps.sort_unstable();
    let days: Vec<NaiveDate> = stamps.iter().copied().map(local_day).collect();

    let this_week = today.iso_week();
    let tasks_this_week = days.iter().filter(|d| d.iso_week() == this_week).count();
    let tasks_this_month = days
        .iter()
        .filter(|d| d.year() == today.year() && d.month() == today.month())
        .count();

    let average_tasks_per_day = match (stamps.first(), stamps.last()) {
        (Some(first), Some(last)) => {
            let span = (*last - *first).num_days().max(1);
            completed as f64 / span as f64
        }
        _ => 0.0,
    };

    UserProductivity {
        total_tasks_completed: completed,
        tasks_this_week,
        tasks_this_month,
        average_tasks_per_day,
        coins_earned: user.coins_earned,
        productivity_score: user.productivity_score(),
        streak_days: streak_days(&days, today),
        completion_rate: percent(completed as f64, assigned.len() as f64),
    }
}

/// Consecutive days with a completion, counting back from `today`.
///
/// A day without completions ends the streak; no completion today means 0.
pub fn streak_days(completion_days: &[NaiveDate], today: NaiveDate) -> u32 {
    let mut streak = 0;
    for back in 0..STREAK_LOOKBACK_DAYS {
        let day = today - Duration::days(back);
        if !completion_days.contains(&day) {
            break;
        }
        streak += 1;
    }
    streak
}

pub fn financial_summary(tasks: &[Task], projects: &[Project]) -> FinancialSummary {
    financial_summary_at(tasks, projects, Local::now())
}

/// Totals over every task and project; project budgets and costs count too
pub fn financial_summary_at(
    tasks: &[Task],
    projects: &[Project],
    now: DateTime<Local>,
) -> FinancialSummary {
    let total_budget = total(
        tasks
            .iter()
            .filter_map(|t| t.budget)
            .chain(projects.iter().filter_map(|p| p.budget)),
    );
    let total_actual_cost = total(
        tasks
            .iter()
            .map(|t| t.actual_cost)
            .chain(projects.iter().map(|p| p.actual_cost)),
    );
    let total_profit = total_budget - total_actual_cost;

    let over_budget_items = projects.iter().filter(|p| p.is_over_budget()).count()
        + tasks.iter().filter(|t| t.is_over_budget()).count();

    // Projects count as cost-only items dated today
    let today = now.date_naive();
    let spend_items: Vec<(NaiveDate, f64)> = tasks
        .iter()
        .map(|t| (local_day(t.created_at), t.actual_cost))
        .chain(projects.iter().map(|p| (today, p.actual_cost)))
        .collect();

    let monthly_spending = (0..SPENDING_MONTHS)
        .rev()
        .map(|back| {
            let start = month_start(today, back);
            let amount = total(
                spend_items
                    .iter()
                    .filter(|(day, _)| day.year() == start.year() && day.month() == start.month())
                    .map(|(_, cost)| *cost),
            );
            MonthlySpending {
                month: start.format("%B").to_string(),
                start,
                amount,
            }
        })
        .collect();

    FinancialSummary {
        total_budget,
        total_actual_cost,
        total_profit,
        profit_margin: percent(total_profit, total_budget),
        over_budget_items,
        average_cost_per_task: ratio(total_actual_cost, tasks.len() as f64),
        budget_utilization: percent(total_actual_cost, total_budget),
        monthly_spending,
    }
}

/// Per-member breakdown for a project. `tasks` are the project's tasks;
/// member ids with no matching user are skipped.
pub fn team_productivity<'a>(
    project: &Project,
    tasks: impl IntoIterator<Item = &'a Task>,
    users: &[User],
) -> TeamProductivity {
    let tasks: Vec<&Task> = tasks.into_iter().collect();
    let completed_tasks = tasks.iter().filter(|t| t.completed).count();

    let member_ids: Vec<Uuid> = std::iter::once(project.owner_id)
        .chain(project.member_ids.iter().copied().filter(|id| *id != project.owner_id))
        .collect();

    let members = member_ids
        .iter()
        .filter_map(|id| users.iter().find(|u| u.id == *id))
        .map(|user| {
            let own: Vec<&&Task> = tasks
                .iter()
                .filter(|t| t.assigned_user_id == Some(user.id))
                .collect();
            let done = own.iter().filter(|t| t.completed).count();
            let cost = total(own.iter().map(|t| t.actual_cost));
            MemberProductivity {
                user_id: user.id,
                name: user.display_name().to_string(),
                total_tasks: own.len(),
                completed_tasks: done,
                completion_rate: percent(done as f64, own.len() as f64),
                average_task_cost: ratio(cost, own.len() as f64),
            }
        })
        .collect();

    TeamProductivity {
        project_id: project.id,
        project_name: project.name.clone(),
        total_members: member_ids.len(),
        total_tasks: tasks.len(),
        completed_tasks,
        overall_progress: percent(completed_tasks as f64, tasks.len() as f64),
        members,
    }
}

/// All derived metrics for the store's current state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub projects: Vec<ProjectAnalytics>,
    pub user: UserProductivity,
    pub financial: FinancialSummary,
}

impl AnalyticsSnapshot {
    /// Recompute from scratch; callers pull a fresh snapshot after mutating
    pub fn compute(store: &DataStore, now: DateTime<Local>) -> Self {
        let current = store.current_user();
        Self {
            projects: all_project_analytics_at(store.projects(), store.tasks(), now),
            user: user_productivity_at(current, store.tasks_for_user(current.id), now),
            financial: financial_summary_at(store.tasks(), store.projects(), now),
        }
    }
}
