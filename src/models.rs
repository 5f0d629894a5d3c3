//! Domain records: tasks, projects, users and comments
//!
//! Records are plain serde structs. Derived values (over-budget checks,
//! margins, productivity score) are computed on read and never stored.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Priority level for tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(Error::invalid(format!("unknown priority '{other}'"))),
        }
    }
}

/// A comment left on a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskComment {
    pub id: Uuid,
    pub text: String,
    pub author_id: Uuid,
    /// Copy of the author's display name at the time of writing
    pub author_name: String,
    pub created_at: DateTime<Utc>,
}

/// A task/todo item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub actual_cost: f64,
    #[serde(default)]
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub assigned_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<TaskComment>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Task {
    pub fn new(title: impl Into<String>, description: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            completed: false,
            priority: Priority::default(),
            due_date: None,
            budget: None,
            actual_cost: 0.0,
            project_id: None,
            assigned_user_id: None,
            created_at: now,
            completed_at: None,
            comments: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// The only place the completion flag changes.
    ///
    /// Keeps `completed_at` set exactly when `completed` is true. An already
    /// completed task keeps its original timestamp.
    pub fn set_completed(&mut self, completed: bool, now: DateTime<Utc>) {
        self.completed = completed;
        self.completed_at = match (completed, self.completed_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now),
            (false, _) => None,
        };
    }

    pub fn is_over_budget(&self) -> bool {
        self.budget.is_some_and(|budget| self.actual_cost > budget)
    }

    pub fn budget_variance(&self) -> f64 {
        self.budget.map_or(0.0, |budget| self.actual_cost - budget)
    }

    pub fn profit_margin(&self) -> f64 {
        match self.budget {
            Some(budget) if budget > 0.0 => (budget - self.actual_cost) / budget * 100.0,
            _ => 0.0,
        }
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date.is_some_and(|due| due < now)
    }

    /// Rejects money amounts the rest of the crate assumes are non-negative.
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::invalid("task title cannot be empty"));
        }
        validate_amounts("task", self.budget, self.actual_cost)
    }
}

/// Project lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Planning,
    #[default]
    Active,
    OnHold,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on-hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '_'], "-").as_str() {
            "planning" => Ok(ProjectStatus::Planning),
            "active" => Ok(ProjectStatus::Active),
            "on-hold" => Ok(ProjectStatus::OnHold),
            "completed" => Ok(ProjectStatus::Completed),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            other => Err(Error::invalid(format!("unknown project status '{other}'"))),
        }
    }
}

pub const DEFAULT_PROJECT_COLOR: &str = "#FF3C00";

fn default_color() -> String {
    DEFAULT_PROJECT_COLOR.to_string()
}

/// A project grouping tasks, members and a budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: ProjectStatus,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub actual_cost: f64,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub owner_id: Uuid,
    /// Members besides the owner
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
    #[serde(default)]
    pub task_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_color")]
    pub color: String,
}

impl Project {
    pub fn new(name: impl Into<String>, description: impl Into<String>, owner_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            status: ProjectStatus::default(),
            budget: None,
            actual_cost: 0.0,
            start_date: now,
            end_date: None,
            owner_id,
            member_ids: Vec::new(),
            task_ids: Vec::new(),
            created_at: now,
            color: default_color(),
        }
    }

    pub fn is_over_budget(&self) -> bool {
        self.budget.is_some_and(|budget| self.actual_cost > budget)
    }

    pub fn budget_utilization(&self) -> f64 {
        match self.budget {
            Some(budget) if budget > 0.0 => self.actual_cost / budget * 100.0,
            _ => 0.0,
        }
    }

    pub fn profit_margin(&self) -> f64 {
        match self.budget {
            Some(budget) if budget > 0.0 => (budget - self.actual_cost) / budget * 100.0,
            _ => 0.0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProjectStatus::Completed
    }

    /// Owner counts as a member.
    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id || self.member_ids.contains(&user_id)
    }

    /// Fraction of this project's tasks that are completed (0.0 ..= 1.0).
    pub fn progress(&self, tasks: &[Task]) -> f64 {
        let (total, done) = tasks
            .iter()
            .filter(|t| t.project_id == Some(self.id))
            .fold((0usize, 0usize), |(total, done), t| {
                (total + 1, done + usize::from(t.completed))
            });
        if total == 0 {
            0.0
        } else {
            done as f64 / total as f64
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("project name cannot be empty"));
        }
        validate_amounts("project", self.budget, self.actual_cost)
    }
}

fn validate_amounts(what: &str, budget: Option<f64>, actual_cost: f64) -> Result<(), Error> {
    if actual_cost.is_nan() || actual_cost < 0.0 {
        return Err(Error::invalid(format!(
            "{what} actual cost must be a non-negative number, got {actual_cost}"
        )));
    }
    if let Some(budget) = budget
        && (budget.is_nan() || budget < 0.0)
    {
        return Err(Error::invalid(format!(
            "{what} budget must be a non-negative number, got {budget}"
        )));
    }
    Ok(())
}

/// Capability granted to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreateProject,
    EditProject,
    DeleteProject,
    CreateTask,
    EditOwnTasks,
    EditAllTasks,
    AssignTasks,
    ViewAnalytics,
    ManageTeam,
    Comment,
    ViewProjects,
}

impl Permission {
    pub const ALL: [Permission; 11] = [
        Permission::CreateProject,
        Permission::EditProject,
        Permission::DeleteProject,
        Permission::CreateTask,
        Permission::EditOwnTasks,
        Permission::EditAllTasks,
        Permission::AssignTasks,
        Permission::ViewAnalytics,
        Permission::ManageTeam,
        Permission::Comment,
        Permission::ViewProjects,
    ];
}

/// User role within the workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    ProjectManager,
    #[default]
    Member,
    Viewer,
}

const PROJECT_MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::CreateProject,
    Permission::EditProject,
    Permission::AssignTasks,
    Permission::ViewAnalytics,
    Permission::ManageTeam,
];

const MEMBER_PERMISSIONS: &[Permission] = &[
    Permission::CreateTask,
    Permission::EditOwnTasks,
    Permission::Comment,
    Permission::ViewProjects,
];

const VIEWER_PERMISSIONS: &[Permission] = &[Permission::ViewProjects, Permission::Comment];

impl Role {
    /// Fixed capability table; roles do not inherit from each other.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => &Permission::ALL,
            Role::ProjectManager => PROJECT_MANAGER_PERMISSIONS,
            Role::Member => MEMBER_PERMISSIONS,
            Role::Viewer => VIEWER_PERMISSIONS,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::ProjectManager => "project-manager",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '_'], "-").as_str() {
            "admin" => Ok(Role::Admin),
            "project-manager" => Ok(Role::ProjectManager),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            other => Err(Error::invalid(format!("unknown role '{other}'"))),
        }
    }
}

/// Preferred layout for project lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectView {
    #[default]
    List,
    Grid,
    Kanban,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub enable_notifications: bool,
    pub enable_dark_mode: bool,
    pub default_project_view: ProjectView,
    pub auto_assign_tasks: bool,
    pub show_budget_warnings: bool,
    pub preferred_currency: String,
    /// Hour of day, 0-23
    pub working_hours_start: u8,
    /// Hour of day, 0-23
    pub working_hours_end: u8,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            enable_notifications: true,
            enable_dark_mode: false,
            default_project_view: ProjectView::List,
            auto_assign_tasks: false,
            show_budget_warnings: true,
            preferred_currency: "USD".to_string(),
            working_hours_start: 9,
            working_hours_end: 17,
        }
    }
}

impl UserPreferences {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, hour) in [
            ("working_hours_start", self.working_hours_start),
            ("working_hours_end", self.working_hours_end),
        ] {
            if hour > 23 {
                return Err(Error::invalid(format!("{name} must be 0-23, got {hour}")));
            }
        }
        if self.preferred_currency.trim().is_empty() {
            return Err(Error::invalid("preferred currency cannot be empty"));
        }
        Ok(())
    }
}

/// A workspace user and their reward counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub coins_earned: u64,
    #[serde(default)]
    pub tasks_completed: u64,
    #[serde(default)]
    pub projects_owned: u64,
    pub joined_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub preferences: UserPreferences,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            profile_image_url: None,
            role,
            coins_earned: 0,
            tasks_completed: 0,
            projects_owned: 0,
            joined_at: now,
            is_active: true,
            preferences: UserPreferences::default(),
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.email } else { &self.name }
    }

    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }

    /// Weighted composite kept compatible with existing clients:
    /// tasks x 10 + coins + projects x 50.
    pub fn productivity_score(&self) -> f64 {
        let points = self
            .tasks_completed
            .saturating_mul(10)
            .saturating_add(self.coins_earned);
        points as f64 + self.projects_owned as f64 * 50.0
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.permissions().contains(&permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn set_completed_keeps_timestamp_in_sync() {
        let t0 = now();
        let mut task = Task::new("Write report", "", t0);

        task.set_completed(true, t0);
        assert!(task.completed);
        assert_eq!(task.completed_at, Some(t0));

        // completing again keeps the first timestamp
        task.set_completed(true, t0 + Duration::hours(2));
        assert_eq!(task.completed_at, Some(t0));

        task.set_completed(false, t0 + Duration::hours(3));
        assert!(!task.completed);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn task_budget_helpers() {
        let mut task = Task::new("Logo", "", now());
        assert!(!task.is_over_budget());
        assert_eq!(task.profit_margin(), 0.0);
        assert_eq!(task.budget_variance(), 0.0);

        task.budget = Some(500.0);
        task.actual_cost = 600.0;
        assert!(task.is_over_budget());
        assert_eq!(task.budget_variance(), 100.0);
        assert_eq!(task.profit_margin(), -20.0);

        task.budget = Some(0.0);
        assert_eq!(task.profit_margin(), 0.0);
    }

    #[test]
    fn task_overdue_ignores_completed() {
        let t0 = now();
        let mut task = Task::new("Ship", "", t0);
        task.due_date = Some(t0 - Duration::days(1));
        assert!(task.is_overdue(t0));
        task.set_completed(true, t0);
        assert!(!task.is_overdue(t0));
    }

    #[test]
    fn validate_rejects_negative_amounts() {
        let mut task = Task::new("Audit", "", now());
        task.actual_cost = -1.0;
        assert!(matches!(task.validate(), Err(Error::InvalidArgument(_))));

        task.actual_cost = 0.0;
        task.budget = Some(-5.0);
        assert!(matches!(task.validate(), Err(Error::InvalidArgument(_))));

        task.budget = Some(f64::NAN);
        assert!(task.validate().is_err());

        task.budget = Some(5.0);
        assert!(task.validate().is_ok());
    }

    #[test]
    fn project_derived_values() {
        let owner = Uuid::new_v4();
        let mut project = Project::new("Launch", "", owner, now());
        assert_eq!(project.budget_utilization(), 0.0);
        assert_eq!(project.profit_margin(), 0.0);

        project.budget = Some(2000.0);
        project.actual_cost = 1800.0;
        assert_eq!(project.budget_utilization(), 90.0);
        assert!((project.profit_margin() - 10.0).abs() < 1e-9);
        assert!(!project.is_over_budget());
        assert!(project.is_member(owner));
        assert!(!project.is_member(Uuid::new_v4()));
    }

    #[test]
    fn project_progress_comes_from_tasks() {
        let t0 = now();
        let project = Project::new("Launch", "", Uuid::new_v4(), t0);
        assert_eq!(project.progress(&[]), 0.0);

        let mut done = Task::new("a", "", t0);
        done.project_id = Some(project.id);
        done.set_completed(true, t0);
        let mut open = Task::new("b", "", t0);
        open.project_id = Some(project.id);
        let unrelated = Task::new("c", "", t0);

        assert_eq!(project.progress(&[done, open, unrelated]), 0.5);
    }

    #[test]
    fn role_permission_table() {
        assert_eq!(Role::Admin.permissions().len(), Permission::ALL.len());
        assert!(Role::ProjectManager.permissions().contains(&Permission::AssignTasks));
        assert!(!Role::ProjectManager.permissions().contains(&Permission::CreateTask));
        assert!(Role::Member.permissions().contains(&Permission::EditOwnTasks));
        assert_eq!(
            Role::Viewer.permissions(),
            &[Permission::ViewProjects, Permission::Comment]
        );
    }

    #[test]
    fn parse_enums_from_strings() {
        assert_eq!("Urgent".parse::<Priority>().unwrap(), Priority::Urgent);
        assert!(matches!(
            "critical".parse::<Priority>(),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!("On Hold".parse::<ProjectStatus>().unwrap(), ProjectStatus::OnHold);
        assert_eq!("project_manager".parse::<Role>().unwrap(), Role::ProjectManager);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn user_score_and_names() {
        let mut user = User::new("John Doe", "john.doe@example.com", Role::Admin, now());
        user.coins_earned = 2150;
        user.tasks_completed = 67;
        user.projects_owned = 4;
        assert_eq!(user.productivity_score(), 670.0 + 2150.0 + 200.0);
        assert_eq!(user.initials(), "JD");
        assert_eq!(user.display_name(), "John Doe");

        user.name.clear();
        assert_eq!(user.display_name(), "john.doe@example.com");
    }

    #[test]
    fn preferences_validate_hours() {
        let mut prefs = UserPreferences::default();
        assert!(prefs.validate().is_ok());
        prefs.working_hours_end = 24;
        assert!(matches!(prefs.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn task_deserializes_with_defaults() {
        let json = r#"{
            "id": "6f1f8f5e-3c4b-4d0e-9d6c-1b2a3c4d5e6f",
            "title": "Minimal",
            "completed": false,
            "created_at": "2025-09-06T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.actual_cost, 0.0);
        assert!(task.tags.is_empty());
    }
}
