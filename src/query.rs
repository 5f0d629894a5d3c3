//! Filtering and sorting of task, project and user lists
//!
//! Every function borrows its input and returns references into it, so the
//! source collection is never reordered or modified. Filters run first, then
//! the (stable) sort.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{Priority, Project, ProjectStatus, Task, User};

/// Ordering applied to a task list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskSortKey {
    /// Dated tasks first, earliest due first; undated tasks newest first
    DueDate,
    /// Urgent, high, medium, low
    Priority,
    /// Case-insensitive A-Z
    Title,
    /// Newest first
    Created,
    /// Largest budget first; no budget counts as 0
    Budget,
}

impl TaskSortKey {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskSortKey::DueDate => "due-date",
            TaskSortKey::Priority => "priority",
            TaskSortKey::Title => "title",
            TaskSortKey::Created => "created",
            TaskSortKey::Budget => "budget",
        }
    }
}

impl fmt::Display for TaskSortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskSortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '_'], "-").as_str() {
            "due-date" | "due" => Ok(TaskSortKey::DueDate),
            "priority" => Ok(TaskSortKey::Priority),
            "title" => Ok(TaskSortKey::Title),
            "created" => Ok(TaskSortKey::Created),
            "budget" => Ok(TaskSortKey::Budget),
            other => Err(Error::invalid(format!("unknown sort key '{other}'"))),
        }
    }
}

/// Filter and sort parameters for [`query_tasks`]
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCriteria {
    /// Case-insensitive substring of title, description or any tag
    pub search: String,
    pub priority: Option<Priority>,
    pub include_completed: bool,
    pub project_id: Option<Uuid>,
    /// `None` keeps the input order
    pub sort: Option<TaskSortKey>,
}

impl Default for TaskCriteria {
    fn default() -> Self {
        Self {
            search: String::new(),
            priority: None,
            include_completed: true,
            project_id: None,
            sort: None,
        }
    }
}

impl TaskCriteria {
    fn matches(&self, task: &Task, needle: &str) -> bool {
        if !self.include_completed && task.completed {
            return false;
        }
        if self.priority.is_some_and(|p| task.priority != p) {
            return false;
        }
        if self.project_id.is_some() && task.project_id != self.project_id {
            return false;
        }
        needle.is_empty()
            || contains_ci(&task.title, needle)
            || contains_ci(&task.description, needle)
            || task.tags.iter().any(|tag| contains_ci(tag, needle))
    }
}

/// Filter parameters for [`query_projects`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectCriteria {
    /// Case-insensitive substring of name or description
    pub search: String,
    pub status: Option<ProjectStatus>,
}

/// `needle` must already be lowercase
fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

pub fn query_tasks<'a>(tasks: &'a [Task], criteria: &TaskCriteria) -> Vec<&'a Task> {
    let needle = criteria.search.to_lowercase();
    let mut filtered: Vec<&Task> = tasks
        .iter()
        .filter(|t| criteria.matches(t, &needle))
        .collect();

    if let Some(key) = criteria.sort {
        // sort_by is stable, equal elements keep their filtered order
        filtered.sort_by(|a, b| compare_tasks(a, b, key));
    }

    filtered
}

/// Total order on tasks for one sort key
pub fn compare_tasks(a: &Task, b: &Task, key: TaskSortKey) -> Ordering {
    match key {
        TaskSortKey::DueDate => match (a.due_date, b.due_date) {
            (Some(da), Some(db)) => da.cmp(&db),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => b.created_at.cmp(&a.created_at),
        },
        TaskSortKey::Priority => severity_rank(a.priority).cmp(&severity_rank(b.priority)),
        TaskSortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        TaskSortKey::Created => b.created_at.cmp(&a.created_at),
        TaskSortKey::Budget => b
            .budget
            .unwrap_or(0.0)
            .total_cmp(&a.budget.unwrap_or(0.0)),
    }
}

/// Position in the urgent-first listing
fn severity_rank(priority: Priority) -> u8 {
    match priority {
        Priority::Urgent => 0,
        Priority::High => 1,
        Priority::Medium => 2,
        Priority::Low => 3,
    }
}

pub fn query_projects<'a>(projects: &'a [Project], criteria: &ProjectCriteria) -> Vec<&'a Project> {
    let needle = criteria.search.to_lowercase();
    projects
        .iter()
        .filter(|p| criteria.status.is_none_or(|s| p.status == s))
        .filter(|p| {
            needle.is_empty()
                || contains_ci(&p.name, &needle)
                || contains_ci(&p.description, &needle)
        })
        .collect()
}

/// Users whose name or email contains `search`
pub fn query_users<'a>(users: &'a [User], search: &str) -> Vec<&'a User> {
    let needle = search.to_lowercase();
    users
        .iter()
        .filter(|u| {
            needle.is_empty() || contains_ci(&u.name, &needle) || contains_ci(&u.email, &needle)
        })
        .collect()
}

/// Open tasks whose due date has passed
pub fn overdue_tasks(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    tasks.iter().filter(|t| t.is_overdue(now)).collect()
}

/// Open tasks due within the next seven days
pub fn upcoming_tasks(tasks: &[Task], now: DateTime<Utc>) -> Vec<&Task> {
    let horizon = now + Duration::weeks(1);
    tasks
        .iter()
        .filter(|t| !t.completed)
        .filter(|t| t.due_date.is_some_and(|due| due >= now && due <= horizon))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-09-06T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn task(title: &str, created_offset_h: i64) -> Task {
        Task::new(title, "", base() + Duration::hours(created_offset_h))
    }

    fn titles(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn empty_criteria_keeps_everything_in_order() {
        let tasks = vec![task("b", 0), task("a", 1), task("c", 2)];
        let result = query_tasks(&tasks, &TaskCriteria::default());
        assert_eq!(titles(&result), ["b", "a", "c"]);
    }

    #[test]
    fn search_matches_title_description_or_tag() {
        let mut by_title = task("Design Logo", 0);
        by_title.priority = Priority::High;
        let mut by_desc = task("Other", 1);
        by_desc.description = "needs a LOGO refresh".into();
        let mut by_tag = task("Third", 2);
        by_tag.tags = vec!["logo-work".into()];
        let miss = task("Unrelated", 3);
        let tasks = vec![by_title, by_desc, by_tag, miss];

        let criteria = TaskCriteria {
            search: "LOGO".into(),
            ..TaskCriteria::default()
        };
        assert_eq!(
            titles(&query_tasks(&tasks, &criteria)),
            ["Design Logo", "Other", "Third"]
        );
    }

    #[test]
    fn search_whitespace_is_part_of_the_term() {
        let tasks = vec![task("Design Logo", 0), task("logo", 1)];
        let criteria = TaskCriteria {
            search: " logo".into(),
            ..TaskCriteria::default()
        };
        assert_eq!(titles(&query_tasks(&tasks, &criteria)), ["Design Logo"]);
    }

    #[test]
    fn every_filter_applies() {
        let project = Uuid::new_v4();
        let mut a = task("a", 0);
        a.priority = Priority::High;
        a.project_id = Some(project);
        let mut b = task("b", 1);
        b.priority = Priority::High;
        b.project_id = Some(project);
        b.set_completed(true, base());
        let mut c = task("c", 2);
        c.priority = Priority::Low;
        c.project_id = Some(project);
        let mut d = task("d", 3);
        d.priority = Priority::High;
        let tasks = vec![a, b, c, d];

        let criteria = TaskCriteria {
            priority: Some(Priority::High),
            include_completed: false,
            project_id: Some(project),
            ..TaskCriteria::default()
        };
        let result = query_tasks(&tasks, &criteria);
        assert_eq!(titles(&result), ["a"]);
        for t in &result {
            assert!(!t.completed);
            assert_eq!(t.priority, Priority::High);
            assert_eq!(t.project_id, Some(project));
        }
    }

    #[test]
    fn due_date_sort_puts_dated_first() {
        let mut late = task("late", 0);
        late.due_date = Some(base() + Duration::days(5));
        let mut soon = task("soon", 1);
        soon.due_date = Some(base() + Duration::days(1));
        let old_undated = task("old undated", 2);
        let new_undated = task("new undated", 3);
        let tasks = vec![old_undated, late, new_undated, soon];

        let criteria = TaskCriteria {
            sort: Some(TaskSortKey::DueDate),
            ..TaskCriteria::default()
        };
        assert_eq!(
            titles(&query_tasks(&tasks, &criteria)),
            ["soon", "late", "new undated", "old undated"]
        );
    }

    #[test]
    fn priority_sort_is_urgent_first_and_stable() {
        let mut tasks = Vec::new();
        for (title, priority) in [
            ("low", Priority::Low),
            ("high-1", Priority::High),
            ("urgent", Priority::Urgent),
            ("medium", Priority::Medium),
            ("high-2", Priority::High),
        ] {
            let mut t = task(title, 0);
            t.priority = priority;
            tasks.push(t);
        }

        let criteria = TaskCriteria {
            sort: Some(TaskSortKey::Priority),
            ..TaskCriteria::default()
        };
        assert_eq!(
            titles(&query_tasks(&tasks, &criteria)),
            ["urgent", "high-1", "high-2", "medium", "low"]
        );
    }

    #[test]
    fn title_created_and_budget_sorts() {
        let mut x = task("banana", 0);
        x.budget = Some(100.0);
        let mut y = task("Apple", 2);
        y.budget = None;
        let mut z = task("cherry", 1);
        z.budget = Some(300.0);
        let tasks = vec![x, y, z];

        let sorted = |key| {
            let criteria = TaskCriteria {
                sort: Some(key),
                ..TaskCriteria::default()
            };
            titles(&query_tasks(&tasks, &criteria))
        };

        assert_eq!(sorted(TaskSortKey::Title), ["Apple", "banana", "cherry"]);
        assert_eq!(sorted(TaskSortKey::Created), ["Apple", "cherry", "banana"]);
        assert_eq!(sorted(TaskSortKey::Budget), ["cherry", "banana", "Apple"]);
    }

    #[test]
    fn query_does_not_touch_source() {
        let tasks = vec![task("b", 0), task("a", 1)];
        let before = tasks.clone();
        let criteria = TaskCriteria {
            sort: Some(TaskSortKey::Title),
            ..TaskCriteria::default()
        };
        let _ = query_tasks(&tasks, &criteria);
        assert_eq!(tasks, before);
    }

    #[test]
    fn sort_key_parsing() {
        assert_eq!("due_date".parse::<TaskSortKey>().unwrap(), TaskSortKey::DueDate);
        assert_eq!("Budget".parse::<TaskSortKey>().unwrap(), TaskSortKey::Budget);
        assert!(matches!(
            "random".parse::<TaskSortKey>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn project_search_and_status() {
        let owner = Uuid::new_v4();
        let mut app = Project::new("Mobile App", "task tracking", owner, base());
        app.status = ProjectStatus::Active;
        let mut campaign = Project::new("Campaign", "Launch the APP store listing", owner, base());
        campaign.status = ProjectStatus::Planning;
        let research = Project::new("Research", "interviews", owner, base());
        let projects = vec![app, campaign, research];

        let criteria = ProjectCriteria {
            search: "app".into(),
            ..ProjectCriteria::default()
        };
        let names: Vec<_> = query_projects(&projects, &criteria)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["Mobile App", "Campaign"]);

        let criteria = ProjectCriteria {
            search: "app".into(),
            status: Some(ProjectStatus::Planning),
        };
        assert_eq!(query_projects(&projects, &criteria).len(), 1);
        assert_eq!(query_projects(&projects, &ProjectCriteria::default()).len(), 3);
    }

    #[test]
    fn user_search_checks_name_and_email() {
        use crate::models::Role;
        let users = vec![
            User::new("Sarah Chen", "sarah@example.com", Role::Member, base()),
            User::new("Mike", "mike.r@corp.io", Role::Viewer, base()),
        ];
        assert_eq!(query_users(&users, "CHEN").len(), 1);
        assert_eq!(query_users(&users, "corp").len(), 1);
        assert_eq!(query_users(&users, "").len(), 2);
    }

    #[test]
    fn overdue_and_upcoming() {
        let now = base();
        let mut overdue = task("overdue", 0);
        overdue.due_date = Some(now - Duration::days(1));
        let mut upcoming = task("upcoming", 0);
        upcoming.due_date = Some(now + Duration::days(3));
        let mut far = task("far", 0);
        far.due_date = Some(now + Duration::days(30));
        let mut done = task("done", 0);
        done.due_date = Some(now - Duration::days(2));
        done.set_completed(true, now);
        let tasks = vec![overdue, upcoming, far, done];

        assert_eq!(titles(&overdue_tasks(&tasks, now)), ["overdue"]);
        assert_eq!(titles(&upcoming_tasks(&tasks, now)), ["upcoming"]);
    }
}
