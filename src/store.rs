//! In-memory data store persisted to the key-value database
//!
//! `DataStore` owns the canonical task, project and user collections. Every
//! mutation writes the touched collection back under its key and emits a
//! [`StoreEvent`] to subscribers. Reward coins are credited to the current
//! user here, so callers never touch the counters directly.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RewardsConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Priority, Project, ProjectStatus, Task, TaskComment, User};
use crate::sample;

/// Fixed keys in the key-value database
pub mod keys {
    pub const TASKS: &str = "TaskOrbitTasks";
    pub const PROJECTS: &str = "TaskOrbitProjects";
    pub const USERS: &str = "TaskOrbitUsers";
    pub const CURRENT_USER: &str = "TaskOrbitCurrentUser";
    pub const ONBOARDING_COMPLETED: &str = "TaskOrbitOnboardingCompleted";

    pub const ALL: [&str; 5] = [
        TASKS,
        PROJECTS,
        USERS,
        CURRENT_USER,
        ONBOARDING_COMPLETED,
    ];
}

/// Change notification emitted after each mutation
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    TasksChanged,
    ProjectsChanged,
    UsersChanged,
    CurrentUserChanged,
    CoinsAwarded { amount: u64, reason: &'static str },
    Reset,
}

/// Backup/restore bundle holding every collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub tasks: Vec<Task>,
    pub projects: Vec<Project>,
    pub users: Vec<User>,
    pub current_user: User,
}

/// Input for [`DataStore::add_task`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub budget: Option<f64>,
    pub project_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
    pub tags: Vec<String>,
}

/// Input for [`DataStore::add_project`]
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub status: ProjectStatus,
    pub budget: Option<f64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Defaults to the current user
    pub owner_id: Option<Uuid>,
    pub member_ids: Vec<Uuid>,
    pub color: Option<String>,
}

type Subscriber = Box<dyn FnMut(&StoreEvent)>;

pub struct DataStore {
    db: Database,
    rewards: RewardsConfig,
    tasks: Vec<Task>,
    projects: Vec<Project>,
    users: Vec<User>,
    current_user: User,
    subscribers: Vec<Subscriber>,
}

impl DataStore {
    /// Load every collection from `db`, falling back to sample data for any
    /// key that is missing or cannot be decoded
    pub fn open(db: Database, rewards: RewardsConfig) -> Result<Self> {
        let now = Utc::now();

        let current_user = load_or_default(&db, keys::CURRENT_USER, || {
            sample::default_current_user(now)
        })?;
        let users = load_or_default(&db, keys::USERS, || sample::sample_users(now))?;
        let projects = load_or_default(&db, keys::PROJECTS, || {
            sample::sample_projects(&current_user, now)
        })?;
        let mut tasks: Vec<Task> =
            load_or_default(&db, keys::TASKS, || sample::sample_tasks(now))?;
        normalize_completion(&mut tasks, now);

        tracing::info!(
            tasks = tasks.len(),
            projects = projects.len(),
            users = users.len(),
            "Data store loaded"
        );

        Ok(Self {
            db,
            rewards,
            tasks,
            projects,
            users,
            current_user,
            subscribers: Vec::new(),
        })
    }

    /// Register a callback invoked after every mutation
    pub fn subscribe(&mut self, callback: impl FnMut(&StoreEvent) + 'static) {
        self.subscribers.push(Box::new(callback));
    }

    fn emit(&mut self, event: StoreEvent) {
        tracing::debug!(?event, "Store event");
        for subscriber in &mut self.subscribers {
            subscriber(&event);
        }
    }

    // Reads

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn current_user(&self) -> &User {
        &self.current_user
    }

    pub fn task(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn project(&self, id: Uuid) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    /// Looks in the user list first, then at the current user
    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .or_else(|| (self.current_user.id == id).then_some(&self.current_user))
    }

    pub fn tasks_for_project(&self, project_id: Uuid) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.project_id == Some(project_id))
            .collect()
    }

    pub fn tasks_for_user(&self, user_id: Uuid) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.assigned_user_id == Some(user_id))
            .collect()
    }

    /// Projects the user owns or is a member of
    pub fn projects_for_user(&self, user_id: Uuid) -> Vec<&Project> {
        self.projects
            .iter()
            .filter(|p| p.is_member(user_id))
            .collect()
    }

    // Tasks

    pub fn add_task(&mut self, new: NewTask) -> Result<&Task> {
        let mut task = Task::new(new.title.trim(), new.description, Utc::now());
        task.priority = new.priority;
        task.due_date = new.due_date;
        task.budget = new.budget;
        task.project_id = new.project_id;
        task.assigned_user_id = new.assigned_user_id;
        task.tags = new.tags;
        task.validate()?;
        self.check_task_links(&task)?;

        let task_id = task.id;
        let project_id = task.project_id;
        self.tasks.push(task);
        self.save_tasks()?;
        self.emit(StoreEvent::TasksChanged);

        if let Some(project_id) = project_id {
            self.link_task(task_id, None, Some(project_id))?;
        }

        tracing::info!(task_id = %task_id, "Task added");
        self.award_coins(self.rewards.task_created, "Task Created")?;

        Ok(&self.tasks[self.task_index(task_id)?])
    }

    /// Replace the stored task with the same id.
    ///
    /// The completion timestamp is brought in line with the completion flag,
    /// and completing a previously open task pays out the completion reward.
    pub fn update_task(&mut self, mut task: Task) -> Result<()> {
        let index = self.task_index(task.id)?;
        task.validate()?;
        self.check_task_links(&task)?;
        task.set_completed(task.completed, Utc::now());

        let previous = std::mem::replace(&mut self.tasks[index], task);
        let updated = &self.tasks[index];
        let newly_completed = !previous.completed && updated.completed;
        let (task_id, new_project) = (updated.id, updated.project_id);

        self.save_tasks()?;
        self.emit(StoreEvent::TasksChanged);

        if previous.project_id != new_project {
            self.link_task(task_id, previous.project_id, new_project)?;
        }

        if newly_completed {
            tracing::info!(task_id = %task_id, "Task completed");
            self.current_user.tasks_completed = self.current_user.tasks_completed.saturating_add(1);
            self.award_coins(self.rewards.task_completed, "Task Completed")?;
        }

        Ok(())
    }

    /// Mark a task complete or incomplete
    pub fn set_task_completed(&mut self, id: Uuid, completed: bool) -> Result<()> {
        let mut task = self.tasks[self.task_index(id)?].clone();
        task.set_completed(completed, Utc::now());
        self.update_task(task)
    }

    pub fn delete_task(&mut self, id: Uuid) -> Result<Task> {
        let index = self.task_index(id)?;
        let task = self.tasks.remove(index);
        self.save_tasks()?;
        self.emit(StoreEvent::TasksChanged);

        if task.project_id.is_some() {
            self.link_task(task.id, task.project_id, None)?;
        }

        tracing::info!(task_id = %id, "Task deleted");
        Ok(task)
    }

    /// Append a comment authored by the current user
    pub fn add_comment(&mut self, task_id: Uuid, text: &str) -> Result<TaskComment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::invalid("comment text cannot be empty"));
        }
        let index = self.task_index(task_id)?;
        let comment = TaskComment {
            id: Uuid::new_v4(),
            text: text.to_string(),
            author_id: self.current_user.id,
            author_name: self.current_user.display_name().to_string(),
            created_at: Utc::now(),
        };
        self.tasks[index].comments.push(comment.clone());
        self.save_tasks()?;
        self.emit(StoreEvent::TasksChanged);

        self.award_coins(self.rewards.comment_added, "Comment Added")?;
        Ok(comment)
    }

    // Projects

    pub fn add_project(&mut self, new: NewProject) -> Result<&Project> {
        let now = Utc::now();
        let owner_id = new.owner_id.unwrap_or(self.current_user.id);
        let mut project = Project::new(new.name.trim(), new.description, owner_id, now);
        project.status = new.status;
        project.budget = new.budget;
        project.start_date = new.start_date.unwrap_or(now);
        project.end_date = new.end_date;
        for member in new.member_ids {
            if !project.is_member(member) {
                project.member_ids.push(member);
            }
        }
        if let Some(color) = new.color {
            project.color = color;
        }
        project.validate()?;
        self.check_project_people(&project, None)?;

        let project_id = project.id;
        self.projects.push(project);
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);
        tracing::info!(project_id = %project_id, "Project added");

        if owner_id == self.current_user.id {
            self.current_user.projects_owned = self.current_user.projects_owned.saturating_add(1);
            self.award_coins(self.rewards.project_created, "Project Created")?;
        }

        Ok(&self.projects[self.project_index(project_id)?])
    }

    pub fn update_project(&mut self, project: Project) -> Result<()> {
        let index = self.project_index(project.id)?;
        project.validate()?;
        self.check_project_people(&project, Some(&self.projects[index]))?;
        self.projects[index] = project;
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);
        Ok(())
    }

    /// Remove a project together with every task that belongs to it
    pub fn delete_project(&mut self, id: Uuid) -> Result<Project> {
        let index = self.project_index(id)?;

        let before = self.tasks.len();
        self.tasks.retain(|t| t.project_id != Some(id));
        let removed_tasks = before - self.tasks.len();
        self.save_tasks()?;
        self.emit(StoreEvent::TasksChanged);

        let project = self.projects.remove(index);
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);

        tracing::info!(project_id = %id, removed_tasks, "Project deleted");

        if project.owner_id == self.current_user.id {
            self.current_user.projects_owned = self.current_user.projects_owned.saturating_sub(1);
            self.save_current_user()?;
            self.emit(StoreEvent::CurrentUserChanged);
        }

        Ok(project)
    }

    pub fn add_member(&mut self, project_id: Uuid, user_id: Uuid) -> Result<()> {
        if self.user(user_id).is_none() {
            return Err(Error::NotFound {
                kind: "user",
                id: user_id,
            });
        }
        let index = self.project_index(project_id)?;
        let project = &mut self.projects[index];
        if project.is_member(user_id) {
            return Ok(());
        }
        project.member_ids.push(user_id);
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);
        Ok(())
    }

    pub fn remove_member(&mut self, project_id: Uuid, user_id: Uuid) -> Result<()> {
        let index = self.project_index(project_id)?;
        self.projects[index].member_ids.retain(|id| *id != user_id);
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);
        Ok(())
    }

    // Users

    pub fn add_user(&mut self, user: User) -> Result<()> {
        user.preferences.validate()?;
        if self.user(user.id).is_some() {
            return Err(Error::invalid(format!("user {} already exists", user.id)));
        }
        tracing::info!(user_id = %user.id, "User added");
        self.users.push(user);
        self.save_users()?;
        self.emit(StoreEvent::UsersChanged);
        Ok(())
    }

    pub fn update_user(&mut self, user: User) -> Result<()> {
        user.preferences.validate()?;
        let index = self.user_index(user.id)?;
        self.users[index] = user;
        self.save_users()?;
        self.emit(StoreEvent::UsersChanged);
        Ok(())
    }

    /// Remove a user, clearing their task assignments and project memberships
    pub fn delete_user(&mut self, id: Uuid) -> Result<User> {
        let index = self.user_index(id)?;
        let user = self.users.remove(index);
        self.save_users()?;
        self.emit(StoreEvent::UsersChanged);

        for project in &mut self.projects {
            project.member_ids.retain(|member| *member != id);
        }
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);

        for task in &mut self.tasks {
            if task.assigned_user_id == Some(id) {
                task.assigned_user_id = None;
            }
        }
        self.save_tasks()?;
        self.emit(StoreEvent::TasksChanged);

        tracing::info!(user_id = %id, "User deleted");
        Ok(user)
    }

    pub fn update_current_user(&mut self, user: User) -> Result<()> {
        user.preferences.validate()?;
        self.current_user = user;
        self.save_current_user()?;
        self.emit(StoreEvent::CurrentUserChanged);
        Ok(())
    }

    // Rewards

    fn award_coins(&mut self, amount: u64, reason: &'static str) -> Result<()> {
        self.current_user.coins_earned = self.current_user.coins_earned.saturating_add(amount);
        self.save_current_user()?;
        tracing::info!(amount, reason, total = self.current_user.coins_earned, "Coins awarded");
        self.emit(StoreEvent::CurrentUserChanged);
        self.emit(StoreEvent::CoinsAwarded { amount, reason });
        Ok(())
    }

    // Onboarding

    pub fn onboarding_completed(&self) -> Result<bool> {
        self.db.get_bool(keys::ONBOARDING_COMPLETED)
    }

    pub fn set_onboarding_completed(&mut self, completed: bool) -> Result<()> {
        self.db.put_bool(keys::ONBOARDING_COMPLETED, completed)
    }

    // Backup / restore

    pub fn export_bundle(&self) -> ExportBundle {
        ExportBundle {
            tasks: self.tasks.clone(),
            projects: self.projects.clone(),
            users: self.users.clone(),
            current_user: self.current_user.clone(),
        }
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export_bundle())?)
    }

    /// Replace every collection with the bundle's contents.
    ///
    /// Nothing is changed when the bundle does not decode.
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let bundle: ExportBundle = serde_json::from_str(json)?;
        self.import_bundle(bundle)
    }

    pub fn import_bundle(&mut self, bundle: ExportBundle) -> Result<()> {
        let now = Utc::now();
        for task in &bundle.tasks {
            task.validate()?;
        }
        for project in &bundle.projects {
            project.validate()?;
        }
        for user in bundle.users.iter().chain(std::iter::once(&bundle.current_user)) {
            user.preferences.validate()?;
        }

        self.tasks = bundle.tasks;
        normalize_completion(&mut self.tasks, now);
        self.projects = bundle.projects;
        self.users = bundle.users;
        self.current_user = bundle.current_user;

        self.save_tasks()?;
        self.save_projects()?;
        self.save_users()?;
        self.save_current_user()?;

        tracing::info!(
            tasks = self.tasks.len(),
            projects = self.projects.len(),
            users = self.users.len(),
            "Data imported"
        );
        self.emit(StoreEvent::TasksChanged);
        self.emit(StoreEvent::ProjectsChanged);
        self.emit(StoreEvent::UsersChanged);
        self.emit(StoreEvent::CurrentUserChanged);
        Ok(())
    }

    /// Wipe all stored keys and reload the sample dataset
    pub fn reset(&mut self) -> Result<()> {
        for key in keys::ALL {
            self.db.remove(key)?;
        }

        let now = Utc::now();
        self.current_user = load_or_default(&self.db, keys::CURRENT_USER, || {
            sample::default_current_user(now)
        })?;
        self.users = load_or_default(&self.db, keys::USERS, || sample::sample_users(now))?;
        let owner = self.current_user.clone();
        self.projects = load_or_default(&self.db, keys::PROJECTS, || {
            sample::sample_projects(&owner, now)
        })?;
        self.tasks = load_or_default(&self.db, keys::TASKS, || sample::sample_tasks(now))?;

        tracing::info!("Data reset to sample dataset");
        self.emit(StoreEvent::Reset);
        Ok(())
    }

    // Internals

    fn task_index(&self, id: Uuid) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or(Error::NotFound { kind: "task", id })
    }

    fn project_index(&self, id: Uuid) -> Result<usize> {
        self.projects
            .iter()
            .position(|p| p.id == id)
            .ok_or(Error::NotFound { kind: "project", id })
    }

    fn user_index(&self, id: Uuid) -> Result<usize> {
        self.users
            .iter()
            .position(|u| u.id == id)
            .ok_or(Error::NotFound { kind: "user", id })
    }

    /// References on a task must point at existing records
    fn check_task_links(&self, task: &Task) -> Result<()> {
        if let Some(project_id) = task.project_id {
            self.project_index(project_id)?;
        }
        if let Some(user_id) = task.assigned_user_id
            && self.user(user_id).is_none()
        {
            return Err(Error::NotFound {
                kind: "user",
                id: user_id,
            });
        }
        Ok(())
    }

    /// Owner and members must name known users. Ids already on `previous`
    /// are accepted as they are, so a project whose owner was deleted stays
    /// editable.
    fn check_project_people(&self, project: &Project, previous: Option<&Project>) -> Result<()> {
        let people = std::iter::once(project.owner_id).chain(project.member_ids.iter().copied());
        for id in people {
            let known_before = previous.is_some_and(|p| p.is_member(id));
            if !known_before && self.user(id).is_none() {
                return Err(Error::NotFound { kind: "user", id });
            }
        }
        Ok(())
    }

    /// Keep `Project::task_ids` in step with `Task::project_id`
    fn link_task(&mut self, task_id: Uuid, from: Option<Uuid>, to: Option<Uuid>) -> Result<()> {
        for project in &mut self.projects {
            if Some(project.id) == from {
                project.task_ids.retain(|id| *id != task_id);
            }
            if Some(project.id) == to && !project.task_ids.contains(&task_id) {
                project.task_ids.push(task_id);
            }
        }
        self.save_projects()?;
        self.emit(StoreEvent::ProjectsChanged);
        Ok(())
    }

    fn save_tasks(&self) -> Result<()> {
        save(&self.db, keys::TASKS, &self.tasks)
    }

    fn save_projects(&self) -> Result<()> {
        save(&self.db, keys::PROJECTS, &self.projects)
    }

    fn save_users(&self) -> Result<()> {
        save(&self.db, keys::USERS, &self.users)
    }

    fn save_current_user(&self) -> Result<()> {
        save(&self.db, keys::CURRENT_USER, &self.current_user)
    }
}

/// Bring `completed_at` in line with the completion flag on every task
fn normalize_completion(tasks: &mut [Task], now: DateTime<Utc>) {
    for task in tasks {
        let completed = task.completed;
        task.set_completed(completed, now);
    }
}

fn save<T: Serialize + ?Sized>(db: &Database, key: &str, value: &T) -> Result<()> {
    db.put(key, &serde_json::to_vec(value)?)
}

/// Decode the value under `key`, or write and return `fallback()` when the
/// key is absent or its contents do not decode
fn load_or_default<T, F>(db: &Database, key: &str, fallback: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> T,
{
    if let Some(raw) = db.get(key)? {
        match serde_json::from_slice(&raw) {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Stored data is unreadable, using sample data");
            }
        }
    } else {
        tracing::debug!(key, "No stored data, using sample data");
    }

    let value = fallback();
    save(db, key, &value)?;
    Ok(value)
}
