//! Sample dataset used on first launch and when stored data cannot be decoded

use chrono::{DateTime, Duration, Months, Utc};

use crate::models::{Priority, Project, ProjectStatus, Role, Task, User};

pub fn sample_tasks(now: DateTime<Utc>) -> Vec<Task> {
    let mut logo = Task::new(
        "Design App Logo",
        "Create a modern logo that represents productivity and financial tracking",
        now,
    );
    logo.priority = Priority::High;
    logo.due_date = Some(now + Duration::days(7));
    logo.budget = Some(500.0);
    logo.actual_cost = 450.0;
    logo.tags = vec!["design".into(), "branding".into()];

    let mut auth = Task::new(
        "Implement User Authentication",
        "Set up secure user login and registration system",
        now,
    );
    auth.priority = Priority::Urgent;
    auth.due_date = Some(now + Duration::days(3));
    auth.budget = Some(1200.0);
    auth.actual_cost = 800.0;
    auth.tags = vec!["development".into(), "security".into()];

    let mut research = Task::new(
        "Market Research",
        "Analyze competitor apps and user preferences",
        now,
    );
    research.budget = Some(300.0);
    research.actual_cost = 250.0;
    research.set_completed(true, now - Duration::days(5));
    research.tags = vec!["research".into(), "marketing".into()];

    vec![logo, auth, research]
}

pub fn sample_projects(owner: &User, now: DateTime<Utc>) -> Vec<Project> {
    let months_ago = |n| now.checked_sub_months(Months::new(n)).unwrap_or(now);
    let months_ahead = |n| now.checked_add_months(Months::new(n));

    let mut app = Project::new(
        "TaskOrbit Mobile App",
        "Develop a comprehensive task management app with financial tracking",
        owner.id,
        now,
    );
    app.budget = Some(15000.0);
    app.actual_cost = 8500.0;
    app.start_date = months_ago(2);
    app.end_date = months_ahead(2);

    let mut marketing = Project::new(
        "Marketing Campaign",
        "Launch campaign for app store release",
        owner.id,
        now,
    );
    marketing.status = ProjectStatus::Planning;
    marketing.budget = Some(5000.0);
    marketing.actual_cost = 1200.0;
    marketing.end_date = months_ahead(1);
    marketing.color = "#007AFF".into();

    let mut research = Project::new(
        "User Research Study",
        "Conduct user interviews and usability testing",
        owner.id,
        now,
    );
    research.status = ProjectStatus::Completed;
    research.budget = Some(2000.0);
    research.actual_cost = 1800.0;
    research.start_date = months_ago(3);
    research.end_date = Some(months_ago(1));
    research.color = "#34C759".into();

    vec![app, marketing, research]
}

pub fn sample_users(now: DateTime<Utc>) -> Vec<User> {
    [
        ("Alex Johnson", "alex.johnson@example.com", Role::Admin, 1250, 45, 3),
        ("Sarah Chen", "sarah.chen@example.com", Role::ProjectManager, 890, 32, 2),
        ("Mike Rodriguez", "mike.rodriguez@example.com", Role::Member, 650, 28, 0),
        ("Emma Wilson", "emma.wilson@example.com", Role::Member, 420, 19, 1),
    ]
    .into_iter()
    .map(|(name, email, role, coins, tasks, projects)| {
        let mut user = User::new(name, email, role, now);
        user.coins_earned = coins;
        user.tasks_completed = tasks;
        user.projects_owned = projects;
        user
    })
    .collect()
}

pub fn default_current_user(now: DateTime<Utc>) -> User {
    let mut user = User::new("John Doe", "john.doe@example.com", Role::Admin, now);
    user.coins_earned = 2150;
    user.tasks_completed = 67;
    user.projects_owned = 4;
    user
}
