//! Permission checks combining a user's role with project ownership

use crate::models::{Permission, Project, Role, Task, User};

/// Owner, admin, or a project manager who is on the project
pub fn can_manage_project(user: &User, project: &Project) -> bool {
    project.owner_id == user.id
        || user.role == Role::Admin
        || (user.role == Role::ProjectManager && project.member_ids.contains(&user.id))
}

pub fn can_edit_project(user: &User, project: &Project) -> bool {
    can_manage_project(user, project)
}

pub fn can_view_project(user: &User, project: &Project) -> bool {
    project.is_member(user.id) || user.role == Role::Admin
}

pub fn can_invite_users(user: &User, project: &Project) -> bool {
    can_manage_project(user, project)
}

pub fn can_assign_tasks(user: &User, project: &Project) -> bool {
    user.has_permission(Permission::AssignTasks) && can_manage_project(user, project)
}

/// Assignee, admin, or a project manager who owns the task's project.
/// `project` is the project the task belongs to, if any.
pub fn can_edit_task(user: &User, task: &Task, project: Option<&Project>) -> bool {
    task.assigned_user_id == Some(user.id)
        || user.role == Role::Admin
        || (user.role == Role::ProjectManager && project.is_some_and(|p| p.owner_id == user.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User::new("U", "u@example.com", role, Utc::now())
    }

    #[test]
    fn project_management_rules() {
        let owner = user(Role::Member);
        let admin = user(Role::Admin);
        let pm_member = user(Role::ProjectManager);
        let pm_outsider = user(Role::ProjectManager);
        let viewer = user(Role::Viewer);

        let mut project = Project::new("P", "", owner.id, Utc::now());
        project.member_ids = vec![pm_member.id, viewer.id];

        assert!(can_manage_project(&owner, &project));
        assert!(can_manage_project(&admin, &project));
        assert!(can_manage_project(&pm_member, &project));
        assert!(!can_manage_project(&pm_outsider, &project));
        assert!(!can_manage_project(&viewer, &project));

        assert!(can_view_project(&viewer, &project));
        assert!(can_view_project(&admin, &project));
        assert!(!can_view_project(&pm_outsider, &project));

        // owner is a plain member, so lacks the assign permission
        assert!(!can_assign_tasks(&owner, &project));
        assert!(can_assign_tasks(&pm_member, &project));
        assert!(can_invite_users(&pm_member, &project));
        assert!(can_edit_project(&admin, &project));
    }

    #[test]
    fn task_edit_rules() {
        let assignee = user(Role::Member);
        let other = user(Role::Member);
        let pm = user(Role::ProjectManager);
        let admin = user(Role::Admin);

        let project = Project::new("P", "", pm.id, Utc::now());
        let mut task = Task::new("T", "", Utc::now());
        task.assigned_user_id = Some(assignee.id);
        task.project_id = Some(project.id);

        assert!(can_edit_task(&assignee, &task, Some(&project)));
        assert!(!can_edit_task(&other, &task, Some(&project)));
        assert!(can_edit_task(&pm, &task, Some(&project)));
        assert!(!can_edit_task(&pm, &task, None));
        assert!(can_edit_task(&admin, &task, None));
    }
}
