//! taskorbit - task and project tracker with rewards and budget analytics
//!
//! Command-line front end over the local data store.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use taskorbit::analytics::{self, AnalyticsSnapshot};
use taskorbit::config::Config;
use taskorbit::db::Database;
use taskorbit::models::{Priority, ProjectStatus, Task};
use taskorbit::query::{self, ProjectCriteria, TaskCriteria, TaskSortKey};
use taskorbit::store::{DataStore, NewProject, NewTask};

#[derive(Parser)]
#[command(name = "taskorbit")]
#[command(about = "Task and project tracker with rewards and budget analytics")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new config file
    Init {
        /// Output path for config file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List tasks
    Tasks {
        /// Match title, description or tags
        #[arg(short, long, default_value = "")]
        search: String,

        /// Only this priority: low | medium | high | urgent
        #[arg(short, long)]
        priority: Option<Priority>,

        /// Hide completed tasks
        #[arg(long)]
        hide_completed: bool,

        /// Only tasks in this project
        #[arg(long)]
        project: Option<Uuid>,

        /// Sort: due-date | priority | title | created | budget
        #[arg(long, default_value = "due-date")]
        sort: TaskSortKey,

        /// Only open tasks past their due date
        #[arg(long)]
        overdue: bool,
    },

    /// List projects
    Projects {
        /// Match name or description
        #[arg(short, long, default_value = "")]
        search: String,

        /// Only this status: planning | active | on-hold | completed | cancelled
        #[arg(long)]
        status: Option<ProjectStatus>,
    },

    /// Add a task assigned to the current user
    AddTask {
        title: String,

        #[arg(long, default_value = "")]
        desc: String,

        #[arg(short, long, default_value = "medium")]
        priority: Priority,

        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<String>,

        #[arg(long)]
        budget: Option<f64>,

        #[arg(long)]
        project: Option<Uuid>,

        /// Tag, may be repeated
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Add a project owned by the current user
    AddProject {
        name: String,

        #[arg(long, default_value = "")]
        desc: String,

        #[arg(long)]
        budget: Option<f64>,

        #[arg(long, default_value = "active")]
        status: ProjectStatus,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: Option<String>,
    },

    /// Mark a task completed
    Complete { id: Uuid },

    /// Mark a task open again
    Reopen { id: Uuid },

    /// Delete a task
    DeleteTask { id: Uuid },

    /// Delete a project and all of its tasks
    DeleteProject { id: Uuid },

    /// Comment on a task as the current user
    Comment { id: Uuid, text: String },

    /// Print analytics as JSON
    Analytics {
        #[command(subcommand)]
        report: Report,
    },

    /// Write all data as a JSON bundle
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all data with a JSON bundle
    Import { input: PathBuf },

    /// Erase all data and restore the sample dataset
    Reset {
        /// Skip the confirmation notice
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum Report {
    /// Per-project task, budget and trend metrics
    Projects,
    /// Current user's productivity
    User,
    /// Budget and spending across everything
    Finance,
    /// Per-member breakdown of one project
    Team { project: Uuid },
    /// Everything above except team
    All,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskorbit=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Init { output } = &cli.command {
        let path = output.clone().unwrap_or_else(|| PathBuf::from("config.toml"));
        Config::default().save_to(&path)?;
        println!("Created config file: {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.storage.path).context("Failed to open database")?;
    let mut store = DataStore::open(db, config.rewards).context("Failed to load data")?;

    run(cli.command, &mut store)
}

fn run(command: Commands, store: &mut DataStore) -> Result<()> {
    match command {
        Commands::Init { .. } => Ok(()),

        Commands::Tasks {
            search,
            priority,
            hide_completed,
            project,
            sort,
            overdue,
        } => {
            let criteria = TaskCriteria {
                search,
                priority,
                include_completed: !hide_completed,
                project_id: project,
                sort: Some(sort),
            };
            let mut tasks = query::query_tasks(store.tasks(), &criteria);
            if overdue {
                let now = Utc::now();
                tasks.retain(|t| t.is_overdue(now));
            }
            print_tasks(&tasks);
            Ok(())
        }

        Commands::Projects { search, status } => {
            let criteria = ProjectCriteria { search, status };
            println!(
                "{:<36} {:<10} {:>9} {:>10} {:>10}  {}",
                "ID", "Status", "Progress", "Budget", "Cost", "Name"
            );
            for p in query::query_projects(store.projects(), &criteria) {
                println!(
                    "{:<36} {:<10} {:>8.0}% {:>10} {:>10.2}  {}",
                    p.id,
                    p.status,
                    p.progress(store.tasks()) * 100.0,
                    p.budget.map_or("-".to_string(), |b| format!("{b:.2}")),
                    p.actual_cost,
                    p.name
                );
            }
            Ok(())
        }

        Commands::AddTask {
            title,
            desc,
            priority,
            due,
            budget,
            project,
            tags,
        } => {
            let new = NewTask {
                title,
                description: desc,
                priority,
                due_date: due.as_deref().map(parse_date).transpose()?,
                budget,
                project_id: project,
                assigned_user_id: Some(store.current_user().id),
                tags: tags
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
            };
            let task = store.add_task(new)?;
            println!("Added task {} ({})", task.id, task.title);
            Ok(())
        }

        Commands::AddProject {
            name,
            desc,
            budget,
            status,
            end,
        } => {
            let new = NewProject {
                name,
                description: desc,
                status,
                budget,
                end_date: end.as_deref().map(parse_date).transpose()?,
                ..NewProject::default()
            };
            let project = store.add_project(new)?;
            println!("Added project {} ({})", project.id, project.name);
            Ok(())
        }

        Commands::Complete { id } => {
            store.set_task_completed(id, true)?;
            println!(
                "Completed task {id}. Coins: {}",
                store.current_user().coins_earned
            );
            Ok(())
        }

        Commands::Reopen { id } => {
            store.set_task_completed(id, false)?;
            println!("Reopened task {id}");
            Ok(())
        }

        Commands::DeleteTask { id } => {
            let task = store.delete_task(id)?;
            println!("Deleted task '{}'", task.title);
            Ok(())
        }

        Commands::DeleteProject { id } => {
            let project = store.delete_project(id)?;
            println!("Deleted project '{}' and its tasks", project.name);
            Ok(())
        }

        Commands::Comment { id, text } => {
            let comment = store.add_comment(id, &text)?;
            println!("{}: {}", comment.author_name, comment.text);
            Ok(())
        }

        Commands::Analytics { report } => {
            let now = Local::now();
            let json = match report {
                Report::Projects => serde_json::to_string_pretty(
                    &analytics::all_project_analytics_at(store.projects(), store.tasks(), now),
                )?,
                Report::User => {
                    let user = store.current_user();
                    serde_json::to_string_pretty(&analytics::user_productivity_at(
                        user,
                        store.tasks_for_user(user.id),
                        now,
                    ))?
                }
                Report::Finance => serde_json::to_string_pretty(&analytics::financial_summary_at(
                    store.tasks(),
                    store.projects(),
                    now,
                ))?,
                Report::Team { project } => {
                    let project = store
                        .project(project)
                        .with_context(|| format!("Project {project} not found"))?;
                    let mut people = store.users().to_vec();
                    people.push(store.current_user().clone());
                    serde_json::to_string_pretty(&analytics::team_productivity(
                        project,
                        store.tasks_for_project(project.id),
                        &people,
                    ))?
                }
                Report::All => serde_json::to_string_pretty(&AnalyticsSnapshot::compute(store, now))?,
            };
            println!("{json}");
            Ok(())
        }

        Commands::Export { output } => {
            let json = store.export_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json).context("Failed to write export file")?;
                    println!("Exported data to {}", path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }

        Commands::Import { input } => {
            let json = std::fs::read_to_string(&input).context("Failed to read import file")?;
            store.import_json(&json)?;
            println!(
                "Imported {} tasks, {} projects, {} users",
                store.tasks().len(),
                store.projects().len(),
                store.users().len()
            );
            Ok(())
        }

        Commands::Reset { yes } => {
            if !yes {
                println!("This erases all data. Re-run with --yes to confirm.");
                return Ok(());
            }
            store.reset()?;
            println!("Data reset to the sample dataset.");
            Ok(())
        }
    }
}

/// Midnight local time on the given YYYY-MM-DD date
fn parse_date(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD"))?;
    let local = date
        .and_hms_opt(0, 0, 0)
        .and_then(|dt| dt.and_local_timezone(Local).earliest())
        .with_context(|| format!("Date '{s}' does not exist in the local time zone"))?;
    Ok(local.with_timezone(&Utc))
}

fn print_tasks(tasks: &[&Task]) {
    println!(
        "{:<36} {:<4} {:<7} {:<10} {:>10}  {}",
        "ID", "Done", "Pri", "Due", "Cost", "Title [tags]"
    );
    for t in tasks {
        let due = t
            .due_date
            .map(|d| d.with_timezone(&Local).format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into());
        let tags = if t.tags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", t.tags.join(","))
        };
        println!(
            "{:<36} {:<4} {:<7} {:<10} {:>10.2}  {}{}",
            t.id,
            if t.completed { "x" } else { "" },
            t.priority,
            due,
            t.actual_cost,
            t.title,
            tags
        );
    }
}
