use std::fmt::Write;

use chrono::{DateTime, Local, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::error::StoreError;
use crate::filter::{partition_by_completion, TaskFilter};
use crate::models::{
    Category, CategoryPatch, NewCategory, NewTask, NewTemplate, Priority, Task, TaskPatch,
    TemplatePatch,
};
use crate::stores::{category_name_or_default, Stores};
use crate::utils::{format_tags_brackets, parse_due_date};

#[derive(Parser)]
#[command(name = "taskflow")]
#[command(about = "Tasks by category and priority, with templates and progress stats")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Category id
        #[arg(short, long)]
        category: i64,
        /// Priority (high, medium, low)
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// List tasks, newest first (default if no subcommand)
    List {
        /// Only tasks in this category
        #[arg(short, long)]
        category: Option<i64>,
        /// Only tasks with this priority
        #[arg(short, long)]
        priority: Option<Priority>,
        /// Case-insensitive text to find in title or description
        #[arg(short, long)]
        search: Option<String>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show a single task
    Show {
        id: i64,
        #[arg(long)]
        json: bool,
    },
    /// Edit a task
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<i64>,
        /// New due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the due date
        #[arg(long)]
        clear_due: bool,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },
    /// Mark a task done, or reopen it if already done
    Toggle { id: i64 },
    /// Delete a task
    Delete { id: i64 },
    /// Today's progress, weekly completion rate and overdue count
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// List open tasks past their due date
    Overdue {
        #[arg(long)]
        json: bool,
    },
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage task templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
}

#[derive(Subcommand)]
pub enum CategoryCommands {
    /// Add a category
    Add {
        name: String,
        /// Display color
        #[arg(long, default_value = "#6366f1")]
        color: String,
    },
    /// List categories with their task counts
    List {
        #[arg(long)]
        json: bool,
    },
    /// Rename or recolor a category
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a category (its tasks are kept)
    Delete { id: i64 },
    /// Recompute task counts from the stored tasks
    Recount,
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Add a template
    Add {
        /// Template name
        name: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<i64>,
        /// Default due date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        tags: Option<String>,
    },
    /// List templates, newest first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Change a template's name or defaults
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<i64>,
        /// Default due date (YYYY-MM-DD or RFC 3339)
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,
        /// Remove the default due date
        #[arg(long)]
        clear_due: bool,
        #[arg(long)]
        tags: Option<String>,
    },
    /// Delete a template
    Delete { id: i64 },
    /// Create a task from a template; flags override the template's values
    Use {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<i64>,
        #[arg(long)]
        due: Option<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    StoreError(#[from] StoreError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to encode JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Dispatch one command against the stores
pub fn run(command: Commands, stores: &Stores, config: &Config) -> Result<(), CliError> {
    let date_format = config.display.date_format.as_str();
    match command {
        Commands::Add {
            title,
            category,
            priority,
            description,
            due,
            tags,
        } => {
            let input = NewTask {
                title,
                description: description.unwrap_or_default(),
                priority,
                category_id: category,
                due_date: parse_optional_due(due)?,
                tags,
            };
            handle_add_task(input, stores)
        }
        Commands::List {
            category,
            priority,
            search,
            json,
        } => {
            let filter = TaskFilter {
                category_id: category,
                priority,
                search,
            };
            handle_list(&filter, json, stores, date_format)
        }
        Commands::Show { id, json } => {
            let task = stores.tasks.get_by_id(id)?;
            if json {
                print_json(&task)
            } else {
                let categories = stores.categories.get_all();
                println!("{}", format_task_line(&task, &categories, date_format));
                if !task.description.is_empty() {
                    println!("    {}", task.description);
                }
                Ok(())
            }
        }
        Commands::Edit {
            id,
            title,
            description,
            priority,
            category,
            due,
            clear_due,
            tags,
        } => {
            let due_date = if clear_due {
                Some(None)
            } else {
                parse_optional_due(due)?.map(Some)
            };
            let patch = TaskPatch {
                title,
                description,
                priority,
                category_id: category,
                due_date,
                completed: None,
                tags: tags.map(Some),
            };
            let task = stores.tasks.update(id, patch)?;
            println!("Task {} updated", task.id);
            Ok(())
        }
        Commands::Toggle { id } => {
            let task = stores.tasks.toggle_complete(id)?;
            if task.completed {
                println!("Task {} completed", task.id);
            } else {
                println!("Task {} reopened", task.id);
            }
            Ok(())
        }
        Commands::Delete { id } => {
            stores.tasks.delete(id)?;
            println!("Task {} deleted", id);
            Ok(())
        }
        Commands::Stats { json } => handle_stats(json, stores),
        Commands::Overdue { json } => {
            let overdue = stores.tasks.try_overdue_tasks()?;
            if json {
                return print_json(&overdue);
            }
            if overdue.is_empty() {
                println!("No overdue tasks");
            }
            let categories = stores.categories.get_all();
            for task in &overdue {
                println!("{}", format_task_line(task, &categories, date_format));
            }
            Ok(())
        }
        Commands::Category { command } => handle_category(command, stores),
        Commands::Template { command } => handle_template(command, stores, date_format),
    }
}

fn parse_optional_due(due: Option<String>) -> Result<Option<DateTime<Utc>>, CliError> {
    due.map(|d| parse_due_date(&d).map_err(CliError::DateParseError))
        .transpose()
}

/// Handle the add command
pub fn handle_add_task(input: NewTask, stores: &Stores) -> Result<(), CliError> {
    let task = stores.tasks.create(input)?;
    println!("Task created successfully (ID: {})", task.id);
    Ok(())
}

/// Handle the list command: open tasks first, then completed ones
pub fn handle_list(
    filter: &TaskFilter,
    json: bool,
    stores: &Stores,
    date_format: &str,
) -> Result<(), CliError> {
    // The CLI reports backend failures instead of printing an empty list
    let tasks = stores.tasks.try_get_all(Some(filter))?;
    if json {
        return print_json(&tasks);
    }
    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    let categories = stores.categories.get_all();
    let (active, completed) = partition_by_completion(tasks);
    for task in &active {
        println!("{}", format_task_line(task, &categories, date_format));
    }
    if !completed.is_empty() {
        println!("Completed ({})", completed.len());
        for task in &completed {
            println!("{}", format_task_line(task, &categories, date_format));
        }
    }
    Ok(())
}

/// Handle the stats command
pub fn handle_stats(json: bool, stores: &Stores) -> Result<(), CliError> {
    let stats = stores.tasks.try_dashboard()?;
    if json {
        return print_json(&stats);
    }
    println!(
        "Today's progress: {}/{} ({}%)",
        stats.todays_progress.completed,
        stats.todays_progress.total,
        stats.todays_progress.percentage()
    );
    println!("Weekly completion rate: {}%", stats.weekly_completion_rate);
    println!("Overdue tasks: {}", stats.overdue_count);
    Ok(())
}

fn handle_category(command: CategoryCommands, stores: &Stores) -> Result<(), CliError> {
    match command {
        CategoryCommands::Add { name, color } => {
            let category = stores.categories.create(NewCategory::new(name, color))?;
            println!("Category created successfully (ID: {})", category.id);
        }
        CategoryCommands::List { json } => {
            let categories = stores.categories.try_get_all()?;
            if json {
                return print_json(&categories);
            }
            if categories.is_empty() {
                println!("No categories");
            }
            for category in &categories {
                println!("{}", format_category_line(category));
            }
        }
        CategoryCommands::Edit { id, name, color } => {
            let category = stores
                .categories
                .update(id, CategoryPatch { name, color })?;
            println!("Category {} updated", category.id);
        }
        CategoryCommands::Delete { id } => {
            stores.categories.delete(id)?;
            println!("Category {} deleted", id);
        }
        CategoryCommands::Recount => {
            stores.tasks.recount_categories()?;
            println!("Task counts recomputed");
        }
    }
    Ok(())
}

fn handle_template(
    command: TemplateCommands,
    stores: &Stores,
    date_format: &str,
) -> Result<(), CliError> {
    match command {
        TemplateCommands::Add {
            name,
            title,
            description,
            priority,
            category,
            due,
            tags,
        } => {
            let template = stores.templates.create(NewTemplate {
                name,
                title,
                description,
                priority,
                category_id: category,
                due_date: parse_optional_due(due)?,
                tags,
            })?;
            println!("Template created successfully (ID: {})", template.id);
        }
        TemplateCommands::List { json } => {
            let templates = stores.templates.try_get_all()?;
            if json {
                return print_json(&templates);
            }
            if templates.is_empty() {
                println!("No templates");
            }
            for template in &templates {
                let title = template.title.as_deref().unwrap_or("-");
                let priority = template.priority.map(|p| p.as_str()).unwrap_or("-");
                println!("#{} {}: {} ({})", template.id, template.name, title, priority);
            }
        }
        TemplateCommands::Edit {
            id,
            name,
            title,
            description,
            priority,
            category,
            due,
            clear_due,
            tags,
        } => {
            let due_date = if clear_due {
                Some(None)
            } else {
                parse_optional_due(due)?.map(Some)
            };
            let template = stores.templates.update(
                id,
                TemplatePatch {
                    name,
                    title: title.map(Some),
                    description: description.map(Some),
                    priority: priority.map(Some),
                    category_id: category.map(Some),
                    due_date,
                    tags: tags.map(Some),
                },
            )?;
            println!("Template {} updated", template.id);
        }
        TemplateCommands::Delete { id } => {
            stores.templates.delete(id)?;
            println!("Template {} deleted", id);
        }
        TemplateCommands::Use {
            id,
            title,
            priority,
            category,
            due,
        } => {
            let mut draft = stores.templates.get_by_id(id)?.initial_values();
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(priority) = priority {
                draft.priority = priority;
            }
            if category.is_some() {
                draft.category_id = category;
            }
            if let Some(due) = parse_optional_due(due)? {
                draft.due_date = Some(due);
            }

            let task = stores.tasks.create(draft.into_new_task()?)?;
            let categories = stores.categories.get_all();
            println!("Task created from template (ID: {})", task.id);
            println!("{}", format_task_line(&task, &categories, date_format));
        }
    }
    Ok(())
}

/// One-line rendering: `[x] #3 Buy milk (low, Groceries) due 2026-10-19 [home]`
pub fn format_task_line(task: &Task, categories: &[Category], date_format: &str) -> String {
    let mut line = format!(
        "[{}] #{} {} ({}, {})",
        if task.completed { "x" } else { " " },
        task.id,
        task.title,
        task.priority,
        category_name_or_default(categories, task.category_id)
    );
    if let Some(due) = task.due_date {
        line.push_str(" due ");
        let mark = line.len();
        if write!(line, "{}", due.with_timezone(&Local).format(date_format)).is_err() {
            line.truncate(mark);
            line.push_str(&due.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        if task.is_overdue(Utc::now()) {
            line.push_str(" (overdue)");
        }
    }
    let tags = task.tag_list();
    if !tags.is_empty() {
        line.push(' ');
        line.push_str(&format_tags_brackets(&tags));
    }
    line
}

fn format_category_line(category: &Category) -> String {
    format!(
        "#{} {} {} ({} tasks)",
        category.id, category.name, category.color, category.task_count
    )
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
