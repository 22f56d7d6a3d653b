//! Named prompt tasks: loading, lookup, templating and listings.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bot::prompts;
use crate::bot::runtime::RuntimeSettings;

pub const DEFAULT_LUNCH_TIME: &str = "13:00";
pub const DEFAULT_BRIEF_TIME: &str = "20:00";

/// Local file names checked when no explicit source is configured.
const CONVENTIONAL_FILES: [&str; 2] = ["tasks.yml", "tasks.yaml"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl Task {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }

    pub fn with_cron(mut self, cron: impl Into<String>) -> Self {
        self.cron = Some(cron.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn cron(&self) -> Option<&str> {
        non_blank(&self.cron)
    }

    pub fn time(&self) -> Option<&str> {
        non_blank(&self.time)
    }

    /// Per-task override, falling back to `current`.
    pub fn effective_model<'a>(&'a self, current: &'a str) -> &'a str {
        non_blank(&self.model).unwrap_or(current)
    }
}

/// The active task set. Replaced wholesale, never edited in place.
pub struct TaskRegistry {
    tasks: RwLock<Arc<Vec<Task>>>,
}

impl TaskRegistry {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RwLock::new(Arc::new(tasks)),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<Task>> {
        self.tasks.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, tasks: Vec<Task>) {
        *self.tasks.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(tasks);
    }

    /// Exact, case-sensitive match. An empty `name` matches a task whose
    /// name is empty.
    pub fn resolve(&self, name: &str) -> Option<Task> {
        self.snapshot().iter().find(|t| t.name == name).cloned()
    }
}

#[derive(Debug)]
pub enum TaskLoadError {
    ReadFile { path: PathBuf, source: std::io::Error },
    Parse { origin: String, message: String },
}

impl fmt::Display for TaskLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read tasks file '{}': {}", path.display(), source)
            }
            Self::Parse { origin, message } => {
                write!(f, "failed to parse tasks from {}: {}", origin, message)
            }
        }
    }
}

impl std::error::Error for TaskLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::Parse { .. } => None,
        }
    }
}

/// Where tasks may come from, highest precedence first.
#[derive(Debug, Clone)]
pub struct TaskSources {
    pub file: Option<PathBuf>,
    pub json: Option<String>,
    /// Directory searched for the conventional `tasks.yml` / `tasks.yaml`.
    pub search_dir: PathBuf,
    pub lunch_time: String,
    pub brief_time: String,
}

impl Default for TaskSources {
    fn default() -> Self {
        Self {
            file: None,
            json: None,
            search_dir: PathBuf::from("."),
            lunch_time: DEFAULT_LUNCH_TIME.to_string(),
            brief_time: DEFAULT_BRIEF_TIME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTasks {
    pub tasks: Vec<Task>,
    /// Non-empty `base_prompt` from a task file, if any.
    pub base_prompt: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TaskFile {
    List(Vec<Task>),
    Wrapped {
        #[serde(default)]
        base_prompt: String,
        #[serde(default)]
        tasks: Vec<Task>,
    },
}

impl TaskFile {
    fn into_loaded(self) -> LoadedTasks {
        match self {
            TaskFile::List(tasks) => LoadedTasks { tasks, base_prompt: None },
            TaskFile::Wrapped { base_prompt, tasks } => LoadedTasks {
                tasks,
                base_prompt: Some(base_prompt).filter(|p| !p.trim().is_empty()),
            },
        }
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("yml") | Some("yaml")
    )
}

fn read_task_file(path: &Path) -> Result<LoadedTasks, TaskLoadError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| TaskLoadError::ReadFile { path: path.to_path_buf(), source: e })?;
    let origin = path.display().to_string();

    let parsed: TaskFile = if is_yaml(path) {
        serde_yaml_ng::from_str(&data).map_err(|e| TaskLoadError::Parse { origin, message: e.to_string() })?
    } else {
        serde_json::from_str(&data).map_err(|e| TaskLoadError::Parse { origin, message: e.to_string() })?
    };
    Ok(parsed.into_loaded())
}

/// Loads tasks from the first configured source. A source that is chosen but
/// fails to parse is an error; later sources are not consulted.
pub fn load_tasks(sources: &TaskSources) -> Result<LoadedTasks, TaskLoadError> {
    if let Some(path) = &sources.file {
        info!("📂 Loading tasks from {}", path.display());
        return read_task_file(path);
    }

    if let Some(json) = sources.json.as_deref().filter(|j| !j.trim().is_empty()) {
        info!("📂 Loading tasks from TASKS_JSON");
        let parsed: TaskFile = serde_json::from_str(json).map_err(|e| TaskLoadError::Parse {
            origin: "TASKS_JSON".to_string(),
            message: e.to_string(),
        })?;
        return Ok(parsed.into_loaded());
    }

    for name in CONVENTIONAL_FILES {
        let path = sources.search_dir.join(name);
        if path.is_file() {
            info!("📂 Loading tasks from {}", path.display());
            return read_task_file(&path);
        }
    }

    info!("No tasks file found, using default tasks");
    Ok(LoadedTasks {
        tasks: vec![
            Task::new("lunch", prompts::LUNCH_IDEA_PROMPT).at(sources.lunch_time.clone()),
            Task::new("brief", prompts::DAILY_BRIEF_PROMPT).at(sources.brief_time.clone()),
        ],
        base_prompt: None,
    })
}

/// Values substituted into prompt templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub base_prompt: String,
    pub date: String,
    pub model: String,
    pub exchange_api: String,
    pub chart_path: String,
}

/// Literal placeholder substitution. `{base_prompt}` goes first so a base
/// prompt may itself use the other placeholders. Unknown placeholders stay.
pub fn apply_template(raw: &str, vars: &TemplateVars) -> String {
    raw.replace("{base_prompt}", &vars.base_prompt)
        .replace("{date}", &vars.date)
        .replace("{model}", &vars.model)
        .replace("{exchange_api}", &vars.exchange_api)
        .replace("{chart_path}", &vars.chart_path)
}

/// Fills templates from the live runtime settings and process configuration.
pub struct Templater {
    settings: Arc<RuntimeSettings>,
    exchange_api: String,
    chart_path: String,
    timezone: Tz,
}

impl Templater {
    pub fn new(settings: Arc<RuntimeSettings>, exchange_api: String, chart_path: String, timezone: Tz) -> Self {
        Self {
            settings,
            exchange_api,
            chart_path,
            timezone,
        }
    }

    pub fn vars(&self, model: &str) -> TemplateVars {
        TemplateVars {
            base_prompt: self.settings.snapshot().base_prompt.clone(),
            date: Utc::now().with_timezone(&self.timezone).format("%Y-%m-%d").to_string(),
            model: model.to_string(),
            exchange_api: self.exchange_api.clone(),
            chart_path: self.chart_path.clone(),
        }
    }

    pub fn apply(&self, raw: &str, model: &str) -> String {
        apply_template(raw, &self.vars(model))
    }
}

/// One `"<when> - <name>"` line per task. `when` is the cron expression, else
/// the time, else `00:00`; unnamed tasks show as `task N`.
pub fn format_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "no tasks".to_string();
    }
    tasks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let when = t.cron().or(t.time()).unwrap_or("00:00");
            if t.name.is_empty() {
                format!("{when} - task {}", i + 1)
            } else {
                format!("{when} - {}", t.name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_task_names(tasks: &[Task]) -> String {
    let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).filter(|n| !n.is_empty()).collect();
    if names.is_empty() {
        return "no tasks".to_string();
    }
    names.join("\n")
}
