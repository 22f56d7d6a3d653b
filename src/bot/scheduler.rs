//! Recurring task runs with fan-out to recipients.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bot::completion::CompletionEngine;
use crate::bot::errors::format_api_error;
use crate::bot::tasks::{Task, Templater};
use crate::bot::telegram::{MessageSender, send_long};
use crate::bot::whitelist::WhitelistStore;
use crate::openai::ApiError;

#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleError {
    InvalidCron { task: String, expr: String, message: String },
    InvalidTime { task: String, time: String },
    NoUpcoming { task: String },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCron { task, expr, message } => {
                write!(f, "task '{}': invalid cron '{}': {}", task, expr, message)
            }
            Self::InvalidTime { task, time } => {
                write!(f, "task '{}': invalid time '{}' (expected HH:MM)", task, time)
            }
            Self::NoUpcoming { task } => write!(f, "task '{}': schedule never fires", task),
        }
    }
}

impl std::error::Error for ScheduleError {}

/// Standard five-field expressions get a leading seconds field.
fn normalize_cron(expr: &str) -> String {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    }
}

#[derive(Debug, Clone)]
pub enum Trigger {
    Cron(Box<Schedule>),
    Daily(NaiveTime),
}

impl Trigger {
    /// Cron wins over time; a task with neither fires daily at midnight.
    pub fn for_task(task: &Task) -> Result<Self, ScheduleError> {
        if let Some(expr) = task.cron() {
            return Schedule::from_str(&normalize_cron(expr))
                .map(|s| Trigger::Cron(Box::new(s)))
                .map_err(|e| ScheduleError::InvalidCron {
                    task: task.name.clone(),
                    expr: expr.to_string(),
                    message: e.to_string(),
                });
        }
        let time = task.time().unwrap_or("00:00");
        NaiveTime::parse_from_str(time, "%H:%M")
            .map(Trigger::Daily)
            .map_err(|_| ScheduleError::InvalidTime {
                task: task.name.clone(),
                time: time.to_string(),
            })
    }

    /// First fire strictly after `after`, in `after`'s zone.
    pub fn next_after(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Trigger::Cron(schedule) => schedule.after(after).next(),
            Trigger::Daily(time) => {
                let tz = after.timezone();
                // Three days covers a skipped local time on a DST switch.
                (0..3).find_map(|offset| {
                    let day = after.date_naive().checked_add_days(Days::new(offset))?;
                    tz.from_local_datetime(&day.and_time(*time))
                        .earliest()
                        .filter(|candidate| candidate > after)
                })
            }
        }
    }
}

/// What happens when a scheduled completion fails. Recipients are never told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    #[default]
    LogOnly,
    NotifyChat(i64),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: Vec<i64>,
    pub failed: Vec<i64>,
}

pub struct Scheduler {
    engine: Arc<CompletionEngine>,
    templater: Arc<Templater>,
    sender: Arc<dyn MessageSender>,
    whitelist: Arc<dyn WhitelistStore>,
    pinned_chat: Option<i64>,
    policy: FailurePolicy,
    timezone: Tz,
    timeout: Duration,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<CompletionEngine>,
        templater: Arc<Templater>,
        sender: Arc<dyn MessageSender>,
        whitelist: Arc<dyn WhitelistStore>,
        pinned_chat: Option<i64>,
        policy: FailurePolicy,
        timezone: Tz,
        timeout: Duration,
    ) -> Self {
        Self {
            engine,
            templater,
            sender,
            whitelist,
            pinned_chat,
            policy,
            timezone,
            timeout,
        }
    }

    /// The pinned chat if set, else everyone on the whitelist.
    pub fn recipients(&self) -> Vec<i64> {
        if let Some(chat) = self.pinned_chat {
            return vec![chat];
        }
        self.whitelist.load().unwrap_or_else(|e| {
            error!("❌ Cannot load whitelist: {e}");
            Vec::new()
        })
    }

    /// Sends `text` to every recipient. A failed recipient is logged and
    /// skipped.
    pub async fn broadcast(&self, text: &str) -> FanOut {
        let mut out = FanOut::default();
        for chat_id in self.recipients() {
            match send_long(self.sender.as_ref(), chat_id, text).await {
                Ok(()) => out.delivered.push(chat_id),
                Err(e) => {
                    warn!("⚠️ Delivery to {chat_id} failed: {e}");
                    out.failed.push(chat_id);
                }
            }
        }
        out
    }

    /// One run: resolve model, fill template, complete, fan out.
    ///
    /// An empty completion is not sent. A completion error is returned after
    /// the failure policy has been applied.
    pub async fn run_task(&self, task: &Task) -> Result<FanOut, ApiError> {
        let current = self.engine.settings().current_model();
        let model = task.effective_model(&current).to_string();
        let prompt = self.templater.apply(&task.prompt, &model);
        info!("⏰ Running task '{}' with {model}", task.name);

        let text = match self.engine.system_completion(&prompt, &model, self.timeout).await {
            Ok(text) => text,
            Err(e) => {
                error!("❌ Task '{}' failed: {e}", task.name);
                if let FailurePolicy::NotifyChat(chat_id) = self.policy {
                    let notice = format!("❌ Task '{}' failed\n{}", task.name, format_api_error(&e, &model));
                    if let Err(send_err) = send_long(self.sender.as_ref(), chat_id, &notice).await {
                        warn!("⚠️ Cannot notify {chat_id}: {send_err}");
                    }
                }
                return Err(e);
            }
        };

        if text.is_empty() {
            warn!("⚠️ Task '{}' produced no text, nothing sent", task.name);
            return Ok(FanOut::default());
        }

        let out = self.broadcast(&text).await;
        info!(
            "📤 Task '{}' delivered to {} chat(s), {} failed",
            task.name,
            out.delivered.len(),
            out.failed.len()
        );
        Ok(out)
    }

    /// Starts one background loop per task. Tasks whose trigger does not parse
    /// are reported and skipped; the rest still run.
    pub fn schedule(self: &Arc<Self>, tasks: &[Task]) -> (Vec<JoinHandle<()>>, Vec<ScheduleError>) {
        let mut handles = Vec::new();
        let mut errors = Vec::new();

        for task in tasks {
            let trigger = match Trigger::for_task(task) {
                Ok(trigger) => trigger,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let now = Utc::now().with_timezone(&self.timezone);
            let Some(first) = trigger.next_after(&now) else {
                errors.push(ScheduleError::NoUpcoming { task: task.name.clone() });
                continue;
            };
            info!("📅 Task '{}' scheduled, first run at {first}", task.name);

            let scheduler = Arc::clone(self);
            let task = task.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_loop(task, trigger).await;
            }));
        }
        (handles, errors)
    }

    async fn run_loop(&self, task: Task, trigger: Trigger) {
        loop {
            let now = Utc::now().with_timezone(&self.timezone);
            let Some(next) = trigger.next_after(&now) else {
                warn!("Task '{}' has no further runs", task.name);
                return;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            // Errors are already logged and routed by run_task.
            let _ = self.run_task(&task).await;
        }
    }
}
