use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    error::{AuditError, Result},
    task::TaskStatus,
};

const MAX_TASK_SECTIONS: usize = 10;
pub const DEFAULT_ICON: &str = ":robot_face:";
const FAILURE_ICON: &str = ":warning:";

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub title: String,
    pub tasks: Vec<TaskOutcome>,
    pub follow_ups: Option<usize>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextObject {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl TextObject {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: "plain_text",
            text: text.into(),
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            kind: "mrkdwn",
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header { text: TextObject },
    Section { text: TextObject },
    Divider,
    Context { elements: Vec<TextObject> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPayload {
    pub text: String,
    pub icon_emoji: String,
    pub blocks: Vec<Block>,
}

fn status_emoji(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Done => ":white_check_mark:",
        TaskStatus::Failed => ":x:",
        TaskStatus::InProgress => ":hourglass_flowing_sand:",
        TaskStatus::Pending => ":white_circle:",
        TaskStatus::Other(_) => ":grey_question:",
    }
}

/// Lays out a run summary as header, summary, divider, at most ten task
/// sections (with an overflow notice), optional follow-up count and a timing
/// footer. The order is fixed; downstream renderers depend on it.
pub fn build_payload(summary: &RunSummary, icon: Option<&str>) -> NotificationPayload {
    let total = summary.tasks.len();
    let done = summary
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .count();
    let failed = summary
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Failed)
        .count();
    let other = total - done - failed;

    let mut blocks = vec![
        Block::Header {
            text: TextObject::plain(summary.title.clone()),
        },
        Block::Section {
            text: TextObject::markdown(format!(
                "*Completed:* {}  *Failed:* {}  *Other:* {}",
                done, failed, other
            )),
        },
        Block::Divider,
    ];

    for task in summary.tasks.iter().take(MAX_TASK_SECTIONS) {
        blocks.push(Block::Section {
            text: TextObject::markdown(format!(
                "{} *{}* {} _{}_",
                status_emoji(&task.status),
                task.id,
                task.title,
                task.status
            )),
        });
    }

    if total > MAX_TASK_SECTIONS {
        blocks.push(Block::Context {
            elements: vec![TextObject::markdown(format!(
                "+{} more",
                total - MAX_TASK_SECTIONS
            ))],
        });
    }

    if let Some(follow_ups) = summary.follow_ups {
        blocks.push(Block::Section {
            text: TextObject::markdown(format!(
                ":clipboard: {} follow-up task(s) created",
                follow_ups
            )),
        });
    }

    let elapsed = Duration::from_secs(summary.elapsed.as_secs());
    blocks.push(Block::Context {
        elements: vec![TextObject::markdown(format!(
            "Finished in {}",
            humantime::format_duration(elapsed)
        ))],
    });

    let icon_emoji = if failed > 0 {
        FAILURE_ICON
    } else {
        icon.unwrap_or(DEFAULT_ICON)
    };

    NotificationPayload {
        text: format!("{}: {}/{} tasks completed", summary.title, done, total),
        icon_emoji: icon_emoji.to_string(),
        blocks,
    }
}

pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            url: url.to_string(),
            client: builder.build()?,
        })
    }

    /// Posts the payload. Delivery problems are logged, never returned.
    pub async fn send(&self, payload: &NotificationPayload) -> bool {
        match self.deliver(payload).await {
            Ok(()) => {
                info!("Notification delivered");
                true
            }
            Err(e) => {
                warn!("Failed to deliver notification: {}", e);
                false
            }
        }
    }

    /// Like `send`, but a failed delivery is an error for the caller.
    pub async fn send_required(&self, payload: &NotificationPayload) -> Result<()> {
        if self.send(payload).await {
            Ok(())
        } else {
            Err(AuditError::Notify(format!(
                "notification to {} was not delivered",
                self.url
            )))
        }
    }

    async fn deliver(&self, payload: &NotificationPayload) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        if !response.status().is_success() {
            return Err(AuditError::Notify(format!(
                "webhook responded with {}",
                response.status()
            )));
        }

        Ok(())
    }
}
