//! Team blackboard: append-only message log with topic indexing.
//!
//! The board is one shared JSON document. Posting is a full load+save round
//! trip through the broker; reads are tolerant and never mutate the store.

use crate::core::broker::DocBroker;
use crate::core::document;
use crate::core::error::OpsboardError;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn level(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Normal => 2,
            Priority::High => 3,
            Priority::Critical => 4,
        }
    }

    pub fn parse(s: &str) -> Result<Self, OpsboardError> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(OpsboardError::InvalidArgument(format!(
                "unknown priority '{}' (expected low|normal|high|critical)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub time: String,
    pub agent: String,
    pub topic: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "default_priority_level")]
    pub priority_level: u8,
    pub message: String,
}

fn default_priority_level() -> u8 {
    Priority::Normal.level()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSummary {
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub last_message: String,
}

/// The persisted board. Every field carries a serde default so files written
/// by older builds keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BlackboardDoc {
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub topics: BTreeMap<String, TopicSummary>,
    /// Opaque pass-through records owned by external posters. Preserved
    /// verbatim across mutations; this subsystem never interprets them.
    #[serde(default)]
    pub announcements: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSummary {
    pub topic: String,
    pub post_count: u64,
    pub agent_count: u64,
    pub icon: String,
    pub color: String,
}

/// Presentation styles for well-known topics; anything else gets the
/// generic fallback.
const TOPIC_STYLES: &[(&str, &str, &str)] = &[
    ("general", "📋", "gray"),
    ("standup", "☀️", "yellow"),
    ("alerts", "🚨", "red"),
    ("incidents", "🔥", "orange"),
    ("deploys", "🚀", "blue"),
    ("wins", "🏆", "green"),
];

const FALLBACK_STYLE: (&str, &str) = ("💬", "slate");

fn topic_style(topic: &str) -> (&'static str, &'static str) {
    TOPIC_STYLES
        .iter()
        .find(|(name, _, _)| *name == topic)
        .map(|(_, icon, color)| (*icon, *color))
        .unwrap_or(FALLBACK_STYLE)
}

/// Post a message at the default `normal` priority.
pub fn post(store: &Store, agent: &str, topic: &str, message: &str) -> Result<Message, OpsboardError> {
    post_with_priority(store, agent, topic, message, Priority::Normal)
}

/// Post a message. Ids are `messages.len() + 1` at append time: monotonic,
/// gap-free, never reused. The topic summary is kept consistent in the same
/// mutation. Save failures propagate so the caller knows the post was lost.
pub fn post_with_priority(
    store: &Store,
    agent: &str,
    topic: &str,
    message: &str,
    priority: Priority,
) -> Result<Message, OpsboardError> {
    for (field, value) in [("agent", agent), ("topic", topic), ("message", message)] {
        if value.trim().is_empty() {
            return Err(OpsboardError::ValidationError(format!(
                "blackboard post requires a non-empty {}",
                field
            )));
        }
    }

    let broker = DocBroker::new(&store.root);
    broker.with_doc(
        &store.blackboard_path(),
        BlackboardDoc::default(),
        "opsboard",
        "blackboard.post",
        |doc: &mut BlackboardDoc| {
            let now = time::now_epoch_z();
            if doc.created.is_empty() {
                doc.created = now.clone();
            }

            let record = Message {
                id: doc.messages.len() as u64 + 1,
                time: now.clone(),
                agent: agent.to_string(),
                topic: topic.to_string(),
                priority,
                priority_level: priority.level(),
                message: message.to_string(),
            };
            doc.messages.push(record.clone());

            let entry = doc
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicSummary {
                    created: now.clone(),
                    message_count: 0,
                    last_message: now.clone(),
                });
            entry.message_count += 1;
            entry.last_message = now;

            Ok(record)
        },
    )
}

/// List the most recent `limit` messages in insertion order, optionally
/// filtered by exact topic and/or a case-insensitive substring searched
/// across message text, agent, and topic. Read-only; a missing or corrupt
/// document reads as an empty board.
pub fn get(
    store: &Store,
    limit: usize,
    topic_filter: Option<&str>,
    search: Option<&str>,
) -> Vec<Message> {
    let doc = document::load_document(&store.blackboard_path(), BlackboardDoc::default())
        .into_inner();
    let needle = search.map(|s| s.to_lowercase());

    let matches: Vec<Message> = doc
        .messages
        .into_iter()
        .filter(|m| topic_filter.is_none_or(|t| m.topic == t))
        .filter(|m| {
            needle.as_ref().is_none_or(|n| {
                m.message.to_lowercase().contains(n)
                    || m.agent.to_lowercase().contains(n)
                    || m.topic.to_lowercase().contains(n)
            })
        })
        .collect();

    // Suffix-take: the last `limit` in chronological order, not a sort.
    let skip = matches.len().saturating_sub(limit);
    matches.into_iter().skip(skip).collect()
}

/// Group messages by topic into per-board summaries with presentation styles.
pub fn boards_summary(store: &Store) -> Vec<BoardSummary> {
    let doc = document::load_document(&store.blackboard_path(), BlackboardDoc::default())
        .into_inner();

    let mut grouped: BTreeMap<String, (u64, BTreeSet<String>)> = BTreeMap::new();
    for m in &doc.messages {
        let entry = grouped.entry(m.topic.clone()).or_default();
        entry.0 += 1;
        entry.1.insert(m.agent.clone());
    }

    grouped
        .into_iter()
        .map(|(topic, (post_count, agents))| {
            let (icon, color) = topic_style(&topic);
            BoardSummary {
                topic,
                post_count,
                agent_count: agents.len() as u64,
                icon: icon.to_string(),
                color: color.to_string(),
            }
        })
        .collect()
}

#[derive(Parser, Debug)]
#[clap(name = "board", about = "Shared team blackboard")]
pub struct BlackboardCli {
    #[clap(subcommand)]
    pub command: BlackboardCommand,
}

#[derive(Subcommand, Debug)]
pub enum BlackboardCommand {
    /// Post a message to the board.
    Post {
        #[clap(long)]
        agent: String,
        #[clap(long)]
        topic: String,
        #[clap(long)]
        message: String,
        #[clap(long, default_value = "normal")]
        priority: String,
    },
    /// List recent messages, newest last.
    List {
        #[clap(long, default_value = "50")]
        limit: usize,
        #[clap(long)]
        topic: Option<String>,
        #[clap(long)]
        search: Option<String>,
    },
    /// Per-topic board summaries.
    Summary,
}

pub fn run_blackboard_cli(store: &Store, cli: BlackboardCli) -> Result<(), OpsboardError> {
    match cli.command {
        BlackboardCommand::Post {
            agent,
            topic,
            message,
            priority,
        } => {
            let priority = Priority::parse(&priority)?;
            let posted = post_with_priority(store, &agent, &topic, &message, priority)?;
            let envelope = time::command_envelope(
                "board.post",
                "ok",
                serde_json::json!({ "message": posted }),
            );
            println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
        }
        BlackboardCommand::List {
            limit,
            topic,
            search,
        } => {
            let messages = get(store, limit, topic.as_deref(), search.as_deref());
            let output = serde_json::json!({
                "count": messages.len(),
                "messages": messages,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
        BlackboardCommand::Summary => {
            let boards = boards_summary(store);
            println!("{}", serde_json::to_string_pretty(&boards).unwrap());
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "blackboard",
        "version": "0.1.0",
        "description": "Append-only team message board with topic indexing",
        "commands": [
            { "name": "post", "description": "Append a message and update its topic summary" },
            { "name": "list", "description": "List recent messages with topic/search filters" },
            { "name": "summary", "description": "Per-topic post and agent counts" }
        ],
        "storage": ["blackboard.json"]
    })
}
