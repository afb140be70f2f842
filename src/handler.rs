//! Message handling for the extension.
//!
//! The side panel and the page scraper talk to the backend with JSON
//! messages tagged by `type`. Each message is handled by
//! [`handle_message`] against an explicit [`Session`] (the current course)
//! and a set of [`Services`] (config, storage, model). There is no
//! module-level state, so concurrent messages only share what the session
//! guards.
//!
//! # Messages
//!
//! | `type` | Fields | Reply |
//! |--------|--------|-------|
//! | `UI_INIT` | |  `{course}` |
//! | `CLASSROOM_DATA` | `data` (scraped page) or `token` | `{success}` or `{success, classes}` |
//! | `CHAT` | `mode`, `courseId`, `message`, `data` | `{answer, course, sources}` |
//! | `REFRESH_COURSE` | `courseId` | `{success}` |
//!
//! Failures never escape: they are reported as `{error}` replies.

use anyhow::{anyhow, bail, Result};
use classroom_rag_core::context::{
    assemble_context, build_prompt, course_id_from_url, page_chunks, CoursePage, Mode, Source,
};
use classroom_rag_core::models::Chunk;
use classroom_rag_core::retrieve::top_k_by_keyword;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::classroom::{fetch_courses, Course};
use crate::config::Config;
use crate::llm::LanguageModel;
use crate::models::{CourseCache, CourseState};
use crate::storage::KvStore;

/// Message types understood by [`handle_message`].
pub const MESSAGE_TYPES: [&str; 4] = ["UI_INIT", "CLASSROOM_DATA", "CHAT", "REFRESH_COURSE"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    UiInit,
    ClassroomData {
        #[serde(default)]
        data: Option<CoursePage>,
        #[serde(default)]
        token: Option<String>,
    },
    Chat {
        #[serde(default)]
        mode: Mode,
        #[serde(default, rename = "courseId")]
        course_id: Option<String>,
        #[serde(default)]
        message: String,
        #[serde(default)]
        data: Option<CoursePage>,
    },
    RefreshCourse {
        #[serde(default, rename = "courseId")]
        course_id: Option<String>,
    },
}

/// Decode a raw JSON message, distinguishing unknown types from malformed
/// payloads.
pub fn parse_message(raw: Value) -> std::result::Result<Message, String> {
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    if !MESSAGE_TYPES.contains(&kind.as_str()) {
        return Err("Unknown message type".to_string());
    }
    serde_json::from_value(raw).map_err(|e| format!("Invalid {} message: {}", kind, e))
}

/// Reply sent back for every message. `course` is always present (possibly
/// `null`); the other fields only when set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub course: Option<CourseState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<Course>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Reply {
    pub fn ok() -> Self {
        Self {
            success: Some(true),
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Turn an error reply back into an `Err` for callers outside the
    /// message protocol.
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(message) => Err(anyhow!(message)),
            None => Ok(self),
        }
    }
}

/// Per-connection state: the course the user is currently looking at.
#[derive(Debug, Default)]
pub struct Session {
    current: RwLock<Option<CourseState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Option<CourseState> {
        self.current.read().await.clone()
    }

    pub async fn set_current(&self, course: CourseState) {
        *self.current.write().await = Some(course);
    }
}

/// Collaborators needed to answer messages.
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub store: KvStore,
    pub model: Arc<dyn LanguageModel>,
}

/// Handle one message. Never fails: errors become [`Reply::error`].
pub async fn handle_message(session: &Session, services: &Services, message: Message) -> Reply {
    let result = match message {
        Message::UiInit => Ok(Reply {
            course: session.current().await,
            ..Default::default()
        }),
        Message::ClassroomData { data, token } => classroom_data(session, services, data, token).await,
        Message::Chat {
            mode,
            course_id,
            message,
            data,
        } => chat(session, services, mode, course_id, &message, data).await,
        Message::RefreshCourse { course_id } => refresh_course(session, services, course_id).await,
    };

    result.unwrap_or_else(|e| {
        tracing::warn!(error = %format!("{:#}", e), "message handling failed");
        Reply::error(format!("{:#}", e))
    })
}

async fn classroom_data(
    session: &Session,
    services: &Services,
    data: Option<CoursePage>,
    token: Option<String>,
) -> Result<Reply> {
    if let Some(page) = data {
        let Some(course_id) = course_id_from_url(&page.url).map(str::to_string) else {
            tracing::debug!(url = %page.url, "page is not inside a course");
            return Ok(Reply::ok());
        };

        let course = CourseState {
            course_id: course_id.clone(),
            name: page.class_info.name.clone(),
            data: page,
        };
        let cache = build_cache(services, &course);
        store_cache(services, &cache).await?;
        tracing::info!(
            course_id = %course_id,
            assignments = course.data.assignments.len(),
            chunks = cache.chunks.len(),
            "course data received"
        );
        session.set_current(course).await;
        return Ok(Reply::ok());
    }

    if let Some(token) = token {
        let classes = fetch_courses(&services.config.classroom, &token).await?;
        return Ok(Reply {
            classes: Some(classes),
            ..Reply::ok()
        });
    }

    Ok(Reply::ok())
}

async fn chat(
    session: &Session,
    services: &Services,
    mode: Mode,
    course_id: Option<String>,
    message: &str,
    data: Option<CoursePage>,
) -> Result<Reply> {
    let question = message.trim();
    if question.is_empty() {
        bail!("Message must not be empty");
    }

    let current = session.current().await;
    let session_course = current
        .as_ref()
        .filter(|c| course_id.as_deref().map_or(true, |id| id == c.course_id));

    let course_id = course_id
        .or_else(|| {
            data.as_ref()
                .and_then(|p| course_id_from_url(&p.url))
                .map(str::to_string)
        })
        .or_else(|| session_course.map(|c| c.course_id.clone()));

    let cached = match &course_id {
        Some(id) => load_cache(services, id).await?,
        None => None,
    };

    let page = data
        .or_else(|| session_course.map(|c| c.data.clone()))
        .or_else(|| cached.as_ref().map(|c| c.page.clone()));

    let chunks: Vec<Chunk> = match (cached, &page) {
        (Some(cache), Some(p)) if &cache.page == p => cache.chunks,
        (_, Some(p)) => {
            let chunks = page_chunks(
                course_id.as_deref().unwrap_or_default(),
                p,
                &services.config.chunking,
            );
            if let Some(id) = &course_id {
                store_cache(
                    services,
                    &CourseCache {
                        course_id: id.clone(),
                        name: p.class_info.name.clone(),
                        page: p.clone(),
                        chunks: chunks.clone(),
                    },
                )
                .await?;
            }
            chunks
        }
        (_, None) => Vec::new(),
    };

    let retrieval = &services.config.retrieval;
    let hits = top_k_by_keyword(&chunks, question, retrieval.top_k);
    let context = assemble_context(page.as_ref(), &hits, retrieval.context_max_chars);
    let prompt = build_prompt(mode, &context, question);

    tracing::info!(
        course_id = course_id.as_deref().unwrap_or("-"),
        ?mode,
        chunks = chunks.len(),
        hits = hits.len(),
        context_chars = context.len(),
        "answering chat message"
    );

    let answer = services.model.generate(&prompt).await?;

    Ok(Reply {
        course: current,
        answer: Some(answer),
        sources: Some(hits.into_iter().map(Source::from).collect()),
        ..Default::default()
    })
}

async fn refresh_course(
    session: &Session,
    services: &Services,
    course_id: Option<String>,
) -> Result<Reply> {
    let current = session.current().await;
    let Some(course_id) = course_id.or_else(|| current.as_ref().map(|c| c.course_id.clone())) else {
        bail!("No course selected");
    };

    let removed = services.store.remove_course_cache(&course_id).await?;

    let rebuilt = match current.filter(|c| c.course_id == course_id) {
        Some(course) => {
            let cache = build_cache(services, &course);
            store_cache(services, &cache).await?;
            Some(cache.chunks.len())
        }
        None => None,
    };

    tracing::info!(%course_id, removed, ?rebuilt, "course cache refreshed");
    Ok(Reply::ok())
}

fn build_cache(services: &Services, course: &CourseState) -> CourseCache {
    CourseCache {
        course_id: course.course_id.clone(),
        name: course.name.clone(),
        page: course.data.clone(),
        chunks: page_chunks(&course.course_id, &course.data, &services.config.chunking),
    }
}

async fn store_cache(services: &Services, cache: &CourseCache) -> Result<()> {
    services
        .store
        .set_course_cache(&cache.course_id, &serde_json::to_value(cache)?)
        .await
}

/// Read a course cache entry. An entry that no longer decodes is treated
/// as missing.
async fn load_cache(services: &Services, course_id: &str) -> Result<Option<CourseCache>> {
    let Some(raw) = services.store.get_course_cache(course_id).await? else {
        return Ok(None);
    };
    match serde_json::from_value(raw) {
        Ok(cache) => Ok(Some(cache)),
        Err(e) => {
            tracing::warn!(%course_id, error = %e, "ignoring unreadable course cache");
            Ok(None)
        }
    }
}
