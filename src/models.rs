//! Application-level data types: the course the session is looking at and
//! the per-course cache record.

use classroom_rag_core::context::CoursePage;
use classroom_rag_core::models::Chunk;
use serde::{Deserialize, Serialize};

/// The course most recently reported by the page scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseState {
    pub course_id: String,
    pub name: Option<String>,
    pub data: CoursePage,
}

/// What is stored under `course:<courseId>`: the last scraped page and
/// the chunk records built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseCache {
    pub course_id: String,
    pub name: Option<String>,
    pub page: CoursePage,
    pub chunks: Vec<Chunk>,
}
