//! Prompt context assembly.
//!
//! Turns a scraped classroom page into the pieces the language model sees:
//! a short course listing, chunk records for retrieval, the retrieved
//! excerpts, and finally the prompt text for the selected [`Mode`].

use serde::{Deserialize, Serialize};
use serde_json::{json, Map};

use crate::chunk::make_chunk_objects;
use crate::models::{Chunk, ChunkOptions, ChunkSource};

/// Context used when no page data is available.
pub const NO_CONTEXT: &str = "No course context available.";

/// Maximum assignments and materials listed in the course listing.
const LISTING_LIMIT: usize = 10;

/// Snippet length (chars) reported for each source.
const SNIPPET_CHARS: usize = 220;

/// Data scraped from a classroom page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoursePage {
    pub url: String,
    pub timestamp: Option<String>,
    pub class_info: ClassInfo,
    pub assignments: Vec<Assignment>,
    pub materials: Vec<Material>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassInfo {
    pub name: Option<String>,
}

/// A stream item (assignment, announcement, question) found on the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Assignment {
    pub id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    /// Full text content of the stream item element.
    pub element: Option<String>,
}

impl Assignment {
    /// Body text worth chunking: the description, else the element text.
    pub fn body(&self) -> Option<&str> {
        [self.description.as_deref(), self.element.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

/// A linked Drive or Docs attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub id: String,
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Answer style requested by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Explain,
    Quiz,
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "explain" => Ok(Mode::Explain),
            "quiz" => Ok(Mode::Quiz),
            other => Err(format!("Unknown mode: '{}'. Use explain or quiz.", other)),
        }
    }
}

/// A retrieved chunk summarized for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub snippet: String,
}

impl From<&Chunk> for Source {
    fn from(chunk: &Chunk) -> Self {
        Self {
            title: chunk.title.clone(),
            snippet: chunk.text.chars().take(SNIPPET_CHARS).collect(),
        }
    }
}

/// Extract the course id from a classroom URL: the path segment after
/// `/c/`, up to the next `/` or `?`.
///
/// ```rust
/// use classroom_rag_core::context::course_id_from_url;
///
/// let url = "https://classroom.google.com/u/0/c/NjQ2MjM0/a/123/details";
/// assert_eq!(course_id_from_url(url), Some("NjQ2MjM0"));
/// assert_eq!(course_id_from_url("https://classroom.google.com/h"), None);
/// ```
pub fn course_id_from_url(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("/c/")?;
    let end = rest.find(|c: char| c == '/' || c == '?').unwrap_or(rest.len());
    let id = &rest[..end];
    (!id.is_empty()).then_some(id)
}

/// Summarize a page as a class name plus assignment and material titles.
pub fn course_listing(page: Option<&CoursePage>) -> String {
    let Some(page) = page else {
        return NO_CONTEXT.to_string();
    };

    let mut out = String::new();

    if let Some(name) = page.class_info.name.as_deref().filter(|n| !n.is_empty()) {
        out.push_str(&format!("Class: {}\n\n", name));
    }

    if !page.assignments.is_empty() {
        out.push_str("Assignments:\n");
        for a in page.assignments.iter().take(LISTING_LIMIT) {
            let title = a.title.as_deref().unwrap_or_default();
            match a.date.as_deref().filter(|d| !d.is_empty()) {
                Some(date) => out.push_str(&format!("- {} (Due: {})\n", title, date)),
                None => out.push_str(&format!("- {}\n", title)),
            }
        }
        out.push('\n');
    }

    if !page.materials.is_empty() {
        out.push_str("Materials:\n");
        for m in page.materials.iter().take(LISTING_LIMIT) {
            out.push_str(&format!("- {}\n", m.title.as_deref().unwrap_or_default()));
        }
    }

    out.trim().to_string()
}

/// Chunk every assignment on the page that has body text.
///
/// Each assignment is its own source: `source_id` is the assignment id and
/// the records carry `kind = "assignment"` plus the due date when known.
pub fn page_chunks(course_id: &str, page: &CoursePage, opts: &ChunkOptions) -> Vec<Chunk> {
    page.assignments
        .iter()
        .filter_map(|a| a.body().map(|body| (a, body)))
        .flat_map(|(a, body)| {
            let mut extra_meta = Map::new();
            extra_meta.insert("kind".into(), json!("assignment"));
            if let Some(date) = a.date.as_deref().filter(|d| !d.is_empty()) {
                extra_meta.insert("date".into(), json!(date));
            }
            make_chunk_objects(&ChunkSource {
                course_id: course_id.to_string(),
                source_id: a.id.clone(),
                title: a.title.clone(),
                text: body.to_string(),
                extra_meta,
                chunk_opts: *opts,
            })
        })
        .collect()
}

/// Concatenate retrieved chunks as `[title]` blocks separated by blank
/// lines, stopping before the block that would exceed `max_chars`. The
/// first block is always included.
pub fn chunk_context(chunks: &[&Chunk], max_chars: usize) -> String {
    let mut out = String::new();
    let mut len = 0usize;

    for chunk in chunks {
        let block = format!("[{}]\n{}", chunk.title, chunk.text);
        let block_len = block.chars().count();
        let sep = if out.is_empty() { 0 } else { 2 };
        if !out.is_empty() && len + sep + block_len > max_chars {
            break;
        }
        if sep > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&block);
        len += sep + block_len;
    }

    out
}

/// Full context string: the course listing, followed by any retrieved
/// excerpts.
pub fn assemble_context(page: Option<&CoursePage>, retrieved: &[&Chunk], max_chars: usize) -> String {
    let listing = course_listing(page);
    if retrieved.is_empty() {
        return listing;
    }
    format!(
        "{}\n\nRelevant excerpts:\n{}",
        listing,
        chunk_context(retrieved, max_chars)
    )
}

/// Build the model prompt for `mode`.
pub fn build_prompt(mode: Mode, context: &str, question: &str) -> String {
    match mode {
        Mode::Quiz => format!(
            "Based on the following course context, generate 3-5 practice questions with brief \
answers that would help test understanding of the material.

Context:
{context}

Topic/Question:
{question}

Generate questions in the following format:
1. [Question]
   Answer: [Brief answer]

2. [Question]
   Answer: [Brief answer]

..."
        ),
        Mode::Explain => format!(
            "Context:
{context}

Question:
{question}

Please provide a clear and helpful explanation or answer."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieve::top_k_by_keyword;

    fn sample_page() -> CoursePage {
        serde_json::from_value(json!({
            "url": "https://classroom.google.com/u/0/c/MTIz?cjc=abc",
            "timestamp": "2024-01-01T00:00:00Z",
            "classInfo": { "name": "Biology 101" },
            "assignments": [
                {
                    "id": "a1",
                    "title": "Cell Lab",
                    "date": "Mar 3",
                    "description": "Observe onion cells under the microscope and sketch the cell wall."
                },
                {
                    "id": "a2",
                    "title": "Reading",
                    "element": "Read chapter 4 on photosynthesis."
                },
                { "id": "a3", "title": "Announcement" }
            ],
            "materials": [
                { "id": "material-0", "title": "Lab handout", "url": "https://docs.google.com/x", "type": "document" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_course_id_from_url() {
        assert_eq!(
            course_id_from_url("https://classroom.google.com/c/abc123"),
            Some("abc123")
        );
        assert_eq!(
            course_id_from_url("https://classroom.google.com/u/1/c/abc?x=1"),
            Some("abc")
        );
        assert_eq!(course_id_from_url("https://classroom.google.com/c/"), None);
        assert_eq!(course_id_from_url(""), None);
    }

    #[test]
    fn test_course_listing() {
        let page = sample_page();
        let listing = course_listing(Some(&page));
        assert_eq!(
            listing,
            "Class: Biology 101\n\nAssignments:\n- Cell Lab (Due: Mar 3)\n- Reading\n- Announcement\n\nMaterials:\n- Lab handout"
        );
        assert_eq!(course_listing(None), NO_CONTEXT);
    }

    #[test]
    fn test_course_listing_caps_items() {
        let page = CoursePage {
            assignments: (0..15)
                .map(|i| Assignment {
                    id: format!("a{}", i),
                    title: Some(format!("Task {}", i)),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        let listing = course_listing(Some(&page));
        assert_eq!(listing.lines().filter(|l| l.starts_with("- ")).count(), 10);
    }

    #[test]
    fn test_page_chunks_uses_assignment_bodies() {
        let page = sample_page();
        let chunks = page_chunks("MTIz", &page, &ChunkOptions::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id, "MTIz::a1::0");
        assert_eq!(chunks[0].title, "Cell Lab");
        assert_eq!(chunks[0].extra.get("date"), Some(&json!("Mar 3")));
        assert_eq!(chunks[1].text, "Read chapter 4 on photosynthesis.");
        assert!(chunks[1].extra.get("date").is_none());
    }

    #[test]
    fn test_chunk_context_bounded() {
        let page = sample_page();
        let chunks = page_chunks("MTIz", &page, &ChunkOptions::default());
        let refs: Vec<&Chunk> = chunks.iter().collect();

        let full = chunk_context(&refs, 10_000);
        assert!(full.starts_with("[Cell Lab]\n"));
        assert!(full.contains("\n\n[Reading]\n"));

        let first_only = chunk_context(&refs, 10);
        assert!(first_only.starts_with("[Cell Lab]"));
        assert!(!first_only.contains("[Reading]"));
    }

    #[test]
    fn test_assemble_context_with_retrieval() {
        let page = sample_page();
        let chunks = page_chunks("MTIz", &page, &ChunkOptions::default());
        let hits = top_k_by_keyword(&chunks, "photosynthesis chapter", 5);
        let context = assemble_context(Some(&page), &hits, 4000);
        assert!(context.starts_with("Class: Biology 101"));
        assert!(context.contains("Relevant excerpts:\n[Reading]\nRead chapter 4"));
        assert!(!context.contains("[Cell Lab]"));
    }

    #[test]
    fn test_build_prompt_modes() {
        let explain = build_prompt(Mode::Explain, "CTX", "Why?");
        assert!(explain.starts_with("Context:\nCTX\n\nQuestion:\nWhy?"));
        let quiz = build_prompt(Mode::Quiz, "CTX", "Cells");
        assert!(quiz.contains("Topic/Question:\nCells"));
        assert!(quiz.contains("practice questions"));
    }

    #[test]
    fn test_mode_serde() {
        assert_eq!(serde_json::from_value::<Mode>(json!("quiz")).unwrap(), Mode::Quiz);
        assert_eq!(Mode::default(), Mode::Explain);
        assert_eq!("Quiz".parse::<Mode>().unwrap(), Mode::Quiz);
        assert!("summarize".parse::<Mode>().is_err());
    }

    #[test]
    fn test_source_snippet_truncated() {
        let page = CoursePage {
            assignments: vec![Assignment {
                id: "long".into(),
                title: Some("Long".into()),
                description: Some("w".repeat(500)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let chunks = page_chunks("c", &page, &ChunkOptions::default());
        let source = Source::from(&chunks[0]);
        assert_eq!(source.snippet.chars().count(), 220);
        assert_eq!(source.title, "Long");
    }
}
