//! Worksheet and answer-sheet publishing.
//!
//! A handler hands over the finished text; the tool renders it, stores it
//! under `{user}/generated/`, makes it public, and returns the one link.

use async_trait::async_trait;
use chrono::{FixedOffset, Utc};
use regex_lite::{Captures, Regex};
use sahayak_core::error::ToolError;
use sahayak_core::storage::{ObjectStore, generated_path};
use sahayak_core::tool::{Tool, ToolContext, ToolResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::info;

/// Headings that open a worksheet section.
pub const SECTION_HEADINGS: [&str; 6] = [
    "Fill in the Blanks",
    "Match the Following",
    "Multiple Choice Questions",
    "Short Answer Type Questions",
    "True or False",
    "Solve These Problems",
];

const MATCH_SECTION: &str = "Match the Following";

/// Turns handler text into a stored document.
pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> &str;
    fn extension(&self) -> &str;
    fn render(&self, title: &str, body: &str) -> Vec<u8>;
}

// --- Super/subscripts ---

static SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\^\{([^}]*)\}|\^([0-9n+\-=()])|_\{([^}]*)\}|_([0-9+\-=()])")
        .expect("valid script pattern")
});

fn superscript(c: char) -> Option<char> {
    Some(match c {
        '0' => '⁰',
        '1' => '¹',
        '2' => '²',
        '3' => '³',
        '4' => '⁴',
        '5' => '⁵',
        '6' => '⁶',
        '7' => '⁷',
        '8' => '⁸',
        '9' => '⁹',
        '+' => '⁺',
        '-' => '⁻',
        '=' => '⁼',
        '(' => '⁽',
        ')' => '⁾',
        'n' => 'ⁿ',
        'i' => 'ⁱ',
        _ => return None,
    })
}

fn subscript(c: char) -> Option<char> {
    Some(match c {
        '0' => '₀',
        '1' => '₁',
        '2' => '₂',
        '3' => '₃',
        '4' => '₄',
        '5' => '₅',
        '6' => '₆',
        '7' => '₇',
        '8' => '₈',
        '9' => '₉',
        '+' => '₊',
        '-' => '₋',
        '=' => '₌',
        '(' => '₍',
        ')' => '₎',
        _ => return None,
    })
}

/// Replace `^x`, `^{..}`, `_x`, `_{..}` with Unicode scripts. Groups with
/// any unmappable character are left as written.
pub fn apply_scripts(text: &str) -> String {
    SCRIPT
        .replace_all(text, |caps: &Captures<'_>| {
            let (inner, map): (&str, fn(char) -> Option<char>) =
                match (caps.get(1).or(caps.get(2)), caps.get(3).or(caps.get(4))) {
                    (Some(m), _) => (m.as_str(), superscript),
                    (None, Some(m)) => (m.as_str(), subscript),
                    (None, None) => return caps[0].to_string(),
                };
            inner
                .chars()
                .map(map)
                .collect::<Option<String>>()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

// --- Plain-text renderer ---

/// `"## 2. Match the following:"` -> `Some("Match the Following")`.
fn section_heading(line: &str) -> Option<&'static str> {
    let cleaned = line
        .trim()
        .trim_start_matches(['#', '*', ' '])
        .trim_end_matches(['*', ':', ' '])
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '.' | ')' | ' '));
    SECTION_HEADINGS
        .iter()
        .find(|h| h.eq_ignore_ascii_case(cleaned))
        .copied()
}

/// Split a Match-the-Following row into its two columns.
fn match_pair(line: &str) -> Option<(String, String)> {
    let line = line.trim().trim_matches('|');
    let (a, b) = line
        .split_once('|')
        .or_else(|| line.split_once('\t'))
        .or_else(|| line.split_once(" - "))?;
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() || a.chars().all(|c| c == '-') {
        return None;
    }
    Some((apply_scripts(a), apply_scripts(b)))
}

fn render_table(rows: &[(String, String)], out: &mut String) {
    let width = |s: &str| s.chars().count();
    let left = rows.iter().map(|(a, _)| width(a)).max().unwrap_or(0).max("Column A".len());
    let right = rows.iter().map(|(_, b)| width(b)).max().unwrap_or(0).max("Column B".len());
    let rule = format!("+-{}-+-{}-+\n", "-".repeat(left), "-".repeat(right));
    let row = |a: &str, b: &str| {
        format!(
            "| {a}{} | {b}{} |\n",
            " ".repeat(left - width(a)),
            " ".repeat(right - width(b))
        )
    };

    out.push_str(&rule);
    out.push_str(&row("Column A", "Column B"));
    out.push_str(&rule);
    for (a, b) in rows {
        out.push_str(&row(a, b));
    }
    out.push_str(&rule);
}

/// Renders worksheets as UTF-8 text with underlined headings.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

impl DocumentRenderer for PlainTextRenderer {
    fn content_type(&self) -> &str {
        "text/plain; charset=utf-8"
    }

    fn extension(&self) -> &str {
        "txt"
    }

    fn render(&self, title: &str, body: &str) -> Vec<u8> {
        let mut out = String::new();
        let title = title.trim();
        if !title.is_empty() {
            out.push_str(title);
            out.push('\n');
            out.push_str(&"=".repeat(title.chars().count()));
            out.push_str("\n\n");
        }

        let mut section: Option<&str> = None;
        let mut pairs: Vec<(String, String)> = Vec::new();

        for line in body.lines() {
            if let Some(heading) = section_heading(line) {
                if !pairs.is_empty() {
                    render_table(&pairs, &mut out);
                    pairs.clear();
                }
                section = Some(heading);
                out.push('\n');
                out.push_str(&heading.to_uppercase());
                out.push('\n');
                out.push_str(&"-".repeat(heading.len()));
                out.push('\n');
                continue;
            }

            if section == Some(MATCH_SECTION)
                && let Some(pair) = match_pair(line)
            {
                pairs.push(pair);
                continue;
            }

            let text = line.trim_end().replace("**", "");
            out.push_str(&apply_scripts(&text));
            out.push('\n');
        }
        if !pairs.is_empty() {
            render_table(&pairs, &mut out);
        }
        out.into_bytes()
    }
}

// --- Publishing tool ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Worksheet,
    Answers,
}

impl DocumentKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Worksheet => "worksheet",
            Self::Answers => "answers",
        }
    }

    fn tool_name(self) -> &'static str {
        match self {
            Self::Worksheet => "publish_worksheet",
            Self::Answers => "publish_answer_sheet",
        }
    }
}

pub struct PublishDocumentTool {
    kind: DocumentKind,
    store: Arc<dyn ObjectStore>,
    renderer: Arc<dyn DocumentRenderer>,
    offset: FixedOffset,
    sequence: AtomicU64,
}

impl PublishDocumentTool {
    pub fn new(
        kind: DocumentKind,
        store: Arc<dyn ObjectStore>,
        renderer: Arc<dyn DocumentRenderer>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            kind,
            store,
            renderer,
            offset,
            sequence: AtomicU64::new(1),
        }
    }

    fn file_name(&self) -> String {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let stamp = Utc::now().with_timezone(&self.offset).format("%Y%m%d_%H%M%S");
        format!("{}_{stamp}_{n}.{}", self.kind.prefix(), self.renderer.extension())
    }

    fn failed(&self, reason: impl std::fmt::Display) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.kind.tool_name().into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Tool for PublishDocumentTool {
    fn name(&self) -> &str {
        self.kind.tool_name()
    }

    fn description(&self) -> &str {
        match self.kind {
            DocumentKind::Worksheet => {
                "Save a finished worksheet as a document and get its download link."
            }
            DocumentKind::Answers => {
                "Save a finished answer sheet as a document and get its download link."
            }
        }
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string", "description": "Document title" },
                "content": { "type": "string", "description": "Full document text" }
            },
            "required": ["content"]
        })
    }

    /// Stored under the caller's own folder; any `user_id` in the arguments is ignored.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let content = arguments["content"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;
        let title = arguments["title"].as_str().unwrap_or("");

        let name = generated_path(&ctx.user_id, &self.file_name());
        let bytes = self.renderer.render(title, content);

        self.store
            .upload(&name, bytes, self.renderer.content_type())
            .await
            .map_err(|e| self.failed(e))?;
        self.store.make_public(&name).await.map_err(|e| self.failed(e))?;

        let link = self.store.public_url(&name);
        info!(user_id = %ctx.user_id, object = %name, "Document published");
        Ok(ToolResult::ok(format!("Download link: {link}"))
            .with_data(serde_json::json!({ "link": link })))
    }
}
