//! Structural summaries of markdown documents.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use serde::Serialize;

/// Section key for content that appears before the first heading.
pub const ROOT_SECTION: &str = "Document Root";

/// What the document diff compares for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocSummary {
    /// Heading texts in document order.
    pub headings: Vec<String>,
    /// Link destinations in document order.
    pub links: Vec<String>,
    /// Image destinations in document order.
    pub images: Vec<String>,
    /// Heading text -> words in that heading and the content below it.
    pub section_words: BTreeMap<String, usize>,
}

impl DocSummary {
    /// Summary for a file that does not exist on one side.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read and summarize a file; unreadable files summarize as empty.
    pub fn from_file(path: &Path) -> Self {
        match fs::read(path) {
            Ok(bytes) => summarize(&bytes),
            Err(_) => Self::empty(),
        }
    }
}

/// Summarize markdown source.
///
/// Text and inline code are coalesced into runs between structural events and
/// counted by whitespace-separated words. Heading text counts toward its own
/// section. Code blocks contribute nothing.
pub fn summarize(source: &[u8]) -> DocSummary {
    let text = String::from_utf8_lossy(source);
    let mut builder = SummaryBuilder::new();

    for event in Parser::new(&text) {
        builder.handle(event);
    }

    builder.finish()
}

struct SummaryBuilder {
    summary: DocSummary,
    current: String,
    pending: String,
    heading: Option<String>,
    in_code_block: bool,
}

impl SummaryBuilder {
    fn new() -> Self {
        Self {
            summary: DocSummary::default(),
            current: ROOT_SECTION.to_string(),
            pending: String::new(),
            heading: None,
            in_code_block: false,
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Text(text) | Event::Code(text) => {
                if self.in_code_block {
                    return;
                }
                if let Some(heading) = self.heading.as_mut() {
                    heading.push_str(&text);
                }
                self.pending.push_str(&text);
            }
            Event::SoftBreak | Event::HardBreak => {
                if !self.in_code_block {
                    self.pending.push(' ');
                }
            }
            Event::Start(Tag::Heading { .. }) => {
                self.flush();
                self.heading = Some(String::new());
            }
            Event::End(TagEnd::Heading(_)) => {
                let heading = self.heading.take().unwrap_or_default();
                self.summary.headings.push(heading.clone());
                self.current = heading;
                self.flush();
            }
            Event::Start(Tag::CodeBlock(_)) => {
                self.flush();
                self.in_code_block = true;
            }
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                self.flush();
                self.summary.links.push(dest_url.to_string());
            }
            Event::Start(Tag::Image { dest_url, .. }) => {
                self.flush();
                self.summary.images.push(dest_url.to_string());
            }
            _ => self.flush(),
        }
    }

    /// Count the pending run into the current section.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        // Inside a heading the run belongs to the heading's own section,
        // which only becomes current at the end tag.
        if self.heading.is_some() {
            return;
        }
        let words = self.pending.split_whitespace().count();
        self.pending.clear();
        if words > 0 {
            *self
                .summary
                .section_words
                .entry(self.current.clone())
                .or_insert(0) += words;
        }
    }

    fn finish(mut self) -> DocSummary {
        self.flush();
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_section_and_headings() {
        let doc = "one two three\n\n# Intro\n\nfour five\n\n## Usage\n\nsix\n";
        let summary = summarize(doc.as_bytes());

        assert_eq!(summary.headings, vec!["Intro", "Usage"]);
        assert_eq!(summary.section_words.get(ROOT_SECTION), Some(&3));
        // heading word plus body
        assert_eq!(summary.section_words.get("Intro"), Some(&3));
        assert_eq!(summary.section_words.get("Usage"), Some(&2));
    }

    #[test]
    fn test_links_and_images() {
        let doc = "See [docs](https://example.com/docs) and ![logo](img/logo.png).\n";
        let summary = summarize(doc.as_bytes());

        assert_eq!(summary.links, vec!["https://example.com/docs"]);
        assert_eq!(summary.images, vec!["img/logo.png"]);
    }

    #[test]
    fn test_code_blocks_not_counted() {
        let doc = "# Build\n\nRun this:\n\n```sh\ncargo build --release\n```\n";
        let summary = summarize(doc.as_bytes());

        assert_eq!(summary.section_words.get("Build"), Some(&3));
    }

    #[test]
    fn test_inline_code_in_heading() {
        let doc = "# The `run` command\n\nbody\n";
        let summary = summarize(doc.as_bytes());

        assert_eq!(summary.headings, vec!["The run command"]);
        assert_eq!(summary.section_words.get("The run command"), Some(&4));
    }

    #[test]
    fn test_repeated_heading_accumulates() {
        let doc = "# Notes\n\na b\n\n# Other\n\nc\n\n# Notes\n\nd e f\n";
        let summary = summarize(doc.as_bytes());

        assert_eq!(summary.headings, vec!["Notes", "Other", "Notes"]);
        // two heading words plus five body words
        assert_eq!(summary.section_words.get("Notes"), Some(&7));
        assert_eq!(summary.section_words.get("Other"), Some(&2));
    }

    #[test]
    fn test_soft_break_separates_words() {
        let doc = "alpha\nbeta\n";
        let summary = summarize(doc.as_bytes());
        assert_eq!(summary.section_words.get(ROOT_SECTION), Some(&2));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let summary = DocSummary::from_file(Path::new("/nonexistent/README.md"));
        assert_eq!(summary, DocSummary::empty());
    }
}
