use crate::error::IngestError;
use regex::Regex;

pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Markup and layout cleanup applied before chunking.
///
/// Output is a sequence of paragraphs separated by [`PARAGRAPH_BREAK`], each a
/// single line with collapsed whitespace. The chunker treats the separator as
/// a sentence boundary.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    bullet: Regex,
    heading: Regex,
    bold: Regex,
    bold_underscore: Regex,
    italic: Regex,
    inline_code: Regex,
    whitespace: Regex,
    page_marker_line: Regex,
    page_number_line: Regex,
}

impl TextNormalizer {
    pub fn new() -> Result<Self, IngestError> {
        Ok(Self {
            bullet: Regex::new(r"^\s*[-*+•]\s+")?,
            heading: Regex::new(r"^\s*#+\s*")?,
            bold: Regex::new(r"\*\*(.+?)\*\*")?,
            bold_underscore: Regex::new(r"__(.+?)__")?,
            italic: Regex::new(r"\*([^*\s][^*]*?)\*")?,
            inline_code: Regex::new(r"`([^`]*)`")?,
            whitespace: Regex::new(r"\s+")?,
            page_marker_line: Regex::new(r"(?i)^\s*page\s+\d+(?:\s+of\s+\d+)?\s*$")?,
            page_number_line: Regex::new(r"^\s*\d+\s*$")?,
        })
    }

    /// Cleans plain-text and Markdown corpus documents.
    pub fn normalize(&self, raw: &str) -> String {
        self.paragraphs(raw.lines().map(|line| self.clean_line(line)))
    }

    /// Cleans text pulled out of a PDF: page artifacts go first, then the
    /// generic cleanup.
    pub fn normalize_pdf(&self, raw: &str) -> String {
        // form feeds separate pages in most extractors
        let raw = raw.replace('\u{000c}', "\n\n");
        // artifact-only lines are dropped rather than turned into paragraph breaks
        self.paragraphs(raw.lines().filter_map(|line| {
            if self.page_number_line.is_match(line) || self.page_marker_line.is_match(line) {
                return None;
            }
            let cleaned = self.clean_line(line);
            if cleaned.is_empty() && !line.trim().is_empty() {
                None
            } else {
                Some(cleaned)
            }
        }))
    }

    fn clean_line(&self, line: &str) -> String {
        let line = line.replace('\u{a0}', " ");
        let line = self.bullet.replace(&line, "");
        let line = self.heading.replace(&line, "");
        let line = self.bold.replace_all(&line, "$1");
        let line = self.bold_underscore.replace_all(&line, "$1");
        let line = self.italic.replace_all(&line, "$1");
        let line = self.inline_code.replace_all(&line, "$1");
        self.whitespace.replace_all(&line, " ").trim().to_string()
    }

    fn paragraphs(&self, lines: impl Iterator<Item = String>) -> String {
        let mut paragraphs: Vec<String> = Vec::new();
        let mut current = String::new();

        for line in lines {
            if line.is_empty() {
                if !current.is_empty() {
                    paragraphs.push(std::mem::take(&mut current));
                }
                continue;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&line);
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }

        paragraphs.join(PARAGRAPH_BREAK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> TextNormalizer {
        TextNormalizer::new().expect("patterns should compile")
    }

    #[test]
    fn decoration_is_replaced_by_inner_text() {
        assert_eq!(normalizer().normalize("**bold** and `code`"), "bold and code");
        assert_eq!(normalizer().normalize("an *italic* word"), "an italic word");
        assert_eq!(normalizer().normalize("__strong__ text"), "strong text");
    }

    #[test]
    fn headings_and_bullets_are_stripped_per_line() {
        let input = "# Principles\n\n- first item\n* second item\n  + third";
        assert_eq!(
            normalizer().normalize(input),
            "Principles\n\nfirst item second item third"
        );
    }

    #[test]
    fn blank_line_runs_collapse_to_one_paragraph_break() {
        let input = "One   line\nsame\tparagraph\n\n\n   \n\nNext";
        assert_eq!(normalizer().normalize(input), "One line same paragraph\n\nNext");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(normalizer().normalize(""), "");
        assert_eq!(normalizer().normalize_pdf("\n\n  \n"), "");
    }

    #[test]
    fn pdf_mode_strips_page_artifacts() {
        let normalizer = normalizer();
        assert_eq!(normalizer.normalize_pdf("Page 3 of 10\nHello"), "Hello");
        assert_eq!(
            normalizer.normalize_pdf("Intro text\n12\nmore text\u{000c}Page 2\nNext page"),
            "Intro text more text\n\nNext page"
        );
    }

    #[test]
    fn pdf_mode_keeps_page_references_in_body_text() {
        let sentence = "Refer to page 12 of the handbook for the page 3 diagram.";
        assert_eq!(normalizer().normalize_pdf(sentence), sentence);
        assert_eq!(
            normalizer().normalize_pdf("See Page 4\npage 7 of 9\nfor details"),
            "See Page 4 for details"
        );
    }

    #[test]
    fn corpus_mode_keeps_numbers() {
        assert_eq!(normalizer().normalize("Step\n2\nof the plan"), "Step 2 of the plan");
    }
}
