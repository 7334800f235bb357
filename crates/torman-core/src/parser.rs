//! Section-scoped parser for man-rendered manual text.
//!
//! The input grammar is not formally specified and shifts between tor
//! releases, so parsing is tolerant by construction: anything unrecognized
//! degrades to empty fields or is skipped, and [`ManParser::parse`] never
//! fails. Only the upstream step that produces the lines can error, and that
//! is handled in [`crate::bridge`].
//!
//! Segmentation follows the rendered layout: a line with no leading
//! whitespace opens a named section, indented lines are its body, and within
//! keyed sections a line at the body's base indent opens a new entry while
//! deeper lines continue the previous one.

use indexmap::IndexMap;
use tracing::debug;

use crate::curated::Summaries;
use crate::types::{Category, ConfigOption, Manual};

/// Sections matched by exact, case-sensitive title.
const NAME_SECTION: &str = "NAME";
const SYNOPSIS_SECTION: &str = "SYNOPSIS";
const DESCRIPTION_SECTION: &str = "DESCRIPTION";
const COMMANDLINE_SECTION: &str = "COMMAND-LINE OPTIONS";
const SIGNALS_SECTION: &str = "SIGNALS";
const FILES_SECTION: &str = "FILES";

/// Option sections we know not to contain torrc options despite the name.
const NON_CONFIG_OPTION_SECTIONS: &[&str] = &["COMMAND-LINE OPTIONS", "NON-PERSISTENT OPTIONS"];

/// Parser for man-rendered manual text.
///
/// Holds the curated summary table that gets overlaid onto parsed config
/// options; the manual text itself never contains summaries.
pub struct ManParser {
    summaries: Summaries,
}

impl ManParser {
    /// A parser using the built-in curated summaries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            summaries: Summaries::builtin(),
        }
    }

    /// A parser with a caller-supplied summary table.
    #[must_use]
    pub fn with_summaries(summaries: Summaries) -> Self {
        Self { summaries }
    }

    /// Parses man output lines into a [`Manual`].
    ///
    /// Never fails: missing or malformed sections yield empty fields, and
    /// zero lines of input yield the empty manual.
    pub fn parse<I, S>(&self, lines: I) -> Manual
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut manual = Manual::new();

        for (title, body) in split_sections(lines) {
            match title.as_str() {
                NAME_SECTION => manual.name = join_paragraphs(&body),
                SYNOPSIS_SECTION => manual.synopsis = join_paragraphs(&body),
                DESCRIPTION_SECTION => manual.description = join_paragraphs(&body),
                COMMANDLINE_SECTION => {
                    extend_entries(&mut manual.commandline_options, &body, |token| {
                        token.starts_with('-')
                    });
                },
                SIGNALS_SECTION => {
                    extend_entries(&mut manual.signals, &body, |token| {
                        token.starts_with("SIG")
                    });
                },
                FILES_SECTION => {
                    extend_entries(&mut manual.files, &body, is_path_shaped);
                },
                _ => {
                    let category = Category::from_section_title(&title);

                    if category != Category::Unknown {
                        parse_config_options(&mut manual, category, &body);
                    } else if is_uncategorized_option_section(&title) {
                        parse_config_options(&mut manual, Category::Unknown, &body);
                    } else {
                        debug!("Skipping unrecognized manual section '{}'", title);
                    }
                },
            }
        }

        manual.apply_summaries(&self.summaries);
        manual
    }
}

impl Default for ManParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Manual {
    /// Parses a whole rendered man document.
    #[must_use]
    pub fn from_man_output(output: &str) -> Self {
        ManParser::new().parse(output.lines())
    }
}

/// Splits the document into `(section title, body lines)` in document order.
///
/// A section header is any non-blank line with no leading whitespace. Content
/// before the first header (man page banners and the like) is dropped.
fn split_sections<I, S>(lines: I) -> Vec<(String, Vec<String>)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sections: Vec<(String, Vec<String>)> = Vec::new();

    for line in lines {
        let line = line.as_ref().trim_end();

        if !line.is_empty() && !line.starts_with(char::is_whitespace) {
            sections.push((line.trim().to_string(), Vec::new()));
        } else if let Some((_, body)) = sections.last_mut() {
            body.push(line.to_string());
        }
    }

    sections
}

/// Joins wrapped lines with single spaces, preserving blank-line paragraph
/// breaks as a single `\n\n` separator.
fn join_paragraphs(body: &[String]) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in body {
        let stripped = line.trim();

        if stripped.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(stripped);
        }
    }

    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }

    paragraphs.join("\n\n")
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

fn is_path_shaped(token: &str) -> bool {
    token.contains('/') || token.starts_with('@') || token.starts_with('$') || token.starts_with('~')
}

fn is_uncategorized_option_section(title: &str) -> bool {
    let upper = title.to_uppercase();
    upper.ends_with(" OPTIONS") && !NON_CONFIG_OPTION_SECTIONS.contains(&upper.as_str())
}

/// Segments a section body into keyed entries.
///
/// An entry opens at a line sitting at the body's base indent whose leading
/// token matches `is_entry_token`; every deeper line continues the open
/// entry, space-joined. Prose before the first entry is dropped, and blank
/// lines neither open nor close entries.
fn extend_entries<F>(target: &mut IndexMap<String, String>, body: &[String], is_entry_token: F)
where
    F: Fn(&str) -> bool,
{
    let mut base_indent: Option<usize> = None;
    let mut entries: Vec<(String, Vec<String>)> = Vec::new();

    for line in body {
        let stripped = line.trim();

        if stripped.is_empty() {
            continue;
        }

        let indent = indent_of(line);
        let base = *base_indent.get_or_insert(indent);
        let token = stripped.split_whitespace().next().unwrap_or_default();

        if indent <= base && is_entry_token(token) {
            entries.push((stripped.to_string(), Vec::new()));
        } else if let Some((_, description)) = entries.last_mut() {
            description.push(stripped.to_string());
        }
    }

    for (key, description) in entries {
        let _ = target.insert(key, description.join(" "));
    }
}

/// Segments a config section body into option blocks under one category.
///
/// The first line of a block supplies the option name and usage (split at the
/// first whitespace after the name token); deeper lines build the
/// description, with blank lines preserved as paragraph breaks. A leading
/// "The following options…" prose paragraph is dropped.
fn parse_config_options(manual: &mut Manual, category: Category, body: &[String]) {
    let mut base_indent: Option<usize> = None;
    let mut skipping_intro = false;
    let mut current: Option<OptionBlock> = None;

    for line in body {
        let stripped = line.trim();

        if stripped.is_empty() {
            skipping_intro = false;

            if let Some(block) = current.as_mut() {
                block.paragraph_break();
            }

            continue;
        }

        if skipping_intro {
            continue;
        }

        let indent = indent_of(line);
        let base = *base_indent.get_or_insert(indent);

        if current.is_none() && stripped.starts_with("The following options") {
            skipping_intro = true;
            continue;
        }

        if indent <= base && starts_option_block(stripped) {
            if let Some(block) = current.take() {
                manual.insert_config_option(block.finish(category));
            }

            current = Some(OptionBlock::open(stripped));
        } else if let Some(block) = current.as_mut() {
            block.describe(stripped);
        }
    }

    if let Some(block) = current.take() {
        manual.insert_config_option(block.finish(category));
    }
}

/// An option name is a bare word; wrapped prose landing at the base indent
/// is tolerated as continuation instead.
fn starts_option_block(stripped: &str) -> bool {
    stripped
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
}

/// One option block being accumulated.
struct OptionBlock {
    name: String,
    usage: String,
    paragraphs: Vec<String>,
    current: Vec<String>,
}

impl OptionBlock {
    fn open(first_line: &str) -> Self {
        let (name, usage) = match first_line.split_once(char::is_whitespace) {
            Some((name, usage)) => (name.to_string(), usage.trim().to_string()),
            None => (first_line.to_string(), String::new()),
        };

        Self {
            name,
            usage,
            paragraphs: Vec::new(),
            current: Vec::new(),
        }
    }

    fn describe(&mut self, stripped: &str) {
        self.current.push(stripped.to_string());
    }

    fn paragraph_break(&mut self) {
        if !self.current.is_empty() {
            self.paragraphs.push(self.current.join(" "));
            self.current.clear();
        }
    }

    fn finish(mut self, category: Category) -> ConfigOption {
        self.paragraph_break();

        ConfigOption {
            name: self.name,
            category,
            usage: self.usage,
            summary: String::new(),
            description: self.paragraphs.join("\n\n"),
        }
    }
}
