//! Core document model for tor's reference manual.
//!
//! A [`Manual`] is produced once — by the parser from live man output, or by
//! the persistence layer from a cached copy — and is immutable afterwards
//! except for the explicit [`Manual::apply_summaries`] merge. All mapping
//! fields preserve document order, and that order is part of a value's
//! identity: two manuals with the same entries in a different order are not
//! equal.

use indexmap::IndexMap;

/// Functional area of a configuration option.
///
/// Closed classification derived from the manual's section headers. Anything
/// the classifier does not recognize is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Category {
    /// Options that apply regardless of the role tor runs in.
    General,
    /// Options useful only for clients.
    Client,
    /// Options for relay operators.
    Relay,
    /// Options for directory authority operators.
    DirectoryAuthority,
    /// Options concerning controller and client authentication.
    Authentication,
    /// Options only used for network testing.
    Testing,
    /// Options outside any recognized section.
    #[default]
    Unknown,
}

impl Category {
    /// Classifies a manual section title, case-insensitively.
    ///
    /// Total function: unrecognized titles map to [`Category::Unknown`].
    #[must_use]
    pub fn from_section_title(title: &str) -> Self {
        match title.trim().to_uppercase().as_str() {
            "GENERAL OPTIONS" => Self::General,
            "CLIENT OPTIONS" => Self::Client,
            "SERVER OPTIONS" | "RELAY OPTIONS" => Self::Relay,
            "DIRECTORY SERVER OPTIONS" | "DIRECTORY AUTHORITY SERVER OPTIONS" => {
                Self::DirectoryAuthority
            },
            "AUTHENTICATION OPTIONS" | "CLIENT AUTHORIZATION OPTIONS" => Self::Authentication,
            "TESTING NETWORK OPTIONS" => Self::Testing,
            _ => Self::Unknown,
        }
    }

    /// Human-readable label, as stored by the flat text backend.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::Client => "Client",
            Self::Relay => "Relay",
            Self::DirectoryAuthority => "Directory Authority",
            Self::Authentication => "Authentication",
            Self::Testing => "Testing",
            Self::Unknown => "Unknown",
        }
    }

    /// Parses a label produced by [`Category::as_str`], case-insensitively.
    ///
    /// Unrecognized labels map to [`Category::Unknown`] so that loading stays
    /// forward-compatible with labels added later.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "GENERAL" => Self::General,
            "CLIENT" => Self::Client,
            "RELAY" => Self::Relay,
            "DIRECTORY AUTHORITY" => Self::DirectoryAuthority,
            "AUTHENTICATION" => Self::Authentication,
            "TESTING" => Self::Testing,
            _ => Self::Unknown,
        }
    }

    /// Stable enumeration code used by the relational backend.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::General => 0,
            Self::Client => 1,
            Self::Relay => 2,
            Self::DirectoryAuthority => 3,
            Self::Authentication => 4,
            Self::Testing => 5,
            Self::Unknown => 6,
        }
    }

    /// Reverses [`Category::code`].
    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::General),
            1 => Some(Self::Client),
            2 => Some(Self::Relay),
            3 => Some(Self::DirectoryAuthority),
            4 => Some(Self::Authentication),
            5 => Some(Self::Testing),
            6 => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One configuration entry within the manual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    /// Option name, case-preserving.
    pub name: String,
    /// Functional area the option was documented under.
    pub category: Category,
    /// Short syntax string following the name, may be empty.
    pub usage: String,
    /// Curated one-line summary; never derived from the manual text itself.
    pub summary: String,
    /// Full prose description. Paragraph breaks are preserved as a single
    /// blank-line separator.
    pub description: String,
}

impl ConfigOption {
    /// Minimal construction: only the name is known.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: Category::Unknown,
            usage: String::new(),
            summary: String::new(),
            description: String::new(),
        }
    }
}

/// The structured document model parsed from tor's reference manual.
///
/// An empty or unparsed manual has every string field empty and every mapping
/// empty — fields are never absent.
#[derive(Debug, Clone, Default)]
pub struct Manual {
    /// Program name and one-line tagline.
    pub name: String,
    /// One-line usage summary.
    pub synopsis: String,
    /// Overall description, paragraph breaks preserved.
    pub description: String,
    /// Command-line flags in document order. A key may be a comma-joined
    /// alias list such as `-h, -help`.
    pub commandline_options: IndexMap<String, String>,
    /// Signals in document order.
    pub signals: IndexMap<String, String>,
    /// Filesystem path patterns in document order.
    pub files: IndexMap<String, String>,
    /// Configuration options in document order, independent of category.
    /// Every value's `name` equals its key.
    pub config_options: IndexMap<String, ConfigOption>,
}

impl Manual {
    /// A manual with every field at its empty default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlays curated summaries onto the config options.
    ///
    /// The manual text never contains summaries; this is the explicit merge
    /// step that injects them from a curated table. Only non-empty table
    /// entries overwrite.
    pub fn apply_summaries(&mut self, summaries: &crate::curated::Summaries) {
        for option in self.config_options.values_mut() {
            if let Some(summary) = summaries.get(&option.name) {
                if !summary.is_empty() {
                    option.summary = summary.to_string();
                }
            }
        }
    }

    /// Inserts a config option, keyed by its name.
    ///
    /// Last write wins on duplicate names, keeping the first occurrence's
    /// position in document order.
    pub fn insert_config_option(&mut self, option: ConfigOption) {
        let _ = self.config_options.insert(option.name.clone(), option);
    }
}

// IndexMap's derived equality ignores order, but document order is
// semantically meaningful here, so compare ordered iteration instead.
impl PartialEq for Manual {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.synopsis == other.synopsis
            && self.description == other.description
            && self
                .commandline_options
                .iter()
                .eq(other.commandline_options.iter())
            && self.signals.iter().eq(other.signals.iter())
            && self.files.iter().eq(other.files.iter())
            && self.config_options.iter().eq(other.config_options.iter())
    }
}

impl Eq for Manual {}
