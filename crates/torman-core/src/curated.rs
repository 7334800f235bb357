//! Curated data about tor's configuration options.
//!
//! The manual text itself never carries summaries or importance flags; both
//! come from hand-maintained tables. They are modeled as immutable lookup
//! values passed into the components that need them, with built-in defaults,
//! so tests can substitute their own tables.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

/// High-priority options surfaced first by interactive consumers.
const IMPORTANT_OPTIONS: &[&str] = &[
    "AccountingMax",
    "BandwidthBurst",
    "BandwidthRate",
    "Bridge",
    "ContactInfo",
    "ControlPort",
    "CookieAuthentication",
    "DataDirectory",
    "DirPort",
    "ExitPolicy",
    "ExitRelay",
    "HashedControlPassword",
    "HiddenServiceDir",
    "HiddenServicePort",
    "Log",
    "Nickname",
    "ORPort",
    "RelayBandwidthBurst",
    "RelayBandwidthRate",
    "RunAsDaemon",
    "SocksPort",
    "UseBridges",
];

const SUMMARIES: &[(&str, &str)] = &[
    ("BandwidthRate", "Average bandwidth usage limit"),
    ("BandwidthBurst", "Maximum bandwidth usage limit"),
    (
        "MaxAdvertisedBandwidth",
        "Limit for the bandwidth we advertise as being available for relaying",
    ),
    ("Bridge", "Available bridges"),
    ("ControlPort", "Port providing access to tor controllers"),
    (
        "CookieAuthentication",
        "If set, authenticates controllers via a cookie",
    ),
    (
        "HashedControlPassword",
        "Hash of the password for authenticating to the control port",
    ),
    ("DataDirectory", "Location for storing runtime data"),
    ("ExitPolicy", "Traffic destinations that can exit through us"),
    ("Log", "Runtime logging location and method"),
    ("Nickname", "Identifier for our relay"),
    ("ORPort", "Port used to accept relay traffic"),
    ("RunAsDaemon", "Toggles if tor runs as a daemonized process"),
    ("SocksPort", "Port for socks proxy connections"),
    ("UseBridges", "Make connections through bridges"),
];

static BUILTIN_IMPORTANCE: Lazy<Importance> = Lazy::new(Importance::builtin);

/// Allow-list of option names flagged as high-priority for display.
///
/// Membership tests are case-insensitive.
#[derive(Debug, Clone)]
pub struct Importance {
    names: HashSet<String>,
}

impl Importance {
    /// The built-in curated allow-list.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(IMPORTANT_OPTIONS.iter().copied())
    }

    /// An allow-list from caller-supplied names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Whether the named option is in the allow-list, ignoring case.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }
}

impl Default for Importance {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Curated one-line summaries keyed by option name, case-insensitively.
#[derive(Debug, Clone)]
pub struct Summaries {
    entries: HashMap<String, String>,
}

impl Summaries {
    /// The built-in curated summary table.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(SUMMARIES.iter().copied())
    }

    /// An empty table; parsed options keep empty summaries.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A table from caller-supplied `(name, summary)` pairs.
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, summary)| (name.as_ref().to_lowercase(), summary.into()))
                .collect(),
        }
    }

    /// Summary for the named option, if curated.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_lowercase()).map(String::as_str)
    }
}

impl Default for Summaries {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Whether an option is flagged high-priority in the built-in allow-list.
///
/// Case-insensitive, total, no I/O.
#[must_use]
pub fn is_important(name: &str) -> bool {
    BUILTIN_IMPORTANCE.contains(name)
}
