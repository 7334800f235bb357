//! Persistence for [`Manual`] values.
//!
//! Two interchangeable backends behind one `save`/`load` pair, selected by
//! file extension: a `.sqlite` destination uses the relational backend in
//! [`crate::database`], anything else uses the flat key-value text format
//! described below. Both obey the same round-trip law: loading a saved manual
//! yields an equal value, mapping order included.
//!
//! The flat format is one fact per line, `tor.<dotted-key> <value>`:
//!
//! ```text
//! tor.name tor - The second-generation onion router
//! tor.commandline_options.-f\sFILE Specify a new configuration file.
//! tor.signals.SIGHUP Reload configuration.
//! tor.files.@CONFDIR@/torrc The configuration file.
//! tor.config_options.BandwidthRate A token bucket limits...
//! tor.config_options.BandwidthRate.category General
//! tor.config_options.BandwidthRate.usage N bytes|KBytes
//! tor.config_options.BandwidthRate.summary Average bandwidth usage limit
//! ```
//!
//! Values are single lines: `\` is escaped as `\\` and line breaks as
//! `\n`/`\r`. Key components carry arbitrary text too (`-h, -help`,
//! `DataDirectory/state`), so they additionally escape the space that ends
//! the key as `\s` and the dot that separates key segments as `\d`. Both are
//! reversed exactly on load. Unrecognized `tor.*` keys are ignored so newer
//! files load on older code; any other non-blank line is corruption — the
//! format has no comment syntax.

use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::database;
use crate::error::{Error, Result};
use crate::types::{Category, ConfigOption, Manual};

/// Saves a manual to the given path, picking the backend from the extension.
///
/// The write is atomic from the caller's point of view: content goes to a
/// temporary file in the destination directory and is renamed into place, so
/// a failed save leaves any previous content untouched.
pub fn save(manual: &Manual, path: &Path) -> Result<()> {
    if is_database_path(path) {
        database::save_to_database(manual, path)
    } else {
        write_atomically(path, encode(manual).as_bytes())?;
        debug!("Saved manual to {}", path.display());
        Ok(())
    }
}

/// Loads a manual from the given path, picking the backend from the extension.
pub fn load(path: &Path) -> Result<Manual> {
    if is_database_path(path) {
        database::load_from_database(path)
    } else {
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Storage(format!("Failed to read {}: {e}", path.display())))?;
        decode(&contents)
    }
}

/// Writes `content` to a temporary sibling of `path` and renames it into place.
pub(crate) fn write_atomically(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staging = NamedTempFile::new_in(dir)
        .map_err(|e| Error::Storage(format!("Failed to stage write for {}: {e}", path.display())))?;
    staging
        .write_all(content)
        .map_err(|e| Error::Storage(format!("Failed to write {}: {e}", path.display())))?;
    let _ = staging
        .persist(path)
        .map_err(|e| Error::Storage(format!("Failed to commit {}: {e}", path.display())))?;

    Ok(())
}

fn is_database_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(database::DATABASE_EXTENSION))
}

fn encode(manual: &Manual) -> String {
    let mut out = String::new();

    push_fact(&mut out, "tor.name", &manual.name);
    push_fact(&mut out, "tor.synopsis", &manual.synopsis);
    push_fact(&mut out, "tor.description", &manual.description);

    for (flag, description) in &manual.commandline_options {
        push_fact(
            &mut out,
            &format!("tor.commandline_options.{}", escape_key(flag)),
            description,
        );
    }

    for (name, description) in &manual.signals {
        push_fact(
            &mut out,
            &format!("tor.signals.{}", escape_key(name)),
            description,
        );
    }

    for (path, description) in &manual.files {
        push_fact(
            &mut out,
            &format!("tor.files.{}", escape_key(path)),
            description,
        );
    }

    for (name, option) in &manual.config_options {
        let name = escape_key(name);
        push_fact(
            &mut out,
            &format!("tor.config_options.{name}"),
            &option.description,
        );
        push_fact(
            &mut out,
            &format!("tor.config_options.{name}.category"),
            option.category.as_str(),
        );
        push_fact(
            &mut out,
            &format!("tor.config_options.{name}.usage"),
            &option.usage,
        );
        push_fact(
            &mut out,
            &format!("tor.config_options.{name}.summary"),
            &option.summary,
        );
    }

    out
}

fn push_fact(out: &mut String, key: &str, value: &str) {
    let _ = writeln!(out, "{key} {}", escape(value));
}

fn decode(contents: &str) -> Result<Manual> {
    let mut manual = Manual::new();

    for (lineno, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let (key, raw_value) = line.split_once(' ').unwrap_or((line, ""));

        let Some(field) = key.strip_prefix("tor.") else {
            return Err(Error::Corrupt(format!(
                "unrecognized key '{key}' on line {}",
                lineno + 1
            )));
        };

        let value = unescape(raw_value);

        match field {
            "name" => manual.name = value,
            "synopsis" => manual.synopsis = value,
            "description" => manual.description = value,
            _ => {
                if let Some(flag) = field.strip_prefix("commandline_options.") {
                    let _ = manual.commandline_options.insert(unescape(flag), value);
                } else if let Some(name) = field.strip_prefix("signals.") {
                    let _ = manual.signals.insert(unescape(name), value);
                } else if let Some(path) = field.strip_prefix("files.") {
                    let _ = manual.files.insert(unescape(path), value);
                } else if let Some(rest) = field.strip_prefix("config_options.") {
                    decode_config_option(&mut manual, rest, value);
                } else {
                    debug!("Ignoring unrecognized manual key '{}'", key);
                }
            },
        }
    }

    Ok(manual)
}

// Escaped names contain no literal dots, so the first `.` always separates
// the name from an attribute suffix.
fn decode_config_option(manual: &mut Manual, key: &str, value: String) {
    match key.split_once('.') {
        None => {
            option_entry(manual, &unescape(key)).description = value;
        },
        Some((name, "category")) => {
            option_entry(manual, &unescape(name)).category = Category::from_label(&value);
        },
        Some((name, "usage")) => {
            option_entry(manual, &unescape(name)).usage = value;
        },
        Some((name, "summary")) => {
            option_entry(manual, &unescape(name)).summary = value;
        },
        Some((_, attribute)) => {
            debug!("Ignoring unrecognized config option attribute '{}'", attribute);
        },
    }
}

fn option_entry<'a>(manual: &'a mut Manual, name: &str) -> &'a mut ConfigOption {
    manual
        .config_options
        .entry(name.to_string())
        .or_insert_with(|| ConfigOption::new(name))
}

/// Flattens a value onto a single line. Reversed exactly by [`unescape`].
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}

/// Escapes a key component so it carries no literal space or dot, keeping
/// the key/value split and key segmentation unambiguous. Reversed by
/// [`unescape`].
fn escape_key(component: &str) -> String {
    escape(component).replace(' ', "\\s").replace('.', "\\d")
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('s') => out.push(' '),
            Some('d') => out.push('.'),
            Some('\\') => out.push('\\'),
            // Tolerate unknown escapes rather than dropping content.
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sample_manual() -> Manual {
        let mut manual = Manual::new();
        manual.name = "tor - The second-generation onion router".into();
        manual.synopsis = "tor [OPTION value]...".into();
        manual.description = "First paragraph.\n\nSecond paragraph.".into();

        let _ = manual
            .commandline_options
            .insert("-f FILE".into(), "Specify a new configuration file.".into());
        let _ = manual.commandline_options.insert(
            "-h, -help".into(),
            "Display a short help message and exit.".into(),
        );

        let _ = manual
            .signals
            .insert("SIGHUP".into(), "Reload configuration.".into());
        let _ = manual
            .signals
            .insert("SIGTERM".into(), "Clean up and exit.".into());

        let _ = manual
            .files
            .insert("@CONFDIR@/torrc".into(), "The configuration file.".into());

        let mut option = ConfigOption::new("BandwidthRate");
        option.category = Category::General;
        option.usage = "N bytes|KBytes|MBytes".into();
        option.summary = "Average bandwidth usage limit".into();
        option.description =
            "A token bucket limits usage. \u{2603} unicode.\n\nSecond paragraph.".into();
        manual.insert_config_option(option);

        manual.insert_config_option(ConfigOption::new("SpiffyOption"));
        manual
    }

    #[test]
    fn test_flat_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");
        let manual = sample_manual();

        save(&manual, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(manual, loaded);
    }

    #[test]
    fn test_flat_roundtrip_of_empty_manual() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        save(&Manual::new(), &path).unwrap();
        assert_eq!(Manual::new(), load(&path).unwrap());
    }

    #[test]
    fn test_flat_roundtrip_with_sentinel_like_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        let mut manual = Manual::new();
        // Content that looks like our own escapes must survive unchanged.
        manual.description = "literal \\n stays literal\nwhile this wrapped".into();
        let _ = manual
            .signals
            .insert("SIGUSR1".into(), "backslash \\ and \\\\ pairs".into());

        save(&manual, &path).unwrap();
        assert_eq!(manual, load(&path).unwrap());
    }

    #[test]
    fn test_flat_preserves_config_option_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        let mut manual = Manual::new();
        for name in ["Apple", "Banana", "Cherry"] {
            manual.insert_config_option(ConfigOption::new(name));
        }

        save(&manual, &path).unwrap();
        let loaded = load(&path).unwrap();

        let names: Vec<&str> = loaded.config_options.keys().map(String::as_str).collect();
        assert_eq!(vec!["Apple", "Banana", "Cherry"], names);
        assert_eq!(manual, loaded);
    }

    #[test]
    fn test_unrecognized_keys_are_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        fs::write(
            &path,
            "tor.name tor - The onion router\n\
             tor.shiny_new_field some value\n\
             tor.config_options.SocksPort.color blue\n",
        )
        .unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!("tor - The onion router", loaded.name);

        // An unknown attribute must not conjure up a config option either.
        assert!(loaded.config_options.is_empty());
    }

    #[test]
    fn test_flat_roundtrip_with_whitespace_in_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        let mut manual = Manual::new();
        let _ = manual.commandline_options.insert(
            "-h, -help".into(),
            "Display a short help message and exit.".into(),
        );
        let _ = manual
            .signals
            .insert("SIGUSR1 SIGUSR2".into(), "Dump stats.".into());
        let _ = manual
            .files
            .insert("DataDirectory/stats dir".into(), "Statistics directory.".into());

        save(&manual, &path).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(manual, loaded);
        assert_eq!(
            "Display a short help message and exit.",
            loaded.commandline_options["-h, -help"]
        );
        assert_eq!("Dump stats.", loaded.signals["SIGUSR1 SIGUSR2"]);
        assert_eq!("Statistics directory.", loaded.files["DataDirectory/stats dir"]);
    }

    #[test]
    fn test_flat_roundtrip_with_dotted_option_name() {
        let mut manual = Manual::new();
        let mut option = ConfigOption::new("Experimental.Option v1");
        option.category = Category::Testing;
        option.description = "Name carries a dot and a space.".into();
        manual.insert_config_option(option);

        assert_eq!(manual, decode(&encode(&manual)).unwrap());
    }

    #[test]
    fn test_comment_like_lines_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        // No comment syntax: a remnant of some other file format must not
        // load as an empty manual.
        fs::write(&path, "# leftover header\n").unwrap();

        match load(&path) {
            Err(Error::Corrupt(msg)) => assert!(msg.contains('#')),
            other => panic!("expected corruption error, got {other:?}"),
        }
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manual.cfg");

        fs::write(&path, "this is not a manual cache\n").unwrap();

        match load(&path) {
            Err(Error::Corrupt(msg)) => assert!(msg.contains("this")),
            other => panic!("expected corruption error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let missing = Path::new("/no/such/torman/manual.cfg");

        match load(missing) {
            Err(Error::Storage(msg)) => assert!(msg.contains("/no/such/torman/manual.cfg")),
            other => panic!("expected storage error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_value_lines_decode_to_empty_fields() {
        let manual = decode("tor.name\ntor.synopsis \n").unwrap();
        assert_eq!("", manual.name);
        assert_eq!("", manual.synopsis);
    }

    proptest! {
        #[test]
        fn test_escape_roundtrip(value in r".{0,200}") {
            prop_assert_eq!(&value, &unescape(&escape(&value)));
        }

        #[test]
        fn test_keyed_entries_roundtrip(key in r".{0,40}", value in r".{0,80}") {
            let mut manual = Manual::new();
            let _ = manual.signals.insert(key.clone(), value.clone());
            let _ = manual.files.insert(key.clone(), value.clone());
            let _ = manual.commandline_options.insert(key, value);

            let loaded = decode(&encode(&manual)).unwrap();
            prop_assert_eq!(manual, loaded);
        }

        #[test]
        fn test_scalar_fields_roundtrip(
            name in r".{0,80}",
            synopsis in r".{0,80}",
            description in r"(?s).{0,200}",
        ) {
            let mut manual = Manual::new();
            manual.name = name;
            manual.synopsis = synopsis;
            manual.description = description;

            let loaded = decode(&encode(&manual)).unwrap();
            prop_assert_eq!(manual, loaded);
        }
    }
}
