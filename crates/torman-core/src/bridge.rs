//! Acquiring fresh man-page text from the outside world.
//!
//! The pipeline is fetch, render, deliver: the manual's asciidoc source is
//! downloaded into a scratch directory, an external renderer turns it into
//! man output, and the result goes to a destination path, an open writer, or
//! both. Network access and rendering sit behind the [`ManualSource`] and
//! [`ManRenderer`] traits so the whole pipeline is testable without a network
//! or an asciidoc install.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::storage::write_atomically;

/// Where the manual's asciidoc source lives upstream.
pub const DEFAULT_MANUAL_URL: &str =
    "https://gitweb.torproject.org/tor.git/plain/doc/tor.1.txt";

/// Fetches the manual's raw asciidoc source.
pub trait ManualSource {
    /// Retrieves the resource at `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Renders asciidoc man-page source into man output.
pub trait ManRenderer {
    /// Whether the rendering toolchain is installed.
    fn is_available(&self) -> bool;

    /// Renders the asciidoc file at `source` and returns the man output.
    fn render(&self, source: &Path) -> Result<Vec<u8>>;
}

/// Destinations and source override for [`download_man_page`].
///
/// At least one of `path` and `file_handle` must be set; both receive the
/// full output when both are present.
#[derive(Default)]
pub struct DownloadRequest<'a> {
    /// File to write the rendered man page to, replaced atomically.
    pub path: Option<&'a Path>,
    /// Open writer to stream the rendered man page into.
    pub file_handle: Option<&'a mut (dyn Write + Send)>,
    /// Override for the upstream source, [`DEFAULT_MANUAL_URL`] otherwise.
    pub url: Option<&'a str>,
}

/// Downloads and renders a fresh copy of the manual.
///
/// Precondition failures are raised before any network or filesystem work
/// starts. Scratch files live in a temporary directory that is removed on
/// every exit path.
pub fn download_man_page(
    mut request: DownloadRequest<'_>,
    source: &dyn ManualSource,
    renderer: &dyn ManRenderer,
) -> Result<()> {
    if request.path.is_none() && request.file_handle.is_none() {
        return Err(Error::Usage(
            "Either the path or file_handle we're saving to must be provided".to_string(),
        ));
    }

    if !renderer.is_available() {
        return Err(Error::RendererUnavailable);
    }

    let staging = tempfile::tempdir()?;
    let asciidoc_path = staging.path().join("tor.1.txt");
    let url = request.url.unwrap_or(DEFAULT_MANUAL_URL);

    let staged = source
        .fetch(url)
        .and_then(|content| fs::write(&asciidoc_path, content).map_err(Error::from));
    if let Err(e) = staged {
        return Err(Error::Download {
            url: url.to_string(),
            dest: asciidoc_path.display().to_string(),
            reason: e.to_string(),
        });
    }
    info!("Downloaded tor's manual source from {}", url);

    let man_output = renderer.render(&asciidoc_path)?;

    if let Some(path) = request.path {
        write_atomically(path, &man_output)?;
        debug!("Wrote rendered man page to {}", path.display());
    }
    if let Some(handle) = request.file_handle.as_mut() {
        handle.write_all(&man_output)?;
        handle.flush()?;
    }

    Ok(())
}

/// Renderer backed by asciidoc's `a2x` command.
///
/// `a2x -f manpage` writes its output next to the input file, dropping the
/// `.txt` suffix; `render` reads that file back.
#[derive(Debug, Clone, Copy, Default)]
pub struct A2xRenderer;

impl ManRenderer for A2xRenderer {
    fn is_available(&self) -> bool {
        executable_in_path("a2x")
    }

    fn render(&self, source: &Path) -> Result<Vec<u8>> {
        let command = format!("a2x -f manpage {}", source.display());
        debug!("Running: {}", command);

        let output = Command::new("a2x")
            .arg("-f")
            .arg("manpage")
            .arg(source)
            .output()
            .map_err(|e| Error::Renderer {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::Renderer { command, reason });
        }

        let rendered = source.with_extension("");
        fs::read(&rendered).map_err(|e| Error::Renderer {
            command,
            reason: format!("no output at {}: {e}", rendered.display()),
        })
    }
}

fn executable_in_path(name: &str) -> bool {
    std::env::var_os("PATH").is_some_and(|paths| {
        std::env::split_paths(&paths).any(|dir| dir.join(name).is_file())
    })
}
