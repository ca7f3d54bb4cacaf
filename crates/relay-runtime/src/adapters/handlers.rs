//! Local event handlers registered with the router's pipeline.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use shared_types::Event;
use tracing::{debug, info};
use vr_03_routing::{EventHandler, HandlerError, HandlerVerdict};

/// Logs every accepted event at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventHandler;

impl EventHandler for LogEventHandler {
    fn name(&self) -> &str {
        "log-event"
    }

    fn handle(&self, event: &Event) -> Result<HandlerVerdict, HandlerError> {
        info!(
            ivorn = %event.ivorn(),
            role = %event.role(),
            source = %event.origin(),
            bytes = event.payload().len(),
            "event received"
        );
        Ok(HandlerVerdict::Accept)
    }
}

/// Writes each accepted event's raw payload into a directory.
///
/// The file name is the sanitised ivorn. Existing files are never
/// overwritten; `_` is appended until the name is free.
#[derive(Debug, Clone)]
pub struct EventWriter {
    directory: PathBuf,
}

impl EventWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn write(&self, event: &Event) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;

        let mut name = sanitise_filename(event.ivorn().as_str());
        if name.is_empty() {
            name.push('_');
        }
        loop {
            let path = self.directory.join(&name);
            // create_new fails instead of clobbering, even under a race.
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(event.payload().as_bytes())?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => name.push('_'),
                Err(e) => return Err(e),
            }
        }
    }
}

impl EventHandler for EventWriter {
    fn name(&self) -> &str {
        "save-event"
    }

    fn handle(&self, event: &Event) -> Result<HandlerVerdict, HandlerError> {
        let path = self.write(event)?;
        debug!(ivorn = %event.ivorn(), path = %path.display(), "event written");
        Ok(HandlerVerdict::Accept)
    }
}

/// Turn an ivorn into a safe file name.
///
/// Drops one leading `.`, maps `/` and `\` to `_`, then keeps only ASCII
/// letters, digits, `_` and `.`.
pub fn sanitise_filename(input: &str) -> String {
    let input = input.strip_prefix('.').unwrap_or(input);
    input
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}
