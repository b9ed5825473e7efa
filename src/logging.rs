use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

use crate::platform::{NativePlatform, Platform};

/// Sends formatted log lines to an append-only file, or stdout when no file
/// is configured.
#[derive(Clone)]
pub(crate) struct LogMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogMakeWriter {
    pub(crate) fn stdout() -> Self {
        Self { file: None }
    }

    pub(crate) fn file(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        NativePlatform::restrict_file_permissions(path);
        Ok(Self {
            file: Some(Arc::new(Mutex::new(file))),
        })
    }
}

impl<'a> MakeWriter<'a> for LogMakeWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &self.file {
            Some(file) => file.lock().unwrap_or_else(|e| e.into_inner()).write(buf),
            None => std::io::stdout().write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &self.file {
            Some(file) => file.lock().unwrap_or_else(|e| e.into_inner()).flush(),
            None => std::io::stdout().flush(),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. Calling this twice is harmless; the first subscriber wins.
pub(crate) fn init(log_file: Option<&Path>) -> std::io::Result<()> {
    let writer = match log_file {
        Some(path) => LogMakeWriter::file(path)?,
        None => LogMakeWriter::stdout(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(log_file.is_none())
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_writer_appends_across_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("agent.log");
        let make = LogMakeWriter::file(&path).unwrap();

        make.make_writer().write_all(b"first\n").unwrap();
        let mut second = make.make_writer();
        second.write_all(b"second\n").unwrap();
        second.flush().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn reopening_keeps_existing_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.log");
        std::fs::write(&path, "old\n").unwrap();

        LogMakeWriter::file(&path)
            .unwrap()
            .make_writer()
            .write_all(b"new\n")
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }
}
