//! Log plumbing: `log` records flow through `tracing-log` into a fmt
//! subscriber whose writer tees every line to stderr and an optional file.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

type LogFile = Arc<Mutex<Option<File>>>;

#[derive(Clone, Default)]
struct TeeWriter {
    file: LogFile,
}

struct TeeHandle {
    file: LogFile,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for TeeWriter {
    type Writer = TeeHandle;

    fn make_writer(&'a self) -> Self::Writer {
        TeeHandle {
            file: self.file.clone(),
        }
    }
}

impl TeeHandle {
    fn with_file(&self, f: impl FnOnce(&mut File)) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                f(file);
            }
        }
    }
}

impl Write for TeeHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = io::stderr().write(buf)?;
        // File errors must not break stderr logging.
        self.with_file(|file| {
            let _ = file.write_all(&buf[..written]);
        });
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.with_file(|file| {
            let _ = file.flush();
        });
        Ok(())
    }
}

static WRITER: OnceLock<TeeWriter> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` overrides the default `info`
/// filter. Calling it twice is harmless.
pub fn init() {
    let _ = tracing_log::LogTracer::init();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let writer = WRITER.get_or_init(TeeWriter::default).clone();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .try_init();
}

/// Starts (or stops, with `None`) copying log lines to `log_file`.
pub fn set_log_file(log_file: Option<&Path>) -> io::Result<()> {
    let Some(writer) = WRITER.get() else {
        return Ok(());
    };
    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            Some(OpenOptions::new().create(true).append(true).open(path)?)
        }
        None => None,
    };
    if let Ok(mut guard) = writer.file.lock() {
        *guard = file;
    }
    Ok(())
}
