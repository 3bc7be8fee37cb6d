use anyhow::{Context, Result};
use cadence::LogLevel;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the log file written inside `--log-dir`.
pub const LOG_FILE: &str = "watchmaker.log";

/// Writes every record to stderr and, if open, to the run log file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = &mut self.file {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }
}

/// Open `<dir>/watchmaker.log` for appending, creating the directory.
pub fn open_log_file(dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok((path, file))
}

/// Install the global logger.
pub fn init(level: LogLevel, log_dir: Option<&Path>) -> Result<()> {
    let file = match log_dir.filter(|d| !d.as_os_str().is_empty()) {
        Some(dir) => Some(open_log_file(dir)?),
        None => None,
    };
    let path = file.as_ref().map(|(path, _)| path.clone());

    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}][{}][{}]: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.target(),
                record.level(),
                std::process::id(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(Tee {
            file: file.map(|(_, file)| file),
        })))
        .try_init()
        .context("Failed to initialize logging")?;

    if let Some(path) = path {
        log::debug!("Logging to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_log_file_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs").join("watchmaker");

        let (path, _file) = open_log_file(&dir).unwrap();

        assert_eq!(path, dir.join(LOG_FILE));
        assert!(path.is_file());
    }

    #[test]
    fn test_tee_appends_to_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LOG_FILE), "earlier run\n").unwrap();

        let (path, file) = open_log_file(temp.path()).unwrap();
        let mut tee = Tee { file: Some(file) };
        tee.write_all(b"this run\n").unwrap();
        tee.flush().unwrap();

        assert_eq!(fs::read_to_string(path).unwrap(), "earlier run\nthis run\n");
    }

    #[test]
    fn test_open_log_file_under_regular_file_fails() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let err = open_log_file(&blocker.join("logs")).unwrap_err();
        assert!(err.to_string().contains("Failed to create log directory"));
    }
}
