use std::{fs::OpenOptions, io::Write, path::Path};

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Send log records to `log_path` (appending), at `Info` unless `RUST_LOG` says otherwise.
///
/// The terminal is busy with the ticker, so records only go to stderr when
/// the log file can't be opened. Calling this twice is a no-op.
pub fn init(log_path: &Path) {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Info).parse_default_env().format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} [{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    let file = log_path
        .parent()
        .map_or(Ok(()), std::fs::create_dir_all)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(log_path));

    match file {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
            if builder.try_init().is_ok() {
                log::info!("Logging to {}", log_path.display());
            }
        }
        Err(err) => {
            builder.filter_level(LevelFilter::Warn).target(Target::Stderr);
            if builder.try_init().is_ok() {
                log::warn!("Cannot open log file {}: {err}", log_path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_creates_log_file_and_tolerates_repeat_calls() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("weather_debug.log");

        init(&path);
        init(&path);

        assert!(path.is_file());
    }
}
