//! Logger setup: persistent file under /var/log/pibake, stderr fallback.

use std::fs;
use std::io;
use std::path::Path;

const LOG_DIR: &str = "/var/log/pibake";
const LOG_FILE: &str = "bake.log";

fn open_log_file(dir: &Path) -> io::Result<fs::File> {
    fs::create_dir_all(dir)?;
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))
}

pub fn init() {
    use env_logger::Target;

    // One-shot installs run as root, so a stable log location usually works.
    // If the file cannot be created (permissions, readonly FS), fall back to
    // stderr.
    let target = open_log_file(Path::new(LOG_DIR))
        .map(|file| Target::Pipe(Box::new(file)))
        .unwrap_or(Target::Stderr);

    env_logger::Builder::from_default_env()
        .target(target)
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_created_and_appendable() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("pibake");

        open_log_file(&log_dir).unwrap();
        assert!(log_dir.join(LOG_FILE).exists());

        // A second open appends rather than truncating.
        fs::write(log_dir.join(LOG_FILE), b"first\n").unwrap();
        use io::Write;
        let mut file = open_log_file(&log_dir).unwrap();
        file.write_all(b"second\n").unwrap();
        drop(file);
        let contents = fs::read_to_string(log_dir.join(LOG_FILE)).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn unwritable_dir_reports_an_error() {
        // A file where the directory should be makes create_dir_all fail.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("pibake");
        fs::write(&blocker, b"").unwrap();
        assert!(open_log_file(&blocker).is_err());
    }
}
