use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use log::LevelFilter;

use crate::utils::get_local_iso_datetime;

/// `name` -> `name.<extension>`; paths that already carry an extension are kept.
pub fn with_default_extension(path: &Path, extension: &str) -> PathBuf {
    if path.extension().is_some() {
        path.to_path_buf()
    } else {
        path.with_extension(extension)
    }
}

/// Route the `log` macros to `path`, truncating it. `RUST_LOG` still overrides the level.
///
/// Returns the path actually written (`.txt` is appended when no extension is given).
pub fn init_file_logger(path: &Path, level: LevelFilter) -> Result<PathBuf, anyhow::Error> {
    let path = with_default_extension(path, "txt");
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file {}", path.display()))?;

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                get_local_iso_datetime(),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()?;

    return Ok(path);
}
