mod datetime;
mod filesystem;
mod string;

pub use datetime::get_local_iso_datetime;
pub use filesystem::{init_file_logger, with_default_extension};
pub use string::normalize_string;
