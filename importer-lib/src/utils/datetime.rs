use chrono::prelude::Local;

pub fn get_local_iso_datetime() -> String {
    return Local::now().to_rfc3339();
}
