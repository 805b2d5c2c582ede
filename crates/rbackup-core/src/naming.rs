use chrono::{DateTime, TimeZone};
use std::path::Path;

/// strftime layout of the timestamp embedded in generated names.
pub const TIMESTAMP_FORMAT: &str = "%m-%d-%Y_%H-%M-%S";

pub const DEST_PREFIX: &str = "backup-";

/// Remote name for an upload with no explicit destination:
/// `backup-<MM-DD-YYYY_HH-MM-SS>` plus the source's full extension.
pub fn destination_name<Tz>(src: &Path, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{DEST_PREFIX}{}{}",
        now.format(TIMESTAMP_FORMAT),
        full_extension(src)
    )
}

/// Every dotted suffix of the file name, e.g. `.tar.gz` for `db.tar.gz`.
///
/// Leading dots mark hidden files, not extensions, and a name ending in a
/// dot has no extension.
pub fn full_extension(path: &Path) -> String {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return String::new();
    };

    let stem = name.trim_start_matches('.');
    if stem.ends_with('.') {
        return String::new();
    }
    match stem.find('.') {
        Some(idx) => stem[idx..].to_string(),
        None => String::new(),
    }
}
