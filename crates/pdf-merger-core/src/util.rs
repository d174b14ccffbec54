//! Utility functions shared across the crate.

use std::path::PathBuf;

use chrono::{DateTime, Local, TimeZone};

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Default name for a generated PDF, e.g. `20240131_235959.pdf`.
pub fn output_file_name<Tz: TimeZone>(datetime: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.pdf", datetime.format("%Y%m%d_%H%M%S"))
}

/// [`output_file_name`] for the current local time.
pub fn output_file_name_now() -> String {
    output_file_name(&Local::now())
}
