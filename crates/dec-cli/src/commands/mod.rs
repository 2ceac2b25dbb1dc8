//! Subcommand implementations. Each prints its own report and exits the
//! process with status 1 on an unrecoverable error.

macro_rules! die {
    ($result:expr, $($arg:tt)*) => {
        $result.unwrap_or_else(|e| {
            eprintln!($($arg)*, e);
            std::process::exit(1);
        })
    };
}

use std::io;

use dec_core::source::TableError;

pub mod config_ops;
pub mod table_ops;
pub mod translate_ops;

/// Apply a custom settings file before anything reads the global settings.
pub(crate) fn load_settings(file: Option<&str>) {
    if let Some(file) = file {
        let content = die!(std::fs::read_to_string(file), "Error reading {file}: {}");
        die!(
            dec_core::settings::init_custom(content),
            "Error in settings {file}: {}"
        );
    }
}

/// Failure to load a model or read input before any decoding starts.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{path}: {source}")]
    Io { path: String, source: io::Error },

    #[error(transparent)]
    Table(#[from] TableError),
}
