//! Leveled, optionally colored diagnostic logging.
//!
//! Built on the `log` facade with an `env_logger` backend, matching the
//! logging stack used by the closest sibling hosts in this ecosystem.
//! `verbose`/`quiet` map to level filters; `color` selects one of a small
//! fixed set of named schemes rather than free-form ANSI configuration.

use std::io::Write;

use env_logger::{Builder, Target};
use log::LevelFilter;

/// Named color schemes accepted by `--color`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    /// Color only when stderr is a terminal.
    Auto,
    /// Force bright-on-dark-friendly colors.
    Dark,
    /// Force colors tuned for a light terminal background.
    Light,
    /// Never color, regardless of terminal detection.
    None,
}

impl ColorScheme {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "auto" => Some(ColorScheme::Auto),
            "dark" => Some(ColorScheme::Dark),
            "light" => Some(ColorScheme::Light),
            "none" => Some(ColorScheme::None),
            _ => None,
        }
    }

    fn write_style(&self, level: log::Level) -> env_logger::fmt::style::Style {
        use env_logger::fmt::style::{AnsiColor, Style};

        if *self == ColorScheme::None {
            return Style::new();
        }

        let color = match level {
            log::Level::Error => AnsiColor::Red,
            log::Level::Warn => AnsiColor::Yellow,
            log::Level::Info => AnsiColor::Green,
            log::Level::Debug => AnsiColor::Blue,
            log::Level::Trace => AnsiColor::Magenta,
        };
        Style::new().fg_color(Some(color.into()))
    }
}

/// Verbosity requested on the command line; `Verbose` and `Quiet` are
/// mutually exclusive by construction at the CLI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Error,
            Verbosity::Normal => LevelFilter::Info,
            Verbosity::Verbose => LevelFilter::Debug,
        }
    }
}

/// Installs the global logger. Idempotent-safe to call once at process start.
pub fn init(verbosity: Verbosity, color: Option<ColorScheme>) {
    let scheme = color.unwrap_or(ColorScheme::None);
    let mut builder = Builder::new();
    builder
        .filter_level(verbosity.level_filter())
        .target(Target::Stderr)
        .format(move |buf, record| {
            let style = scheme.write_style(record.level());
            writeln!(buf, "{style}{}{style:#} {}", record.level(), record.args())
        });
    // Ignore "already initialized" errors: integration tests that spin up
    // more than one run in a process must not panic on the second call.
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_scheme_names_case_insensitively() {
        assert_eq!(ColorScheme::parse("AUTO"), Some(ColorScheme::Auto));
        assert_eq!(ColorScheme::parse("dark"), Some(ColorScheme::Dark));
        assert_eq!(ColorScheme::parse("bogus"), None);
    }

    #[test]
    fn verbosity_maps_to_expected_level_filters() {
        assert_eq!(Verbosity::Quiet.level_filter(), LevelFilter::Error);
        assert_eq!(Verbosity::Normal.level_filter(), LevelFilter::Info);
        assert_eq!(Verbosity::Verbose.level_filter(), LevelFilter::Debug);
    }
}
