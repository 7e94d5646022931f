//! Utilities: logging setup for the binary.
//!
//! Key items:
//!   derive_level / init_logging

use std::sync::OnceLock;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Map `-v`/`-q` flags to a default level. `RUST_LOG` still wins in [`init_logging`].
pub fn derive_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Install the stderr fmt subscriber. Later calls are no-ops.
pub fn init_logging(level: Level) {
    static INIT: OnceLock<()> = OnceLock::new();
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
        if let Err(e) = installed {
            eprintln!("logging already initialised: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false, Level::WARN)]
    #[case(1, false, Level::DEBUG)]
    #[case(2, false, Level::TRACE)]
    #[case(5, false, Level::TRACE)]
    #[case(2, true, Level::ERROR)]
    fn level_from_flags(#[case] verbose: u8, #[case] quiet: bool, #[case] expected: Level) {
        assert_eq!(derive_level(verbose, quiet), expected);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_logging(Level::WARN);
        init_logging(Level::TRACE);
    }
}
