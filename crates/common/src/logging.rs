//! Logging initialisation for test binaries

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `debug` when `verbose`, else `info`.
/// Returns `false` if a subscriber was already installed.
pub fn init(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_test_writer())
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init(false);
        assert!(!init(true));
    }
}
