//! Subscriber setup for the binary. The library itself only emits events.

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset: `-v` shows full/empty transitions,
/// `-vv` every item moved.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn build_env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

/// Installs a global `fmt` subscriber writing to stderr. Returns `false`
/// if one was already installed.
pub fn init(verbosity: u8) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbosity))
        .with_thread_names(true)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(default_directive(0), "info");
        assert_eq!(default_directive(1), "debug");
        assert_eq!(default_directive(2), "trace");
        assert_eq!(default_directive(9), "trace");
    }

    #[test]
    fn test_second_init_is_refused() {
        init(0);
        assert!(!init(0));
    }
}
