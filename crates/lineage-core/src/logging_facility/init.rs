//! Subscriber installation.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Output profile for the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable lines, `lineage=debug` unless `RUST_LOG` says otherwise.
    Development,
    /// One JSON object per event, `lineage=info` unless `RUST_LOG` says otherwise.
    Production,
    /// Bare registry; tests attach their own capture layer.
    Test,
}

impl Profile {
    fn default_filter(self) -> &'static str {
        match self {
            Profile::Development => "lineage=debug",
            Profile::Production | Profile::Test => "lineage=info",
        }
    }
}

static INIT_ONCE: Once = Once::new();

fn filter_for(profile: Profile) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(profile.default_filter()))
}

/// Install the global subscriber for `profile`.
///
/// Only the first call has any effect. If some other subscriber was already
/// installed (for example by a test harness) it is left in place.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let installed = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter_for(profile))
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter_for(profile))
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
        if installed.is_err() {
            tracing::debug!(?profile, "global subscriber already installed");
        }
    });
}
