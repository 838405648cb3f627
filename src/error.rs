use snafu::{Location, Snafu};

use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::store::StoreError;

/// Startup errors of the reconcile daemon. Once the service is running,
/// remote failures are absorbed by the service itself and only logged.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InitError {
    /// could not read the configuration from the environment
    ConfigLoad {
        source: ConfigError,
        #[snafu(implicit)]
        location: Location,
    },

    /// could not connect to the remote database
    ConnectRemote {
        source: RemoteError,
        #[snafu(implicit)]
        location: Location,
    },

    /// could not load the local watch-state store
    LoadStore {
        source: StoreError,
        #[snafu(implicit)]
        location: Location,
    },

    /// could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },
}
