/*!
    bridge master controller in `std` environment.

    The central resource is the [Bridge] struct, its [Bridge::tick] must be called periodically (or
    driven by [Bridge::run]) to advance discovery, configuration and cyclic data exchange.

    sequence of a bridge session

    - [discovery] walks the chain on the right port then on the left port, handing out addresses
    - [adjust] reconciles the detected modules with the expected [Configuration]
    - [defaults] builds the default process image, copied once into the live image
    - the transport then exchanges data cyclically, watched by an [ErrorBudget]

    While the bridge is stopped, [firmware] requests can be issued from another thread.
*/

/// physical collaborators of the bridge
pub mod hardware;
/// countdown timers driven by the platform clock
pub mod timer;
/// detected and expected modules
pub mod devices;
/// matching of detected modules against the configuration
pub mod adjust;
/// default values of the process image
pub mod defaults;
/// chain walking state machine, this is the tricky part of the code
pub mod discovery;
/// firmware update sub mode
pub mod firmware;
/// tunable parameters
pub mod settings;
/// top level run loop and its entry points
mod bridge;


pub use bridge::{Bridge, BridgeState};
pub use hardware::*;
pub use devices::*;
pub use adjust::{adjust, ConfigError};
pub use defaults::apply_defaults;
pub use discovery::Phase;
pub use firmware::FirmwareStep;
pub use settings::{Parameters, ErrorBudget, Verdict};


use thiserror::Error;

/// error reported by bridge operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("problem with the field bus transport")]
    Transport(TransportError),
    #[error("configuration mismatch")]
    Config(#[from] ConfigError),
    #[error("the bridge must be stopped for this request")]
    NotStopped,
    #[error("request abandoned because the bridge was reset or continued")]
    Interrupted,
    #[error("problem detected on master side")]
    Master(&'static str),
}
impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}
impl Error {
    /// integer status, as reported to synchronous callers
    pub fn code(&self) -> i32 {
        match self {
            Self::Transport(error) => error.code,
            Self::Config(error) => error.code(),
            Self::NotStopped => -1,
            Self::Interrupted => -2,
            Self::Master(_) => -3,
        }
    }
}
