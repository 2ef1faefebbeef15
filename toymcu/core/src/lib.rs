//! Small educational microcontrollers built on [`nibble_vm`]:
//!
//! - [`tps`]: HT46F47E "TPS" board, running on the shared engine
//! - [`flipjump`]: one-instruction bit-flipping machine
//! - [`gmc4`]: Gakken GMC-4 trainer
//!
//! [`source`] turns program text into loadable programs and [`config`]
//! holds the JSON run settings used by the `toymcu` binary.

use thiserror::Error;

pub mod config;
pub mod flipjump;
pub mod gmc4;
pub mod source;
pub mod tps;

pub use config::{ConfigError, RunConfig, DEFAULT_MAX_STEPS};
pub use flipjump::{FlipJump, FlipJumpConfig, FlipJumpSnapshot};
pub use gmc4::{Gmc4, Gmc4Config, Gmc4Reg, Gmc4Snapshot, Led, Peripheral, Sound};
pub use source::SourceError;
pub use tps::{Tps, TpsIsa, TpsOp, TpsPin, TpsReg};

/// Failure to build a machine from program text.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
