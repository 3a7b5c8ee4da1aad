//! Game Boy (DMG) audio processing unit.
//!
//! [`Apu`] owns the 0xFF10-0xFF3F register window and turns bus writes into
//! stereo 16-bit PCM via [`Apu::generate`]. The host side ([`player`],
//! [`interface::audio`]) replays register scripts and feeds an audio device.

pub mod apu;
pub mod config;
pub mod error;
pub mod interface;
pub mod player;
pub mod utils;

pub use apu::{Apu, Channel, ChannelId, LockHandle, is_apu_address};
pub use config::ApuConfig;
pub use error::{ConfigError, Error, Result};
