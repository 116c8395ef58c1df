//! Send local, remote and inline media through a messaging client.
//!
//! [`MediaSender`] is the entry point. It resolves the destination, turns
//! each input into a local file (through the content cache unless told
//! otherwise), hands the files to a [`Dispatcher`] and removes transient
//! copies after a delay. Acquisition itself lives in [`parcel_acquire`].

mod delayed;
mod destination;
pub mod error;
mod handoff;
mod sender;

pub use crate::delayed::{DEFAULT_CLEANUP_DELAY, DelayedTask, schedule_cleanup};
pub use crate::destination::{ConfigDirectory, Directory, resolve_destination};
pub use crate::handoff::{Dispatcher, Handoff, HandoffAction, Launcher, WILDCARD_MIME};
pub use crate::sender::{MediaSender, Payload, SendOptions, Sent};
pub use parcel_acquire::{Input, Request};
pub use parcel_cache::ClearTarget;
pub use parcel_config::Config;
