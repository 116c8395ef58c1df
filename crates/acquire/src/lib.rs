//! Media acquisition.
//!
//! Takes whatever a caller wants to send (raw bytes, base64, `data:` URLs,
//! remote URLs, local paths) and turns each item into a local file with a
//! known MIME type, going through the content cache where asked to.
//!
//! ```no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use parcel_acquire::{AcquireOptions, Acquirer, Context, IndexMode, Request};
//! use parcel_cache::Repository;
//! use parcel_storage::{BackendHandle, backend::LocalBackend};
//!
//! let cache = Repository::new("/sdcard/botData/.cache", 200)?;
//! let acquirer = Acquirer::new(Context::new(cache, reqwest::Client::new()));
//! let tmp: BackendHandle = Arc::new(LocalBackend::new("tmp", "/sdcard/botData/tmp")?);
//!
//! let request = Request::new("https://example.com/cat.png");
//! let file = acquirer.acquire(request, &tmp, AcquireOptions::default(), IndexMode::Standalone).await?;
//! println!("{} ({})", file.local_path.display(), file.mime);
//! # Ok(())
//! # }
//! ```

mod acquire;
mod batch;
mod context;
pub mod error;
mod runner;
mod source;
#[cfg(test)]
mod testing;

pub use crate::acquire::{AcquireOptions, Acquirer, Acquisition, DEFAULT_TIMEOUT, IndexMode, Request};
pub use crate::batch::BatchOrchestrator;
pub use crate::context::{Context, MediaIndex, NoopMediaIndex};
pub use crate::runner::{AcquireTask, TaskRunner, TokioRunner};
pub use crate::source::{BASE64_MARKER, Input, Source, classify, decode_base64, decode_data_url};
