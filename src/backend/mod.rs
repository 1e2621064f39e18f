//! Device abstraction layer
//!
//! Provides the [`GraphicsDevice`] trait the renderer draws through, the
//! plain data types it exchanges, and a headless [`RecordingDevice`].

pub mod recording;
pub mod traits;
pub mod types;

pub use recording::{DeviceCommand, RecordingDevice};
pub use traits::*;
pub use types::*;
