//! Command Queue - Ordered command log for one generation run
//!
//! The queue validates variable usage, assigns box idents, serializes each
//! command and keeps the page cursor and asset bookkeeping for the render.
//! In update mode only the selected elements and structural commands are
//! handed to the plugin.

mod error;
mod params;
mod queue;
mod filter;

pub use error::*;
pub use params::*;
pub use queue::*;
pub use filter::*;
