//! Print Model - Typed InDesign placement commands
//!
//! This crate provides the command model sent to the InDesign plugin: page
//! navigation, layers, variables, layout breaks and the box family (copy,
//! text, image and table boxes) together with their rich-text content.
//! Commands serialize to JSON objects keyed by `cmd`.

mod error;
mod settings;
mod command;
mod context;
mod ident;
mod boxes;
mod image;
mod content;
pub mod table;
mod variable;
mod commands;
pub mod layout;
pub mod document;
pub mod html;

pub use error::*;
pub use settings::*;
pub use command::*;
pub use context::*;
pub use ident::*;
pub use boxes::*;
pub use image::*;
pub use content::*;
pub use table::*;
pub use variable::*;
pub use commands::*;
pub use layout::*;
pub use document::*;
pub use html::*;
