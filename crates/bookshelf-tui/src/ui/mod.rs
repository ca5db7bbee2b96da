//! Terminal UI module using ratatui.
//!
//! - `render`: Surface selection and frame layout
//! - `input`: Keyboard event handling
//! - `styles`: Color palette and text styling
//! - `tabs`: Content of the protected tabs

pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
