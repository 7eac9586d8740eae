//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout and the login/register/home screens
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
