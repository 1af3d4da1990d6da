//! # User Interface Module
//!
//! Dear ImGui overlay drawn on top of the traced image.
//!
//! - [`UiManager`] - ImGui integration with winit and wgpu, input capture and rendering
//! - [`traversal_panel`] - The traversal toggle
//!
//! ## Input Handling
//!
//! Pointer events reach ImGui before the camera controller. While ImGui wants
//! the pointer, dragging does not orbit the camera.

pub mod manager;
pub mod panel;

// Re-export main types
pub use manager::UiManager;
pub use panel::traversal_panel;
