// src/ui/panel.rs
//! Traversal panel shown over the traced image

use crate::scene::TraversalMode;

/// Two radio buttons selecting whether traversal stops at the first hit
pub fn traversal_panel(ui: &imgui::Ui, traversal: &mut TraversalMode) {
    ui.window("Traversal")
        .position([10.0, 10.0], imgui::Condition::FirstUseEver)
        .always_auto_resize(true)
        .collapsible(false)
        .build(|| {
            ui.radio_button(
                "Don't terminate traversal early?",
                traversal,
                TraversalMode::Complete,
            );
            ui.radio_button(
                "Terminate Traversal Early?",
                traversal,
                TraversalMode::TerminateEarly,
            );
        });
}
