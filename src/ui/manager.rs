// src/ui/manager.rs
//! ImGui overlay for the sample window
//!
//! Handles ImGui integration with wgpu and winit: input forwarding, frame
//! building and compositing the overlay on top of the presented frame.

use imgui::{Context, FontConfig, FontSource, MouseCursor};
use imgui_wgpu::{Renderer, RendererConfig};
use imgui_winit_support::{HiDpiMode, WinitPlatform};
use log::debug;
use std::time::Instant;
use wgpu::{CommandEncoder, Device, Queue, TextureFormat, TextureView};
use winit::{
    event::{Event, WindowEvent},
    window::Window,
};

use crate::error::{Result, SampleError};

/// ImGui UI manager
///
/// Owns the ImGui context, its winit platform glue and the wgpu renderer.
pub struct UiManager {
    context: Context,
    platform: WinitPlatform,
    renderer: Renderer,
    last_frame: Instant,
    last_cursor: Option<MouseCursor>,
}

impl UiManager {
    /// Creates a new UI manager
    ///
    /// Uses locked DPI mode so the overlay is laid out in physical pixels,
    /// matching the fixed-size frame buffer underneath it.
    ///
    /// # Arguments
    /// * `device` - WGPU device for creating renderer resources
    /// * `queue` - WGPU queue for renderer operations
    /// * `output_color_format` - Format of the surface the overlay is drawn on
    /// * `window` - Window for platform integration
    pub fn new(
        device: &Device,
        queue: &Queue,
        output_color_format: TextureFormat,
        window: &Window,
    ) -> Self {
        let mut context = Context::create();
        context.set_ini_filename(None);

        let mut platform = WinitPlatform::new(&mut context);
        platform.attach_window(context.io_mut(), window, HiDpiMode::Locked(1.0));

        context.fonts().add_font(&[FontSource::DefaultFontData {
            config: Some(FontConfig {
                oversample_h: 1,
                pixel_snap_h: true,
                size_pixels: 16.0,
                ..Default::default()
            }),
        }]);

        let renderer_config = RendererConfig {
            texture_format: output_color_format,
            ..Default::default()
        };
        let renderer = Renderer::new(&mut context, device, queue, renderer_config);

        Self {
            context,
            platform,
            renderer,
            last_frame: Instant::now(),
            last_cursor: None,
        }
    }

    /// Forwards pointer and keyboard events to ImGui
    ///
    /// Capture is not decided here. Callers read [`wants_pointer`](Self::wants_pointer)
    /// once the next UI frame has been built.
    pub fn handle_input<T>(&mut self, window: &Window, event: &Event<T>) {
        if let Event::WindowEvent {
            event:
                WindowEvent::CursorMoved { .. }
                | WindowEvent::MouseInput { .. }
                | WindowEvent::MouseWheel { .. }
                | WindowEvent::KeyboardInput { .. }
                | WindowEvent::Focused(_),
            ..
        } = event
        {
            self.platform
                .handle_event(self.context.io_mut(), window, event);
        }
    }

    /// Whether ImGui claimed the pointer on its last frame
    pub fn wants_pointer(&self) -> bool {
        self.context.io().want_capture_mouse
    }

    /// Starts a new ImGui frame and builds the UI with `run_ui`
    ///
    /// # Arguments
    /// * `window` - Window reference for platform operations
    /// * `run_ui` - Callback that builds the UI
    pub fn prepare_frame<F>(&mut self, window: &Window, run_ui: F) -> Result<()>
    where
        F: FnOnce(&imgui::Ui),
    {
        let now = Instant::now();
        self.context
            .io_mut()
            .update_delta_time(now - self.last_frame);
        self.last_frame = now;

        self.platform
            .prepare_frame(self.context.io_mut(), window)
            .map_err(|err| SampleError::Gui(format!("failed to prepare frame: {err}")))?;

        let ui = self.context.frame();
        run_ui(&ui);

        if self.last_cursor != ui.mouse_cursor() {
            self.last_cursor = ui.mouse_cursor();
            debug!("imgui cursor changed to {:?}", self.last_cursor);
            self.platform.prepare_render(&ui, window);
        }

        Ok(())
    }

    /// Draws the UI built by the last [`prepare_frame`](Self::prepare_frame)
    /// on top of whatever `color_attachment` already holds
    ///
    /// # Arguments
    /// * `device` - WGPU device for render operations
    /// * `queue` - WGPU queue for buffer uploads
    /// * `encoder` - Command encoder to record render commands
    /// * `color_attachment` - Target texture view
    pub fn render(
        &mut self,
        device: &Device,
        queue: &Queue,
        encoder: &mut CommandEncoder,
        color_attachment: &TextureView,
    ) -> Result<()> {
        let draw_data = self.context.render();

        if draw_data.display_size[0] <= 0.0 || draw_data.display_size[1] <= 0.0 {
            return Ok(());
        }

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("imgui_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_attachment,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.renderer
            .render(draw_data, queue, device, &mut render_pass)
            .map_err(|err| SampleError::Gui(format!("failed to render imgui: {err:?}")))
    }
}
