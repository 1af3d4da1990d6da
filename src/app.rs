use log::{error, info};
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::SampleConfig;
use crate::error::{Result, SampleError};
use crate::gfx::{GpuContext, PresentPass, WgpuBackend};
use crate::scene::{FrameInput, SampleProgram, TraversalMode};
use crate::ui::{traversal_panel, UiManager};

/// The windowed sample: owns the event loop and everything created on resume
pub struct SampleApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    config: SampleConfig,
    window: Option<Arc<Window>>,
    render_state: Option<RenderState>,
    traversal: TraversalMode,
    error: Option<SampleError>,
}

/// GPU-side state, created once the window exists
struct RenderState {
    context: GpuContext,
    backend: WgpuBackend,
    present: PresentPass,
    ui_manager: UiManager,
    program: SampleProgram,
}

impl SampleApp {
    pub fn new(config: SampleConfig) -> Result<Self> {
        config.validate()?;
        let event_loop = EventLoop::new()?;

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                config,
                window: None,
                render_state: None,
                traversal: TraversalMode::default(),
                error: None,
            },
        })
    }

    /// Runs until the window closes, then reports the first error hit along the way
    pub fn run(mut self) -> Result<()> {
        let Some(event_loop) = self.event_loop.take() else {
            return Err(SampleError::Unsupported(
                "event loop already consumed".to_string(),
            ));
        };
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self.app_state)?;

        match self.app_state.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn create_render_state(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let size = self.config.frame_size;
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(PhysicalSize::new(size.width, size.height))
            .with_resizable(false);
        let window = Arc::new(event_loop.create_window(attributes)?);

        let (width, height) = window.inner_size().into();
        let context = pollster::block_on(GpuContext::new(window.clone(), width, height))?;

        let mut backend = WgpuBackend::new(context.device.clone(), context.queue.clone());
        let program = SampleProgram::setup(&mut backend, &self.config)?;

        let present = PresentPass::new(&context.device, context.format());
        let ui_manager = UiManager::new(&context.device, &context.queue, context.format(), &window);

        self.window = Some(window);
        self.render_state = Some(RenderState {
            context,
            backend,
            present,
            ui_manager,
            program,
        });
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: SampleError) {
        error!("{err}");
        self.error.get_or_insert(err);
        event_loop.exit();
    }
}

impl RenderState {
    fn redraw(&mut self, window: &Window, traversal: &mut TraversalMode) -> Result<()> {
        let Some(frame) = self.context.acquire_frame()? else {
            return Ok(());
        };

        self.ui_manager
            .prepare_frame(window, |ui| traversal_panel(ui, traversal))?;
        let input = FrameInput {
            gui_wants_pointer: self.ui_manager.wants_pointer(),
            traversal: *traversal,
        };
        self.program.frame(&mut self.backend, input)?;

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });

        let frame_buffer = self.backend.buffer(self.program.frame_buffer())?;
        self.present.render(
            &self.context.device,
            &self.context.queue,
            &mut encoder,
            &view,
            frame_buffer,
            self.program.frame_size(),
        );
        self.ui_manager.render(
            &self.context.device,
            &self.context.queue,
            &mut encoder,
            &view,
        )?;

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(err) = self.create_render_state(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let Some(render_state) = self.render_state.as_mut() else {
            return;
        };

        // ImGui sees input first; capture is honoured when the camera ticks
        let ui_event: Event<()> = Event::WindowEvent {
            window_id,
            event: event.clone(),
        };
        render_state.ui_manager.handle_input(&window, &ui_event);
        render_state.program.process_event(&event);

        match event {
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            }
            | WindowEvent::CloseRequested => {
                info!("close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(PhysicalSize { width, height }) => {
                render_state.context.resize(width, height);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = render_state.redraw(&window, &mut self.traversal) {
                    self.fail(event_loop, err);
                }
            }
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        let Some(RenderState {
            mut backend,
            program,
            ..
        }) = self.render_state.take()
        else {
            return;
        };

        if let Err(err) = program.finish(&mut backend) {
            error!("{err}");
            self.error.get_or_insert(err);
        }
    }
}
