//! winit window with a wgpu render context
//!
//! The event loop is driven by pumping rather than `run_app`, so the
//! playback loop stays in charge: each pump waits up to a timeout for
//! window events and reports whether the user asked to quit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use super::{target_pixel_format, DisplayFormat, FrameRenderer, PollOutcome, PresentationSurface, StreamingTexture};
use crate::resource::{Releasable, ResourceHandle};
use crate::video::ConvertedImage;
use crate::{PlayerError, Result};

/// How long to wait for the platform to hand us a window
const WINDOW_CREATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Window and presentation options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    /// Present with vsync (Fifo) instead of immediately
    pub vsync: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 352,
            height: 288,
            title: "Loop Player".to_string(),
            vsync: true,
        }
    }
}

impl Releasable for Arc<Window> {
    fn release(self) {
        tracing::trace!("destroying window");
        drop(self);
    }
}

/// Surface, device and queue bound to the window
struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

impl Releasable for RenderContext {
    fn release(self) {
        tracing::trace!("destroying render context");
        drop(self);
    }
}

/// Receives window events while the loop is pumped
struct WindowEvents {
    attributes: Option<WindowAttributes>,
    window: Option<Arc<Window>>,
    create_error: Option<String>,
    quit_requested: bool,
}

impl ApplicationHandler for WindowEvents {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => self.window = Some(Arc::new(window)),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                tracing::info!("window close requested");
                self.quit_requested = true;
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    tracing::info!("escape pressed");
                    self.quit_requested = true;
                    event_loop.exit();
                }
            }
            _ => {}
        }
    }
}

/// Fixed-size window presenting a streaming texture through wgpu
pub struct WindowSurface {
    renderer: FrameRenderer,
    texture: StreamingTexture,
    context: ResourceHandle<RenderContext>,
    window: ResourceHandle<Arc<Window>>,
    events: WindowEvents,
    event_loop: EventLoop<()>,
    native_format: DisplayFormat,
}

impl WindowSurface {
    /// Open the window and build the GPU objects behind it
    ///
    /// Fails with `UnsupportedFormat` when the display's native format has
    /// no pixel format mapping.
    pub fn create(config: &SurfaceConfig) -> Result<Self> {
        let width = config.width.max(1);
        let height = config.height.max(1);

        let mut event_loop = EventLoop::new()
            .map_err(|e| PlayerError::SurfaceInitFailed(format!("event loop: {}", e)))?;
        event_loop.set_control_flow(ControlFlow::Wait);

        let attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);
        let mut events = WindowEvents {
            attributes: Some(attributes),
            window: None,
            create_error: None,
            quit_requested: false,
        };

        let deadline = Instant::now() + WINDOW_CREATE_TIMEOUT;
        let window = loop {
            if let Some(window) = events.window.take() {
                break window;
            }
            if let Some(e) = events.create_error.take() {
                return Err(PlayerError::SurfaceInitFailed(format!("window: {}", e)));
            }
            if let PumpStatus::Exit(code) =
                event_loop.pump_app_events(Some(Duration::from_millis(10)), &mut events)
            {
                return Err(PlayerError::SurfaceInitFailed(format!(
                    "event loop exited with code {} before the window opened",
                    code
                )));
            }
            if Instant::now() >= deadline {
                return Err(PlayerError::SurfaceInitFailed("timed out waiting for window".into()));
            }
        };

        let (context, texture_format) = create_render_context(Arc::clone(&window), config.vsync)?;
        let native_format = DisplayFormat::from(texture_format);
        let pixel = target_pixel_format(native_format)?;

        let texture = StreamingTexture::new(&context.device, texture_format, pixel, width, height);
        let renderer = FrameRenderer::new(&context.device, texture_format, &texture);

        tracing::info!(
            width,
            height,
            native_format = ?native_format,
            pixel_format = ?pixel,
            vsync = config.vsync,
            "presentation surface ready"
        );

        Ok(Self {
            renderer,
            texture,
            context: ResourceHandle::new(context),
            window: ResourceHandle::new(window),
            events,
            event_loop,
            native_format,
        })
    }
}

impl PresentationSurface for WindowSurface {
    fn native_format(&self) -> DisplayFormat {
        self.native_format
    }

    fn size(&self) -> (u32, u32) {
        let geometry = self.texture.geometry();
        (geometry.width, geometry.height)
    }

    fn lock(&mut self) -> Result<ConvertedImage<'_>> {
        self.texture.lock()
    }

    fn present(&mut self) -> Result<()> {
        let context = self
            .context
            .get()
            .ok_or(PlayerError::PresentFailed("render context released".into()))?;

        self.texture.upload(&context.queue)?;

        let output = match context.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                context.surface.configure(&context.device, &context.config);
                tracing::debug!("surface reconfigured, frame skipped");
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface acquire timed out, frame skipped");
                return Ok(());
            }
            Err(e) => return Err(PlayerError::PresentFailed(e.to_string())),
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        self.renderer.render(&mut encoder, &view);
        context.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn poll_cancellation(&mut self, timeout: Duration) -> PollOutcome {
        if !self.events.quit_requested {
            let status = self.event_loop.pump_app_events(Some(timeout), &mut self.events);
            if let PumpStatus::Exit(code) = status {
                tracing::debug!(code, "event loop exited");
                self.events.quit_requested = true;
            }
        }
        if self.events.quit_requested {
            PollOutcome::Cancelled
        } else {
            PollOutcome::TimedOut
        }
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        // Texture, then render context, then window
        self.texture.release();
        self.context.reset();
        self.window.reset();
    }
}

/// Create the wgpu surface, device and queue for `window`
///
/// Returns the context and the surface's preferred (native) format.
fn create_render_context(window: Arc<Window>, vsync: bool) -> Result<(RenderContext, wgpu::TextureFormat)> {
    let size = window.inner_size();

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let surface = instance
        .create_surface(window)
        .map_err(|e| PlayerError::SurfaceInitFailed(format!("surface: {}", e)))?;

    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::LowPower,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| PlayerError::SurfaceInitFailed("no compatible GPU adapter".into()))?;

    tracing::info!("Using GPU: {}", adapter.get_info().name);
    tracing::debug!("Backend: {:?}", adapter.get_info().backend);

    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("Loop Player Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .map_err(|e| PlayerError::SurfaceInitFailed(format!("device: {}", e)))?;

    let surface_caps = surface.get_capabilities(&adapter);
    let surface_format = *surface_caps
        .formats
        .first()
        .ok_or_else(|| PlayerError::SurfaceInitFailed("surface reports no formats".into()))?;
    let alpha_mode = surface_caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format: surface_format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        },
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    Ok((
        RenderContext {
            surface,
            device,
            queue,
            config,
        },
        surface_format,
    ))
}
