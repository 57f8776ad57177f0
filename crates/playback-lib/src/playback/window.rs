use super::present::PresentationSurface;
use super::types::PlaneRef;
use futures_lite::future;
use log::{debug, info, trace, warn};
use playback_types::{PlaybackError, PlaybackErrorKind};
use std::sync::Arc;
use std::time::Duration;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

const OPEN_ATTEMPTS: u32 = 50;
const OPEN_POLL: Duration = Duration::from_millis(10);

fn presentation_error(message: impl AsRef<str>) -> PlaybackError {
    PlaybackError::new(PlaybackErrorKind::Presentation, message)
}

/// A fixed-size desktop window that shows YUV420P frames.
///
/// The event loop is pumped from the playback thread instead of owning it,
/// so decoding, conversion and presentation all stay on one thread.
pub struct WindowSurface {
    state: SurfaceState,
    event_loop: EventLoop<()>,
}

impl WindowSurface {
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, PlaybackError> {
        if width == 0 || height == 0 {
            return Err(presentation_error(format!(
                "cannot open a {}x{} window",
                width, height
            )));
        }

        let event_loop = EventLoop::new()
            .map_err(|e| presentation_error(format!("failed to create event loop: {}", e)))?;

        let mut surface = Self {
            state: SurfaceState {
                title: title.to_owned(),
                width,
                height,
                renderer: None,
                closed: false,
                failure: None,
            },
            event_loop,
        };

        for attempt in 0..OPEN_ATTEMPTS {
            surface.pump(Some(OPEN_POLL));
            if let Some(failure) = surface.state.failure.take() {
                return Err(failure);
            }
            if surface.state.renderer.is_some() {
                info!("Opened {}x{} window after {} polls", width, height, attempt + 1);
                return Ok(surface);
            }
            if surface.state.closed {
                return Err(presentation_error("window closed before it was ready"));
            }
        }

        Err(presentation_error(format!(
            "window was not ready after {} polls",
            OPEN_ATTEMPTS
        )))
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.state) {
            debug!("Event loop exited with {}", code);
            self.state.closed = true;
        }
    }

    fn renderer(&mut self) -> Result<&mut PlaneRenderer, PlaybackError> {
        self.state
            .renderer
            .as_mut()
            .ok_or_else(|| presentation_error("window has no renderer"))
    }
}

impl PresentationSurface for WindowSurface {
    fn size(&self) -> (u32, u32) {
        (self.state.width, self.state.height)
    }

    fn update_planes(&mut self, planes: &[PlaneRef<'_>]) -> Result<(), PlaybackError> {
        self.renderer()?.upload(planes)
    }

    fn redraw(&mut self) -> Result<(), PlaybackError> {
        self.renderer()?.render()
    }

    fn poll_closed(&mut self) -> bool {
        if !self.state.closed {
            self.pump(Some(Duration::ZERO));
        }
        self.state.closed
    }
}

struct SurfaceState {
    title: String,
    width: u32,
    height: u32,
    renderer: Option<PlaneRenderer>,
    closed: bool,
    failure: Option<PlaybackError>,
}

impl ApplicationHandler for SurfaceState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() || self.failure.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(self.title.as_str())
            .with_inner_size(PhysicalSize::new(self.width, self.height))
            .with_resizable(false);

        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.failure = Some(presentation_error(format!(
                    "failed to create window: {}",
                    e
                )));
                return;
            }
        };

        match PlaneRenderer::new(window, self.width, self.height) {
            Ok(renderer) => self.renderer = Some(renderer),
            Err(e) => self.failure = Some(e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                info!("Window closed");
                self.closed = true;
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                trace!("Redraw requested by the window system");
            }
            _ => {}
        }
    }
}

/// Draws three R8 planes to the window through a BT.601 shader.
struct PlaneRenderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    planes: [wgpu::Texture; 3],
}

impl PlaneRenderer {
    fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, PlaybackError> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| presentation_error(format!("failed to create surface: {}", e)))?;

        let adapter = future::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .map_err(|e| presentation_error(format!("request_adapter failed: {:?}", e)))?;

        let (device, queue) = future::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
            label: Some("playback-device"),
        }))
        .map_err(|e| presentation_error(format!("request_device failed: {}", e)))?;

        // The shader writes already gamma encoded values.
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| presentation_error("surface reports no supported formats"))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        debug!("Configured {:?} surface {}x{}", format, width, height);

        let chroma_width = width.div_ceil(2);
        let chroma_height = height.div_ceil(2);
        let planes = [
            create_plane(&device, "plane-y", width, height),
            create_plane(&device, "plane-u", chroma_width, chroma_height),
            create_plane(&device, "plane-v", chroma_width, chroma_height),
        ];

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("plane-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let plane_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("yuv-bgl"),
            entries: &[
                plane_entry(0),
                plane_entry(1),
                plane_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let views: Vec<wgpu::TextureView> = planes
            .iter()
            .map(|plane| plane.create_view(&wgpu::TextureViewDescriptor::default()))
            .collect();
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("yuv-bg"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&views[0]),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&views[1]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&views[2]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("yuv420p-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("yuv420p.wgsl").into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("yuv-pl"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("yuv-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            bind_group,
            planes,
        })
    }

    fn upload(&mut self, planes: &[PlaneRef<'_>]) -> Result<(), PlaybackError> {
        if planes.len() != self.planes.len() {
            return Err(presentation_error(format!(
                "expected {} planes, got {}",
                self.planes.len(),
                planes.len()
            )));
        }

        for (texture, plane) in self.planes.iter().zip(planes) {
            let size = texture.size();
            if plane.width != size.width || plane.height != size.height {
                return Err(presentation_error(format!(
                    "plane is {}x{} but its texture is {}x{}",
                    plane.width, plane.height, size.width, size.height
                )));
            }
            let stride = u32::try_from(plane.stride)
                .map_err(|_| presentation_error(format!("plane stride {} too large", plane.stride)))?;

            self.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                plane.data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(stride),
                    rows_per_image: Some(plane.height),
                },
                size,
            );
        }
        Ok(())
    }

    fn render(&mut self) -> Result<(), PlaybackError> {
        let surface = &self.surface;
        let frame = acquire_frame(
            || surface.get_current_texture(),
            || surface.configure(&self.device, &self.config),
        )?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("yuv-encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("yuv-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}

/// Gets the next texture to draw into. A lost or outdated surface is
/// reconfigured and asked once more; failing twice is fatal.
fn acquire_frame<T>(
    mut acquire: impl FnMut() -> Result<T, wgpu::SurfaceError>,
    reconfigure: impl FnOnce(),
) -> Result<T, PlaybackError> {
    match acquire() {
        Ok(frame) => Ok(frame),
        Err(e @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
            warn!("Surface {}, reconfiguring", e);
            reconfigure();
            acquire().map_err(|e| {
                presentation_error(format!(
                    "failed to acquire surface texture after reconfiguring: {}",
                    e
                ))
            })
        }
        Err(e) => Err(presentation_error(format!(
            "failed to acquire surface texture: {}",
            e
        ))),
    }
}

fn create_plane(device: &wgpu::Device, label: &str, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}
