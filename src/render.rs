use crate::core::backend::{
    Cursor, DrawLayer, DrawableDesc, Frame, PanoramaImage, ResourceId, SceneBackend, ScreenshotOptions,
};
use crate::core::constants::*;
use crate::core::error::SceneError;
use crate::core::geometry;
use fnv::FnvHashMap;
use wasm_bindgen::JsValue;
use web_sys as web;

mod helpers;
mod label;
mod pipelines;
mod targets;

use helpers::GpuMesh;
use pipelines::{CameraUniforms, ObjectUniforms, Pipelines};
use targets::DepthTarget;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Part {
    Marker,
    Glow,
    Ring,
    Label,
}

enum GpuResource {
    Panorama {
        texture: wgpu::Texture,
        bind_group: wgpu::BindGroup,
    },
    Object {
        part: Part,
        uniform_buffer: wgpu::Buffer,
        bind_group: wgpu::BindGroup,
        texture: Option<wgpu::Texture>,
    },
}

impl GpuResource {
    fn destroy(self) {
        match self {
            GpuResource::Panorama { texture, .. } => texture.destroy(),
            GpuResource::Object {
                uniform_buffer,
                texture,
                ..
            } => {
                uniform_buffer.destroy();
                if let Some(t) = texture {
                    t.destroy();
                }
            }
        }
    }
}

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthTarget,
    pipelines: Pipelines,
    sampler: wgpu::Sampler,
    white: (wgpu::Texture, wgpu::TextureView),
    camera_buffer: wgpu::Buffer,
    camera_bg: wgpu::BindGroup,
    panorama_mesh: GpuMesh,
    sphere_mesh: GpuMesh,
    ring_mesh: GpuMesh,
    label_mesh: GpuMesh,
    clear_color: wgpu::Color,
}

impl GpuState {
    pub async fn new(canvas: &web::HtmlCanvasElement) -> anyhow::Result<Self> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No WebGPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    // Use default limits on web to avoid passing unknown fields to older WebGPU impls
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| anyhow::anyhow!(format!("request_device error: {:?}", e)))?;
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8UnormSrgb | wgpu::TextureFormat::Rgba8UnormSrgb
                )
            })
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth = DepthTarget::new(&device, width, height);
        let pipelines = pipelines::create_pipelines(&device, format);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let white = helpers::upload_rgba_texture(&device, &queue, "white_tex", 1, 1, &[255; 4]);

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bg"),
            layout: &pipelines.camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let panorama_mesh = helpers::upload_mesh(
            &device,
            "panorama_mesh",
            &geometry::panorama_sphere(
                PANORAMA_RADIUS,
                PANORAMA_WIDTH_SEGMENTS,
                PANORAMA_HEIGHT_SEGMENTS,
            ),
        );
        let sphere_mesh = helpers::upload_mesh(
            &device,
            "marker_mesh",
            &geometry::uv_sphere(1.0, MARKER_SEGMENTS, MARKER_SEGMENTS),
        );
        let ring_mesh = helpers::upload_mesh(
            &device,
            "ring_mesh",
            &geometry::ring(RING_INNER_SCALE, RING_OUTER_SCALE, RING_SEGMENTS),
        );
        let label_mesh = helpers::upload_mesh(
            &device,
            "label_mesh",
            &geometry::quad(LABEL_WIDTH, LABEL_HEIGHT),
        );
        log::info!("[gpu] device ready {}x{} {:?}", width, height, format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth,
            pipelines,
            sampler,
            white,
            camera_buffer,
            camera_bg,
            panorama_mesh,
            sphere_mesh,
            ring_mesh,
            label_mesh,
            clear_color: wgpu::Color::BLACK,
        })
    }

    pub fn resize_if_needed(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if width != self.config.width || height != self.config.height {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.depth.recreate(&self.device, width, height);
        }
    }

    fn object_bind_group(&self, label: &str, buffer: &wgpu::Buffer, view: &wgpu::TextureView) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.pipelines.object_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn create_object(&self, part: Part, texture: Option<(wgpu::Texture, wgpu::TextureView)>) -> GpuResource {
        let uniform_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("object_uniforms"),
            size: std::mem::size_of::<ObjectUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (bind_group, texture) = match texture {
            Some((tex, view)) => (
                self.object_bind_group("object_bg", &uniform_buffer, &view),
                Some(tex),
            ),
            None => (
                self.object_bind_group("object_bg", &uniform_buffer, &self.white.1),
                None,
            ),
        };
        GpuResource::Object {
            part,
            uniform_buffer,
            bind_group,
            texture,
        }
    }

    fn mesh_for(&self, part: Part) -> &GpuMesh {
        match part {
            Part::Marker | Part::Glow => &self.sphere_mesh,
            Part::Ring => &self.ring_mesh,
            Part::Label => &self.label_mesh,
        }
    }

    fn pipeline_for(&self, layer: DrawLayer) -> &wgpu::RenderPipeline {
        match layer {
            DrawLayer::Marker => &self.pipelines.marker,
            DrawLayer::Glow => &self.pipelines.glow,
            DrawLayer::Overlay => &self.pipelines.overlay,
        }
    }

    fn render(
        &mut self,
        frame: &Frame<'_>,
        resources: &FnvHashMap<ResourceId, GpuResource>,
    ) -> Result<(), wgpu::SurfaceError> {
        let cam = CameraUniforms {
            view_proj: frame.view_proj.to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&cam));
        for cmd in frame.draws {
            let Some(GpuResource::Object {
                part,
                uniform_buffer,
                ..
            }) = resources.get(&cmd.resource)
            else {
                continue;
            };
            let textured = if *part == Part::Label { 1.0 } else { 0.0 };
            let u = ObjectUniforms {
                model: cmd.model.to_cols_array_2d(),
                color: cmd.color.to_array(),
                emissive: cmd.emissive.extend(textured).to_array(),
            };
            self.queue.write_buffer(uniform_buffer, 0, bytemuck::bytes_of(&u));
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_bind_group(0, &self.camera_bg, &[]);

            if let Some(GpuResource::Panorama { bind_group, .. }) =
                frame.panorama.and_then(|id| resources.get(&id))
            {
                let mesh = &self.panorama_mesh;
                rpass.set_pipeline(&self.pipelines.panorama);
                rpass.set_bind_group(1, bind_group, &[]);
                rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rpass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }

            for cmd in frame.draws {
                let Some(GpuResource::Object {
                    part, bind_group, ..
                }) = resources.get(&cmd.resource)
                else {
                    continue;
                };
                let mesh = self.mesh_for(*part);
                rpass.set_pipeline(self.pipeline_for(cmd.layer));
                rpass.set_bind_group(1, bind_group, &[]);
                rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                rpass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// [`SceneBackend`] drawing into a canvas through WebGPU.
pub struct WgpuBackend {
    gpu: Option<GpuState>,
    canvas: web::HtmlCanvasElement,
    document: web::Document,
    resources: FnvHashMap<ResourceId, GpuResource>,
    next_id: u32,
}

impl WgpuBackend {
    pub async fn new(canvas: web::HtmlCanvasElement) -> anyhow::Result<Self> {
        let document = canvas
            .owner_document()
            .ok_or_else(|| anyhow::anyhow!("canvas is not attached to a document"))?;
        let gpu = GpuState::new(&canvas).await?;
        Ok(Self {
            gpu: Some(gpu),
            canvas,
            document,
            resources: FnvHashMap::default(),
            next_id: 1,
        })
    }

    fn gpu(&self) -> Result<&GpuState, SceneError> {
        self.gpu.as_ref().ok_or(SceneError::ContextLost)
    }

    fn insert(&mut self, resource: GpuResource) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        self.resources.insert(id, resource);
        id
    }
}

impl SceneBackend for WgpuBackend {
    fn create_panorama(&mut self, image: &PanoramaImage) -> Result<ResourceId, SceneError> {
        let gpu = self.gpu()?;
        let (texture, view) = helpers::upload_rgba_texture(
            &gpu.device,
            &gpu.queue,
            "panorama_tex",
            image.width,
            image.height,
            &image.rgba,
        );
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("panorama_bg"),
            layout: &gpu.pipelines.panorama_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&gpu.sampler),
                },
            ],
        });
        Ok(self.insert(GpuResource::Panorama {
            texture,
            bind_group,
        }))
    }

    fn create_drawable(&mut self, desc: &DrawableDesc) -> Result<ResourceId, SceneError> {
        let gpu = self.gpu()?;
        let resource = match desc {
            DrawableDesc::Marker => gpu.create_object(Part::Marker, None),
            DrawableDesc::Glow => gpu.create_object(Part::Glow, None),
            DrawableDesc::Ring => gpu.create_object(Part::Ring, None),
            DrawableDesc::Label(label_desc) => {
                let rgba = label::rasterize(&self.document, label_desc)?;
                let tex = helpers::upload_rgba_texture(
                    &gpu.device,
                    &gpu.queue,
                    "label_tex",
                    label_desc.width_px,
                    label_desc.height_px,
                    &rgba,
                );
                gpu.create_object(Part::Label, Some(tex))
            }
        };
        Ok(self.insert(resource))
    }

    fn release(&mut self, id: ResourceId) {
        if let Some(res) = self.resources.remove(&id) {
            res.destroy();
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize_if_needed(width, height);
        }
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), SceneError> {
        let gpu = self.gpu.as_mut().ok_or(SceneError::ContextLost)?;
        match gpu.render(frame, &self.resources) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = (gpu.config.width, gpu.config.height);
                gpu.surface.configure(&gpu.device, &gpu.config);
                log::warn!("[gpu] surface reconfigured {}x{}", w, h);
                Ok(())
            }
            Err(wgpu::SurfaceError::Timeout) => Ok(()),
            Err(wgpu::SurfaceError::OutOfMemory) => Err(SceneError::ContextLost),
            Err(e) => Err(SceneError::Gpu(e.to_string())),
        }
    }

    fn capture(&mut self, options: &ScreenshotOptions) -> Result<String, SceneError> {
        self.gpu()?;
        self.canvas
            .to_data_url_with_type_and_encoder_options(&options.format, &JsValue::from_f64(options.quality))
            .map_err(|e| SceneError::Gpu(format!("toDataURL failed: {:?}", e)))
    }

    fn max_texture_dimension(&self) -> u32 {
        self.gpu
            .as_ref()
            .map_or(8192, |g| g.device.limits().max_texture_dimension_2d)
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        _ = self.canvas.style().set_property("cursor", cursor.css());
    }

    fn set_tooltip(&mut self, text: Option<&str>) {
        match text {
            Some(t) => self.canvas.set_title(t),
            None => {
                _ = self.canvas.remove_attribute("title");
            }
        }
    }

    fn open_url(&mut self, url: &str, target: &str) {
        if let Some(w) = web::window() {
            if let Err(e) = w.open_with_url_and_target(url, target) {
                log::warn!("[scene] window.open failed: {:?}", e);
            }
        }
    }

    fn shutdown(&mut self) {
        for (_, res) in self.resources.drain() {
            res.destroy();
        }
        if let Some(gpu) = self.gpu.take() {
            gpu.depth.tex.destroy();
            gpu.device.destroy();
        }
        log::info!("[gpu] shut down");
    }
}
