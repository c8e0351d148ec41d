use super::helpers::vertex_layout;
use super::targets::DEPTH_FORMAT;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct CameraUniforms {
    pub(crate) view_proj: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ObjectUniforms {
    pub(crate) model: [[f32; 4]; 4],
    pub(crate) color: [f32; 4],
    /// xyz emissive, w = 1 for textured parts
    pub(crate) emissive: [f32; 4],
}

/// How a pipeline treats depth and faces.
#[derive(Clone, Copy)]
struct PassState {
    cull: Option<wgpu::Face>,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
    blend: Option<wgpu::BlendState>,
}

pub(crate) struct Pipelines {
    pub(crate) camera_bgl: wgpu::BindGroupLayout,
    pub(crate) panorama_bgl: wgpu::BindGroupLayout,
    pub(crate) object_bgl: wgpu::BindGroupLayout,
    pub(crate) panorama: wgpu::RenderPipeline,
    pub(crate) marker: wgpu::RenderPipeline,
    pub(crate) glow: wgpu::RenderPipeline,
    pub(crate) overlay: wgpu::RenderPipeline,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn make_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    color_format: wgpu::TextureFormat,
    state: PassState,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            cull_mode: state.cull,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: state.depth_write,
            depth_compare: state.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: state.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        cache: None,
        multiview: None,
    })
}

pub(crate) fn create_pipelines(device: &wgpu::Device, color_format: wgpu::TextureFormat) -> Pipelines {
    let camera_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("camera_bgl"),
        entries: &[uniform_entry(0, wgpu::ShaderStages::VERTEX)],
    });
    let panorama_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("panorama_bgl"),
        entries: &[texture_entry(0), sampler_entry(1)],
    });
    let object_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("object_bgl"),
        entries: &[
            uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
            texture_entry(1),
            sampler_entry(2),
        ],
    });

    let panorama_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("panorama_shader"),
        source: wgpu::ShaderSource::Wgsl(crate::core::PANORAMA_WGSL.into()),
    });
    let object_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("object_shader"),
        source: wgpu::ShaderSource::Wgsl(crate::core::OBJECT_WGSL.into()),
    });

    let panorama_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("panorama_pl"),
        bind_group_layouts: &[&camera_bgl, &panorama_bgl],
        push_constant_ranges: &[],
    });
    let object_pl = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("object_pl"),
        bind_group_layouts: &[&camera_bgl, &object_bgl],
        push_constant_ranges: &[],
    });

    let translucent = Some(wgpu::BlendState::ALPHA_BLENDING);
    let panorama = make_pipeline(
        device,
        "panorama_pipeline",
        &panorama_pl,
        &panorama_shader,
        color_format,
        PassState {
            cull: None,
            depth_write: false,
            depth_compare: wgpu::CompareFunction::Always,
            blend: None,
        },
    );
    let marker = make_pipeline(
        device,
        "marker_pipeline",
        &object_pl,
        &object_shader,
        color_format,
        PassState {
            cull: Some(wgpu::Face::Back),
            depth_write: true,
            depth_compare: wgpu::CompareFunction::Less,
            blend: translucent,
        },
    );
    // Glow shells show their back faces around the marker.
    let glow = make_pipeline(
        device,
        "glow_pipeline",
        &object_pl,
        &object_shader,
        color_format,
        PassState {
            cull: Some(wgpu::Face::Front),
            depth_write: false,
            depth_compare: wgpu::CompareFunction::Less,
            blend: translucent,
        },
    );
    let overlay = make_pipeline(
        device,
        "overlay_pipeline",
        &object_pl,
        &object_shader,
        color_format,
        PassState {
            cull: None,
            depth_write: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            blend: translucent,
        },
    );

    Pipelines {
        camera_bgl,
        panorama_bgl,
        object_bgl,
        panorama,
        marker,
        glow,
        overlay,
    }
}
