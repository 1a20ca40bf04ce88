//! wgpu implementation of [`GpuDevice`].
//! wgpu = 26.x, winit = 0.30.x
//!
//! Draws issued between [`WgpuDevice::begin_frame`] and
//! [`WgpuDevice::end_frame`] are recorded with a snapshot of the uniforms in
//! use and replayed in one render pass when the frame ends. Each snapshot
//! takes one 256-byte slot of a shared uniform buffer, selected per draw with
//! a dynamic offset.

use std::num::NonZeroU64;
use std::sync::Arc;

use asset::TextureData;
use bytemuck::{Pod, Zeroable};
use corelib::handles::{BufferId, TextureId, VertexArrayId};
use glam::{Mat4, Vec3};
use slotmap::SlotMap;
use wgpu::{
    AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource, BindingType, BlendState,
    Buffer, BufferBinding, BufferBindingType, BufferDescriptor, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompositeAlphaMode, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits,
    LoadOp, Operations, PipelineLayout, PipelineLayoutDescriptor, PowerPreference, PresentMode,
    PrimitiveState, PrimitiveTopology, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    SamplerBindingType, SamplerDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages,
    ShaderModule, StoreOp, Surface, SurfaceConfiguration, SurfaceError, TexelCopyBufferLayout,
    TexelCopyTextureInfo, TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType,
    TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension, VertexBufferLayout,
    VertexState, VertexStepMode, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::error::{GpuError, GpuResult};
use crate::gpu::{
    DIFFUSE_TEXTURE_UNIT, FilterMode, GpuDevice, LINE_VERTEX_LAYOUT, MODEL_VERTEX_LAYOUT,
    Primitive, SamplerDesc, VertexLayout, WrapMode,
};
use crate::shader::{self, ProgramTable, ShaderProgram, SharedPrograms, UniformBlock};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

const MODEL_BUFFER_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: MODEL_VERTEX_LAYOUT.stride_floats as u64 * 4,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2, 2 => Float32x3],
};

const LINE_BUFFER_LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
    array_stride: LINE_VERTEX_LAYOUT.stride_floats as u64 * 4,
    step_mode: VertexStepMode::Vertex,
    attributes: &wgpu::vertex_attr_array![0 => Float32x3],
};

/// Bytes per draw in the uniform ring. Also the dynamic offset alignment.
const UNIFORM_SLOT: usize = 256;

type UniformSlot = [u8; UNIFORM_SLOT];

/// Uniform block of `shaders/model.wgsl` (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ModelUniforms {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    ambient: [f32; 4],
    diffuse: [f32; 4],
    specular: [f32; 4],
    flags: [u32; 4],
}

impl ModelUniforms {
    fn from_block(block: &UniformBlock, textured: bool) -> Self {
        let mat = |name| block.mat4(name).unwrap_or(Mat4::IDENTITY).to_cols_array_2d();
        let ambient = block.vec3(shader::MATERIAL_AMBIENT).unwrap_or(Vec3::ZERO);
        let diffuse = block.vec3(shader::MATERIAL_DIFFUSE).unwrap_or(Vec3::ONE);
        let specular = block.vec3(shader::MATERIAL_SPECULAR).unwrap_or(Vec3::ZERO);
        let shininess = block.float(shader::MATERIAL_SHININESS).unwrap_or(1.0);
        Self {
            projection: mat(shader::PROJECTION),
            view: mat(shader::VIEW),
            model: mat(shader::MODEL),
            ambient: ambient.extend(1.0).to_array(),
            diffuse: diffuse.extend(1.0).to_array(),
            specular: specular.extend(shininess).to_array(),
            flags: [u32::from(textured), 0, 0, 0],
        }
    }
}

/// Uniform block of `shaders/line.wgsl`, padded to one slot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct LineUniforms {
    projection: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    color: [f32; 4],
    _pad: [[f32; 4]; 3],
}

impl LineUniforms {
    fn from_block(block: &UniformBlock) -> Self {
        let mat = |name| block.mat4(name).unwrap_or(Mat4::IDENTITY).to_cols_array_2d();
        let color = block.vec3(shader::LINE_COLOR).unwrap_or(Vec3::ONE);
        Self {
            projection: mat(shader::PROJECTION),
            view: mat(shader::VIEW),
            model: mat(shader::MODEL),
            color: color.extend(1.0).to_array(),
            _pad: [[0.0; 4]; 3],
        }
    }
}

/// One uniform buffer reused every frame. Grows to the next power of two
/// when a frame has more draws than slots.
struct UniformRing {
    buffer: Buffer,
    bind_group: BindGroup,
    slots: usize,
}

impl UniformRing {
    fn new(device: &Device, layout: &BindGroupLayout, slots: usize) -> Self {
        let slots = slots.max(1);
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Uniform Ring"),
            size: (slots * UNIFORM_SLOT) as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("Uniform Ring BG"),
            layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: BindingResource::Buffer(BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(UNIFORM_SLOT as u64),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            slots,
        }
    }

    fn write(
        &mut self,
        device: &Device,
        queue: &Queue,
        layout: &BindGroupLayout,
        data: &[UniformSlot],
    ) {
        if data.len() > self.slots {
            let slots = data.len().next_power_of_two();
            log::debug!("Uniform ring grows from {} to {} slots", self.slots, slots);
            *self = Self::new(device, layout, slots);
        }
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, data.as_flattened());
        }
    }

    fn offset(index: usize) -> u32 {
        (index * UNIFORM_SLOT) as u32
    }
}

struct GpuBuffer {
    buffer: Buffer,
    float_count: usize,
}

struct GpuVertexArray {
    buffer: BufferId,
    layout: VertexLayout,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: BindGroup,
}

struct PendingDraw {
    primitive: Primitive,
    vertex_array: VertexArrayId,
    texture: Option<TextureId>,
    first: u32,
    count: u32,
    uniforms: UniformSlot,
}

pub struct WgpuDevice {
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    device: Device,
    queue: Queue,
    model_pipeline: RenderPipeline,
    line_pipeline: RenderPipeline,
    uniform_bgl: BindGroupLayout,
    uniform_ring: UniformRing,
    texture_bgl: BindGroupLayout,
    depth_view: TextureView,
    /// 1x1 white texture bound for untextured draws.
    fallback: GpuTexture,

    buffers: SlotMap<BufferId, GpuBuffer>,
    vertex_arrays: SlotMap<VertexArrayId, GpuVertexArray>,
    textures: SlotMap<TextureId, GpuTexture>,
    programs: SharedPrograms,

    bound_vertex_array: Option<VertexArrayId>,
    bound_texture: Option<TextureId>,
    pending: Vec<PendingDraw>,

    clear_color: wgpu::Color,
    width: u32,
    height: u32,
}

impl WgpuDevice {
    /// Create the device bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: wgpu::Backends) -> GpuResult<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window)
            .map_err(|e| GpuError::Device(format!("create_surface: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| GpuError::Device(format!("no suitable adapter: {e}")))?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Gyro3D Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| GpuError::Device(format!("request_device: {e}")))?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| GpuError::Device("surface reports no formats".into()))?;

        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        let depth_view = create_depth_view(&device, &surface_config);

        let model_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Model WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
        });
        let line_shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Line WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/line.wgsl").into()),
        });

        let uniform_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Uniforms BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(UNIFORM_SLOT as u64),
                },
                count: None,
            }],
        });
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Diffuse Map BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let model_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Model PipelineLayout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let model_pipeline = create_pipeline(
            &device,
            "Model Pipeline",
            &model_layout,
            &model_shader,
            MODEL_BUFFER_LAYOUT,
            PrimitiveTopology::TriangleList,
            surface_format,
        );
        let line_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Line PipelineLayout"),
            bind_group_layouts: &[&uniform_bgl],
            push_constant_ranges: &[],
        });
        let line_pipeline = create_pipeline(
            &device,
            "Line Pipeline",
            &line_layout,
            &line_shader,
            LINE_BUFFER_LAYOUT,
            PrimitiveTopology::LineList,
            surface_format,
        );
        let uniform_ring = UniformRing::new(&device, &uniform_bgl, 64);

        let fallback = upload_texture(
            &device,
            &queue,
            &texture_bgl,
            "Fallback White",
            &TextureData::solid(1, 1, [255; 4]),
            &SamplerDesc {
                wrap: WrapMode::ClampToEdge,
                generate_mipmaps: false,
                ..SamplerDesc::MATERIAL
            },
        )?;

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            model_pipeline,
            line_pipeline,
            uniform_bgl,
            uniform_ring,
            texture_bgl,
            depth_view,
            fallback,
            buffers: SlotMap::with_key(),
            vertex_arrays: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            programs: ProgramTable::shared(),
            bound_vertex_array: None,
            bound_texture: None,
            pending: Vec::new(),
            clear_color: wgpu::Color {
                r: 0.05,
                g: 0.05,
                b: 0.08,
                a: 1.0,
            },
            width,
            height,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize: reconfigure surface & recreate depth view.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config);
    }

    pub fn is_surface_lost(err: &GpuError) -> bool {
        matches!(
            err,
            GpuError::Surface(SurfaceError::Lost | SurfaceError::Outdated)
        )
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }

    /// Drop draws left over from an abandoned frame.
    pub fn begin_frame(&mut self) {
        self.pending.clear();
    }

    /// Clear, replay the recorded draws and present.
    pub fn end_frame(&mut self) -> GpuResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&TextureViewDescriptor::default());

        let slots: Vec<UniformSlot> = pending.iter().map(|draw| draw.uniforms).collect();
        self.uniform_ring
            .write(&self.device, &self.queue, &self.uniform_bgl, &slots);

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("MainPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.clear_color),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            let mut current = None;
            for (index, draw) in pending.iter().enumerate() {
                // Resources deleted after the draw was recorded are skipped.
                let Some(buffer) = self
                    .vertex_arrays
                    .get(draw.vertex_array)
                    .and_then(|va| self.buffers.get(va.buffer))
                else {
                    continue;
                };

                if current != Some(draw.primitive) {
                    rpass.set_pipeline(match draw.primitive {
                        Primitive::Triangles => &self.model_pipeline,
                        Primitive::Lines => &self.line_pipeline,
                    });
                    current = Some(draw.primitive);
                }
                rpass.set_bind_group(
                    0,
                    &self.uniform_ring.bind_group,
                    &[UniformRing::offset(index)],
                );
                if draw.primitive == Primitive::Triangles {
                    let texture = draw
                        .texture
                        .and_then(|id| self.textures.get(id))
                        .unwrap_or(&self.fallback);
                    rpass.set_bind_group(1, &texture.bind_group, &[]);
                }
                rpass.set_vertex_buffer(0, buffer.buffer.slice(..));
                rpass.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        log::trace!("Presented frame with {} draw(s)", pending.len());
        Ok(())
    }
}

impl GpuDevice for WgpuDevice {
    fn create_buffer(&mut self, label: &str, data: &[f32]) -> GpuResult<BufferId> {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: BufferUsages::VERTEX,
            });
        Ok(self.buffers.insert(GpuBuffer {
            buffer,
            float_count: data.len(),
        }))
    }

    fn create_vertex_array(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> GpuResult<VertexArrayId> {
        if *layout != MODEL_VERTEX_LAYOUT && *layout != LINE_VERTEX_LAYOUT {
            return Err(GpuError::UnsupportedLayout);
        }
        if !self.buffers.contains_key(buffer) {
            return Err(GpuError::UnknownHandle { kind: "buffer" });
        }
        Ok(self.vertex_arrays.insert(GpuVertexArray {
            buffer,
            layout: *layout,
        }))
    }

    fn create_texture(
        &mut self,
        label: &str,
        data: &TextureData,
        sampler: &SamplerDesc,
    ) -> GpuResult<TextureId> {
        let texture = upload_texture(
            &self.device,
            &self.queue,
            &self.texture_bgl,
            label,
            data,
            sampler,
        )?;
        Ok(self.textures.insert(texture))
    }

    fn create_shader_program(&mut self, label: &str) -> GpuResult<Box<dyn ShaderProgram>> {
        Ok(Box::new(ProgramTable::create(&self.programs, label)))
    }

    fn delete_buffer(&mut self, id: BufferId) -> GpuResult<()> {
        let gpu = self
            .buffers
            .remove(id)
            .ok_or(GpuError::UnknownHandle { kind: "buffer" })?;
        gpu.buffer.destroy();
        Ok(())
    }

    fn delete_vertex_array(&mut self, id: VertexArrayId) -> GpuResult<()> {
        self.vertex_arrays
            .remove(id)
            .ok_or(GpuError::UnknownHandle {
                kind: "vertex array",
            })?;
        if self.bound_vertex_array == Some(id) {
            self.bound_vertex_array = None;
        }
        Ok(())
    }

    fn delete_texture(&mut self, id: TextureId) -> GpuResult<()> {
        let gpu = self
            .textures
            .remove(id)
            .ok_or(GpuError::UnknownHandle { kind: "texture" })?;
        gpu.texture.destroy();
        if self.bound_texture == Some(id) {
            self.bound_texture = None;
        }
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        if unit != DIFFUSE_TEXTURE_UNIT {
            log::warn!("Texture unit {} is not supported, bind ignored", unit);
            return;
        }
        self.bound_texture = texture.filter(|id| self.textures.contains_key(*id));
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<VertexArrayId>) {
        self.bound_vertex_array = vertex_array.filter(|id| self.vertex_arrays.contains_key(*id));
    }

    fn draw_arrays(&mut self, primitive: Primitive, first: u32, count: u32) -> GpuResult<()> {
        let programs = self.programs.borrow();
        let (_, block) = programs.current_block().ok_or(GpuError::NoProgramBound)?;
        let vertex_array = self.bound_vertex_array.ok_or(GpuError::NoVertexArrayBound)?;
        let va = self
            .vertex_arrays
            .get(vertex_array)
            .ok_or(GpuError::UnknownHandle {
                kind: "vertex array",
            })?;
        if va.layout != pipeline_vertex_layout(primitive) {
            return Err(GpuError::UnsupportedLayout);
        }
        let buffer = self
            .buffers
            .get(va.buffer)
            .ok_or(GpuError::UnknownHandle { kind: "buffer" })?;

        let available = va.layout.vertex_count(buffer.float_count);
        if first.checked_add(count).is_none_or(|end| end > available) {
            return Err(GpuError::DrawOutOfRange {
                first,
                count,
                available,
            });
        }

        let uniforms = match primitive {
            Primitive::Triangles => {
                bytemuck::cast(ModelUniforms::from_block(block, self.bound_texture.is_some()))
            }
            Primitive::Lines => bytemuck::cast(LineUniforms::from_block(block)),
        };
        let draw = PendingDraw {
            primitive,
            vertex_array,
            texture: self.bound_texture,
            first,
            count,
            uniforms,
        };
        drop(programs);
        self.pending.push(draw);
        Ok(())
    }
}

/// The vertex layout the pipeline for `primitive` reads.
fn pipeline_vertex_layout(primitive: Primitive) -> VertexLayout {
    match primitive {
        Primitive::Triangles => MODEL_VERTEX_LAYOUT,
        Primitive::Lines => LINE_VERTEX_LAYOUT,
    }
}

/// Both windings are drawn; OBJ files do not agree on one.
fn primitive_state(topology: PrimitiveTopology) -> PrimitiveState {
    PrimitiveState {
        topology,
        cull_mode: None,
        ..Default::default()
    }
}

/// Depth-tested pipeline with `vs_main`/`fs_main` entry points.
fn create_pipeline(
    device: &Device,
    label: &str,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    buffer: VertexBufferLayout<'static>,
    topology: PrimitiveTopology,
    format: TextureFormat,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[buffer],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: primitive_state(topology),
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Upload a texture as RGBA8 sRGB with the requested sampler, plus its bind
/// group for the diffuse-map slot.
fn upload_texture(
    device: &Device,
    queue: &Queue,
    layout: &BindGroupLayout,
    label: &str,
    data: &TextureData,
    sampler: &SamplerDesc,
) -> GpuResult<GpuTexture> {
    let rgba = data.to_rgba8();
    let levels = if sampler.generate_mipmaps {
        rgba.mip_chain()
    } else if rgba.is_valid() {
        vec![rgba]
    } else {
        Vec::new()
    };
    let Some(base) = levels.first() else {
        return Err(GpuError::InvalidTexture(label.to_owned()));
    };

    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width: base.width,
            height: base.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: levels.len() as u32,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (mip_level, level) in levels.iter().enumerate() {
        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: mip_level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &level.data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * level.width),
                rows_per_image: Some(level.height),
            },
            Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&TextureViewDescriptor::default());
    let sampler = device.create_sampler(&SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode(sampler.wrap),
        address_mode_v: address_mode(sampler.wrap),
        address_mode_w: address_mode(sampler.wrap),
        mag_filter: filter_mode(sampler.mag_filter),
        min_filter: filter_mode(sampler.min_filter),
        mipmap_filter: filter_mode(sampler.mipmap_filter),
        ..Default::default()
    });
    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(&view),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(&sampler),
            },
        ],
    });

    log::debug!(
        "Uploaded texture '{}' {}x{} with {} mip level(s)",
        label,
        base.width,
        base.height,
        levels.len()
    );
    Ok(GpuTexture {
        texture,
        bind_group,
    })
}

fn address_mode(wrap: WrapMode) -> AddressMode {
    match wrap {
        WrapMode::Repeat => AddressMode::Repeat,
        WrapMode::ClampToEdge => AddressMode::ClampToEdge,
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_block_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<ModelUniforms>(), 256);
        assert_eq!(MODEL_BUFFER_LAYOUT.array_stride, MODEL_VERTEX_LAYOUT.stride_bytes());
        let offsets: Vec<u64> = MODEL_BUFFER_LAYOUT
            .attributes
            .iter()
            .map(|a| a.offset)
            .collect();
        let expected: Vec<u64> = MODEL_VERTEX_LAYOUT
            .attributes
            .iter()
            .map(|a| u64::from(a.offset_floats) * 4)
            .collect();
        assert_eq!(offsets, expected);
    }

    #[test]
    fn both_uniform_blocks_fill_exactly_one_ring_slot() {
        assert_eq!(std::mem::size_of::<ModelUniforms>(), UNIFORM_SLOT);
        assert_eq!(std::mem::size_of::<LineUniforms>(), UNIFORM_SLOT);
        assert_eq!(UniformRing::offset(3), 768);
        assert_eq!(LINE_BUFFER_LAYOUT.array_stride, LINE_VERTEX_LAYOUT.stride_bytes());
    }

    #[test]
    fn each_primitive_reads_its_own_vertex_layout() {
        assert_eq!(pipeline_vertex_layout(Primitive::Triangles), MODEL_VERTEX_LAYOUT);
        assert_eq!(pipeline_vertex_layout(Primitive::Lines), LINE_VERTEX_LAYOUT);
    }

    #[test]
    fn pipelines_do_not_cull() {
        for topology in [PrimitiveTopology::TriangleList, PrimitiveTopology::LineList] {
            let state = primitive_state(topology);
            assert_eq!(state.topology, topology);
            assert_eq!(state.cull_mode, None);
        }
    }

    #[test]
    fn line_uniforms_carry_matrices_and_color() {
        let mut block = UniformBlock::default();
        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -3.0));
        block.set(shader::VIEW, crate::shader::UniformValue::Mat4(view));
        block.set(
            shader::LINE_COLOR,
            crate::shader::UniformValue::Vec3(Vec3::new(0.0, 1.0, 0.0)),
        );

        let u = LineUniforms::from_block(&block);
        assert_eq!(u.view, view.to_cols_array_2d());
        assert_eq!(u.model, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(u.color, [0.0, 1.0, 0.0, 1.0]);

        let slot: UniformSlot = bytemuck::cast(u);
        assert_eq!(&slot[192..208], bytemuck::bytes_of(&u.color));
    }

    #[test]
    fn uniforms_pack_material_and_texture_flag() {
        let mut block = UniformBlock::default();
        block.set(
            shader::MATERIAL_SPECULAR,
            crate::shader::UniformValue::Vec3(Vec3::new(0.5, 0.5, 0.5)),
        );
        block.set(shader::MATERIAL_SHININESS, crate::shader::UniformValue::Float(32.0));

        let u = ModelUniforms::from_block(&block, true);
        assert_eq!(u.specular, [0.5, 0.5, 0.5, 32.0]);
        assert_eq!(u.diffuse, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(u.model, Mat4::IDENTITY.to_cols_array_2d());
        assert_eq!(u.flags[0], 1);
    }
}
