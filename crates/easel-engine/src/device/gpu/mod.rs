//! Offscreen wgpu backend.
//!
//! Emulates the fixed-function device on top of wgpu:
//! - vertices are transformed and lit on the host ([`LightingState`]), then
//!   uploaded as clip-space [`GpuVertex`]es
//! - texture environments become a small uniform read by one WGSL pipeline,
//!   cached per (primitive, screen blend, sample count, depth state)
//! - the "screen" is an offscreen RGBA texture; read-back maps a staging
//!   buffer and blocks on device polling
//!
//! Row 0 of every color target is the bottom row, matching the rest of the
//! crate.

mod init;
mod pipeline;

pub use init::GpuInit;

use std::collections::HashMap;
use std::sync::mpsc;

use anyhow::{Context, Result, bail};
use wgpu::util::DeviceExt;

use crate::coords::{Mat4, Vec3};
use crate::lighting::{LightingState, Material};
use crate::paint::Color;
use crate::texture::{MAX_TEXTURES, Sampling, Wrap};

use super::DeviceCapabilities;
use super::api::{
    Attachment, BlendState, DrawBatch, GraphicsApi, LightCommand, MatrixMode, PixelRect,
    Primitive, RenderBufferDesc, RenderBufferFormat, ResourceId, ResourceKind, TexEnv,
    TextureDesc,
};
use pipeline::{COLOR_FORMAT, DepthKey, EnvUniform, GpuVertex, PipelineKey};

const SCREEN_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    width: u32,
    height: u32,
}

struct GpuRenderBuffer {
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    samples: u32,
}

#[derive(Default)]
struct GpuFramebuffer {
    colors: Vec<Option<ResourceId>>,
    color_rb: Option<ResourceId>,
    depth_rb: Option<ResourceId>,
    stencil_rb: Option<ResourceId>,
}

/// Texel source for a draw.
#[derive(Debug, Copy, Clone)]
enum Source {
    Texture(ResourceId),
    Screen,
}

#[derive(Debug, Copy, Clone)]
struct TargetInfo {
    width: u32,
    height: u32,
    samples: u32,
    depth_format: Option<wgpu::TextureFormat>,
}

struct Submission<'a> {
    vertices: &'a [GpuVertex],
    env: EnvUniform,
    primitive: Primitive,
    blend: BlendState,
    depth_test: bool,
    depth_write: bool,
    viewport: PixelRect,
    sources: [Option<Source>; MAX_TEXTURES],
}

/// [`GraphicsApi`] on an offscreen wgpu device.
pub struct WgpuApi {
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: DeviceCapabilities,
    multisample_count: u32,

    shader: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,

    white: GpuTexture,
    screen: GpuTexture,
    screen_depth: wgpu::TextureView,

    next_id: ResourceId,
    textures: HashMap<ResourceId, GpuTexture>,
    renderbuffers: HashMap<ResourceId, GpuRenderBuffer>,
    framebuffers: HashMap<ResourceId, GpuFramebuffer>,
    bound_fb: Option<ResourceId>,

    modelview: Mat4,
    projection: Mat4,
    viewport: PixelRect,
    depth_test: bool,
    depth_mask: bool,
    blend: BlendState,
    tex_env: [TexEnv; MAX_TEXTURES],
    lighting: LightingState,

    warned_mipmaps: bool,
}

impl WgpuApi {
    /// Creates the device and a `width` x `height` offscreen screen.
    ///
    /// Blocks on adapter/device acquisition.
    pub fn new(width: u32, height: u32, init: GpuInit) -> Result<Self> {
        pollster::block_on(Self::new_async(width, height, init))
    }

    pub async fn new_async(width: u32, height: u32, init: GpuInit) -> Result<Self> {
        anyhow::ensure!(width > 0 && height > 0, "screen has zero size");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: init.force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("easel device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        // 4x is the only multisample count every adapter supports for RGBA8.
        let multisample_count = if init.multisample_count > 1 { 4 } else { 1 };
        if init.multisample_count > 1 && init.multisample_count != 4 {
            log::debug!("multisample count {} rounded to 4", init.multisample_count);
        }

        let caps = DeviceCapabilities {
            npot_textures: true,
            auto_mipmaps: false,
            matrix_get: true,
            texenv_crossbar: true,
            vertex_buffers: true,
            framebuffer_objects: true,
            multisample_framebuffers: multisample_count > 1,
            blend_equation: true,
            max_texture_size: device.limits().max_texture_dimension_2d,
            max_line_width: 1.0,
            max_point_size: 1.0,
            max_texture_units: MAX_TEXTURES,
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("easel fixed shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fixed.wgsl").into()),
        });
        let bind_group_layout = pipeline::bind_group_layout(&device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("easel fixed pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let white_desc = TextureDesc {
            width: 1,
            height: 1,
            sampling: Sampling::Point,
            wrap_u: Wrap::Clamp,
            wrap_v: Wrap::Clamp,
        };
        let white = create_texture(&device, &white_desc, "easel white texture");
        write_pixels(&queue, &white.texture, 0, 0, 1, 1, &[0xFF; 4]);

        let screen_desc = TextureDesc { width, height, ..white_desc };
        let screen = create_texture(&device, &screen_desc, "easel screen");
        let screen_depth = create_attachment(&device, width, height, SCREEN_DEPTH_FORMAT, 1, "easel screen depth")
            .create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            device,
            queue,
            caps,
            multisample_count,
            shader,
            bind_group_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
            white,
            screen,
            screen_depth,
            next_id: 1,
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            bound_fb: None,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            viewport: PixelRect::sized(width, height),
            depth_test: true,
            depth_mask: true,
            blend: BlendState::ALPHA,
            tex_env: [TexEnv::Modulate; MAX_TEXTURES],
            lighting: LightingState::default(),
            warned_mipmaps: false,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// The offscreen texture standing in for the screen.
    pub fn screen_texture(&self) -> &wgpu::Texture {
        &self.screen.texture
    }

    // ── targets ───────────────────────────────────────────────────────────

    fn depth_buffer(&self, fb: &GpuFramebuffer) -> Option<&GpuRenderBuffer> {
        fb.depth_rb.or(fb.stencil_rb).and_then(|id| self.renderbuffers.get(&id))
    }

    fn target_info(&self, fb: Option<ResourceId>) -> Option<TargetInfo> {
        let Some(id) = fb else {
            return Some(TargetInfo {
                width: self.screen.width,
                height: self.screen.height,
                samples: 1,
                depth_format: Some(SCREEN_DEPTH_FORMAT),
            });
        };
        let f = self.framebuffers.get(&id)?;
        let (width, height, samples) = match f.color_rb.and_then(|rb| self.renderbuffers.get(&rb)) {
            Some(rb) => (rb.width, rb.height, rb.samples),
            None => {
                let tex = f.colors.first().copied().flatten().and_then(|t| self.textures.get(&t))?;
                (tex.width, tex.height, 1)
            }
        };
        let depth_format = self.depth_buffer(f).map(|rb| rb.format);
        Some(TargetInfo { width, height, samples, depth_format })
    }

    fn target_views(
        &self,
        fb: Option<ResourceId>,
    ) -> Option<(&wgpu::TextureView, Option<(&wgpu::TextureView, wgpu::TextureFormat)>)> {
        let Some(id) = fb else {
            return Some((&self.screen.view, Some((&self.screen_depth, SCREEN_DEPTH_FORMAT))));
        };
        let f = self.framebuffers.get(&id)?;
        let color = match f.color_rb.and_then(|rb| self.renderbuffers.get(&rb)) {
            Some(rb) => &rb.view,
            None => &f.colors.first().copied().flatten().and_then(|t| self.textures.get(&t))?.view,
        };
        let depth = self.depth_buffer(f).map(|rb| (&rb.view, rb.format));
        Some((color, depth))
    }

    /// Single-sample color texture of a target, for copies and read-back.
    fn color_texture(&self, fb: Option<ResourceId>) -> Option<&wgpu::Texture> {
        let Some(id) = fb else { return Some(&self.screen.texture) };
        let f = self.framebuffers.get(&id)?;
        if f.color_rb.is_some() {
            return None;
        }
        f.colors.first().copied().flatten().and_then(|t| self.textures.get(&t)).map(|t| &t.texture)
    }

    fn source(&self, src: Option<Source>) -> &GpuTexture {
        match src {
            Some(Source::Texture(id)) => self.textures.get(&id).unwrap_or(&self.white),
            Some(Source::Screen) => &self.screen,
            None => &self.white,
        }
    }

    // ── drawing ───────────────────────────────────────────────────────────

    /// Transforms, lights and de-indexes a batch.
    fn expand(&self, batch: &DrawBatch<'_>) -> Vec<GpuVertex> {
        let order: Vec<usize> = match batch.indices {
            Some(indices) => indices.iter().map(|&i| i as usize).collect(),
            None => (0..batch.positions.len()).collect(),
        };

        let mut out = Vec::with_capacity(order.len());
        for i in order {
            let Some(&[x, y, z]) = batch.positions.get(i) else { continue };
            let eye = self.modelview.transform4([x, y, z, 1.0]);
            let mut color = batch.colors.get(i).copied().unwrap_or([1.0; 4]);

            if self.lighting.enabled {
                let n = batch.normals.and_then(|n| n.get(i)).copied().unwrap_or([0.0, 0.0, 1.0]);
                let n = self.modelview.transform_vector(Vec3::from(n));
                let w = if eye[3] != 0.0 { eye[3] } else { 1.0 };
                color = self.lighting.shade(Vec3::new(eye[0] / w, eye[1] / w, eye[2] / w), n, color);
            }

            let uv = |unit: usize| batch.texcoords[unit].and_then(|t| t.get(i)).copied().unwrap_or([0.0; 2]);
            out.push(GpuVertex {
                clip: self.projection.transform4(eye),
                color,
                uv0: uv(0),
                uv1: uv(1),
            });
        }
        out
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        log::trace!("creating pipeline {key:?}");
        let pipeline = pipeline::create_pipeline(&self.device, &self.shader, &self.pipeline_layout, key);
        self.pipelines.insert(key, pipeline);
    }

    fn submit(&mut self, s: Submission<'_>) {
        if s.vertices.is_empty() {
            return;
        }
        let Some(info) = self.target_info(self.bound_fb) else {
            log::warn!("draw skipped: bound framebuffer has no color target");
            return;
        };
        let key = PipelineKey {
            primitive: s.primitive,
            blend: s.blend,
            samples: info.samples,
            depth: info.depth_format.map(|format| DepthKey {
                format,
                test: s.depth_test,
                write: s.depth_write,
            }),
        };
        self.ensure_pipeline(key);

        let Some(pipeline) = self.pipelines.get(&key) else { return };
        let Some((color, depth)) = self.target_views(self.bound_fb) else { return };

        let vbo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("easel vertex buffer"),
            contents: bytemuck::cast_slice(s.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let ubo = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("easel env ubo"),
            contents: bytemuck::bytes_of(&s.env),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let t0 = self.source(s.sources[0]);
        let t1 = self.source(s.sources[1]);
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("easel fixed bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: ubo.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&t0.view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&t0.sampler) },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(&t1.view) },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::Sampler(&t1.sampler) },
            ],
        });

        let (vx, vy, vw, vh) = clamp_viewport(s.viewport, info.width, info.height);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("easel draw encoder"),
        });
        {
            let mut rpass = begin_pass(&mut encoder, color, None, depth, wgpu::LoadOp::Load, false, false);
            rpass.set_viewport(vx, vy, vw, vh, 0.0, 1.0);
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, vbo.slice(..));
            rpass.draw(0..s.vertices.len() as u32, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Draws `src` texels of `source` over `dst` of the bound target.
    fn draw_quad(&mut self, source: Source, src: PixelRect, dst: PixelRect) {
        let Some(info) = self.target_info(self.bound_fb) else { return };
        let tex = self.source(Some(source));
        let vertices = quad(src, (tex.width, tex.height), dst, (info.width, info.height));
        self.submit(Submission {
            vertices: &vertices,
            env: EnvUniform::new(&[TexEnv::Replace, TexEnv::Modulate], 1),
            primitive: Primitive::Triangles,
            blend: BlendState::REPLACE,
            depth_test: false,
            depth_write: false,
            viewport: PixelRect::sized(info.width, info.height),
            sources: [Some(source), None],
        });
    }
}

// ── wgpu helpers ──────────────────────────────────────────────────────────

fn create_texture(device: &wgpu::Device, desc: &TextureDesc, label: &str) -> GpuTexture {
    let (width, height) = (desc.width.max(1), desc.height.max(1));
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    let filter = match desc.sampling {
        Sampling::Point => wgpu::FilterMode::Nearest,
        Sampling::Bilinear | Sampling::Trilinear => wgpu::FilterMode::Linear,
    };
    let address = |w: Wrap| match w {
        Wrap::Clamp => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
    };
    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("easel texture sampler"),
        address_mode_u: address(desc.wrap_u),
        address_mode_v: address(desc.wrap_v),
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    });

    GpuTexture { texture, view, sampler, width, height }
}

fn create_attachment(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    samples: u32,
    label: &str,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width: width.max(1), height: height.max(1), depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: samples,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, x: u32, y: u32, w: u32, h: u32, bytes: &[u8]) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * w),
            rows_per_image: Some(h),
        },
        wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
    );
}

/// Copies a region into host memory as tightly packed RGBA rows.
fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> Result<Vec<u8>> {
    let row_bytes = 4 * w;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = row_bytes.div_ceil(align) * align;

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("easel readback"),
        size: padded as u64 * h as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("easel readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(h),
            },
        },
        wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    device
        .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
        .context("device poll failed during read-back")?;
    rx.recv()
        .context("read-back callback dropped")?
        .context("failed to map read-back buffer")?;

    let data = slice.get_mapped_range();
    let mut out = Vec::with_capacity((row_bytes * h) as usize);
    for j in 0..h as usize {
        let start = j * padded as usize;
        out.extend_from_slice(&data[start..start + row_bytes as usize]);
    }
    drop(data);
    buffer.unmap();
    Ok(out)
}

fn begin_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    color: &wgpu::TextureView,
    resolve: Option<&wgpu::TextureView>,
    depth: Option<(&wgpu::TextureView, wgpu::TextureFormat)>,
    color_load: wgpu::LoadOp<wgpu::Color>,
    clear_depth: bool,
    clear_stencil: bool,
) -> wgpu::RenderPass<'e> {
    let depth_stencil_attachment = depth.map(|(view, format)| wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: format.has_depth_aspect().then(|| wgpu::Operations {
            load: if clear_depth { wgpu::LoadOp::Clear(1.0) } else { wgpu::LoadOp::Load },
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: format.has_stencil_aspect().then(|| wgpu::Operations {
            load: if clear_stencil { wgpu::LoadOp::Clear(0) } else { wgpu::LoadOp::Load },
            store: wgpu::StoreOp::Store,
        }),
    });

    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("easel pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: color,
            resolve_target: resolve,
            ops: wgpu::Operations { load: color_load, store: wgpu::StoreOp::Store },
            depth_slice: None,
        })],
        depth_stencil_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    })
}

/// Viewport clamped to the target; an empty result falls back to the whole
/// target.
fn clamp_viewport(v: PixelRect, width: u32, height: u32) -> (f32, f32, f32, f32) {
    let (tw, th) = (width as i32, height as i32);
    let x0 = v.x.clamp(0, tw);
    let y0 = v.y.clamp(0, th);
    let x1 = (v.x + v.w).clamp(0, tw);
    let y1 = (v.y + v.h).clamp(0, th);
    if x1 <= x0 || y1 <= y0 {
        return (0.0, 0.0, width as f32, height as f32);
    }
    (x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32)
}

/// Two triangles mapping `src` texels onto `dst` pixels. Negative extents
/// mirror.
fn quad(src: PixelRect, src_size: (u32, u32), dst: PixelRect, dst_size: (u32, u32)) -> [GpuVertex; 6] {
    let (sw, sh) = (src_size.0.max(1) as f32, src_size.1.max(1) as f32);
    let (dw, dh) = (dst_size.0.max(1) as f32, dst_size.1.max(1) as f32);
    let corner = |fx: i32, fy: i32| GpuVertex {
        clip: [
            2.0 * (dst.x + fx * dst.w) as f32 / dw - 1.0,
            2.0 * (dst.y + fy * dst.h) as f32 / dh - 1.0,
            0.0,
            1.0,
        ],
        color: [1.0; 4],
        uv0: [(src.x + fx * src.w) as f32 / sw, (src.y + fy * src.h) as f32 / sh],
        uv1: [0.0; 2],
    };
    let (a, b, c, d) = (corner(0, 0), corner(1, 0), corner(1, 1), corner(0, 1));
    [a, b, c, a, c, d]
}

impl GraphicsApi for WgpuApi {
    fn capabilities(&self) -> DeviceCapabilities {
        self.caps
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.screen.width, self.screen.height)
    }

    fn gen_resource(&mut self, kind: ResourceKind) -> ResourceId {
        let id = self.next_id;
        self.next_id += 1;
        if kind == ResourceKind::Framebuffer {
            self.framebuffers.insert(id, GpuFramebuffer::default());
        }
        id
    }

    fn delete_resource(&mut self, kind: ResourceKind, id: ResourceId) {
        match kind {
            ResourceKind::Texture => {
                self.textures.remove(&id);
            }
            ResourceKind::Framebuffer => {
                self.framebuffers.remove(&id);
            }
            ResourceKind::RenderBuffer => {
                self.renderbuffers.remove(&id);
            }
            // Vertex data is streamed per draw.
            ResourceKind::VertexBuffer => {}
        }
    }

    fn load_matrix(&mut self, mode: MatrixMode, m: &Mat4) {
        match mode {
            MatrixMode::ModelView => self.modelview = *m,
            MatrixMode::Projection => self.projection = *m,
        }
    }

    fn viewport(&mut self, rect: PixelRect) {
        self.viewport = rect;
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn set_depth_mask(&mut self, enabled: bool) {
        self.depth_mask = enabled;
    }

    fn set_blend(&mut self, state: BlendState) {
        self.blend = state;
    }

    fn clear(&mut self, color: Option<Color>, depth: bool, stencil: bool) {
        let Some((view, depth_view)) = self.target_views(self.bound_fb) else { return };
        let load = match color {
            Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                r: c.r as f64,
                g: c.g as f64,
                b: c.b as f64,
                a: c.a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("easel clear encoder"),
        });
        drop(begin_pass(&mut encoder, view, None, depth_view, load, depth, stencil));
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn set_lighting(&mut self, enabled: bool) {
        self.lighting.enabled = enabled;
    }

    fn light(&mut self, index: usize, cmd: LightCommand) {
        self.lighting.apply(index, cmd, &self.modelview);
    }

    fn material(&mut self, material: &Material) {
        self.lighting.material = *material;
    }

    fn tex_image(&mut self, id: ResourceId, desc: &TextureDesc) {
        let tex = create_texture(&self.device, desc, "easel texture");
        self.textures.insert(id, tex);
    }

    fn tex_sub_image(&mut self, id: ResourceId, rect: PixelRect, pixels: &[u32]) {
        let Some(tex) = self.textures.get(&id) else { return };
        let fits = rect.x >= 0
            && rect.y >= 0
            && rect.w > 0
            && rect.h > 0
            && (rect.x + rect.w) as u32 <= tex.width
            && (rect.y + rect.h) as u32 <= tex.height;
        if !fits || pixels.len() < (rect.w * rect.h) as usize {
            log::warn!("texture upload {rect:?} does not fit texture {id}; ignored");
            return;
        }
        let order = self.byte_order();
        let bytes: Vec<u8> = pixels[..(rect.w * rect.h) as usize]
            .iter()
            .flat_map(|&p| order.to_bytes(p))
            .collect();
        write_pixels(&self.queue, &tex.texture, rect.x as u32, rect.y as u32, rect.w as u32, rect.h as u32, &bytes);
    }

    fn generate_mipmaps(&mut self, id: ResourceId) {
        if !self.warned_mipmaps {
            log::debug!("mipmap generation unavailable; texture {id} keeps its base level");
            self.warned_mipmaps = true;
        }
    }

    fn tex_env(&mut self, unit: usize, env: TexEnv) {
        if let Some(slot) = self.tex_env.get_mut(unit) {
            *slot = env;
        }
    }

    fn bind_framebuffer(&mut self, fb: Option<ResourceId>) {
        self.bound_fb = fb;
    }

    fn attach_texture(&mut self, fb: ResourceId, index: usize, tex: Option<ResourceId>) {
        let Some(f) = self.framebuffers.get_mut(&fb) else { return };
        if f.colors.len() <= index {
            f.colors.resize(index + 1, None);
        }
        f.colors[index] = tex;
    }

    fn renderbuffer_storage(&mut self, rb: ResourceId, desc: &RenderBufferDesc) {
        let format = match desc.format {
            RenderBufferFormat::Color => COLOR_FORMAT,
            RenderBufferFormat::Depth(bits) if bits > 24 => wgpu::TextureFormat::Depth32Float,
            RenderBufferFormat::Depth(_) => wgpu::TextureFormat::Depth24Plus,
            RenderBufferFormat::Stencil(_) => wgpu::TextureFormat::Stencil8,
            RenderBufferFormat::DepthStencil => wgpu::TextureFormat::Depth24PlusStencil8,
        };
        let samples = if desc.samples > 1 { self.multisample_count } else { 1 };
        let texture = create_attachment(&self.device, desc.width, desc.height, format, samples, "easel render buffer");
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.renderbuffers.insert(
            rb,
            GpuRenderBuffer { view, format, width: desc.width, height: desc.height, samples },
        );
    }

    fn attach_renderbuffer(&mut self, fb: ResourceId, slot: Attachment, rb: ResourceId) {
        let format = self.renderbuffers.get(&rb).map(|r| r.format);
        let Some(f) = self.framebuffers.get_mut(&fb) else { return };
        match slot {
            Attachment::Color(_) => f.color_rb = Some(rb),
            Attachment::Depth => {
                f.depth_rb = Some(rb);
                if format.is_some_and(|fmt| fmt.has_stencil_aspect()) {
                    f.stencil_rb = Some(rb);
                }
            }
            Attachment::Stencil => f.stencil_rb = Some(rb),
        }
    }

    fn framebuffer_complete(&mut self, fb: ResourceId) -> bool {
        let Some(info) = self.target_info(Some(fb)) else { return false };
        let Some(f) = self.framebuffers.get(&fb) else { return false };
        self.depth_buffer(f).is_none_or(|d| d.samples == info.samples)
    }

    fn blit_framebuffer(
        &mut self,
        src: Option<ResourceId>,
        dst: Option<ResourceId>,
        src_rect: PixelRect,
        dst_rect: PixelRect,
    ) {
        let (Some(si), Some(di)) = (self.target_info(src), self.target_info(dst)) else { return };

        if si.samples > 1 {
            if di.samples != 1 || (si.width, si.height) != (di.width, di.height) {
                log::warn!("multisample resolve needs a single-sample target of the same size");
                return;
            }
            let (Some((ms_view, _)), Some((dst_view, _))) = (self.target_views(src), self.target_views(dst))
            else {
                return;
            };
            let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("easel resolve encoder"),
            });
            drop(begin_pass(&mut encoder, ms_view, Some(dst_view), None, wgpu::LoadOp::Load, false, false));
            self.queue.submit(std::iter::once(encoder.finish()));
            return;
        }

        let source = match src {
            None => Source::Screen,
            Some(id) => match self.framebuffers.get(&id).and_then(|f| f.colors.first().copied().flatten()) {
                Some(tex) => Source::Texture(tex),
                None => return,
            },
        };
        let prev = self.bound_fb;
        self.bound_fb = dst;
        self.draw_quad(source, src_rect, dst_rect);
        self.bound_fb = prev;
    }

    fn read_pixels(&mut self, rect: PixelRect) -> Result<Vec<u32>> {
        let Some(texture) = self.color_texture(self.bound_fb) else {
            bail!("read_pixels: bound framebuffer has no single-sample color texture");
        };
        let mut out = vec![0u32; (rect.w.max(0) * rect.h.max(0)) as usize];

        let (tw, th) = (texture.width() as i32, texture.height() as i32);
        let x0 = rect.x.clamp(0, tw);
        let y0 = rect.y.clamp(0, th);
        let x1 = (rect.x + rect.w).clamp(0, tw);
        let y1 = (rect.y + rect.h).clamp(0, th);
        if x1 <= x0 || y1 <= y0 {
            return Ok(out);
        }

        let (cw, ch) = ((x1 - x0) as u32, (y1 - y0) as u32);
        let bytes = read_texture(&self.device, &self.queue, texture, x0 as u32, y0 as u32, cw, ch)?;
        let order = self.byte_order();
        for j in 0..ch as i32 {
            for i in 0..cw as i32 {
                let k = ((j * cw as i32 + i) * 4) as usize;
                let o = ((y0 + j - rect.y) * rect.w + (x0 + i - rect.x)) as usize;
                out[o] = order.from_bytes([bytes[k], bytes[k + 1], bytes[k + 2], bytes[k + 3]]);
            }
        }
        Ok(out)
    }

    fn copy_to_texture(&mut self, tex: ResourceId, rect: PixelRect) {
        let Some(src) = self.color_texture(self.bound_fb) else {
            log::warn!("copy_to_texture: bound framebuffer has no single-sample color texture");
            return;
        };
        let Some(dst) = self.textures.get(&tex) else { return };
        let x0 = rect.x.max(0) as u32;
        let y0 = rect.y.max(0) as u32;
        let x1 = ((rect.x + rect.w).max(0) as u32).min(src.width()).min(dst.width);
        let y1 = ((rect.y + rect.h).max(0) as u32).min(src.height()).min(dst.height);
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let origin = wgpu::Origin3d { x: x0, y: y0, z: 0 };
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("easel copy encoder"),
        });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo { texture: src, mip_level: 0, origin, aspect: wgpu::TextureAspect::All },
            wgpu::TexelCopyTextureInfo { texture: &dst.texture, mip_level: 0, origin, aspect: wgpu::TextureAspect::All },
            wgpu::Extent3d { width: x1 - x0, height: y1 - y0, depth_or_array_layers: 1 },
        );
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn draw_texture(&mut self, tex: ResourceId, src: PixelRect, dst: PixelRect) {
        if !self.textures.contains_key(&tex) {
            return;
        }
        self.draw_quad(Source::Texture(tex), src, dst);
    }

    fn draw(&mut self, batch: &DrawBatch<'_>) {
        let vertices = self.expand(batch);
        let mut sources = [None; MAX_TEXTURES];
        for (slot, &id) in sources.iter_mut().zip(batch.textures) {
            *slot = Some(Source::Texture(id));
        }
        self.submit(Submission {
            vertices: &vertices,
            env: EnvUniform::new(&self.tex_env, batch.textures.len()),
            primitive: batch.primitive,
            blend: self.blend,
            depth_test: self.depth_test,
            depth_write: self.depth_mask,
            viewport: self.viewport,
            sources,
        });
    }

    fn finish(&mut self) -> Result<()> {
        self.device
            .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
            .context("device poll failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_is_clamped_to_target() {
        assert_eq!(clamp_viewport(PixelRect::new(-5, 2, 20, 4), 10, 10), (0.0, 2.0, 10.0, 4.0));
        assert_eq!(clamp_viewport(PixelRect::new(0, 0, 0, 0), 8, 6), (0.0, 0.0, 8.0, 6.0));
    }

    #[test]
    fn quad_maps_pixels_to_clip_space() {
        let q = quad(PixelRect::sized(4, 4), (4, 4), PixelRect::new(0, 0, 8, 8), (8, 8));
        assert_eq!(q[0].clip, [-1.0, -1.0, 0.0, 1.0]);
        assert_eq!(q[2].clip, [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(q[2].uv0, [1.0, 1.0]);
    }

    #[test]
    fn mirrored_quad_swaps_texcoords() {
        let q = quad(PixelRect::new(0, 4, 4, -4), (4, 4), PixelRect::sized(4, 4), (4, 4));
        assert_eq!(q[0].uv0, [0.0, 1.0]);
        assert_eq!(q[2].uv0, [1.0, 0.0]);
    }
}
