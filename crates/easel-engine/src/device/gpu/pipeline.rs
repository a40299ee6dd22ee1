//! GPU types for the fixed-function pipeline: vertex layout, texture
//! environment uniform, blend translation and the cached pipeline builder.

use bytemuck::{Pod, Zeroable};

use crate::device::api::{
    BlendEquation, BlendFactor, BlendState, Combine, CombineFunc, CombineSource, Primitive, TexEnv,
};
use crate::texture::MAX_TEXTURES;

pub(super) const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ── vertex ────────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct GpuVertex {
    pub clip: [f32; 4],
    pub color: [f32; 4],
    pub uv0: [f32; 2],
    pub uv1: [f32; 2],
}

impl GpuVertex {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x4, // clip
        1 => Float32x4, // color
        2 => Float32x2, // uv0
        3 => Float32x2  // uv1
    ];

    pub(super) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

// ── texture environment uniform ───────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct UnitUniform {
    pub mode: [u32; 4],
    pub rgb: [u32; 4],
    pub alpha: [u32; 4],
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub(super) struct EnvUniform {
    pub units: [UnitUniform; MAX_TEXTURES],
    pub count: [u32; 4],
}

fn encode_source(src: CombineSource) -> u32 {
    match src {
        CombineSource::Previous => 0,
        CombineSource::Texture => 1,
        CombineSource::TextureUnit(0) => 2,
        CombineSource::TextureUnit(_) => 3,
        CombineSource::Primary => 4,
    }
}

fn encode_combine(c: Combine) -> [u32; 4] {
    let func = match c.func {
        CombineFunc::Replace => 0,
        CombineFunc::Modulate => 1,
        CombineFunc::Add => 2,
        CombineFunc::Subtract => 3,
        CombineFunc::Interpolate => 4,
    };
    [func, encode_source(c.args[0]), encode_source(c.args[1]), encode_source(c.args[2])]
}

impl EnvUniform {
    pub(super) fn new(envs: &[TexEnv; MAX_TEXTURES], texture_count: usize) -> Self {
        let mut out = Self {
            count: [texture_count.min(MAX_TEXTURES) as u32, 0, 0, 0],
            ..Self::default()
        };
        for (unit, env) in out.units.iter_mut().zip(envs) {
            *unit = match *env {
                TexEnv::Modulate => UnitUniform::default(),
                TexEnv::Replace => UnitUniform { mode: [1, 0, 0, 0], ..UnitUniform::default() },
                TexEnv::Combine { rgb, alpha } => UnitUniform {
                    mode: [2, 0, 0, 0],
                    rgb: encode_combine(rgb),
                    alpha: encode_combine(alpha),
                },
            };
        }
        out
    }
}

// ── blend ─────────────────────────────────────────────────────────────────

fn factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
    }
}

/// Min/Max ignore the factors; wgpu requires them to be `One`.
pub(super) fn wgpu_blend(state: BlendState) -> wgpu::BlendState {
    let (operation, src, dst) = match state.equation {
        BlendEquation::Add => (wgpu::BlendOperation::Add, factor(state.src), factor(state.dst)),
        BlendEquation::ReverseSubtract => {
            (wgpu::BlendOperation::ReverseSubtract, factor(state.src), factor(state.dst))
        }
        BlendEquation::Min => {
            (wgpu::BlendOperation::Min, wgpu::BlendFactor::One, wgpu::BlendFactor::One)
        }
        BlendEquation::Max => {
            (wgpu::BlendOperation::Max, wgpu::BlendFactor::One, wgpu::BlendFactor::One)
        }
    };
    let component = wgpu::BlendComponent { src_factor: src, dst_factor: dst, operation };
    wgpu::BlendState { color: component, alpha: component }
}

// ── pipeline cache key ────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct DepthKey {
    pub format: wgpu::TextureFormat,
    pub test: bool,
    pub write: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) struct PipelineKey {
    pub primitive: Primitive,
    pub blend: BlendState,
    pub samples: u32,
    pub depth: Option<DepthKey>,
}

fn topology(p: Primitive) -> wgpu::PrimitiveTopology {
    match p {
        Primitive::Points => wgpu::PrimitiveTopology::PointList,
        Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        Primitive::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
    }
}

pub(super) fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let texture = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    };
    let sampler = |binding| wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    };

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("easel fixed bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<EnvUniform>() as u64,
                    ),
                },
                count: None,
            },
            texture(1),
            sampler(2),
            texture(3),
            sampler(4),
        ],
    })
}

pub(super) fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let depth_stencil = key.depth.map(|d| wgpu::DepthStencilState {
        format: d.format,
        depth_write_enabled: d.test && d.write && d.format.has_depth_aspect(),
        depth_compare: if d.test && d.format.has_depth_aspect() {
            wgpu::CompareFunction::LessEqual
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("easel fixed pipeline"),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[GpuVertex::layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: Some(wgpu_blend(key.blend)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: topology(key.primitive),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil,
        multisample: wgpu::MultisampleState {
            count: key.samples,
            ..wgpu::MultisampleState::default()
        },

        multiview_mask: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_uniform_encodes_modes_and_count() {
        let envs = [
            TexEnv::Replace,
            TexEnv::Combine {
                rgb: Combine::new(CombineFunc::Modulate, CombineSource::Previous, CombineSource::Primary),
                alpha: Combine::new(CombineFunc::Replace, CombineSource::Previous, CombineSource::Previous),
            },
        ];
        let u = EnvUniform::new(&envs, 5);
        assert_eq!(u.count[0], MAX_TEXTURES as u32);
        assert_eq!(u.units[0].mode[0], 1);
        assert_eq!(u.units[1].mode[0], 2);
        assert_eq!(u.units[1].rgb, [1, 0, 4, 4]);
    }

    #[test]
    fn min_max_blend_uses_unit_factors() {
        let b = wgpu_blend(BlendState {
            equation: BlendEquation::Max,
            src: BlendFactor::SrcAlpha,
            dst: BlendFactor::DstAlpha,
        });
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(b.color.operation, wgpu::BlendOperation::Max);
    }

    #[test]
    fn vertex_layout_stride_matches_struct() {
        assert_eq!(GpuVertex::layout().array_stride, 48);
    }
}
