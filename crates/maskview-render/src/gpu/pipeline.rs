//! Shader/program management for the GPU backend: the pipeline is compiled
//! once at initialization, bind group layouts and the frame uniform are
//! cached, and typed setters write the view transform.

use bytemuck::{Pod, Zeroable};

use crate::viewport::Viewport;

/// Per-frame uniform: world → clip transform (column-major).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct FrameUniform {
    pub view: [[f32; 4]; 4],
}

impl FrameUniform {
    /// World coordinates to NDC. World y-up matches NDC y-up; the screen
    /// y-inversion only exists in window coordinates.
    fn from_viewport(viewport: &Viewport) -> Self {
        let sx = (2.0 * viewport.zoom / viewport.width.max(1.0)) as f32;
        let sy = (2.0 * viewport.zoom / viewport.height.max(1.0)) as f32;
        let tx = -(viewport.center.x as f32) * sx;
        let ty = -(viewport.center.y as f32) * sy;
        Self {
            view: [
                [sx, 0.0, 0.0, 0.0],
                [0.0, sy, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [tx, ty, 0.0, 1.0],
            ],
        }
    }
}

/// Per-layer uniform: premultiplied fill color.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct LayerUniform {
    pub color: [f32; 4],
}

pub(crate) fn premul_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn uniform_binding_size(bytes: usize) -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(bytes as u64)
}

/// The compiled layer-fill pipeline plus its bind group layouts and the
/// frame uniform buffer.
pub(crate) struct LayerPipeline {
    pipeline: wgpu::RenderPipeline,
    layer_bgl: wgpu::BindGroupLayout,
    frame_ubo: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
}

impl LayerPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("maskview layer shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/layer.wgsl").into()),
        });

        let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("maskview frame bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: uniform_binding_size(std::mem::size_of::<FrameUniform>()),
                },
                count: None,
            }],
        });

        let layer_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("maskview layer bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: uniform_binding_size(std::mem::size_of::<LayerUniform>()),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("maskview layer pipeline layout"),
            bind_group_layouts: &[&frame_bgl, &layer_bgl],
            immediate_size: 0,
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: (std::mem::size_of::<[f32; 2]>()) as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x2],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("maskview layer pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),

            multiview_mask: None,
            cache: None,
        });

        let frame_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("maskview frame ubo"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("maskview frame bind group"),
            layout: &frame_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_ubo.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            layer_bgl,
            frame_ubo,
            frame_bind_group,
        }
    }

    /// Upload the view transform for this frame.
    pub fn write_view(&self, queue: &wgpu::Queue, viewport: &Viewport) {
        let u = FrameUniform::from_viewport(viewport);
        queue.write_buffer(&self.frame_ubo, 0, bytemuck::bytes_of(&u));
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub fn layer_bgl(&self) -> &wgpu::BindGroupLayout {
        &self.layer_bgl
    }

    pub fn frame_bind_group(&self) -> &wgpu::BindGroup {
        &self.frame_bind_group
    }

    /// Release the frame uniform buffer. The pipeline itself has no
    /// explicit destroy; dropping it releases the program.
    pub fn destroy(&self) {
        self.frame_ubo.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maskview_core::Point;

    #[test]
    fn test_view_matrix_maps_center_to_origin() {
        let mut vp = Viewport::new(800.0, 600.0);
        vp.center = Point::new(50.0, 20.0);
        vp.zoom = 2.0;
        let u = FrameUniform::from_viewport(&vp);
        // clip = view * (50, 20, 0, 1)
        let x = u.view[0][0] * 50.0 + u.view[3][0];
        let y = u.view[1][1] * 20.0 + u.view[3][1];
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn test_view_matrix_maps_viewport_edge_to_ndc() {
        let vp = Viewport::new(800.0, 600.0);
        let u = FrameUniform::from_viewport(&vp);
        // Right edge of the visible window at zoom 1: x = 400 -> NDC 1.
        let x = u.view[0][0] * 400.0 + u.view[3][0];
        assert!((x - 1.0).abs() < 1e-6);
    }
}
