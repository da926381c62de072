//! Point rendering for the particle cloud and the attractors

use attractor_physics::{AttractorField, MAX_ATTRACTORS};
use attractor_simulation::{compile_program, CompileReport, FrameInput, ParticleView};
use glam::Vec4;
use wgpu::util::DeviceExt;

use crate::camera::RenderUniform;
use crate::error::RenderError;

/// Bytes per particle position record
const PARTICLE_STRIDE: wgpu::BufferAddress =
    std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress;

const PARTICLE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];
const ATTRACTOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x4];

/// Colors and sizes for the two point kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointStyle {
    pub particle_color: Vec4,
    pub attractor_color: Vec4,
    /// Attractor square edge in pixels
    pub attractor_size: f32,
}

impl Default for PointStyle {
    fn default() -> Self {
        Self {
            particle_color: Vec4::ONE,
            attractor_color: Vec4::new(1.0, 0.0, 0.0, 1.0),
            attractor_size: 10.0,
        }
    }
}

/// One position per vertex, laid out like the particle position buffer
pub fn particle_layout<'a>() -> wgpu::VertexBufferLayout<'a> {
    wgpu::VertexBufferLayout {
        array_stride: PARTICLE_STRIDE,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &PARTICLE_ATTRIBUTES,
    }
}

/// One `[x, y, z, gravity]` record per billboard instance
pub fn attractor_layout<'a>() -> wgpu::VertexBufferLayout<'a> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRACTOR_ATTRIBUTES,
    }
}

struct PointPass {
    pipeline: wgpu::RenderPipeline,
    report: CompileReport,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    warned_unlinked: bool,
}

impl PointPass {
    /// Whether the pass can draw; warns once when it cannot.
    fn ready(&mut self) -> bool {
        if !self.report.linked && !self.warned_unlinked {
            log::warn!("{} is not linked, skipping its draw", self.report.label);
            self.warned_unlinked = true;
        }
        self.report.linked
    }
}

pub struct PointRenderer {
    particles: PointPass,
    attractors: PointPass,
    attractor_buffer: wgpu::Buffer,
    host_buffer: Option<wgpu::Buffer>,
    host_capacity: u32,
    style: PointStyle,
}

impl PointRenderer {
    pub async fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        style: PointStyle,
    ) -> Result<Self, RenderError> {
        Self::with_shaders(
            device,
            format,
            style,
            include_str!("shaders/points.wgsl"),
            include_str!("shaders/attractors.wgsl"),
        )
        .await
    }

    async fn with_shaders(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        style: PointStyle,
        particle_source: &str,
        attractor_source: &str,
    ) -> Result<Self, RenderError> {
        log::info!("Initializing PointRenderer...");

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let uniform_size = std::mem::size_of::<RenderUniform>() as u64;
        let particle_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Uniform Buffer"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let attractor_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Attractor Uniform Buffer"),
            size: uniform_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let attractor_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Attractor Instance Buffer"),
            contents: bytemuck::cast_slice(&[[0.0f32; 4]; MAX_ATTRACTORS]),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(RenderError::Allocation {
                label: "Render buffers",
                bytes: uniform_size * 2 + PARTICLE_STRIDE * MAX_ATTRACTORS as u64,
                reason: error.to_string(),
            });
        }

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Point Bind Group Layout"),
            entries: &[
                // Uniforms - Binding 0
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(uniform_size),
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Point Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let particle_program = compile_program(
            device,
            "Particle Shader",
            particle_source,
            |module| {
                create_point_pipeline(
                    device,
                    &pipeline_layout,
                    module,
                    "Particle Render Pipeline",
                    wgpu::PrimitiveTopology::PointList,
                    &[particle_layout()],
                    format,
                )
            },
        )
        .await;

        let attractor_program = compile_program(
            device,
            "Attractor Shader",
            attractor_source,
            |module| {
                create_point_pipeline(
                    device,
                    &pipeline_layout,
                    module,
                    "Attractor Render Pipeline",
                    wgpu::PrimitiveTopology::TriangleList,
                    &[attractor_layout()],
                    format,
                )
            },
        )
        .await;

        let bind_group = |label: &str, buffer: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            })
        };

        let particles = PointPass {
            pipeline: particle_program.handle,
            report: particle_program.report,
            bind_group: bind_group("Particle Bind Group", &particle_uniforms),
            uniform_buffer: particle_uniforms,
            warned_unlinked: false,
        };
        let attractors = PointPass {
            pipeline: attractor_program.handle,
            report: attractor_program.report,
            bind_group: bind_group("Attractor Bind Group", &attractor_uniforms),
            uniform_buffer: attractor_uniforms,
            warned_unlinked: false,
        };

        log::info!("Render pipelines created");

        Ok(Self {
            particles,
            attractors,
            attractor_buffer,
            host_buffer: None,
            host_capacity: 0,
            style,
        })
    }

    /// Allocate the vertex buffer host-resident particle state is copied
    /// into before drawing. Only needed when the simulation runs on the CPU.
    pub async fn reserve_host_particles(
        &mut self,
        device: &wgpu::Device,
        count: u32,
    ) -> Result<(), RenderError> {
        let bytes = count as u64 * PARTICLE_STRIDE;
        let max_buffer = device.limits().max_buffer_size;
        if bytes > max_buffer {
            return Err(RenderError::Allocation {
                label: "Host particle buffer",
                bytes,
                reason: format!("exceeds device buffer limit {max_buffer}"),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Host Particle Buffer"),
            size: bytes,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(error) = device.pop_error_scope().await {
            return Err(RenderError::Allocation {
                label: "Host particle buffer",
                bytes,
                reason: error.to_string(),
            });
        }

        log::info!("Host particle buffer reserved: {} particles, {} bytes", count, bytes);
        self.host_buffer = Some(buffer);
        self.host_capacity = count;
        Ok(())
    }

    /// Clear `target` to black, then draw the particles and the attractors.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        frame: &FrameInput<'_>,
        viewport: (u32, u32),
    ) -> Result<(), RenderError> {
        let particle_count = frame.particles.particle_count();
        if let ParticleView::Host(store) = frame.particles {
            match &self.host_buffer {
                Some(buffer) if particle_count <= self.host_capacity => {
                    queue.write_buffer(buffer, 0, bytemuck::cast_slice(store.positions()));
                }
                _ => {
                    return Err(RenderError::UnreservedHostParticles {
                        count: particle_count,
                        reserved: self.host_capacity,
                    });
                }
            }
        }

        let attractor_count = self.upload_attractors(queue, frame.field);

        queue.write_buffer(
            &self.particles.uniform_buffer,
            0,
            bytemuck::cast_slice(&[RenderUniform::new(
                &frame.transforms,
                self.style.particle_color,
                viewport,
                1.0,
            )]),
        );
        queue.write_buffer(
            &self.attractors.uniform_buffer,
            0,
            bytemuck::cast_slice(&[RenderUniform::new(
                &frame.transforms,
                self.style.attractor_color,
                viewport,
                self.style.attractor_size,
            )]),
        );

        let draw_particles = self.particles.ready();
        let draw_attractors = self.attractors.ready();

        let particle_buffer = match frame.particles {
            ParticleView::Host(_) => self.host_buffer.as_ref(),
            ParticleView::Device { positions, .. } => Some(positions),
        };

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (true, Some(buffer)) = (draw_particles && particle_count > 0, particle_buffer) {
                render_pass.set_pipeline(&self.particles.pipeline);
                render_pass.set_bind_group(0, &self.particles.bind_group, &[]);
                let bytes = particle_count as u64 * PARTICLE_STRIDE;
                render_pass.set_vertex_buffer(0, buffer.slice(..bytes));
                render_pass.draw(0..particle_count, 0..1);
            }

            if draw_attractors && attractor_count > 0 {
                render_pass.set_pipeline(&self.attractors.pipeline);
                render_pass.set_bind_group(0, &self.attractors.bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.attractor_buffer.slice(..));
                // 6 vertices per billboard quad
                render_pass.draw(0..6, 0..attractor_count);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn upload_attractors(&self, queue: &wgpu::Queue, field: &AttractorField) -> u32 {
        let mut records = [[0.0f32; 4]; MAX_ATTRACTORS];
        for (record, attractor) in records.iter_mut().zip(field.attractors()) {
            *record = attractor.to_array();
        }
        queue.write_buffer(&self.attractor_buffer, 0, bytemuck::cast_slice(&records));
        field.len().min(MAX_ATTRACTORS) as u32
    }

    pub fn style(&self) -> &PointStyle {
        &self.style
    }

    pub fn compile_reports(&self) -> [&CompileReport; 2] {
        [&self.particles.report, &self.attractors.report]
    }
}

fn create_point_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    label: &str,
    topology: wgpu::PrimitiveTopology,
    buffers: &[wgpu::VertexBufferLayout],
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use attractor_physics::{ParticleStore, SceneParams};
    use attractor_simulation::CpuSimulation;

    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn noop_device() -> (wgpu::Device, wgpu::Queue) {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::NOOP,
            backend_options: wgpu::BackendOptions {
                noop: wgpu::NoopBackendOptions { enable: true },
                ..Default::default()
            },
            ..Default::default()
        });
        let adapter =
            pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
                .unwrap();
        pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default())).unwrap()
    }

    fn target(device: &wgpu::Device) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Test Target"),
                size: wgpu::Extent3d {
                    width: 64,
                    height: 64,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn draw_host_frame(
        renderer: &mut PointRenderer,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<(), RenderError> {
        let sim = CpuSimulation::new(ParticleStore::grid(4).unwrap());
        let synced = sim.synced().unwrap();
        let field = AttractorField::reference();
        let frame = FrameInput {
            particles: sim.view(&synced).unwrap(),
            synced,
            field: &field,
            transforms: SceneParams::default().transforms(),
        };
        renderer.render(device, queue, &target(device), &frame, (64, 64))
    }

    #[test]
    fn host_particles_draw_once_reserved() {
        let (device, queue) = noop_device();
        let mut renderer =
            pollster::block_on(PointRenderer::new(&device, FORMAT, PointStyle::default())).unwrap();
        assert!(renderer.compile_reports().iter().all(|r| r.linked));

        assert!(matches!(
            draw_host_frame(&mut renderer, &device, &queue),
            Err(RenderError::UnreservedHostParticles {
                count: 64,
                reserved: 0
            })
        ));

        pollster::block_on(renderer.reserve_host_particles(&device, 64)).unwrap();
        draw_host_frame(&mut renderer, &device, &queue).unwrap();
    }

    #[test]
    fn unlinked_particle_program_skips_only_its_pass() {
        let (device, queue) = noop_device();
        let mut renderer = pollster::block_on(PointRenderer::with_shaders(
            &device,
            FORMAT,
            PointStyle::default(),
            "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return ; }",
            include_str!("shaders/attractors.wgsl"),
        ))
        .unwrap();

        let [particles, attractors] = renderer.compile_reports();
        assert!(!particles.linked);
        assert!(!particles.diagnostics.is_empty());
        assert!(attractors.linked);

        pollster::block_on(renderer.reserve_host_particles(&device, 64)).unwrap();
        for _ in 0..2 {
            draw_host_frame(&mut renderer, &device, &queue).unwrap();
        }
    }

    #[test]
    fn particle_layout_matches_position_records() {
        let layout = particle_layout();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Vertex);
        assert_eq!(layout.attributes[0].format, wgpu::VertexFormat::Float32x4);
    }

    #[test]
    fn attractors_are_instanced() {
        let layout = attractor_layout();
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(layout.attributes[0].shader_location, 0);
    }

    #[test]
    fn default_style_is_white_particles_and_red_attractors() {
        let style = PointStyle::default();
        assert_eq!(style.particle_color, Vec4::ONE);
        assert_eq!(style.attractor_color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(style.attractor_size, 10.0);
    }
}
