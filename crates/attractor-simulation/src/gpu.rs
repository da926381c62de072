//! GPU-based particle simulation manager
//!
//! Positions and velocities live in two storage buffers (bindings 0 and 1),
//! each `N` tightly packed `vec4<f32>` records. The position buffer doubles
//! as the vertex buffer for rendering.

use attractor_physics::{AttractorField, IntegrationParams, ParticleStore};
use wgpu::util::DeviceExt;

use crate::error::SimulationError;
use crate::frame::{ParticleView, StepTicket, Synced};
use crate::params::SimulationParams;
use crate::program::{compile_program, CompileReport};

/// Threads per workgroup, must match `@workgroup_size` in integrate.wgsl
pub const WORKGROUP_SIZE: u32 = 256;

/// Workgroup counts `(x, y)` covering `particle_count` particles with no
/// dimension above `max_per_dimension`. `None` if even a square grid is too small.
///
/// The kernel flattens the grid as `id.x + id.y * x * WORKGROUP_SIZE`.
pub fn workgroup_grid(particle_count: u32, max_per_dimension: u32) -> Option<(u32, u32)> {
    let groups = particle_count.div_ceil(WORKGROUP_SIZE).max(1);
    let max = max_per_dimension.max(1);
    let x = groups.min(max);
    let y = groups.div_ceil(x);
    (y <= max).then_some((x, y))
}

/// GPU-based particle integration
pub struct GpuSimulation {
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Buffers
    position_buffer: wgpu::Buffer,
    _velocity_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,

    // Compute pipeline
    integrate_pipeline: wgpu::ComputePipeline,
    integrate_bind_group: wgpu::BindGroup,
    integrate_report: CompileReport,
    warned_unlinked: bool,
    workgroups: (u32, u32),

    particle_count: u32,
    generation: u64,
    in_flight: Option<(u64, Option<wgpu::SubmissionIndex>)>,
}

impl GpuSimulation {
    pub async fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        store: &ParticleStore,
    ) -> Result<Self, SimulationError> {
        Self::with_kernel(device, queue, store, include_str!("shaders/integrate.wgsl")).await
    }

    async fn with_kernel(
        device: wgpu::Device,
        queue: wgpu::Queue,
        store: &ParticleStore,
        kernel_source: &str,
    ) -> Result<Self, SimulationError> {
        log::info!("Initializing GpuSimulation...");
        let particle_count = store.len() as u32;
        let buffer_size = store.buffer_size();

        let limits = device.limits();
        let max_groups = limits.max_compute_workgroups_per_dimension;
        let Some(workgroups) = workgroup_grid(particle_count, max_groups) else {
            return Err(SimulationError::DispatchTooLarge {
                particles: particle_count,
                max_workgroups: max_groups,
            });
        };
        let max_binding = limits.max_storage_buffer_binding_size as u64;
        if buffer_size > max_binding || buffer_size > limits.max_buffer_size {
            return Err(SimulationError::Allocation {
                label: "Particle buffers",
                bytes: buffer_size,
                reason: format!(
                    "exceeds device limits (storage binding {max_binding}, buffer {})",
                    limits.max_buffer_size
                ),
            });
        }

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let position_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Position Buffer"),
            contents: bytemuck::cast_slice(store.positions()),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        let velocity_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Velocity Buffer"),
            contents: bytemuck::cast_slice(store.velocities()),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        let params = SimulationParams::default();
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Simulation Params Buffer"),
            contents: bytemuck::cast_slice(&[params]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(SimulationError::Allocation {
                label: "Particle buffers",
                bytes: buffer_size * 2,
                reason: error.to_string(),
            });
        }

        log::info!(
            "Buffers created: {} particles, {} bytes per buffer",
            particle_count,
            buffer_size
        );

        let integrate_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Integration Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let integrate_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Integration Pipeline Layout"),
                bind_group_layouts: &[&integrate_bind_group_layout],
                push_constant_ranges: &[],
            });

        let integrate = compile_program(
            &device,
            "Compute Shader",
            kernel_source,
            |module| {
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("Integration Pipeline"),
                    layout: Some(&integrate_pipeline_layout),
                    module,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    cache: None,
                })
            },
        )
        .await;

        let integrate_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Integration Bind Group"),
            layout: &integrate_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: position_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: velocity_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        log::info!(
            "Integration pipeline created, {}x{} workgroups per step",
            workgroups.0,
            workgroups.1
        );

        Ok(Self {
            device,
            queue,
            position_buffer,
            _velocity_buffer: velocity_buffer,
            params_buffer,
            integrate_pipeline: integrate.handle,
            integrate_bind_group,
            integrate_report: integrate.report,
            warned_unlinked: false,
            workgroups,
            particle_count,
            generation: store.generation(),
            in_flight: None,
        })
    }

    /// Upload uniforms and submit one integration step for every particle.
    ///
    /// When the compute program failed to link nothing is submitted and the
    /// ticket carries the current generation, since no particle is rewritten.
    pub fn dispatch(
        &mut self,
        field: &AttractorField,
        params: &IntegrationParams,
    ) -> Result<StepTicket, SimulationError> {
        if self.in_flight.is_some() {
            return Err(SimulationError::StepInFlight);
        }

        if !self.integrate_report.linked {
            if !self.warned_unlinked {
                log::warn!(
                    "{} is not linked, skipping integration dispatch",
                    self.integrate_report.label
                );
                self.warned_unlinked = true;
            }
            self.in_flight = Some((self.generation, None));
            return Ok(StepTicket::new(self.generation));
        }

        self.update_params(&SimulationParams::new(self.particle_count, field, params));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Simulation Encoder"),
            });

        let (groups_x, groups_y) = self.workgroups;
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Integration Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.integrate_pipeline);
            compute_pass.set_bind_group(0, &self.integrate_bind_group, &[]);
            compute_pass.dispatch_workgroups(groups_x, groups_y, 1);
        }

        let submission = self.queue.submit(std::iter::once(encoder.finish()));
        let generation = self.generation + 1;
        self.in_flight = Some((generation, Some(submission)));
        Ok(StepTicket::new(generation))
    }

    /// Block until the dispatched step has finished on the device.
    ///
    /// Later submissions on the same queue observe the step's storage writes.
    pub fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError> {
        let Some((generation, submission)) = self.in_flight.take() else {
            return Err(SimulationError::NoStepInFlight);
        };
        if ticket.generation() != generation {
            let found = ticket.generation();
            self.in_flight = Some((generation, submission));
            return Err(SimulationError::TicketMismatch {
                expected: generation,
                found,
            });
        }

        if let Some(submission) = submission {
            self.device.poll(wgpu::PollType::Wait {
                submission_index: Some(submission),
                timeout: None,
            })?;
        }

        self.generation = generation;
        Ok(Synced::new(generation))
    }

    pub fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError> {
        if self.in_flight.is_some() {
            return Err(SimulationError::StepInFlight);
        }
        if synced.generation() != self.generation {
            return Err(SimulationError::StaleFrame {
                expected: self.generation,
                found: synced.generation(),
            });
        }
        Ok(ParticleView::Device {
            positions: &self.position_buffer,
            count: self.particle_count,
        })
    }

    /// Synced token for the current state when nothing is in flight.
    pub fn synced(&self) -> Result<Synced, SimulationError> {
        match self.in_flight {
            Some(_) => Err(SimulationError::StepInFlight),
            None => Ok(Synced::new(self.generation)),
        }
    }

    pub fn update_params(&self, params: &SimulationParams) {
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[*params]));
    }

    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn compile_report(&self) -> &CompileReport {
        &self.integrate_report
    }
}
