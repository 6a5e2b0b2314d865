//! GPU substrate
//!
//! State lives in two ping-pong pairs of RGBA32F textures (position A/B,
//! velocity A/B). Each step binds the current pair as sampled inputs and the
//! other pair as storage outputs, runs `advance_position` and
//! `advance_velocity`, then flips `current`. The injection overlay is three more
//! sampled textures that both kernels read.

use crate::injection::InjectionOverlay;
use crate::readback::read_texels;
use crate::substrate::{ComputeSubstrate, SimulationOutputs};
use crate::{Result, SimulationError, StepParams};
use glam::UVec2;
use particle_physics::{Injection, SimulationGrid, SlotState, Texel, WORKGROUP_SIZE};
use wgpu::util::DeviceExt;

const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// A texture and its default view.
struct StateTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl StateTexture {
    fn new(device: &wgpu::Device, label: &str, width: u32, usage: wgpu::TextureUsages) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height: width,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Upload `texels` into a `size.x`×`size.y` region of `texture` at `origin`.
fn write_region(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    origin: UVec2,
    size: UVec2,
    texels: &[Texel],
) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: origin.x,
                y: origin.y,
                z: 0,
            },
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(texels),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.x * std::mem::size_of::<Texel>() as u32),
            rows_per_image: Some(size.y),
        },
        wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
    );
}

fn sampled_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            // RGBA32F is not filterable without an extra feature; kernels use textureLoad.
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: STATE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

/// wgpu implementation of [`ComputeSubstrate`].
pub struct GpuSubstrate {
    device: wgpu::Device,
    queue: wgpu::Queue,
    grid: SimulationGrid,

    // Ping-pong state
    positions: [StateTexture; 2],
    velocities: [StateTexture; 2],
    current: usize,

    // Injection overlay
    flags: StateTexture,
    position_input: StateTexture,
    velocity_input: StateTexture,

    params_buffer: wgpu::Buffer,

    position_pipeline: wgpu::ComputePipeline,
    velocity_pipeline: wgpu::ComputePipeline,
    // bind_groups[i] reads pair i and writes pair 1 - i
    bind_groups: [wgpu::BindGroup; 2],
}

impl GpuSubstrate {
    /// Allocate zero-filled state and build both step pipelines.
    ///
    /// Any validation error raised while building the pipeline is returned as
    /// [`SimulationError::Substrate`].
    pub async fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        grid: SimulationGrid,
    ) -> Result<Self> {
        log::info!("Initializing GPU substrate ({0}x{0} slots)...", grid.width());

        let width = grid.width();
        let limit = device.limits().max_texture_dimension_2d;
        if width > limit {
            log::error!("Grid width {} exceeds the device texture limit {}", width, limit);
            return Err(SimulationError::GridExceedsDevice { width, limit });
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let state_usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::STORAGE_BINDING
            | wgpu::TextureUsages::COPY_SRC
            | wgpu::TextureUsages::COPY_DST;
        let overlay_usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;

        let positions = [
            StateTexture::new(&device, "Position Texture A", width, state_usage),
            StateTexture::new(&device, "Position Texture B", width, state_usage),
        ];
        let velocities = [
            StateTexture::new(&device, "Velocity Texture A", width, state_usage),
            StateTexture::new(&device, "Velocity Texture B", width, state_usage),
        ];
        let flags = StateTexture::new(&device, "Input Flags Texture", width, overlay_usage);
        let position_input =
            StateTexture::new(&device, "Position Input Texture", width, overlay_usage);
        let velocity_input =
            StateTexture::new(&device, "Velocity Input Texture", width, overlay_usage);

        // Zero every plane explicitly: position = velocity = (0, 0, 0), no flags raised.
        let zeros = vec![Texel::ZERO; grid.capacity() as usize];
        let extent = UVec2::splat(width);
        for texture in positions
            .iter()
            .chain(velocities.iter())
            .chain([&flags, &position_input, &velocity_input])
        {
            write_region(&queue, &texture.texture, UVec2::ZERO, extent, &zeros);
        }

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Step Params Buffer"),
            contents: bytemuck::cast_slice(&[StepParams::new(0.0, 0.0, 0.0)]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        log::info!("Textures created");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Step Compute Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/step.wgsl").into()),
        });

        // 0: params (uniform)
        // 1-2: previous position / velocity (sampled)
        // 3-5: input flags, position input, velocity input (sampled)
        // 6-7: next position / velocity (storage, write)
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Step Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                sampled_entry(1),
                sampled_entry(2),
                sampled_entry(3),
                sampled_entry(4),
                sampled_entry(5),
                storage_entry(6),
                storage_entry(7),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Step Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        log::info!("Creating position pipeline...");
        let position_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Position Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("advance_position"),
            compilation_options: Default::default(),
            cache: None,
        });

        log::info!("Creating velocity pipeline...");
        let velocity_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Velocity Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("advance_velocity"),
            compilation_options: Default::default(),
            cache: None,
        });

        let bind_groups = [0usize, 1].map(|read| {
            let write = 1 - read;
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(if read == 0 {
                    "Step Bind Group A->B"
                } else {
                    "Step Bind Group B->A"
                }),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&positions[read].view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&velocities[read].view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&flags.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&position_input.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(&velocity_input.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::TextureView(&positions[write].view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(&velocities[write].view),
                    },
                ],
            })
        });

        if let Some(error) = device.pop_error_scope().await {
            log::error!("GPU substrate initialization failed: {}", error);
            return Err(SimulationError::Substrate(error));
        }

        log::info!("Pipelines and bind groups created");

        Ok(Self {
            device,
            queue,
            grid,
            positions,
            velocities,
            current: 0,
            flags,
            position_input,
            velocity_input,
            params_buffer,
            position_pipeline,
            velocity_pipeline,
            bind_groups,
        })
    }

    /// Current position texture, for copies. Stale after the next step.
    pub fn position_texture(&self) -> &wgpu::Texture {
        &self.positions[self.current].texture
    }

    /// Current velocity texture, for copies. Stale after the next step.
    pub fn velocity_texture(&self) -> &wgpu::Texture {
        &self.velocities[self.current].texture
    }
}

impl ComputeSubstrate for GpuSubstrate {
    type Outputs<'a> = SimulationOutputs<&'a wgpu::TextureView>;

    fn grid(&self) -> SimulationGrid {
        self.grid
    }

    fn upload_overlay(&mut self, overlay: &InjectionOverlay) {
        let extent = UVec2::splat(self.grid.width());
        write_region(&self.queue, &self.flags.texture, UVec2::ZERO, extent, overlay.flags());
        write_region(
            &self.queue,
            &self.position_input.texture,
            UVec2::ZERO,
            extent,
            overlay.position_input(),
        );
        write_region(
            &self.queue,
            &self.velocity_input.texture,
            UVec2::ZERO,
            extent,
            overlay.velocity_input(),
        );
    }

    fn dispatch(&mut self, params: &StepParams) {
        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::cast_slice(&[*params]));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Step Encoder"),
            });

        let width = self.grid.width();
        let workgroup_count = (width + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Step Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_bind_group(0, &self.bind_groups[self.current], &[]);

            compute_pass.set_pipeline(&self.position_pipeline);
            compute_pass.dispatch_workgroups(workgroup_count, workgroup_count, 1);

            compute_pass.set_pipeline(&self.velocity_pipeline);
            compute_pass.dispatch_workgroups(workgroup_count, workgroup_count, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.current = 1 - self.current;
    }

    fn write_slot(&mut self, coord: UVec2, injection: &Injection) {
        if let Some(position) = injection.position {
            write_region(
                &self.queue,
                &self.positions[self.current].texture,
                coord,
                UVec2::ONE,
                &[Texel::from_vec3(position)],
            );
        }
        if let Some(velocity) = injection.velocity {
            write_region(
                &self.queue,
                &self.velocities[self.current].texture,
                coord,
                UVec2::ONE,
                &[Texel::from_vec3(velocity)],
            );
        }
    }

    fn read_slot(&self, coord: UVec2) -> Result<SlotState> {
        let position = read_texels(
            &self.device,
            &self.queue,
            self.position_texture(),
            coord,
            UVec2::ONE,
        )?;
        let velocity = read_texels(
            &self.device,
            &self.queue,
            self.velocity_texture(),
            coord,
            UVec2::ONE,
        )?;
        Ok(SlotState::from_texels(position[0], velocity[0]))
    }

    fn read_state(&self) -> Result<Vec<SlotState>> {
        let extent = UVec2::splat(self.grid.width());
        let positions = read_texels(
            &self.device,
            &self.queue,
            self.position_texture(),
            UVec2::ZERO,
            extent,
        )?;
        let velocities = read_texels(
            &self.device,
            &self.queue,
            self.velocity_texture(),
            UVec2::ZERO,
            extent,
        )?;
        Ok(positions
            .into_iter()
            .zip(velocities)
            .map(|(p, v)| SlotState::from_texels(p, v))
            .collect())
    }

    fn outputs(&self) -> Self::Outputs<'_> {
        SimulationOutputs {
            position: &self.positions[self.current].view,
            velocity: &self.velocities[self.current].view,
        }
    }
}
