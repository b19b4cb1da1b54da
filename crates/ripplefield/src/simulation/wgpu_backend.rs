//! wgpu compute backend.
//!
//! The whole wave state stays on the GPU. Five storage buffers hold the
//! `prev`, `curr` and `next` roles plus the two scroll staging copies; roles
//! never move between buffers, so every bind group is built once. Rotation is
//! a fixed sequence of copies recorded into one command encoder:
//!
//! ```text
//! staged_next -> next
//! staged_curr -> curr
//! boundary (rows pass, then columns pass)
//! curr        -> prev
//! next        -> curr
//! ```
//!
//! The host only writes the obstacle field, the packed entries, the uniforms
//! and the single forcing cell each frame. Full readback happens when the
//! orchestrator publishes.

use std::sync::Arc;

use super::backend::{BackendKind, DispatchInput, SolverBackend};
use super::packer::PackedDisturbanceEntry;
use super::Field;
use ripplefield_core::error::{Result, RippleError};
use ripplefield_core::params::{BoundaryPolicy, Resolution, WaveParams, FOOTPRINT_FEATHER};

/// Leapfrog stencil with obstacle attenuation and object wakes.
const WGSL_WAVE_SHADER: &str = r#"
struct StepParams {
    nx: u32,
    ny: u32,
    entry_count: u32,
    wake_scale: f32,
    cfl2: f32,
    elasticity: f32,
    dispersion: f32,
    feather: f32,
    origin_x: f32,
    origin_z: f32,
    tex_world_size: f32,
    radius: f32,
}

// Mirrors PackedDisturbanceEntry: position xyz, speed, uv offset
struct Entry {
    px: f32,
    py: f32,
    pz: f32,
    speed: f32,
    u: f32,
    v: f32,
}

@group(0) @binding(0) var<uniform> params: StepParams;
@group(0) @binding(1) var<storage, read> prev: array<f32>;
@group(0) @binding(2) var<storage, read> curr: array<f32>;
@group(0) @binding(3) var<storage, read_write> next: array<f32>;
@group(0) @binding(4) var<storage, read> obstacle: array<f32>;
@group(0) @binding(5) var<storage, read> entries: array<Entry>;

// x = strongest coverage, y = strongest coverage * speed
fn footprint_at(i: u32, j: u32) -> vec2<f32> {
    let cu = (f32(i) + 0.5) / f32(params.nx) - 0.5;
    let cv = (f32(j) + 0.5) / f32(params.ny) - 0.5;
    let world = vec2<f32>(params.origin_x, params.origin_z) + vec2<f32>(cu, cv) * params.tex_world_size;

    var footprint = vec2<f32>(0.0, 0.0);
    for (var k = 0u; k < params.entry_count; k = k + 1u) {
        let entry = entries[k];
        let d = distance(world, vec2<f32>(entry.px, entry.pz));
        let cover = clamp((params.radius - d) / (params.radius * params.feather), 0.0, 1.0);
        footprint = max(footprint, vec2<f32>(cover, cover * entry.speed));
    }
    return footprint;
}

@compute @workgroup_size(8, 8)
fn wave_step(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    let j = gid.y;

    // Rim cells belong to the boundary kernel
    if (i == 0u || j == 0u || i >= params.nx - 1u || j >= params.ny - 1u) {
        return;
    }

    let nx = params.nx;
    let idx = j * nx + i;
    let c = curr[idx];
    let laplacian = curr[idx - 1u] + curr[idx + 1u] + curr[idx - nx] + curr[idx + nx] - 4.0 * c;
    let value = (2.0 * c - prev[idx] + params.cfl2 * laplacian) * params.elasticity;

    var footprint = vec2<f32>(0.0, 0.0);
    if (params.entry_count > 0u) {
        footprint = footprint_at(i, j);
    }
    let trail = clamp(obstacle[idx], 0.0, 1.0) * params.dispersion;
    next[idx] = value * (1.0 - max(trail, footprint.x)) + params.wake_scale * footprint.y;
}
"#;

/// Rim treatment, one edge pair per dispatch.
const WGSL_BOUNDARY_SHADER: &str = r#"
struct BoundaryParams {
    nx: u32,
    ny: u32,
    policy: u32,     // 0 = absorptive, 1 = reflective
    edge_pass: u32,  // 0 = rows (j = 0, ny-1), 1 = columns (i = 0, nx-1)
    v: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
}

@group(0) @binding(0) var<uniform> bc: BoundaryParams;
@group(0) @binding(1) var<storage, read_write> curr: array<f32>;
@group(0) @binding(2) var<storage, read_write> next: array<f32>;

fn cell(i: u32, j: u32) -> u32 {
    return j * bc.nx + i;
}

fn rim(edge: u32, inner: u32) {
    if (bc.policy == 0u) {
        next[edge] = curr[inner] + bc.v * (next[inner] - curr[edge]);
    } else {
        curr[edge] = 0.0;
        next[edge] = 0.0;
    }
}

@compute @workgroup_size(64)
fn apply_boundary(@builtin(global_invocation_id) gid: vec3<u32>) {
    let k = gid.x;
    if (bc.edge_pass == 0u) {
        if (k >= bc.nx) {
            return;
        }
        rim(cell(k, 0u), cell(k, 1u));
        rim(cell(k, bc.ny - 1u), cell(k, bc.ny - 2u));
    } else {
        if (k >= bc.ny) {
            return;
        }
        rim(cell(0u, k), cell(1u, k));
        rim(cell(bc.nx - 1u, k), cell(bc.nx - 2u, k));
    }
}
"#;

/// Whole-cell shift of `next` and `curr` into the staging buffers.
const WGSL_SCROLL_SHADER: &str = r#"
struct ScrollParams {
    nx: u32,
    ny: u32,
    offset_x: i32,
    offset_y: i32,
}

@group(0) @binding(0) var<uniform> sp: ScrollParams;
@group(0) @binding(1) var<storage, read> next: array<f32>;
@group(0) @binding(2) var<storage, read> curr: array<f32>;
@group(0) @binding(3) var<storage, read_write> staged_next: array<f32>;
@group(0) @binding(4) var<storage, read_write> staged_curr: array<f32>;

@compute @workgroup_size(8, 8)
fn scroll_stage(@builtin(global_invocation_id) gid: vec3<u32>) {
    let i = gid.x;
    let j = gid.y;
    if (i >= sp.nx || j >= sp.ny) {
        return;
    }

    let dst = j * sp.nx + i;
    let si = i32(i) + sp.offset_x;
    let sj = i32(j) + sp.offset_y;
    if (si < 0 || sj < 0 || si >= i32(sp.nx) || sj >= i32(sp.ny)) {
        staged_next[dst] = 0.0;
        staged_curr[dst] = 0.0;
        return;
    }

    let src = u32(sj) * sp.nx + u32(si);
    staged_next[dst] = next[src];
    staged_curr[dst] = curr[src];
}
"#;

/// Uniforms for the wave kernel (must match WGSL `StepParams`).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct StepUniforms {
    nx: u32,
    ny: u32,
    entry_count: u32,
    wake_scale: f32,
    cfl2: f32,
    elasticity: f32,
    dispersion: f32,
    feather: f32,
    origin_x: f32,
    origin_z: f32,
    tex_world_size: f32,
    radius: f32,
}

/// Uniforms for the boundary kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BoundaryUniforms {
    nx: u32,
    ny: u32,
    policy: u32,
    edge_pass: u32,
    v: f32,
    _pad: [f32; 3],
}

/// Uniforms for the scroll kernel.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ScrollUniforms {
    nx: u32,
    ny: u32,
    offset_x: i32,
    offset_y: i32,
}

const BOUNDARY_WORKGROUP: u32 = 64;

/// Storage buffers for the wave state.
struct StateBuffers {
    prev: wgpu::Buffer,
    curr: wgpu::Buffer,
    next: wgpu::Buffer,
    staged_next: wgpu::Buffer,
    staged_curr: wgpu::Buffer,
    obstacle: wgpu::Buffer,
    readback: wgpu::Buffer,
}

impl StateBuffers {
    fn new(device: &wgpu::Device, resolution: Resolution) -> Self {
        let size = field_bytes(resolution);
        let state_usage = wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC;
        let state = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: state_usage,
                mapped_at_creation: false,
            })
        };

        Self {
            prev: state("Wave Prev"),
            curr: state("Wave Curr"),
            next: state("Wave Next"),
            staged_next: state("Staged Next"),
            staged_curr: state("Staged Curr"),
            obstacle: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Obstacle"),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
            readback: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Wave Readback"),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        }
    }
}

fn field_bytes(resolution: Resolution) -> u64 {
    (resolution.cell_count() * std::mem::size_of::<f32>()) as u64
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    entry_point: &str,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point,
    })
}

/// Wave solver running as wgpu compute kernels.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    resolution: Resolution,
    adapter_name: String,

    wave_pipeline: wgpu::ComputePipeline,
    wave_layout: wgpu::BindGroupLayout,
    boundary_pipeline: wgpu::ComputePipeline,
    scroll_pipeline: wgpu::ComputePipeline,

    buffers: StateBuffers,
    step_uniforms: wgpu::Buffer,
    boundary_uniforms: [wgpu::Buffer; 2],
    scroll_uniforms: wgpu::Buffer,
    entries: wgpu::Buffer,
    entry_capacity: usize,

    wave_bind_group: wgpu::BindGroup,
    boundary_bind_groups: [wgpu::BindGroup; 2],
    scroll_bind_group: wgpu::BindGroup,

    /// Whether the staging buffers hold data from the last dispatch.
    staged: bool,
}

impl WgpuBackend {
    /// Pick an adapter, create the device and allocate buffers for `resolution`.
    pub async fn new(resolution: Resolution) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                RippleError::BackendUnavailable("No WebGPU adapter found".to_string())
            })?;

        let info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ripplefield Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| RippleError::Backend(format!("Failed to create device: {}", e)))?;

        Self::from_device(Arc::new(device), Arc::new(queue), resolution, info.name)
    }

    /// Build on an existing device.
    pub fn from_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        resolution: Resolution,
        adapter_name: String,
    ) -> Result<Self> {
        let max_binding = device.limits().max_storage_buffer_binding_size as u64;
        if field_bytes(resolution) > max_binding {
            return Err(RippleError::config(
                "resolution",
                format!(
                    "{resolution} exceeds the device storage binding limit of {max_binding} bytes"
                ),
            ));
        }

        let wave_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Wave Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, true),
                storage_entry(5, true),
            ],
        });
        let boundary_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Boundary Bind Group Layout"),
            entries: &[uniform_entry(0), storage_entry(1, false), storage_entry(2, false)],
        });
        let scroll_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scroll Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        });

        let wave_pipeline =
            compute_pipeline(&device, "Wave Step", WGSL_WAVE_SHADER, "wave_step", &wave_layout);
        let boundary_pipeline = compute_pipeline(
            &device,
            "Apply Boundary",
            WGSL_BOUNDARY_SHADER,
            "apply_boundary",
            &boundary_layout,
        );
        let scroll_pipeline = compute_pipeline(
            &device,
            "Scroll Stage",
            WGSL_SCROLL_SHADER,
            "scroll_stage",
            &scroll_layout,
        );

        let buffers = StateBuffers::new(&device, resolution);

        let uniform = |label: &str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let step_uniforms = uniform("Step Uniforms", std::mem::size_of::<StepUniforms>());
        let boundary_uniforms = [
            uniform("Boundary Rows Uniforms", std::mem::size_of::<BoundaryUniforms>()),
            uniform("Boundary Columns Uniforms", std::mem::size_of::<BoundaryUniforms>()),
        ];
        let scroll_uniforms = uniform("Scroll Uniforms", std::mem::size_of::<ScrollUniforms>());

        let entry_capacity = 1;
        let entries = Self::create_entry_buffer(&device, entry_capacity);
        let wave_bind_group =
            Self::create_wave_bind_group(&device, &wave_layout, &step_uniforms, &buffers, &entries);

        let boundary_bind_group = |uniforms: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Boundary Bind Group"),
                layout: &boundary_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffers.curr.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffers.next.as_entire_binding(),
                    },
                ],
            })
        };
        let boundary_bind_groups = [
            boundary_bind_group(&boundary_uniforms[0]),
            boundary_bind_group(&boundary_uniforms[1]),
        ];

        let scroll_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Scroll Bind Group"),
            layout: &scroll_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: scroll_uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.next.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.curr.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.staged_next.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.staged_curr.as_entire_binding(),
                },
            ],
        });

        tracing::info!(adapter = %adapter_name, %resolution, "created wgpu solver backend");

        Ok(Self {
            device,
            queue,
            resolution,
            adapter_name,
            wave_pipeline,
            wave_layout,
            boundary_pipeline,
            scroll_pipeline,
            buffers,
            step_uniforms,
            boundary_uniforms,
            scroll_uniforms,
            entries,
            entry_capacity,
            wave_bind_group,
            boundary_bind_groups,
            scroll_bind_group,
            staged: false,
        })
    }

    /// Name of the adapter in use.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Get device reference.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    fn create_entry_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Disturbance Entries"),
            size: (capacity * PackedDisturbanceEntry::SIZE) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_wave_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::Buffer,
        buffers: &StateBuffers,
        entries: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Wave Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.prev.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.curr.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.next.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.obstacle.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: entries.as_entire_binding(),
                },
            ],
        })
    }

    /// Upload packed entries, growing the storage buffer geometrically.
    fn upload_entries(&mut self, entries: &[PackedDisturbanceEntry]) {
        if entries.len() > self.entry_capacity {
            let capacity = entries.len().max(self.entry_capacity * 2);
            tracing::debug!(
                from = self.entry_capacity,
                to = capacity,
                "growing disturbance entry buffer"
            );
            self.entries = Self::create_entry_buffer(&self.device, capacity);
            self.entry_capacity = capacity;
            self.wave_bind_group = Self::create_wave_bind_group(
                &self.device,
                &self.wave_layout,
                &self.step_uniforms,
                &self.buffers,
                &self.entries,
            );
        }
        if !entries.is_empty() {
            self.queue.write_buffer(&self.entries, 0, bytemuck::cast_slice(entries));
        }
    }

    fn boundary_params(&self, policy: BoundaryPolicy, edge_pass: u32, v: f32) -> BoundaryUniforms {
        BoundaryUniforms {
            nx: self.resolution.nx,
            ny: self.resolution.ny,
            policy: policy as u32,
            edge_pass,
            v,
            _pad: [0.0; 3],
        }
    }
}

impl SolverBackend for WgpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wgpu
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn rotate(&mut self, boundary: BoundaryPolicy, params: &WaveParams) -> Result<()> {
        let v = params.absorption_coefficient();
        for (edge_pass, buffer) in self.boundary_uniforms.iter().enumerate() {
            let uniforms = self.boundary_params(boundary, edge_pass as u32, v);
            self.queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));
        }

        let size = field_bytes(self.resolution);
        let b = &self.buffers;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Rotate Encoder"),
            });

        if self.staged {
            encoder.copy_buffer_to_buffer(&b.staged_next, 0, &b.next, 0, size);
            encoder.copy_buffer_to_buffer(&b.staged_curr, 0, &b.curr, 0, size);
        }

        let longest_edge = self.resolution.nx.max(self.resolution.ny);
        for bind_group in &self.boundary_bind_groups {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Boundary Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.boundary_pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(longest_edge.div_ceil(BOUNDARY_WORKGROUP), 1, 1);
        }

        encoder.copy_buffer_to_buffer(&b.curr, 0, &b.prev, 0, size);
        encoder.copy_buffer_to_buffer(&b.next, 0, &b.curr, 0, size);

        self.queue.submit(std::iter::once(encoder.finish()));
        self.staged = false;
        Ok(())
    }

    fn dispatch(&mut self, input: &DispatchInput<'_>) -> Result<()> {
        input.obstacle.ensure_resolution("obstacle", self.resolution)?;

        self.upload_entries(input.entries);
        self.queue.write_buffer(
            &self.buffers.obstacle,
            0,
            bytemuck::cast_slice(input.obstacle.as_slice()),
        );

        if let Some((cell, value)) = input.forcing {
            let offset = (self.resolution.index(cell.x, cell.y) * std::mem::size_of::<f32>()) as u64;
            self.queue
                .write_buffer(&self.buffers.curr, offset, bytemuck::bytes_of(&value));
        }

        let footprint = input.footprint;
        let step = StepUniforms {
            nx: self.resolution.nx,
            ny: self.resolution.ny,
            entry_count: input.entries.len() as u32,
            wake_scale: input.params.wake_scale(),
            cfl2: input.params.cfl_squared(),
            elasticity: input.params.elasticity,
            dispersion: input.params.dispersion,
            feather: FOOTPRINT_FEATHER,
            origin_x: footprint.origin.x,
            origin_z: footprint.origin.y,
            tex_world_size: footprint.tex_world_size,
            radius: footprint.radius,
        };
        self.queue.write_buffer(&self.step_uniforms, 0, bytemuck::bytes_of(&step));

        let scroll = ScrollUniforms {
            nx: self.resolution.nx,
            ny: self.resolution.ny,
            offset_x: input.scroll.0,
            offset_y: input.scroll.1,
        };
        self.queue.write_buffer(&self.scroll_uniforms, 0, bytemuck::bytes_of(&scroll));

        let (groups_x, groups_y) = self.resolution.workgroups();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Wave Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Wave Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.wave_pipeline);
            pass.set_bind_group(0, &self.wave_bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Scroll Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.scroll_pipeline);
            pass.set_bind_group(0, &self.scroll_bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.staged = true;
        Ok(())
    }

    fn read_current(&mut self) -> Result<Field> {
        let size = field_bytes(self.resolution);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.buffers.curr, 0, &self.buffers.readback, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = self.buffers.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| RippleError::TransferFailed(format!("Map callback dropped: {}", e)))?
            .map_err(|e| RippleError::TransferFailed(format!("Map failed: {:?}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let values: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        self.buffers.readback.unmap();

        Field::from_vec(self.resolution, values)
    }

    fn reset(&mut self) -> Result<()> {
        let zeros = vec![0.0_f32; self.resolution.cell_count()];
        let bytes: &[u8] = bytemuck::cast_slice(&zeros);
        let b = &self.buffers;
        for buffer in [&b.prev, &b.curr, &b.next, &b.staged_next, &b.staged_curr, &b.obstacle] {
            self.queue.write_buffer(buffer, 0, bytes);
        }
        self.queue.submit(std::iter::empty());
        self.staged = false;
        Ok(())
    }
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter_name)
            .field("resolution", &self.resolution)
            .field("entry_capacity", &self.entry_capacity)
            .field("staged", &self.staged)
            .finish()
    }
}
