use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use log::{debug, info};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::mesh::{Mesh, VERTEX_STRIDE};
use crate::shading::{self, MaterialKind, ShaderProgram, EMISSIVE_PROGRAM};

use super::bloom::{BloomPass, SCENE_FORMAT};
use super::{Compositor, Frame, FrameError};

/// wgpu renderer: lit glyphs and the light marker into an offscreen target,
/// then the bloom pass onto the window surface.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    bloom: BloomPass,
    lit_pipelines: HashMap<MaterialKind, wgpu::RenderPipeline>,
    emissive_pipeline: wgpu::RenderPipeline,
    global_buffer: wgpu::Buffer,
    global_bind_group: wgpu::BindGroup,
    object_layout: wgpu::BindGroupLayout,
    marker_mesh: MeshBuffers,
    glyph_meshes: Vec<Option<MeshBuffers>>,
}

impl Renderer {
    /// Initializes the GPU for `window`. Fails when no adapter or device is
    /// available.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let required_limits = if cfg!(target_arch = "wasm32") {
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        } else {
            wgpu::Limits::default()
        };
        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("glyph-glow-device"),
            required_features: wgpu::Features::empty(),
            required_limits,
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;
        info!("rendering with {:?}", adapter.get_info().backend);

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no supported formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: vsync_present_mode(&surface_caps.present_modes),
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);
        let bloom = BloomPass::new(&device, surface_format, config.width, config.height);

        let global_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global-bind-layout"),
            entries: &[uniform_entry(std::mem::size_of::<GlobalUniform>())],
        });
        let object_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("object-bind-layout"),
            entries: &[uniform_entry(std::mem::size_of::<ObjectConstants>())],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lit-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout],
            push_constant_ranges: &[],
        });

        let global_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global-uniform"),
            size: std::mem::size_of::<GlobalUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let lit_pipelines = MaterialKind::ALL
            .into_iter()
            .map(|kind| {
                let pipeline =
                    mesh_pipeline(&device, &pipeline_layout, kind.name(), shading::program(kind));
                (kind, pipeline)
            })
            .collect();
        let emissive_pipeline =
            mesh_pipeline(&device, &pipeline_layout, "emissive", EMISSIVE_PROGRAM);

        let marker_mesh = MeshBuffers::from_mesh(&device, &Mesh::cube(), "light-marker");

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            bloom,
            lit_pipelines,
            emissive_pipeline,
            global_buffer,
            global_bind_group,
            object_layout,
            marker_mesh,
            glyph_meshes: Vec::new(),
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Reconfigures the surface and every size dependent target. Zero sized
    /// or unchanged sizes are ignored.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 || new_size == self.size {
            return;
        }
        self.reconfigure(new_size);
    }

    /// Reconfigures the surface at the current size, used after the surface
    /// is lost or outdated.
    pub fn recover(&mut self) {
        self.reconfigure(self.size);
    }

    fn reconfigure(&mut self, size: PhysicalSize<u32>) {
        self.size = size;
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, size.width, size.height);
        self.bloom.resize(&self.device, size.width, size.height);
    }

    fn sync_glyph_meshes(&mut self, frame: &Frame<'_>) {
        for glyph in frame.glyphs.iter().skip(self.glyph_meshes.len()) {
            let buffers = (!glyph.mesh.is_empty())
                .then(|| MeshBuffers::from_mesh(&self.device, &glyph.mesh, &glyph.label));
            debug!("uploaded mesh for glyph {}", glyph.label);
            self.glyph_meshes.push(buffers);
        }
    }

    fn object_bind_group(&self, constants: &ObjectConstants) -> wgpu::BindGroup {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("object-uniform"),
                contents: bytes_of(constants),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("object-bind-group"),
            layout: &self.object_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }
}

impl Compositor for Renderer {
    fn composite(&mut self, frame: &Frame<'_>) -> Result<(), FrameError> {
        self.sync_glyph_meshes(frame);

        let globals = GlobalUniform {
            view: frame.view.to_cols_array_2d(),
            projection: frame.projection.to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.global_buffer, 0, bytes_of(&globals));
        self.bloom.prepare(&self.queue, &frame.bloom);

        let marker_group = self.object_bind_group(&ObjectConstants::new(
            frame.view,
            frame.marker_model,
            Vec3::ONE,
            1.0,
            frame.light_position,
        ));
        let glyph_draws: Vec<(MaterialKind, usize, wgpu::BindGroup)> = frame
            .glyphs
            .iter()
            .enumerate()
            .filter(|(index, _)| matches!(self.glyph_meshes.get(*index), Some(Some(_))))
            .map(|(index, glyph)| {
                let material = &glyph.material;
                let constants = ObjectConstants::new(
                    frame.view,
                    glyph.model_matrix(),
                    material.diffuse_color,
                    material.ambient_intensity,
                    material.light_position(),
                );
                (material.kind, index, self.object_bind_group(&constants))
            })
            .collect();

        let output = self.surface.get_current_texture()?;
        let output_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.bloom.scene_view(),
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
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
            pass.set_bind_group(0, &self.global_bind_group, &[]);

            pass.set_pipeline(&self.emissive_pipeline);
            self.marker_mesh.draw(&mut pass, &marker_group);

            for (kind, index, bind_group) in &glyph_draws {
                let (Some(pipeline), Some(Some(mesh))) =
                    (self.lit_pipelines.get(kind), self.glyph_meshes.get(*index))
                else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                mesh.draw(&mut pass, bind_group);
            }
        }

        self.bloom.encode(&mut encoder, &output_view);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn uniform_entry(size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn mesh_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    name: &str,
    program: ShaderProgram,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{name}-shader")),
        source: wgpu::ShaderSource::Wgsl(program.source().into()),
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&format!("{name}-pipeline")),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: (VERTEX_STRIDE * std::mem::size_of::<f32>()) as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: (3 * std::mem::size_of::<f32>()) as u64,
                        shader_location: 1,
                    },
                ],
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: SCENE_FORMAT,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: mesh.indices.len() as u32,
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>, bind_group: &wgpu::BindGroup) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), wgpu::IndexFormat::Uint32);
        pass.set_bind_group(1, bind_group, &[]);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Presentation waits for vblank: one tick per displayed frame.
fn vsync_present_mode(supported: &[wgpu::PresentMode]) -> wgpu::PresentMode {
    supported
        .iter()
        .copied()
        .find(|mode| *mode == wgpu::PresentMode::Fifo)
        .unwrap_or(wgpu::PresentMode::AutoVsync)
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct GlobalUniform {
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ObjectConstants {
    model_view: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    diffuse: [f32; 4],
    light: [f32; 4],
}

impl ObjectConstants {
    /// Everything is expressed in view space; the light is given in world
    /// space and transformed here.
    fn new(view: Mat4, model: Mat4, diffuse: Vec3, ambient: f32, light_world: Vec3) -> Self {
        let model_view = view * model;
        let normal = Mat3::from_mat4(model_view).inverse().transpose();
        let light = view.transform_point3(light_world);
        Self {
            model_view: model_view.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            diffuse: diffuse.extend(ambient).into(),
            light: light.extend(1.0).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_match_the_wgsl_structs() {
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 128);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 144);
    }

    #[test]
    fn object_constants_move_the_light_into_view_space() {
        let view = Mat4::look_to_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z, Vec3::Y);
        let constants = ObjectConstants::new(
            view,
            Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            Vec3::new(1.0, 0.5, 0.25),
            0.2,
            Vec3::new(0.0, 0.0, 2.0),
        );
        assert_eq!(constants.light, [0.0, 0.0, -3.0, 1.0]);
        assert_eq!(constants.diffuse, [1.0, 0.5, 0.25, 0.2]);
        assert_eq!(constants.model_view[3], [2.0, 0.0, -5.0, 1.0]);
    }

    #[test]
    fn presentation_waits_for_vblank() {
        use wgpu::PresentMode::*;
        assert_eq!(vsync_present_mode(&[Mailbox, Immediate, Fifo]), Fifo);
        assert_eq!(vsync_present_mode(&[Immediate, Mailbox]), AutoVsync);
    }

    #[test]
    fn normal_matrix_is_padded_per_column() {
        let packed = mat3_to_3x4(Mat3::from_diagonal(Vec3::new(1.0, 2.0, 4.0)));
        assert_eq!(packed[1], [0.0, 2.0, 0.0, 0.0]);
        assert!(packed.iter().all(|column| column[3] == 0.0));
    }
}
