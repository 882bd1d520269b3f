use std::num::NonZeroU64;

use bytemuck::{bytes_of, Pod, Zeroable};

use crate::config::BloomSettings;

use super::shaders;

/// Format of the offscreen scene target the lit pass draws into.
#[cfg(not(target_arch = "wasm32"))]
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
#[cfg(target_arch = "wasm32")]
pub const SCENE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Unreal-style glow: bright pass at half resolution, separable gaussian
/// blur, then an additive composite onto the output surface.
///
/// The pass owns the full resolution scene target so it can rebuild every
/// dependent bind group when the window is resized.
pub struct BloomPass {
    size: (u32, u32),
    sampler: wgpu::Sampler,
    source_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    bright_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    bright_params: wgpu::Buffer,
    horizontal_params: wgpu::Buffer,
    vertical_params: wgpu::Buffer,
    composite_params: wgpu::Buffer,
    targets: BloomTargets,
}

impl BloomPass {
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let bloom_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLOOM.into()),
        });
        let composite_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("bloom-composite-shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::COMPOSITE.into()),
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("bloom-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let source_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-source-layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                params_entry(2),
            ],
        });
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("bloom-composite-layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                params_entry(3),
            ],
        });

        let source_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("bloom-pipeline-layout"),
            bind_group_layouts: &[&source_layout],
            push_constant_ranges: &[],
        });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("bloom-composite-pipeline-layout"),
                bind_group_layouts: &[&composite_layout],
                push_constant_ranges: &[],
            });

        let bright_pipeline = fullscreen_pipeline(
            device,
            "bloom-bright-pipeline",
            &source_pipeline_layout,
            &bloom_module,
            "fs_bright",
            SCENE_FORMAT,
        );
        let blur_pipeline = fullscreen_pipeline(
            device,
            "bloom-blur-pipeline",
            &source_pipeline_layout,
            &bloom_module,
            "fs_blur",
            SCENE_FORMAT,
        );
        let composite_pipeline = fullscreen_pipeline(
            device,
            "bloom-composite-pipeline",
            &composite_pipeline_layout,
            &composite_module,
            "fs_composite",
            output_format,
        );

        let bright_params = params_buffer(device, "bloom-bright-params");
        let horizontal_params = params_buffer(device, "bloom-horizontal-params");
        let vertical_params = params_buffer(device, "bloom-vertical-params");
        let composite_params = params_buffer(device, "bloom-composite-params");

        let size = (width.max(1), height.max(1));
        let targets = BloomTargets::create(
            device,
            size,
            &sampler,
            &source_layout,
            &composite_layout,
            [&bright_params, &horizontal_params, &vertical_params, &composite_params],
        );

        Self {
            size,
            sampler,
            source_layout,
            composite_layout,
            bright_pipeline,
            blur_pipeline,
            composite_pipeline,
            bright_params,
            horizontal_params,
            vertical_params,
            composite_params,
            targets,
        }
    }

    /// View the lit scene must be rendered into before [`BloomPass::encode`].
    pub fn scene_view(&self) -> &wgpu::TextureView {
        &self.targets.scene.view
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Recreates the intermediate targets for a new output size.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if size == self.size {
            return;
        }
        self.size = size;
        self.targets = BloomTargets::create(
            device,
            size,
            &self.sampler,
            &self.source_layout,
            &self.composite_layout,
            [
                &self.bright_params,
                &self.horizontal_params,
                &self.vertical_params,
                &self.composite_params,
            ],
        );
    }

    /// Uploads the per-stage parameters for the current settings and size.
    pub fn prepare(&self, queue: &wgpu::Queue, settings: &BloomSettings) {
        let (half_width, half_height) = half_size(self.size);
        let texel = [1.0 / half_width as f32, 1.0 / half_height as f32];
        let stage = |direction: [f32; 2]| BloomParams {
            direction,
            texel,
            threshold: settings.threshold,
            strength: settings.strength,
            radius: settings.radius,
            _pad: 0.0,
        };
        queue.write_buffer(&self.bright_params, 0, bytes_of(&stage([0.0, 0.0])));
        queue.write_buffer(&self.horizontal_params, 0, bytes_of(&stage([1.0, 0.0])));
        queue.write_buffer(&self.vertical_params, 0, bytes_of(&stage([0.0, 1.0])));
        queue.write_buffer(&self.composite_params, 0, bytes_of(&stage([0.0, 0.0])));
    }

    /// Records the bright, blur and composite passes. `output` receives the
    /// final image.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, output: &wgpu::TextureView) {
        let targets = &self.targets;
        fullscreen_pass(
            encoder,
            "bloom-bright-pass",
            &targets.bright.view,
            &self.bright_pipeline,
            &targets.bright_group,
        );
        fullscreen_pass(
            encoder,
            "bloom-horizontal-pass",
            &targets.blur.view,
            &self.blur_pipeline,
            &targets.horizontal_group,
        );
        fullscreen_pass(
            encoder,
            "bloom-vertical-pass",
            &targets.bright.view,
            &self.blur_pipeline,
            &targets.vertical_group,
        );
        fullscreen_pass(
            encoder,
            "bloom-composite-pass",
            output,
            &self.composite_pipeline,
            &targets.composite_group,
        );
    }
}

fn half_size((width, height): (u32, u32)) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct BloomParams {
    direction: [f32; 2],
    texel: [f32; 2],
    threshold: f32,
    strength: f32,
    radius: f32,
    _pad: f32,
}

struct ColorTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl ColorTarget {
    fn create(device: &wgpu::Device, label: &str, (width, height): (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SCENE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Size dependent textures and the bind groups that sample them.
struct BloomTargets {
    scene: ColorTarget,
    bright: ColorTarget,
    blur: ColorTarget,
    bright_group: wgpu::BindGroup,
    horizontal_group: wgpu::BindGroup,
    vertical_group: wgpu::BindGroup,
    composite_group: wgpu::BindGroup,
}

impl BloomTargets {
    fn create(
        device: &wgpu::Device,
        size: (u32, u32),
        sampler: &wgpu::Sampler,
        source_layout: &wgpu::BindGroupLayout,
        composite_layout: &wgpu::BindGroupLayout,
        [bright_params, horizontal_params, vertical_params, composite_params]: [&wgpu::Buffer; 4],
    ) -> Self {
        let scene = ColorTarget::create(device, "bloom-scene-target", size);
        let bright = ColorTarget::create(device, "bloom-bright-target", half_size(size));
        let blur = ColorTarget::create(device, "bloom-blur-target", half_size(size));

        let source_group = |label: &str, view: &wgpu::TextureView, params: &wgpu::Buffer| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: source_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: params.as_entire_binding(),
                    },
                ],
            })
        };
        let bright_group = source_group("bloom-bright-group", &scene.view, bright_params);
        let horizontal_group = source_group("bloom-horizontal-group", &bright.view, horizontal_params);
        let vertical_group = source_group("bloom-vertical-group", &blur.view, vertical_params);

        let composite_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("bloom-composite-group"),
            layout: composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&scene.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&bright.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: composite_params.as_entire_binding(),
                },
            ],
        });

        Self {
            scene,
            bright,
            blur,
            bright_group,
            horizontal_group,
            vertical_group,
            composite_group,
        }
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

fn params_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<BloomParams>() as u64),
        },
        count: None,
    }
}

fn params_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<BloomParams>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

fn fullscreen_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            depth_slice: None,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_match_the_wgsl_layout() {
        assert_eq!(std::mem::size_of::<BloomParams>(), 32);
    }

    #[test]
    fn half_size_never_reaches_zero() {
        assert_eq!(half_size((1280, 720)), (640, 360));
        assert_eq!(half_size((1, 1)), (1, 1));
        assert_eq!(half_size((3, 0)), (1, 1));
    }

    #[test]
    fn blur_uses_a_normalized_kernel() {
        let weights = [0.227027_f32, 0.1945946, 0.1216216, 0.054054, 0.016216];
        let total = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-3);
        assert!(shaders::BLOOM.contains("0.227027"));
    }
}
