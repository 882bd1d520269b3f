//! WGSL sources. Material programs are assembled from these pieces by
//! [`crate::shading::program`].

/// Bindings shared by the lit and emissive programs, plus the Phong helper.
pub const LIT_PRELUDE: &str = r#"
struct Globals {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

struct Surface {
    model_view: mat4x4<f32>,
    normal: mat3x4<f32>,
    // rgb: diffuse color, a: ambient intensity.
    diffuse: vec4<f32>,
    // xyz: light position in view space.
    light: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: Globals;

@group(1) @binding(0)
var<uniform> surface: Surface;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) view_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

fn phong(normal_in: vec3<f32>, view_position: vec3<f32>, shininess: f32, specular_tint: vec3<f32>) -> vec3<f32> {
    let base = surface.diffuse.rgb;
    let normal = normalize(normal_in);
    let ambient = surface.diffuse.a * base;

    let light_dir = normalize(surface.light.xyz - view_position);
    let diffuse = max(dot(normal, light_dir), 0.0) * base;

    let view_dir = normalize(-view_position);
    let reflect_dir = reflect(-light_dir, normal);
    let specular = pow(max(dot(view_dir, reflect_dir), 0.0), shininess) * specular_tint;

    return ambient + diffuse + specular;
}
"#;

pub const LIT_VERTEX: &str = r#"
@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let view_position = surface.model_view * vec4<f32>(input.position, 1.0);
    out.clip_position = globals.projection * view_position;
    out.view_position = view_position.xyz;

    let normal_matrix = mat3x3<f32>(
        surface.normal[0].xyz,
        surface.normal[1].xyz,
        surface.normal[2].xyz
    );
    out.normal = normalize(normal_matrix * input.normal);
    return out;
}
"#;

pub const PLASTIC_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = phong(input.normal, input.view_position, 16.0, vec3<f32>(0.3, 0.3, 0.3));
    return vec4<f32>(color, 1.0);
}
"#;

pub const METAL_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let color = phong(input.normal, input.view_position, 32.0, surface.diffuse.rgb);
    return vec4<f32>(color, 1.0);
}
"#;

pub const EMISSIVE_FRAGMENT: &str = r#"
@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

/// Fullscreen triangle plus the bright-pass and blur stages of the glow.
pub const BLOOM: &str = r#"
struct BloomParams {
    direction: vec2<f32>,
    texel: vec2<f32>,
    threshold: f32,
    strength: f32,
    radius: f32,
    _pad: f32,
}

@group(0) @binding(0)
var source: texture_2d<f32>;

@group(0) @binding(1)
var source_sampler: sampler;

@group(0) @binding(2)
var<uniform> params: BloomParams;

struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    var out: FullscreenOutput;
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_bright(input: FullscreenOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(source, source_sampler, input.uv, 0.0).rgb;
    let luminance = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    let weight = smoothstep(params.threshold, params.threshold + 0.1, luminance);
    return vec4<f32>(color * weight, 1.0);
}

@fragment
fn fs_blur(input: FullscreenOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    let step = params.direction * params.texel * (1.0 + params.radius * 2.0);
    var color = textureSampleLevel(source, source_sampler, input.uv, 0.0).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = step * f32(i);
        color = color + textureSampleLevel(source, source_sampler, input.uv + offset, 0.0).rgb * weights[i];
        color = color + textureSampleLevel(source, source_sampler, input.uv - offset, 0.0).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}
"#;

/// Adds the blurred glow on top of the scene and writes the final frame.
pub const COMPOSITE: &str = r#"
struct BloomParams {
    direction: vec2<f32>,
    texel: vec2<f32>,
    threshold: f32,
    strength: f32,
    radius: f32,
    _pad: f32,
}

@group(0) @binding(0)
var scene_texture: texture_2d<f32>;

@group(0) @binding(1)
var glow_texture: texture_2d<f32>;

@group(0) @binding(2)
var linear_sampler: sampler;

@group(0) @binding(3)
var<uniform> params: BloomParams;

struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    var out: FullscreenOutput;
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    out.position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_composite(input: FullscreenOutput) -> @location(0) vec4<f32> {
    let base = textureSampleLevel(scene_texture, linear_sampler, input.uv, 0.0).rgb;
    let glow = textureSampleLevel(glow_texture, linear_sampler, input.uv, 0.0).rgb;
    return vec4<f32>(base + glow * params.strength, 1.0);
}
"#;
