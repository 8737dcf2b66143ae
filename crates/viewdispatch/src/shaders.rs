//! GLSL 450 sources for the view programs.
//!
//! All programs share one vertex stage and one resource layout:
//!
//! ```text
//! set 0, binding 0   ViewParams uniform block (blend_factor)
//! set 1, binding 0/1 source_image  texture + sampler   (SOURCE_UNIT)
//! set 1, binding 2/3 overlay_image texture + sampler   (OVERLAY_UNIT)
//! ```
//!
//! Texture coordinates arrive in texels (see `FrameGeometry`), so fragments
//! read with `texelFetch` instead of normalized sampling.

/// Pass-through vertex stage for the full-frame quad.
pub const QUAD_VERTEX: &str = r"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texcoord;
layout(location = 0) out vec2 v_texcoord;

void main() {
    v_texcoord = a_texcoord;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

const PRELUDE: &str = r"#version 450
layout(location = 0) in vec2 v_texcoord;
layout(location = 0) out vec4 out_color;

layout(std140, set = 0, binding = 0) uniform ViewParams {
    float blend_factor;
    float _pad0;
    float _pad1;
    float _pad2;
} params;

layout(set = 1, binding = 0) uniform texture2D source_image;
layout(set = 1, binding = 1) uniform sampler source_sampler;
layout(set = 1, binding = 2) uniform texture2D overlay_image;
layout(set = 1, binding = 3) uniform sampler overlay_sampler;

vec4 fetch_source() {
    ivec2 size = textureSize(sampler2D(source_image, source_sampler), 0);
    ivec2 texel = clamp(ivec2(v_texcoord), ivec2(0), size - ivec2(1));
    return texelFetch(sampler2D(source_image, source_sampler), texel, 0);
}

vec4 fetch_overlay() {
    ivec2 size = textureSize(sampler2D(overlay_image, overlay_sampler), 0);
    ivec2 texel = clamp(ivec2(v_texcoord), ivec2(0), size - ivec2(1));
    return texelFetch(sampler2D(overlay_image, overlay_sampler), texel, 0);
}
";

const PLAIN_IMAGE_BODY: &str = r"
void main() {
    out_color = vec4(fetch_source().rgb, 1.0);
}
";

const CANVAS_OVERLAY_BODY: &str = r"
void main() {
    vec4 source = fetch_source();
    vec4 overlay = fetch_overlay();
    float weight = params.blend_factor * overlay.a;
    out_color = vec4(mix(source.rgb, overlay.rgb, weight), 1.0);
}
";

// Depth arrives normalized in the red channel; 1.0 is background.
const DEPTH_PASS_BODY: &str = r"
void main() {
    float depth = fetch_source().r;
    float shade = depth >= 1.0 ? 0.0 : 1.0 - depth;
    out_color = vec4(vec3(shade), 1.0);
}
";

const DISTANCE_TRANSFORM_BODY: &str = r"
void main() {
    float dist = fetch_source().r;
    float bands = 0.5 + 0.5 * cos(dist * 64.0);
    out_color = vec4(dist, bands * (1.0 - dist), 1.0 - dist, 1.0);
}
";

const CONTOUR_BODY: &str = r"
void main() {
    vec4 texel = fetch_source();
    vec3 background = vec3(0.08);
    vec3 inner = vec3(0.1, 0.85, 0.3);
    vec3 outer = vec3(1.0, 0.75, 0.1);
    vec3 color = mix(background, outer, texel.r);
    color = mix(color, inner, texel.g);
    out_color = vec4(color, 1.0);
}
";

const EDGE_MODEL_BODY: &str = r"
void main() {
    float edge = fetch_source().r;
    out_color = vec4(0.0, edge, edge * 0.4, 1.0);
}
";

const HARRIS_BODY: &str = r"
void main() {
    float response = fetch_source().r;
    vec3 cold = vec3(0.0, 0.0, 0.3);
    vec3 hot = vec3(1.0, 0.9, 0.2);
    out_color = vec4(mix(cold, hot, smoothstep(0.2, 0.8, response)), 1.0);
}
";

fn with_prelude(body: &str) -> String {
    format!("{PRELUDE}{body}")
}

pub fn plain_image() -> String {
    with_prelude(PLAIN_IMAGE_BODY)
}

pub fn canvas_overlay() -> String {
    with_prelude(CANVAS_OVERLAY_BODY)
}

pub fn depth_pass() -> String {
    with_prelude(DEPTH_PASS_BODY)
}

pub fn distance_transform() -> String {
    with_prelude(DISTANCE_TRANSFORM_BODY)
}

pub fn contour() -> String {
    with_prelude(CONTOUR_BODY)
}

pub fn edge_model() -> String {
    with_prelude(EDGE_MODEL_BODY)
}

pub fn harris_corners() -> String {
    with_prelude(HARRIS_BODY)
}

/// Full-screen triangle used to blit the offscreen target into the swapchain.
pub(crate) const BLIT_VERTEX: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

pub(crate) const BLIT_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 out_color;

layout(set = 0, binding = 0) uniform texture2D frame_image;
layout(set = 0, binding = 1) uniform sampler frame_sampler;

void main() {
    out_color = texture(sampler2D(frame_image, frame_sampler), v_uv);
}
";

/// Alpha-composites an `OverlayCanvas` over the target.
pub(crate) const CANVAS_FRAGMENT: &str = r"#version 450
layout(location = 0) in vec2 v_texcoord;
layout(location = 0) out vec4 out_color;

layout(set = 0, binding = 0) uniform texture2D canvas_image;
layout(set = 0, binding = 1) uniform sampler canvas_sampler;

void main() {
    ivec2 size = textureSize(sampler2D(canvas_image, canvas_sampler), 0);
    ivec2 texel = clamp(ivec2(v_texcoord), ivec2(0), size - ivec2(1));
    out_color = texelFetch(sampler2D(canvas_image, canvas_sampler), texel, 0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fragment_declares_the_shared_layout() {
        for source in [
            plain_image(),
            canvas_overlay(),
            depth_pass(),
            distance_transform(),
            contour(),
            edge_model(),
            harris_corners(),
        ] {
            assert!(source.starts_with("#version 450"));
            assert!(source.contains("uniform texture2D source_image"));
            assert!(source.contains("uniform texture2D overlay_image"));
            assert!(source.contains("void main()"));
        }
    }

    #[test]
    fn only_the_canvas_program_reads_the_overlay() {
        assert!(canvas_overlay().contains("fetch_overlay()"));
        assert!(canvas_overlay().contains("params.blend_factor"));
        assert!(!plain_image().contains("fetch_overlay();"));
    }
}
