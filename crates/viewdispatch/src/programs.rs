//! Named GPU programs and their uniform-location tables.
//!
//! `RenderProgramSet` links every program once per surface lifetime and
//! resolves the uniform names each one is driven through. It holds no
//! per-frame state; the dispatcher looks programs up by [`ProgramKind`].

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::device::RenderDevice;
use crate::error::ProgramError;
use crate::shaders;
use crate::types::UniformLocation;

/// Sampler uniform bound to the source image.
pub const SOURCE_IMAGE: &str = "source_image";
/// Sampler uniform bound to the image blended over the source.
pub const OVERLAY_IMAGE: &str = "overlay_image";
/// Float uniform weighting the overlay in the canvas program.
pub const BLEND_FACTOR: &str = "blend_factor";

/// The logical purpose of a program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProgramKind {
    PlainImage,
    CanvasOverlay,
    DepthPass,
    DistanceTransform,
    Contour,
    EdgeModel,
    HarrisCorners,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 7] = [
        ProgramKind::PlainImage,
        ProgramKind::CanvasOverlay,
        ProgramKind::DepthPass,
        ProgramKind::DistanceTransform,
        ProgramKind::Contour,
        ProgramKind::EdgeModel,
        ProgramKind::HarrisCorners,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::PlainImage => "plain-image",
            ProgramKind::CanvasOverlay => "canvas-overlay",
            ProgramKind::DepthPass => "depth-pass",
            ProgramKind::DistanceTransform => "distance-transform",
            ProgramKind::Contour => "contour",
            ProgramKind::EdgeModel => "edge-model",
            ProgramKind::HarrisCorners => "harris-corners",
        }
    }

    /// Uniforms the dispatcher drives on this program.
    pub fn uniform_names(self) -> &'static [&'static str] {
        match self {
            ProgramKind::CanvasOverlay => &[SOURCE_IMAGE, OVERLAY_IMAGE, BLEND_FACTOR],
            _ => &[SOURCE_IMAGE],
        }
    }

    pub fn source(self) -> ProgramSource {
        let fragment = match self {
            ProgramKind::PlainImage => shaders::plain_image(),
            ProgramKind::CanvasOverlay => shaders::canvas_overlay(),
            ProgramKind::DepthPass => shaders::depth_pass(),
            ProgramKind::DistanceTransform => shaders::distance_transform(),
            ProgramKind::Contour => shaders::contour(),
            ProgramKind::EdgeModel => shaders::edge_model(),
            ProgramKind::HarrisCorners => shaders::harris_corners(),
        };
        let uniforms = match self {
            ProgramKind::CanvasOverlay => CANVAS_UNIFORMS,
            _ => SOURCE_ONLY_UNIFORMS,
        };
        ProgramSource {
            kind: self,
            vertex: shaders::QUAD_VERTEX,
            fragment,
            uniforms,
        }
    }
}

impl fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a uniform reaches the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    /// Texture/sampler pair at the given slot of the image bind group.
    Sampler { slot: u32 },
    /// `float` at the given index of the `ViewParams` block.
    Float { index: u32 },
}

/// A uniform the linked program exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

impl UniformDecl {
    pub const fn sampler(name: &'static str, slot: u32) -> Self {
        Self {
            name,
            kind: UniformKind::Sampler { slot },
        }
    }

    pub const fn float(name: &'static str, index: u32) -> Self {
        Self {
            name,
            kind: UniformKind::Float { index },
        }
    }
}

const CANVAS_UNIFORMS: &[UniformDecl] = &[
    UniformDecl::sampler(SOURCE_IMAGE, 0),
    UniformDecl::sampler(OVERLAY_IMAGE, 1),
    UniformDecl::float(BLEND_FACTOR, 0),
];

const SOURCE_ONLY_UNIFORMS: &[UniformDecl] = &[UniformDecl::sampler(SOURCE_IMAGE, 0)];

/// Everything a device needs to build one program.
#[derive(Clone, Debug)]
pub struct ProgramSource {
    pub kind: ProgramKind,
    pub vertex: &'static str,
    pub fragment: String,
    pub uniforms: &'static [UniformDecl],
}

/// A linked program plus the locations of the uniforms it is driven through.
pub struct RenderProgram<P> {
    kind: ProgramKind,
    handle: P,
    uniforms: BTreeMap<&'static str, UniformLocation>,
}

impl<P> RenderProgram<P> {
    pub fn kind(&self) -> ProgramKind {
        self.kind
    }

    pub fn handle(&self) -> &P {
        &self.handle
    }

    /// Location of `name`, resolved at link time.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not one of [`ProgramKind::uniform_names`] for this
    /// program; asking for an undeclared uniform is a caller bug.
    pub fn uniform(&self, name: &str) -> UniformLocation {
        match self.uniforms.get(name) {
            Some(location) => *location,
            None => panic!(
                "uniform '{name}' is not declared on the {} program",
                self.kind
            ),
        }
    }
}

/// One linked program per [`ProgramKind`].
pub struct RenderProgramSet<D: RenderDevice> {
    programs: Vec<RenderProgram<D::Program>>,
}

impl<D: RenderDevice> RenderProgramSet<D> {
    /// Links every program and resolves its uniforms.
    ///
    /// Either every program links or none is kept: programs linked before a
    /// failure are released before the error is returned.
    pub fn initialize(device: &mut D) -> Result<Self, ProgramError> {
        let mut programs = Vec::with_capacity(ProgramKind::ALL.len());
        for kind in ProgramKind::ALL {
            let source = kind.source();
            let handle = match device.link_program(&source) {
                Ok(handle) => handle,
                Err(err) => {
                    for program in programs.drain(..) {
                        let RenderProgram { handle, .. } = program;
                        device.release_program(handle);
                    }
                    return Err(err);
                }
            };
            let uniforms = kind
                .uniform_names()
                .iter()
                .map(|name| (*name, device.uniform_location(&handle, name)))
                .collect::<BTreeMap<_, _>>();
            debug!(program = %kind, ?uniforms, "linked program");
            programs.push(RenderProgram {
                kind,
                handle,
                uniforms,
            });
        }
        Ok(Self { programs })
    }

    pub fn get(&self, kind: ProgramKind) -> &RenderProgram<D::Program> {
        // Programs are pushed in `ProgramKind::ALL` order.
        &self.programs[kind as usize]
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Hands every program back to the device.
    pub fn release(self, device: &mut D) {
        for program in self.programs {
            device.release_program(program.handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Op, RecordingDevice};

    #[test]
    fn initialize_links_every_program_and_resolves_uniforms() {
        let mut device = RecordingDevice::new();
        let set = RenderProgramSet::initialize(&mut device).expect("programs link");
        assert_eq!(set.len(), ProgramKind::ALL.len());
        for kind in ProgramKind::ALL {
            let program = set.get(kind);
            assert_eq!(program.kind(), kind);
            for name in kind.uniform_names() {
                assert!(program.uniform(name).is_resolved(), "{kind}:{name}");
            }
        }
        let canvas = set.get(ProgramKind::CanvasOverlay);
        assert_ne!(canvas.uniform(SOURCE_IMAGE), canvas.uniform(OVERLAY_IMAGE));
    }

    #[test]
    fn sources_declare_exactly_the_named_uniforms() {
        for kind in ProgramKind::ALL {
            let source = kind.source();
            let declared: Vec<&str> = source.uniforms.iter().map(|decl| decl.name).collect();
            assert_eq!(declared, kind.uniform_names(), "{kind}");
        }
        let canvas = ProgramKind::CanvasOverlay.source();
        assert_eq!(
            canvas.uniforms[2].kind,
            UniformKind::Float { index: 0 }
        );
    }

    #[test]
    fn failed_link_releases_earlier_programs() {
        let mut device = RecordingDevice::new();
        device.fail_link(ProgramKind::Contour);
        let err = RenderProgramSet::initialize(&mut device)
            .err()
            .expect("contour link fails");
        assert!(matches!(
            err,
            ProgramError::Link {
                program: ProgramKind::Contour,
                ..
            }
        ));
        let linked = device
            .ops()
            .iter()
            .filter(|op| matches!(op, Op::LinkProgram(_)))
            .count();
        let released = device
            .ops()
            .iter()
            .filter(|op| matches!(op, Op::ReleaseProgram(_)))
            .count();
        assert_eq!(linked, released);
        assert_eq!(linked, ProgramKind::Contour as usize);
    }

    #[test]
    #[should_panic(expected = "not declared")]
    fn undeclared_uniform_is_a_caller_error() {
        let mut device = RecordingDevice::new();
        let set = RenderProgramSet::initialize(&mut device).unwrap();
        let _ = set.get(ProgramKind::PlainImage).uniform(BLEND_FACTOR);
    }

    #[test]
    fn unresolved_names_keep_the_sentinel() {
        let mut device = RecordingDevice::new();
        device.hide_uniform(ProgramKind::DepthPass, SOURCE_IMAGE);
        let set = RenderProgramSet::initialize(&mut device).unwrap();
        assert_eq!(
            set.get(ProgramKind::DepthPass).uniform(SOURCE_IMAGE),
            UniformLocation::UNRESOLVED
        );
    }

    #[test]
    fn release_returns_every_program() {
        let mut device = RecordingDevice::new();
        let set = RenderProgramSet::initialize(&mut device).unwrap();
        device.take_ops();
        set.release(&mut device);
        assert_eq!(device.ops().len(), ProgramKind::ALL.len());
    }
}
