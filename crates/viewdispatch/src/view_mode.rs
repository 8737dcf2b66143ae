//! The closed set of visualizations the viewer can show.
//!
//! Ordinals are stable: they index toolbar entries and are persisted as a
//! single byte in session state, so new modes may only be appended.

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModeError {
    #[error("view mode ordinal {0} is out of range (expected 0..{count})", count = ViewMode::COUNT)]
    OutOfRange(u8),
    #[error("unknown view mode '{0}'")]
    UnknownName(String),
}

/// One of the twelve visualization states.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ViewMode {
    /// Raw camera frame.
    #[default]
    Input = 0,
    /// Engine-rendered shaded model.
    SolidModel = 1,
    DepthPass = 2,
    InitialModel = 3,
    FittedModel = 4,
    ReferenceColors = 5,
    AugmentedImage = 6,
    CannyEdges = 7,
    DistanceTransform = 8,
    Contours = 9,
    DetectedPose = 10,
    /// Reserved; accepted but renders nothing yet.
    HarrisCorners = 11,
}

impl ViewMode {
    pub const COUNT: usize = 12;

    /// Every mode in ordinal order.
    pub const ALL: [ViewMode; ViewMode::COUNT] = [
        ViewMode::Input,
        ViewMode::SolidModel,
        ViewMode::DepthPass,
        ViewMode::InitialModel,
        ViewMode::FittedModel,
        ViewMode::ReferenceColors,
        ViewMode::AugmentedImage,
        ViewMode::CannyEdges,
        ViewMode::DistanceTransform,
        ViewMode::Contours,
        ViewMode::DetectedPose,
        ViewMode::HarrisCorners,
    ];

    /// Returns the mode at `index`.
    ///
    /// # Panics
    ///
    /// Panics when `index >= ViewMode::COUNT`; callers hand in toolbar
    /// positions, so an out-of-range index is a programming error.
    pub fn option_at(index: usize) -> ViewMode {
        assert!(
            index < Self::COUNT,
            "view mode index {index} out of range (expected 0..{})",
            Self::COUNT
        );
        Self::ALL[index]
    }

    pub fn from_ordinal(ordinal: u8) -> Result<ViewMode, ModeError> {
        Self::ALL
            .get(ordinal as usize)
            .copied()
            .ok_or(ModeError::OutOfRange(ordinal))
    }

    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Human-readable label shown in the mode selector.
    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Input => "Input",
            ViewMode::SolidModel => "Solid model",
            ViewMode::DepthPass => "Depth pass",
            ViewMode::InitialModel => "Initial model",
            ViewMode::FittedModel => "Fitted model",
            ViewMode::ReferenceColors => "Reference colors",
            ViewMode::AugmentedImage => "Augmented image",
            ViewMode::CannyEdges => "Canny edges",
            ViewMode::DistanceTransform => "Distance transform",
            ViewMode::Contours => "Contours",
            ViewMode::DetectedPose => "Detected pose",
            ViewMode::HarrisCorners => "Harris corners",
        }
    }

    /// Stable machine name used on the command line and in config files.
    pub fn slug(self) -> &'static str {
        match self {
            ViewMode::Input => "input",
            ViewMode::SolidModel => "solid-model",
            ViewMode::DepthPass => "depth-pass",
            ViewMode::InitialModel => "initial-model",
            ViewMode::FittedModel => "fitted-model",
            ViewMode::ReferenceColors => "reference-colors",
            ViewMode::AugmentedImage => "augmented-image",
            ViewMode::CannyEdges => "canny-edges",
            ViewMode::DistanceTransform => "distance-transform",
            ViewMode::Contours => "contours",
            ViewMode::DetectedPose => "detected-pose",
            ViewMode::HarrisCorners => "harris-corners",
        }
    }

    pub fn next(self) -> ViewMode {
        Self::ALL[(self as usize + 1) % Self::COUNT]
    }

    pub fn previous(self) -> ViewMode {
        Self::ALL[(self as usize + Self::COUNT - 1) % Self::COUNT]
    }

    /// Writes the ordinal as a single byte.
    pub fn write_to<W: Write>(self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[self.ordinal()])
    }

    /// Reads one byte and maps it back to a mode.
    ///
    /// The byte carries no version or checksum. Bytes outside the
    /// enumeration are rejected with `InvalidData`; this is the only
    /// validation on the restore path, and session loading relies on it to
    /// fall back to the configured mode.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<ViewMode> {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        Self::from_ordinal(byte[0]).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<ViewMode> for u8 {
    fn from(mode: ViewMode) -> Self {
        mode.ordinal()
    }
}

impl TryFrom<u8> for ViewMode {
    type Error = ModeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ViewMode::from_ordinal(value)
    }
}

impl FromStr for ViewMode {
    type Err = ModeError;

    /// Accepts a slug (`fitted-model`), a label (`Fitted model`), or an ordinal.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Ok(ordinal) = trimmed.parse::<u8>() {
            return ViewMode::from_ordinal(ordinal);
        }
        let normalized = trimmed.to_ascii_lowercase().replace([' ', '_'], "-");
        ViewMode::ALL
            .iter()
            .copied()
            .find(|mode| mode.slug() == normalized)
            .ok_or_else(|| ModeError::UnknownName(trimmed.to_string()))
    }
}
