//! Tier chain model and validation.
//!
//! A tier is one storage location with size/age retention bounds. Tiers form
//! ordered chains per media category; files flow strictly forward along a
//! chain as they age or as the tier fills, and are deleted when they fall off
//! the last tier. Chains are built once from validated configuration and are
//! immutable for the process lifetime.

use crate::config::{CategoryConfig, Config, TierConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Temp directory used by the engine itself; never a valid tier path
pub const TEMP_DIR: &str = "/tmp/tierstore";

/// Paths that can never be used as tier roots
pub const RESERVED_PATHS: &[&str] = &["/tmp", TEMP_DIR];

/// Errors detected while validating tier chains. All of these are fatal at
/// configuration load; no partial chain is ever used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TierError {
    #[error("tier {path} is a reserved path and cannot be used")]
    ReservedPath { path: PathBuf },

    #[error("tier {path} is defined multiple times")]
    DuplicatePath { path: PathBuf },

    #[error("tier {path} max_age must be greater than previous tier max_age")]
    NonMonotonicAge { path: PathBuf },

    #[error("tier chain must contain at least one tier")]
    EmptyChain,
}

/// Media category, the top level of the tier configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Recordings,
    Snapshots,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Recordings => "recordings",
            Category::Snapshots => "snapshots",
        }
    }
}

/// Media subcategory. Each camera gets one tier chain per subcategory,
/// either from a subcategory-specific override or the category default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subcategory {
    Segments,
    Recordings,
    FaceRecognition,
    ObjectDetection,
}

impl Subcategory {
    /// All subcategories, used when expanding movers for a camera
    pub const ALL: [Subcategory; 4] = [
        Subcategory::Segments,
        Subcategory::Recordings,
        Subcategory::FaceRecognition,
        Subcategory::ObjectDetection,
    ];

    pub fn category(&self) -> Category {
        match self {
            Subcategory::Segments | Subcategory::Recordings => Category::Recordings,
            Subcategory::FaceRecognition | Subcategory::ObjectDetection => Category::Snapshots,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subcategory::Segments => "segments",
            Subcategory::Recordings => "recordings",
            Subcategory::FaceRecognition => "face_recognition",
            Subcategory::ObjectDetection => "object_detection",
        }
    }

    /// Directory for this subcategory's files under a tier root.
    /// Snapshot subcategories are grouped under a `snapshots/` prefix.
    pub fn dir(&self, tier_root: &Path, camera: &str) -> PathBuf {
        match self.category() {
            Category::Recordings => tier_root.join(self.as_str()).join(camera),
            Category::Snapshots => tier_root.join("snapshots").join(self.as_str()).join(camera),
        }
    }
}

/// One storage location in a chain, with thresholds resolved to
/// bytes/durations. `None` bounds are unbounded.
#[derive(Debug, Clone)]
pub struct Tier {
    pub path: PathBuf,
    pub poll: bool,
    pub move_on_shutdown: bool,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub min_age: Option<Duration>,
    pub max_age: Option<Duration>,
}

impl Tier {
    fn from_config(config: &TierConfig) -> Self {
        Self {
            path: config.path.clone(),
            poll: config.poll,
            move_on_shutdown: config.move_on_shutdown,
            min_size: config.min_size.bytes(),
            max_size: config.max_size.bytes(),
            min_age: config.min_age.duration(),
            max_age: config.max_age.duration(),
        }
    }
}

/// An ordered, validated sequence of tiers for one category/subcategory
#[derive(Debug, Clone)]
pub struct TierChain {
    tiers: Vec<Tier>,
}

impl TierChain {
    /// Build a chain from configuration, checking all chain invariants:
    /// at least one tier, no reserved paths, no duplicate paths, and
    /// strictly increasing bounded `max_age` with unlimited tiers only
    /// at the end.
    pub fn from_config(tiers: &[TierConfig]) -> Result<Self, TierError> {
        let tiers: Vec<Tier> = tiers.iter().map(Tier::from_config).collect();
        validate_chain(&tiers)?;
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// First tier, where new files are written by the capture subsystem
    pub fn first(&self) -> &Tier {
        &self.tiers[0]
    }
}

fn validate_chain(tiers: &[Tier]) -> Result<(), TierError> {
    if tiers.is_empty() {
        return Err(TierError::EmptyChain);
    }

    let mut seen_paths: Vec<&Path> = Vec::new();
    let mut previous_max_age: Option<Option<Duration>> = None;

    for tier in tiers {
        if RESERVED_PATHS.iter().any(|p| Path::new(p) == tier.path) {
            return Err(TierError::ReservedPath {
                path: tier.path.clone(),
            });
        }

        if seen_paths.contains(&tier.path.as_path()) {
            return Err(TierError::DuplicatePath {
                path: tier.path.clone(),
            });
        }
        seen_paths.push(&tier.path);

        if let Some(previous) = previous_max_age {
            match (previous, tier.max_age) {
                // An unlimited tier retains forever, so nothing can follow it
                (None, _) => {
                    return Err(TierError::NonMonotonicAge {
                        path: tier.path.clone(),
                    });
                }
                // Bounded ages must strictly increase along the chain
                (Some(prev), Some(current)) if current <= prev => {
                    return Err(TierError::NonMonotonicAge {
                        path: tier.path.clone(),
                    });
                }
                _ => {}
            }
        }
        previous_max_age = Some(tier.max_age);
    }

    Ok(())
}

/// Resolved tier chains for the whole engine, constructed once at startup
/// from validated configuration and passed by handle to the registry and
/// movers. Replaces any ambient global lookup of storage state.
#[derive(Debug, Clone)]
pub struct StorageContext {
    recordings: TierChain,
    snapshots: TierChain,
    face_recognition: Option<TierChain>,
    object_detection: Option<TierChain>,
}

impl StorageContext {
    /// Validate every configured chain (category defaults and subcategory
    /// overrides) and resolve them. Any validation failure aborts startup.
    pub fn from_config(config: &Config) -> Result<Self, TierError> {
        let override_chain = |c: &Option<CategoryConfig>| -> Result<Option<TierChain>, TierError> {
            c.as_ref().map(|c| TierChain::from_config(&c.tiers)).transpose()
        };

        Ok(Self {
            recordings: TierChain::from_config(&config.recordings.tiers)?,
            snapshots: TierChain::from_config(&config.snapshots.tiers)?,
            face_recognition: override_chain(&config.snapshots.face_recognition)?,
            object_detection: override_chain(&config.snapshots.object_detection)?,
        })
    }

    /// Effective chain for a subcategory: the subcategory override if one
    /// is configured, otherwise the category default.
    pub fn chain(&self, subcategory: Subcategory) -> &TierChain {
        match subcategory {
            Subcategory::Segments | Subcategory::Recordings => &self.recordings,
            Subcategory::FaceRecognition => {
                self.face_recognition.as_ref().unwrap_or(&self.snapshots)
            }
            Subcategory::ObjectDetection => {
                self.object_detection.as_ref().unwrap_or(&self.snapshots)
            }
        }
    }

    /// Where the capture subsystem should write finished recordings
    /// for a camera: the first recordings tier.
    pub fn recordings_path(&self, camera: &str) -> PathBuf {
        Subcategory::Recordings.dir(&self.recordings.first().path, camera)
    }

    /// Where the capture subsystem should write raw segments for a camera
    pub fn segments_path(&self, camera: &str) -> PathBuf {
        Subcategory::Segments.dir(&self.recordings.first().path, camera)
    }
}
