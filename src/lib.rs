//! Tierstore
//!
//! Tiered storage lifecycle engine for camera-generated media. Video
//! segments, finished recordings, and snapshot images are kept in ordered
//! chains of storage locations; as files age or a tier fills, background
//! movers relocate them to the next tier and finally delete them, while a
//! schema-versioned metadata store tracks bookkeeping across upgrades.
//!
//! ## Architecture
//!
//! ```text
//! Configuration              Metadata store (SQLite)
//! ┌──────────────┐           ┌──────────────────────┐
//! │ tier chains  │           │ schema_version       │
//! │ per category │           │ files (bookkeeping)  │
//! └──────────────┘           └──────────────────────┘
//!        │ validate                    ▲ bootstrap/migrate
//!        ▼                             │
//! ┌──────────────┐  camera events  ┌──────────────┐
//! │ Storage      │────────────────▶│ Tier         │
//! │ Context      │                 │ Registry     │
//! └──────────────┘                 └──────────────┘
//!                                         │ one task per
//!                                         ▼ tier boundary
//!                      ┌─────────┐  ┌─────────┐  ┌─────────┐
//!                      │ mover   │  │ mover   │  │ mover   │
//!                      │ tier1→2 │  │ tier2→3 │  │ tier3→∅ │
//!                      └─────────┘  └─────────┘  └─────────┘
//! ```

pub mod config;
pub mod metadata_store;
pub mod mover;
pub mod registry;
pub mod tiers;

pub use config::Config;
pub use metadata_store::{FileAction, FileRecord, MetadataStore};
pub use mover::{eligible_units, FileUnit, MoverError, RetentionPolicy, TierMover};
pub use registry::{mover_specs, CameraEvent, MoverSpec, TierRegistry};
pub use tiers::{Category, StorageContext, Subcategory, Tier, TierChain, TierError};
