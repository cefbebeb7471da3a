//! # MaskView Core
//!
//! Layout library model, hierarchy resolver, spatial index, and scene graph
//! for the MaskView layout viewer.
//!
//! The library/structure/element model mirrors the GDSII hierarchy and is
//! produced by an external decoder; this crate resolves nested placements
//! into world-space geometry, indexes it for viewport queries, and exposes
//! the scene graph the renderer draws from.

pub mod element;
pub mod error;
pub mod geometry;
pub mod library;
pub mod resolver;
pub mod scene;
pub mod spatial;
pub mod transform;

pub use element::{Element, LayerKey};
pub use error::SceneError;
pub use geometry::{BBox, Point};
pub use library::{Library, Structure};
pub use resolver::{resolve_structure, ResolveReport, Resolver};
pub use scene::{SceneGraph, SpatialElement};
pub use spatial::{QuadTree, QuadTreeConfig, QuadTreeStats, SpatialItem};
pub use transform::{Strans, Transform};
