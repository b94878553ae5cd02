//! # XR Skeleton
//!
//! Skeletal pose engine for skinned character animation.
//!
//! ## Features
//!
//! - **Skeleton**: Bone hierarchy with per-bone names and options (rotation lock, physics, animation)
//! - **Pose**: Local and world bone matrices kept in sync lazily
//! - **Skinning**: Bind pose, inverse bind pose and skin matrices pushed to a render sink
//! - **Scene Binding**: Read and write poses through scene nodes matched by name
//! - **ECS Integration**: Skeletons are `bevy_ecs` components updated by systems
//!
//! ### Example
//!
//! ```ignore
//! use xr_skeleton::animation::{Skeleton, SceneTree};
//!
//! let skeleton = Skeleton::from_hierarchy(&scene, root, &["hips", "spine", "head"])?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Error types and shared macros
//! - [`config`]: Skeleton, debug geometry and logging configuration
//! - [`animation`]: Skeleton, pose, scene binding and skinning

/// Error types and shared macros
pub mod core;
/// Configuration loading and validation
pub mod config;
/// Skeletal animation
pub mod animation;

pub use animation::{Pose, PoseSpace, Skeleton};
pub use config::{init_logging, SkeletonConfig};
pub use core::{SkeletonError, SkeletonResult};
