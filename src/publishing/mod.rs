// src/publishing/mod.rs

//! Publication lifecycle
//!
//! - [`set`]: batch queries and the conflict-aware bulk binary insert
//! - [`overrides`]: component/section/priority resolution for new publications
//! - [`domination`]: supersession, with arch-indep and DDEB propagation
//! - [`deletion`]: removal, override changes and the publish step

pub mod deletion;
pub mod domination;
pub mod overrides;
pub mod set;

pub use deletion::{
    OverrideChange, change_override, request_deletion, request_obsolescence, set_published,
};
pub use domination::{DominationReport, Dominator, supersede, supersede_binary, supersede_source};
pub use overrides::{OverrideResolver, OverrideTarget, Overrides, ResolvedOverrides, check_component};
pub use set::{BinaryTarget, BuildSetStatus, BuildSummary, PublishingSet};
