// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Kinematic core of a 2-D articulated-figure editor: a skeletal graph
//! (nodes, bones, rotation constraints) owned by a [`World`] arena, a
//! FABRIK-based inverse-kinematics solver, the forward-kinematics mutators
//! on [`Bone`], and a JSON persistence format for the whole world.
//!
//! External collaborators -- the editor UI, undo/redo, rendering, the
//! animation timeline -- consume this crate through five surfaces: the
//! `World` CRUD API, the FK mutators on bones, [`World::solve`], the
//! traversal primitives in [`traverse`], and JSON import/export.

mod geometry;
pub use geometry::{
    angle_from_u_to_v, angle_in_range, angular_distance, distance, identity_matrix,
    intersect_angle_ranges, normalize_angle, point_on_line_at_distance, rotate_about_point_matrix,
    rotation_matrix, scale_matrix, transform, translation_matrix, uniform_scale_matrix, AngleRange,
    Matrix, Point, RotConstraint,
};

mod error;
pub use error::{Error, Result};

mod handle;
pub use handle::{BoneHandle, NodeHandle, NodeOrBone, PieceHandle, SkelHandle};

mod node;
pub use node::{Node, ParentLink};

mod bone;
pub use bone::Bone;

mod skeleton;
pub use skeleton::{Pose, Skeleton, SkeletonRef};

mod world;
pub use world::World;

mod traverse;
pub use traverse::{
    bones_downstream_of, bones_from_traversal, dfs_nodes_and_bones, nodes_from_traversal,
    traverse_bone_hierarchy, VisitResult,
};

mod constraint;
pub use constraint::apply_rotation_constraints_to_point;

mod fabrik;
pub use fabrik::{FabrikOptions, SolveReport, SolveResult};

mod persistence;
