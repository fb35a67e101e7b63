// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Derives and applies rotation constraints for a single step of a
//! traversal rooted at some `axis` node.
//!
//! A constraint "neighborhood" is `(axis, predecessor bone or none, current
//! bone)`. Depending on where the current bone's own constraint (or its
//! predecessor's) is anchored, that neighborhood yields zero, one or two
//! applicable [`AngleRange`]s, which are intersected down to the range the
//! current rotation must be clamped into.

use std::f64::consts::PI;

use crate::geometry::{self, AngleRange, Point};
use crate::handle::{BoneHandle, NodeHandle};
use crate::world::World;

struct Neighborhood {
    axis: NodeHandle,
    prev: Option<BoneHandle>,
    curr: BoneHandle,
}

/// The node shared between the current bone and its predecessor -- or, if
/// there is no predecessor, `axis` itself.
fn current_node(world: &World, fi: &Neighborhood) -> NodeHandle {
    match fi.prev {
        None => fi.axis,
        Some(prev) => world.bones[fi.curr]
            .shared_node(&world.bones[prev])
            .expect("traversal produced a non-adjacent predecessor bone"),
    }
}

/// The predecessor bone's other endpoint, i.e. the node that precedes the
/// current node. `None` when there is no predecessor.
fn pred_node(world: &World, fi: &Neighborhood) -> Option<NodeHandle> {
    let prev = fi.prev?;
    let curr = current_node(world, fi);
    Some(world.bones[prev].opposite_node(curr))
}

fn get_forw_rel_rot_constraint(world: &World, fi: &Neighborhood) -> Option<AngleRange> {
    let prev = fi.prev?;
    let curr = &world.bones[fi.curr];
    let curr_constraint = curr.rotation_constraint()?;

    if let Some(curr_parent) = curr.parent_bone(world) {
        if curr_parent != prev {
            return None;
        }
    }

    let curr_pos = world.nodes[current_node(world, fi)].world_pos();
    let pred_pos = world.nodes[pred_node(world, fi).unwrap()].world_pos();
    let anchor_angle = geometry::angle_from_u_to_v(pred_pos, curr_pos);

    Some(AngleRange::new(
        geometry::normalize_angle(curr_constraint.start + anchor_angle),
        curr_constraint.span,
    ))
}

fn get_back_rel_rot_constraint(world: &World, fi: &Neighborhood) -> Option<AngleRange> {
    let prev = fi.prev?;
    let pred_bone = &world.bones[prev];
    let pred_constraint = pred_bone.rotation_constraint()?;
    if !pred_constraint.relative_to_parent {
        return None;
    }
    if pred_bone.parent_bone(world) != Some(fi.curr) {
        return None;
    }

    let curr_pos = world.nodes[current_node(world, fi)].world_pos();
    let pred_pos = world.nodes[pred_node(world, fi).unwrap()].world_pos();
    let anchor_angle = geometry::angle_from_u_to_v(pred_pos, curr_pos);
    let start_angle = -(pred_constraint.start + pred_constraint.span);

    Some(AngleRange::new(
        geometry::normalize_angle(start_angle + anchor_angle),
        pred_constraint.span,
    ))
}

fn get_relative_rot_constraint(world: &World, fi: &Neighborhood) -> Option<AngleRange> {
    get_forw_rel_rot_constraint(world, fi).or_else(|| get_back_rel_rot_constraint(world, fi))
}

fn absolute_constraint(is_forward: bool, start_angle: f64, span_angle: f64) -> AngleRange {
    AngleRange::new(
        if is_forward {
            start_angle
        } else {
            geometry::normalize_angle(start_angle + PI)
        },
        span_angle,
    )
}

fn get_absolute_rot_constraint(world: &World, fi: &Neighborhood) -> Option<AngleRange> {
    let curr = &world.bones[fi.curr];
    let constraint = curr.rotation_constraint()?;
    if constraint.relative_to_parent {
        return None;
    }

    let pivot_node = current_node(world, fi);
    Some(absolute_constraint(
        pivot_node == curr.parent_node(),
        constraint.start,
        constraint.span,
    ))
}

fn get_applicable_rot_constraints(world: &World, fi: &Neighborhood) -> Vec<AngleRange> {
    let mut constraints = Vec::new();
    if let Some(a) = get_absolute_rot_constraint(world, fi) {
        constraints.push(a);
    }
    if let Some(r) = get_relative_rot_constraint(world, fi) {
        constraints.push(r);
    }
    constraints
}

/// Intersects up to two angle ranges, falling back to the first range when
/// they don't overlap at all -- the documented degenerate policy for
/// simultaneously-unsatisfiable constraints.
fn intersect_all(ranges: &[AngleRange]) -> Vec<AngleRange> {
    match ranges {
        [] => Vec::new(),
        [single] => vec![*single],
        [a, b] => {
            let intersection = geometry::intersect_angle_ranges(a, b);
            if intersection.is_empty() {
                log::warn!("rotation constraints do not overlap; defaulting to the first constraint");
                vec![*a]
            } else {
                intersection
            }
        }
        _ => unreachable!("at most an absolute and a relative constraint can apply at once"),
    }
}

fn constrain_angle_to_ranges(theta: f64, ranges: &[AngleRange]) -> f64 {
    if ranges.iter().any(|r| geometry::angle_in_range(theta, r)) {
        return theta;
    }

    let mut closest = 0.0;
    let mut closest_dist = f64::MAX;
    for range in ranges {
        for angle in [range.start, geometry::normalize_angle(range.start + range.span)] {
            let dist = geometry::angular_distance(theta, angle).abs();
            if dist < closest_dist {
                closest_dist = dist;
                closest = angle;
            }
        }
    }
    closest
}

fn constrain_angle_to_range(theta: f64, range: AngleRange) -> f64 {
    constrain_angle_to_ranges(theta, &[range])
}

fn apply_rotation_constraints_theta(world: &World, fi: &Neighborhood, theta: f64) -> Option<f64> {
    let constraints = get_applicable_rot_constraints(world, fi);
    if constraints.is_empty() {
        return None;
    }
    let intersection = intersect_all(&constraints);
    Some(constrain_angle_to_ranges(theta, &intersection))
}

fn apply_rotation_constraints_point(world: &World, fi: &Neighborhood, free_pt: Point) -> Point {
    let pivot_pt = world.nodes[current_node(world, fi)].world_pos();
    let old_theta = geometry::angle_from_u_to_v(pivot_pt, free_pt);
    let Some(new_theta) = apply_rotation_constraints_theta(world, fi, old_theta) else {
        return free_pt;
    };
    geometry::transform(
        Point::new(geometry::distance(pivot_pt, free_pt), 0.0),
        &(geometry::translation_matrix_pt(pivot_pt) * geometry::rotation_matrix(new_theta)),
    )
}

fn constrain_angular_velocity(
    world: &World,
    fi: &Neighborhood,
    original_rot: f64,
    max_angle_delta: f64,
    free_pt: Point,
) -> Point {
    let curr = &world.bones[fi.curr];
    let pivot_node = current_node(world, fi);
    let pivot_pos = world.nodes[pivot_node].world_pos();
    let old_theta = geometry::angle_from_u_to_v(pivot_pos, free_pt);
    let is_forward = pivot_node == curr.parent_node();

    let start_angle = geometry::normalize_angle(original_rot - max_angle_delta);
    let new_theta = constrain_angle_to_range(
        old_theta,
        absolute_constraint(is_forward, start_angle, 2.0 * max_angle_delta),
    );

    geometry::transform(
        Point::new(geometry::distance(pivot_pos, free_pt), 0.0),
        &(geometry::translation_matrix_pt(pivot_pos) * geometry::rotation_matrix(new_theta)),
    )
}

/// Applies both the rotation-range constraint and (if requested) the
/// angular-velocity cap to a candidate follower position.
pub(crate) fn apply_all_constraints(
    world: &World,
    axis: NodeHandle,
    prev: Option<BoneHandle>,
    curr: BoneHandle,
    curr_pos: Point,
    apply_rot_constraints: bool,
    max_ang_delta: f64,
    old_bone_rotation: f64,
) -> Point {
    let fi = Neighborhood { axis, prev, curr };
    let mut new_pos = curr_pos;
    if apply_rot_constraints {
        new_pos = apply_rotation_constraints_point(world, &fi, new_pos);
    }
    if max_ang_delta > 0.0 {
        new_pos = constrain_angular_velocity(world, &fi, old_bone_rotation, max_ang_delta, new_pos);
    }
    new_pos
}

/// Public entry point used by the FK operations in [`crate::bone`]: clamps
/// `free_pt` against whatever rotation constraints apply at `(axis, prev,
/// curr)`, ignoring angular-velocity capping.
pub fn apply_rotation_constraints_to_point(
    world: &World,
    axis: NodeHandle,
    prev: Option<BoneHandle>,
    curr: BoneHandle,
    free_pt: Point,
) -> Point {
    apply_rotation_constraints_point(world, &Neighborhood { axis, prev, curr }, free_pt)
}

/// Clamps `theta` (a candidate world rotation for `bone`) against `bone`'s
/// own rotation constraint, as seen from its parent node. Used by
/// [`crate::World::bone_set_world_rotation`].
pub fn constrain_rotation(world: &World, bone: BoneHandle, theta: f64) -> f64 {
    let b = &world.bones[bone];
    let fi = Neighborhood {
        axis: b.parent_node(),
        prev: b.parent_bone(world),
        curr: bone,
    };
    apply_rotation_constraints_theta(world, &fi, theta).unwrap_or(theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use crate::world::World;
    use approx::assert_relative_eq;

    #[test]
    fn absolute_constraint_flips_by_pi_when_pivot_is_not_parent() {
        let forward = absolute_constraint(true, 0.2, 0.5);
        let backward = absolute_constraint(false, 0.2, 0.5);
        assert_relative_eq!(forward.start, 0.2);
        assert_relative_eq!(backward.start, geometry::normalize_angle(0.2 + PI));
    }

    #[test]
    fn constrain_angle_to_ranges_picks_nearest_boundary_when_outside() {
        let ranges = [AngleRange::new(1.0, 0.5)];
        let theta = constrain_angle_to_ranges(2.0, &ranges);
        assert_relative_eq!(theta, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn absolute_rotation_constraint_on_root_bone_clamps_world_rotation() {
        let mut world = World::new();
        let skel = world.create_skeleton(Point::zero());
        let root = world.skeleton(skel).unwrap().root();
        let a = world.create_node(skel, "a", Point::new(1.0, 0.0)).unwrap();
        let bone = world.create_bone_in_skeleton("root-a", root, a).unwrap();
        world.set_bone_rotation_constraint(bone, 0.0, 0.2, false).unwrap();

        let clamped = constrain_rotation(&world, bone, 1.0);
        assert!(geometry::angle_in_range(clamped, &AngleRange::new(0.0, 0.2)));
    }
}
