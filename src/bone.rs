// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A rigid link between two nodes, plus the forward-kinematics operations
//! that move a bone (and everything downstream of it) while preserving
//! bone lengths and honoring rotation constraints.

use std::collections::HashMap;

use crate::constraint::apply_rotation_constraints_to_point;
use crate::error::{Error, Result};
use crate::geometry::{self, Point, RotConstraint};
use crate::handle::{BoneHandle, NodeHandle, NodeOrBone};
use crate::traverse::{self, VisitResult};
use crate::world::World;

#[derive(Debug, Clone)]
pub struct Bone {
    pub(crate) name: String,
    pub(crate) u: NodeHandle,
    pub(crate) v: NodeHandle,
    pub(crate) rest_length: f64,
    pub(crate) rot_constraint: Option<RotConstraint>,
}

impl Bone {
    pub(crate) fn new(name: impl Into<String>, u: NodeHandle, v: NodeHandle, rest_length: f64) -> Self {
        Self {
            name: name.into(),
            u,
            v,
            rest_length,
            rot_constraint: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the bone rotates about (its parent endpoint).
    pub fn parent_node(&self) -> NodeHandle {
        self.u
    }

    /// The node the bone moves (its child endpoint).
    pub fn child_node(&self) -> NodeHandle {
        self.v
    }

    pub fn opposite_node(&self, n: NodeHandle) -> NodeHandle {
        if n == self.u {
            self.v
        } else {
            self.u
        }
    }

    pub fn has_node(&self, n: NodeHandle) -> bool {
        self.u == n || self.v == n
    }

    pub fn rest_length(&self) -> f64 {
        self.rest_length
    }

    pub fn rotation_constraint(&self) -> Option<RotConstraint> {
        self.rot_constraint
    }

    pub fn parent_bone(&self, world: &World) -> Option<BoneHandle> {
        world.nodes[self.u].parent_bone()
    }

    pub fn child_bones(&self, world: &World) -> Vec<BoneHandle> {
        world.nodes[self.v].child_bones().to_vec()
    }

    pub fn shared_node(&self, other: &Bone) -> Option<NodeHandle> {
        if self.u == other.u || self.u == other.v {
            Some(self.u)
        } else if self.v == other.u || self.v == other.v {
            Some(self.v)
        } else {
            None
        }
    }

    pub fn line_segment(&self, world: &World) -> (Point, Point) {
        (world.nodes[self.u].world_pos(), world.nodes[self.v].world_pos())
    }

    pub fn scaled_length(&self, world: &World) -> f64 {
        let (u, v) = self.line_segment(world);
        geometry::distance(u, v)
    }

    pub fn world_rotation(&self, world: &World) -> f64 {
        let (u, v) = self.line_segment(world);
        (v.y - u.y).atan2(v.x - u.x)
    }

    /// Rotation relative to the parent bone, or the world rotation if this
    /// bone is its chain's root.
    pub fn rotation(&self, world: &World) -> f64 {
        match self.parent_bone(world) {
            Some(p) => self.world_rotation(world) - world.bones[p].world_rotation(world),
            None => self.world_rotation(world),
        }
    }

    pub fn absolute_scale(&self, world: &World) -> f64 {
        self.scaled_length(world) / self.rest_length
    }

    pub fn scale(&self, world: &World) -> f64 {
        match self.parent_bone(world) {
            Some(p) => self.absolute_scale(world) / world.bones[p].absolute_scale(world),
            None => self.absolute_scale(world),
        }
    }
}

impl World {
    /// Bones attached to `u` other than `bone` itself.
    pub fn bone_sibling_bones(&self, bone: BoneHandle) -> Vec<BoneHandle> {
        let b = &self.bones[bone];
        self.nodes[b.u]
            .child_bones()
            .iter()
            .copied()
            .filter(|&sib| sib != bone)
            .collect()
    }

    pub fn set_bone_rotation_constraint(
        &mut self,
        bone: BoneHandle,
        start: f64,
        span: f64,
        relative_to_parent: bool,
    ) -> Result<()> {
        let b = self.bones.get(bone).ok_or(Error::NotFound)?;
        if relative_to_parent && b.parent_bone(self).is_none() {
            return Err(Error::NoParent);
        }
        self.bones.get_mut(bone).unwrap().rot_constraint = Some(RotConstraint {
            relative_to_parent,
            start,
            span,
        });
        Ok(())
    }

    pub fn remove_bone_rotation_constraint(&mut self, bone: BoneHandle) -> Result<()> {
        self.bones.get_mut(bone).ok_or(Error::NotFound)?.rot_constraint = None;
        Ok(())
    }

    /// Rotates `bone` to `theta` in world space, preserving every
    /// downstream bone length and rotation relative to `bone`, and
    /// re-applying `bone`'s own rotation constraint.
    pub fn bone_set_world_rotation(&mut self, bone: BoneHandle, theta: f64) -> Result<()> {
        if !self.bones.contains_key(bone) {
            return Err(Error::NotFound);
        }

        struct Snapshot {
            length: f64,
            world_rotation: f64,
        }
        let mut table: HashMap<BoneHandle, Snapshot> = HashMap::new();
        traverse::dfs_nodes_and_bones(
            self,
            NodeOrBone::Bone(bone),
            |_| VisitResult::Continue,
            |b| {
                table.insert(
                    b,
                    Snapshot {
                        length: self.bones[b].scaled_length(self),
                        world_rotation: self.bones[b].world_rotation(self),
                    },
                );
                VisitResult::Continue
            },
            true,
        );
        table.get_mut(&bone).unwrap().world_rotation = theta;

        let mut order = Vec::new();
        traverse::dfs_nodes_and_bones(
            self,
            NodeOrBone::Bone(bone),
            |_| VisitResult::Continue,
            |b| {
                order.push(b);
                VisitResult::Continue
            },
            true,
        );

        for b in order {
            let theta = table[&b].world_rotation;
            let theta = crate::constraint::constrain_rotation(self, b, theta);
            let u_pos = self.nodes[self.bones[b].u].world_pos();
            let rotate_about_u = geometry::rotate_about_point_matrix(u_pos, theta);
            let v = u_pos + Point::new(table[&b].length, 0.0);
            let new_v = geometry::transform(v, &rotate_about_u);
            let v_handle = self.bones[b].v;
            self.nodes.get_mut(v_handle).unwrap().pos = new_v;
        }

        Ok(())
    }

    /// Rotates `bone` by `theta` about `axis` (defaulting to `bone`'s
    /// parent node), carrying every downstream bone along rigidly while
    /// honoring rotation constraints at each step.
    pub fn bone_rotate_by(&mut self, bone: BoneHandle, theta: f64, axis: Option<NodeHandle>) -> Result<()> {
        if !self.bones.contains_key(bone) {
            return Err(Error::NotFound);
        }
        let axis = axis.unwrap_or_else(|| self.bones[bone].u);

        struct Snapshot {
            length: f64,
            rel_rotation: f64,
            world_rotation: f64,
        }
        let mut table: HashMap<BoneHandle, Snapshot> = HashMap::new();
        traverse::traverse_bone_hierarchy(self, axis, |prev, curr| {
            let u = match prev {
                Some(p) => self.bones[curr].shared_node(&self.bones[p]).unwrap(),
                None => axis,
            };
            let v = self.bones[curr].opposite_node(u);
            let world_rot = geometry::angle_from_u_to_v(
                self.nodes[u].world_pos(),
                self.nodes[v].world_pos(),
            );
            let mut rel_rot = match prev {
                Some(p) => world_rot - table[&p].world_rotation,
                None => world_rot,
            };

            if curr == bone {
                rel_rot += theta;
            }
            if let Some(p) = prev {
                if p == bone && self.bones[curr].has_node(axis) {
                    rel_rot -= theta;
                }
            }

            table.insert(
                curr,
                Snapshot {
                    length: self.bones[curr].scaled_length(self),
                    rel_rotation: rel_rot,
                    world_rotation: world_rot,
                },
            );
            VisitResult::Continue
        });

        let mut new_world_rotation: HashMap<BoneHandle, f64> = HashMap::new();
        traverse::traverse_bone_hierarchy(self, axis, |prev, curr| {
            let u = match prev {
                Some(p) => self.bones[curr].shared_node(&self.bones[p]).unwrap(),
                None => axis,
            };
            let v = self.bones[curr].opposite_node(u);
            let parent_world_rotation = prev.map(|p| new_world_rotation[&p]).unwrap_or(0.0);
            let u_pos = self.nodes[u].world_pos();
            let new_v_pos = geometry::transform(
                u_pos + Point::new(table[&curr].length, 0.0),
                &geometry::rotate_about_point_matrix(
                    u_pos,
                    table[&curr].rel_rotation + parent_world_rotation,
                ),
            );
            let new_v_pos = apply_rotation_constraints_to_point(self, axis, prev, curr, new_v_pos);
            self.nodes.get_mut(v).unwrap().pos = new_v_pos;
            new_world_rotation.insert(
                curr,
                geometry::angle_from_u_to_v(u_pos, self.nodes[v].world_pos()),
            );
            VisitResult::Continue
        });

        Ok(())
    }

    /// Sets `bone`'s rest length, re-synthesizing every downstream node
    /// position so each downstream bone keeps its own length and world
    /// rotation unchanged.
    pub fn bone_set_length(&mut self, bone: BoneHandle, len: f64) -> Result<()> {
        if !self.bones.contains_key(bone) {
            return Err(Error::NotFound);
        }

        let mut snapshot: HashMap<BoneHandle, (f64, f64)> = HashMap::new();
        let mut order = Vec::new();
        traverse::dfs_nodes_and_bones(
            self,
            NodeOrBone::Bone(bone),
            |_| VisitResult::Continue,
            |b| {
                snapshot.insert(b, (self.bones[b].rest_length, self.bones[b].world_rotation(self)));
                order.push(b);
                VisitResult::Continue
            },
            true,
        );
        snapshot.insert(bone, (len, self.bones[bone].world_rotation(self)));

        for b in order {
            let (length, rot) = snapshot[&b];
            let offset = Point::new(length * rot.cos(), length * rot.sin());
            let u_pos = self.nodes[self.bones[b].u].world_pos();
            let new_v_pos = u_pos + offset;
            let v_handle = self.bones[b].v;
            self.nodes.get_mut(v_handle).unwrap().pos = new_v_pos;
            if b == bone {
                self.bones.get_mut(b).unwrap().rest_length = len;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;
    use approx::assert_relative_eq;

    fn two_bone_chain() -> (World, BoneHandle, BoneHandle) {
        let mut world = World::new();
        let skel = world.create_skeleton(Point::zero());
        let root = world.skeleton(skel).unwrap().root();
        let a = world.create_node(skel, "a", Point::new(1.0, 0.0)).unwrap();
        let b0 = world.create_bone_in_skeleton("root-a", root, a).unwrap();
        let b = world.create_node(skel, "b", Point::new(2.0, 0.0)).unwrap();
        let b1 = world.create_bone_in_skeleton("a-b", a, b).unwrap();
        (world, b0, b1)
    }

    #[test]
    fn set_length_preserves_downstream_rotation() {
        let (mut world, b0, b1) = two_bone_chain();
        let before_rot = world.bones[b1].world_rotation(&world);
        world.bone_set_length(b0, 2.0).unwrap();
        assert_relative_eq!(world.bones[b0].rest_length(), 2.0);
        assert_relative_eq!(world.bones[b1].world_rotation(&world), before_rot, epsilon = 1e-9);
        assert_relative_eq!(world.bones[b1].scaled_length(&world), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn set_world_rotation_moves_child_bone_rigidly() {
        let (mut world, b0, b1) = two_bone_chain();
        let rel_before = world.bones[b1].rotation(&world);
        world.bone_set_world_rotation(b0, std::f64::consts::FRAC_PI_2).unwrap();
        assert_relative_eq!(world.bones[b0].world_rotation(&world), std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
        assert_relative_eq!(world.bones[b1].rotation(&world), rel_before, epsilon = 1e-6);
    }

    #[test]
    fn rotate_by_dual_theta_keeps_far_branch_fixed_at_shared_axis() {
        let (mut world, b0, _b1) = two_bone_chain();
        let a = world.bones[b0].v;
        let far_before = world.nodes[world.bones[world.nodes[a].child_bones()[0]].v].world_pos();
        world.bone_rotate_by(b0, 0.3, Some(a)).unwrap();
        let far_after = world.nodes[world.bones[world.nodes[a].child_bones()[0]].v].world_pos();
        assert_relative_eq!(far_before.x, far_after.x, epsilon = 1e-9);
        assert_relative_eq!(far_before.y, far_after.y, epsilon = 1e-9);
    }
}
