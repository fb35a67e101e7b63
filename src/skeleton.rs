// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A tree of bones rooted at a single node, with name-keyed lookup tables.
//! `Skeleton` itself holds no references into `World` -- it is a plain
//! name->handle record owned by `World::skeletons`; all of its read-only
//! query methods are exposed through [`SkeletonRef`].

use std::collections::HashMap;

use crate::geometry::Point;
use crate::handle::{BoneHandle, NodeHandle, SkelHandle};
use crate::world::World;

/// The ordered world positions of every node in a skeleton, as produced by
/// [`World::skeleton_pose`] and consumed by [`World::set_skeleton_pose`].
/// This is the one per-frame hook an external animation timeline needs;
/// the timeline itself (storage, blending, playback) stays outside the core.
pub type Pose = Vec<Point>;

#[derive(Debug, Clone)]
pub struct Skeleton {
    pub(crate) name: String,
    pub(crate) root: Option<NodeHandle>,
    pub(crate) nodes: HashMap<String, NodeHandle>,
    pub(crate) bones: HashMap<String, BoneHandle>,
}

impl Skeleton {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            nodes: HashMap::new(),
            bones: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A skeleton is empty until its root node has been assigned.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Panics if called on an empty skeleton; use [`Skeleton::is_empty`]
    /// first if that's a live possibility.
    pub(crate) fn root(&self) -> NodeHandle {
        self.root.expect("skeleton has no root assigned yet")
    }
}

/// A borrowing, read-only view of one skeleton's pieces. Obtained from
/// [`World::skeleton`]; mutation always goes through `World` directly.
#[derive(Copy, Clone)]
pub struct SkeletonRef<'w> {
    world: &'w World,
    handle: SkelHandle,
}

impl<'w> SkeletonRef<'w> {
    pub(crate) fn new(world: &'w World, handle: SkelHandle) -> Self {
        Self { world, handle }
    }

    fn skel(&self) -> &Skeleton {
        &self.world.skeletons[self.handle]
    }

    pub fn handle(&self) -> SkelHandle {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.skel().name
    }

    pub fn is_empty(&self) -> bool {
        self.skel().is_empty()
    }

    pub fn root(&self) -> NodeHandle {
        self.skel().root()
    }

    pub fn nodes(&self) -> Vec<NodeHandle> {
        self.skel().nodes.values().copied().collect()
    }

    pub fn bones(&self) -> Vec<BoneHandle> {
        self.skel().bones.values().copied().collect()
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.skel().nodes.get(name).copied()
    }

    pub fn bone_by_name(&self, name: &str) -> Option<BoneHandle> {
        self.skel().bones.get(name).copied()
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.skel().nodes.contains_key(name)
    }

    pub fn contains_bone(&self, name: &str) -> bool {
        self.skel().bones.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_skeleton_from_create_skeleton_is_nonempty_with_named_root() {
        let mut world = World::new();
        let skel = world.create_skeleton(Point::zero());
        let view = world.skeleton(skel).unwrap();
        assert!(!view.is_empty());
        assert_eq!(view.node_by_name("root"), Some(view.root()));
    }

    #[test]
    fn skeleton_created_by_name_starts_empty() {
        let mut world = World::new();
        let skel = world.create_skeleton_named("rig").unwrap();
        assert!(world.skeleton(skel).unwrap().is_empty());
    }
}
