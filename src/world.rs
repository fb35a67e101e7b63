// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! `World`: the sole owner of node/bone/skeleton storage. Everything else
//! (`Node`, `Bone`, `Skeleton`) addresses its neighbors by handle rather
//! than by reference, so the cyclic node<->bone adjacency never needs a
//! pointer graph -- see the arena design note in the crate's top-level docs.

use std::any::Any;
use std::collections::HashMap;

use bimap::BiMap;
use slotmap::SlotMap;

use crate::error::{Error, Result};
use crate::geometry::{self, Matrix, Point};
use crate::handle::{BoneHandle, NodeHandle, NodeOrBone, PieceHandle, SkelHandle};
use crate::node::{Node, ParentLink};
use crate::skeleton::{Pose, Skeleton, SkeletonRef};
use crate::traverse;

pub struct World {
    pub(crate) nodes: SlotMap<NodeHandle, Node>,
    pub(crate) bones: SlotMap<BoneHandle, crate::bone::Bone>,
    pub(crate) skeletons: SlotMap<SkelHandle, Skeleton>,
    skeleton_names: BiMap<String, SkelHandle>,
    user_data: HashMap<PieceHandle, Box<dyn Any>>,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            bones: SlotMap::with_key(),
            skeletons: SlotMap::with_key(),
            skeleton_names: BiMap::new(),
            user_data: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.skeletons.is_empty()
    }

    // Skeleton CRUD ----------------------------------------------------

    /// Creates a new, auto-named skeleton with a root node at `pos`.
    pub fn create_skeleton(&mut self, pos: Point) -> SkelHandle {
        let existing: Vec<String> = self.skeleton_names.left_values().cloned().collect();
        let name = unique_name("skeleton", &existing);
        let handle = self.skeletons.insert(Skeleton::new(name.clone()));
        self.skeleton_names.insert(name, handle);

        let root = self
            .create_node(handle, "root", pos)
            .expect("fresh skeleton cannot collide with its own empty node table");
        self.skeletons.get_mut(handle).unwrap().root = Some(root);
        handle
    }

    /// Creates a new, empty (rootless) skeleton under an explicit name.
    pub fn create_skeleton_named(&mut self, name: impl Into<String>) -> Result<SkelHandle> {
        let name = name.into();
        if name.is_empty() || self.skeleton_names.contains_left(&name) {
            return Err(Error::NonUniqueName);
        }
        let handle = self.skeletons.insert(Skeleton::new(name.clone()));
        self.skeleton_names.insert(name, handle);
        Ok(handle)
    }

    pub fn delete_skeleton(&mut self, name: &str) -> Result<()> {
        let handle = *self.skeleton_names.get_by_left(name).ok_or(Error::NotFound)?;
        let skel = self.skeletons.remove(handle).expect("bimap entry without a backing skeleton");
        self.skeleton_names.remove_by_left(name);
        for (_, node) in skel.nodes {
            self.nodes.remove(node);
            self.user_data.remove(&PieceHandle::Node(node));
        }
        for (_, bone) in skel.bones {
            self.bones.remove(bone);
            self.user_data.remove(&PieceHandle::Bone(bone));
        }
        Ok(())
    }

    pub fn skeleton(&self, handle: SkelHandle) -> Option<SkeletonRef<'_>> {
        self.skeletons.contains_key(handle).then(|| SkeletonRef::new(self, handle))
    }

    pub fn skeleton_by_name(&self, name: &str) -> Option<SkelHandle> {
        self.skeleton_names.get_by_left(name).copied()
    }

    pub fn skeleton_names(&self) -> Vec<String> {
        self.skeleton_names.left_values().cloned().collect()
    }

    pub fn set_skeleton_name(&mut self, skel: SkelHandle, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        if new_name.is_empty() {
            return Err(Error::NonUniqueName);
        }
        if !self.skeletons.contains_key(skel) {
            return Err(Error::NotFound);
        }
        if self.skeleton_names.contains_left(&new_name) {
            return Err(Error::NonUniqueName);
        }
        self.skeleton_names.remove_by_right(&skel);
        self.skeleton_names.insert(new_name.clone(), skel);
        self.skeletons.get_mut(skel).unwrap().name = new_name;
        Ok(())
    }

    // Node / bone CRUD ---------------------------------------------------

    /// Internal to bone/skeleton construction: creates a node owned
    /// directly by `skel` (i.e. not yet a bone's child endpoint).
    pub fn create_node(&mut self, skel: SkelHandle, name: impl Into<String>, pos: Point) -> Result<NodeHandle> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::NonUniqueName);
        }
        let s = self.skeletons.get(skel).ok_or(Error::NotFound)?;
        if s.nodes.contains_key(&name) {
            return Err(Error::NonUniqueName);
        }
        let handle = self.nodes.insert(Node::new(skel, name.clone(), pos));
        self.skeletons.get_mut(skel).unwrap().nodes.insert(name, handle);
        Ok(handle)
    }

    pub(crate) fn set_skeleton_root(&mut self, skel: SkelHandle, root: NodeHandle) {
        self.skeletons.get_mut(skel).unwrap().root = Some(root);
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    pub fn bone(&self, handle: BoneHandle) -> Option<&crate::bone::Bone> {
        self.bones.get(handle)
    }

    pub fn set_node_world_pos(&mut self, node: NodeHandle, pos: Point) -> Result<()> {
        self.nodes.get_mut(node).ok_or(Error::NotFound)?.pos = pos;
        Ok(())
    }

    pub fn set_node_name(&mut self, node: NodeHandle, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        if new_name.is_empty() {
            return Err(Error::NonUniqueName);
        }
        let skel = self.owning_skeleton(node).ok_or(Error::NotFound)?;
        if self.skeletons[skel].nodes.contains_key(&new_name) {
            return Err(Error::NonUniqueName);
        }
        let old_name = self.nodes[node].name.clone();
        self.nodes.get_mut(node).unwrap().name = new_name.clone();
        let s = self.skeletons.get_mut(skel).unwrap();
        s.nodes.remove(&old_name);
        s.nodes.insert(new_name, node);
        Ok(())
    }

    pub fn set_bone_name(&mut self, bone: BoneHandle, new_name: impl Into<String>) -> Result<()> {
        let new_name = new_name.into();
        if new_name.is_empty() {
            return Err(Error::NonUniqueName);
        }
        let u = self.bones.get(bone).ok_or(Error::NotFound)?.u;
        let skel = self.owning_skeleton(u).ok_or(Error::NotFound)?;
        if self.skeletons[skel].bones.contains_key(&new_name) {
            return Err(Error::NonUniqueName);
        }
        let old_name = self.bones[bone].name.clone();
        self.bones.get_mut(bone).unwrap().name = new_name.clone();
        let s = self.skeletons.get_mut(skel).unwrap();
        s.bones.remove(&old_name);
        s.bones.insert(new_name, bone);
        Ok(())
    }

    /// Uniform rename entry point over the three kinds of named piece, per
    /// the external `set_name(piece, new_name)` surface.
    pub fn set_name(&mut self, piece: PieceHandle, new_name: impl Into<String>) -> Result<()> {
        match piece {
            PieceHandle::Node(n) => self.set_node_name(n, new_name),
            PieceHandle::Bone(b) => self.set_bone_name(b, new_name),
            PieceHandle::Skeleton(s) => self.set_skeleton_name(s, new_name),
        }
    }

    /// The skeleton a node belongs to, found by walking its parent-bone
    /// chain up to the node whose parent-link is the skeleton itself.
    pub(crate) fn owning_skeleton(&self, node: NodeHandle) -> Option<SkelHandle> {
        let mut current = node;
        loop {
            match self.nodes.get(current)?.parent {
                ParentLink::Skeleton(s) => return Some(s),
                ParentLink::Bone(b) => current = self.bones.get(b)?.u,
            }
        }
    }

    // Bone construction --------------------------------------------------

    /// Creates a bone between two nodes already in the same skeleton.
    /// Used by persistence load and skeleton copy, where a bone spanning
    /// two skeletons is a malformed document, not a mergeable graph edit --
    /// see `Error::CrossSkeletonBone`.
    pub fn create_bone_in_skeleton(
        &mut self,
        name: impl Into<String>,
        u: NodeHandle,
        v: NodeHandle,
    ) -> Result<BoneHandle> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::NonUniqueName);
        }
        if !self.nodes.get(v).ok_or(Error::NotFound)?.is_root() {
            return Err(Error::MultiParentNode);
        }
        self.nodes.get(u).ok_or(Error::NotFound)?;

        let skel_u = self.owning_skeleton(u).ok_or(Error::NotFound)?;
        let skel_v = self.owning_skeleton(v).ok_or(Error::NotFound)?;
        if skel_u != skel_v {
            return Err(Error::CrossSkeletonBone);
        }
        if self.skeletons[skel_u].bones.contains_key(&name) {
            return Err(Error::NonUniqueName);
        }

        let rest_length = geometry::distance(self.nodes[u].world_pos(), self.nodes[v].world_pos());
        let handle = self.bones.insert(crate::bone::Bone::new(name.clone(), u, v, rest_length));
        self.nodes.get_mut(u).unwrap().children.push(handle);
        self.nodes.get_mut(v).unwrap().parent = ParentLink::Bone(handle);
        self.skeletons.get_mut(skel_u).unwrap().bones.insert(name, handle);
        Ok(handle)
    }

    /// Creates a bone, merging `v`'s skeleton into `u`'s skeleton when they
    /// differ: `v` must be a root node (a bone never gives a node a second
    /// parent), and the two skeletons become one, with every name
    /// collision resolved deterministically by `uniquify_skeleton`.
    pub fn create_bone(
        &mut self,
        name: impl Into<String>,
        u: NodeHandle,
        v: NodeHandle,
    ) -> Result<BoneHandle> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::NonUniqueName);
        }
        if !self.nodes.get(v).ok_or(Error::NotFound)?.is_root() {
            return Err(Error::MultiParentNode);
        }
        self.nodes.get(u).ok_or(Error::NotFound)?;

        let skel_u = self.owning_skeleton(u).ok_or(Error::NotFound)?;
        let skel_v = self.owning_skeleton(v).ok_or(Error::NotFound)?;
        if skel_u == skel_v {
            return Err(Error::CyclicBones);
        }

        let rest_length = geometry::distance(self.nodes[u].world_pos(), self.nodes[v].world_pos());
        let handle = self.bones.insert(crate::bone::Bone::new(name, u, v, rest_length));
        self.nodes.get_mut(u).unwrap().children.push(handle);
        self.nodes.get_mut(v).unwrap().parent = ParentLink::Bone(handle);

        self.merge_skeletons(skel_u, skel_v);
        // `uniquify_skeleton` rebuilds the name tables from a fresh
        // traversal, which already reaches the new bone through `u`.
        self.uniquify_skeleton(skel_u);

        Ok(handle)
    }

    /// Folds `from`'s node/bone tables into `into` and removes `from` from
    /// the world. The caller is responsible for re-running the
    /// uniquification pass afterwards (it must see the new bone too).
    fn merge_skeletons(&mut self, into: SkelHandle, from: SkelHandle) {
        let from_skel = self.skeletons.remove(from).expect("merge source skeleton vanished");
        self.skeleton_names.remove_by_right(&from);

        for &node in from_skel.nodes.values() {
            if let ParentLink::Skeleton(s) = self.nodes[node].parent {
                if s == from {
                    self.nodes.get_mut(node).unwrap().parent = ParentLink::Skeleton(into);
                }
            }
        }

        let into_skel = self.skeletons.get_mut(into).unwrap();
        into_skel.nodes.extend(from_skel.nodes);
        into_skel.bones.extend(from_skel.bones);
    }

    /// Rebuilds `skel`'s name tables from a fresh traversal, applying the
    /// deterministic rename scheme a bone merge needs: any non-root node
    /// literally named "root" becomes "node-0" (only the skeleton's actual
    /// root keeps that name), then every name is normalized (trailing
    /// "-<int>" stripped) and re-suffixed in traversal/insertion order so
    /// duplicates never collide.
    fn uniquify_skeleton(&mut self, skel: SkelHandle) {
        let root = self.skeletons[skel].root();

        let node_order = traverse::nodes_from_traversal(self, NodeOrBone::Node(root));
        for &n in &node_order {
            if n != root && self.nodes[n].name == "root" {
                self.nodes.get_mut(n).unwrap().name = "node-0".to_string();
            }
        }

        let node_names: Vec<String> = node_order.iter().map(|&n| self.nodes[n].name.clone()).collect();
        let new_node_names = unique_names(node_names);
        let mut nodes_tbl = HashMap::with_capacity(node_order.len());
        for (new_name, &h) in new_node_names.into_iter().zip(node_order.iter()) {
            self.nodes.get_mut(h).unwrap().name = new_name.clone();
            nodes_tbl.insert(new_name, h);
        }

        let bone_order = traverse::bones_from_traversal(self, NodeOrBone::Node(root));
        let bone_names: Vec<String> = bone_order.iter().map(|&b| self.bones[b].name.clone()).collect();
        let new_bone_names = unique_names(bone_names);
        let mut bones_tbl = HashMap::with_capacity(bone_order.len());
        for (new_name, &h) in new_bone_names.into_iter().zip(bone_order.iter()) {
            self.bones.get_mut(h).unwrap().name = new_name.clone();
            bones_tbl.insert(new_name, h);
        }

        let s = self.skeletons.get_mut(skel).unwrap();
        s.nodes = nodes_tbl;
        s.bones = bones_tbl;
    }

    // Whole-graph transforms and pose snapshots ---------------------------

    /// Transforms every node in the world through `mat`. The bulk-move
    /// operation an editor uses on a whole skeleton or selection; distinct
    /// from the per-bone FK operations in `bone.rs`.
    pub fn apply(&mut self, mat: Matrix) {
        for (_, node) in self.nodes.iter_mut() {
            node.pos = geometry::transform(node.pos, &mat);
        }
    }

    pub fn apply_to_skeleton(&mut self, skel: SkelHandle, mat: Matrix) -> Result<()> {
        let handles: Vec<NodeHandle> = self.skeletons.get(skel).ok_or(Error::NotFound)?.nodes.values().copied().collect();
        for h in handles {
            let node = self.nodes.get_mut(h).unwrap();
            node.pos = geometry::transform(node.pos, &mat);
        }
        Ok(())
    }

    pub fn skeleton_pose(&self, skel: SkelHandle) -> Result<Pose> {
        let s = self.skeletons.get(skel).ok_or(Error::NotFound)?;
        Ok(s.nodes.values().map(|&n| self.nodes[n].world_pos()).collect())
    }

    /// Applies a previously captured `Pose` back onto `skel`'s nodes, in the
    /// same (map) iteration order `skeleton_pose` produced it in. Fails if
    /// the node count no longer matches.
    pub fn set_skeleton_pose(&mut self, skel: SkelHandle, pose: &Pose) -> Result<()> {
        let handles: Vec<NodeHandle> = self.skeletons.get(skel).ok_or(Error::NotFound)?.nodes.values().copied().collect();
        if handles.len() != pose.len() {
            return Err(Error::OutOfBounds);
        }
        for (h, &p) in handles.into_iter().zip(pose.iter()) {
            self.nodes.get_mut(h).unwrap().pos = p;
        }
        Ok(())
    }

    // Deep copy ------------------------------------------------------------

    /// Deep-copies `skel` (nodes and bones, by name) into `target`, which
    /// may be `self` or a different `World`. Bones are recreated in
    /// traversal order so each bone's `v` is still a root node at the
    /// moment it is attached.
    pub fn copy_skeleton_into(
        &self,
        skel: SkelHandle,
        target: &mut World,
        new_name: Option<String>,
    ) -> Result<SkelHandle> {
        let src = self.skeletons.get(skel).ok_or(Error::NotFound)?;
        let name = new_name.unwrap_or_else(|| src.name.clone());
        let new_skel = target.create_skeleton_named(name)?;

        let root = src.root();
        let node_order = traverse::nodes_from_traversal(self, NodeOrBone::Node(root));
        let mut node_map: HashMap<NodeHandle, NodeHandle> = HashMap::with_capacity(node_order.len());
        for &n in &node_order {
            let node = &self.nodes[n];
            let new_n = target.create_node(new_skel, node.name.clone(), node.pos)?;
            node_map.insert(n, new_n);
        }
        target.set_skeleton_root(new_skel, node_map[&root]);

        let bone_order = traverse::bones_from_traversal(self, NodeOrBone::Node(root));
        for &b in &bone_order {
            let bone = &self.bones[b];
            let new_u = node_map[&bone.u];
            let new_v = node_map[&bone.v];
            let new_b = target.create_bone_in_skeleton(bone.name.clone(), new_u, new_v)?;
            if let Some(c) = bone.rot_constraint {
                target.set_bone_rotation_constraint(new_b, c.start, c.span, c.relative_to_parent)?;
            }
        }

        Ok(new_skel)
    }

    // User-data side table -------------------------------------------------

    pub fn set_node_user_data<T: Any>(&mut self, node: NodeHandle, data: T) {
        self.user_data.insert(PieceHandle::Node(node), Box::new(data));
    }

    pub fn node_user_data<T: Any>(&self, node: NodeHandle) -> Option<&T> {
        self.user_data.get(&PieceHandle::Node(node)).and_then(|b| b.downcast_ref())
    }

    pub fn clear_node_user_data(&mut self, node: NodeHandle) {
        self.user_data.remove(&PieceHandle::Node(node));
    }

    pub fn set_bone_user_data<T: Any>(&mut self, bone: BoneHandle, data: T) {
        self.user_data.insert(PieceHandle::Bone(bone), Box::new(data));
    }

    pub fn bone_user_data<T: Any>(&self, bone: BoneHandle) -> Option<&T> {
        self.user_data.get(&PieceHandle::Bone(bone)).and_then(|b| b.downcast_ref())
    }

    pub fn clear_bone_user_data(&mut self, bone: BoneHandle) {
        self.user_data.remove(&PieceHandle::Bone(bone));
    }
}

// Name uniquification helpers ---------------------------------------------

/// Strips a trailing `-<positive integer>` suffix, if present.
fn normalize_name(name: &str) -> String {
    if !name.chars().last().is_some_and(|c| c.is_ascii_digit()) {
        return name.to_string();
    }
    if let Some(pos) = name.rfind('-') {
        let num_part = &name[pos + 1..];
        if !num_part.is_empty() && num_part.chars().all(|c| c.is_ascii_digit()) {
            return name[..pos].to_string();
        }
    }
    name.to_string()
}

/// Renames `names` in order so each normalized base appears at most once
/// unsuffixed; the second, third, ... occurrence of a base gets `-1`,
/// `-2`, etc. Mirrors `sm_skeleton.cpp`'s `get_unique_names`.
fn unique_names(names: Vec<String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            let base = normalize_name(&name);
            let idx = {
                let c = counts.entry(base.clone()).or_insert(0);
                let v = *c;
                *c += 1;
                v
            };
            if idx > 0 {
                format!("{base}-{idx}")
            } else {
                base
            }
        })
        .collect()
}

/// Smallest-excluded-positive-integer naming for auto-named skeletons
/// (`skeleton-1`, `skeleton-2`, ...), mirroring `sm_world.cpp`'s
/// `unique_name`/`smallest_excluded_positive_integer`.
fn unique_name(prefix: &str, existing: &[String]) -> String {
    let prefixed = format!("{prefix}-");
    let taken: Vec<i64> = existing
        .iter()
        .filter_map(|n| n.strip_prefix(&prefixed))
        .filter_map(|rest| rest.parse::<i64>().ok())
        .filter(|&v| v > 0)
        .collect();

    let n = taken.len() as i64 + 1;
    let mut appears = vec![false; (n + 1) as usize];
    appears[0] = true;
    for v in taken {
        if v < n {
            appears[v as usize] = true;
        }
    }
    let idx = appears.iter().position(|&b| !b).unwrap_or(appears.len()) as i64;
    format!("{prefix}-{idx}")
}
