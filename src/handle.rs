// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Generational arena keys. `World` is the only owner of the storage these
//! index into; handles are stable across mutation but become dangling (and
//! are rejected) once the piece they named is removed.

use slotmap::new_key_type;

new_key_type! {
    pub struct NodeHandle;
    pub struct BoneHandle;
    pub struct SkelHandle;
}

/// A tagged handle over the three kinds of addressable skeleton piece, used
/// wherever the graph needs to treat nodes and bones uniformly (traversal,
/// the user-data side table, bulk rename).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PieceHandle {
    Node(NodeHandle),
    Bone(BoneHandle),
    Skeleton(SkelHandle),
}

impl From<NodeHandle> for PieceHandle {
    fn from(h: NodeHandle) -> Self {
        PieceHandle::Node(h)
    }
}

impl From<BoneHandle> for PieceHandle {
    fn from(h: BoneHandle) -> Self {
        PieceHandle::Bone(h)
    }
}

impl From<SkelHandle> for PieceHandle {
    fn from(h: SkelHandle) -> Self {
        PieceHandle::Skeleton(h)
    }
}

/// A node-or-bone handle, used by the bipartite traversal where skeletons
/// are never visited directly.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NodeOrBone {
    Node(NodeHandle),
    Bone(BoneHandle),
}

impl From<NodeHandle> for NodeOrBone {
    fn from(h: NodeHandle) -> Self {
        NodeOrBone::Node(h)
    }
}

impl From<BoneHandle> for NodeOrBone {
    fn from(h: BoneHandle) -> Self {
        NodeOrBone::Bone(h)
    }
}

impl From<NodeOrBone> for PieceHandle {
    fn from(h: NodeOrBone) -> Self {
        match h {
            NodeOrBone::Node(n) => PieceHandle::Node(n),
            NodeOrBone::Bone(b) => PieceHandle::Bone(b),
        }
    }
}
