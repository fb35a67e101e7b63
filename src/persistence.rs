// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! JSON document schema for a [`World`]: a version tag plus a flat list of
//! skeletons, each carrying its own nodes, bones and rotation constraints
//! by name.
//!
//! Load always builds into a staging `World` and only swaps it into `self`
//! once the whole document has parsed and reconstructed without error, so a
//! failed load never leaves the caller's world half-mutated.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::handle::NodeHandle;
use crate::world::World;

const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Document {
    version: u32,
    skeletons: Vec<SkeletonDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SkeletonDoc {
    name: String,
    root: String,
    nodes: Vec<NodeDoc>,
    bones: Vec<BoneDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeDoc {
    name: String,
    pos: PosDoc,
}

#[derive(Debug, Serialize, Deserialize)]
struct PosDoc {
    x: f64,
    y: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct BoneDoc {
    name: String,
    u: String,
    v: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    rot_constraint: Option<RotConstraintDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RotConstraintDoc {
    relative_to_parent: bool,
    start_angle: f64,
    span_angle: f64,
}

impl World {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_document()).expect("Document always serializes")
    }

    pub fn to_json_str(&self) -> String {
        serde_json::to_string_pretty(&self.to_document()).expect("Document always serializes")
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json_str()).map_err(|_| Error::Unknown)
    }

    /// Replaces `self`'s contents with the document at `path`. On failure
    /// `self` is left untouched.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|_| Error::Unknown)?;
        self.load_str(&text)
    }

    /// Parses `str` as a fresh [`World`], leaving `self` untouched on
    /// failure.
    pub fn load_str(&mut self, str: &str) -> Result<()> {
        let staged = World::from_json_str(str)?;
        *self = staged;
        Ok(())
    }

    /// Parses `str` into a brand new `World`, independent of any existing
    /// instance.
    pub fn from_json_str(str: &str) -> Result<World> {
        let doc: Document = serde_json::from_str(str)?;
        World::from_document(&doc)
    }

    fn to_document(&self) -> Document {
        let skeletons = self
            .skeleton_names()
            .into_iter()
            .map(|name| {
                let handle = self.skeleton_by_name(&name).expect("name just came from skeleton_names");
                let skel = self.skeleton(handle).expect("handle just resolved");

                let nodes = skel
                    .nodes()
                    .into_iter()
                    .map(|h| {
                        let node = self.node(h).expect("traversal handle is live");
                        NodeDoc {
                            name: node.name().to_string(),
                            pos: PosDoc { x: node.world_pos().x, y: node.world_pos().y },
                        }
                    })
                    .collect();

                let bones = skel
                    .bones()
                    .into_iter()
                    .map(|h| {
                        let bone = self.bone(h).expect("traversal handle is live");
                        BoneDoc {
                            name: bone.name().to_string(),
                            u: self.node(bone.parent_node()).unwrap().name().to_string(),
                            v: self.node(bone.child_node()).unwrap().name().to_string(),
                            rot_constraint: bone.rotation_constraint().map(|c| RotConstraintDoc {
                                relative_to_parent: c.relative_to_parent,
                                start_angle: c.start,
                                span_angle: c.span,
                            }),
                        }
                    })
                    .collect();

                SkeletonDoc {
                    name: skel.name().to_string(),
                    root: self.node(skel.root()).unwrap().name().to_string(),
                    nodes,
                    bones,
                }
            })
            .collect();

        Document { version: DOCUMENT_VERSION, skeletons }
    }

    fn from_document(doc: &Document) -> Result<World> {
        let mut world = World::new();

        for skel_doc in &doc.skeletons {
            let skel = world
                .create_skeleton_named(skel_doc.name.clone())
                .map_err(|_| Error::InvalidJson(format!("duplicate skeleton name {:?}", skel_doc.name)))?;

            let mut by_name: HashMap<String, NodeHandle> = HashMap::with_capacity(skel_doc.nodes.len());
            for node_doc in &skel_doc.nodes {
                if by_name.contains_key(&node_doc.name) {
                    return Err(Error::InvalidJson(format!("duplicate node name {:?}", node_doc.name)));
                }
                let h = world
                    .create_node(skel, node_doc.name.clone(), Point::new(node_doc.pos.x, node_doc.pos.y))
                    .map_err(|_| Error::InvalidJson(format!("duplicate node name {:?}", node_doc.name)))?;
                by_name.insert(node_doc.name.clone(), h);
            }

            let root = *by_name
                .get(&skel_doc.root)
                .ok_or_else(|| Error::InvalidJson(format!("unknown root node {:?}", skel_doc.root)))?;
            world.set_skeleton_root(skel, root);

            for bone_doc in &skel_doc.bones {
                let u = *by_name
                    .get(&bone_doc.u)
                    .ok_or_else(|| Error::InvalidJson(format!("unknown node {:?}", bone_doc.u)))?;
                let v = *by_name
                    .get(&bone_doc.v)
                    .ok_or_else(|| Error::InvalidJson(format!("unknown node {:?}", bone_doc.v)))?;
                let b = world
                    .create_bone_in_skeleton(bone_doc.name.clone(), u, v)
                    .map_err(|_| Error::InvalidJson(format!("duplicate bone name {:?}", bone_doc.name)))?;

                if let Some(c) = &bone_doc.rot_constraint {
                    world.set_bone_rotation_constraint(b, c.start_angle, c.span_angle, c.relative_to_parent)?;
                }
            }
        }

        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_world() -> World {
        let mut world = World::new();
        let skel = world.create_skeleton(Point::zero());
        let root = world.skeleton(skel).unwrap().root();
        let a = world.create_node(skel, "a", Point::new(1.0, 0.0)).unwrap();
        let bone = world.create_bone_in_skeleton("root-a", root, a).unwrap();
        world.set_bone_rotation_constraint(bone, 0.1, 0.5, false).unwrap();
        world
    }

    #[test]
    fn round_trips_through_json_text() {
        let world = sample_world();
        let text = world.to_json_str();
        let mut reloaded = World::new();
        reloaded.load_str(&text).unwrap();

        assert_eq!(reloaded.skeleton_names(), world.skeleton_names());
        let skel = reloaded.skeleton_by_name("skeleton-1").unwrap();
        let view = reloaded.skeleton(skel).unwrap();
        assert!(view.contains_node("a"));
        let bone = view.bone_by_name("root-a").unwrap();
        let constraint = reloaded.bone(bone).unwrap().rotation_constraint().unwrap();
        assert_relative_eq!(constraint.start, 0.1);
        assert_relative_eq!(constraint.span, 0.5);
    }

    #[test]
    fn failed_load_leaves_world_untouched() {
        let mut world = sample_world();
        let before = world.to_json_str();
        let err = world.load_str("{ not json");
        assert!(err.is_err());
        assert_eq!(world.to_json_str(), before);
    }

    #[test]
    fn duplicate_node_names_are_rejected_as_invalid_json() {
        let json = r#"{
            "version": 1,
            "skeletons": [{
                "name": "s",
                "root": "root",
                "nodes": [
                    {"name": "root", "pos": {"x": 0.0, "y": 0.0}},
                    {"name": "root", "pos": {"x": 1.0, "y": 0.0}}
                ],
                "bones": []
            }]
        }"#;
        match World::from_json_str(json) {
            Err(Error::InvalidJson(_)) => {}
            other => panic!("expected InvalidJson, got {other:?}"),
        }
    }
}
