// Copyright (c) 2017 Ivo Wetzel

// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Hard-failure error type for the skeleton graph.
//!
//! Solver outcomes are *not* modeled here -- see [`crate::fabrik::SolveResult`].

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("node already has a parent bone")]
    MultiParentNode,

    #[error("bone creation would introduce a cycle")]
    CyclicBones,

    #[error("name is already in use")]
    NonUniqueName,

    #[error("handle does not resolve to an existing piece")]
    NotFound,

    #[error("bone has no parent bone")]
    NoParent,

    #[error("index is out of bounds")]
    OutOfBounds,

    #[error("malformed skeleton document: {0}")]
    InvalidJson(String),

    #[error("bone endpoints belong to different skeletons")]
    CrossSkeletonBone,

    #[error("unknown error")]
    Unknown,
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidJson(e.to_string())
    }
}
