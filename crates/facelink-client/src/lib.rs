//! Receiving side of facelink: answers the offer, decodes the incoming
//! video and feeds it to the detection worker.

#![forbid(unsafe_code)]

pub mod args;
pub mod pipeline;

pub use args::{ClientArgs, DetectorKind};
