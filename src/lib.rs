//! Maps gamepad and microcontroller input onto keyboard and mouse output.
//!
//! ```text
//! controller (devices) ──► mapping (dispatch, mappers) ──► output (keys, pointers)
//! ```

pub mod config;
pub mod controller;
pub mod mapping;
pub mod output;
