//! REST endpoint handlers organized by resource.

pub mod puppy;
pub mod system;
