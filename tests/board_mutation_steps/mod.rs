//! Step definitions for board mutation BDD scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
