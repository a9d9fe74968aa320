//! Fixture builders and assertions shared by TwinRaven's integration tests.
//! Not published; a workspace-internal dev-dependency only.

pub mod assertions;
pub mod fixtures;
