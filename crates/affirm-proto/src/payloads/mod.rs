//! Message bodies carried inside the sync envelope.

pub mod anchor;
pub mod world_map;
