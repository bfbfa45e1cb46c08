//! Tile Engine - fixed-tick game loop with layered entities and tile maps

pub mod core;
pub mod ecs;
pub mod engine;
pub mod entity;
pub mod simulation;
pub mod spatial;
