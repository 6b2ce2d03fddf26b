//! # sift-core
//!
//! Core types, ID prefixes, and error types for sift.
//!
//! This crate provides the foundational types shared across all sift crates:
//! - Entity structs for accounts, saved lists, shadow entities, and core items
//! - Provider, controller, and missing-entity policy enums
//! - ID prefix constants
//! - The relative due-date rule attached to saved lists
//! - Cross-cutting error types

pub mod due;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
