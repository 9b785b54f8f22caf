//! Session-scoped cache for rendered Mermaid diagrams.
//!
//! The blog renders diagrams client side and keeps the SVG for an hour so a
//! reader paging back and forth does not pay for rendering twice. This crate
//! holds that cache ([`cache::DiagramCache`]), the storage it runs on
//! ([`infra::storage`]), and the render-through flow that drives it
//! ([`application::render::render_cached`]).

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
