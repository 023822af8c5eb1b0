//! # softpoly
//!
//! A software triangle rasterization engine.
//!
//! The heart of the crate is the software rendering pipeline:
//! homogeneous-space triangle clipping ([`renderer::software::clip`]),
//! a lane-parallel, branchless triangle filler with perspective-correct
//! texturing ([`renderer::software::raster`]) and a scene walker that
//! feeds the two ([`renderer::software::extract`]).
//!
//! Everything around that core — window, asset decoding, animation
//! blending — lives with the caller. The engine consumes a read-only
//! [`world::Scene`] plus a [`world::Camera`] and produces nothing but
//! pixels, loaned out once per frame through [`renderer::Renderer`].

pub mod renderer;
pub mod world;
