// q1bsp-common — Quake BSP29 map loading and point location
//
// Layering, bottom up: qfiles (on-disk records) -> bspfile (lump decoders) ->
// bsptree (linked trees, queries) -> bspmodel (the loaded Map). vis and entities work on a
// loaded Map; common, cvar and files are the console, configuration and file plumbing.

#![allow(clippy::needless_range_loop, clippy::manual_range_contains)]

pub mod q_shared;
pub mod qfiles;
pub mod error;
pub mod md4;
pub mod cvar;
pub mod common;
pub mod files;
pub mod bspfile;
pub mod bsptree;
pub mod bspwrite;
pub mod bspmodel;
pub mod entities;
pub mod vis;
