#![forbid(unsafe_code)]

//! Core: input events, content-tree contracts, and simulation policy.
//!
//! # Role in plugclick
//! `plugclick-core` is the vocabulary layer. It owns the immutable
//! [`event::InputEvent`] value captured from the host, the [`document`]
//! contracts the engine uses to walk past plugin content, and the
//! [`policy`] / [`config`] types that decide whether simulation is enabled.
//!
//! # How it fits in the system
//! `plugclick-runtime` consumes these types to run the interception and
//! disambiguation state machines; `plugclick-native` only needs
//! [`geometry::Point`] for click synthesis. Nothing in this crate performs
//! I/O or keeps time on its own: the host drives everything. Script hosts
//! that see DOM `MouseEvent` objects convert them through [`dom`].

pub mod config;
pub mod document;
pub mod dom;
pub mod event;
pub mod geometry;
pub mod policy;
