// src/lib.rs

//! _nlvlib_ is the core of the _nlv_ network packet-log viewer: the item
//! collection, the lazy-parsing/caching layer, and the search engine.
//!
//! * The [`readers`] module yields raw packets from a [`NetworkLog`]
//!   source.
//! * The [`data`] module defines [`PacketRecord`]s, [`ViewerItem`]s, and
//!   parse states.
//! * The [`protocols`] module is the pluggable protocol catalog.
//! * The [`viewer`] module is the engine: collection, eviction queue,
//!   matchers, search, and the [`Viewer`] facade.
//! * The [`printer`] module exports parsed text.
//!
//! The presentation layer (windows, tabs, dialogs) is not here; the
//! `nlv` binary is a command-line driver over the same surface.
//!
//! [`readers`]: crate::readers
//! [`NetworkLog`]: crate::readers::netlog::NetworkLog
//! [`data`]: crate::data
//! [`PacketRecord`]: crate::data::packet::PacketRecord
//! [`ViewerItem`]: crate::data::item::ViewerItem
//! [`protocols`]: crate::protocols
//! [`viewer`]: crate::viewer
//! [`Viewer`]: crate::viewer::Viewer
//! [`printer`]: crate::printer

pub mod common;
pub mod data;
pub mod debug;
pub mod printer;
pub mod protocols;
pub mod readers;
pub mod viewer;
#[cfg(test)]
pub mod tests;
