//! Command palette engine: JSON command templates with `%PLACEHOLDER%`
//! variables, a server-backed palette store, and the selection/save/edit
//! workflows that keep a client strictly in sync with the server's copy.

pub mod edit;
pub mod error;
pub mod model;
pub mod notify;
pub mod relay;
pub mod save;
pub mod selection;
pub mod service;
pub mod settings;
pub mod store;
pub mod template;
