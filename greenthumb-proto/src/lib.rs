//! Shared wire definitions for the `GreenThumb` calendar API and push channel.

pub mod codec;
pub mod event;
pub mod notification;
pub mod task;
pub mod template;
