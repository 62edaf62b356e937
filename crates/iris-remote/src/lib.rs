//! Client side of the vision service HTTP contract.
//!
//! [`client`] speaks to the three endpoints; [`poller`], [`action`] and
//! [`video`] are the tasks that keep the view in sync with the service. All of
//! them report back by publishing [`iris_core::event::Event`]s, never by
//! touching view state directly.

pub mod action;
pub mod client;
pub mod error;
pub mod poller;
pub mod protocol;
pub mod video;

pub use action::ActionRequester;
pub use client::{FrameSource, HttpVisionClient, VisionApi};
pub use error::{Result, VisionError};
pub use poller::Poller;
pub use video::VideoFeed;
