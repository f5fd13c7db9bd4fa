//! Render pipeline
//!
//! One flow for every entry point: validate, fetch, render, upload, clean up.
//! Routes differ only in the [`AudioSource`] of the request.

mod request;
mod runner;

pub use request::{AudioSource, RenderRequest};
pub use runner::{RenderPipeline, Stage};
