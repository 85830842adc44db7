#![doc = "carbon-upload-core: upload pipeline library for the carbon rewards platform."]

//! This crate contains the client side of the evidence upload protocol:
//! presign, direct transfer to object storage, and confirmation, with
//! content-hash deduplication and sequential batch orchestration.
//! Transport is abstracted behind [`contract::FileApi`]; the HTTP
//! implementation lives in the `carbon-upload` crate.
//!
//! # Usage
//! Build [`contract::FileSource`] values, pick an [`config::UploadConfig`],
//! and call [`pipeline::upload_all`] with any `FileApi` implementation.

pub mod config;
pub mod contract;
pub mod error;
pub mod hasher;
pub mod pipeline;
pub mod url_cache;
pub mod validation;
pub mod wire;
