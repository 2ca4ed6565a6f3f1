// Copyright 2026 Umadex Contributors
// SPDX-License-Identifier: Apache-2.0

//! umadex scraper library: drives a headless browser over GameTora's
//! Umamusume pages and persists what it reads into JSON corpora.
//!
//! The binary is a thin shell over [`pipeline::Pipeline`]; the modules are
//! public so integration tests can exercise the store, the snapshot model
//! and the extractors without a browser.

pub mod assets;
pub mod config;
pub mod dom;
pub mod error;
pub mod extract;
pub mod live;
pub mod pipeline;
pub mod popup;
pub mod progress;
pub mod records;
pub mod renderer;
pub mod retry;
pub mod store;
