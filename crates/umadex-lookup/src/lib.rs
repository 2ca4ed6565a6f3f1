// Copyright 2026 Umadex Contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only fuzzy lookup over the scraped event corpora.

pub mod error;
pub mod index;
pub mod rest;

pub use error::LookupError;
pub use index::EventIndex;
