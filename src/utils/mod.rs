/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Small utilities shared across the rest of the crate.

mod mmap_backend;
pub use mmap_backend::*;

mod progress;
pub use progress::*;
