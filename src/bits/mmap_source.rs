/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::ByteSource;
use crate::utils::MmapBackend;
use anyhow::{bail, Result};

/// A [`ByteSource`] backed by a whole-file memory map. Thread-safe and
/// cheap to clone (shares the underlying mapping via `Arc`).
#[derive(Clone, Debug)]
pub struct MmapSource {
    backend: MmapBackend,
}

impl MmapSource {
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self {
            backend: MmapBackend::load(path)?,
        })
    }

    pub fn from_backend(backend: MmapBackend) -> Self {
        Self { backend }
    }
}

impl ByteSource for MmapSource {
    fn len(&self) -> u64 {
        self.backend.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let data = self.backend.as_ref();
        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            bail!("read past end of mapped file: [{start}, {end}) of {}", data.len());
        }
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }
}
