/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::{Context, Result};
use mmap_rs::{Mmap, MmapFlags, MmapOptions};
use std::sync::Arc;

/// A read-only memory mapping of a file, shareable across readers.
///
/// The compressed-graph file format is write-once/read-many, so only the
/// immutable mapping case is needed (unlike the teacher's `MmapBackend`,
/// which also supports a mutable variant for in-place graph construction).
#[derive(Clone)]
pub struct MmapBackend {
    mmap: Arc<Mmap>,
}

impl std::fmt::Debug for MmapBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapBackend")
            .field("len", &self.mmap.len())
            .finish()
    }
}

impl MmapBackend {
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())
            .with_context(|| format!("cannot open {}", path.as_ref().display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("cannot stat {}", path.as_ref().display()))?
            .len() as usize;

        let mmap = unsafe {
            MmapOptions::new(len)
                .with_context(|| format!("cannot initialize mmap of size {len}"))?
                .with_flags(MmapFlags::empty())
                .with_file(file, 0)
                .map()
                .with_context(|| format!("cannot mmap {}", path.as_ref().display()))?
        };

        Ok(Self {
            mmap: Arc::new(mmap),
        })
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.len() == 0
    }
}

impl AsRef<[u8]> for MmapBackend {
    fn as_ref(&self) -> &[u8] {
        self.mmap.as_ref()
    }
}
