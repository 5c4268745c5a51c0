/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use super::ByteSource;
use anyhow::{bail, Context, Result};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::Path;

const BLOCK_SIZE: u64 = 512;
const CACHE_CAPACITY: usize = 256;

struct Entry {
    data: Vec<u8>,
    last_used: u64,
}

/// A [`ByteSource`] that reads a file through a small LRU cache of
/// fixed-size blocks instead of mapping the whole thing into memory — for
/// platforms or files where `mmap` isn't appropriate.
///
/// The original keeps a fixed 256-entry, 512-byte-block cache with an
/// open-addressed hash table and evicts once it is 75% full. This port
/// keeps the same block size and capacity but uses a plain `HashMap` plus
/// a logical clock for recency, since the open-addressing scheme is an
/// internal placement detail rather than anything observable from outside.
/// Single-threaded by design, like the file cursor it wraps: the cache
/// lives behind `RefCell`/`Cell`, not a `Mutex`, so `BlockCacheSource` is
/// `!Sync`.
pub struct BlockCacheSource {
    file: File,
    len: u64,
    blocks: RefCell<HashMap<u64, Entry>>,
    clock: Cell<u64>,
}

impl BlockCacheSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("cannot open {}", path.as_ref().display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("cannot stat {}", path.as_ref().display()))?
            .len();
        Ok(Self {
            file,
            len,
            blocks: RefCell::new(HashMap::with_capacity(CACHE_CAPACITY)),
            clock: Cell::new(0),
        })
    }

    fn tick(&self) -> u64 {
        let next = self.clock.get() + 1;
        self.clock.set(next);
        next
    }

    fn load_block(&self, block_idx: u64) -> Result<()> {
        let start = block_idx * BLOCK_SIZE;
        let end = (start + BLOCK_SIZE).min(self.len);
        let mut buf = vec![0u8; (end - start) as usize];
        self.file
            .read_exact_at(&mut buf, start)
            .with_context(|| format!("short read at block {block_idx}"))?;

        let now = self.tick();
        let mut blocks = self.blocks.borrow_mut();
        if blocks.len() >= CACHE_CAPACITY && blocks.len() * 4 >= CACHE_CAPACITY * 3 {
            if let Some((&victim, _)) = blocks.iter().min_by_key(|(_, e)| e.last_used) {
                blocks.remove(&victim);
            }
        }
        blocks.insert(
            block_idx,
            Entry {
                data: buf,
                last_used: now,
            },
        );
        Ok(())
    }
}

impl ByteSource for BlockCacheSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.len {
            bail!("read past end of file: [{}, {}) of {}", offset, offset + buf.len() as u64, self.len);
        }
        let mut filled = 0usize;
        while filled < buf.len() {
            let pos = offset + filled as u64;
            let block_idx = pos / BLOCK_SIZE;
            let block_off = (pos % BLOCK_SIZE) as usize;

            if !self.blocks.borrow().contains_key(&block_idx) {
                self.load_block(block_idx)?;
            }

            let now = self.tick();
            let mut blocks = self.blocks.borrow_mut();
            let entry = blocks.get_mut(&block_idx).expect("just inserted");
            entry.last_used = now;
            let avail = entry.data.len() - block_off;
            let take = avail.min(buf.len() - filled);
            buf[filled..filled + take].copy_from_slice(&entry.data[block_off..block_off + take]);
            filled += take;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_match_the_file_contents_across_block_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let contents: Vec<u8> = (0..(BLOCK_SIZE as usize * 3 + 17)).map(|i| (i % 256) as u8).collect();
        std::fs::write(&path, &contents).unwrap();

        let source = BlockCacheSource::open(&path).unwrap();
        assert_eq!(source.len(), contents.len() as u64);

        let mut buf = vec![0u8; 100];
        source.read_at(BLOCK_SIZE - 10, &mut buf).unwrap();
        assert_eq!(buf, contents[(BLOCK_SIZE as usize - 10)..(BLOCK_SIZE as usize + 90)]);

        let mut whole = vec![0u8; contents.len()];
        source.read_at(0, &mut whole).unwrap();
        assert_eq!(whole, contents);
    }

    #[test]
    fn read_past_end_of_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, vec![1u8; 10]).unwrap();

        let source = BlockCacheSource::open(&path).unwrap();
        let mut buf = vec![0u8; 20];
        assert!(source.read_at(0, &mut buf).is_err());
    }

    #[test]
    fn cache_evicts_once_past_the_load_factor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let block_count = CACHE_CAPACITY + 16;
        let contents = vec![7u8; block_count * BLOCK_SIZE as usize];
        std::fs::write(&path, &contents).unwrap();

        let source = BlockCacheSource::open(&path).unwrap();
        let mut byte = [0u8; 1];
        for i in 0..block_count {
            source.read_at(i as u64 * BLOCK_SIZE, &mut byte).unwrap();
        }
        assert!(source.blocks.borrow().len() <= CACHE_CAPACITY);
    }
}
