// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Path-keyed cache of decoded samples.
//!
//! The cache hands out `Arc`s, so evicting an entry never invalidates a buffer a
//! voice is still playing. The audio thread never touches the cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::audio::{AudioBuffer, LoaderError, SampleLoader};

/// Cache of loaded samples by file path.
#[derive(Default)]
pub struct SampleCache {
    entries: Mutex<HashMap<PathBuf, Arc<AudioBuffer>>>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached buffer for `path`, loading (and optionally
    /// normalizing) it on a miss.
    pub fn get_or_load(
        &self,
        path: &Path,
        loader: &dyn SampleLoader,
        normalize_peak: Option<f32>,
    ) -> Result<Arc<AudioBuffer>, LoaderError> {
        if let Some(buffer) = self.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(buffer);
        }

        // Decode without holding the lock; a concurrent load of the same path
        // just results in the second insert winning.
        info!(path = ?path, "Loading sample into memory");
        let mut buffer = loader.load(path)?;
        if let Some(peak) = normalize_peak {
            buffer.normalize(peak);
        }

        let buffer = Arc::new(buffer);
        info!(
            path = ?path,
            channels = buffer.channel_count(),
            sample_rate = buffer.sample_rate(),
            duration_ms = buffer.duration_time().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample loaded"
        );
        self.entries
            .lock()
            .insert(path.to_path_buf(), buffer.clone());
        Ok(buffer)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<AudioBuffer>> {
        self.entries.lock().get(path).cloned()
    }

    /// Removes a single entry. Voices already holding the buffer keep it.
    pub fn evict(&self, path: &Path) -> Option<Arc<AudioBuffer>> {
        self.entries.lock().remove(path)
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the total memory used by cached samples.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .lock()
            .values()
            .map(|buffer| buffer.memory_size())
            .sum()
    }
}

impl std::fmt::Debug for SampleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleCache")
            .field("cached_samples", &self.len())
            .field("total_memory_kb", &(self.memory_usage() / 1024))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl SampleLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<AudioBuffer, LoaderError> {
            self.loads.fetch_add(1, Ordering::Relaxed);
            Ok(AudioBuffer::from_interleaved(vec![0.5, -0.25], 1, 44100).unwrap())
        }
    }

    #[test]
    fn test_loads_once_per_path() {
        let cache = SampleCache::new();
        let loader = CountingLoader {
            loads: AtomicUsize::new(0),
        };

        let first = cache.get_or_load(Path::new("a.wav"), &loader, None).unwrap();
        let second = cache.get_or_load(Path::new("a.wav"), &loader, None).unwrap();
        cache.get_or_load(Path::new("b.wav"), &loader, None).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.loads.load(Ordering::Relaxed), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.memory_usage(), 2 * 2 * std::mem::size_of::<f32>());
    }

    #[test]
    fn test_normalizes_on_load() {
        let cache = SampleCache::new();
        let loader = CountingLoader {
            loads: AtomicUsize::new(0),
        };

        let buffer = cache
            .get_or_load(Path::new("a.wav"), &loader, Some(1.0))
            .unwrap();
        assert_eq!(buffer.samples(), &[1.0, -0.5]);
    }

    #[test]
    fn test_eviction_keeps_outstanding_references() {
        let cache = SampleCache::new();
        let loader = CountingLoader {
            loads: AtomicUsize::new(0),
        };

        let held = cache.get_or_load(Path::new("a.wav"), &loader, None).unwrap();
        assert!(cache.evict(Path::new("a.wav")).is_some());
        assert!(cache.get(Path::new("a.wav")).is_none());
        assert_eq!(held.frame_count(), 2);

        cache.get_or_load(Path::new("a.wav"), &loader, None).unwrap();
        cache.clear();
        assert!(cache.is_empty());
    }
}
