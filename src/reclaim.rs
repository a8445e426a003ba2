// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Adaptive countdown that releases transient loader buffers.
//!
//! Every successful load calls [`ReclaimTimer::notify`]. The first load starts
//! the countdown at the base interval; later loads extend it by
//! `base / sqrt(countdown)`, so a burst keeps pushing the release back but
//! each extension is smaller than the last. When [`ReclaimTimer::tick`] brings
//! the countdown to zero the release callback runs once.
//!
//! ```
//! use archetype_assets::reclaim::ReclaimTimer;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let counter = released.clone();
//! let timer = ReclaimTimer::new(2, move || {
//!     counter.fetch_add(1, Ordering::Relaxed);
//! });
//!
//! timer.notify();
//! timer.tick();
//! timer.tick();
//! assert_eq!(released.load(Ordering::Relaxed), 1);
//! assert!(timer.is_idle());
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};

type ReleaseFn = Box<dyn FnMut() + Send>;

/// Extension applied when a load lands while the timer is already running
pub fn backoff_extension(base: u16, countdown: u16) -> f32 {
    if countdown == 0 {
        return base as f32;
    }
    base as f32 / (countdown as f32).sqrt()
}

/// Adaptive countdown that releases transient loader memory once loads go quiet.
///
/// `notify` may come from any thread; `tick` is driven once per frame.
pub struct ReclaimTimer {
    base: u16,
    countdown: AtomicU16,
    releases: AtomicU64,
    release: Mutex<ReleaseFn>,
}

impl ReclaimTimer {
    pub fn new(base: u16, release: impl FnMut() + Send + 'static) -> Self {
        Self {
            base: base.max(1),
            countdown: AtomicU16::new(0),
            releases: AtomicU64::new(0),
            release: Mutex::new(Box::new(release)),
        }
    }

    /// Timer whose release does nothing; useful when only the countdown matters
    pub fn detached(base: u16) -> Self {
        Self::new(base, || {})
    }

    /// Record a successful load. Safe to call from loader threads.
    pub fn notify(&self) {
        let base = self.base;
        // The closure never returns None, so this cannot fail.
        let _ = self
            .countdown
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == 0 {
                    Some(base)
                } else {
                    let extension = backoff_extension(base, current) as u16;
                    Some(current.saturating_add(extension))
                }
            });
    }

    /// Advance one update tick. Returns true when this tick fired the release.
    pub fn tick(&self) -> bool {
        let previous = self
            .countdown
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });

        if previous == Ok(1) {
            tracing::debug!("reclaim timer elapsed, releasing transient buffers");
            let mut release = self.release.lock();
            (release.as_mut())();
            self.releases.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn countdown(&self) -> u16 {
        self.countdown.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.countdown() == 0
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    /// How many times the release callback has run
    pub fn release_count(&self) -> u64 {
        self.releases.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ReclaimTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReclaimTimer")
            .field("base", &self.base)
            .field("countdown", &self.countdown())
            .field("releases", &self.release_count())
            .finish()
    }
}
