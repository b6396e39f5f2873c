use std::sync::Arc;

use arc_swap::ArcSwap;

use super::value::AxisValue;

/// One atomically swapped view of an axis: the value last reported by the
/// hardware, whether it is still waiting to be drained, and the value the
/// synchronization loop last published.
///
/// While the loop runs, `moving == false` implies `readback == published`.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSample {
    pub readback: Option<AxisValue>,
    pub moving: bool,
    pub published: Option<AxisValue>,
}

impl AxisSample {
    pub fn new(readback: Option<AxisValue>, moving: bool) -> Self {
        Self {
            published: readback.clone(),
            readback,
            moving,
        }
    }

    fn reported(&self, value: AxisValue) -> Self {
        Self {
            readback: Some(value),
            moving: true,
            published: self.published.clone(),
        }
    }

    fn consumed(&self, publish: bool) -> Self {
        Self {
            readback: self.readback.clone(),
            moving: false,
            published: if publish {
                self.readback.clone()
            } else {
                self.published.clone()
            },
        }
    }
}

/// Shared per-axis state.
///
/// The sample has exactly one producer (the notification callback, via
/// [`AxisCell::notify`]) and one consumer (the synchronization loop, via
/// [`AxisCell::drain`] and [`AxisCell::clear`]). Guards and the UI read the
/// `published` field of a single loaded sample.
#[derive(Debug)]
pub struct AxisCell {
    live: ArcSwap<AxisSample>,
}

impl AxisCell {
    pub fn new(initial: Option<AxisValue>, dirty: bool) -> Self {
        Self {
            live: ArcSwap::from_pointee(AxisSample::new(initial, dirty)),
        }
    }

    /// Notification side: overwrite the readback and mark it unconsumed.
    /// The published value is carried over from whatever sample it replaces.
    pub fn notify(&self, value: AxisValue) {
        self.live.rcu(|current| current.reported(value.clone()));
    }

    /// Consumer side: take the pending sample, clear `moving` and publish the
    /// readback in the same swap. Returns `None` when nothing is pending.
    ///
    /// The swap is a compare-and-swap against the sample that was read, so a
    /// notification landing mid-drain is retried here instead of being wiped.
    pub fn drain(&self) -> Option<AxisSample> {
        self.take(true)
    }

    /// Consumer side: clear `moving` without publishing. Used at shutdown.
    pub fn clear(&self) -> bool {
        self.take(false).is_some()
    }

    fn take(&self, publish: bool) -> Option<AxisSample> {
        let mut current = self.live.load_full();
        loop {
            if !current.moving {
                return None;
            }
            let consumed = Arc::new(current.consumed(publish));
            let previous = self.live.compare_and_swap(&current, consumed);
            if Arc::ptr_eq(&previous, &current) {
                return Some(AxisSample::clone(&current));
            }
            current = arc_swap::Guard::into_inner(previous);
        }
    }

    pub fn sample(&self) -> AxisSample {
        AxisSample::clone(&self.live.load())
    }

    pub fn is_moving(&self) -> bool {
        self.live.load().moving
    }

    pub fn readback(&self) -> Option<AxisValue> {
        self.live.load().readback.clone()
    }

    pub fn published(&self) -> Option<AxisValue> {
        self.live.load().published.clone()
    }
}
