/*
 *  events.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  View input events, listener registry and trailing-edge debounce
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    /// host scrolled the container to `scroll_left` element pixels
    Scroll { scroll_left: f64 },
    Resize { width: u32, height: u32 },
    ZoomIn,
    ZoomOut,
    SetZoom(u32),
    /// click at element pixel `pixel_x`
    Click { pixel_x: f64 },
}

/// Trailing-edge debounce: fires once, `delay` after the last trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, deadline: None }
    }

    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Each trigger pushes the deadline back.
    #[inline]
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// True once per burst, when `now` has reached the deadline.
    #[inline]
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<u64, mpsc::UnboundedSender<ViewEvent>>>,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<u64, mpsc::UnboundedSender<ViewEvent>>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Fan-out of host input events to every live view.
#[derive(Debug, Clone, Default)]
pub struct EventHub {
    inner: Arc<Registry>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; it stays registered until the subscription drops.
    pub fn subscribe(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().insert(id, tx);
        debug!("listener {} registered", id);
        Subscription { id, hub: Arc::downgrade(&self.inner), rx }
    }

    /// Deliver to all listeners; returns how many received it.
    pub fn publish(&self, event: ViewEvent) -> usize {
        let mut listeners = self.inner.lock();
        listeners.retain(|_, tx| tx.send(event).is_ok());
        listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Disconnect everyone; pending `recv` calls return `None`.
    pub fn close(&self) {
        self.inner.lock().clear();
    }
}

/// A registered listener. Dropping it unregisters.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    hub: Weak<Registry>,
    rx: mpsc::UnboundedReceiver<ViewEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ViewEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.lock().remove(&self.id);
            debug!("listener {} unregistered", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_trailing_edge() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(100));
        assert!(!d.fire(t0));
        d.trigger(t0);
        d.trigger(t0 + Duration::from_millis(60));
        assert!(!d.fire(t0 + Duration::from_millis(120)));
        assert!(d.fire(t0 + Duration::from_millis(160)));
        assert!(!d.fire(t0 + Duration::from_millis(500)));
        d.trigger(t0);
        d.cancel();
        assert!(d.deadline().is_none());
    }

    #[tokio::test]
    async fn test_subscription_drop_unregisters() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        let b = hub.subscribe();
        assert_eq!(hub.publish(ViewEvent::ZoomIn), 2);
        drop(b);
        assert_eq!(hub.listener_count(), 1);
        assert_eq!(hub.publish(ViewEvent::SetZoom(3)), 1);
        hub.close();
        assert_eq!(a.recv().await, Some(ViewEvent::ZoomIn));
        assert_eq!(a.recv().await, Some(ViewEvent::SetZoom(3)));
        assert_eq!(a.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let hub = EventHub::new();
        let mut a = hub.subscribe();
        hub.publish(ViewEvent::ZoomOut);
        hub.close();
        assert_eq!(a.recv().await, Some(ViewEvent::ZoomOut));
        assert_eq!(a.recv().await, None);
    }
}
