/*
 *  visibility.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Latching "has scrolled into view" gate for deferred loading
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
use tokio::sync::watch;

/// Axis-aligned rectangle in host layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// True when the two rectangles share area; touching edges do not count.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Owned by the host; flips once when the view's bounds meet the window.
#[derive(Debug)]
pub struct VisibilityGate {
    bounds: Rect,
    tx: watch::Sender<bool>,
}

/// Owned by the loader; resolves when the gate opens.
#[derive(Debug, Clone)]
pub struct VisibleSignal {
    rx: watch::Receiver<bool>,
}

impl VisibilityGate {
    pub fn new(bounds: Rect) -> (Self, VisibleSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { bounds, tx }, VisibleSignal { rx })
    }

    pub fn is_visible(&self) -> bool {
        *self.tx.borrow()
    }

    /// Re-evaluate against the current window (call on host scroll/resize).
    /// Once open the gate stays open.
    pub fn check(&self, window: &Rect) -> bool {
        if self.is_visible() {
            return true;
        }
        if self.bounds.intersects(window) {
            debug!("view at {:?} scrolled into {:?}", self.bounds, window);
            self.tx.send_replace(true);
            return true;
        }
        false
    }
}

impl VisibleSignal {
    pub fn is_visible(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the gate to open. False if the gate was dropped first.
    pub async fn wait(&mut self) -> bool {
        self.rx.wait_for(|visible| *visible).await.is_ok()
    }
}
