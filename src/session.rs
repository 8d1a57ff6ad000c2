/*
 *  session.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Per-view lifecycle: visibility gate, load, bind, redraw on input
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

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::api::SoundSource;
use crate::audio::AudioDecoder;
use crate::cache::{Feature, FeatureSlice, ResourceCache};
use crate::config::ViewConfig;
use crate::error::{FetchError, RenderError};
use crate::events::{Debouncer, Subscription, ViewEvent};
use crate::render::{PixelSurface, RenderSummary, Renderer};
use crate::viewport::Viewport;
use crate::visibility::VisibleSignal;

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// waiting to scroll into view
    Hidden,
    Loading,
    Rendered,
    Failed(String),
    Destroyed,
}

/// Play `duration_seconds` of `audio_url` from `start_seconds`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub audio_url: String,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    /// nothing to do in this state
    Ignored,
    /// redraw scheduled on the debounce timer
    Deferred,
    Rendered(RenderSummary),
    Play(PlaybackRequest),
}

/// What a view shows: a window of one feature of one sound.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceRequest {
    pub sound_uri: String,
    pub feature: Feature,
    pub start_seconds: f64,
    pub duration_seconds: f64,
}

/// One on-screen feature view.
///
/// Scroll and resize redraws are debounced; zoom redraws immediately.
/// Once destroyed, late data is discarded and nothing is drawn again.
pub struct FeatureView<S: PixelSurface> {
    state: ViewState,
    viewport: Viewport,
    renderer: Renderer,
    surface: S,
    slice: Option<FeatureSlice>,
    scroll_debounce: Debouncer,
    resize_debounce: Debouncer,
    clip_seconds: f64,
}

impl<S: PixelSurface> FeatureView<S> {
    pub fn new(surface: S, settings: &ViewConfig) -> Self {
        let mut viewport = Viewport::new(settings.width(), settings.height());
        viewport.set_zoom(settings.zoom());
        let delay = Duration::from_millis(settings.debounce_ms());
        Self {
            state: ViewState::Hidden,
            viewport,
            renderer: Renderer::default(),
            surface,
            slice: None,
            scroll_debounce: Debouncer::new(delay),
            resize_debounce: Debouncer::new(delay),
            clip_seconds: settings.clip_seconds(),
        }
    }

    pub fn state(&self) -> &ViewState { &self.state }
    pub fn viewport(&self) -> &Viewport { &self.viewport }
    pub fn surface(&self) -> &S { &self.surface }
    pub fn slice(&self) -> Option<&FeatureSlice> { self.slice.as_ref() }

    /// Hidden -> Loading. False in any other state.
    pub fn activate(&mut self) -> bool {
        if self.state == ViewState::Hidden {
            self.state = ViewState::Loading;
            true
        } else {
            false
        }
    }

    /// Rendered or Failed -> Loading, ahead of binding new data.
    pub fn rebind(&mut self) -> bool {
        match self.state {
            ViewState::Rendered | ViewState::Failed(_) => {
                self.state = ViewState::Loading;
                true
            }
            _ => false,
        }
    }

    /// Attach a loaded slice and draw it.
    ///
    /// Returns `Ok(None)` when the view was destroyed while loading.
    pub fn bind(&mut self, slice: FeatureSlice) -> Result<Option<RenderSummary>, RenderError> {
        if self.state == ViewState::Destroyed {
            debug!("view destroyed during load, discarding {}", slice.audio_url);
            return Ok(None);
        }
        self.slice = Some(slice);
        self.state = ViewState::Loading;
        self.redraw().map(Some)
    }

    pub fn fail(&mut self, err: &FetchError) {
        if self.state != ViewState::Destroyed {
            self.state = ViewState::Failed(err.to_string());
        }
    }

    pub fn destroy(&mut self) {
        self.state = ViewState::Destroyed;
        self.slice = None;
        self.scroll_debounce.cancel();
        self.resize_debounce.cancel();
    }

    pub fn handle(&mut self, event: ViewEvent, now: Instant) -> Result<ViewOutcome, RenderError> {
        if self.state == ViewState::Destroyed {
            return Ok(ViewOutcome::Ignored);
        }
        let rendered = self.state == ViewState::Rendered;
        match event {
            ViewEvent::Scroll { scroll_left } => {
                self.viewport.on_scroll(scroll_left);
                if !rendered {
                    return Ok(ViewOutcome::Ignored);
                }
                self.scroll_debounce.trigger(now);
                Ok(ViewOutcome::Deferred)
            }
            ViewEvent::Resize { width, height } => {
                if !rendered {
                    self.viewport.on_resize(width, height);
                    return Ok(ViewOutcome::Ignored);
                }
                // repositioned from the pan fraction when the timer fires
                self.viewport.set_container_size(width, height);
                self.resize_debounce.trigger(now);
                Ok(ViewOutcome::Deferred)
            }
            ViewEvent::ZoomIn | ViewEvent::ZoomOut | ViewEvent::SetZoom(_) => {
                let changed = match event {
                    ViewEvent::ZoomIn => self.viewport.zoom_in(),
                    ViewEvent::ZoomOut => self.viewport.zoom_out(),
                    ViewEvent::SetZoom(zoom) => self.viewport.set_zoom(zoom),
                    _ => false,
                };
                if changed && rendered {
                    Ok(ViewOutcome::Rendered(self.redraw()?))
                } else {
                    Ok(ViewOutcome::Ignored)
                }
            }
            ViewEvent::Click { pixel_x } => Ok(self
                .playback_at(pixel_x)
                .map_or(ViewOutcome::Ignored, ViewOutcome::Play)),
        }
    }

    /// Run any debounced redraw whose deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Result<Option<RenderSummary>, RenderError> {
        let resized = self.resize_debounce.fire(now);
        let scrolled = self.scroll_debounce.fire(now);
        if !(resized || scrolled) || self.state != ViewState::Rendered {
            return Ok(None);
        }
        self.viewport.layout(resized);
        self.redraw().map(Some)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.scroll_debounce.deadline(), self.resize_debounce.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Clip of audio starting under element pixel `pixel_x`.
    pub fn playback_at(&self, pixel_x: f64) -> Option<PlaybackRequest> {
        if self.state != ViewState::Rendered {
            return None;
        }
        let slice = self.slice.as_ref()?;
        Some(PlaybackRequest {
            audio_url: slice.audio_url.clone(),
            start_seconds: self.viewport.pixel_to_time_seconds(pixel_x, &slice.tensor),
            duration_seconds: self.clip_seconds,
        })
    }

    fn redraw(&mut self) -> Result<RenderSummary, RenderError> {
        let Some(slice) = self.slice.as_ref() else {
            return Err(RenderError::Detached);
        };
        match self.renderer.render(&slice.tensor, &self.viewport, &mut self.surface) {
            Ok(summary) => {
                self.state = ViewState::Rendered;
                Ok(summary)
            }
            Err(err) => {
                self.state = ViewState::Failed(err.to_string());
                Err(err)
            }
        }
    }
}

/// Drive one view to completion.
///
/// Waits for the view to become visible, loads the slice through the
/// shared cache, then redraws in response to `events` until the stream
/// closes or the view is destroyed. Clicks are handed to `on_play`.
pub async fn run_view<S, Src, D, F>(
    view: &mut FeatureView<S>,
    cache: &Arc<ResourceCache<Src, D>>,
    request: &SliceRequest,
    mut visible: VisibleSignal,
    mut events: Subscription,
    mut on_play: F,
) -> Result<(), FetchError>
where
    S: PixelSurface,
    Src: SoundSource + Send + Sync + 'static,
    D: AudioDecoder + Send + Sync + 'static,
    F: FnMut(PlaybackRequest),
{
    if !visible.wait().await {
        debug!("{} never became visible", request.sound_uri);
        return Ok(());
    }
    if !view.activate() && !view.rebind() {
        return Ok(());
    }

    let slice = cache
        .get_slice(&request.sound_uri, &request.feature, request.start_seconds, request.duration_seconds)
        .await;
    match slice {
        Ok(slice) => match view.bind(slice) {
            Ok(Some(summary)) => info!("{} {} bound: {:?}", request.sound_uri, request.feature, summary),
            Ok(None) => return Ok(()),
            Err(err) => warn!("{} {} not drawable: {}", request.sound_uri, request.feature, err),
        },
        Err(err) => {
            error!("{} {}: {}", request.sound_uri, request.feature, err);
            view.fail(&err);
            return Err(err);
        }
    }

    loop {
        let wake = view
            .next_deadline()
            .map(tokio::time::Instant::from_std)
            .unwrap_or_else(|| tokio::time::Instant::now() + Duration::from_secs(3600));
        let outcome = tokio::select! {
            event = events.recv() => match event {
                Some(event) => view.handle(event, Instant::now()),
                None => break,
            },
            _ = tokio::time::sleep_until(wake), if view.next_deadline().is_some() => {
                view.tick(Instant::now()).map(|summary| match summary {
                    Some(summary) => ViewOutcome::Rendered(summary),
                    None => ViewOutcome::Ignored,
                })
            }
        };
        match outcome {
            Ok(ViewOutcome::Play(request)) => on_play(request),
            Ok(_) => {}
            Err(err) => warn!("redraw failed: {}", err),
        }
        if *view.state() == ViewState::Destroyed {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::VarFrameBuf;
    use crate::tensor::TensorView;
    use approx::assert_relative_eq;
    use embedded_graphics::pixelcolor::{Gray8, GrayColor};

    fn settings() -> ViewConfig {
        ViewConfig { width: Some(100), height: Some(20), ..Default::default() }
    }

    fn slice() -> FeatureSlice {
        let base = TensorView::new(vec![0.5; 1000], vec![1000], 0.01, 0.01).unwrap();
        FeatureSlice { tensor: base.time_slice(2.0, 4.0), audio_url: "https://a/low.wav".to_string() }
    }

    fn view() -> FeatureView<VarFrameBuf<Gray8>> {
        FeatureView::new(VarFrameBuf::new(1, 1, Gray8::WHITE), &settings())
    }

    #[test]
    fn test_lifecycle() {
        let mut v = view();
        assert_eq!(*v.state(), ViewState::Hidden);
        assert!(v.activate());
        assert!(!v.activate());
        assert!(v.bind(slice()).unwrap().is_some());
        assert_eq!(*v.state(), ViewState::Rendered);
        assert_eq!(v.surface().dimensions(), (100, 20));
        assert!(v.rebind());
        assert_eq!(*v.state(), ViewState::Loading);
        v.destroy();
        assert!(v.bind(slice()).unwrap().is_none());
        assert_eq!(*v.state(), ViewState::Destroyed);
        assert!(v.slice().is_none());
    }

    #[test]
    fn test_unsupported_rank_fails_view() {
        let mut v = view();
        v.activate();
        let tensor = TensorView::new(vec![0.0; 8], vec![2, 2, 2], 1.0, 1.0).unwrap();
        let err = v.bind(FeatureSlice { tensor, audio_url: String::new() }).unwrap_err();
        assert_eq!(err, RenderError::UnsupportedRank(3));
        assert!(matches!(v.state(), ViewState::Failed(_)));
    }

    #[test]
    fn test_zoom_is_immediate_scroll_is_debounced() {
        let t0 = Instant::now();
        let mut v = view();
        v.activate();
        v.bind(slice()).unwrap();

        let outcome = v.handle(ViewEvent::ZoomIn, t0).unwrap();
        assert!(matches!(outcome, ViewOutcome::Rendered(s) if s.width == 200));
        assert_eq!(v.handle(ViewEvent::SetZoom(2), t0).unwrap(), ViewOutcome::Ignored);

        assert_eq!(v.handle(ViewEvent::Scroll { scroll_left: 50.0 }, t0).unwrap(), ViewOutcome::Deferred);
        assert_eq!(v.handle(ViewEvent::Scroll { scroll_left: 100.0 }, t0 + Duration::from_millis(50)).unwrap(), ViewOutcome::Deferred);
        assert!(v.tick(t0 + Duration::from_millis(120)).unwrap().is_none());
        assert!(v.tick(t0 + Duration::from_millis(150)).unwrap().is_some());
        assert_relative_eq!(v.viewport().pan_offset(), 0.5);
        assert!(v.next_deadline().is_none());
    }

    #[test]
    fn test_resize_redraw_keeps_pan() {
        let t0 = Instant::now();
        let mut v = view();
        v.activate();
        v.bind(slice()).unwrap();
        v.handle(ViewEvent::SetZoom(4), t0).unwrap();
        v.handle(ViewEvent::Scroll { scroll_left: 100.0 }, t0).unwrap();
        v.handle(ViewEvent::Resize { width: 200, height: 30 }, t0).unwrap();
        let summary = v.tick(t0 + Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!((summary.width, summary.height), (800, 30));
        assert_relative_eq!(v.viewport().scroll_left(), 200.0);
    }

    #[test]
    fn test_click_maps_to_absolute_time() {
        let mut v = view();
        assert!(v.playback_at(0.0).is_none());
        v.activate();
        v.bind(slice()).unwrap();
        match v.handle(ViewEvent::Click { pixel_x: 50.0 }, Instant::now()).unwrap() {
            ViewOutcome::Play(request) => {
                assert_eq!(request.audio_url, "https://a/low.wav");
                assert_relative_eq!(request.start_seconds, 4.0, epsilon = 1e-9);
                assert_relative_eq!(request.duration_seconds, 2.5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
