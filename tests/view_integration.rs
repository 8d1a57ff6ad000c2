/*
 *  tests/view_integration.rs
 *
 *  End-to-end: blob -> cache -> slice -> view -> pixels
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 */

use cochlea_view::PixelSurface;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cochlea_view::api::{Annotation, Page, Sound, SoundSource};
use cochlea_view::audio::WavDecoder;
use cochlea_view::cache::{Feature, ResourceCache};
use cochlea_view::codec::{encode, TimeEncoding};
use cochlea_view::config::{CacheConfig, ViewConfig};
use cochlea_view::events::{EventHub, ViewEvent};
use cochlea_view::render::VarFrameBuf;
use cochlea_view::session::{run_view, FeatureView, PlaybackRequest, SliceRequest, ViewState};
use cochlea_view::tensor::{FeatureMetadata, TensorView};
use cochlea_view::visibility::{Rect, VisibilityGate};
use embedded_graphics::pixelcolor::{Gray8, GrayColor};

const WIDTH: u32 = 100;
const HEIGHT: u32 = 20;

/// Serves one sound with a rank-2 "spectrogram" blob and a rank-3 "cube" blob.
#[derive(Default)]
struct Fixture {
    sound_calls: AtomicUsize,
    blob_calls: AtomicUsize,
}

fn spectrogram_blob() -> Vec<u8> {
    let mut data = vec![0.0f32; 100 * 20];
    data[0] = 1.0;
    let t = TensorView::new(data, vec![100, 20], 0.05, 0.05)
        .unwrap()
        .with_metadata(FeatureMetadata { max_value: 2.0, min_value: None });
    encode(&t, TimeEncoding::Seconds)
}

fn cube_blob() -> Vec<u8> {
    let t = TensorView::new(vec![0.5f32; 4 * 2 * 2], vec![4, 2, 2], 0.5, 0.5).unwrap();
    encode(&t, TimeEncoding::Seconds)
}

impl SoundSource for Fixture {
    async fn get_sound(&self, sound_uri: &str) -> Result<Sound, cochlea_view::FetchError> {
        self.sound_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(Sound {
            id: sound_uri.trim_start_matches("/sounds/").to_string(),
            audio_url: Some("https://audio.example.com/s1.wav".to_string()),
            low_quality_audio_url: None,
            duration_seconds: Some(5.0),
            info_url: None,
        })
    }

    async fn get_feature_annotations(
        &self,
        sound_id: &str,
        bot_id: &str,
    ) -> Result<Page<Annotation>, cochlea_view::FetchError> {
        Ok(Page {
            items: vec![Annotation {
                id: Some("a1".to_string()),
                sound: format!("/sounds/{sound_id}"),
                start_seconds: 0.0,
                duration_seconds: 5.0,
                end_seconds: Some(5.0),
                data_url: Some(format!("https://blobs.example.com/{bot_id}")),
                tags: vec![],
                created_by: Some(bot_id.to_string()),
            }],
            total_count: Some(1),
            next: None,
        })
    }

    async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>, cochlea_view::FetchError> {
        self.blob_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        match url.rsplit('/').next() {
            Some("spectrogram") => Ok(spectrogram_blob()),
            Some("cube") => Ok(cube_blob()),
            _ => Err(cochlea_view::FetchError::Status { url: url.to_string(), status: 404 }),
        }
    }
}

fn settings() -> ViewConfig {
    ViewConfig { width: Some(WIDTH), height: Some(HEIGHT), debounce_ms: Some(20), ..Default::default() }
}

fn new_view() -> FeatureView<VarFrameBuf<Gray8>> {
    FeatureView::new(VarFrameBuf::new(1, 1, Gray8::new(42)), &settings())
}

fn request(feature: &str) -> SliceRequest {
    SliceRequest {
        sound_uri: "/sounds/s1".to_string(),
        feature: Feature::parse(feature),
        start_seconds: 0.0,
        duration_seconds: f64::INFINITY,
    }
}

fn window() -> Rect {
    Rect::new(0.0, 0.0, 1024.0, 768.0)
}

#[tokio::test]
async fn test_heatmap_pixel_end_to_end() {
    let cache = Arc::new(ResourceCache::new(Fixture::default(), WavDecoder, &CacheConfig::default()));
    let hub = EventHub::new();
    let (gate, signal) = VisibilityGate::new(Rect::new(0.0, 100.0, WIDTH as f64, HEIGHT as f64));
    let mut view = new_view();
    let plays = RefCell::new(Vec::<PlaybackRequest>::new());
    let req = request("spectrogram");

    let events = hub.subscribe();
    let driver = async {
        assert!(gate.check(&window()));
        tokio::time::sleep(Duration::from_millis(30)).await;
        hub.publish(ViewEvent::Click { pixel_x: 50.0 });
        hub.publish(ViewEvent::Scroll { scroll_left: 0.0 });
        tokio::time::sleep(Duration::from_millis(80)).await;
        hub.close();
    };
    let (result, ()) = tokio::join!(
        run_view(&mut view, &cache, &req, signal, events, |p| plays.borrow_mut().push(p)),
        driver
    );
    result.unwrap();

    assert_eq!(*view.state(), ViewState::Rendered);
    assert_eq!(view.surface().dimensions(), (WIDTH, HEIGHT));
    // feature 0 of frame 0 is 1.0 against max 2.0: mid gray in the bottom-left corner
    assert_eq!(view.surface().pixel(0, HEIGHT - 1), Some(Gray8::new(128)));
    assert_eq!(view.surface().pixel(0, 0), Some(Gray8::BLACK));

    let plays = plays.into_inner();
    assert_eq!(plays.len(), 1);
    assert_eq!(plays[0].audio_url, "https://audio.example.com/s1.wav");
    assert!((plays[0].start_seconds - 2.5).abs() < 1e-9);
    assert!((plays[0].duration_seconds - 2.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_two_views_share_one_fetch() {
    let cache = Arc::new(ResourceCache::new(Fixture::default(), WavDecoder, &CacheConfig::default()));
    let hub = EventHub::new();
    let (gate_a, signal_a) = VisibilityGate::new(window());
    let (gate_b, signal_b) = VisibilityGate::new(window());
    let (mut view_a, mut view_b) = (new_view(), new_view());
    let req = request("spectrogram");

    let (events_a, events_b) = (hub.subscribe(), hub.subscribe());
    let driver = async {
        gate_a.check(&window());
        gate_b.check(&window());
        tokio::time::sleep(Duration::from_millis(30)).await;
        hub.close();
    };
    let (a, b, ()) = tokio::join!(
        run_view(&mut view_a, &cache, &req, signal_a, events_a, |_| {}),
        run_view(&mut view_b, &cache, &req, signal_b, events_b, |_| {}),
        driver
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(cache.source().sound_calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.source().blob_calls.load(Ordering::SeqCst), 1);
    let (sa, sb) = (view_a.slice().unwrap(), view_b.slice().unwrap());
    assert!(sa.tensor.shares_storage_with(&sb.tensor));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_rank3_blob_leaves_surface_untouched() {
    let cache = Arc::new(ResourceCache::new(Fixture::default(), WavDecoder, &CacheConfig::default()));
    let hub = EventHub::new();
    let (gate, signal) = VisibilityGate::new(window());
    let mut view = new_view();
    let req = request("cube");

    let events = hub.subscribe();
    gate.check(&window());
    hub.close();
    run_view(&mut view, &cache, &req, signal, events, |_| {}).await.unwrap();

    assert!(matches!(view.state(), ViewState::Failed(_)));
    assert_eq!(view.surface().dimensions(), (1, 1));
    assert_eq!(view.surface().pixel(0, 0), Some(Gray8::new(42)));
}

#[tokio::test]
async fn test_view_never_shown_never_loads() {
    let cache = Arc::new(ResourceCache::new(Fixture::default(), WavDecoder, &CacheConfig::default()));
    let hub = EventHub::new();
    let (gate, signal) = VisibilityGate::new(Rect::new(0.0, 5000.0, 100.0, 20.0));
    let mut view = new_view();

    assert!(!gate.check(&window()));
    drop(gate);
    run_view(&mut view, &cache, &request("spectrogram"), signal, hub.subscribe(), |_| {})
        .await
        .unwrap();

    assert_eq!(*view.state(), ViewState::Hidden);
    assert_eq!(cache.source().sound_calls.load(Ordering::SeqCst), 0);
    assert_eq!(hub.listener_count(), 0);
}

#[tokio::test]
async fn test_missing_blob_fails_view() {
    let cache = Arc::new(ResourceCache::new(Fixture::default(), WavDecoder, &CacheConfig::default()));
    let hub = EventHub::new();
    let (gate, signal) = VisibilityGate::new(window());
    let mut view = new_view();

    gate.check(&window());
    let err = run_view(&mut view, &cache, &request("onsets"), signal, hub.subscribe(), |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, cochlea_view::FetchError::Status { status: 404, .. }));
    assert!(matches!(view.state(), ViewState::Failed(_)));
    assert!(cache.is_empty());
}
