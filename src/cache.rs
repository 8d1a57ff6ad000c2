/*
 *  cache.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Deduplicating feature cache keyed by (sound, feature)
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

use log::{debug, info, warn};
use mini_moka::sync::Cache;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::api::{Sound, SoundSource};
use crate::audio::{AudioDecoder, DecodedAudio};
use crate::codec;
use crate::config::{CacheConfig, DEFAULT_AUDIO_CAPACITY};
use crate::error::FetchError;
use crate::tensor::TensorView;

pub const AUDIO_FEATURE: &str = "audio";

/// Which representation of a sound to load.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Feature {
    /// decoded playback audio, one sample per step
    Audio,
    /// blob produced by the named feature bot
    Bot(String),
}

impl Feature {
    pub fn parse(name: &str) -> Self {
        if name == AUDIO_FEATURE { Feature::Audio } else { Feature::Bot(name.to_string()) }
    }

    pub fn name(&self) -> &str {
        match self {
            Feature::Audio => AUDIO_FEATURE,
            Feature::Bot(id) => id,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub sound_uri: String,
    pub feature: Feature,
}

impl ResourceKey {
    pub fn new(sound_uri: impl Into<String>, feature: Feature) -> Self {
        Self { sound_uri: sound_uri.into(), feature }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.sound_uri, self.feature)
    }
}

/// A fully loaded feature tensor plus what playback needs.
#[derive(Debug, Clone)]
pub struct ResolvedFeature {
    pub tensor: TensorView,
    pub audio_url: String,
    pub sound: Sound,
}

/// What a view binds: a time window of a feature and where its audio lives.
#[derive(Debug, Clone)]
pub struct FeatureSlice {
    pub tensor: TensorView,
    pub audio_url: String,
}

/// Non-blocking look at a cache entry.
#[derive(Debug, Clone)]
pub enum Availability<T> {
    Absent,
    Pending,
    Ready(T),
    Failed(FetchError),
}

type Outcome<T> = Option<Result<T, FetchError>>;

/// Receiving end of a load running on its own task.
///
/// Waiters may come and go; dropping one never cancels the load.
#[derive(Debug)]
struct InFlight<T> {
    rx: watch::Receiver<Outcome<T>>,
}

impl<T> Clone for InFlight<T> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

impl<T: Clone> InFlight<T> {
    fn channel() -> (watch::Sender<Outcome<T>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { rx })
    }

    fn state(&self) -> Outcome<T> {
        self.rx.borrow().clone()
    }

    fn same(&self, other: &InFlight<T>) -> bool {
        self.rx.same_channel(&other.rx)
    }

    async fn wait(&self) -> Result<T, FetchError> {
        let mut rx = self.rx.clone();
        match rx.wait_for(Option::is_some).await.map(|ready| (*ready).clone()) {
            Ok(Some(outcome)) => outcome,
            // sender dropped unpublished: the load task panicked or the runtime shut down
            _ => Err(FetchError::Abandoned),
        }
    }
}

/// Every consumer asking for the same (sound, feature) shares one fetch
/// and one decoded buffer.
///
/// Loads run on spawned tasks, so a caller that stops waiting (timeout,
/// dropped view) leaves the load running for everyone else. Failed loads
/// are evicted before the error is published, so the next request
/// retries. Decoded audio is memoised by URL the same way, in-flight
/// decodes included, so playback excerpts never refetch.
pub struct ResourceCache<S, D> {
    source: S,
    decoder: D,
    entries: Mutex<HashMap<ResourceKey, InFlight<ResolvedFeature>>>,
    audio: Cache<String, InFlight<Arc<DecodedAudio>>>,
    // serialises get-then-insert on `audio`
    audio_lock: Mutex<()>,
}

impl<S, D> ResourceCache<S, D>
where
    S: SoundSource + Send + Sync + 'static,
    D: AudioDecoder + Send + Sync + 'static,
{
    pub fn new(source: S, decoder: D, config: &CacheConfig) -> Self {
        let capacity = config.audio_capacity.unwrap_or(DEFAULT_AUDIO_CAPACITY);
        Self {
            source,
            decoder,
            entries: Mutex::new(HashMap::new()),
            audio: Cache::new(capacity),
            audio_lock: Mutex::new(()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<ResourceKey, InFlight<ResolvedFeature>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Load (or join the in-flight load of) the whole feature for `key`.
    pub async fn resolve(self: &Arc<Self>, key: &ResourceKey) -> Result<ResolvedFeature, FetchError> {
        let load = {
            let mut entries = self.lock_entries();
            match entries.get(key) {
                Some(load) => load.clone(),
                None => {
                    debug!("cache miss: {}", key);
                    let (tx, load) = InFlight::channel();
                    entries.insert(key.clone(), load.clone());
                    self.spawn_resolve(key.clone(), tx, load.clone());
                    load
                }
            }
        };
        load.wait().await
    }

    fn spawn_resolve(
        self: &Arc<Self>,
        key: ResourceKey,
        tx: watch::Sender<Outcome<ResolvedFeature>>,
        load: InFlight<ResolvedFeature>,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.fetch(&key).await;
            if let Err(err) = &outcome {
                warn!("{} failed: {}", key, err);
                let mut entries = this.lock_entries();
                // an evict-and-retry may already have replaced the slot
                if entries.get(&key).is_some_and(|current| current.same(&load)) {
                    entries.remove(&key);
                }
            }
            tx.send_replace(Some(outcome));
        });
    }

    /// Time window of a feature, sharing the cached buffer.
    pub async fn get_slice(
        self: &Arc<Self>,
        sound_uri: &str,
        feature: &Feature,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> Result<FeatureSlice, FetchError> {
        let key = ResourceKey::new(sound_uri, feature.clone());
        let resolved = self.resolve(&key).await?;
        Ok(FeatureSlice {
            tensor: resolved.tensor.time_slice(start_seconds, duration_seconds),
            audio_url: resolved.audio_url,
        })
    }

    pub fn peek(&self, key: &ResourceKey) -> Availability<ResolvedFeature> {
        let entries = self.lock_entries();
        match entries.get(key).map(InFlight::state) {
            None => Availability::Absent,
            Some(None) => Availability::Pending,
            Some(Some(Ok(resolved))) => Availability::Ready(resolved),
            Some(Some(Err(err))) => Availability::Failed(err),
        }
    }

    /// Drop an entry; in-flight waiters still receive their result.
    pub fn evict(&self, key: &ResourceKey) -> bool {
        self.lock_entries().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decoded audio for `url`, fetched at most once while it stays cached.
    pub async fn decoded_audio(self: &Arc<Self>, url: &str) -> Result<Arc<DecodedAudio>, FetchError> {
        let key = url.to_string();
        let load = {
            let _guard = self.audio_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            match self.audio.get(&key) {
                Some(load) => {
                    debug!("audio hit: {}", url);
                    load
                }
                None => {
                    let (tx, load) = InFlight::channel();
                    self.audio.insert(key.clone(), load.clone());
                    self.spawn_audio(key, tx, load.clone());
                    load
                }
            }
        };
        load.wait().await
    }

    fn spawn_audio(
        self: &Arc<Self>,
        url: String,
        tx: watch::Sender<Outcome<Arc<DecodedAudio>>>,
        load: InFlight<Arc<DecodedAudio>>,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.load_audio(&url).await;
            if let Err(err) = &outcome {
                warn!("audio {} failed: {}", url, err);
                let _guard = this.audio_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if this.audio.get(&url).is_some_and(|current| current.same(&load)) {
                    this.audio.invalidate(&url);
                }
            }
            tx.send_replace(Some(outcome));
        });
    }

    async fn load_audio(self: &Arc<Self>, url: &str) -> Result<Arc<DecodedAudio>, FetchError> {
        let bytes = self.source.fetch_binary(url).await?;
        let this = Arc::clone(self);
        let audio = tokio::task::spawn_blocking(move || this.decoder.decode(&bytes))
            .await
            .map_err(|e| FetchError::Audio(format!("decoder task failed: {e}")))??;
        info!(
            "decoded {} ({:.2}s @ {} Hz)",
            url,
            audio.duration_seconds(),
            audio.sample_rate
        );
        Ok(Arc::new(audio))
    }

    /// First channel of `url` between `start_seconds` and `+duration_seconds`.
    pub async fn playback_excerpt(
        self: &Arc<Self>,
        url: &str,
        start_seconds: f64,
        duration_seconds: f64,
    ) -> Result<TensorView, FetchError> {
        let audio = self.decoded_audio(url).await?;
        Ok(audio.channel_tensor(0)?.time_slice(start_seconds, duration_seconds))
    }

    async fn fetch(self: &Arc<Self>, key: &ResourceKey) -> Result<ResolvedFeature, FetchError> {
        info!("loading {}", key);
        let sound = self.source.get_sound(&key.sound_uri).await?;
        let audio_url = sound
            .playback_url()
            .ok_or_else(|| FetchError::MissingAudioUrl(key.sound_uri.clone()))?
            .to_string();

        let tensor = match &key.feature {
            Feature::Audio => self.decoded_audio(&audio_url).await?.channel_tensor(0)?,
            Feature::Bot(bot_id) => {
                let page = self.source.get_feature_annotations(&sound.id, bot_id).await?;
                let data_url = page
                    .items
                    .into_iter()
                    .find_map(|annotation| annotation.data_url)
                    .ok_or_else(|| FetchError::MissingFeature {
                        sound_id: sound.id.clone(),
                        feature: bot_id.clone(),
                    })?;
                let bytes = self.source.fetch_binary(&data_url).await?;
                codec::decode(&bytes)?
            }
        };
        debug!("{} resolved: dims {:?}", key, tensor.dimensions());
        Ok(ResolvedFeature { tensor, audio_url, sound })
    }
}
