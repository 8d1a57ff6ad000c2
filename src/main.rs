/*
 *  main.rs
 *
 *  cochlea-view - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Command line front end: render, inspect, annotations, clip
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

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser};
use env_logger::Env;
use log::{debug, info};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use cochlea_view::api::{ApiClient, SoundSource};
use cochlea_view::audio::{write_excerpt, WavDecoder};
use cochlea_view::cache::{Feature, ResourceCache};
use cochlea_view::codec;
use cochlea_view::config::{self, Cli, Command, Config};
use cochlea_view::render::{Canvas, Renderer};
use cochlea_view::viewport::Viewport;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

type Cache = ResourceCache<ApiClient, WavDecoder>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli).context("loading configuration")?;

    let level = cfg.log_level.clone().unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();

    info!("This {} worth the Squeeze", env!("CARGO_PKG_NAME"));
    info!("v.{} built {}", env!("CARGO_PKG_VERSION"), BUILD_DATE);

    if cli.dump_config {
        print!("{}", config::dump(&cfg)?);
        return Ok(());
    }

    match cli.command.clone() {
        Some(Command::Render { sound, feature, start, duration, zoom, pan, out }) => {
            let cache = cache(&cfg)?;
            let feature = Feature::parse(&feature);
            let slice = cache
                .get_slice(&sound, &feature, start, duration.unwrap_or(f64::INFINITY))
                .await
                .with_context(|| format!("loading {feature} for {sound}"))?;

            let view = cfg.view.clone().unwrap_or_default();
            let mut viewport = Viewport::new(view.width(), view.height());
            viewport.set_zoom(zoom.unwrap_or(view.zoom()));
            viewport.set_pan_offset(pan);

            let mut canvas = Canvas::new(view.depth(), view.width(), view.height());
            let summary = canvas.render(&Renderer::default(), &slice.tensor, &viewport)?;
            let (from, to) = viewport.visible_time_range(&slice.tensor);
            info!("{:?} {:.2}s..{:.2}s -> {}", summary.projection, from, to, out.display());
            fs::write(&out, canvas.to_pgm()).with_context(|| format!("writing {}", out.display()))?;
        }
        Some(Command::Inspect { blob }) => inspect(&blob)?,
        Some(Command::Annotations { tags }) => {
            let client = ApiClient::new(&cfg.api.clone().unwrap_or_default())?;
            let page = client.get_annotations(&tags).await?;
            for a in &page.items {
                println!(
                    "{}\t{:.3}\t{:.3}\t{}\t{}",
                    a.sound,
                    a.start_seconds,
                    a.duration_seconds,
                    a.tags.join(","),
                    a.data_url.as_deref().unwrap_or("-")
                );
            }
            info!("{} of {} annotations", page.items.len(), page.total_count.unwrap_or(page.items.len() as u64));
        }
        Some(Command::Clip { sound, start, duration, out }) => {
            let cache = cache(&cfg)?;
            let record = cache.source().get_sound(&sound).await?;
            let Some(url) = record.playback_url() else {
                bail!("{sound} has no audio");
            };
            let clip_seconds = duration.unwrap_or_else(|| cfg.view.clone().unwrap_or_default().clip_seconds());
            let excerpt = cache.playback_excerpt(url, start, clip_seconds).await?;
            write_excerpt(&excerpt, &out)?;
            info!("{:.2}s from {} -> {}", excerpt.duration_seconds(), url, out.display());
        }
        None => {
            Cli::command().print_help()?;
        }
    }
    Ok(())
}

fn cache(cfg: &Config) -> anyhow::Result<Arc<Cache>> {
    let client = ApiClient::new(&cfg.api.clone().unwrap_or_default())?;
    debug!("api host {}", client.build_uri("/"));
    Ok(Arc::new(ResourceCache::new(client, WavDecoder, &cfg.cache.clone().unwrap_or_default())))
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let tensor = codec::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    println!("dimensions      {:?}", tensor.dimensions());
    println!("sample interval {}s", tensor.sample_interval());
    println!("sample window   {}s", tensor.sample_window());
    println!("duration        {:.3}s", tensor.duration_seconds());
    println!("max value       {}", tensor.metadata().max_value);
    if let Some(min) = tensor.metadata().min_value {
        println!("min value       {}", min);
    }
    Ok(())
}
