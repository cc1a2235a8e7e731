//! Artwork next to the transferred file: fanart, thumb, poster and
//! extrafanart, with optional corner marks.
//!
//! Download and decoding problems are logged and the image is skipped.
//! Failing to write a file aborts the transfer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat};
use reqwest::Client;
use tracing::{debug, warn};

use crate::metadata::MovieDetail;

use super::config::{Corner, LibraryConfig, WatermarkConfig};
use super::error::TransferError;
use super::filename::MarkKind;
use super::nfo::ArtworkNames;
use super::undo::UndoLog;

/// Poster width as a fraction of the cover height.
const POSTER_ASPECT: f32 = 0.7;

pub struct ArtworkStage {
    client: Client,
    download_images: bool,
    extrafanart: bool,
    watermark: WatermarkConfig,
}

impl ArtworkStage {
    pub fn new(config: &LibraryConfig) -> Result<Self, TransferError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.image_timeout_secs as u64))
            .build()?;
        Ok(Self {
            client,
            download_images: config.download_images,
            extrafanart: config.extrafanart,
            watermark: config.watermark.clone(),
        })
    }

    async fn fetch(&self, url: &str) -> Option<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(url = %url, status = %r.status(), "Image download rejected");
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Image download failed");
                return None;
            }
        };
        match response.bytes().await {
            Ok(bytes) => Some(bytes.to_vec()),
            Err(e) => {
                warn!(url = %url, error = %e, "Image download failed");
                None
            }
        }
    }

    async fn load_marks(&self, kinds: &[MarkKind]) -> Vec<DynamicImage> {
        let Some(dir) = self.watermark.marks_dir.as_ref().filter(|_| self.watermark.enabled)
        else {
            return Vec::new();
        };

        let mut marks = Vec::new();
        for kind in kinds {
            let path = dir.join(format!("{}.png", kind.file_stem()));
            match tokio::fs::read(&path).await {
                Ok(bytes) => match image::load_from_memory(&bytes) {
                    Ok(img) => marks.push(img),
                    Err(e) => warn!(path = %path.display(), error = %e, "Unreadable mark image"),
                },
                Err(e) => warn!(path = %path.display(), error = %e, "Mark image missing"),
            }
        }
        marks
    }

    /// Write `<stem>-fanart.jpg`, `<stem>-thumb.jpg` and `<stem>-poster.jpg`.
    pub async fn write_artwork(
        &self,
        dir: &Path,
        stem: &str,
        detail: &MovieDetail,
        marks: &[MarkKind],
        undo: &mut UndoLog,
    ) -> Result<ArtworkNames, TransferError> {
        let mut names = ArtworkNames::default();
        if !self.download_images {
            return Ok(names);
        }

        let cover = match detail.cover_url.as_deref() {
            Some(url) => self.fetch(url).await,
            None => None,
        };
        let poster = match detail.poster_url.as_deref() {
            Some(url) => self.fetch(url).await,
            None => None,
        };
        let marks = self.load_marks(marks).await;

        if let Some(cover) = cover.clone() {
            if let Some(jpeg) = render(cover, Framing::Full, Vec::new(), &self.watermark).await {
                let name = format!("{}-fanart.jpg", stem);
                undo.write_new(&dir.join(&name), &jpeg).await?;
                names.fanart = Some(name);
            }
        }

        if let Some(cover) = cover.clone() {
            if let Some(jpeg) = render(cover, Framing::Full, marks.clone(), &self.watermark).await {
                let name = format!("{}-thumb.jpg", stem);
                undo.write_new(&dir.join(&name), &jpeg).await?;
                names.thumb = Some(name);
            }
        }

        let poster_jpeg = match (poster, cover) {
            (Some(poster), _) => render(poster, Framing::Full, marks, &self.watermark).await,
            (None, Some(cover)) => {
                render(cover, Framing::PosterCrop, marks, &self.watermark).await
            }
            (None, None) => None,
        };
        if let Some(jpeg) = poster_jpeg {
            let name = format!("{}-poster.jpg", stem);
            undo.write_new(&dir.join(&name), &jpeg).await?;
            names.poster = Some(name);
        }

        debug!(dir = %dir.display(), ?names, "Artwork written");
        Ok(names)
    }

    /// Download preview images into `<dir>/extrafanart/fanartN.jpg`.
    pub async fn write_extrafanart(
        &self,
        dir: &Path,
        detail: &MovieDetail,
        undo: &mut UndoLog,
    ) -> Result<usize, TransferError> {
        if !self.extrafanart || detail.preview_images.is_empty() {
            return Ok(0);
        }

        let target: PathBuf = dir.join("extrafanart");
        let mut written = 0;
        for url in &detail.preview_images {
            let Some(bytes) = self.fetch(url).await else {
                continue;
            };
            if written == 0 {
                undo.create_dir_all(&target).await?;
            }
            written += 1;
            undo.write_new(&target.join(format!("fanart{}.jpg", written)), &bytes)
                .await?;
        }
        Ok(written)
    }
}

#[derive(Debug, Clone, Copy)]
enum Framing {
    Full,
    PosterCrop,
}

/// Decode, frame, mark and encode as JPEG off the async runtime.
async fn render(
    bytes: Vec<u8>,
    framing: Framing,
    marks: Vec<DynamicImage>,
    watermark: &WatermarkConfig,
) -> Option<Vec<u8>> {
    let ratio = watermark.size_ratio;
    let start = watermark.start_corner;

    let result = tokio::task::spawn_blocking(move || {
        let img = image::load_from_memory(&bytes)?;
        let mut img = match framing {
            Framing::Full => img,
            Framing::PosterCrop => crop_poster(&img),
        };
        apply_marks(&mut img, &marks, ratio, start);
        to_jpeg(&img)
    })
    .await;

    match result {
        Ok(Ok(jpeg)) => Some(jpeg),
        Ok(Err(e)) => {
            warn!(error = %e, "Image processing failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "Image task failed");
            None
        }
    }
}

/// Right-hand part of a landscape cover, sized as a portrait poster.
pub fn crop_poster(cover: &DynamicImage) -> DynamicImage {
    let (width, height) = cover.dimensions();
    let poster_width = ((height as f32 * POSTER_ASPECT).round() as u32).clamp(1, width.max(1));
    cover.crop_imm(width - poster_width.min(width), 0, poster_width, height)
}

/// Top-left position of a mark placed in `corner`.
pub fn corner_origin(corner: Corner, base: (u32, u32), mark: (u32, u32)) -> (i64, i64) {
    let right = base.0.saturating_sub(mark.0) as i64;
    let bottom = base.1.saturating_sub(mark.1) as i64;
    match corner {
        Corner::TopLeft => (0, 0),
        Corner::TopRight => (right, 0),
        Corner::BottomRight => (right, bottom),
        Corner::BottomLeft => (0, bottom),
    }
}

/// Overlay up to four marks, one per corner, clockwise from `start`.
pub fn apply_marks(base: &mut DynamicImage, marks: &[DynamicImage], ratio: f32, start: Corner) {
    let (width, height) = base.dimensions();
    let target_height = ((height as f32 * ratio).round() as u32).max(1);

    let mut corner = start;
    for mark in marks.iter().take(4) {
        let (mark_w, mark_h) = mark.dimensions();
        if mark_w == 0 || mark_h == 0 {
            continue;
        }
        let target_width = ((mark_w as u64 * target_height as u64) / mark_h as u64).max(1) as u32;
        let scaled = mark.resize_exact(target_width.min(width), target_height, FilterType::Triangle);

        let (x, y) = corner_origin(corner, (width, height), scaled.dimensions());
        imageops::overlay(base, &scaled, x, y);
        corner = corner.next();
    }
}

fn to_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img.to_rgb8()).write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}
