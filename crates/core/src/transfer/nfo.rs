//! Kodi/Jellyfin `<movie>` NFO sidecar.

use serde::Serialize;

use crate::metadata::MovieDetail;

use super::filename::FileAttributes;

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[derive(Debug, Serialize)]
struct NfoActor {
    name: String,
}

#[derive(Debug, Serialize)]
struct NfoSet {
    name: String,
}

#[derive(Debug, Serialize)]
struct NfoUniqueId {
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "$text")]
    value: String,
}

#[derive(Debug, Serialize)]
struct NfoMovie {
    title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    originaltitle: String,
    sorttitle: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    plot: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    outline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    runtime: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    premiered: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    releasedate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    director: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    studio: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    set: Option<NfoSet>,
    genre: Vec<String>,
    tag: Vec<String>,
    actor: Vec<NfoActor>,
    num: String,
    uniqueid: NfoUniqueId,
    #[serde(skip_serializing_if = "Option::is_none")]
    poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thumb: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fanart: Option<String>,
}

/// File names of artwork written next to the video, referenced from the NFO.
#[derive(Debug, Clone, Default)]
pub struct ArtworkNames {
    pub poster: Option<String>,
    pub thumb: Option<String>,
    pub fanart: Option<String>,
}

/// Render the NFO document.
///
/// `detail` carries the translated text, `original_title` the untranslated
/// title and `title` the expanded NFO title rule.
pub fn render_nfo(
    detail: &MovieDetail,
    title: &str,
    original_title: &str,
    code: &str,
    attrs: &FileAttributes,
    artwork: &ArtworkNames,
) -> Result<String, String> {
    let number = if detail.number.is_empty() {
        code.to_string()
    } else {
        detail.number.clone()
    };

    let mut tags: Vec<String> = attrs.tags().into_iter().map(str::to_string).collect();
    if !detail.series.is_empty() {
        tags.push(detail.series.clone());
    }

    let movie = NfoMovie {
        title: title.to_string(),
        originaltitle: if original_title != detail.title {
            original_title.to_string()
        } else {
            String::new()
        },
        sorttitle: number.clone(),
        plot: detail.summary.clone(),
        outline: detail.summary.clone(),
        runtime: (detail.runtime > 0).then_some(detail.runtime),
        rating: (detail.score > 0.0).then_some(detail.score),
        premiered: detail.release_date.clone(),
        releasedate: detail.release_date.clone(),
        year: detail.year().map(str::to_string),
        director: detail.director.clone(),
        studio: detail.maker.clone(),
        label: detail.label.clone(),
        set: (!detail.series.is_empty()).then(|| NfoSet {
            name: detail.series.clone(),
        }),
        genre: detail.genres.clone(),
        tag: tags,
        actor: detail
            .actors
            .iter()
            .map(|name| NfoActor { name: name.clone() })
            .collect(),
        num: number.clone(),
        uniqueid: NfoUniqueId {
            kind: "num".to_string(),
            value: number,
        },
        poster: artwork.poster.clone(),
        thumb: artwork.thumb.clone(),
        fanart: artwork.fanart.clone(),
    };

    let body = quick_xml::se::to_string_with_root("movie", &movie).map_err(|e| e.to_string())?;
    Ok(format!("{}\n{}\n", XML_HEADER, body))
}
