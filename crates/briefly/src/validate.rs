//! Input validation and natural-key derivation.
//!
//! Everything here is pure: no I/O, no collaborator calls. A rejected input
//! never reaches the content store.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::error::ValidationError;
use crate::stages::ArtifactKind;

static RE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").unwrap());
static RE_PLAYLIST_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{10,64}$").unwrap());

/// Largest upload accepted when no limit is configured.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 << 20;

/// A link that passed validation, normalized to its canonical identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLink {
    Video { video_id: String, link: String },
    Playlist { playlist_id: String, link: String },
}

impl MediaLink {
    pub fn link(&self) -> &str {
        match self {
            MediaLink::Video { link, .. } | MediaLink::Playlist { link, .. } => link,
        }
    }
}

/// Canonical watch URL for a video id.
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn parse_url(link: &str) -> Result<Url, ValidationError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(ValidationError::EmptyLink);
    }
    Url::parse(link).map_err(|e| ValidationError::InvalidUrl(e.to_string()))
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Extracts the canonical video id from a YouTube video URL.
///
/// Accepts `youtu.be/<id>`, `youtube.com/watch?v=<id>` and
/// `youtube.com/shorts/<id>`.
pub fn validate_video_url(link: &str) -> Result<String, ValidationError> {
    let url = parse_url(link)?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();

    if host == "youtu.be" {
        let id = url.path().trim_start_matches('/');
        return if RE_VIDEO_ID.is_match(id) {
            Ok(id.to_string())
        } else {
            Err(ValidationError::InvalidVideoId)
        };
    }

    if host == "youtube.com" || host.ends_with(".youtube.com") {
        if let Some(v) = query_param(&url, "v") {
            if RE_VIDEO_ID.is_match(&v) {
                return Ok(v);
            }
        }
        if let Some(id) = url.path().strip_prefix("/shorts/") {
            let id = id.trim_end_matches('/');
            if RE_VIDEO_ID.is_match(id) {
                return Ok(id.to_string());
            }
        }
        return Err(ValidationError::InvalidVideoId);
    }

    Err(ValidationError::NotYoutube)
}

/// Classifies a submitted link as a single video or a playlist.
///
/// A link carrying both `v=` and `list=` is treated as the single video.
pub fn parse_media_link(link: &str) -> Result<MediaLink, ValidationError> {
    let url = parse_url(link)?;
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let is_youtube = host == "youtube.com" || host.ends_with(".youtube.com");

    if is_youtube && query_param(&url, "v").is_none() {
        if let Some(list) = query_param(&url, "list") {
            return if RE_PLAYLIST_ID.is_match(&list) {
                Ok(MediaLink::Playlist {
                    playlist_id: list,
                    link: link.trim().to_string(),
                })
            } else {
                Err(ValidationError::InvalidUrl("invalid playlist id".to_string()))
            };
        }
    }

    let video_id = validate_video_url(link)?;
    Ok(MediaLink::Video {
        video_id,
        link: link.trim().to_string(),
    })
}

/// Lenient id extraction used for playlist entries: `None` means skip.
pub fn video_id_from_link(link: &str) -> Option<String> {
    validate_video_url(link).ok()
}

/// An uploaded file as received from the caller.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    /// Declared content type; empty means "guess from the filename".
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// An upload that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub filename: String,
    pub mime_type: String,
    pub extension: String,
    pub kind: ArtifactKind,
    /// Hex SHA-256 of the bytes; the natural key.
    pub file_hash: String,
    pub size: u64,
}

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "audio/mpeg",
    "audio/wav",
    "audio/x-wav",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
];

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "mp3", "wav", "m4a"];

/// Checks type, extension and size of an upload and derives its content hash.
pub fn validate_upload(upload: &Upload, max_bytes: u64) -> Result<ValidatedUpload, ValidationError> {
    let extension = Path::new(&upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let mime_type = if upload.content_type.trim().is_empty() {
        mime_guess::from_path(&upload.filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_default()
    } else {
        // Drop parameters such as `; charset=utf-8`.
        upload
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
    };

    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(ValidationError::UnsupportedMimeType(mime_type));
    }
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::UnsupportedExtension(format!(".{}", extension)));
    }

    let size = upload.bytes.len() as u64;
    if size == 0 {
        return Err(ValidationError::EmptyUpload);
    }
    if size > max_bytes {
        return Err(ValidationError::UploadTooLarge {
            size,
            limit: max_bytes,
        });
    }

    let kind = match extension.as_str() {
        "pdf" => ArtifactKind::Pdf,
        "txt" => ArtifactKind::Text,
        _ => ArtifactKind::Audio,
    };

    Ok(ValidatedUpload {
        filename: upload.filename.clone(),
        mime_type,
        extension,
        kind,
        file_hash: content_hash(&upload.bytes),
        size,
    })
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
