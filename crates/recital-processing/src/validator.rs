use recital_core::MediaKind;
use std::path::Path;

const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "m4a", "aac", "ogg", "wma"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "m4v", "webm"];

/// Validation errors for uploaded recordings and analysis requests
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    EmptyFile,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Unsupported media: content type {content_type:?}, extension {extension:?}")]
    UnsupportedMediaKind {
        content_type: Option<String>,
        extension: Option<String>,
    },

    #[error("Invalid audio URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),
}

/// Media file validator
///
/// Checks the declared size against the upload ceiling and decides whether a
/// payload is audio or video. Nothing here touches the network or an encoder.
#[derive(Debug, Clone)]
pub struct MediaValidator {
    max_file_size: u64,
}

impl MediaValidator {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Validate file size
    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    /// Client filenames are only used for their extension, but reject ones
    /// that could never be a plain file name.
    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        if filename.trim().is_empty()
            || filename.contains('/')
            || filename.contains('\\')
            || filename.contains("..")
            || filename.contains('\0')
        {
            return Err(ValidationError::InvalidFilename(filename.to_string()));
        }
        Ok(())
    }

    /// Decide the media kind from, in order, the declared content type, the
    /// filename extension and the leading bytes of the payload.
    pub fn detect_kind(
        &self,
        content_type: Option<&str>,
        filename: Option<&str>,
        head: &[u8],
    ) -> Result<MediaKind, ValidationError> {
        if let Some(kind) = content_type.and_then(kind_from_content_type) {
            return Ok(kind);
        }

        let extension = filename.and_then(extension_of);
        if let Some(kind) = extension.as_deref().and_then(kind_from_extension) {
            return Ok(kind);
        }

        if let Some(kind) = sniff_kind(head) {
            return Ok(kind);
        }

        Err(ValidationError::UnsupportedMediaKind {
            content_type: content_type.map(str::to_string),
            extension,
        })
    }

    /// Only `http` and `https` URLs with a host are fetched.
    pub fn validate_audio_url(&self, url: &str) -> Result<(), ValidationError> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))
            .ok_or_else(|| ValidationError::InvalidUrl(url.to_string()))?;
        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() || url.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }

    /// Language hints look like `en`, `zh` or `pt-BR`.
    pub fn validate_language(&self, language: &str) -> Result<(), ValidationError> {
        let valid = (2..=8).contains(&language.len())
            && language.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
        if !valid {
            return Err(ValidationError::InvalidLanguage(language.to_string()));
        }
        Ok(())
    }
}

/// Lowercased extension of a filename, without the dot.
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn kind_from_content_type(content_type: &str) -> Option<MediaKind> {
    let normalized = content_type.trim().to_lowercase();
    if normalized.starts_with("audio/") {
        Some(MediaKind::Audio)
    } else if normalized.starts_with("video/") {
        Some(MediaKind::Video)
    } else {
        None
    }
}

fn kind_from_extension(extension: &str) -> Option<MediaKind> {
    if AUDIO_EXTENSIONS.contains(&extension) {
        Some(MediaKind::Audio)
    } else if VIDEO_EXTENSIONS.contains(&extension) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Container signature detection over the first bytes of a payload.
pub fn sniff_kind(head: &[u8]) -> Option<MediaKind> {
    if head.len() < 4 {
        return None;
    }

    // MP3 with an ID3 tag, or a bare MPEG audio frame sync
    if head.starts_with(b"ID3") || (head[0] == 0xFF && matches!(head[1], 0xFB | 0xF3 | 0xF2)) {
        return Some(MediaKind::Audio);
    }
    if head.starts_with(b"fLaC") || head.starts_with(b"OggS") {
        return Some(MediaKind::Audio);
    }
    // Matroska / WebM
    if head.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some(MediaKind::Video);
    }

    if head.len() >= 12 {
        if head.starts_with(b"RIFF") {
            return match &head[8..12] {
                b"WAVE" => Some(MediaKind::Audio),
                b"AVI " => Some(MediaKind::Video),
                _ => None,
            };
        }
        // ISO base media: audio-only brands, everything else is treated as video
        if &head[4..8] == b"ftyp" {
            let brands = &head[8..head.len().min(20)];
            let audio_brand = brands.windows(3).any(|w| w == b"M4A")
                || brands.windows(4).any(|w| w == b"mp41");
            return Some(if audio_brand {
                MediaKind::Audio
            } else {
                MediaKind::Video
            });
        }
    }

    if head.len() >= 8 && matches!(&head[4..8], b"moov" | b"mdat") {
        return Some(MediaKind::Video);
    }

    None
}
