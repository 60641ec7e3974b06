//! Logo loading. A missing or broken logo never fails a render: the header
//! falls back to the company name.

use std::fmt;
use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;
use reqwest::Client;

use super::PdfError;
use crate::services::metrics::LOGO_FALLBACKS_TOTAL;

/// Largest encoded logo accepted, from a URL or a data URI.
pub const MAX_LOGO_BYTES: usize = 2 * 1024 * 1024;
/// Largest width or height, in pixels, a logo may declare.
pub const MAX_LOGO_DIMENSION: u32 = 4096;

/// A decoded logo, flattened to RGB.
#[derive(Clone)]
pub struct LogoImage {
    image: DynamicImage,
}

impl fmt::Debug for LogoImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogoImage")
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

impl LogoImage {
    /// Decodes `bytes`, refusing images whose declared size exceeds
    /// `MAX_LOGO_DIMENSION` before any pixel is allocated.
    pub fn decode(bytes: &[u8]) -> Result<Self, PdfError> {
        let reader = image::io::Reader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PdfError::Logo(e.to_string()))?;
        let (width, height) = reader.into_dimensions()?;
        if width > MAX_LOGO_DIMENSION || height > MAX_LOGO_DIMENSION {
            return Err(PdfError::Logo(format!(
                "logo is {}x{} pixels, limit is {}",
                width, height, MAX_LOGO_DIMENSION
            )));
        }

        let decoded = image::load_from_memory(bytes)?;
        Ok(Self {
            image: DynamicImage::ImageRgb8(decoded.to_rgb8()),
        })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Largest size with the logo's aspect ratio fitting in the box, in mm.
    pub fn fit(&self, max_width: f32, max_height: f32) -> (f32, f32) {
        let (w, h) = (self.image.width() as f32, self.image.height() as f32);
        if w <= 0.0 || h <= 0.0 {
            return (max_width, max_height);
        }
        let scale = (max_width / w).min(max_height / h);
        (w * scale, h * scale)
    }

    /// PNG bytes, used by tests and previews.
    pub fn to_png(&self) -> Result<Vec<u8>, PdfError> {
        let mut buffer = Cursor::new(Vec::new());
        self.image.write_to(&mut buffer, image::ImageOutputFormat::Png)?;
        Ok(buffer.into_inner())
    }
}

/// Fetches logos from data URIs or http(s) URLs.
#[derive(Clone)]
pub struct LogoLoader {
    client: Client,
    default_source: Option<String>,
}

impl LogoLoader {
    pub fn new(timeout: Duration, default_source: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build logo HTTP client, using defaults");
                Client::new()
            });
        Self {
            client,
            default_source,
        }
    }

    /// Loads `source`, or the configured default when `source` is `None`.
    /// Any failure is logged and yields `None`.
    pub async fn load(&self, source: Option<&str>) -> Option<LogoImage> {
        let source = source.or(self.default_source.as_deref())?;

        let bytes = match self.fetch(source).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Logo fetch failed, falling back to text header");
                LOGO_FALLBACKS_TOTAL.with_label_values(&["fetch"]).inc();
                return None;
            }
        };

        match LogoImage::decode(&bytes) {
            Ok(logo) => Some(logo),
            Err(e) => {
                tracing::warn!(error = %e, "Logo decode failed, falling back to text header");
                LOGO_FALLBACKS_TOTAL.with_label_values(&["decode"]).inc();
                None
            }
        }
    }

    async fn fetch(&self, source: &str) -> Result<Vec<u8>, PdfError> {
        if source.starts_with("data:") {
            return decode_data_uri(source);
        }
        if !(source.starts_with("http://") || source.starts_with("https://")) {
            return Err(PdfError::Logo(format!("unsupported logo source: {}", source)));
        }

        let mut response = self
            .client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PdfError::Logo(e.to_string()))?;
        if let Some(length) = response.content_length() {
            if length > MAX_LOGO_BYTES as u64 {
                return Err(too_large());
            }
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PdfError::Logo(e.to_string()))?
        {
            if bytes.len() + chunk.len() > MAX_LOGO_BYTES {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

fn too_large() -> PdfError {
    PdfError::Logo(format!("logo exceeds {} bytes", MAX_LOGO_BYTES))
}

/// Decodes a `data:<mime>;base64,<payload>` URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, PdfError> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| PdfError::Logo("malformed data URI".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(PdfError::Logo("data URI is not base64 encoded".to_string()));
    }
    if payload.trim().len() / 4 * 3 > MAX_LOGO_BYTES {
        return Err(too_large());
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| PdfError::Logo(format!("invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn png_data_uri(width: u32, height: u32) -> String {
        let logo = LogoImage {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([20, 40, 90]))),
        };
        let png = logo.to_png().unwrap();
        format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
    }

    #[tokio::test]
    async fn test_load_data_uri() {
        let loader = LogoLoader::new(Duration::from_secs(1), None);
        let logo = loader.load(Some(&png_data_uri(40, 20))).await.unwrap();
        assert_eq!(logo.image().width(), 40);
        let (w, h) = logo.fit(50.0, 20.0);
        assert!((w - 40.0).abs() < 0.001);
        assert!((h - 20.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_broken_sources_fall_back() {
        let loader = LogoLoader::new(Duration::from_millis(500), None);
        assert!(loader.load(Some("data:image/png;base64,!!!")).await.is_none());
        assert!(loader.load(Some("data:image/png;base64,aGVsbG8=")).await.is_none());
        assert!(loader.load(Some("ftp://example.fr/logo.png")).await.is_none());
        assert!(loader.load(Some("http://127.0.0.1:9/logo.png")).await.is_none());
        assert!(loader.load(None).await.is_none());
    }

    #[tokio::test]
    async fn test_default_source_used_when_none_given() {
        let loader = LogoLoader::new(Duration::from_secs(1), Some(png_data_uri(10, 10)));
        assert!(loader.load(None).await.is_some());
    }

    #[tokio::test]
    async fn test_oversized_logos_fall_back() {
        let loader = LogoLoader::new(Duration::from_secs(1), None);

        let padding = "A".repeat(MAX_LOGO_BYTES / 3 * 4 + 8);
        let heavy = format!("data:image/png;base64,{}", padding);
        assert!(matches!(decode_data_uri(&heavy), Err(PdfError::Logo(_))));
        assert!(loader.load(Some(&heavy)).await.is_none());

        let wide = png_data_uri(MAX_LOGO_DIMENSION + 1, 1);
        assert!(loader.load(Some(&wide)).await.is_none());
        let bytes = decode_data_uri(&wide).unwrap();
        assert!(matches!(LogoImage::decode(&bytes), Err(PdfError::Logo(_))));
    }

    #[test]
    fn test_decode_data_uri_rejects_plain() {
        assert!(decode_data_uri("data:image/png,rawbytes").is_err());
        assert!(decode_data_uri("no comma").is_err());
    }
}
