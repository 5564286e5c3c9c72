use std::time::Duration;

use eframe::egui::ColorImage;

use crate::error::ThumbnailError;

/// Best-effort source of preview images.
pub trait ThumbnailFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<ColorImage, ThumbnailError>;
}

/// Module for downloading and decoding video thumbnails over HTTP.
pub struct HttpThumbnails {
    client: reqwest::blocking::Client,
    max_size: [u32; 2],
}

impl HttpThumbnails {
    pub fn new(timeout: Duration, max_size: [u32; 2]) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_size })
    }
}

impl ThumbnailFetcher for HttpThumbnails {
    fn fetch(&self, url: &str) -> Result<ColorImage, ThumbnailError> {
        // Perform a blocking HTTP GET request, treating non-2xx as failure
        let resp = self.client.get(url).send()?.error_for_status()?.bytes()?;
        decode_thumbnail(&resp, self.max_size)
    }
}

/// Decodes image bytes and shrinks them to fit within `max_size`, keeping the aspect ratio.
pub fn decode_thumbnail(bytes: &[u8], max_size: [u32; 2]) -> Result<ColorImage, ThumbnailError> {
    let img = image::load_from_memory(bytes)?;
    let img = if img.width() > max_size[0] || img.height() > max_size[1] {
        img.thumbnail(max_size[0], max_size[1])
    } else {
        img
    };
    let rgba = img.to_rgba8();
    // Determine the image dimensions for egui
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, &rgba))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageOutputFormat, RgbaImage};

    use super::*;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(width, height));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn large_images_are_downscaled() {
        let img = decode_thumbnail(&png(1280, 720), [320, 180]).unwrap();
        assert_eq!(img.size, [320, 180]);
    }

    #[test]
    fn small_images_keep_their_size() {
        let img = decode_thumbnail(&png(120, 90), [320, 180]).unwrap();
        assert_eq!(img.size, [120, 90]);
    }

    #[test]
    fn refused_connection_is_a_request_error() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let fetcher = HttpThumbnails::new(Duration::from_secs(2), [320, 180]).unwrap();
        assert!(matches!(
            fetcher.fetch(&format!("http://{addr}/hqdefault.jpg")),
            Err(ThumbnailError::Request(_))
        ));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode_thumbnail(b"<html>not an image</html>", [320, 180]),
            Err(ThumbnailError::Decode(_))
        ));
    }
}
