// System clipboard access.
// - `Clipboard` is the seam the upload path depends on, so tests can use
//   an in-memory stub instead of a display server.
// - `SystemClipboard` is backed by `arboard`. Images are re-encoded as
//   PNG so they can be sniffed and uploaded like any other file.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("clipboard unavailable: {0}")]
pub struct ClipboardUnavailable(pub String);

pub trait Clipboard {
    fn paste(&self) -> Result<Vec<u8>, ClipboardUnavailable>;
    fn copy(&self, text: &str) -> Result<(), ClipboardUnavailable>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

impl SystemClipboard {
    fn open() -> Result<arboard::Clipboard, ClipboardUnavailable> {
        arboard::Clipboard::new().map_err(|e| ClipboardUnavailable(e.to_string()))
    }
}

impl Clipboard for SystemClipboard {
    fn paste(&self) -> Result<Vec<u8>, ClipboardUnavailable> {
        let mut clipboard = Self::open()?;
        match clipboard.get_text() {
            Ok(text) => Ok(text.into_bytes()),
            Err(arboard::Error::ContentNotAvailable) => {
                let image = clipboard
                    .get_image()
                    .map_err(|e| ClipboardUnavailable(e.to_string()))?;
                encode_png(&image)
            }
            Err(e) => Err(ClipboardUnavailable(e.to_string())),
        }
    }

    fn copy(&self, text: &str) -> Result<(), ClipboardUnavailable> {
        Self::open()?
            .set_text(text.to_owned())
            .map_err(|e| ClipboardUnavailable(e.to_string()))
    }
}

fn encode_png(image: &arboard::ImageData<'_>) -> Result<Vec<u8>, ClipboardUnavailable> {
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width as u32, image.height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder
            .write_header()
            .map_err(|e| ClipboardUnavailable(e.to_string()))?;
        writer
            .write_image_data(&image.bytes)
            .map_err(|e| ClipboardUnavailable(e.to_string()))?;
    }
    Ok(out)
}
