//! LC-3 object image format.
//!
//! An image is a sequence of big-endian 16-bit words:
//! - Word 0 is the origin (load address)
//! - The remaining words are stored at origin, origin + 1, ...
//!
//! The whole image must fit between the origin and the top of memory.

use crate::cpu::memory::{Memory, MEMORY_SIZE};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A parsed program image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// Load address of the first word.
    pub origin: u16,
    /// Program words.
    pub words: Vec<u16>,
}

impl Image {
    pub fn new(origin: u16, words: Vec<u16>) -> Self {
        Self { origin, words }
    }

    /// Parse an image from raw bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        if bytes.len() < 2 {
            return Err(ImageError::MissingOrigin);
        }
        if bytes.len() % 2 != 0 {
            return Err(ImageError::OddLength(bytes.len()));
        }

        let mut words = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
        let origin = words.next().ok_or(ImageError::MissingOrigin)?;
        let words: Vec<u16> = words.collect();

        let available = MEMORY_SIZE - origin as usize;
        if words.len() > available {
            return Err(ImageError::TooLarge {
                origin,
                words: words.len(),
                available,
            });
        }

        Ok(Self { origin, words })
    }

    /// Serialize back to the on-disk format.
    pub fn to_bytes(&self) -> Vec<u8> {
        std::iter::once(self.origin)
            .chain(self.words.iter().copied())
            .flat_map(u16::to_be_bytes)
            .collect()
    }

    /// Copy the program into memory at its origin.
    pub fn load_into(&self, mem: &mut Memory) -> Result<(), ImageError> {
        mem.load(self.origin, &self.words)
            .map_err(|_| ImageError::TooLarge {
                origin: self.origin,
                words: self.words.len(),
                available: MEMORY_SIZE - self.origin as usize,
            })
    }

    /// Get the number of program words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image, ImageError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let image = Image::parse(&bytes)?;
    log::debug!(
        "loaded {}: {} words at x{:04X}",
        path.display(),
        image.len(),
        image.origin
    );
    Ok(image)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &Image) -> Result<(), ImageError> {
    let path = path.as_ref();
    std::fs::write(path, image.to_bytes()).map_err(|source| ImageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors that can occur while reading an image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image has no origin word")]
    MissingOrigin,

    #[error("image length {0} is not a whole number of words")]
    OddLength(usize),

    #[error("{words} words at x{origin:04X} exceed the {available} words left in memory")]
    TooLarge {
        origin: u16,
        words: usize,
        available: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_load() {
        let bytes = [0x30, 0x00, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03];
        let image = Image::parse(&bytes).unwrap();

        assert_eq!(image.origin, 0x3000);
        assert_eq!(image.words, vec![1, 2, 3]);

        let mut mem = Memory::new();
        image.load_into(&mut mem).unwrap();
        assert_eq!(mem.read(0x3000), 0x1);
        assert_eq!(mem.read(0x3001), 0x2);
        assert_eq!(mem.read(0x3002), 0x3);
    }

    #[test]
    fn test_big_endian_words() {
        let image = Image::parse(&[0x12, 0x34, 0xAB, 0xCD]).unwrap();
        assert_eq!(image.origin, 0x1234);
        assert_eq!(image.words, vec![0xABCD]);
    }

    #[test]
    fn test_origin_only() {
        let image = Image::parse(&[0x30, 0x00]).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn test_missing_origin() {
        assert!(matches!(Image::parse(&[]), Err(ImageError::MissingOrigin)));
        assert!(matches!(Image::parse(&[0x30]), Err(ImageError::MissingOrigin)));
    }

    #[test]
    fn test_dangling_byte() {
        let err = Image::parse(&[0x30, 0x00, 0x12]).unwrap_err();
        assert!(matches!(err, ImageError::OddLength(3)));
    }

    #[test]
    fn test_fits_exactly_at_top() {
        // Origin xFFFE leaves room for two words.
        assert!(Image::parse(&[0xFF, 0xFE, 0, 1, 0, 2]).is_ok());

        let err = Image::parse(&[0xFF, 0xFE, 0, 1, 0, 2, 0, 3]).unwrap_err();
        assert!(matches!(
            err,
            ImageError::TooLarge { origin: 0xFFFE, words: 3, available: 2 }
        ));
    }

    #[test]
    fn test_later_image_overwrites() {
        let mut mem = Memory::new();
        Image::new(0x3000, vec![1, 2, 3]).load_into(&mut mem).unwrap();
        Image::new(0x3001, vec![9]).load_into(&mut mem).unwrap();

        assert_eq!(mem.dump(0x3000, 3), vec![(0x3000, 1), (0x3001, 9), (0x3002, 3)]);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("lc3-image-{}.obj", std::process::id()));
        let image = Image::new(0x3000, vec![0x5020, 0x1025, 0xF025]);

        save_image(&path, &image).unwrap();
        let loaded = load_image(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, image);
    }

    #[test]
    fn test_missing_file() {
        let err = load_image("/nonexistent/program.obj").unwrap_err();
        assert!(matches!(err, ImageError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/program.obj"));
    }
}
