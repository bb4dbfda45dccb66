use crate::error::Error;
use crate::extract::ImageDescriptor;
use image::{DynamicImage, ImageReader};
use image_hasher::{HashAlg, Hasher, HasherConfig};
use rayon::prelude::*;
use std::path::Path;
use tracing::warn;

/// A fixed-width perceptual hash. Compared only by Hamming distance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(Box<[u8]>);

impl Fingerprint {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }

    /// Hamming distance: popcount of the XOR of the two hashes.
    pub fn distance(&self, other: &Fingerprint) -> u32 {
        debug_assert_eq!(self.0.len(), other.0.len());
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    pub fn bits(&self) -> usize {
        self.0.len() * 8
    }
}

/// Computes DCT-based perceptual hashes for extracted images.
pub struct Fingerprinter {
    hasher: Hasher,
}

impl Fingerprinter {
    /// `hash_size` is the side length of the square hash; 8 yields 64 bits.
    pub fn new(hash_size: u32) -> Self {
        let hasher = HasherConfig::new()
            .hash_size(hash_size, hash_size)
            .hash_alg(HashAlg::Mean)
            .preproc_dct()
            .to_hasher();
        Self { hasher }
    }

    /// Decode one image, normalize to three-channel RGB (transparency makes
    /// the hash unstable), and hash it.
    pub fn fingerprint(&self, path: &Path) -> Result<Fingerprint, Error> {
        let img = ImageReader::open(path)
            .map_err(|e| Error::Decode {
                path: path.to_path_buf(),
                source: image::ImageError::IoError(e),
            })?
            .decode()
            .map_err(|e| Error::Decode {
                path: path.to_path_buf(),
                source: e,
            })?;
        let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
        let hash = self.hasher.hash_image(&rgb);
        Ok(Fingerprint::from_bytes(hash.as_bytes().to_vec()))
    }

    /// Hash a batch in parallel, preserving input order. Descriptors whose
    /// image cannot be decoded get `None` and are logged, not propagated.
    pub fn fingerprint_all(&self, descriptors: &[ImageDescriptor]) -> Vec<Option<Fingerprint>> {
        descriptors
            .par_iter()
            .map(|descriptor| match self.fingerprint(&descriptor.path) {
                Ok(fingerprint) => Some(fingerprint),
                Err(err) => {
                    warn!(
                        archive = %descriptor.source_archive,
                        member = %descriptor.relative_path,
                        "dropping image that failed to hash: {err}"
                    );
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::fs;
    use tempfile::TempDir;

    fn gradient(path: &Path) {
        let img = RgbImage::from_fn(64, 64, |x, y| Rgb([(x * 4) as u8, (y * 4) as u8, 0]));
        img.save(path).unwrap();
    }

    fn checkerboard(path: &Path) {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        img.save(path).unwrap();
    }

    #[test]
    fn identical_images_have_zero_distance() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.png");
        gradient(&a);
        gradient(&b);

        let engine = Fingerprinter::new(8);
        let fa = engine.fingerprint(&a).unwrap();
        let fb = engine.fingerprint(&b).unwrap();
        assert_eq!(fa.bits(), 64);
        assert_eq!(fa.distance(&fb), 0);
    }

    #[test]
    fn dissimilar_images_have_nonzero_distance() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.png");
        let b = tmp.path().join("b.png");
        gradient(&a);
        checkerboard(&b);

        let engine = Fingerprinter::new(8);
        let fa = engine.fingerprint(&a).unwrap();
        let fb = engine.fingerprint(&b).unwrap();
        assert!(fa.distance(&fb) > 0);
    }

    #[test]
    fn alpha_channel_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let rgb_path = tmp.path().join("rgb.png");
        let rgba_path = tmp.path().join("rgba.png");
        gradient(&rgb_path);
        let rgba = RgbaImage::from_fn(64, 64, |x, y| {
            Rgba([(x * 4) as u8, (y * 4) as u8, 0, 255])
        });
        rgba.save(&rgba_path).unwrap();

        let engine = Fingerprinter::new(8);
        let a = engine.fingerprint(&rgb_path).unwrap();
        let b = engine.fingerprint(&rgba_path).unwrap();
        assert_eq!(a.distance(&b), 0);
    }

    #[test]
    fn corrupt_image_is_a_decode_error() {
        let tmp = TempDir::new().unwrap();
        let bogus = tmp.path().join("bogus.jpg");
        fs::write(&bogus, b"not actually a jpeg").unwrap();

        let engine = Fingerprinter::new(8);
        assert!(matches!(
            engine.fingerprint(&bogus),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn synthetic_distance() {
        let a = Fingerprint::from_bytes(vec![0b1111_0000, 0x00]);
        let b = Fingerprint::from_bytes(vec![0b0000_0000, 0x00]);
        assert_eq!(a.distance(&b), 4);
        assert_eq!(a.distance(&a), 0);
    }
}
