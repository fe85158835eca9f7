//! Image adapters: ChESS corners via `chess-corners`, side-by-side pair
//! loading and parallel checkerboard detection over calibration pairs.

use crate::core::{self, CornerObservation, ImageSize};
use crate::error::PipelineError;
use chess_corners::{find_chess_corners_image, ChessConfig, CornerDescriptor};
use freethrow_checkerboard::CheckerboardDetector;
use image::ImageReader;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// File-name prefix of side-by-side calibration captures.
pub const PAIR_PREFIX: &str = "pair_";

/// ChESS settings that work for the 640-pixel calibration captures.
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.params.threshold_rel = 0.2;
    cfg.params.nms_radius = 2;
    cfg
}

pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Copy an `image` buffer into the core image type.
pub fn to_core_image(img: &::image::GrayImage) -> core::GrayImage {
    core::GrayImage {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw().clone(),
    }
}

pub fn from_core_image(img: &core::GrayImage) -> ::image::GrayImage {
    ::image::GrayImage::from_fn(img.width as u32, img.height as u32, |x, y| {
        ::image::Luma([img.data[y as usize * img.width + x as usize]])
    })
}

pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, PipelineError> {
    Ok(ImageReader::open(path)?.decode()?.to_luma8())
}

/// Left and right halves of a side-by-side frame. An odd trailing column
/// is dropped.
pub fn split_pair(img: &::image::GrayImage) -> (::image::GrayImage, ::image::GrayImage) {
    let half = img.width() / 2;
    let left = ::image::imageops::crop_imm(img, 0, 0, half, img.height()).to_image();
    let right = ::image::imageops::crop_imm(img, half, 0, half, img.height()).to_image();
    (left, right)
}

pub fn detect_corners(img: &::image::GrayImage, cfg: &ChessConfig) -> Vec<core::Corner> {
    find_chess_corners_image(img, cfg)
        .iter()
        .map(adapt_chess_corner)
        .collect()
}

/// ChESS corners, then grid assembly and sub-pixel refinement.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, chess_cfg, detector),
        fields(width = img.width(), height = img.height())
    )
)]
pub fn detect_checkerboard(
    img: &::image::GrayImage,
    chess_cfg: &ChessConfig,
    detector: &CheckerboardDetector,
) -> Option<CornerObservation> {
    let corners = detect_corners(img, chess_cfg);
    detector.detect(&gray_view(img), &corners)
}

/// Sorted `pair_*.png` files in `dir`.
pub fn list_pair_images(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PipelineError> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            let name = p.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.starts_with(PAIR_PREFIX)
                && p.extension().and_then(|e| e.to_str()) == Some("png")
        })
        .collect();
    if paths.is_empty() {
        return Err(PipelineError::NoInputs {
            path: dir.to_path_buf(),
            pattern: format!("{PAIR_PREFIX}*.png"),
        });
    }
    paths.sort();
    Ok(paths)
}

/// Per-instant detections of both cameras, in input order.
#[derive(Clone, Debug)]
pub struct PairDetections {
    /// Size of one half.
    pub image_size: ImageSize,
    pub left: Vec<Option<CornerObservation>>,
    pub right: Vec<Option<CornerObservation>>,
}

/// Split every pair and detect the board in both halves, in parallel.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(paths, chess_cfg, detector), fields(pairs = paths.len()))
)]
pub fn detect_pairs(
    paths: &[PathBuf],
    chess_cfg: &ChessConfig,
    detector: &CheckerboardDetector,
) -> Result<PairDetections, PipelineError> {
    let per_pair = paths
        .par_iter()
        .map(|path| {
            let img = load_gray(path)?;
            let (left, right) = split_pair(&img);
            let size = ImageSize::new(left.width(), left.height());
            let l = detect_checkerboard(&left, chess_cfg, detector);
            let r = detect_checkerboard(&right, chess_cfg, detector);
            log::debug!(
                "{}: left {}, right {}",
                path.display(),
                if l.is_some() { "found" } else { "missing" },
                if r.is_some() { "found" } else { "missing" }
            );
            Ok((path, size, l, r))
        })
        .collect::<Result<Vec<_>, PipelineError>>()?;

    let mut image_size = None;
    let mut out = PairDetections {
        image_size: ImageSize::new(0, 0),
        left: Vec::with_capacity(per_pair.len()),
        right: Vec::with_capacity(per_pair.len()),
    };
    for (path, size, l, r) in per_pair {
        match image_size {
            None => image_size = Some(size),
            Some(expected) if expected != size => {
                return Err(PipelineError::ImageSizeMismatch {
                    path: path.clone(),
                    expected,
                    found: size,
                });
            }
            Some(_) => {}
        }
        out.left.push(l);
        out.right.push(r);
    }
    out.image_size = image_size.unwrap_or(out.image_size);
    Ok(out)
}

fn adapt_chess_corner(c: &CornerDescriptor) -> core::Corner {
    core::Corner::new(c.x, c.y, c.orientation, c.response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_odd_column() {
        let img = ::image::GrayImage::from_fn(9, 2, |x, _| ::image::Luma([x as u8]));
        let (l, r) = split_pair(&img);
        assert_eq!((4, 2), l.dimensions());
        assert_eq!((4, 2), r.dimensions());
        assert_eq!(0, l.get_pixel(0, 0)[0]);
        assert_eq!(4, r.get_pixel(0, 1)[0]);
    }

    #[test]
    fn core_image_round_trip() {
        let img = ::image::GrayImage::from_fn(5, 3, |x, y| ::image::Luma([(x * 10 + y) as u8]));
        let core = to_core_image(&img);
        assert_eq!(21, core.data[core.width + 2]);
        assert_eq!(img, from_core_image(&core));
    }

    #[test]
    fn pair_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["pair_2.png", "pair_1.png", "notes.png", "pair_3.jpg"] {
            std::fs::write(dir.path().join(name), b"").expect("touch");
        }
        let paths = list_pair_images(dir.path()).expect("list");
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().and_then(|n| n.to_str()).unwrap_or(""))
            .collect();
        assert_eq!(vec!["pair_1.png", "pair_2.png"], names);

        let empty = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            list_pair_images(empty.path()),
            Err(PipelineError::NoInputs { .. })
        ));
    }
}
