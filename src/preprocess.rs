use std::path::{Path, PathBuf};

use clap::ValueEnum;
use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{ClassifyError, ClassifyResult};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Pixel transform applied before the tensor reaches the model. It has to
/// match what the artefact saw during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Normalization {
    /// Raw 0..255 values.
    Raw,
    /// `x / 255`.
    Unit,
    /// Keras MobileNetV2 `preprocess_input`: `x / 127.5 - 1`.
    #[value(name = "mobilenet-v2")]
    MobileNetV2,
    /// `(x / 255 - mean) / std` with the ImageNet statistics.
    #[value(name = "imagenet")]
    ImageNet,
}

impl Normalization {
    pub fn apply(self, channel: usize, value: u8) -> f32 {
        let v = value as f32;
        match self {
            Self::Raw => v,
            Self::Unit => v / 255.0,
            Self::MobileNetV2 => v / 127.5 - 1.0,
            Self::ImageNet => (v / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TensorLayout {
    /// `(1, height, width, 3)`, the Keras convention.
    Nhwc,
    /// `(1, 3, height, width)`.
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResizeFilter {
    Nearest,
    Bilinear,
    Bicubic,
    Lanczos3,
}

impl ResizeFilter {
    fn algorithm(self) -> ResizeAlg {
        match self {
            Self::Nearest => ResizeAlg::Nearest,
            Self::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            Self::Bicubic => ResizeAlg::Convolution(FilterType::CatmullRom),
            Self::Lanczos3 => ResizeAlg::Convolution(FilterType::Lanczos3),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub height: u32,
    pub width: u32,
    pub normalization: Normalization,
    pub layout: TensorLayout,
    pub filter: ResizeFilter,
}

impl PreprocessConfig {
    /// Square input with the defaults of the Keras exports.
    pub fn square(size: u32, normalization: Normalization) -> Self {
        Self {
            height: size,
            width: size,
            normalization,
            layout: TensorLayout::Nhwc,
            filter: ResizeFilter::Bicubic,
        }
    }

    /// Shape of the tensor handed to the model, batch dimension included.
    pub fn tensor_shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, 3],
            TensorLayout::Nchw => [1, 3, h, w],
        }
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self::square(224, Normalization::MobileNetV2)
    }
}

#[derive(Debug, Clone)]
pub struct Processor {
    pub config: PreprocessConfig,
}

impl Processor {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    pub fn decode(&self, bytes: &[u8]) -> ClassifyResult<DynamicImage> {
        Ok(image::load_from_memory(bytes)?)
    }

    pub fn open(&self, path: &Path) -> ClassifyResult<DynamicImage> {
        Ok(image::open(path)?)
    }

    /// Converts to RGB, resizes to the configured resolution and lays the
    /// normalized pixels out as a batch of one.
    pub fn preprocess(&self, image: &DynamicImage) -> ClassifyResult<Array4<f32>> {
        let t = std::time::Instant::now();
        let rgb = self.resize(image)?;
        debug!(elapsed = ?t.elapsed(), "resized to {}x{}", rgb.width(), rgb.height());

        let t = std::time::Instant::now();
        let norm = self.config.normalization;
        let (h, w) = (self.config.height as usize, self.config.width as usize);
        let tensor = match self.config.layout {
            TensorLayout::Nhwc => Array4::from_shape_fn((1, h, w, 3), |(_, y, x, c)| {
                norm.apply(c, rgb[(x as u32, y as u32)][c])
            }),
            TensorLayout::Nchw => Array4::from_shape_fn((1, 3, h, w), |(_, c, y, x)| {
                norm.apply(c, rgb[(x as u32, y as u32)][c])
            }),
        };
        debug!(elapsed = ?t.elapsed(), "normalized");
        Ok(tensor)
    }

    /// Opens and preprocesses every file in parallel. Results keep the
    /// order of `paths`.
    pub fn preprocess_files(&self, paths: &[PathBuf]) -> Vec<ClassifyResult<Array4<f32>>> {
        paths
            .par_iter()
            .map(|path| self.open(path).and_then(|image| self.preprocess(&image)))
            .collect()
    }

    fn resize(&self, image: &DynamicImage) -> ClassifyResult<RgbImage> {
        let (width, height) = (self.config.width, self.config.height);
        let src = DynamicImage::ImageRgb8(image.to_rgb8());
        if src.width() == width && src.height() == height {
            return Ok(src.into_rgb8());
        }

        let mut dst_image = Image::new(width, height, PixelType::U8x3);
        let options = ResizeOptions::new().resize_alg(self.config.filter.algorithm());
        let mut resizer = Resizer::new();
        resizer
            .resize(&src, &mut dst_image, &options)
            .map_err(|e| ClassifyError::Preprocess(format!("resize failed: {e}")))?;

        RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
            .ok_or_else(|| ClassifyError::Preprocess("resized buffer has the wrong size".into()))
    }
}
