use crate::config::DEFAULT_INPUT_SIZE;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;

/// Geometry of a letterbox resize, used to map boxes back to the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
    pub orig_width: u32,
    pub orig_height: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl LetterboxTransform {
    /// Map a point from model input space back to source pixels, clamped to the image.
    #[inline]
    pub fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let sx = ((x - self.offset_x) / self.scale).clamp(0.0, self.orig_width as f32);
        let sy = ((y - self.offset_y) / self.scale).clamp(0.0, self.orig_height as f32);
        (sx, sy)
    }
}

pub struct PreprocessResult {
    pub tensor: Array<f32, IxDyn>, // [1, 3, H, W] RGB in [0, 1]
    pub transform: LetterboxTransform,
}

pub struct PreProcessor {
    pub input_size: (u32, u32),
}

impl PreProcessor {
    pub fn new(input_size: (u32, u32)) -> Self {
        Self { input_size }
    }

    pub fn preprocess(&self, image: &RgbImage) -> anyhow::Result<PreprocessResult> {
        let _s = span!("preprocess_image");

        let (width, height) = image.dimensions();
        tracing::trace!(width, height, "Preprocessing image dimensions");

        if width == 0 || height == 0 {
            anyhow::bail!("Cannot preprocess an empty {}x{} image", width, height);
        }

        let (transform, letterboxed) = self.resize_and_letterbox(image.as_raw(), width, height)?;
        let tensor = self.to_tensor(&letterboxed)?;

        Ok(PreprocessResult { tensor, transform })
    }

    fn resize_and_letterbox(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<(LetterboxTransform, Vec<u8>)> {
        let _s = span!("resize_and_letterbox");

        let (input_width, input_height) = self.input_size;
        let scale =
            (input_width as f32 / width as f32).min(input_height as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, input_width);
        let new_height = ((height as f32 * scale) as u32).clamp(1, input_height);

        let offset_x = (input_width - new_width) / 2;
        let offset_y = (input_height - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        let mut letterboxed = vec![LETTERBOX_COLOR; (input_width * input_height * 3) as usize];
        let resized_data = resized.buffer();
        let stride = (input_width * 3) as usize;
        let row_len = (new_width * 3) as usize;

        for y in 0..new_height as usize {
            let src_row = y * row_len;
            let dst_row = (y + offset_y as usize) * stride + offset_x as usize * 3;

            letterboxed[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        let transform = LetterboxTransform {
            orig_width: width,
            orig_height: height,
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        };

        Ok((transform, letterboxed))
    }

    fn to_tensor(&self, letterboxed: &[u8]) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let width = self.input_size.0 as usize;
        let height = self.input_size.1 as usize;
        let spatial = width * height;

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in letterboxed.chunks_exact(3).enumerate() {
            output[i] = px[0] as f32 / 255.0;
            output[i + spatial] = px[1] as f32 / 255.0;
            output[i + 2 * spatial] = px[2] as f32 / 255.0;
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, height, width]), output)?)
    }
}

impl Default for PreProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_INPUT_SIZE)
    }
}
