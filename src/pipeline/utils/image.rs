use anyhow::{Context, Error};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use ndarray::Array4;
use crate::pipeline::model_config::config::TensorLayout;

/// Decodes an uploaded image into RGB, dropping alpha and expanding grayscale.
pub fn decode_rgb_image(im_bytes: &[u8]) -> Result<DynamicImage, Error> {
    let img = image::load_from_memory(im_bytes).context("failed to decode image")?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// File extension matching the encoded image, `jpg` when the format cannot be guessed.
pub fn guess_extension(im_bytes: &[u8]) -> &'static str {
    match image::guess_format(im_bytes) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(format) => format.extensions_str().first().copied().unwrap_or("jpg"),
        Err(_) => "jpg",
    }
}

/// Bilinear resize to `image_size` and scale to `[0, 1]`, batch dimension 1.
pub fn preprocess(img: &DynamicImage, image_size: (u32, u32), layout: TensorLayout) -> Array4<f32> {
    let (width, height) = image_size;
    let resized = img.resize_exact(width, height, FilterType::Triangle).to_rgb8();
    let mut tensor = blank_tensor(image_size, layout);

    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            match layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    tensor
}

pub fn blank_tensor(image_size: (u32, u32), layout: TensorLayout) -> Array4<f32> {
    let (w, h) = (image_size.0 as usize, image_size.1 as usize);
    match layout {
        TensorLayout::Nhwc => Array4::<f32>::zeros((1, h, w, 3)),
        TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, h, w)),
    }
}
