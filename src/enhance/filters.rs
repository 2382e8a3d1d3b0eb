//! Per-pixel display filters: binarization and Sobel edge overlay.
//!
//! Both operate in place on the already-scaled raster. Alpha is preserved by
//! binarization; edge pixels are painted opaque red.

use image::{ImageBuffer, Luma, Rgba, RgbaImage};
use imageproc::filter::filter3x3;

/// Magnitude above which a pixel is treated as an edge.
pub const DEFAULT_EDGE_THRESHOLD: f32 = 30.0;

const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

const EDGE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);

/// Mean of the three color channels.
#[inline]
pub fn luminance(pixel: &Rgba<u8>) -> f32 {
    let [r, g, b, _] = pixel.0;
    (f32::from(r) + f32::from(g) + f32::from(b)) / 3.0
}

/// Replace every pixel with pure white if its luminance exceeds `threshold`,
/// pure black otherwise.
pub fn binarize(image: &mut RgbaImage, threshold: u8) {
    let threshold = f32::from(threshold);
    for pixel in image.pixels_mut() {
        let value = if luminance(pixel) > threshold { 255 } else { 0 };
        pixel.0 = [value, value, value, pixel.0[3]];
    }
}

/// Gradient magnitude of the grayscale image at every interior pixel.
///
/// Gray levels are the exact channel mean, so the gradients are computed
/// over an `f32` luma image. Border entries are left at zero.
pub fn sobel_magnitude(image: &RgbaImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let mut magnitude = vec![0.0f32; (width as usize) * (height as usize)];

    if width < 3 || height < 3 {
        return magnitude;
    }

    let gray: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |x, y| Luma([luminance(image.get_pixel(x, y))]));
    let gx: ImageBuffer<Luma<f32>, Vec<f32>> = filter3x3(&gray, &SOBEL_X);
    let gy: ImageBuffer<Luma<f32>, Vec<f32>> = filter3x3(&gray, &SOBEL_Y);

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let dx = gx.get_pixel(x, y)[0];
            let dy = gy.get_pixel(x, y)[0];
            magnitude[(y * width + x) as usize] = (dx * dx + dy * dy).sqrt();
        }
    }

    magnitude
}

/// Paint every interior pixel whose Sobel magnitude exceeds `threshold` red.
///
/// Returns the number of painted pixels.
pub fn overlay_edges(image: &mut RgbaImage, threshold: f32) -> usize {
    let width = image.width() as usize;
    let magnitude = sobel_magnitude(image);
    let mut painted = 0;

    for (index, value) in magnitude.iter().enumerate() {
        if *value > threshold {
            let x = (index % width) as u32;
            let y = (index / width) as u32;
            image.put_pixel(x, y, EDGE_COLOR);
            painted += 1;
        }
    }

    painted
}
