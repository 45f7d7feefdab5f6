use crate::composite::geometry::LayerGeometry;
use crate::foundation::core::{Canvas, Rgba8Premul};
use crate::foundation::math::{premul_channel, premul_over_px, scale_px};
use crate::sources::frame::FrameView;

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Overwrite every pixel with `color`.
pub(crate) fn fill(dst: &mut [u8], color: Rgba8Premul) {
    let rgba = color.to_array();
    for px in dst.chunks_exact_mut(4) {
        px.copy_from_slice(&rgba);
    }
}

/// Fetch one source pixel as premultiplied RGBA8.
#[inline]
fn fetch(src: &FrameView<'_>, x: u32, y: u32) -> PremulRgba8 {
    let i = ((y as usize) * (src.width as usize) + (x as usize)) * 4;
    let p = [src.data[i], src.data[i + 1], src.data[i + 2], src.data[i + 3]];
    if src.premultiplied {
        p
    } else {
        [
            premul_channel(p[0], p[3]),
            premul_channel(p[1], p[3]),
            premul_channel(p[2], p[3]),
            p[3],
        ]
    }
}

/// Bilinear sample at source position `(u, v)`, clamped to columns of the source and to rows
/// of the crop band `[row_min, row_max]`.
fn sample_bilinear(src: &FrameView<'_>, u: f64, v: f64, row_min: u32, row_max: u32) -> PremulRgba8 {
    let max_x = f64::from(src.width - 1);
    let fx = (u - 0.5).clamp(0.0, max_x);
    let fy = (v - 0.5).clamp(f64::from(row_min), f64::from(row_max));

    let x0 = fx.floor() as u32;
    let y0 = fy.floor() as u32;
    let x1 = (x0 + 1).min(src.width - 1);
    let y1 = (y0 + 1).min(row_max);
    let tx = (fx - f64::from(x0)) as f32;
    let ty = (fy - f64::from(y0)) as f32;

    let p00 = fetch(src, x0, y0);
    let p10 = fetch(src, x1, y0);
    let p01 = fetch(src, x0, y1);
    let p11 = fetch(src, x1, y1);

    let w00 = (1.0 - tx) * (1.0 - ty);
    let w10 = tx * (1.0 - ty);
    let w01 = (1.0 - tx) * ty;
    let w11 = tx * ty;

    let mut out = [0u8; 4];
    for c in 0..4 {
        let acc = f32::from(p00[c]) * w00
            + f32::from(p10[c]) * w10
            + f32::from(p01[c]) * w01
            + f32::from(p11[c]) * w11;
        out[c] = acc.round().clamp(0.0, 255.0) as u8;
    }
    // Premultiplied invariant: color never exceeds alpha.
    out[0] = out[0].min(out[3]);
    out[1] = out[1].min(out[3]);
    out[2] = out[2].min(out[3]);
    out
}

/// Source-over `src` into the canvas buffer `dst` at `geom`.
///
/// When `seam_px` is set, the bottom `seam_px` canvas rows of the layer fade linearly to
/// transparent. Returns the number of canvas pixels written.
pub(crate) fn draw_layer(
    dst: &mut [u8],
    canvas: Canvas,
    src: &FrameView<'_>,
    geom: &LayerGeometry,
    seam_px: Option<f64>,
) -> usize {
    if src.width == 0 || src.height == 0 {
        return 0;
    }
    let d = geom.dst;
    let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
    let x_start = d.x0.floor().max(0.0);
    let x_end = d.x1.ceil().min(cw);
    let y_start = d.y0.floor().max(0.0);
    let y_end = d.y1.ceil().min(ch);
    if x_start >= x_end || y_start >= y_end {
        return 0;
    }
    let (x_start, x_end) = (x_start as u32, x_end as u32);
    let (y_start, y_end) = (y_start as u32, y_end as u32);

    let sx = geom.src.width() / d.width();
    let sy = geom.src.height() / d.height();
    let row_min = (geom.src.y0.floor().max(0.0) as u32).min(src.height - 1);
    let row_max = ((geom.src.y1.ceil() as u32).saturating_sub(1)).clamp(row_min, src.height - 1);

    let stride = canvas.width as usize * 4;
    let mut written = 0;
    for y in y_start..y_end {
        let py = f64::from(y) + 0.5;
        if py < d.y0 || py >= d.y1 {
            continue;
        }
        let fade = match seam_px {
            Some(h) => ((d.y1 - py) / h).clamp(0.0, 1.0),
            None => 1.0,
        };
        let fade = (fade * 255.0).round() as u16;
        if fade == 0 {
            continue;
        }
        let v = geom.src.y0 + (py - d.y0) * sy;
        let row = &mut dst[y as usize * stride..(y as usize + 1) * stride];

        for x in x_start..x_end {
            let px = f64::from(x) + 0.5;
            if px < d.x0 || px >= d.x1 {
                continue;
            }
            let u = geom.src.x0 + (px - d.x0) * sx;
            let s = scale_px(sample_bilinear(src, u, v, row_min, row_max), fade);
            let i = x as usize * 4;
            let out = premul_over_px([row[i], row[i + 1], row[i + 2], row[i + 3]], s);
            row[i..i + 4].copy_from_slice(&out);
            written += 1;
        }
    }
    written
}

#[cfg(test)]
#[path = "../../tests/unit/composite/blend.rs"]
mod tests;
