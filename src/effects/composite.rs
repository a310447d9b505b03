use kurbo::{Affine, Point, Rect, Vec2};

use crate::{
    effects::transitions::{SlideDir, TransitionKind},
    foundation::error::{ChartreelError, ChartreelResult},
    render::frame::FrameRGBA,
};

/// Premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Channel-wise linear blend `a * (1 - t) + b * t`.
///
/// Exact at `t = 0` and `t = 1`.
pub fn crossfade(a: PremulRgba8, b: PremulRgba8, t: f32) -> PremulRgba8 {
    let t = t.clamp(0.0, 1.0);
    let it = 1.0 - t;
    let mut out = [0u8; 4];
    for i in 0..4 {
        let v = f32::from(a[i]) * it + f32::from(b[i]) * t;
        out[i] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Composite one transition frame from the outgoing and incoming frames at eased progress `p`.
///
/// `p <= 0` returns the outgoing frame and `p >= 1` the incoming frame, both bit-for-bit.
pub fn composite_transition(
    kind: TransitionKind,
    outgoing: &FrameRGBA,
    incoming: &FrameRGBA,
    p: f64,
) -> ChartreelResult<FrameRGBA> {
    check_pair(outgoing, incoming)?;

    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) };
    if p <= 0.0 {
        return Ok(outgoing.clone());
    }
    if p >= 1.0 {
        return Ok(incoming.clone());
    }

    let mut out = outgoing.clone();
    match kind {
        TransitionKind::Fade => crossfade_in_place(&mut out.data, &incoming.data, p as f32),
        TransitionKind::Slide { dir } => slide_in_place(
            &mut out.data,
            &incoming.data,
            outgoing.width,
            outgoing.height,
            p,
            dir,
        ),
        TransitionKind::Zoom { anchor } => zoom_in_place(
            &mut out.data,
            &incoming.data,
            outgoing.width,
            outgoing.height,
            p,
            anchor,
        ),
        // Zero-length window: outgoing holds until the boundary instant.
        TransitionKind::Cut => {}
    }
    Ok(out)
}

fn check_pair(a: &FrameRGBA, b: &FrameRGBA) -> ChartreelResult<()> {
    a.validate()?;
    b.validate()?;
    if a.width != b.width || a.height != b.height {
        return Err(ChartreelError::evaluation(format!(
            "transition frames differ in size: {}x{} vs {}x{}",
            a.width, a.height, b.width, b.height
        )));
    }
    if a.premultiplied != b.premultiplied {
        return Err(ChartreelError::evaluation(
            "transition frames differ in alpha representation",
        ));
    }
    Ok(())
}

fn crossfade_in_place(dst: &mut [u8], incoming: &[u8], t: f32) {
    for (d, s) in dst.chunks_exact_mut(4).zip(incoming.chunks_exact(4)) {
        let out = crossfade([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]], t);
        d.copy_from_slice(&out);
    }
}

fn slide_in_place(dst: &mut [u8], incoming: &[u8], width: u32, height: u32, p: f64, dir: SlideDir) {
    let w = width as usize;
    let offset = (((1.0 - p) * f64::from(width)).round() as usize).min(w);
    let covered = w - offset;
    if covered == 0 {
        return;
    }
    let (dst_x, src_x) = match dir {
        SlideDir::Left => (offset, 0),
        SlideDir::Right => (0, offset),
    };
    for y in 0..height as usize {
        let row = y * w * 4;
        dst[row + dst_x * 4..row + (dst_x + covered) * 4]
            .copy_from_slice(&incoming[row + src_x * 4..row + (src_x + covered) * 4]);
    }
}

fn zoom_in_place(dst: &mut [u8], incoming: &[u8], width: u32, height: u32, p: f64, anchor: Vec2) {
    let (w, h) = (f64::from(width), f64::from(height));
    let a = Vec2::new(anchor.x * w, anchor.y * h);
    let to_dst = Affine::translate(a) * Affine::scale(p) * Affine::translate(-a);
    let to_src = to_dst.inverse();

    let covered = to_dst.transform_rect_bbox(Rect::new(0.0, 0.0, w, h));
    let x0 = covered.x0.floor().max(0.0) as u32;
    let y0 = covered.y0.floor().max(0.0) as u32;
    let x1 = (covered.x1.ceil().min(w)) as u32;
    let y1 = (covered.y1.ceil().min(h)) as u32;

    for y in y0..y1 {
        for x in x0..x1 {
            let s = to_src * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
            if s.x < 0.0 || s.y < 0.0 || s.x >= w || s.y >= h {
                continue;
            }
            let px = sample_bilinear(incoming, width, height, s.x - 0.5, s.y - 0.5);
            let idx = ((y as usize) * (width as usize) + (x as usize)) * 4;
            dst[idx..idx + 4].copy_from_slice(&px);
        }
    }
}

fn sample_bilinear(src: &[u8], width: u32, height: u32, x: f64, y: f64) -> PremulRgba8 {
    let max_x = f64::from(width - 1);
    let max_y = f64::from(height - 1);
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width as usize - 1);
    let y1 = (y0 + 1).min(height as usize - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let at = |xx: usize, yy: usize| -> [f32; 4] {
        let i = (yy * width as usize + xx) * 4;
        [
            f32::from(src[i]),
            f32::from(src[i + 1]),
            f32::from(src[i + 2]),
            f32::from(src[i + 3]),
        ]
    };
    let (p00, p10, p01, p11) = (at(x0, y0), at(x1, y0), at(x0, y1), at(x1, y1));

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] + (p10[c] - p00[c]) * fx;
        let bottom = p01[c] + (p11[c] - p01[c]) * fx;
        out[c] = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
