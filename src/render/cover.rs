/// Source-space rectangle that maps exactly onto the destination frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl CropRect {
    pub fn to_rect(self) -> kurbo::Rect {
        kurbo::Rect::new(self.x, self.y, self.x + self.w, self.y + self.h)
    }
}

/// Cover-fit crop of an `src_w`x`src_h` frame for a `dst_w`x`dst_h` destination.
///
/// The source is first fit inside the destination, then enlarged until both axes cover it; the
/// crop is the source region that remains visible. `off_x`/`off_y` pick the crop position along
/// the excess axis (`0.5` centers) and are clamped to `[0, 1]`.
///
/// Returns `None` when any dimension is zero.
pub fn cover_fit_crop(
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
    off_x: f64,
    off_y: f64,
) -> Option<CropRect> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return None;
    }
    let (iw, ih) = (f64::from(src_w), f64::from(src_h));
    let (w, h) = (f64::from(dst_w), f64::from(dst_h));
    let off_x = if off_x.is_finite() { off_x.clamp(0.0, 1.0) } else { 0.5 };
    let off_y = if off_y.is_finite() { off_y.clamp(0.0, 1.0) } else { 0.5 };

    let fit = (w / iw).min(h / ih);
    let (mut nw, mut nh) = (iw * fit, ih * fit);
    let mut grow = 1.0;
    if nw < w {
        grow = w / nw;
    }
    if (grow - 1.0).abs() < 1e-14 && nh < h {
        grow = h / nh;
    }
    nw *= grow;
    nh *= grow;

    let cw = (iw / (nw / w)).min(iw);
    let ch = (ih / (nh / h)).min(ih);
    let cx = ((iw - cw) * off_x).max(0.0);
    let cy = ((ih - ch) * off_y).max(0.0);

    Some(CropRect {
        x: cx,
        y: cy,
        w: cw,
        h: ch,
    })
}

/// Centered cover-fit crop.
pub fn cover_fit_center(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Option<CropRect> {
    cover_fit_crop(src_w, src_h, dst_w, dst_h, 0.5, 0.5)
}
