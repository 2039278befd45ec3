use image::GrayImage;

/// Summed-area tables for one pyramid level.
///
/// `sum` and `sqsum` have `(width + 1) * (height + 1)` entries, where entry
/// `(X, Y)` holds the total of every pixel with `x < X` and `y < Y`.
/// `tilted` holds the 45° rotated table used by tilted Haar features and is
/// only built on request.
pub(crate) struct IntegralImages {
    width: usize,
    height: usize,
    sum: Vec<i64>,
    sqsum: Vec<i64>,
    tilted: Option<TiltedIntegral>,
}

impl IntegralImages {
    pub(crate) fn new(gray: &GrayImage, with_tilted: bool) -> Self {
        let (w, h) = gray.dimensions();
        let (width, height) = (w as usize, h as usize);
        let stride = width + 1;
        let mut sum = vec![0i64; stride * (height + 1)];
        let mut sqsum = vec![0i64; stride * (height + 1)];
        let raw = gray.as_raw();

        for y in 0..height {
            let mut row_sum = 0i64;
            let mut row_sq = 0i64;
            for x in 0..width {
                let v = raw[y * width + x] as i64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + (x + 1);
                sum[idx] = sum[idx - stride] + row_sum;
                sqsum[idx] = sqsum[idx - stride] + row_sq;
            }
        }

        let tilted = with_tilted.then(|| TiltedIntegral::new(raw, width, height));
        Self {
            width,
            height,
            sum,
            sqsum,
            tilted,
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.width
    }

    pub(crate) fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn at(table: &[i64], stride: usize, x: usize, y: usize) -> i64 {
        table[y * stride + x]
    }

    /// Pixel total of the upright rectangle at `(x, y)` with size `w × h`.
    #[inline]
    pub(crate) fn rect_sum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        let s = self.width + 1;
        Self::at(&self.sum, s, x, y) - Self::at(&self.sum, s, x + w, y)
            - Self::at(&self.sum, s, x, y + h)
            + Self::at(&self.sum, s, x + w, y + h)
    }

    /// Total of squared pixel values over the upright rectangle.
    #[inline]
    pub(crate) fn rect_sqsum(&self, x: usize, y: usize, w: usize, h: usize) -> i64 {
        let s = self.width + 1;
        Self::at(&self.sqsum, s, x, y) - Self::at(&self.sqsum, s, x + w, y)
            - Self::at(&self.sqsum, s, x, y + h)
            + Self::at(&self.sqsum, s, x + w, y + h)
    }

    /// Total of the 45° rotated rectangle whose top corner sits at `(x, y)`.
    ///
    /// The rectangle extends `w` pixels down-right and `h` pixels down-left.
    #[inline]
    pub(crate) fn tilted_sum(&self, x: i64, y: i64, w: i64, h: i64) -> i64 {
        let Some(t) = self.tilted.as_ref() else {
            return 0;
        };
        t.at(x, y) - t.at(x - h, y + h) - t.at(x + w, y + w) + t.at(x + w - h, y + w + h)
    }
}

/// Rotated summed-area table.
///
/// Entry `(X, Y)` is the total of every pixel `(x, y)` with `y < Y` and
/// `|x - X + 1| <= Y - y - 1`, i.e. the upward-opening triangle whose apex is
/// the pixel just above-left of `(X, Y)`. Columns are padded by `height + 1`
/// on each side so the recurrence never has to special-case the borders.
struct TiltedIntegral {
    pad: usize,
    stride: usize,
    data: Vec<i64>,
}

impl TiltedIntegral {
    fn new(raw: &[u8], width: usize, height: usize) -> Self {
        let pad = height + 1;
        let stride = width + 1 + 2 * pad;
        let mut data = vec![0i64; stride * (height + 1)];
        let pixel = |x: i64, y: i64| -> i64 {
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                0
            } else {
                raw[y as usize * width + x as usize] as i64
            }
        };

        // T(X, Y) = T(X-1, Y-1) + T(X+1, Y-1) - T(X, Y-2) + I(X-1, Y-1) + I(X-1, Y-2)
        for y in 1..=height {
            for col in 0..stride {
                let x = col as i64 - pad as i64;
                let up_left = if col > 0 { data[(y - 1) * stride + col - 1] } else { 0 };
                let up_right = if col + 1 < stride {
                    data[(y - 1) * stride + col + 1]
                } else {
                    0
                };
                let two_up = if y >= 2 { data[(y - 2) * stride + col] } else { 0 };
                data[y * stride + col] = up_left + up_right - two_up
                    + pixel(x - 1, y as i64 - 1)
                    + pixel(x - 1, y as i64 - 2);
            }
        }

        Self { pad, stride, data }
    }

    #[inline]
    fn at(&self, x: i64, y: i64) -> i64 {
        let col = x + self.pad as i64;
        if y <= 0 || col < 0 || col as usize >= self.stride {
            return 0;
        }
        self.data[y as usize * self.stride + col as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn ramp(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([(x * 7 + y * 13) as u8]))
    }

    fn brute_sum(img: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let mut total = 0i64;
        for yy in y..y + h {
            for xx in x..x + w {
                total += img.get_pixel(xx, yy)[0] as i64;
            }
        }
        total
    }

    fn brute_tilted_table(img: &GrayImage, big_x: i64, big_y: i64) -> i64 {
        let (w, h) = img.dimensions();
        let mut total = 0i64;
        for y in 0..(h as i64).min(big_y) {
            for x in 0..w as i64 {
                if (x - big_x + 1).abs() <= big_y - y - 1 {
                    total += img.get_pixel(x as u32, y as u32)[0] as i64;
                }
            }
        }
        total
    }

    #[test]
    fn upright_sums_match_brute_force() {
        let img = ramp(9, 7);
        let ii = IntegralImages::new(&img, false);
        assert_eq!(ii.width(), 9);
        assert_eq!(ii.height(), 7);
        for (x, y, w, h) in [(0, 0, 9, 7), (2, 1, 3, 4), (8, 6, 1, 1), (4, 0, 5, 2)] {
            assert_eq!(ii.rect_sum(x, y, w, h), brute_sum(&img, x as u32, y as u32, w as u32, h as u32));
        }
    }

    #[test]
    fn squared_sum_of_constant_image() {
        let img = GrayImage::from_pixel(4, 4, Luma([3]));
        let ii = IntegralImages::new(&img, false);
        assert_eq!(ii.rect_sqsum(0, 0, 4, 4), 16 * 9);
        assert_eq!(ii.rect_sqsum(1, 1, 2, 2), 4 * 9);
    }

    #[test]
    fn tilted_table_matches_definition() {
        let img = ramp(6, 5);
        let table = TiltedIntegral::new(img.as_raw(), 6, 5);
        for y in 0..=5i64 {
            for x in -2..=8i64 {
                assert_eq!(table.at(x, y), brute_tilted_table(&img, x, y), "T({x}, {y})");
            }
        }
    }

    #[test]
    fn tilted_rect_of_constant_image_counts_pixels() {
        let img = GrayImage::from_pixel(12, 12, Luma([1]));
        let ii = IntegralImages::new(&img, true);
        // A unit tilted square covers two pixels in this discretization.
        assert_eq!(ii.tilted_sum(5, 2, 1, 1), 2);
        assert!(ii.tilted_sum(6, 1, 3, 2) > 0);
    }
}
