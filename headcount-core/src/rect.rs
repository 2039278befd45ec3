/// Axis-aligned rectangle in integer pixel coordinates.
///
/// `x`/`y` is the top-left corner. Rectangles are plain values: operations
/// return new rectangles instead of editing existing ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area in square pixels.
    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Center point, rounded toward the top-left.
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// `true` when both sides are strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Area of the intersection with `other`, zero when disjoint or merely touching.
    pub fn overlap_area(&self, other: &Rect) -> i64 {
        let overlap_x = (self.right().min(other.right()) - self.x.max(other.x)).max(0) as i64;
        let overlap_y = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0) as i64;
        overlap_x * overlap_y
    }

    /// Re-project a rectangle found on a horizontally flipped frame of width
    /// `frame_width` back into the unflipped frame.
    pub fn mirrored(&self, frame_width: u32) -> Rect {
        Rect {
            x: frame_width as i32 - self.x - self.width,
            ..*self
        }
    }
}

/// Dimensions of the source image every rectangle is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for FrameSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_of_nested_rectangles_is_inner_area() {
        let outer = Rect::new(0, 0, 40, 40);
        let inner = Rect::new(10, 10, 10, 10);
        assert_eq!(outer.overlap_area(&inner), 100);
        assert_eq!(inner.overlap_area(&outer), 100);
    }

    #[test]
    fn touching_rectangles_do_not_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(10, 0, 10, 10);
        let c = Rect::new(50, 50, 5, 5);
        assert_eq!(a.overlap_area(&b), 0);
        assert_eq!(a.overlap_area(&c), 0);
    }

    #[test]
    fn partial_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 6, 10, 10);
        assert_eq!(a.overlap_area(&b), 5 * 4);
    }

    #[test]
    fn mirrored_reprojects_x_only() {
        let r = Rect::new(10, 5, 20, 30);
        assert_eq!(r.mirrored(200), Rect::new(170, 5, 20, 30));
        assert_eq!(r.mirrored(200).mirrored(200), r);
    }

    #[test]
    fn center_and_edges() {
        let r = Rect::new(3, 4, 11, 6);
        assert_eq!(r.right(), 14);
        assert_eq!(r.bottom(), 10);
        assert_eq!(r.center(), (8, 7));
        assert!(r.is_valid());
        assert!(!Rect::new(0, 0, 0, 5).is_valid());
        assert!(!Rect::new(0, 0, 5, -1).is_valid());
    }
}
