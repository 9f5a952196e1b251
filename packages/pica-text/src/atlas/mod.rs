//! Rectangle-packed atlas pages
//!
//! A shelf packer over an arena of CPU-side RGBA8 pages. Pages are addressed
//! by index; holders keep `(packer, page_index)` instead of pointers into the
//! arena, so the page vector can grow freely.

use image::{GenericImageView, RgbaImage};

/// Location of a packed rectangle inside an [`ImagePacker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedRect {
    pub page: usize,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Amount of fully transparent border removed from a packed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Trim {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

struct Shelf {
    y: u32,
    height: u32,
    cursor_x: u32,
}

/// One atlas texture.
pub struct AtlasPage {
    image: RgbaImage,
    shelves: Vec<Shelf>,
    next_shelf_y: u32,
}

impl AtlasPage {
    fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            shelves: Vec::new(),
            next_shelf_y: 0,
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn allocate(&mut self, w: u32, h: u32, padding: u32) -> Option<(u32, u32)> {
        let page_w = self.image.width();
        let page_h = self.image.height();
        if w > page_w || h > page_h {
            return None;
        }
        for shelf in &mut self.shelves {
            if h <= shelf.height && shelf.cursor_x + w <= page_w {
                let slot = (shelf.cursor_x, shelf.y);
                shelf.cursor_x += w + padding;
                return Some(slot);
            }
        }
        if self.next_shelf_y + h <= page_h {
            let y = self.next_shelf_y;
            self.shelves.push(Shelf {
                y,
                height: h,
                cursor_x: w + padding,
            });
            self.next_shelf_y += h + padding;
            return Some((0, y));
        }
        None
    }
}

/// Shelf packer maintaining a growing arena of fixed-size pages.
pub struct ImagePacker {
    page_width: u32,
    page_height: u32,
    padding: u32,
    pages: Vec<AtlasPage>,
}

impl ImagePacker {
    pub fn new(page_width: u32, page_height: u32, padding: u32) -> Self {
        Self {
            page_width,
            page_height,
            padding,
            pages: Vec::new(),
        }
    }

    /// Adopt a pre-built image as a whole page; used when a font's
    /// descriptor already ships packed pages.
    pub fn adopt_page(&mut self, image: RgbaImage) -> usize {
        let mut page = AtlasPage::new(image.width(), image.height());
        page.next_shelf_y = image.height();
        page.image = image;
        self.pages.push(page);
        self.pages.len() - 1
    }

    /// Pack `source` into the arena, copying its pixels. Opens a new page
    /// when no existing page can fit the rectangle.
    pub fn pack(&mut self, source: &RgbaImage) -> PackedRect {
        let (w, h) = source.dimensions();
        for (index, page) in self.pages.iter_mut().enumerate() {
            if let Some((x, y)) = page.allocate(w, h, self.padding) {
                blit(source, &mut page.image, x, y);
                return PackedRect {
                    page: index,
                    x,
                    y,
                    width: w,
                    height: h,
                };
            }
        }
        let mut page = AtlasPage::new(self.page_width.max(w), self.page_height.max(h));
        let (x, y) = page
            .allocate(w, h, self.padding)
            .unwrap_or((0, 0));
        blit(source, &mut page.image, x, y);
        self.pages.push(page);
        PackedRect {
            page: self.pages.len() - 1,
            x,
            y,
            width: w,
            height: h,
        }
    }

    /// Trim fully transparent borders off `source`, then pack the remainder.
    /// Answers `None` when the image has no opaque pixels at all.
    pub fn pack_trimmed(&mut self, source: &RgbaImage) -> Option<(PackedRect, Trim)> {
        let trim = transparent_border(source)?;
        let view = source
            .view(
                trim.left,
                trim.top,
                source.width() - trim.left - trim.right,
                source.height() - trim.top - trim.bottom,
            )
            .to_image();
        Some((self.pack(&view), trim))
    }

    pub fn pages(&self) -> &[AtlasPage] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Option<&AtlasPage> {
        self.pages.get(index)
    }
}

fn blit(source: &RgbaImage, target: &mut RgbaImage, x: u32, y: u32) {
    for (sx, sy, pixel) in source.enumerate_pixels() {
        let tx = x + sx;
        let ty = y + sy;
        if tx < target.width() && ty < target.height() {
            target.put_pixel(tx, ty, *pixel);
        }
    }
}

/// Fully transparent margin on each side, or `None` for an all-transparent
/// image.
fn transparent_border(image: &RgbaImage) -> Option<Trim> {
    let (w, h) = image.dimensions();
    let opaque_row = |y: u32| (0..w).any(|x| image.get_pixel(x, y)[3] != 0);
    let opaque_col = |x: u32| (0..h).any(|y| image.get_pixel(x, y)[3] != 0);

    let top = (0..h).find(|&y| opaque_row(y))?;
    let bottom = (0..h).rev().find(|&y| opaque_row(y)).unwrap_or(top);
    let left = (0..w).find(|&x| opaque_col(x)).unwrap_or(0);
    let right = (0..w).rev().find(|&x| opaque_col(x)).unwrap_or(left);

    Some(Trim {
        left,
        top,
        right: w - 1 - right,
        bottom: h - 1 - bottom,
    })
}
