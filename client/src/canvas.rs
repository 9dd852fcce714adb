//! Rendering surface seam between the drawing engine and macroquad

use macroquad::prelude::*;
use shared::Segment;

pub const DEFAULT_STROKE_WIDTH: f32 = 3.0;

/// The operations the drawing engine needs from a rendering target.
pub trait CanvasSurface {
    fn draw_segment(&mut self, segment: &Segment);

    fn clear(&mut self);

    /// Recreates the backing surface at the new logical size with the
    /// pixel-ratio scale and stroke style re-applied. Prior strokes are
    /// lost; resize is a presentation concern, not a protocol one.
    fn resize(&mut self, width: f32, height: f32);

    /// Encodes the current surface contents as an image blob.
    fn capture(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    fn scale_factor(&self) -> f32;
}

/// Offscreen drawing surface backed by a macroquad render target.
pub struct MacroquadCanvas {
    target: RenderTarget,
    width: f32,
    height: f32,
    scale_factor: f32,
    stroke_width: f32,
    stroke_color: Color,
}

impl MacroquadCanvas {
    pub fn new(width: f32, height: f32, scale_factor: f32) -> Self {
        let canvas = MacroquadCanvas {
            target: Self::create_target(width, height, scale_factor),
            width,
            height,
            scale_factor,
            stroke_width: DEFAULT_STROKE_WIDTH,
            stroke_color: BLACK,
        };
        canvas.fill_background();
        canvas
    }

    pub fn set_stroke(&mut self, width: f32, color: Color) {
        self.stroke_width = width;
        self.stroke_color = color;
    }

    pub fn texture(&self) -> &Texture2D {
        &self.target.texture
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn create_target(width: f32, height: f32, scale_factor: f32) -> RenderTarget {
        let target = render_target(
            (width * scale_factor) as u32,
            (height * scale_factor) as u32,
        );
        target.texture.set_filter(FilterMode::Linear);
        target
    }

    fn with_target<F: FnOnce()>(&self, draw: F) {
        let mut camera = Camera2D::from_display_rect(Rect::new(
            0.0,
            0.0,
            self.width * self.scale_factor,
            self.height * self.scale_factor,
        ));
        camera.render_target = Some(self.target.clone());
        set_camera(&camera);
        draw();
        set_default_camera();
    }

    fn fill_background(&self) {
        self.with_target(|| clear_background(WHITE));
    }
}

impl CanvasSurface for MacroquadCanvas {
    fn draw_segment(&mut self, segment: &Segment) {
        // Segments arrive in logical coordinates; the pixel-ratio transform
        // is applied here, identically on every participant's surface.
        let scaled = segment.scaled(self.scale_factor);
        let width = self.stroke_width * self.scale_factor;
        let color = self.stroke_color;
        self.with_target(|| {
            draw_line(
                scaled.start.x,
                scaled.start.y,
                scaled.end.x,
                scaled.end.y,
                width,
                color,
            );
        });
    }

    fn clear(&mut self) {
        self.fill_background();
    }

    fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.target = Self::create_target(width, height, self.scale_factor);
        self.fill_background();
    }

    fn capture(&mut self) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let image = self.target.texture.get_texture_data();

        let mut encoded = Vec::new();
        {
            let mut encoder =
                png::Encoder::new(&mut encoded, image.width as u32, image.height as u32);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&image.bytes)?;
        }
        Ok(encoded)
    }

    fn scale_factor(&self) -> f32 {
        self.scale_factor
    }
}
