// src/frames.rs - Input frames for the network: tensors and the three-frame window
use image::imageops::FilterType;
use image::DynamicImage;

/// Square RGB image as `f32` in [0, 1], row-major HWC.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTensor {
    pub size: usize,
    pub data: Vec<f32>,
}

impl FrameTensor {
    pub fn blank(size: usize) -> Self {
        Self {
            size,
            data: vec![0.0; size * size * 3],
        }
    }

    /// Resizes to `size x size` (ignoring aspect ratio) and normalizes.
    pub fn from_image(image: &DynamicImage, size: u32) -> Self {
        let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
        let data = resized.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self {
            size: size as usize,
            data,
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> [f32; 3] {
        let i = (y * self.size + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// The three frames handed to the network, newest first. The network's three
/// inputs are not interchangeable.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameWindow {
    pub newest: FrameTensor,
    pub middle: FrameTensor,
    pub oldest: FrameTensor,
}

impl FrameWindow {
    pub fn filled(frame: FrameTensor) -> Self {
        Self {
            newest: frame.clone(),
            middle: frame.clone(),
            oldest: frame,
        }
    }
}

/// Keeps the latest frame plus two older ones spaced at least `min_gap`
/// seconds apart.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    window: Option<FrameWindow>,
    last_capture: f64,
    min_gap: f64,
}

impl FrameBuffer {
    pub fn new(min_gap: f64) -> Self {
        Self {
            window: None,
            last_capture: 0.0,
            min_gap,
        }
    }

    /// The first frame fills every slot. Later frames shift the window once
    /// `min_gap` has passed since the last shift, otherwise they only replace
    /// the newest slot.
    pub fn push(&mut self, frame: FrameTensor, elapsed: f64) {
        let shift = elapsed - self.last_capture > self.min_gap;
        match self.window.as_mut() {
            Some(window) if shift => {
                let newest = std::mem::replace(&mut window.newest, frame);
                window.oldest = std::mem::replace(&mut window.middle, newest);
                self.last_capture = elapsed;
            }
            Some(window) => window.newest = frame,
            None => {
                self.window = Some(FrameWindow::filled(frame));
                self.last_capture = elapsed;
            }
        }
    }

    pub fn window(&self) -> Option<&FrameWindow> {
        self.window.as_ref()
    }
}
