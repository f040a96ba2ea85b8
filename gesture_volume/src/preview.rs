//! Preview window using `minifb`.

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::error::PreviewError;
use crate::overlay::Canvas;

/// Where the pipeline sends each finished frame.
pub trait FrameSink {
    /// Show `canvas`. Returns `false` once the user asked to quit.
    fn show(&mut self, canvas: &Canvas) -> bool;
}

pub struct Preview {
    window: Window,
    width:  usize,
    height: usize,
}

impl Preview {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self, PreviewError> {
        let mut window = Window::new(
            title,
            width, height,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| PreviewError::Window(e.to_string()))?;

        // Frame pacing comes from the camera.
        window.limit_update_rate(None);

        Ok(Preview { window, width, height })
    }

    /// True once `q` has been pressed or the window closed.
    pub fn quit_requested(&self) -> bool {
        !self.window.is_open() || self.window.is_key_pressed(Key::Q, KeyRepeat::No)
    }
}

impl FrameSink for Preview {
    fn show(&mut self, canvas: &Canvas) -> bool {
        if canvas.width != self.width || canvas.height != self.height {
            log::warn!(
                "frame size changed {}x{} → {}x{}; preview is stretched",
                self.width, self.height, canvas.width, canvas.height
            );
            self.width  = canvas.width;
            self.height = canvas.height;
        }
        if let Err(e) = self.window.update_with_buffer(&canvas.buf, canvas.width, canvas.height) {
            log::warn!("preview update failed: {}", e);
        }
        !self.quit_requested()
    }
}
