use std::io::{self, Write};

use livefakecheck_core::capture::domain::frame_source::FrameSourceError;
use livefakecheck_core::display::frame_renderer::FrameRenderer;
use livefakecheck_core::inference::status::InferenceStatus;
use livefakecheck_core::shared::frame::Frame;

/// Writes a single, continuously overwritten status line.
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    last_line: String,
    rendered_any: bool,
}

impl TerminalRenderer<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_line: String::new(),
            rendered_any: false,
        }
    }

    fn show(&mut self, line: String) -> Result<(), Box<dyn std::error::Error>> {
        if line == self.last_line {
            return Ok(());
        }
        // Pad so a shorter line fully covers the previous one
        let width = self.last_line.len().max(line.len());
        write!(self.out, "\r{line:width$}")?;
        self.out.flush()?;
        self.last_line = line;
        Ok(())
    }
}

impl<W: Write + Send> FrameRenderer for TerminalRenderer<W> {
    fn render(
        &mut self,
        frame: &Frame,
        status: &InferenceStatus,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.rendered_any = true;
        self.show(format!("{status}  [{}x{}]", frame.width(), frame.height()))
    }

    fn capture_issue(
        &mut self,
        error: &FrameSourceError,
    ) -> Result<(), Box<dyn std::error::Error>> {
        // A live camera has ticks with no frame ready; keep the last status
        if self.rendered_any && matches!(error, FrameSourceError::EndOfStream) {
            return Ok(());
        }
        self.show(error.status_text().to_string())
    }
}
