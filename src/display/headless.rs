//! Display without a screen: scripted input, recorded frames

use std::collections::VecDeque;
use std::time::Duration;

use crate::error::ShowError;
use crate::input::RawEvent;
use crate::render::{Canvas, DrawList};

use super::{Display, Size, Surface, SurfaceId, WindowRole};

/// One submitted frame
#[derive(Clone, Debug)]
pub struct SubmittedFrame {
    pub surface: SurfaceId,
    pub role: WindowRole,
    /// Count of completed `end_frame` calls when this was submitted
    pub tick: u64,
    pub list: DrawList,
    pub canvas: Option<Canvas>,
}

#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    windows: Vec<(WindowRole, Size)>,
    events: VecDeque<RawEvent>,
    frames: Vec<SubmittedFrame>,
    ticks: u64,
    render_canvas: bool,
    fail_submissions: bool,
}

impl HeadlessDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also execute every frame through the software canvas
    #[must_use]
    pub fn with_canvas(mut self) -> Self {
        self.render_canvas = true;
        self
    }

    pub fn push_event(&mut self, event: RawEvent) {
        self.events.push_back(event);
    }

    pub fn push_events(&mut self, events: impl IntoIterator<Item = RawEvent>) {
        self.events.extend(events);
    }

    /// Make every later `submit_frame` fail
    pub fn set_fail_submissions(&mut self, fail: bool) {
        self.fail_submissions = fail;
    }

    #[must_use]
    pub fn frames(&self) -> &[SubmittedFrame] {
        &self.frames
    }

    pub fn frames_for(&self, role: WindowRole) -> impl Iterator<Item = &SubmittedFrame> {
        self.frames.iter().filter(move |f| f.role == role)
    }

    #[must_use]
    pub fn last_frame(&self, role: WindowRole) -> Option<&SubmittedFrame> {
        self.frames.iter().rev().find(|f| f.role == role)
    }

    pub fn clear_frames(&mut self) {
        self.frames.clear();
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub fn window_size(&self, role: WindowRole) -> Option<Size> {
        self.windows
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, size)| *size)
    }
}

impl Display for HeadlessDisplay {
    fn create_window(&mut self, role: WindowRole, size: Size) -> Result<Surface, ShowError> {
        let id = SurfaceId(self.windows.len() as u32);
        self.windows.push((role, size));
        Ok(Surface { id, size })
    }

    fn submit_frame(&mut self, surface: SurfaceId, frame: &DrawList) -> Result<(), ShowError> {
        if self.fail_submissions {
            return Err(ShowError::display("headless submission disabled"));
        }
        let (role, _) = self
            .windows
            .get(surface.0 as usize)
            .copied()
            .ok_or_else(|| ShowError::display(format!("unknown surface {}", surface.0)))?;

        // Track the latest size so window_size reflects resizes.
        if let Some(entry) = self.windows.get_mut(surface.0 as usize) {
            entry.1 = Size::new(frame.width, frame.height);
        }

        self.frames.push(SubmittedFrame {
            surface,
            role,
            tick: self.ticks,
            list: frame.clone(),
            canvas: self.render_canvas.then(|| Canvas::render(frame)),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), ShowError> {
        self.ticks += 1;
        Ok(())
    }

    fn poll_input(&mut self, _timeout: Duration) -> Result<Vec<RawEvent>, ShowError> {
        Ok(self.events.drain(..).collect())
    }
}
