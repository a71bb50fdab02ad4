//! Both windows in one terminal: audience pane on the left, presenter on
//! the right. Frames are drawn with half-block cells, two pixels per cell.

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyboardEnhancementFlags,
    MouseEvent, MouseEventKind, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, enable_raw_mode, supports_keyboard_enhancement};
use log::{debug, info};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Layout, Rect as CellRect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::error::ShowError;
use crate::input::{Key, MouseButton, RawEvent};
use crate::panic_handler::restore_terminal;
use crate::render::{Canvas, DrawList, Rgb};

use super::{Display, Size, Surface, SurfaceId, WindowRole};

/// Without release events a press this soon after the last one of the same
/// key is taken as auto-repeat.
const REPEAT_GUESS: Duration = Duration::from_millis(90);

pub struct TerminalDisplay {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    surfaces: HashMap<SurfaceId, WindowRole>,
    frames: HashMap<WindowRole, Canvas>,
    reports_release: bool,
    last_press: Option<(Key, Instant)>,
}

impl TerminalDisplay {
    /// Take over the terminal: raw mode, alternate screen, mouse capture
    pub fn new() -> Result<Self, ShowError> {
        enable_raw_mode().map_err(ShowError::display)?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture).map_err(ShowError::display)?;

        let reports_release = matches!(supports_keyboard_enhancement(), Ok(true));
        if reports_release {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .map_err(ShowError::display)?;
        }
        info!("Terminal display ready (key release events: {reports_release})");

        let terminal = Terminal::new(CrosstermBackend::new(stdout)).map_err(ShowError::display)?;
        Ok(Self {
            terminal,
            surfaces: HashMap::new(),
            frames: HashMap::new(),
            reports_release,
            last_press: None,
        })
    }

    fn screen(&self) -> Result<CellRect, ShowError> {
        let size = self.terminal.size().map_err(ShowError::display)?;
        Ok(CellRect::new(0, 0, size.width, size.height))
    }

    fn pane_size(&self, role: WindowRole) -> Result<Size, ShowError> {
        let inner = pane_inner(pane_areas(self.screen()?), role);
        Ok(Size::new(
            u32::from(inner.width),
            u32::from(inner.height) * 2,
        ))
    }

    fn translate(&mut self, event: Event) -> Result<Vec<RawEvent>, ShowError> {
        let raw = match event {
            Event::Key(key) => self.translate_key(key).into_iter().collect(),
            Event::Mouse(mouse) => translate_mouse(mouse).into_iter().collect(),
            Event::Resize(width, height) => {
                debug!("Terminal resized to {width}x{height}");
                let mut out = Vec::with_capacity(2);
                for role in WindowRole::ALL {
                    out.push(RawEvent::Resized {
                        role,
                        size: self.pane_size(role)?,
                    });
                }
                out
            }
            _ => Vec::new(),
        };
        Ok(raw)
    }

    fn translate_key(&mut self, key: KeyEvent) -> Option<RawEvent> {
        let code = map_key(key.code)?;
        match key.kind {
            KeyEventKind::Release => Some(RawEvent::KeyUp { key: code }),
            KeyEventKind::Repeat => Some(RawEvent::repeat(code)),
            KeyEventKind::Press => {
                let now = Instant::now();
                let repeat = !self.reports_release
                    && self
                        .last_press
                        .is_some_and(|(last, at)| last == code && now - at < REPEAT_GUESS);
                self.last_press = Some((code, now));
                Some(RawEvent::KeyDown { key: code, repeat })
            }
        }
    }
}

impl Display for TerminalDisplay {
    fn create_window(&mut self, role: WindowRole, _size: Size) -> Result<Surface, ShowError> {
        let id = SurfaceId(self.surfaces.len() as u32);
        self.surfaces.insert(id, role);
        Ok(Surface {
            id,
            size: self.pane_size(role)?,
        })
    }

    fn submit_frame(&mut self, surface: SurfaceId, frame: &DrawList) -> Result<(), ShowError> {
        let role = *self
            .surfaces
            .get(&surface)
            .ok_or_else(|| ShowError::display(format!("unknown surface {}", surface.0)))?;
        self.frames.insert(role, Canvas::render(frame));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), ShowError> {
        let frames = &self.frames;
        self.terminal
            .draw(|f| {
                let panes = pane_areas(f.area());
                for role in WindowRole::ALL {
                    let outer = match role {
                        WindowRole::Audience => panes[0],
                        WindowRole::Presenter => panes[1],
                    };
                    f.render_widget(pane_block(role), outer);
                    if let Some(canvas) = frames.get(&role) {
                        let inner = pane_inner(panes, role);
                        f.render_widget(HalfBlocks(canvas), inner);
                        for overlay in &canvas.overlays {
                            let area = overlay_cells(inner, overlay.area);
                            let text = Paragraph::new(overlay.text.as_str())
                                .alignment(Alignment::Center)
                                .style(Style::default().fg(to_color(overlay.color)));
                            f.render_widget(text, area);
                        }
                    }
                }
            })
            .map_err(ShowError::display)?;
        Ok(())
    }

    fn poll_input(&mut self, timeout: Duration) -> Result<Vec<RawEvent>, ShowError> {
        let mut out = Vec::new();
        if !event::poll(timeout).map_err(ShowError::display)? {
            return Ok(out);
        }
        loop {
            let ev = event::read().map_err(ShowError::display)?;
            out.extend(self.translate(ev)?);
            if !event::poll(Duration::ZERO).map_err(ShowError::display)? {
                break;
            }
        }
        Ok(out)
    }
}

impl Drop for TerminalDisplay {
    fn drop(&mut self) {
        restore_terminal(self.reports_release);
    }
}

fn pane_areas(screen: CellRect) -> [CellRect; 2] {
    Layout::horizontal([Constraint::Percentage(55), Constraint::Percentage(45)]).areas(screen)
}

fn pane_block(role: WindowRole) -> Block<'static> {
    let title = match role {
        WindowRole::Audience => " Audience ",
        WindowRole::Presenter => " Presenter ",
    };
    Block::bordered()
        .title(title)
        .border_style(Style::default().fg(Color::DarkGray))
}

fn pane_inner(panes: [CellRect; 2], role: WindowRole) -> CellRect {
    let outer = match role {
        WindowRole::Audience => panes[0],
        WindowRole::Presenter => panes[1],
    };
    pane_block(role).inner(outer)
}

/// Pixel rect to the cell row at its vertical middle
fn overlay_cells(inner: CellRect, area: crate::render::Rect) -> CellRect {
    let x = inner.x.saturating_add(area.x.min(u32::from(u16::MAX)) as u16);
    let y = inner
        .y
        .saturating_add(((area.y + area.height / 2) / 2).min(u32::from(u16::MAX)) as u16);
    let width = (area.width.min(u32::from(u16::MAX)) as u16).min(inner.right().saturating_sub(x));
    let height = u16::from(y < inner.bottom());
    CellRect::new(x, y, width, height)
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

fn map_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::PageDown => Key::PageDown,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::Right => Key::Right,
        KeyCode::Left => Key::Left,
        KeyCode::Down => Key::Down,
        KeyCode::Up => Key::Up,
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Enter => Key::Enter,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Home => Key::Home,
        KeyCode::End => Key::End,
        KeyCode::Esc => Key::Escape,
        KeyCode::Char(c) => Key::Char(c),
        _ => return None,
    };
    Some(key)
}

fn translate_mouse(mouse: MouseEvent) -> Option<RawEvent> {
    match mouse.kind {
        MouseEventKind::Down(button) => {
            let button = match button {
                event::MouseButton::Left => MouseButton::Left,
                event::MouseButton::Right => MouseButton::Right,
                event::MouseButton::Middle => MouseButton::Middle,
            };
            Some(RawEvent::MouseDown { button })
        }
        MouseEventKind::ScrollDown => Some(RawEvent::Scroll { delta: 1 }),
        MouseEventKind::ScrollUp => Some(RawEvent::Scroll { delta: -1 }),
        _ => None,
    }
}

/// Paints a canvas with upper-half blocks: foreground is the top pixel,
/// background the bottom one.
struct HalfBlocks<'a>(&'a Canvas);

impl Widget for HalfBlocks<'_> {
    fn render(self, area: CellRect, buf: &mut Buffer) {
        let canvas = self.0;
        let cols = area.width.min(canvas.width.min(u32::from(u16::MAX)) as u16);
        let rows = area
            .height
            .min((canvas.height / 2).min(u32::from(u16::MAX)) as u16);
        for cy in 0..rows {
            for cx in 0..cols {
                let top = canvas.pixel(u32::from(cx), u32::from(cy) * 2);
                let bottom = canvas.pixel(u32::from(cx), u32::from(cy) * 2 + 1);
                if let Some(cell) = buf.cell_mut((area.x + cx, area.y + cy)) {
                    cell.set_symbol("▀")
                        .set_fg(Color::Rgb(top[0], top[1], top[2]))
                        .set_bg(Color::Rgb(bottom[0], bottom[1], bottom[2]));
                }
            }
        }
    }
}
