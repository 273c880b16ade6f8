//! X11 overlay window
//!
//! A borderless override-redirect window that stays on top, optionally
//! passes clicks through (empty SHAPE input region), and blits animation
//! frames with RENDER. Surfaces drag gestures to the tick loop as
//! [`WindowEvent`]s. Every OS call after construction degrades silently:
//! a failed topmost/click-through/opacity call logs and leaves the pet
//! otherwise functional.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::render::{
    ConnectionExt as RenderExt, CreatePictureAux, PictOp, Pictformat, Picture,
};
use x11rb::protocol::shape::{ConnectionExt as ShapeExt, SK, SO};
use x11rb::protocol::xproto::*;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as WrapperExt;

use crate::animation::Frame;
use crate::constants::{behavior, mouse, x11};
use crate::types::{Dimensions, Position, ScreenBounds};

/// Input events surfaced to the tick loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    DragStarted,
    /// Desired window top-left while dragging
    DragMoved(Position),
    DragReleased,
}

/// Pre-cached X11 atoms to avoid repeated roundtrips
struct CachedAtoms {
    net_wm_state: Atom,
    net_wm_state_above: Atom,
    net_wm_window_opacity: Atom,
    wm_class: Atom,
}

impl CachedAtoms {
    fn new(conn: &RustConnection) -> Result<Self> {
        let intern = |name: &[u8]| -> Result<Atom> {
            Ok(conn
                .intern_atom(false, name)
                .context("Failed to send intern_atom request")?
                .reply()
                .context("Failed to get intern_atom reply")?
                .atom)
        };
        Ok(Self {
            net_wm_state: intern(b"_NET_WM_STATE")?,
            net_wm_state_above: intern(b"_NET_WM_STATE_ABOVE")?,
            net_wm_window_opacity: intern(b"_NET_WM_WINDOW_OPACITY")?,
            wm_class: intern(b"WM_CLASS")?,
        })
    }
}

/// Translates raw pointer events into drag gestures. A drag only starts
/// once the pointer travels past the threshold with the button held, so
/// plain clicks never move the pet.
#[derive(Debug, Default)]
struct DragTracker {
    pressed: bool,
    dragging: bool,
    press_root: Position,
    win_start: Position,
}

impl DragTracker {
    fn on_press(&mut self, root: Position, win: Position) {
        self.pressed = true;
        self.dragging = false;
        self.press_root = root;
        self.win_start = win;
    }

    fn on_motion(&mut self, root: Position, out: &mut Vec<WindowEvent>) {
        if !self.pressed {
            return;
        }
        let dx = root.x - self.press_root.x;
        let dy = root.y - self.press_root.y;
        if !self.dragging {
            if dx.abs() <= behavior::DRAG_THRESHOLD && dy.abs() <= behavior::DRAG_THRESHOLD {
                return;
            }
            self.dragging = true;
            out.push(WindowEvent::DragStarted);
        }
        out.push(WindowEvent::DragMoved(Position::new(
            self.win_start.x + dx,
            self.win_start.y + dy,
        )));
    }

    fn on_release(&mut self, out: &mut Vec<WindowEvent>) {
        if self.dragging {
            out.push(WindowEvent::DragReleased);
        }
        self.pressed = false;
        self.dragging = false;
    }
}

pub struct PetWindow {
    conn: RustConnection,
    root: Window,
    window: Window,
    gc: Gcontext,
    atoms: CachedAtoms,
    drag: DragTracker,

    size: Dimensions,
    position: Position,
    screen_bounds: ScreenBounds,
    dpi_scale: f32,

    depth: u8,
    has_alpha: bool,
    pict_format: Pictformat,
    window_picture: Picture,
    /// Staging pixmap and picture, recreated when the frame size changes
    staging: Option<(Pixmap, Picture, Dimensions)>,
}

impl PetWindow {
    /// Create and map the overlay window. This is the only fatal failure
    /// path in the program.
    pub fn new(size: Dimensions, position: Position) -> Result<Self> {
        let (conn, screen_num) = x11rb::connect(None).context("Failed to connect to X11")?;
        let screen = &conn.setup().roots[screen_num];
        let screen_bounds =
            ScreenBounds::new(screen.width_in_pixels as u32, screen.height_in_pixels as u32);
        let dpi_scale = derive_dpi_scale(screen);
        info!(
            screen = screen_num,
            width = screen.width_in_pixels,
            height = screen.height_in_pixels,
            dpi_scale = dpi_scale,
            "connected to x11"
        );

        // Prefer a 32-bit visual so frame alpha composites against the
        // desktop; fall back to the root visual where none exists.
        let argb = find_argb_visual(screen);
        let (depth, visual, has_alpha) = match argb {
            Some(visual) => (x11::ARGB_DEPTH, visual, true),
            None => {
                warn!("no 32-bit visual available, pet background will be opaque");
                (screen.root_depth, screen.root_visual, false)
            }
        };

        let window = conn.generate_id().context("Failed to generate window ID")?;
        let colormap = conn.generate_id().context("Failed to generate colormap ID")?;
        conn.create_colormap(ColormapAlloc::NONE, colormap, screen.root, visual)
            .context("Failed to create colormap")?;
        conn.create_window(
            depth,
            window,
            screen.root,
            position.x as i16,
            position.y as i16,
            size.width as u16,
            size.height as u16,
            0,
            WindowClass::INPUT_OUTPUT,
            visual,
            &CreateWindowAux::new()
                .override_redirect(x11::OVERRIDE_REDIRECT)
                .border_pixel(0)
                .background_pixel(0)
                .colormap(colormap)
                .event_mask(
                    EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::BUTTON1_MOTION
                        | EventMask::EXPOSURE,
                ),
        )
        .context("Failed to create overlay window")?;

        let gc = conn.generate_id().context("Failed to generate GC ID")?;
        conn.create_gc(gc, window, &CreateGCAux::new())
            .context("Failed to create graphics context")?;

        let atoms = CachedAtoms::new(&conn)?;
        conn.change_property8(
            PropMode::REPLACE,
            window,
            atoms.wm_class,
            AtomEnum::STRING,
            b"scamper\0scamper\0",
        )
        .context("Failed to set WM_CLASS")?;

        let pict_format = find_pict_format(&conn, depth, has_alpha)
            .context("Failed to find a RENDER picture format for the overlay")?;
        let window_picture = conn.generate_id().context("Failed to generate picture ID")?;
        conn.render_create_picture(window_picture, window, pict_format, &CreatePictureAux::new())
            .context("Failed to create window picture")?;

        conn.map_window(window).context("Failed to map overlay window")?;
        conn.flush().context("Failed to flush after window setup")?;
        info!(window = window, "mapped pet window");

        let root = screen.root;
        Ok(Self {
            conn,
            root,
            window,
            gc,
            atoms,
            drag: DragTracker::default(),
            size,
            position,
            screen_bounds,
            dpi_scale,
            depth,
            has_alpha,
            pict_format,
            window_picture,
            staging: None,
        })
    }

    pub fn screen_bounds(&self) -> ScreenBounds {
        self.screen_bounds
    }

    pub fn dpi_scale(&self) -> f32 {
        self.dpi_scale
    }

    /// Pointer position in root coordinates, `None` on a transient failure
    pub fn cursor_position(&self) -> Option<Position> {
        match self.conn.query_pointer(self.root).map(|c| c.reply()) {
            Ok(Ok(reply)) => Some(Position::new(reply.root_x as i32, reply.root_y as i32)),
            Ok(Err(err)) => {
                debug!(error = %err, "query_pointer reply failed");
                None
            }
            Err(err) => {
                debug!(error = %err, "query_pointer request failed");
                None
            }
        }
    }

    /// Drain pending X events into drag gestures
    pub fn poll_events(&mut self) -> Vec<WindowEvent> {
        let mut out = Vec::new();
        loop {
            match self.conn.poll_for_event() {
                Ok(Some(event)) => self.translate(event, &mut out),
                Ok(None) => break,
                Err(err) => {
                    error!(error = %err, "lost X11 connection while polling events");
                    break;
                }
            }
        }
        out
    }

    fn translate(&mut self, event: Event, out: &mut Vec<WindowEvent>) {
        match event {
            Event::ButtonPress(event) if event.detail == mouse::BUTTON_LEFT => {
                self.drag.on_press(
                    Position::new(event.root_x as i32, event.root_y as i32),
                    self.position,
                );
            }
            Event::MotionNotify(event) => {
                self.drag
                    .on_motion(Position::new(event.root_x as i32, event.root_y as i32), out);
            }
            Event::ButtonRelease(event) if event.detail == mouse::BUTTON_LEFT => {
                self.drag.on_release(out);
            }
            _ => {}
        }
    }

    /// Move the window; only called when the controller's apply gate fired
    pub fn apply_position(&mut self, position: Position) {
        self.position = position;
        if let Err(err) = self.conn.configure_window(
            self.window,
            &ConfigureWindowAux::new()
                .x(position.x)
                .y(position.y),
        ) {
            error!(error = %err, "failed to move window");
        }
    }

    /// Upload a frame and composite it onto the window, resizing the window
    /// when the frame size changed (scale switch).
    pub fn present(&mut self, frame: &Frame) {
        let dims = Dimensions::new(frame.width, frame.height);
        if dims != self.size {
            self.size = dims;
            if let Err(err) = self.conn.configure_window(
                self.window,
                &ConfigureWindowAux::new()
                    .width(dims.width)
                    .height(dims.height),
            ) {
                error!(error = %err, "failed to resize window");
            }
        }
        if let Err(err) = self.blit(frame, dims) {
            error!(error = %err, "failed to present frame");
        }
    }

    fn blit(&mut self, frame: &Frame, dims: Dimensions) -> Result<()> {
        let (pixmap, picture) = self.staging_for(dims)?;

        // ARGB u32 → X11 native little-endian BGRA bytes
        let mut image_data = Vec::with_capacity(frame.data.len() * 4);
        for pixel in &frame.data {
            image_data.push(*pixel as u8); // B
            image_data.push((pixel >> 8) as u8); // G
            image_data.push((pixel >> 16) as u8); // R
            image_data.push((pixel >> 24) as u8); // A
        }

        self.conn
            .put_image(
                ImageFormat::Z_PIXMAP,
                pixmap,
                self.gc,
                dims.width as u16,
                dims.height as u16,
                0,
                0,
                0,
                self.depth,
                &image_data,
            )
            .context("Failed to upload frame image")?;
        self.conn
            .render_composite(
                PictOp::SRC,
                picture,
                0u32,
                self.window_picture,
                0,
                0,
                0,
                0,
                0,
                0,
                dims.width as u16,
                dims.height as u16,
            )
            .context("Failed to composite frame onto window")?;
        Ok(())
    }

    /// Staging pixmap matching the frame size, recreated on size change
    fn staging_for(&mut self, dims: Dimensions) -> Result<(Pixmap, Picture)> {
        if let Some((pixmap, picture, cached)) = self.staging
            && cached == dims
        {
            return Ok((pixmap, picture));
        }
        if let Some((pixmap, picture, _)) = self.staging.take() {
            let _ = self.conn.render_free_picture(picture);
            let _ = self.conn.free_pixmap(pixmap);
        }

        let pixmap = self.conn.generate_id().context("Failed to generate pixmap ID")?;
        self.conn
            .create_pixmap(
                self.depth,
                pixmap,
                self.window,
                dims.width as u16,
                dims.height as u16,
            )
            .context("Failed to create staging pixmap")?;
        let picture = self.conn.generate_id().context("Failed to generate picture ID")?;
        self.conn
            .render_create_picture(picture, pixmap, self.pict_format, &CreatePictureAux::new())
            .context("Failed to create staging picture")?;
        self.staging = Some((pixmap, picture, dims));
        Ok((pixmap, picture))
    }

    /// Empty SHAPE input region passes all clicks to the windows below;
    /// resetting the mask restores normal input.
    pub fn set_click_through(&mut self, enabled: bool) {
        let result = if enabled {
            self.conn
                .shape_rectangles(
                    SO::SET,
                    SK::INPUT,
                    ClipOrdering::UNSORTED,
                    self.window,
                    0,
                    0,
                    &[],
                )
                .map(|_| ())
        } else {
            self.conn
                .shape_mask(SO::SET, SK::INPUT, self.window, 0, 0, x11rb::NONE)
                .map(|_| ())
        };
        match result {
            Ok(()) => info!(enabled = enabled, "click-through updated"),
            Err(err) => warn!(error = %err, "click-through unavailable, continuing without"),
        }
    }

    pub fn set_topmost(&mut self, enabled: bool) {
        let result = if enabled {
            self.conn
                .change_property32(
                    PropMode::REPLACE,
                    self.window,
                    self.atoms.net_wm_state,
                    AtomEnum::ATOM,
                    &[self.atoms.net_wm_state_above],
                )
                .map(|_| ())
                .and_then(|_| {
                    self.conn
                        .configure_window(
                            self.window,
                            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
                        )
                        .map(|_| ())
                })
        } else {
            self.conn
                .delete_property(self.window, self.atoms.net_wm_state)
                .map(|_| ())
        };
        if let Err(err) = result {
            warn!(error = %err, "topmost unavailable, continuing without");
        }
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        let value = (opacity.clamp(0.0, 1.0) as f64 * u32::MAX as f64) as u32;
        if let Err(err) = self.conn.change_property32(
            PropMode::REPLACE,
            self.window,
            self.atoms.net_wm_window_opacity,
            AtomEnum::CARDINAL,
            &[value],
        ) {
            warn!(error = %err, "opacity unavailable, continuing without");
        }
    }

    pub fn flush(&mut self) {
        if let Err(err) = self.conn.flush() {
            error!(error = %err, "failed to flush X11 connection");
        }
    }
}

impl Drop for PetWindow {
    fn drop(&mut self) {
        if let Some((pixmap, picture, _)) = self.staging.take() {
            let _ = self.conn.render_free_picture(picture);
            let _ = self.conn.free_pixmap(pixmap);
        }
        let _ = self.conn.render_free_picture(self.window_picture);
        let _ = self.conn.free_gc(self.gc);
        let _ = self.conn.destroy_window(self.window);
        let _ = self.conn.flush();
    }
}

fn derive_dpi_scale(screen: &Screen) -> f32 {
    if screen.width_in_millimeters == 0 {
        return 1.0;
    }
    let dpi = screen.width_in_pixels as f32 * x11::MM_PER_INCH
        / screen.width_in_millimeters as f32;
    (dpi / x11::BASE_DPI).max(0.5)
}

fn find_argb_visual(screen: &Screen) -> Option<Visualid> {
    screen
        .allowed_depths
        .iter()
        .find(|d| d.depth == x11::ARGB_DEPTH)?
        .visuals
        .first()
        .map(|v| v.visual_id)
}

fn find_pict_format(conn: &RustConnection, depth: u8, alpha: bool) -> Result<Pictformat> {
    conn.render_query_pict_formats()
        .context("Failed to query RENDER picture formats")?
        .reply()
        .context("Failed to get RENDER picture formats reply")?
        .formats
        .iter()
        .find(|format| {
            format.depth == depth
                && if alpha {
                    format.direct.alpha_mask != 0
                } else {
                    format.direct.alpha_mask == 0
                }
        })
        .map(|format| format.id)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no RENDER picture format for depth={depth} alpha={alpha}"
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clicks_without_movement_never_start_a_drag() {
        let mut tracker = DragTracker::default();
        let mut out = Vec::new();
        tracker.on_press(Position::new(100, 100), Position::new(50, 50));
        tracker.on_motion(Position::new(102, 101), &mut out);
        tracker.on_release(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn drag_starts_past_threshold_and_tracks_the_delta() {
        let mut tracker = DragTracker::default();
        let mut out = Vec::new();
        tracker.on_press(Position::new(100, 100), Position::new(50, 50));
        tracker.on_motion(Position::new(110, 103), &mut out);
        assert_eq!(
            out,
            vec![
                WindowEvent::DragStarted,
                WindowEvent::DragMoved(Position::new(60, 53)),
            ]
        );

        out.clear();
        tracker.on_motion(Position::new(90, 120), &mut out);
        assert_eq!(out, vec![WindowEvent::DragMoved(Position::new(40, 70))]);

        out.clear();
        tracker.on_release(&mut out);
        assert_eq!(out, vec![WindowEvent::DragReleased]);
    }

    #[test]
    fn motion_without_press_is_ignored() {
        let mut tracker = DragTracker::default();
        let mut out = Vec::new();
        tracker.on_motion(Position::new(500, 500), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn release_resets_for_the_next_gesture() {
        let mut tracker = DragTracker::default();
        let mut out = Vec::new();
        tracker.on_press(Position::new(0, 0), Position::new(10, 10));
        tracker.on_motion(Position::new(20, 0), &mut out);
        tracker.on_release(&mut out);

        out.clear();
        tracker.on_motion(Position::new(40, 0), &mut out);
        assert!(out.is_empty());
    }
}
