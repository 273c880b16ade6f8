//! Animation assets
//!
//! Each behavior is an APNG decoded once at startup into ARGB frames with
//! per-frame delays. Directional behaviors only ship a rightward asset; the
//! left variant is mirrored in memory. A behavior whose asset is missing or
//! corrupt gets a static placeholder frame so the tick loop never stalls.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

use crate::constants::assets;
use crate::error::AssetError;
use crate::types::Dimensions;

/// One decoded animation frame, pixels in ARGB order (alpha high byte)
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub delay_ms: u32,
    pub data: Vec<u32>,
}

impl Frame {
    /// Horizontally mirrored copy
    fn mirrored(&self) -> Frame {
        let mut data = Vec::with_capacity(self.data.len());
        for row in self.data.chunks_exact(self.width as usize) {
            data.extend(row.iter().rev());
        }
        Frame {
            width: self.width,
            height: self.height,
            delay_ms: self.delay_ms,
            data,
        }
    }

    /// Nearest-neighbor rescale
    fn scaled(&self, scale: f32) -> Frame {
        let width = ((self.width as f32 * scale).round() as u32).max(1);
        let height = ((self.height as f32 * scale).round() as u32).max(1);
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                data.push(self.data[(src_y * self.width + src_x) as usize]);
            }
        }
        Frame {
            width,
            height,
            delay_ms: self.delay_ms,
            data,
        }
    }
}

/// Ordered, non-empty frame sequence for one behavior
#[derive(Debug, Clone)]
pub struct FrameSet {
    frames: Vec<Frame>,
}

impl FrameSet {
    fn new(frames: Vec<Frame>) -> Self {
        debug_assert!(!frames.is_empty());
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, index: usize) -> &Frame {
        &self.frames[index % self.frames.len()]
    }

    fn mirrored(&self) -> FrameSet {
        FrameSet::new(self.frames.iter().map(Frame::mirrored).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    Idle,
    Walk,
    Drag,
}

/// Frame selection produced by the controller each tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCue {
    pub kind: BehaviorKind,
    pub idle_variant: usize,
    pub facing: Facing,
    pub index: usize,
}

/// All frame sets, immutable after load and shared read-only
#[derive(Debug)]
pub struct AnimationLibrary {
    idle: Vec<FrameSet>,
    walk_right: FrameSet,
    walk_left: FrameSet,
    drag: FrameSet,
}

impl AnimationLibrary {
    /// Decode every behavior under `asset_root` at the given scale. Failures
    /// are logged per asset and replaced with the placeholder set.
    pub fn load(asset_root: &Path, scale: f32) -> Self {
        let walk_right = load_set(&asset_root.join(assets::WALK), scale);
        let walk_left = walk_right.mirrored();
        let drag = load_set(&asset_root.join(assets::DRAG), scale);

        let mut idle = Vec::new();
        for i in 1..=assets::IDLE_COUNT {
            let path = asset_root.join(format!("{}{}.png", assets::IDLE_PREFIX, i));
            match decode_apng(&path) {
                Ok(frames) => idle.push(FrameSet::new(scale_frames(frames, scale))),
                Err(err) => warn!(error = %err, "idle variant unavailable"),
            }
        }
        if idle.is_empty() {
            warn!("no idle animations decoded, using placeholder");
            idle.push(placeholder_set(scale));
        }

        Self {
            idle,
            walk_right,
            walk_left,
            drag,
        }
    }

    /// Library holding only placeholder frames; used when no asset directory
    /// exists at all, and by controller tests.
    pub fn fallback() -> Self {
        let set = placeholder_set(1.0);
        Self {
            idle: vec![set.clone()],
            walk_right: set.clone(),
            walk_left: set.mirrored(),
            drag: set,
        }
    }

    pub fn idle_variants(&self) -> usize {
        self.idle.len()
    }

    pub fn set(&self, kind: BehaviorKind, idle_variant: usize, facing: Facing) -> &FrameSet {
        match kind {
            BehaviorKind::Idle => &self.idle[idle_variant % self.idle.len()],
            BehaviorKind::Walk => match facing {
                Facing::Right => &self.walk_right,
                Facing::Left => &self.walk_left,
            },
            BehaviorKind::Drag => &self.drag,
        }
    }

    pub fn frame(&self, cue: &FrameCue) -> &Frame {
        self.set(cue.kind, cue.idle_variant, cue.facing).frame(cue.index)
    }

    /// On-screen pet size, taken from the first walk frame
    pub fn pet_size(&self) -> Dimensions {
        let frame = self.walk_right.frame(0);
        Dimensions::new(frame.width, frame.height)
    }
}

/// Advances a frame index on the frames' own delay schedule, measured in
/// tick time. Switching behavior or facing restarts the sequence.
#[derive(Debug)]
pub struct Animator {
    kind: BehaviorKind,
    idle_variant: usize,
    facing: Facing,
    index: usize,
    elapsed_ms: u32,
}

impl Animator {
    pub fn new() -> Self {
        Self {
            kind: BehaviorKind::Idle,
            idle_variant: 0,
            facing: Facing::Right,
            index: 0,
            elapsed_ms: 0,
        }
    }

    pub fn set_behavior(&mut self, kind: BehaviorKind, idle_variant: usize, facing: Facing) {
        if kind != self.kind || idle_variant != self.idle_variant || facing != self.facing {
            self.kind = kind;
            self.idle_variant = idle_variant;
            self.facing = facing;
            self.index = 0;
            self.elapsed_ms = 0;
        }
    }

    pub fn advance(&mut self, library: &AnimationLibrary, dt_ms: u32) -> FrameCue {
        let set = library.set(self.kind, self.idle_variant, self.facing);
        self.elapsed_ms += dt_ms;
        loop {
            let delay = set.frame(self.index).delay_ms.max(1);
            if self.elapsed_ms < delay {
                break;
            }
            self.elapsed_ms -= delay;
            self.index = (self.index + 1) % set.len();
        }
        FrameCue {
            kind: self.kind,
            idle_variant: self.idle_variant,
            facing: self.facing,
            index: self.index,
        }
    }
}

fn load_set(path: &Path, scale: f32) -> FrameSet {
    match decode_apng(path) {
        Ok(frames) => {
            info!(path = %path.display(), frames = frames.len(), "decoded animation");
            FrameSet::new(scale_frames(frames, scale))
        }
        Err(err) => {
            warn!(error = %err, "animation unavailable, using placeholder");
            placeholder_set(scale)
        }
    }
}

fn scale_frames(frames: Vec<Frame>, scale: f32) -> Vec<Frame> {
    if (scale - 1.0).abs() < f32::EPSILON {
        return frames;
    }
    frames.iter().map(|f| f.scaled(scale)).collect()
}

/// Single opaque rounded-square frame standing in for a missing asset
fn placeholder_set(scale: f32) -> FrameSet {
    const SIZE: u32 = 32;
    const BODY: u32 = 0xFF_E8_A0_B4;
    let mut data = vec![0u32; (SIZE * SIZE) as usize];
    for y in 0..SIZE {
        for x in 0..SIZE {
            let corner = (x < 4 || x >= SIZE - 4) && (y < 4 || y >= SIZE - 4);
            if !corner {
                data[(y * SIZE + x) as usize] = BODY;
            }
        }
    }
    let frame = Frame {
        width: SIZE,
        height: SIZE,
        delay_ms: assets::DEFAULT_DELAY_MS,
        data,
    };
    FrameSet::new(scale_frames(vec![frame], scale))
}

/// Decode a (possibly animated) PNG into ARGB frames. Sub-frames are
/// composited at their offsets onto a persistent canvas, so frames always
/// come out at full image size.
pub fn decode_apng(path: &Path) -> Result<Vec<Frame>, AssetError> {
    let file = File::open(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut decoder = png::Decoder::new(BufReader::new(file));
    decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
    let decode_err = |source| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = decoder.read_info().map_err(decode_err)?;
    let canvas_w = reader.info().width;
    let canvas_h = reader.info().height;
    let animated_frames = reader
        .info()
        .animation_control()
        .map(|ac| ac.num_frames)
        .unwrap_or(1)
        .max(1);

    // When the default image is not part of the animation it has no frame
    // control; decode and discard it.
    if reader.info().animation_control().is_some() && reader.info().frame_control().is_none() {
        let mut skip = vec![0u8; reader.output_buffer_size().expect("png output buffer size")];
        reader.next_frame(&mut skip).map_err(decode_err)?;
    }

    let mut buf = vec![0u8; reader.output_buffer_size().expect("png output buffer size")];
    let mut canvas = vec![0u32; (canvas_w * canvas_h) as usize];
    let mut frames = Vec::new();

    for _ in 0..animated_frames {
        let out = match reader.next_frame(&mut buf) {
            Ok(out) => out,
            // Tolerate assets that promise more frames than they carry
            Err(_) if !frames.is_empty() => break,
            Err(source) => return Err(decode_err(source)),
        };
        let control = reader.info().frame_control().copied();
        let (x_off, y_off) = control
            .map(|fc| (fc.x_offset, fc.y_offset))
            .unwrap_or((0, 0));
        let delay_ms = control.map(frame_delay_ms).unwrap_or(assets::DEFAULT_DELAY_MS);

        let pixels = to_argb(&buf[..out.buffer_size()], out.color_type);
        blit(
            &mut canvas,
            canvas_w,
            canvas_h,
            &pixels,
            out.width,
            out.height,
            x_off,
            y_off,
        );

        frames.push(Frame {
            width: canvas_w,
            height: canvas_h,
            delay_ms,
            data: canvas.clone(),
        });
    }

    if frames.is_empty() {
        return Err(AssetError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(frames)
}

/// Decode only the first frame; used for the tray icon.
pub fn decode_first_frame(path: &Path) -> Result<Frame, AssetError> {
    let mut frames = decode_apng(path)?;
    Ok(frames.swap_remove(0))
}

fn frame_delay_ms(fc: png::FrameControl) -> u32 {
    let den = if fc.delay_den == 0 { 100 } else { fc.delay_den as u32 };
    let ms = fc.delay_num as u32 * 1000 / den;
    if ms == 0 { assets::DEFAULT_DELAY_MS } else { ms }
}

fn to_argb(bytes: &[u8], color_type: png::ColorType) -> Vec<u32> {
    match color_type {
        png::ColorType::Rgba => bytes
            .chunks_exact(4)
            .map(|p| u32::from_be_bytes([p[3], p[0], p[1], p[2]]))
            .collect(),
        png::ColorType::Rgb => bytes
            .chunks_exact(3)
            .map(|p| u32::from_be_bytes([0xFF, p[0], p[1], p[2]]))
            .collect(),
        png::ColorType::GrayscaleAlpha => bytes
            .chunks_exact(2)
            .map(|p| u32::from_be_bytes([p[1], p[0], p[0], p[0]]))
            .collect(),
        // Grayscale; indexed is expanded by the decoder transformations
        _ => bytes
            .iter()
            .map(|&g| u32::from_be_bytes([0xFF, g, g, g]))
            .collect(),
    }
}

#[allow(clippy::too_many_arguments)]
fn blit(
    canvas: &mut [u32],
    canvas_w: u32,
    canvas_h: u32,
    pixels: &[u32],
    w: u32,
    h: u32,
    x_off: u32,
    y_off: u32,
) {
    for y in 0..h {
        let dst_y = y + y_off;
        if dst_y >= canvas_h {
            break;
        }
        for x in 0..w {
            let dst_x = x + x_off;
            if dst_x >= canvas_w {
                break;
            }
            canvas[(dst_y * canvas_w + dst_x) as usize] = pixels[(y * w + x) as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn frame(width: u32, height: u32, data: Vec<u32>) -> Frame {
        Frame {
            width,
            height,
            delay_ms: 50,
            data,
        }
    }

    #[test]
    fn mirror_reverses_each_row() {
        let f = frame(3, 2, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(f.mirrored().data, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn mirror_twice_is_identity() {
        let f = frame(4, 1, vec![9, 8, 7, 6]);
        assert_eq!(f.mirrored().mirrored().data, f.data);
    }

    #[test]
    fn scaling_doubles_dimensions() {
        let f = frame(2, 2, vec![1, 2, 3, 4]);
        let scaled = f.scaled(2.0);
        assert_eq!((scaled.width, scaled.height), (4, 4));
        assert_eq!(scaled.data[0], 1);
        assert_eq!(scaled.data[3], 2);
        assert_eq!(scaled.data[15], 4);
    }

    #[test]
    fn scaling_never_collapses_to_zero() {
        let f = frame(2, 2, vec![1, 2, 3, 4]);
        let scaled = f.scaled(0.01);
        assert_eq!((scaled.width, scaled.height), (1, 1));
    }

    #[test]
    fn missing_asset_is_an_io_error() {
        let err = decode_apng(&PathBuf::from("/nonexistent/walk.png")).unwrap_err();
        assert!(matches!(err, AssetError::Io { .. }));
    }

    #[test]
    fn fallback_library_has_every_behavior() {
        let lib = AnimationLibrary::fallback();
        assert!(lib.idle_variants() >= 1);
        assert!(lib.set(BehaviorKind::Walk, 0, Facing::Left).len() >= 1);
        assert!(lib.set(BehaviorKind::Drag, 0, Facing::Right).len() >= 1);
        let size = lib.pet_size();
        assert!(size.width > 0 && size.height > 0);
    }

    #[test]
    fn frame_lookup_wraps_at_sequence_end() {
        let lib = AnimationLibrary::fallback();
        let set = lib.set(BehaviorKind::Idle, 0, Facing::Right);
        // Index far past the end must still resolve
        let wrapped = set.frame(set.len() * 7 + 1);
        assert_eq!(wrapped.width, set.frame(1 % set.len()).width);
    }

    #[test]
    fn animator_restarts_on_behavior_change() {
        let lib = AnimationLibrary::fallback();
        let mut animator = Animator::new();
        animator.advance(&lib, 1000);
        animator.set_behavior(BehaviorKind::Drag, 0, Facing::Right);
        let cue = animator.advance(&lib, 0);
        assert_eq!(cue.kind, BehaviorKind::Drag);
        assert_eq!(cue.index, 0);
    }

    #[test]
    fn animator_wraps_around_the_sequence() {
        let lib = AnimationLibrary::fallback();
        let mut animator = Animator::new();
        let len = lib.set(BehaviorKind::Idle, 0, Facing::Right).len();
        // Placeholder frames use the default delay; advancing by exactly one
        // full cycle lands back on frame zero.
        let cycle: u32 = assets::DEFAULT_DELAY_MS * len as u32;
        let cue = animator.advance(&lib, cycle);
        assert_eq!(cue.index, 0);
    }
}
