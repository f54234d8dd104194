//! Replay capture from saved screenshots
//!
//! Lets a watch run be rehearsed without a live display: every capture crops
//! the watched rectangle out of the next screenshot in a directory.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use super::capture::RegionCapture;
use super::grid::{ColorGrid, Point};
use crate::error::{Result, WatchError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Region capture that walks through a sorted list of screenshot files
pub struct ReplayCapture {
    frames: Vec<PathBuf>,
    position: Mutex<usize>,
    loop_playback: bool,
}

impl ReplayCapture {
    /// Use every image file in `dir`, in file name order
    pub fn from_directory(dir: &Path, loop_playback: bool) -> Result<Self> {
        let mut frames: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(|e| WatchError::Io(format!("{}: {}", dir.display(), e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        frames.sort();

        if frames.is_empty() {
            return Err(WatchError::Io(format!("no screenshots found in {}", dir.display())));
        }

        log::info!("Replaying {} screenshots from {}", frames.len(), dir.display());
        Ok(Self::from_frames(frames, loop_playback))
    }

    pub fn from_frames(frames: Vec<PathBuf>, loop_playback: bool) -> Self {
        Self {
            frames,
            position: Mutex::new(0),
            loop_playback,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn next_frame(&self) -> Result<PathBuf> {
        let mut position = self.position.lock();
        if *position >= self.frames.len() {
            if !self.loop_playback || self.frames.is_empty() {
                return Err(WatchError::capture("replay finished"));
            }
            *position = 0;
        }
        let path = self.frames[*position].clone();
        *position += 1;
        Ok(path)
    }
}

impl RegionCapture for ReplayCapture {
    fn capture_region(&self, top_left: Point, bottom_right: Point) -> Result<ColorGrid> {
        let path = self.next_frame()?;
        let image = image::open(&path)
            .map_err(|e| WatchError::capture(format!("{}: {}", path.display(), e)))?
            .to_rgba8();

        let (width, height) = image.dimensions();
        if top_left.x < 0
            || top_left.y < 0
            || bottom_right.x < top_left.x
            || bottom_right.y < top_left.y
            || bottom_right.x as u32 >= width
            || bottom_right.y as u32 >= height
        {
            return Err(WatchError::format(format!(
                "rectangle {}-{} lies outside {}x{} screenshot {}",
                top_left,
                bottom_right,
                width,
                height,
                path.display()
            )));
        }

        let crop_width = (bottom_right.x - top_left.x + 1) as u32;
        let crop_height = (bottom_right.y - top_left.y + 1) as u32;
        let cropped = image::imageops::crop_imm(
            &image,
            top_left.x as u32,
            top_left.y as u32,
            crop_width,
            crop_height,
        )
        .to_image();

        ColorGrid::from_rgba(crop_width as usize, crop_height as usize, cropped.as_raw())
    }
}
