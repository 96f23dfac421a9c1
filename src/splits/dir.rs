//! Ordered list of split images with a cursor

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::split_image::SplitImage;
use super::metadata::SplitDefaults;
use crate::config::Geometry;
use crate::{Result, SplitterError};

/// File extensions accepted as split images (case-sensitive)
pub const SPLIT_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Split images loaded from one directory, sorted by file name
#[derive(Debug, Clone)]
pub struct SplitDir {
    path: Option<PathBuf>,
    images: Vec<Arc<SplitImage>>,
    /// `(index, loop)`; `None` iff `images` is empty
    cursor: Option<(usize, u32)>,
    /// Bumped on every cursor change so observers can tell moves apart
    generation: u64,
    defaults: SplitDefaults,
    comparison: Geometry,
    display: Geometry,
}

impl SplitDir {
    pub fn new(defaults: SplitDefaults, comparison: Geometry, display: Geometry) -> Self {
        Self {
            path: None,
            images: Vec::new(),
            cursor: None,
            generation: 0,
            defaults,
            comparison,
            display,
        }
    }

    /// Scan `path` and replace the current list. Returns the image count.
    ///
    /// A missing directory leaves the previous list in place.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let images = self.scan(path)?;
        self.path = Some(path.to_path_buf());
        self.replace_images(images);
        log::info!(
            "Loaded {} split images from {}",
            self.images.len(),
            path.display()
        );
        Ok(self.images.len())
    }

    /// Rebuild from disk if the directory still exists, then rewind to `(0, 0)`
    pub fn reset(&mut self) {
        if let Some(path) = self.path.clone() {
            match self.scan(&path) {
                Ok(images) => self.replace_images(images),
                Err(e) => log::warn!("Keeping current split list: {}", e),
            }
        }
        self.set_cursor(if self.images.is_empty() { None } else { Some((0, 0)) });
    }

    /// Advance one loop or one image, wrapping past the end
    pub fn next(&mut self) -> Result<usize> {
        let (index, current_loop) = self.cursor.ok_or(SplitterError::NoSplitList)?;
        let cursor = if current_loop < self.images[index].loops() {
            (index, current_loop + 1)
        } else {
            ((index + 1) % self.images.len(), 0)
        };
        self.set_cursor(Some(cursor));
        Ok(cursor.0)
    }

    /// Step back one loop or one image, wrapping before the start
    pub fn previous(&mut self) -> Result<usize> {
        let (index, current_loop) = self.cursor.ok_or(SplitterError::NoSplitList)?;
        let cursor = if current_loop > 0 {
            (index, current_loop - 1)
        } else {
            let index = index.checked_sub(1).unwrap_or(self.images.len() - 1);
            (index, self.images[index].loops())
        };
        self.set_cursor(Some(cursor));
        Ok(cursor.0)
    }

    pub fn defaults(&self) -> &SplitDefaults {
        &self.defaults
    }

    /// Replace the global defaults without touching any image
    pub fn set_defaults(&mut self, defaults: SplitDefaults) {
        self.defaults = defaults;
    }

    pub fn apply_default_threshold(&mut self) -> Result<()> {
        let defaults = self.defaults;
        self.update_images(|image| image.metadata_mut().apply_default_threshold(&defaults))
    }

    pub fn apply_default_delay(&mut self) -> Result<()> {
        let defaults = self.defaults;
        self.update_images(|image| image.metadata_mut().apply_default_delay(&defaults))
    }

    pub fn apply_default_suspend(&mut self) -> Result<()> {
        let defaults = self.defaults;
        self.update_images(|image| image.metadata_mut().apply_default_suspend(&defaults))
    }

    /// Re-apply the loop default. Cursors past the new loop count are clamped.
    pub fn apply_default_loops(&mut self) -> Result<()> {
        let defaults = self.defaults;
        self.update_images(|image| image.metadata_mut().apply_default_loops(&defaults))?;
        if let Some((index, current_loop)) = self.cursor {
            let loops = self.images[index].loops();
            if current_loop > loops {
                self.set_cursor(Some((index, loops)));
            }
        }
        Ok(())
    }

    /// Switch geometries and rebuild every image against them
    pub fn set_geometries(&mut self, comparison: Geometry, display: Geometry) -> Result<()> {
        comparison.validate()?;
        display.validate()?;
        self.comparison = comparison;
        self.display = display;
        if self.images.is_empty() {
            return Ok(());
        }
        self.resize()
    }

    /// Rebuild every image's buffers against the current geometries
    pub fn resize(&mut self) -> Result<()> {
        let (comparison, display) = (self.comparison, self.display);
        if self.images.is_empty() {
            return Err(SplitterError::NoSplitList);
        }
        for image in &mut self.images {
            Arc::make_mut(image).rebuild(comparison, display)?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn images(&self) -> &[Arc<SplitImage>] {
        &self.images
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.cursor.map(|(index, _)| index)
    }

    pub fn current_loop(&self) -> Option<u32> {
        self.cursor.map(|(_, current_loop)| current_loop)
    }

    pub fn cursor(&self) -> Option<(usize, u32)> {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_image(&self) -> Option<&Arc<SplitImage>> {
        self.cursor.map(|(index, _)| &self.images[index])
    }

    pub fn comparison_geometry(&self) -> Geometry {
        self.comparison
    }

    pub fn display_geometry(&self) -> Geometry {
        self.display
    }

    fn set_cursor(&mut self, cursor: Option<(usize, u32)>) {
        self.cursor = cursor;
        self.generation = self.generation.wrapping_add(1);
    }

    fn replace_images(&mut self, images: Vec<Arc<SplitImage>>) {
        self.images = images;
        self.set_cursor(if self.images.is_empty() { None } else { Some((0, 0)) });
    }

    fn update_images(&mut self, mut f: impl FnMut(&mut SplitImage)) -> Result<()> {
        if self.images.is_empty() {
            return Err(SplitterError::NoSplitList);
        }
        for image in &mut self.images {
            f(Arc::make_mut(image));
        }
        Ok(())
    }

    /// Decode every split image at the top level of `path`, skipping failures
    fn scan(&self, path: &Path) -> Result<Vec<Arc<SplitImage>>> {
        if !path.is_dir() {
            return Err(SplitterError::SplitDirNotFound(path.to_path_buf()));
        }

        let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && is_split_image(p))
            .collect();
        files.sort();

        let mut images = Vec::with_capacity(files.len());
        for file in files {
            match SplitImage::load(&file, &self.defaults, self.comparison, self.display) {
                Ok(image) => images.push(Arc::new(image)),
                Err(e) => log::warn!("Skipping split image: {}", e),
            }
        }
        Ok(images)
    }
}

/// Whether the file has one of the accepted extensions
pub fn is_split_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SPLIT_IMAGE_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const COMPARISON: Geometry = Geometry::new(8, 6);
    const DISPLAY: Geometry = Geometry::new(8, 6);

    fn write_png(dir: &Path, name: &str) {
        RgbaImage::from_pixel(8, 6, Rgba([100, 50, 25, 255]))
            .save(dir.join(name))
            .unwrap();
    }

    fn split_dir() -> SplitDir {
        SplitDir::new(SplitDefaults::default(), COMPARISON, DISPLAY)
    }

    fn loaded(names: &[&str]) -> (tempfile::TempDir, SplitDir) {
        let tmp = tempfile::tempdir().unwrap();
        for name in names {
            write_png(tmp.path(), name);
        }
        let mut dir = split_dir();
        dir.load(tmp.path()).unwrap();
        (tmp, dir)
    }

    #[test]
    fn test_load_sorts_and_filters() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(tmp.path(), "b.png");
        write_png(tmp.path(), "a.png");
        std::fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(tmp.path().join("upper.PNG"), b"x").unwrap();
        std::fs::write(tmp.path().join("c.jpg"), b"corrupt").unwrap();
        std::fs::create_dir(tmp.path().join("nested.png")).unwrap();

        let mut dir = split_dir();
        assert_eq!(dir.load(tmp.path()).unwrap(), 2);
        let names: Vec<_> = dir.images().iter().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(dir.cursor(), Some((0, 0)));
    }

    #[test]
    fn test_empty_dir_has_no_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let mut dir = split_dir();
        assert_eq!(dir.load(tmp.path()).unwrap(), 0);
        assert!(dir.is_empty());
        assert_eq!(dir.current_index(), None);
        assert_eq!(dir.current_loop(), None);
        assert!(matches!(dir.next(), Err(SplitterError::NoSplitList)));
        assert!(matches!(dir.previous(), Err(SplitterError::NoSplitList)));
        assert!(matches!(dir.apply_default_threshold(), Err(SplitterError::NoSplitList)));
        assert!(matches!(dir.resize(), Err(SplitterError::NoSplitList)));
    }

    #[test]
    fn test_missing_dir_keeps_previous_list() {
        let (_tmp, mut dir) = loaded(&["a.png"]);
        let err = dir.load("/definitely/not/here").unwrap_err();
        assert!(matches!(err, SplitterError::SplitDirNotFound(_)));
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn test_next_walks_loops_then_wraps() {
        let (_tmp, mut dir) = loaded(&["a_@2@.png", "b.png"]);
        let mut visited = Vec::new();
        for _ in 0..4 {
            dir.next().unwrap();
            visited.push(dir.cursor().unwrap());
        }
        assert_eq!(visited, vec![(0, 1), (0, 2), (1, 0), (0, 0)]);
    }

    #[test]
    fn test_single_image_wraps_to_itself() {
        let (_tmp, mut dir) = loaded(&["only.png"]);
        assert_eq!(dir.next().unwrap(), 0);
        assert_eq!(dir.cursor(), Some((0, 0)));
    }

    #[test]
    fn test_previous_is_left_inverse_of_next() {
        let (_tmp, mut dir) = loaded(&["a_@1@.png", "b.png", "c_@3@.png"]);
        for _ in 0..9 {
            let before = dir.cursor();
            dir.next().unwrap();
            dir.previous().unwrap();
            assert_eq!(dir.cursor(), before);
            dir.next().unwrap();
        }
    }

    #[test]
    fn test_previous_wraps_to_last_loop() {
        let (_tmp, mut dir) = loaded(&["a.png", "b_@2@.png"]);
        assert_eq!(dir.previous().unwrap(), 1);
        assert_eq!(dir.cursor(), Some((1, 2)));
    }

    #[test]
    fn test_reset_rewinds_and_rescans() {
        let (tmp, mut dir) = loaded(&["a.png", "b.png"]);
        dir.next().unwrap();
        write_png(tmp.path(), "c.png");

        dir.reset();
        assert_eq!(dir.cursor(), Some((0, 0)));
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn test_reset_with_missing_dir_keeps_list() {
        let (tmp, mut dir) = loaded(&["a.png", "b.png"]);
        dir.next().unwrap();
        let path = tmp.path().to_path_buf();
        drop(tmp);
        assert!(!path.exists());

        dir.reset();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.cursor(), Some((0, 0)));
    }

    #[test]
    fn test_reset_missing_dir_with_empty_list_stays_empty() {
        let mut dir = split_dir();
        dir.reset();
        assert!(dir.is_empty());
        assert_eq!(dir.cursor(), None);
    }

    #[test]
    fn test_default_propagation() {
        let (_tmp, mut dir) = loaded(&["c.png", "d_(75).png"]);
        dir.set_defaults(SplitDefaults {
            threshold: 0.8,
            ..SplitDefaults::default()
        });
        dir.apply_default_threshold().unwrap();
        dir.apply_default_threshold().unwrap();

        let c = &dir.images()[0];
        assert_eq!(c.threshold(), 0.8);
        assert!(c.metadata().threshold_is_default);
        let d = &dir.images()[1];
        assert!((d.threshold() - 0.75).abs() < 1e-9);
        assert!(!d.metadata().threshold_is_default);
    }

    #[test]
    fn test_apply_default_loops_clamps_cursor() {
        let (_tmp, mut dir) = loaded(&["a.png"]);
        dir.set_defaults(SplitDefaults {
            loops: 3,
            ..SplitDefaults::default()
        });
        dir.apply_default_loops().unwrap();
        dir.next().unwrap();
        dir.next().unwrap();
        assert_eq!(dir.cursor(), Some((0, 2)));

        dir.set_defaults(SplitDefaults::default());
        dir.apply_default_loops().unwrap();
        assert_eq!(dir.cursor(), Some((0, 0)));
    }

    #[test]
    fn test_set_geometries_rebuilds_images() {
        let (_tmp, mut dir) = loaded(&["a.png"]);
        dir.set_geometries(Geometry::new(4, 3), Geometry::new(16, 12)).unwrap();
        assert_eq!(dir.images()[0].geometry(), Geometry::new(4, 3));
        assert_eq!(dir.images()[0].display_image().dimensions(), (16, 12));
    }

    #[test]
    fn test_generation_changes_on_cursor_moves() {
        let (_tmp, mut dir) = loaded(&["a.png", "b.png"]);
        let g0 = dir.generation();
        dir.next().unwrap();
        assert_ne!(dir.generation(), g0);
    }
}
