//! Editor line to preview scroll offset mapping.
//!
//! The rendered document carries a line annotation on block elements only,
//! so most source lines have no element of their own. Offsets for those
//! lines are interpolated between the nearest annotated lines before and
//! after them.

use crate::error::SurfaceError;

/// Where the target line lands in the viewport. 0 is the top, 1 the bottom.
pub const VIEWPORT_RATIO: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Geometry and scrolling of a rendered document.
///
/// Every method fails with [`SurfaceError::NotReady`] while no document is
/// loaded.
pub trait ScrollTarget {
    /// Full content height.
    fn scroll_height(&self) -> Result<f64, SurfaceError>;

    /// Visible height of the surface.
    fn viewport_height(&self) -> Result<f64, SurfaceError>;

    /// Top offset of the first element annotated with exactly `line`.
    fn line_top(&self, line: usize) -> Result<Option<f64>, SurfaceError>;

    fn scroll_to(&mut self, offset: f64, behavior: ScrollBehavior) -> Result<(), SurfaceError>;
}

pub fn lerp(begin: f64, end: f64, ratio: f64) -> f64 {
    begin + ratio * (end - begin)
}

pub fn frac(begin: f64, end: f64, value: f64) -> f64 {
    (value - begin) / (end - begin)
}

/// Nearest annotated line strictly before `line`, or `(0, 0.0)`.
fn previous_anchor<T: ScrollTarget + ?Sized>(
    target: &T,
    line: usize,
) -> Result<(usize, f64), SurfaceError> {
    for candidate in (1..line).rev() {
        if let Some(top) = target.line_top(candidate)? {
            return Ok((candidate, top));
        }
    }
    Ok((0, 0.0))
}

/// Nearest annotated line strictly after `line`, or `(max_line + 1, scroll_height)`.
fn next_anchor<T: ScrollTarget + ?Sized>(
    target: &T,
    line: usize,
    max_line: usize,
) -> Result<(usize, f64), SurfaceError> {
    for candidate in line + 1..=max_line {
        if let Some(top) = target.line_top(candidate)? {
            return Ok((candidate, top));
        }
    }
    Ok((max_line + 1, target.scroll_height()?))
}

/// Document offset of `line` without the viewport bias.
///
/// # Errors
/// Returns [`SurfaceError::NotReady`] if the surface has no document.
pub fn line_offset<T: ScrollTarget + ?Sized>(
    target: &T,
    line: usize,
    max_line: usize,
) -> Result<f64, SurfaceError> {
    let scroll_height = target.scroll_height()?;
    if line == 0 {
        return Ok(0.0);
    }
    if line >= max_line {
        return Ok(scroll_height);
    }
    if let Some(top) = target.line_top(line)? {
        return Ok(top);
    }

    let (prev_line, prev_offset) = previous_anchor(target, line)?;
    let (next_line, next_offset) = next_anchor(target, line, max_line)?;
    Ok(lerp(
        prev_offset,
        next_offset,
        frac(prev_line as f64, next_line as f64, line as f64),
    ))
}

/// Smooth-scroll `target` so `line` sits at [`VIEWPORT_RATIO`] of the viewport.
///
/// The first and last line scroll to the absolute top and bottom. Returns the
/// requested scroll offset.
///
/// # Errors
/// Fails fast with [`SurfaceError::NotReady`] when called before the surface
/// has loaded; callers must not invoke it earlier.
pub fn scroll_to_line<T: ScrollTarget + ?Sized>(
    target: &mut T,
    line: usize,
    max_line: usize,
) -> Result<f64, SurfaceError> {
    let offset = line_offset(target, line, max_line)?;
    let requested = if line == 0 || line >= max_line {
        offset
    } else {
        offset - target.viewport_height()? * VIEWPORT_RATIO
    };
    target.scroll_to(requested, ScrollBehavior::Smooth)?;
    crate::perf::log_event(
        "scroll.line",
        format!("line={line} max={max_line} offset={offset:.1} requested={requested:.1}"),
    );
    Ok(requested)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Annotated lines at fixed offsets.
    struct FixedLayout {
        tops: BTreeMap<usize, f64>,
        height: f64,
        viewport: f64,
        ready: bool,
        scrolled: Option<(f64, ScrollBehavior)>,
    }

    impl FixedLayout {
        fn new(tops: &[(usize, f64)], height: f64) -> Self {
            Self {
                tops: tops.iter().copied().collect(),
                height,
                viewport: 100.0,
                ready: true,
                scrolled: None,
            }
        }

        fn guard(&self) -> Result<(), SurfaceError> {
            if self.ready {
                Ok(())
            } else {
                Err(SurfaceError::NotReady)
            }
        }
    }

    impl ScrollTarget for FixedLayout {
        fn scroll_height(&self) -> Result<f64, SurfaceError> {
            self.guard()?;
            Ok(self.height)
        }

        fn viewport_height(&self) -> Result<f64, SurfaceError> {
            self.guard()?;
            Ok(self.viewport)
        }

        fn line_top(&self, line: usize) -> Result<Option<f64>, SurfaceError> {
            self.guard()?;
            Ok(self.tops.get(&line).copied())
        }

        fn scroll_to(&mut self, offset: f64, behavior: ScrollBehavior) -> Result<(), SurfaceError> {
            self.guard()?;
            self.scrolled = Some((offset, behavior));
            Ok(())
        }
    }

    #[test]
    fn test_line_zero_scrolls_to_top() {
        let mut layout = FixedLayout::new(&[(1, 50.0)], 400.0);
        assert_eq!(scroll_to_line(&mut layout, 0, 10), Ok(0.0));
        assert_eq!(layout.scrolled, Some((0.0, ScrollBehavior::Smooth)));
    }

    #[test]
    fn test_last_line_scrolls_to_bottom() {
        let mut layout = FixedLayout::new(&[(1, 50.0)], 400.0);
        assert_eq!(scroll_to_line(&mut layout, 10, 10), Ok(400.0));
    }

    #[test]
    fn test_exact_annotation_is_biased_into_viewport() {
        let mut layout = FixedLayout::new(&[(1, 0.0), (5, 200.0)], 400.0);
        assert_eq!(line_offset(&layout, 5, 10), Ok(200.0));
        assert_eq!(scroll_to_line(&mut layout, 5, 10), Ok(200.0 - 40.0));
    }

    #[test]
    fn test_interpolates_between_neighbours() {
        let layout = FixedLayout::new(&[(2, 100.0), (6, 300.0)], 400.0);
        assert_eq!(line_offset(&layout, 4, 10), Ok(200.0));
        assert_eq!(line_offset(&layout, 3, 10), Ok(150.0));
    }

    #[test]
    fn test_falls_back_to_top_without_previous_anchor() {
        let layout = FixedLayout::new(&[(4, 200.0)], 400.0);
        // prev = (0, 0), next = (4, 200)
        assert_eq!(line_offset(&layout, 2, 10), Ok(100.0));
    }

    #[test]
    fn test_falls_back_to_bottom_without_next_anchor() {
        let layout = FixedLayout::new(&[(2, 100.0)], 400.0);
        // prev = (2, 100), next = (11, 400)
        let offset = line_offset(&layout, 5, 10).unwrap();
        assert!((offset - (100.0 + 300.0 * 3.0 / 9.0)).abs() < 1e-9);
    }

    #[test]
    fn test_not_ready_fails_fast() {
        let mut layout = FixedLayout::new(&[], 0.0);
        layout.ready = false;
        assert_eq!(scroll_to_line(&mut layout, 0, 3), Err(SurfaceError::NotReady));
        assert_eq!(scroll_to_line(&mut layout, 2, 3), Err(SurfaceError::NotReady));
        assert!(layout.scrolled.is_none());
    }

    #[test]
    fn test_lerp_and_frac() {
        assert_eq!(lerp(10.0, 20.0, 0.5), 15.0);
        assert_eq!(frac(10.0, 20.0, 15.0), 0.5);
    }

    fn layout_strategy() -> impl Strategy<Value = (Vec<(usize, f64)>, usize)> {
        (5usize..60).prop_flat_map(|max_line| {
            proptest::collection::btree_set(1..max_line, 0..max_line / 2).prop_flat_map(
                move |lines| {
                    let count = lines.len();
                    proptest::collection::vec(1.0f64..80.0, count).prop_map(move |gaps| {
                        let mut top = 0.0;
                        let tops = lines
                            .iter()
                            .zip(gaps)
                            .map(|(line, gap)| {
                                top += gap;
                                (*line, top)
                            })
                            .collect::<Vec<_>>();
                        (tops, max_line)
                    })
                },
            )
        })
    }

    proptest! {
        #[test]
        fn prop_interpolation_stays_between_neighbours((tops, max_line) in layout_strategy(), extra in 0.0f64..200.0) {
            let height = tops.last().map_or(0.0, |(_, top)| *top) + extra;
            let layout = FixedLayout::new(&tops, height);
            for line in 1..max_line {
                if layout.tops.contains_key(&line) {
                    continue;
                }
                let (_, prev) = previous_anchor(&layout, line).unwrap();
                let (_, next) = next_anchor(&layout, line, max_line).unwrap();
                let offset = line_offset(&layout, line, max_line).unwrap();
                prop_assert!(offset >= prev - 1e-9 && offset <= next + 1e-9,
                    "line {} offset {} outside [{}, {}]", line, offset, prev, next);
            }
        }

        #[test]
        fn prop_top_and_bottom(max_line in 1usize..500, height in 0.0f64..10_000.0) {
            let mut layout = FixedLayout::new(&[], height);
            prop_assert_eq!(scroll_to_line(&mut layout, 0, max_line), Ok(0.0));
            prop_assert_eq!(scroll_to_line(&mut layout, max_line, max_line), Ok(height));
        }
    }
}
