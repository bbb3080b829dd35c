// THEORY:
// The `BlobDetector` is the spatial grouping stage. It turns the per-pixel touch
// mask into a short list of touch candidates.
//
// Algorithm steps:
// 1.  **ROI Restriction**: Only mask pixels inside the active region of interest
//     are considered. A region crossing the ROI border is cut at it.
// 2.  **Region Growing**: Every unvisited set pixel seeds a flood fill over its
//     8 neighbors, collecting one maximal connected region. Diagonal neighbors
//     count, so a thin diagonal stroke stays one region.
// 3.  **Data Aggregation**: Each region is reduced to its pixel area, its
//     geometric centroid and its bounding box.
// 4.  **Area Filter**: Regions with an area at or below the minimum are noise and
//     are discarded.
// 5.  **Stateless Utility**: Nothing is remembered between calls. The order of
//     the returned blobs is the scan order and carries no meaning.

use crate::core_modules::blob::{Blob, Point};
use crate::core_modules::foreground::TouchMask;
use crate::core_modules::roi::Roi;

pub mod blob_detector {
    use super::*;

    /// Finds every connected touch region inside `roi` whose area exceeds `min_area`.
    ///
    /// `roi` is expected to be clamped to the mask already; anything outside the
    /// mask is ignored regardless.
    pub fn extract(mask: &TouchMask, roi: &Roi, min_area: usize) -> Vec<Blob> {
        let x0 = roi.x_min.min(mask.width());
        let x1 = roi.x_max.min(mask.width());
        let y0 = roi.y_min.min(mask.height());
        let y1 = roi.y_max.min(mask.height());
        if x1 <= x0 || y1 <= y0 {
            return Vec::new();
        }

        let roi_width = (x1 - x0) as usize;
        let roi_height = (y1 - y0) as usize;
        let mut visited = vec![false; roi_width * roi_height];
        let mut blobs = Vec::new();

        for y in y0..y1 {
            for x in x0..x1 {
                let local = (y - y0) as usize * roi_width + (x - x0) as usize;
                if visited[local] || !mask.get(x, y) {
                    continue;
                }

                let region = grow_region(mask, Point { x, y }, (x0, y0, x1, y1), &mut visited);
                if region.area > min_area {
                    blobs.push(region);
                }
            }
        }

        blobs
    }

    /// Flood fill from `seed`, bounded by `bounds` (half-open `x0, y0, x1, y1`).
    fn grow_region(
        mask: &TouchMask,
        seed: Point,
        bounds: (u32, u32, u32, u32),
        visited: &mut [bool],
    ) -> Blob {
        let (x0, y0, x1, y1) = bounds;
        let roi_width = (x1 - x0) as usize;
        let local = |p: Point| (p.y - y0) as usize * roi_width + (p.x - x0) as usize;

        let mut stack = vec![seed];
        visited[local(seed)] = true;

        let mut area = 0usize;
        let mut sum_x = 0u64;
        let mut sum_y = 0u64;
        let mut min = seed;
        let mut max = seed;

        while let Some(current) = stack.pop() {
            area += 1;
            sum_x += current.x as u64;
            sum_y += current.y as u64;
            min.x = min.x.min(current.x);
            min.y = min.y.min(current.y);
            max.x = max.x.max(current.x);
            max.y = max.y.max(current.y);

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = current.x as i64 + dx;
                    let ny = current.y as i64 + dy;
                    if nx < x0 as i64 || nx >= x1 as i64 || ny < y0 as i64 || ny >= y1 as i64 {
                        continue;
                    }

                    let neighbor = Point {
                        x: nx as u32,
                        y: ny as u32,
                    };
                    let index = local(neighbor);
                    if !visited[index] && mask.get(neighbor.x, neighbor.y) {
                        visited[index] = true;
                        stack.push(neighbor);
                    }
                }
            }
        }

        // --- Data Aggregation ---
        Blob {
            centroid: (
                (sum_x as f64 / area as f64) as f32,
                (sum_y as f64 / area as f64) as f32,
            ),
            area,
            bounding_box: (min, max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::blob_detector::extract;
    use super::*;
    use crate::core_modules::background_model::BackgroundFrame;
    use crate::core_modules::depth_frame::DepthFrame;
    use crate::core_modules::foreground::mask;

    fn paint(mask: &mut TouchMask, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.set(x, y, true);
            }
        }
    }

    #[test]
    fn finds_a_touch_at_its_geometric_center() {
        let surface = 1200;
        let background = BackgroundFrame::from(DepthFrame::filled(64, 48, surface));
        let mut frame = DepthFrame::filled(64, 48, surface);
        frame.fill_rect(20, 10, 30, 20, surface - 15);

        let touch = mask(&frame, &background, 10, 20).unwrap();
        let blobs = extract(&touch, &Roi::full(64, 48), 50);

        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 100);
        assert_eq!(blobs[0].centroid, (24.5, 14.5));
        assert_eq!(
            blobs[0].bounding_box,
            (Point { x: 20, y: 10 }, Point { x: 29, y: 19 })
        );
    }

    #[test]
    fn separates_disconnected_regions() {
        let mut touch = TouchMask::new(40, 20);
        paint(&mut touch, 2, 2, 10, 10);
        paint(&mut touch, 20, 5, 28, 13);

        let mut blobs = extract(&touch, &Roi::full(40, 20), 10);
        blobs.sort_by(|a, b| a.centroid.0.total_cmp(&b.centroid.0));

        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].centroid, (5.5, 5.5));
        assert_eq!(blobs[1].centroid, (23.5, 8.5));
    }

    #[test]
    fn diagonal_neighbors_are_connected() {
        let mut touch = TouchMask::new(10, 10);
        for i in 0..10 {
            touch.set(i, i, true);
        }
        let blobs = extract(&touch, &Roi::full(10, 10), 0);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 10);
    }

    #[test]
    fn area_filter_is_strict() {
        let mut touch = TouchMask::new(20, 20);
        paint(&mut touch, 0, 0, 5, 10); // exactly 50 pixels
        paint(&mut touch, 10, 0, 16, 10); // 60 pixels

        let blobs = extract(&touch, &Roi::full(20, 20), 50);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 60);
    }

    #[test]
    fn regions_are_cut_at_the_roi() {
        let mut touch = TouchMask::new(30, 30);
        paint(&mut touch, 0, 0, 20, 20);
        paint(&mut touch, 25, 25, 30, 30);

        let roi = Roi::new(10, 30, 10, 24);
        let blobs = extract(&touch, &roi, 0);

        // The corner square at 25..30 lies below y_max and is ignored.
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].area, 100);
        assert_eq!(blobs[0].centroid, (14.5, 14.5));
    }

    #[test]
    fn empty_mask_has_no_blobs() {
        let touch = TouchMask::new(16, 16);
        assert!(extract(&touch, &Roi::full(16, 16), 0).is_empty());
    }
}
