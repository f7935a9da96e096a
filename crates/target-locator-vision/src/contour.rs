//! Candidate contour filtering and disambiguation.
//!
//! Every external contour of the mask goes through three gates:
//! 1. enclosed area at least `min_area` (drops noise specks);
//! 2. `area / bbox_area` at most `max_fill_ratio`;
//! 3. polygon approximation (tolerance = `epsilon_frac` × perimeter) with a
//!    vertex count in `min_vertices..=max_vertices`.
//!
//! More than one survivor makes the frame ambiguous and nothing is selected.

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use log::warn;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Contour gate settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Minimum enclosed contour area, px².
    pub min_area: f64,
    /// Maximum `area / (bbox_width * bbox_height)`.
    pub max_fill_ratio: f64,
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub epsilon_frac: f64,
    pub min_vertices: usize,
    pub max_vertices: usize,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            min_area: 150.0,
            max_fill_ratio: 0.5,
            epsilon_frac: 0.01,
            min_vertices: 7,
            max_vertices: 9,
        }
    }
}

/// The single contour that survived every gate.
#[derive(Clone, Debug, PartialEq)]
pub struct GoodContour {
    /// Full boundary, in tracing order.
    pub points: Vec<Point<i32>>,
    /// Its polygon approximation.
    pub polygon: Vec<Point<i32>>,
    pub area: f64,
}

/// Outcome of contour selection for one mask.
#[derive(Clone, Debug, PartialEq)]
pub enum ContourSelection {
    NoContour,
    Good(GoodContour),
    /// `count` contours passed every gate; all were discarded.
    Ambiguous { count: usize },
}

impl ContourSelection {
    pub fn good(&self) -> Option<&GoodContour> {
        match self {
            ContourSelection::Good(c) => Some(c),
            _ => None,
        }
    }
}

/// Result of [`ContourSelector::select`], with the polygons of every contour
/// that passed the area and fill-ratio gates (for debug drawing).
#[derive(Clone, Debug)]
pub struct SelectionReport {
    pub selection: ContourSelection,
    pub candidate_polygons: Vec<Vec<Point<i32>>>,
}

#[derive(Clone, Debug)]
pub struct ContourSelector {
    params: ContourParams,
}

impl ContourSelector {
    pub fn new(params: ContourParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ContourParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, mask), fields(width = mask.width(), height = mask.height()))
    )]
    pub fn select(&self, mask: &GrayImage) -> SelectionReport {
        let p = &self.params;
        let mut candidate_polygons = Vec::new();
        let mut good: Vec<GoodContour> = Vec::new();

        let external = find_contours::<i32>(mask)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none());

        for contour in external {
            let area = polygon_area(&contour.points);
            if area < p.min_area {
                continue;
            }
            let (w, h) = bounding_size(&contour.points);
            if area / (w * h) > p.max_fill_ratio {
                continue;
            }

            let epsilon = p.epsilon_frac * arc_length(&contour.points, true);
            let polygon = approx_polygon_closed(&contour.points, epsilon);
            candidate_polygons.push(polygon.clone());

            if (p.min_vertices..=p.max_vertices).contains(&polygon.len()) {
                good.push(GoodContour {
                    points: contour.points,
                    polygon,
                    area,
                });
            }
        }

        let selection = match good.len() {
            0 => ContourSelection::NoContour,
            1 => ContourSelection::Good(good.remove(0)),
            count => {
                warn!("{count} good contours found, discarding all");
                ContourSelection::Ambiguous { count }
            }
        };

        SelectionReport {
            selection,
            candidate_polygons,
        }
    }
}

/// Enclosed area of a closed point sequence (shoelace, absolute value).
fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.abs() as f64 * 0.5
}

/// Inclusive pixel extent of the axis-aligned bounding box.
fn bounding_size(points: &[Point<i32>]) -> (f64, f64) {
    let (mut x0, mut y0, mut x1, mut y1) = (i32::MAX, i32::MAX, i32::MIN, i32::MIN);
    for p in points {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    ((x1 - x0 + 1) as f64, (y1 - y0 + 1) as f64)
}

/// Douglas–Peucker simplification of a closed contour.
///
/// The contour is split at the point farthest from its first point and each
/// open half is simplified separately, so the result does not depend on the
/// closing segment being degenerate. The closing vertex is not repeated.
pub fn approx_polygon_closed(contour: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if contour.len() < 3 {
        return contour.to_vec();
    }
    let epsilon = epsilon.max(f64::EPSILON);
    let start = contour[0];
    let (split, _) = contour
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let dx = i64::from(p.x - start.x);
            let dy = i64::from(p.y - start.y);
            (i, dx * dx + dy * dy)
        })
        .fold((0, 0), |best, cur| if cur.1 > best.1 { cur } else { best });
    if split == 0 {
        return vec![start];
    }

    let mut second: Vec<Point<i32>> = contour[split..].to_vec();
    second.push(start);

    let mut out = approximate_polygon_dp(&contour[..=split], epsilon, false);
    out.pop();
    let mut tail = approximate_polygon_dp(&second, epsilon, false);
    tail.pop();
    out.extend(tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use image::Luma;
    use imageproc::drawing::draw_polygon_mut;

    fn pts(v: &[(i32, i32)]) -> Vec<Point<i32>> {
        v.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    // U-shaped band: 8 corners, low fill ratio.
    fn u_shape(ox: i32, oy: i32) -> Vec<Point<i32>> {
        pts(&[
            (ox, oy),
            (ox + 20, oy),
            (ox + 40, oy + 60),
            (ox + 100, oy + 60),
            (ox + 120, oy),
            (ox + 140, oy),
            (ox + 112, oy + 80),
            (ox + 28, oy + 80),
        ])
    }

    fn mask_with(polys: &[Vec<Point<i32>>]) -> GrayImage {
        let mut mask = GrayImage::new(400, 200);
        for poly in polys {
            draw_polygon_mut(&mut mask, poly, Luma([255]));
        }
        mask
    }

    #[test]
    fn shoelace_area_of_square() {
        let square = pts(&[(0, 0), (10, 0), (10, 10), (0, 10)]);
        assert_eq!(polygon_area(&square), 100.0);
        assert_eq!(bounding_size(&square), (11.0, 11.0));
    }

    #[test]
    fn approximation_keeps_polygon_corners() {
        let mask = mask_with(&[u_shape(20, 20)]);
        let contours = find_contours::<i32>(&mask);
        let outer = contours
            .iter()
            .find(|c| c.border_type == BorderType::Outer)
            .expect("outer contour");
        let eps = 0.01 * arc_length(&outer.points, true);
        let poly = approx_polygon_closed(&outer.points, eps);
        assert_eq!(poly.len(), 8, "{poly:?}");
    }

    #[test]
    fn empty_mask_has_no_contour() {
        let report = ContourSelector::new(ContourParams::default()).select(&GrayImage::new(64, 64));
        assert_eq!(report.selection, ContourSelection::NoContour);
        assert!(report.candidate_polygons.is_empty());
    }

    #[test]
    fn single_target_is_selected() {
        let report = ContourSelector::new(ContourParams::default()).select(&mask_with(&[u_shape(20, 20)]));
        let good = report.selection.good().expect("good contour");
        assert_eq!(good.polygon.len(), 8);
        assert!(good.area > 150.0);
        assert_eq!(report.candidate_polygons.len(), 1);
    }

    #[test]
    fn specks_are_ignored() {
        let speck = pts(&[(300, 150), (305, 150), (305, 155), (300, 155)]);
        let report = ContourSelector::new(ContourParams::default())
            .select(&mask_with(&[u_shape(20, 20), speck]));
        assert!(report.selection.good().is_some());
        assert_eq!(report.candidate_polygons.len(), 1);
    }

    #[test]
    fn solid_blob_fails_fill_ratio() {
        // filled octagon: right vertex count, but far too area-filling
        let octagon = pts(&[
            (60, 20),
            (100, 20),
            (130, 50),
            (130, 90),
            (100, 120),
            (60, 120),
            (30, 90),
            (30, 50),
        ]);
        let report = ContourSelector::new(ContourParams::default()).select(&mask_with(&[octagon]));
        assert_eq!(report.selection, ContourSelection::NoContour);
        assert!(report.candidate_polygons.is_empty());
    }

    #[test]
    fn wrong_vertex_count_is_rejected_but_drawn() {
        // thin hollow triangle outline: passes area/fill gates, 3 vertices
        let mut mask = GrayImage::new(400, 200);
        draw_polygon_mut(&mut mask, &pts(&[(20, 20), (220, 20), (120, 180)]), Luma([255]));
        draw_polygon_mut(&mut mask, &pts(&[(45, 32), (195, 32), (120, 152)]), Luma([0]));
        let report = ContourSelector::new(ContourParams::default()).select(&mask);
        assert_eq!(report.selection, ContourSelection::NoContour);
        assert_eq!(report.candidate_polygons.len(), 1);
    }

    #[test]
    fn two_targets_are_ambiguous() {
        let report = ContourSelector::new(ContourParams::default())
            .select(&mask_with(&[u_shape(20, 20), u_shape(220, 60)]));
        assert_eq!(report.selection, ContourSelection::Ambiguous { count: 2 });
    }

    #[test]
    fn partial_params_fall_back_to_defaults() {
        let params: ContourParams =
            serde_json::from_str(r#"{ "min_area": 80.0, "max_vertices": 12 }"#).expect("parse");
        assert_abs_diff_eq!(params.min_area, 80.0);
        assert_abs_diff_eq!(params.max_fill_ratio, 0.5);
        assert_abs_diff_eq!(params.epsilon_frac, 0.01);
        assert_eq!((params.min_vertices, params.max_vertices), (7, 12));
    }
}
