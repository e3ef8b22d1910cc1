// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host side preparation of a set of polylines.
//!
//! Every line is resampled into a number of control points proportional to its arc
//! length. The opacity solver works on control points, and every vertex remembers
//! the pair of control points it interpolates between as its alpha weight.

use thiserror::Error;

use crate::Vertex;

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum LineSetError {
    #[error("the line set contains no lines")]
    EmptyLineSet,
    #[error("line {line} has {found} attribute values but {expected} vertices")]
    AttributeLengthMismatch {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("{budget} control points cannot cover {lines} lines, at least two per line are needed")]
    InsufficientControlPoints { lines: usize, budget: u32 },
}

/// A set of polylines ready to be uploaded.
#[derive(Clone, Debug)]
pub struct LineSet {
    vertices: Vec<Vertex>,
    lengths: Vec<f32>,
    control_points: Vec<u32>,
    control_point_lines: Vec<u32>,
}

impl LineSet {
    /// Prepares `polylines` with per-vertex `importance` and `scalar` values.
    ///
    /// `control_point_budget` is the total number of control points shared by all
    /// lines.
    pub fn new(
        polylines: &[Vec<[f32; 3]>],
        importance: &[Vec<f32>],
        scalar: &[Vec<f32>],
        control_point_budget: u32,
    ) -> Result<Self, LineSetError> {
        if polylines.is_empty() {
            return Err(LineSetError::EmptyLineSet);
        }
        for attribute in [importance, scalar] {
            if attribute.len() != polylines.len() {
                return Err(LineSetError::AttributeLengthMismatch {
                    line: attribute.len().min(polylines.len()),
                    expected: polylines.len(),
                    found: attribute.len(),
                });
            }
            for (line, (points, values)) in polylines.iter().zip(attribute).enumerate() {
                if points.len() != values.len() {
                    return Err(LineSetError::AttributeLengthMismatch {
                        line,
                        expected: points.len(),
                        found: values.len(),
                    });
                }
            }
        }
        if (control_point_budget as usize) < 2 * polylines.len() {
            return Err(LineSetError::InsufficientControlPoints {
                lines: polylines.len(),
                budget: control_point_budget,
            });
        }

        let lengths: Vec<f32> = polylines.iter().map(|line| arc_length(line)).collect();
        let control_points = distribute_control_points(&lengths, control_point_budget);
        let weights = alpha_weights(polylines, &lengths, &control_points);

        let mut vertices = Vec::with_capacity(weights.len());
        for (line_id, ((points, importance), scalar)) in
            polylines.iter().zip(importance).zip(scalar).enumerate()
        {
            for ((&position, &importance), &scalar) in points.iter().zip(importance).zip(scalar) {
                vertices.push(Vertex {
                    position,
                    line_id: line_id as u32,
                    importance,
                    scalar,
                    alpha_weight: weights[vertices.len()],
                    _padding: 0,
                });
            }
        }
        let control_point_lines = control_points
            .iter()
            .enumerate()
            .flat_map(|(line, &n)| std::iter::repeat_n(line as u32, n as usize))
            .collect();
        Ok(Self {
            vertices,
            lengths,
            control_points,
            control_point_lines,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn n_lines(&self) -> usize {
        self.lengths.len()
    }

    /// Arc length of every line.
    pub fn lengths(&self) -> &[f32] {
        &self.lengths
    }

    /// Number of control points of every line.
    pub fn control_points_per_line(&self) -> &[u32] {
        &self.control_points
    }

    /// The owning line of every control point.
    pub fn control_point_lines(&self) -> &[u32] {
        &self.control_point_lines
    }

    pub fn n_control_points(&self) -> u32 {
        self.control_point_lines.len() as u32
    }
}

fn distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
    (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
}

fn arc_length(line: &[[f32; 3]]) -> f32 {
    line.windows(2).map(|w| distance(w[0], w[1])).sum()
}

/// Distributes `budget` control points among lines proportional to their length.
///
/// Lines no longer than the average length per control point receive two control
/// points, and so does every line whose share of the remaining budget would drop
/// below two. The rest of the budget is split among the remaining lines by length,
/// rounding down, and the points lost to rounding go to the largest remainders.
/// Every line gets at least two points, and the result sums to `budget` as long as
/// that is at least two per line.
pub fn distribute_control_points(lengths: &[f32], budget: u32) -> Vec<u32> {
    let total: f64 = lengths.iter().map(|&l| f64::from(l)).sum();
    if lengths.is_empty() {
        return Vec::new();
    }
    if total <= 0.0 {
        // Nothing to weigh by, split evenly.
        let n = lengths.len() as u32;
        return (0..n)
            .map(|i| budget / n + u32::from(i < budget % n))
            .collect();
    }
    let per_point = total / f64::from(budget);
    let mut counts: Vec<u32> = lengths
        .iter()
        .map(|&length| if f64::from(length) <= per_point { 2 } else { 0 })
        .collect();

    // Fixing a line at two shrinks everyone else's share, so repeat until stable.
    let (remaining_points, remaining_length) = loop {
        let fixed = counts.iter().filter(|&&c| c == 2).count() as u32;
        let points = budget.saturating_sub(2 * fixed);
        let length: f64 = counts
            .iter()
            .zip(lengths)
            .filter(|&(&c, _)| c == 0)
            .map(|(_, &l)| f64::from(l))
            .sum();
        let mut changed = false;
        for (count, &length_of_line) in counts.iter_mut().zip(lengths) {
            if *count == 0 && f64::from(length_of_line) / length * f64::from(points) < 2.0 {
                *count = 2;
                changed = true;
            }
        }
        if !changed {
            break (points, length);
        }
    };

    let mut remainders = Vec::new();
    let mut assigned = 0;
    for (line, (count, &length)) in counts.iter_mut().zip(lengths).enumerate() {
        if *count == 0 {
            let share = f64::from(length) / remaining_length * f64::from(remaining_points);
            *count = share as u32;
            assigned += *count;
            remainders.push((share - share.floor(), line));
        }
    }
    // Largest remainder first, ties to the lower line index.
    remainders.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
    for &(_, line) in remainders
        .iter()
        .cycle()
        .take(remaining_points.saturating_sub(assigned) as usize)
    {
        counts[line] += 1;
    }
    counts
}

/// Computes the alpha weight of every vertex.
///
/// The integer part of a weight is the global index of the control point before
/// the vertex, the fractional part the position toward the next control point.
pub fn alpha_weights(polylines: &[Vec<[f32; 3]>], lengths: &[f32], control_points: &[u32]) -> Vec<f32> {
    let mut weights = Vec::with_capacity(polylines.iter().map(Vec::len).sum());
    let mut offset = 0_u32;
    for ((line, &length), &n) in polylines.iter().zip(lengths).zip(control_points) {
        let base = offset as f32;
        let last = n.saturating_sub(1) as f32;
        let mut arc = 0.0;
        for (i, &point) in line.iter().enumerate() {
            if i > 0 {
                arc += distance(line[i - 1], point);
            }
            let local = if length > 0.0 && i > 0 {
                (arc / length * last).min(last - 1e-4).max(0.0)
            } else {
                0.0
            };
            weights.push(base + local);
        }
        offset += n;
    }
    weights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_line(length: f32, n: usize) -> Vec<[f32; 3]> {
        (0..n)
            .map(|i| [length * i as f32 / (n - 1) as f32, 0.0, 0.0])
            .collect()
    }

    #[test]
    fn distribution_sums_to_budget() {
        let counts = distribute_control_points(&[10.0, 5.0, 1.0], 12);
        assert_eq!(counts.iter().sum::<u32>(), 12);
        assert_eq!(counts[2], 2);
        assert!(counts[0] > counts[1]);
        assert_eq!(counts, vec![7, 3, 2]);
    }

    #[test]
    fn distribution_of_many_lines() {
        let lengths: Vec<f32> = (0..57).map(|i| 0.5 + (i * 7 % 13) as f32).collect();
        for budget in [114, 200, 1000, 15000] {
            let counts = distribute_control_points(&lengths, budget);
            assert_eq!(counts.iter().sum::<u32>(), budget);
            assert!(counts.iter().all(|&c| c >= 2));
        }
    }

    #[test]
    fn every_line_gets_two_control_points() {
        let counts = distribute_control_points(&[0.0, 0.0, 0.0, 1.2, 10.0], 10);
        assert_eq!(counts, vec![2, 2, 2, 2, 2]);

        let lengths = [0.1, 1.0, 1.3, 1.6, 2.0, 40.0];
        for budget in 12..40 {
            let counts = distribute_control_points(&lengths, budget);
            assert_eq!(counts.iter().sum::<u32>(), budget, "budget {budget}");
            assert!(counts.iter().all(|&c| c >= 2), "budget {budget}: {counts:?}");
        }
    }

    #[test]
    fn vertices_stay_on_their_own_control_points() {
        let lines = vec![
            vec![[0.0; 3]; 2],
            vec![[0.0; 3]; 2],
            vec![[0.0; 3]; 2],
            straight_line(1.2, 3),
            straight_line(10.0, 6),
        ];
        let importance: Vec<_> = lines.iter().map(|l| vec![1.0; l.len()]).collect();
        let set = LineSet::new(&lines, &importance, &importance, 10).unwrap();
        for vertex in set.vertices() {
            let control_point = vertex.alpha_weight.floor() as usize;
            assert_eq!(set.control_point_lines()[control_point], vertex.line_id);
            assert_eq!(set.control_point_lines()[control_point + 1], vertex.line_id);
        }
    }

    #[test]
    fn degenerate_lengths_are_split_evenly() {
        assert_eq!(distribute_control_points(&[0.0, 0.0, 0.0], 8), vec![3, 3, 2]);
    }

    #[test]
    fn weights_interpolate_control_points() {
        let lines = vec![straight_line(4.0, 5), straight_line(1.0, 2)];
        let lengths = [4.0, 1.0];
        let weights = alpha_weights(&lines, &lengths, &[3, 2]);
        assert_eq!(weights.len(), 7);
        assert_eq!(weights[0], 0.0);
        assert!((weights[2] - 1.0).abs() < 1e-6);
        // The last vertex stays just below the final control point.
        assert!((weights[4] - (2.0 - 1e-4)).abs() < 1e-5);
        assert_eq!(weights[5], 3.0);
        assert!(weights[6] < 4.0 && weights[6] > 3.99);
    }

    #[test]
    fn zero_length_line_pins_to_first_control_point() {
        let lines = vec![vec![[1.0, 1.0, 1.0]; 3]];
        let weights = alpha_weights(&lines, &[0.0], &[2]);
        assert_eq!(weights, vec![0.0; 3]);
    }

    #[test]
    fn line_set_flattens_attributes() {
        let lines = vec![straight_line(10.0, 4), straight_line(5.0, 3), straight_line(1.0, 2)];
        let importance = vec![vec![0.5; 4], vec![0.25; 3], vec![1.0; 2]];
        let scalar = vec![vec![0.1; 4], vec![0.2; 3], vec![0.3; 2]];
        let set = LineSet::new(&lines, &importance, &scalar, 12).unwrap();
        assert_eq!(set.vertices().len(), 9);
        assert_eq!(set.n_control_points(), 12);
        assert_eq!(set.control_point_lines().len(), 12);
        assert_eq!(set.vertices()[4].line_id, 1);
        assert_eq!(set.vertices()[4].importance, 0.25);
        assert_eq!(set.vertices()[8].scalar, 0.3);
        let first_of_second = set.control_points_per_line()[0] as f32;
        assert_eq!(set.vertices()[4].alpha_weight, first_of_second);
    }

    #[test]
    fn line_set_rejects_bad_input() {
        let lines = vec![straight_line(1.0, 2)];
        assert_eq!(
            LineSet::new(&[], &[], &[], 4).unwrap_err(),
            LineSetError::EmptyLineSet
        );
        assert_eq!(
            LineSet::new(&lines, &[vec![1.0]], &[vec![1.0; 2]], 4).unwrap_err(),
            LineSetError::AttributeLengthMismatch {
                line: 0,
                expected: 2,
                found: 1
            }
        );
        assert_eq!(
            LineSet::new(&lines, &[vec![1.0; 2]], &[vec![1.0; 2]], 1).unwrap_err(),
            LineSetError::InsufficientControlPoints {
                lines: 1,
                budget: 1
            }
        );
    }
}
