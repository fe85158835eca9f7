use crate::geom::{angle_diff_abs, axis_vec_diff, dominant_grid_axis, is_orthogonal};
use crate::params::GridGraphParams;
use freethrow_core::Corner;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::VecDeque;
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    fn step(self) -> (i32, i32) {
        match self {
            NeighborDirection::Right => (1, 0),
            NeighborDirection::Left => (-1, 0),
            NeighborDirection::Up => (0, -1),
            NeighborDirection::Down => (0, 1),
        }
    }

    fn slot(self) -> usize {
        match self {
            NeighborDirection::Right => 0,
            NeighborDirection::Left => 1,
            NeighborDirection::Up => 2,
            NeighborDirection::Down => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    pub index: usize,
    pub distance: f32,
    pub score: f32,
}

/// 4-connected neighbor graph over X-junction candidates.
#[derive(Debug)]
pub struct GridGraph {
    pub neighbors: Vec<Vec<NodeNeighbor>>,
    /// Grid axis the directions are measured against, radians.
    pub axis: f32,
}

/// Median distance from each corner to its nearest other corner.
pub(crate) fn median_nn_distance(corners: &[Corner], tree: &KdTree<f32, 2>) -> Option<f32> {
    let mut dists: Vec<f32> = corners
        .iter()
        .filter_map(|c| {
            tree.nearest_n::<SquaredEuclidean>(&[c.position.x, c.position.y], 2)
                .into_iter()
                .map(|nn| nn.distance.sqrt())
                .find(|d| *d > 1e-6)
        })
        .collect();
    if dists.is_empty() {
        return None;
    }
    dists.sort_by(|a, b| a.total_cmp(b));
    Some(dists[dists.len() / 2])
}

fn direction_in_axis_frame(v: &Vector2<f32>, axis: f32) -> NeighborDirection {
    let (s, c) = axis.sin_cos();
    let x = c * v.x + s * v.y;
    let y = -s * v.x + c * v.y;
    if x.abs() > y.abs() {
        if x >= 0.0 {
            NeighborDirection::Right
        } else {
            NeighborDirection::Left
        }
    } else if y >= 0.0 {
        NeighborDirection::Down
    } else {
        NeighborDirection::Up
    }
}

fn is_good_neighbor(
    corner: &Corner,
    neighbor: &Corner,
    neighbor_index: usize,
    spacing: (f32, f32),
    tolerance: f32,
    axis: f32,
) -> Option<NodeNeighbor> {
    // Adjacent X-junctions swap the bright diagonal.
    if !is_orthogonal(corner.orientation, neighbor.orientation, tolerance) {
        return None;
    }

    let vec_to_neighbor = neighbor.position - corner.position;
    let distance = vec_to_neighbor.norm();
    if distance < spacing.0 || distance > spacing.1 {
        return None;
    }

    // Diagonals are rotated 45° from the grid lines.
    let edge_angle = vec_to_neighbor.y.atan2(vec_to_neighbor.x);
    let score_corner = (axis_vec_diff(corner.orientation, edge_angle) - FRAC_PI_4).abs();
    let score_neighbor = (axis_vec_diff(neighbor.orientation, edge_angle) - FRAC_PI_4).abs();
    if score_corner > tolerance || score_neighbor > tolerance {
        return None;
    }

    let score_orientation =
        (FRAC_PI_2 - angle_diff_abs(corner.orientation, neighbor.orientation)).abs();

    Some(NodeNeighbor {
        direction: direction_in_axis_frame(&vec_to_neighbor, axis),
        index: neighbor_index,
        distance,
        score: score_corner + score_neighbor + score_orientation,
    })
}

/// Keep at most one neighbor per direction, choosing the lowest-score candidate.
fn select_neighbors(candidates: Vec<NodeNeighbor>) -> Vec<NodeNeighbor> {
    let mut best: [Option<NodeNeighbor>; 4] = [None, None, None, None];

    for candidate in candidates {
        let slot = &mut best[candidate.direction.slot()];
        let replace = match slot {
            None => true,
            Some(current) => {
                candidate.score < current.score
                    || (candidate.score == current.score && candidate.distance < current.distance)
            }
        };
        if replace {
            *slot = Some(candidate);
        }
    }

    best.into_iter().flatten().collect()
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams) -> Self {
        let axis = dominant_grid_axis(corners.iter().map(|c| c.orientation)).unwrap_or(0.0);
        if corners.len() < 2 {
            return Self {
                neighbors: corners.iter().map(|_| Vec::new()).collect(),
                axis,
            };
        }

        let coords = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect::<Vec<_>>();
        let tree: KdTree<f32, 2> = (&coords).into();

        let base = median_nn_distance(corners, &tree).unwrap_or(params.min_spacing_pix);
        let spacing = (
            params
                .min_spacing_pix
                .max(base * (1.0 - params.spacing_tolerance)),
            params
                .max_spacing_pix
                .min(base * (1.0 + params.spacing_tolerance)),
        );
        let tolerance = params.orientation_tolerance_deg.to_radians();
        log::debug!(
            "grid graph: {} corners, base spacing {:.1}px, window [{:.1}, {:.1}], axis {:.1}°",
            corners.len(),
            base,
            spacing.0,
            spacing.1,
            axis.to_degrees()
        );

        let neighbors = corners
            .iter()
            .enumerate()
            .map(|(i, corner)| {
                let query = [corner.position.x, corner.position.y];
                let candidates = tree
                    .nearest_n::<SquaredEuclidean>(&query, params.k_neighbors)
                    .into_iter()
                    .map(|nn| nn.item as usize)
                    .filter(|&j| j != i)
                    .filter_map(|j| {
                        is_good_neighbor(corner, &corners[j], j, spacing, tolerance, axis)
                    })
                    .collect();
                select_neighbors(candidates)
            })
            .collect();

        Self { neighbors, axis }
    }

    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.neighbors.len()];
        let mut components = Vec::new();

        for start in 0..self.neighbors.len() {
            if visited[start] {
                continue;
            }

            let mut component = Vec::new();
            let mut stack = vec![start];
            while let Some(node) = stack.pop() {
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                component.push(node);
                for neighbor in &self.neighbors[node] {
                    if !visited[neighbor.index] {
                        stack.push(neighbor.index);
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// BFS over one component, returning `(node, i, j)` with the first node
    /// at the origin.
    pub fn assign_grid_coordinates(&self, component: &[usize]) -> Vec<(usize, i32, i32)> {
        let Some(&start) = component.first() else {
            return Vec::new();
        };
        let mut coords = Vec::with_capacity(component.len());
        let mut visited = vec![false; self.neighbors.len()];
        let mut queue = VecDeque::from([(start, 0, 0)]);

        while let Some((node, i, j)) = queue.pop_front() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            coords.push((node, i, j));

            for neighbor in &self.neighbors[node] {
                let (di, dj) = neighbor.direction.step();
                queue.push_back((neighbor.index, i + di, j + dj));
            }
        }

        coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn make_corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner::new(x, y, orientation, 1.0)
    }

    fn neighbor_map(neighbors: &[NodeNeighbor]) -> HashMap<NeighborDirection, &NodeNeighbor> {
        neighbors.iter().map(|n| (n.direction, n)).collect()
    }

    fn regular_grid(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        let mut corners = Vec::new();
        for j in 0..rows {
            for i in 0..cols {
                let orientation = if (i + j) % 2 == 0 {
                    FRAC_PI_4
                } else {
                    3.0 * FRAC_PI_4
                };
                corners.push(make_corner(
                    i as f32 * spacing,
                    j as f32 * spacing,
                    orientation,
                ));
            }
        }
        corners
    }

    #[test]
    fn finds_axis_neighbors_in_regular_grid() {
        let spacing = 10.0;
        let cols = 3;
        let corners = regular_grid(cols, 3, spacing);
        let graph = GridGraph::new(&corners, &GridGraphParams::default());

        let idx = |i: usize, j: usize| j * cols + i;

        let center = neighbor_map(&graph.neighbors[idx(1, 1)]);
        assert_eq!(4, center.len());
        assert_eq!(idx(0, 1), center[&NeighborDirection::Left].index);
        assert_eq!(idx(2, 1), center[&NeighborDirection::Right].index);
        assert_eq!(idx(1, 0), center[&NeighborDirection::Up].index);
        assert_eq!(idx(1, 2), center[&NeighborDirection::Down].index);
        for n in center.values() {
            assert!((n.distance - spacing).abs() < 1e-4);
        }

        let top_left = neighbor_map(&graph.neighbors[idx(0, 0)]);
        assert_eq!(2, top_left.len());
        assert!(top_left.contains_key(&NeighborDirection::Right));
        assert!(top_left.contains_key(&NeighborDirection::Down));
    }

    #[test]
    fn rejects_neighbors_when_orientation_relation_invalid() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 0.0, FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &GridGraphParams::default());

        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn rejects_neighbors_outside_distance_window() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(30.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let params = GridGraphParams {
            max_spacing_pix: 15.0,
            ..Default::default()
        };
        let graph = GridGraph::new(&corners, &params);

        assert!(graph.neighbors[0].is_empty());
        assert!(graph.neighbors[1].is_empty());
    }

    #[test]
    fn keeps_best_candidate_per_direction() {
        let corners = vec![
            make_corner(0.0, 0.0, FRAC_PI_4),
            make_corner(10.0, 0.0, 3.0 * FRAC_PI_4),
            make_corner(12.0, 0.0, 3.0 * FRAC_PI_4 + 0.1),
            make_corner(-10.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &GridGraphParams::default());

        let map = neighbor_map(&graph.neighbors[0]);
        assert_eq!(2, map.len());
        assert_eq!(1, map[&NeighborDirection::Right].index);
        assert_eq!(3, map[&NeighborDirection::Left].index);
    }

    #[test]
    fn rotated_grid_gets_consistent_coordinates() {
        let rot = 40f32.to_radians();
        let (s, c) = rot.sin_cos();
        let corners: Vec<Corner> = regular_grid(4, 3, 20.0)
            .into_iter()
            .map(|k| {
                let (x, y) = (k.position.x, k.position.y);
                make_corner(
                    100.0 + c * x - s * y,
                    100.0 + s * x + c * y,
                    k.orientation + rot,
                )
            })
            .collect();
        let graph = GridGraph::new(&corners, &GridGraphParams::default());

        let components = graph.connected_components();
        assert_eq!(1, components.len());
        let coords = graph.assign_grid_coordinates(&components[0]);
        assert_eq!(12, coords.len());

        let origin = coords.iter().find(|(n, _, _)| *n == 0).expect("start node");
        for &(node, i, j) in &coords {
            assert_eq!(((node % 4) as i32, (node / 4) as i32), (i - origin.1, j - origin.2));
        }
    }
}
