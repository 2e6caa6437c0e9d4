//! Point grid lifecycle.
//!
//! A [`Graph`] owns one point handle per grid sample and keeps the collection
//! sized to `resolution²`. Points are created and positioned through a
//! [`PointHost`], so the grid works against the scene graph as well as
//! against a plain recorder in tests.

use glam::Vec3;

use crate::graph_function::GraphFunction;

/// Capability for creating and moving renderable points.
///
/// Implementors own the actual render resources; the graph only keeps the
/// handles they return.
pub trait PointHost {
    type Handle: Copy;

    /// Create a point with the given local scale, attached to the graph's frame.
    fn spawn_point(&mut self, scale: Vec3) -> Self::Handle;

    /// Destroy a point previously returned by `spawn_point`.
    fn destroy_point(&mut self, handle: Self::Handle);

    fn set_local_position(&mut self, handle: Self::Handle, position: Vec3);

    fn set_local_scale(&mut self, handle: Self::Handle, scale: Vec3);
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileOutcome {
    pub spawned: usize,
    pub destroyed: usize,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.spawned == 0 && self.destroyed == 0
    }
}

/// Grid coordinate in `[-1, 1)` for cell `i` at the given step.
pub fn grid_coordinate(i: u32, step: f32) -> f32 {
    (i as f32 + 0.5) * step - 1.0
}

/// Edge length of one grid cell (and the scale of each point).
pub fn grid_step(resolution: u32) -> f32 {
    2.0 / resolution as f32
}

/// A resolution² grid of points animated by a [`GraphFunction`].
#[derive(Debug)]
pub struct Graph<P> {
    points: Vec<P>,
    resolution: u32,
    function: GraphFunction,
    /// Maximum points created per `update` call. `None` grows in one go.
    spawn_budget: Option<usize>,
    /// Scale applied to the current points, if any have been created.
    point_scale: Option<Vec3>,
}

impl<P: Copy> Graph<P> {
    pub fn new(resolution: u32, function: GraphFunction) -> Self {
        Self {
            points: Vec::new(),
            resolution,
            function,
            spawn_budget: None,
            point_scale: None,
        }
    }

    pub fn with_spawn_budget(mut self, budget: Option<usize>) -> Self {
        self.spawn_budget = budget;
        self
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Change the resolution. Points are created or destroyed on the next update.
    pub fn set_resolution(&mut self, resolution: u32) {
        self.resolution = resolution;
    }

    pub fn function(&self) -> GraphFunction {
        self.function
    }

    pub fn set_function(&mut self, function: GraphFunction) {
        self.function = function;
    }

    pub fn spawn_budget(&self) -> Option<usize> {
        self.spawn_budget
    }

    pub fn set_spawn_budget(&mut self, budget: Option<usize>) {
        self.spawn_budget = budget;
    }

    /// Number of points the grid converges to.
    pub fn target_count(&self) -> usize {
        let r = self.resolution as usize;
        r * r
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True once the collection matches the current resolution.
    pub fn is_settled(&self) -> bool {
        self.points.len() == self.target_count()
    }

    /// Point handles in grid order (`index = z * resolution + x`).
    pub fn points(&self) -> &[P] {
        &self.points
    }

    /// Grow or shrink the collection to exactly `target_count` points.
    ///
    /// New points get `point_scale`, and survivors are rescaled to it when the
    /// count changes. Shrinking removes the most recently created points
    /// first. Does nothing if the collection already holds `target_count`.
    pub fn reconcile<H>(&mut self, host: &mut H, target_count: usize, point_scale: Vec3) -> ReconcileOutcome
    where
        H: PointHost<Handle = P>,
    {
        self.reconcile_limited(host, target_count, point_scale, None)
    }

    fn reconcile_limited<H>(
        &mut self,
        host: &mut H,
        target_count: usize,
        point_scale: Vec3,
        budget: Option<usize>,
    ) -> ReconcileOutcome
    where
        H: PointHost<Handle = P>,
    {
        let mut outcome = ReconcileOutcome::default();
        if self.points.len() == target_count {
            return outcome;
        }

        while self.points.len() > target_count {
            if let Some(handle) = self.points.pop() {
                host.destroy_point(handle);
                outcome.destroyed += 1;
            }
        }

        // Survivors keep their positions but follow the new cell size.
        if self.point_scale != Some(point_scale) {
            for &handle in &self.points {
                host.set_local_scale(handle, point_scale);
            }
            self.point_scale = Some(point_scale);
        }

        if self.points.len() < target_count {
            let missing = target_count - self.points.len();
            let to_spawn = budget.map_or(missing, |b| b.min(missing));
            self.points.reserve(to_spawn);
            for _ in 0..to_spawn {
                self.points.push(host.spawn_point(point_scale));
            }
            outcome.spawned = to_spawn;
        }

        if !outcome.is_noop() {
            log::debug!(
                "Reconciled graph: +{} -{} points ({} / {})",
                outcome.spawned,
                outcome.destroyed,
                self.points.len(),
                target_count
            );
        }

        outcome
    }

    /// Write `function(u, v, t)` to every point.
    ///
    /// Returns false without touching any point if the collection does not yet
    /// hold `resolution²` points.
    pub fn update_frame<H>(&self, host: &mut H, function: GraphFunction, t: f32) -> bool
    where
        H: PointHost<Handle = P>,
    {
        if !self.is_settled() {
            log::trace!(
                "Skipping graph update: {} of {} points",
                self.points.len(),
                self.target_count()
            );
            return false;
        }

        let step = grid_step(self.resolution);
        let mut handles = self.points.iter();
        for z in 0..self.resolution {
            let v = grid_coordinate(z, step);
            for x in 0..self.resolution {
                let u = grid_coordinate(x, step);
                if let Some(&handle) = handles.next() {
                    host.set_local_position(handle, function.evaluate(u, v, t));
                }
            }
        }
        true
    }

    /// Per-frame driver: reconcile to the current resolution, then reposition
    /// every point with the selected function.
    ///
    /// Returns true if the points were repositioned this frame.
    pub fn update<H>(&mut self, host: &mut H, t: f32) -> bool
    where
        H: PointHost<Handle = P>,
    {
        let step = grid_step(self.resolution);
        let count = self.target_count();
        self.reconcile_limited(host, count, Vec3::splat(step), self.spawn_budget);
        self.update_frame(host, self.function, t)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Records every call so tests can inspect the grid's effect on its host.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingHost {
        next_id: u32,
        pub positions: HashMap<u32, Vec3>,
        pub scales: HashMap<u32, Vec3>,
        pub destroyed: Vec<u32>,
        pub rescales: usize,
    }

    impl PointHost for RecordingHost {
        type Handle = u32;

        fn spawn_point(&mut self, scale: Vec3) -> u32 {
            let id = self.next_id;
            self.next_id += 1;
            self.scales.insert(id, scale);
            self.positions.insert(id, Vec3::ZERO);
            id
        }

        fn destroy_point(&mut self, handle: u32) {
            self.positions.remove(&handle);
            self.scales.remove(&handle);
            self.destroyed.push(handle);
        }

        fn set_local_position(&mut self, handle: u32, position: Vec3) {
            self.positions.insert(handle, position);
        }

        fn set_local_scale(&mut self, handle: u32, scale: Vec3) {
            self.scales.insert(handle, scale);
            self.rescales += 1;
        }
    }

    #[test]
    fn test_reconcile_grows_to_exact_count() {
        for r in 1..=12u32 {
            let mut host = RecordingHost::default();
            let mut graph: Graph<u32> = Graph::new(r, GraphFunction::Sine);
            let count = (r * r) as usize;
            let outcome = graph.reconcile(&mut host, count, Vec3::splat(grid_step(r)));
            assert_eq!(graph.len(), count);
            assert_eq!(outcome.spawned, count);
            assert_eq!(host.positions.len(), count);
        }
    }

    #[test]
    fn test_reconcile_noop_when_sized() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(4, GraphFunction::Sine);
        graph.reconcile(&mut host, 16, Vec3::splat(0.5));
        let outcome = graph.reconcile(&mut host, 16, Vec3::splat(0.5));
        assert!(outcome.is_noop());
        assert_eq!(graph.len(), 16);
    }

    #[test]
    fn test_reconcile_same_count_leaves_scale_alone() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(4, GraphFunction::Sine);
        graph.reconcile(&mut host, 16, Vec3::splat(0.5));

        let outcome = graph.reconcile(&mut host, 16, Vec3::splat(1.0));
        assert!(outcome.is_noop());
        assert_eq!(host.rescales, 0);
        assert!(host.scales.values().all(|&s| s == Vec3::splat(0.5)));
    }

    #[test]
    fn test_shrink_removes_newest_points() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(5, GraphFunction::Sine);
        graph.reconcile(&mut host, 25, Vec3::splat(0.4));
        let before = graph.points().to_vec();

        let outcome = graph.reconcile(&mut host, 9, Vec3::splat(0.4));
        assert_eq!(outcome.destroyed, 16);
        assert_eq!(graph.points(), &before[..9]);
        // Destroyed newest first
        let expected: Vec<u32> = before[9..].iter().rev().copied().collect();
        assert_eq!(host.destroyed, expected);
    }

    #[test]
    fn test_new_points_get_cell_scale() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(10, GraphFunction::Sine);
        graph.update(&mut host, 0.0);
        for handle in graph.points() {
            assert_eq!(host.scales[handle], Vec3::splat(0.2));
        }
    }

    #[test]
    fn test_resolution_change_rescales_survivors() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(10, GraphFunction::Sine);
        graph.update(&mut host, 0.0);
        graph.set_resolution(20);
        graph.update(&mut host, 0.0);
        assert_eq!(graph.len(), 400);
        for handle in graph.points() {
            assert!((host.scales[handle] - Vec3::splat(0.1)).length() < 1e-6);
        }
    }

    #[test]
    fn test_first_point_sine_at_resolution_ten() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(10, GraphFunction::Sine);
        assert!(graph.update(&mut host, 0.0));
        assert_eq!(graph.len(), 100);

        let p = host.positions[&graph.points()[0]];
        assert!((p.x - -0.9).abs() < 1e-6);
        assert!((p.z - -0.9).abs() < 1e-6);
        assert!((p.y - -0.309017).abs() < 1e-4);
    }

    #[test]
    fn test_grid_index_layout() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(4, GraphFunction::Sine2D);
        graph.update(&mut host, 0.25);

        let step = grid_step(4);
        for z in 0..4u32 {
            for x in 0..4u32 {
                let handle = graph.points()[(z * 4 + x) as usize];
                let p = host.positions[&handle];
                assert!((p.x - grid_coordinate(x, step)).abs() < 1e-6);
                assert!((p.z - grid_coordinate(z, step)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_update_frame_skips_unsettled_grid() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(3, GraphFunction::Sine);
        graph.reconcile(&mut host, 4, Vec3::ONE);
        assert!(!graph.update_frame(&mut host, GraphFunction::Sine, 0.0));
        for handle in graph.points() {
            assert_eq!(host.positions[handle], Vec3::ZERO);
        }
    }

    #[test]
    fn test_spawn_budget_converges_over_frames() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(10, GraphFunction::Sine).with_spawn_budget(Some(30));

        let mut frames = 0;
        while !graph.update(&mut host, 0.0) {
            frames += 1;
            assert!(graph.len() <= 100);
            assert!(frames < 10);
        }
        // 30 + 30 + 30 skipped, the fourth frame tops up to 100 and updates.
        assert_eq!(frames, 3);
        assert_eq!(graph.len(), 100);
    }

    #[test]
    fn test_spawn_budget_does_not_limit_shrink() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(10, GraphFunction::Sine);
        graph.update(&mut host, 0.0);
        graph.set_spawn_budget(Some(1));
        graph.set_resolution(2);
        assert!(graph.update(&mut host, 0.0));
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_growth_preserves_existing_positions_until_update() {
        let mut host = RecordingHost::default();
        let mut graph: Graph<u32> = Graph::new(10, GraphFunction::Ripple);
        graph.update(&mut host, 1.5);
        let before: Vec<Vec3> = graph.points().iter().map(|h| host.positions[h]).collect();

        graph.set_resolution(20);
        graph.reconcile(&mut host, graph.target_count(), Vec3::splat(grid_step(20)));
        assert_eq!(graph.len(), 400);
        for (handle, old) in graph.points()[..100].iter().zip(before.iter()) {
            assert_eq!(host.positions[handle], *old);
        }
    }
}
