// Step tables for the drum grid.
//
// The grid is published as a whole: the control path clones it, edits the
// clone and swaps it in, so the step sequencer always reads one consistent
// version.

use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};
use rand::Rng;

use crate::clock::TimeSignature;

/// Number of sound slots, one per sampler key.
pub const NUM_TRACKS: usize = 25;

/// One sound's steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Pitch sent to the sampler for this track
    pub pitch: i32,

    /// One 0/1 flag per step
    pub steps: Vec<u8>,

    pub muted: bool,
}

impl Track {
    pub fn new(pitch: i32, num_steps: usize) -> Self {
        Self {
            pitch,
            steps: vec![0; num_steps],
            muted: false,
        }
    }

    /// Flip one step, given as a 1-based index.
    pub fn toggle(&mut self, step: usize) -> bool {
        match step.checked_sub(1).and_then(|i| self.steps.get_mut(i)) {
            Some(flag) => {
                *flag ^= 1;
                true
            }
            None => false,
        }
    }

    /// OR `pattern` into the track.
    pub fn merge(&mut self, pattern: &[u8]) {
        for (flag, hit) in self.steps.iter_mut().zip(pattern) {
            *flag |= *hit;
        }
    }

    pub fn clear(&mut self) {
        self.steps.fill(0);
    }

    pub fn randomize<R: Rng>(&mut self, rng: &mut R) {
        for flag in self.steps.iter_mut() {
            *flag = rng.gen_bool(0.5) as u8;
        }
    }

    #[inline]
    pub fn hit(&self, step: usize) -> bool {
        self.steps.get(step).is_some_and(|flag| *flag != 0)
    }
}

/// Every track's steps plus the grid they are laid out on.
#[derive(Debug, Clone)]
pub struct Grid {
    pub time_signature: TimeSignature,

    /// Steps per whole note
    pub step_size: usize,

    pub triplets: bool,

    /// Slot `n` plays sampler key `n`
    pub tracks: Vec<Option<Track>>,
}

impl Grid {
    pub fn new(time_signature: TimeSignature, step_size: usize) -> Self {
        Self {
            time_signature,
            step_size,
            triplets: false,
            tracks: vec![None; NUM_TRACKS],
        }
    }

    /// Steps per bar.
    pub fn num_steps(&self) -> usize {
        self.time_signature.steps(self.step_size)
    }

    /// Change meter. Every step table is replaced by an empty one of the
    /// new length.
    pub fn set_time_signature(&mut self, time_signature: TimeSignature) {
        self.time_signature = time_signature;
        let num_steps = self.num_steps();
        for track in self.tracks.iter_mut().flatten() {
            track.steps = vec![0; num_steps];
        }
    }

    pub fn track(&self, slot: usize) -> Option<&Track> {
        self.tracks.get(slot).and_then(Option::as_ref)
    }

    pub fn track_mut(&mut self, slot: usize) -> Option<&mut Track> {
        self.tracks.get_mut(slot).and_then(Option::as_mut)
    }

    /// Create (or reset) the track in `slot`.
    pub fn add_track(&mut self, slot: usize, pitch: i32) {
        let num_steps = self.num_steps();
        if let Some(entry) = self.tracks.get_mut(slot) {
            *entry = Some(Track::new(pitch, num_steps));
        }
    }

    pub fn remove_track(&mut self, slot: usize) {
        if let Some(entry) = self.tracks.get_mut(slot) {
            *entry = None;
        }
    }
}

/// A grid shared between the control path and the step sequencer.
#[derive(Clone)]
pub struct SharedGrid {
    cell: Arc<ArcSwap<Grid>>,
}

impl SharedGrid {
    pub fn new(grid: Grid) -> Self {
        Self {
            cell: Arc::new(ArcSwap::from_pointee(grid)),
        }
    }

    /// Current version. Lock-free; safe on the audio thread.
    #[inline]
    pub fn load(&self) -> Guard<Arc<Grid>> {
        self.cell.load()
    }

    /// Edit a copy of the grid and publish it. Control path only.
    pub fn update<T>(&self, edit: impl FnOnce(&mut Grid) -> T) -> T {
        let mut grid = Grid::clone(&self.cell.load());
        let result = edit(&mut grid);
        self.cell.store(Arc::new(grid));
        result
    }

    /// Like [`update`](Self::update), but nothing is published if `edit`
    /// fails.
    pub fn try_update<T, E>(&self, edit: impl FnOnce(&mut Grid) -> Result<T, E>) -> Result<T, E> {
        let mut grid = Grid::clone(&self.cell.load());
        let result = edit(&mut grid)?;
        self.cell.store(Arc::new(grid));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_toggle_is_one_based() {
        let mut track = Track::new(60, 4);
        assert!(track.toggle(1));
        assert!(track.toggle(4));
        assert!(!track.toggle(0));
        assert!(!track.toggle(5));
        assert_eq!(track.steps, vec![1, 0, 0, 1]);

        track.toggle(1);
        assert_eq!(track.steps, vec![0, 0, 0, 1]);
    }

    #[test]
    fn test_merge_ors_steps() {
        let mut track = Track::new(60, 4);
        track.steps = vec![1, 0, 0, 0];
        track.merge(&[0, 0, 1, 0]);
        assert_eq!(track.steps, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_new_time_signature_resets_tables() {
        let mut grid = Grid::new(TimeSignature::new(4, 4), 16);
        grid.add_track(0, 60);
        grid.track_mut(0).unwrap().toggle(3);

        grid.set_time_signature(TimeSignature::new(7, 8));
        let track = grid.track(0).unwrap();
        assert_eq!(track.steps.len(), 14);
        assert!(track.steps.iter().all(|s| *s == 0));
    }

    #[test]
    fn test_randomize_only_writes_flags() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut track = Track::new(60, 64);
        track.randomize(&mut rng);
        assert!(track.steps.iter().all(|s| *s <= 1));
        assert!(track.steps.iter().any(|s| *s == 1));
    }

    #[test]
    fn test_update_publishes_a_new_version() {
        let shared = SharedGrid::new(Grid::new(TimeSignature::new(4, 4), 16));
        let before = shared.load();

        shared.update(|grid| grid.add_track(2, 62));

        assert!(before.track(2).is_none());
        assert_eq!(shared.load().track(2).map(|t| t.pitch), Some(62));
    }

    #[test]
    fn test_failed_update_publishes_nothing() {
        let shared = SharedGrid::new(Grid::new(TimeSignature::new(4, 4), 16));
        let result: Result<(), &str> = shared.try_update(|grid| {
            grid.add_track(0, 60);
            Err("rejected")
        });

        assert!(result.is_err());
        assert!(shared.load().track(0).is_none());
    }
}
