//! Host side of the injection overlay
//!
//! Three texel planes (flags, position input, velocity input) plus a tag per
//! slot. `stage` marks a slot `Pending` and raises its flags; `settle` runs
//! after a step has consumed the overlay, moving every pending slot to
//! `Settled` and zeroing the flags so nothing is applied twice.

use particle_physics::{Injection, SimulationGrid, SlotTag, Texel};

pub struct InjectionOverlay {
    grid: SimulationGrid,
    tags: Vec<SlotTag>,
    flags: Vec<Texel>,
    position_input: Vec<Texel>,
    velocity_input: Vec<Texel>,
    pending: Vec<u32>,
    dirty: bool,
}

impl InjectionOverlay {
    pub fn new(grid: SimulationGrid) -> Self {
        let len = grid.capacity() as usize;
        Self {
            grid,
            tags: vec![SlotTag::Empty; len],
            flags: vec![Texel::ZERO; len],
            position_input: vec![Texel::ZERO; len],
            velocity_input: vec![Texel::ZERO; len],
            pending: Vec::new(),
            dirty: false,
        }
    }

    /// Queue `injection` for slot `index`. Returns `false` past capacity.
    pub fn stage(&mut self, index: u32, injection: Injection) -> bool {
        let Some(offset) = self.grid.texel_offset(index) else {
            return false;
        };

        if self.tags[offset].pending().is_none() {
            self.pending.push(index);
        }
        self.tags[offset] = SlotTag::Pending(injection);
        self.flags[offset] = injection.flag_texel();
        if let Some(position) = injection.position {
            self.position_input[offset] = Texel::from_vec3(position);
        }
        if let Some(velocity) = injection.velocity {
            self.velocity_input[offset] = Texel::from_vec3(velocity);
        }
        self.dirty = true;
        true
    }

    /// Consume every pending injection. Returns how many slots settled.
    pub fn settle(&mut self) -> usize {
        let settled = self.pending.len();
        for index in self.pending.drain(..) {
            let offset = index as usize;
            self.tags[offset] = SlotTag::Settled;
            self.flags[offset] = Texel::ZERO;
        }
        if settled > 0 {
            self.dirty = true;
        }
        settled
    }

    /// Mark a slot as written without going through the overlay.
    pub fn mark_settled(&mut self, index: u32) {
        if let Some(offset) = self.grid.texel_offset(index) {
            self.tags[offset] = SlotTag::Settled;
        }
    }

    pub fn tag(&self, index: u32) -> Option<&SlotTag> {
        self.grid.texel_offset(index).map(|offset| &self.tags[offset])
    }

    pub fn injection(&self, offset: usize) -> Option<&Injection> {
        self.tags.get(offset).and_then(SlotTag::pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// True when the planes changed since the last upload.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_uploaded(&mut self) {
        self.dirty = false;
    }

    pub fn tags(&self) -> &[SlotTag] {
        &self.tags
    }

    pub fn flags(&self) -> &[Texel] {
        &self.flags
    }

    pub fn position_input(&self) -> &[Texel] {
        &self.position_input
    }

    pub fn velocity_input(&self) -> &[Texel] {
        &self.velocity_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn overlay() -> InjectionOverlay {
        InjectionOverlay::new(SimulationGrid::new(4).unwrap())
    }

    #[test]
    fn test_starts_zeroed() {
        let overlay = overlay();
        assert!(overlay.flags().iter().all(|t| *t == Texel::ZERO));
        assert!(overlay.tags().iter().all(|t| *t == SlotTag::Empty));
        assert!(!overlay.is_dirty());
    }

    #[test]
    fn test_stage_raises_flags() {
        let mut overlay = overlay();
        let injection = Injection::new(Vec3::new(5.0, 0.0, 0.0), Vec3::Y);
        assert!(overlay.stage(5, injection));

        assert_eq!(overlay.tag(5), Some(&SlotTag::Pending(injection)));
        assert_eq!(overlay.flags()[5].xyz, [1.0, 1.0, 0.0]);
        assert_eq!(overlay.position_input()[5], Texel::from_vec3(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(overlay.velocity_input()[5], Texel::from_vec3(Vec3::Y));
        assert_eq!(overlay.pending_count(), 1);
        assert!(overlay.is_dirty());
    }

    #[test]
    fn test_stage_past_capacity() {
        let mut overlay = overlay();
        assert!(!overlay.stage(16, Injection::new(Vec3::X, Vec3::X)));
        assert_eq!(overlay.pending_count(), 0);
        assert_eq!(overlay.flags()[0], Texel::ZERO);
    }

    #[test]
    fn test_settle_clears_flags_once() {
        let mut overlay = overlay();
        overlay.stage(0, Injection::new(Vec3::X, Vec3::Y));
        overlay.stage(1, Injection::position_only(Vec3::Z));
        overlay.mark_uploaded();

        assert_eq!(overlay.settle(), 2);
        assert!(overlay.is_dirty());
        assert_eq!(overlay.tag(0), Some(&SlotTag::Settled));
        assert_eq!(overlay.tag(1), Some(&SlotTag::Settled));
        assert!(overlay.flags().iter().all(|t| *t == Texel::ZERO));

        overlay.mark_uploaded();
        assert_eq!(overlay.settle(), 0);
        assert!(!overlay.is_dirty());
    }

    #[test]
    fn test_restage_counts_once() {
        let mut overlay = overlay();
        overlay.stage(2, Injection::position_only(Vec3::X));
        overlay.stage(2, Injection::new(Vec3::Y, Vec3::Z));
        assert_eq!(overlay.pending_count(), 1);
        assert_eq!(overlay.injection(2), Some(&Injection::new(Vec3::Y, Vec3::Z)));
    }
}
