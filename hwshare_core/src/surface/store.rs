// Copyright 2026 the Hwshare Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Slot storage for surfaces with generational handles and reference counts.

use super::Surface;
use super::id::SurfaceId;

#[derive(Debug)]
struct Slot {
    generation: u32,
    refcount: u32,
    surface: Option<Surface>,
}

/// Outcome of [`SurfaceStore::release`].
#[derive(Debug)]
pub enum Release {
    /// The handle is stale; nothing changed.
    Stale,
    /// Other references remain.
    Retained(u32),
    /// That was the last reference; the surface is returned for teardown.
    Last(Surface),
}

/// Storage for all live surfaces.
///
/// Surfaces are addressed by [`SurfaceId`] handles. Destroyed surfaces'
/// slots are recycled via a free list, and generation counters prevent stale
/// handle access.
#[derive(Debug, Default)]
pub struct SurfaceStore {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
}

impl SurfaceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a surface with a reference count of one.
    pub fn insert(&mut self, surface: Surface) -> SurfaceId {
        let idx = if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot. The generation was bumped on removal.
            let slot = &mut self.slots[idx as usize];
            slot.refcount = 1;
            slot.surface = Some(surface);
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            self.slots.push(Slot {
                generation: 0,
                refcount: 1,
                surface: Some(surface),
            });
            idx
        };
        self.live += 1;

        SurfaceId {
            idx,
            generation: self.slots[idx as usize].generation,
        }
    }

    fn slot(&self, id: SurfaceId) -> Option<&Slot> {
        self.slots
            .get(id.idx as usize)
            .filter(|slot| slot.generation == id.generation && slot.surface.is_some())
    }

    fn slot_mut(&mut self, id: SurfaceId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.idx as usize)
            .filter(|slot| slot.generation == id.generation && slot.surface.is_some())
    }

    /// Returns whether the given handle refers to a live surface.
    #[must_use]
    pub fn is_alive(&self, id: SurfaceId) -> bool {
        self.slot(id).is_some()
    }

    /// Returns the surface, if the handle is live.
    #[must_use]
    pub fn get(&self, id: SurfaceId) -> Option<&Surface> {
        self.slot(id).and_then(|slot| slot.surface.as_ref())
    }

    /// Returns the surface mutably, if the handle is live.
    pub fn get_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.slot_mut(id).and_then(|slot| slot.surface.as_mut())
    }

    /// Current reference count, or `None` for a stale handle.
    #[must_use]
    pub fn refcount(&self, id: SurfaceId) -> Option<u32> {
        self.slot(id).map(|slot| slot.refcount)
    }

    /// Adds a reference. Returns the new count, or `None` for a stale handle.
    pub fn retain(&mut self, id: SurfaceId) -> Option<u32> {
        let slot = self.slot_mut(id)?;
        slot.refcount = slot.refcount.saturating_add(1);
        Some(slot.refcount)
    }

    /// Drops a reference, returning the surface when the count hits zero.
    pub fn release(&mut self, id: SurfaceId) -> Release {
        let Some(slot) = self.slot_mut(id) else {
            return Release::Stale;
        };
        slot.refcount -= 1;
        if slot.refcount > 0 {
            return Release::Retained(slot.refcount);
        }
        match self.remove_slot(id.idx) {
            Some(surface) => Release::Last(surface),
            None => Release::Stale,
        }
    }

    fn remove_slot(&mut self, idx: u32) -> Option<Surface> {
        let slot = &mut self.slots[idx as usize];
        let surface = slot.surface.take()?;
        // Bump generation so old handles immediately fail validation.
        slot.generation = slot.generation.wrapping_add(1);
        slot.refcount = 0;
        self.free_list.push(idx);
        self.live -= 1;
        Some(surface)
    }

    /// Removes every live surface regardless of reference count.
    pub fn drain(&mut self) -> Vec<(SurfaceId, Surface)> {
        let mut drained = Vec::with_capacity(self.live);
        for idx in 0..self.slots.len() {
            let Ok(idx) = u32::try_from(idx) else {
                break;
            };
            let generation = self.slots[idx as usize].generation;
            if let Some(surface) = self.remove_slot(idx) {
                drained.push((SurfaceId { idx, generation }, surface));
            }
        }
        drained
    }

    /// Number of live surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` when no surfaces are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Handles of all live surfaces, in slot order.
    pub fn ids(&self) -> impl Iterator<Item = SurfaceId> + '_ {
        self.slots.iter().enumerate().filter_map(|(idx, slot)| {
            let idx = u32::try_from(idx).ok()?;
            slot.surface.as_ref().map(|_| SurfaceId {
                idx,
                generation: slot.generation,
            })
        })
    }
}
