//! Sparse map keyed by lattice point, paged in hexagons.
//!
//! An address splits into a page (quotient by [`PAGE_MODULUS`]) and a slot
//! (the remainder's [`page_index`](Eisenstein::page_index)). Pages are dense
//! arrays of [`PAGE_SIZE`] values, so neighbouring tiles usually share one.

use super::eisenstein::{Eisenstein, PAGE_MODULUS};
use crate::constants::PAGE_SIZE;
use ahash::AHashMap;

/// Two-level hexagon-paged map
#[derive(Debug, Clone, Default)]
pub struct HexArray<T> {
    pages: AHashMap<Eisenstein, Box<[T]>>,
}

fn split(address: Eisenstein) -> (Eisenstein, usize) {
    let (page, offset) = address.div_rem_nonzero(PAGE_MODULUS);
    (page, offset.page_index())
}

impl<T: Default + Clone> HexArray<T> {
    /// Create an empty map
    pub fn new() -> Self {
        Self { pages: AHashMap::new() }
    }

    /// Value at `address`, if its page exists
    pub fn get(&self, address: Eisenstein) -> Option<&T> {
        let (page, slot) = split(address);
        self.pages.get(&page).map(|p| &p[slot])
    }

    /// Mutable value at `address`, allocating its page on first touch
    pub fn get_mut(&mut self, address: Eisenstein) -> &mut T {
        let (page, slot) = split(address);
        let entries = self
            .pages
            .entry(page)
            .or_insert_with(|| vec![T::default(); PAGE_SIZE].into_boxed_slice());
        &mut entries[slot]
    }

    /// Number of allocated pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Every slot of every allocated page with its address
    pub fn iter(&self) -> impl Iterator<Item = (Eisenstein, &T)> + '_ {
        self.pages.iter().flat_map(|(page, slots)| {
            let base = *page * PAGE_MODULUS;
            slots
                .iter()
                .enumerate()
                .map(move |(i, v)| (base + Eisenstein::nth_in_hexagon(i), v))
        })
    }

    /// Drop every page
    pub fn clear(&mut self) {
        self.pages.clear();
    }
}
