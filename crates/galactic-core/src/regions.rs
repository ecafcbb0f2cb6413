//! Galaxy regions: the shards players and civilizations are spread over.

use galactic_types::{GalaxyRegion, RegionId};

/// Slugs and display names of the default regions, in creation order.
pub const DEFAULT_REGIONS: [(&str, &str); 4] = [
    ("core-worlds", "Core Worlds"),
    ("mid-rim", "Mid Rim"),
    ("outer-rim", "Outer Rim"),
    ("unknown-regions", "Unknown Regions"),
];

/// The set of regions, kept in creation order.
#[derive(Debug, Clone, Default)]
pub struct GalaxyShards {
    regions: Vec<GalaxyRegion>,
}

impl GalaxyShards {
    /// Create the default four regions, each with `capacity` player slots.
    pub fn with_default_regions(capacity: u32) -> Self {
        Self {
            regions: DEFAULT_REGIONS
                .iter()
                .map(|(id, name)| GalaxyRegion::new(*id, *name, capacity))
                .collect(),
        }
    }

    /// Least-loaded region that still has player capacity. Ties go to the
    /// earliest-created region.
    pub fn assign_optimal_region(&self) -> Option<RegionId> {
        least_loaded(self.regions.iter().filter(|r| r.has_capacity()))
    }

    /// Least-loaded region regardless of player capacity.
    pub fn least_loaded_region(&self) -> Option<RegionId> {
        least_loaded(self.regions.iter())
    }

    /// Look up a region.
    pub fn get(&self, id: &RegionId) -> Option<&GalaxyRegion> {
        self.regions.iter().find(|r| &r.id == id)
    }

    fn get_mut(&mut self, id: &RegionId) -> Option<&mut GalaxyRegion> {
        self.regions.iter_mut().find(|r| &r.id == id)
    }

    /// Count a player against a region.
    pub fn add_player(&mut self, id: &RegionId) {
        if let Some(region) = self.get_mut(id) {
            region.player_count = region.player_count.saturating_add(1);
        }
    }

    /// Release a player slot.
    pub fn remove_player(&mut self, id: &RegionId) {
        if let Some(region) = self.get_mut(id) {
            region.player_count = region.player_count.saturating_sub(1);
        }
    }

    /// Count a civilization against a region.
    pub fn add_civilization(&mut self, id: &RegionId) {
        if let Some(region) = self.get_mut(id) {
            region.civilization_count = region.civilization_count.saturating_add(1);
        }
    }

    /// Release a civilization.
    pub fn remove_civilization(&mut self, id: &RegionId) {
        if let Some(region) = self.get_mut(id) {
            region.civilization_count = region.civilization_count.saturating_sub(1);
        }
    }

    /// Attribute AI work to a region.
    pub fn add_ai_load(&mut self, id: &RegionId, load: f64) {
        if let Some(region) = self.get_mut(id) {
            region.ai_processing_load += load;
        }
    }

    /// Zero every region's AI load. Called at each quarter boundary.
    pub fn reset_ai_load(&mut self) {
        for region in &mut self.regions {
            region.ai_processing_load = 0.0;
        }
    }

    /// All regions in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &GalaxyRegion> {
        self.regions.iter()
    }

    /// Owned copy of every region.
    pub fn to_vec(&self) -> Vec<GalaxyRegion> {
        self.regions.clone()
    }

    /// Number of regions.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no regions exist yet.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

fn least_loaded<'a>(regions: impl Iterator<Item = &'a GalaxyRegion>) -> Option<RegionId> {
    let mut best: Option<&GalaxyRegion> = None;
    for region in regions {
        // Strict comparison keeps the earlier region on ties.
        if best.is_none_or(|b| region.load() < b.load()) {
            best = Some(region);
        }
    }
    best.map(|r| r.id.clone())
}
