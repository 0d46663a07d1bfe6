//! Per-biome resource yields.

use std::collections::BTreeMap;

use imperion_types::{Biome, Resource};

/// The fixed yield table entry for `biome`.
pub const fn yield_table(biome: Biome) -> &'static [(Resource, u32)] {
    match biome {
        Biome::Plains => &[(Resource::Food, 50), (Resource::Wood, 20)],
        Biome::Mountain => &[(Resource::Stone, 40), (Resource::Metal, 20)],
        Biome::Desert => &[(Resource::Food, 10), (Resource::Metal, 20)],
        Biome::Snow => &[(Resource::Metal, 10)],
        Biome::Forest => &[(Resource::Wood, 60), (Resource::Food, 10)],
        Biome::Swamp => &[(Resource::Food, 20), (Resource::Wood, 10)],
        Biome::Water => &[],
        Biome::Crystals => &[(Resource::Imperion, 20), (Resource::Stone, 10)],
        Biome::Ruins => &[(Resource::Metal, 15), (Resource::Imperion, 5)],
        Biome::Empire => &[
            (Resource::Food, 30),
            (Resource::Wood, 30),
            (Resource::Stone, 30),
            (Resource::Metal, 30),
            (Resource::Imperion, 10),
        ],
    }
}

/// Yields of `biome` as a resource map.
pub fn resources_for(biome: Biome) -> BTreeMap<Resource, u32> {
    yield_table(biome).iter().copied().collect()
}
