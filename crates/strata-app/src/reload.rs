//! Turning an edited config file into settings updates for a live stream.

use strata_config::ValidatedTerrain;
use strata_stream::SettingsUpdate;

/// Updates that move a stream built from `current` onto `next`.
///
/// A noise-only change is sent as [`SettingsUpdate::Noise`]; any elevation
/// change sends the full [`SettingsUpdate::Terrain`]. Stream policy (LOD
/// table, collider and eviction settings) is fixed when the store is built
/// and is not part of the result.
pub fn settings_updates(
    current: &ValidatedTerrain,
    next: &ValidatedTerrain,
) -> Vec<SettingsUpdate> {
    let mut updates = Vec::new();

    if current.height != next.height {
        if current.height.elevation == next.height.elevation {
            updates.push(SettingsUpdate::Noise(next.height.noise.clone()));
        } else {
            updates.push(SettingsUpdate::Terrain(next.height.clone()));
        }
    }
    if current.mesh != next.mesh {
        updates.push(SettingsUpdate::Mesh(next.mesh.clone()));
    }
    if current.texture != next.texture {
        updates.push(SettingsUpdate::Texture(next.texture.clone()));
    }

    updates
}
