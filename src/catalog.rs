//! ==============================================================================
//! catalog.rs - static crop catalog and parcel membership
//! ==============================================================================
//!
//! purpose:
//!     holds the crops planted on the farm and answers "which crop owns this
//!     parcel?". the "all" pseudo-crop is derived on demand and never stored,
//!     it is a display aggregate and not a partition of the grid.
//!
//! relationships:
//!     - loaded by: config.rs (optional [[crops]] override)
//!     - used by: grid.rs (crop assignment), dashboard.rs (filter, stats)
//!
//! ==============================================================================

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{Crop, ALL_CROPS};

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("crop key {0:?} is reserved")]
    ReservedKey(String),
    #[error("crop key {0:?} must be non-empty and use only a-z, 0-9, '_' or '-'")]
    InvalidKey(String),
    #[error("crop {0:?} is declared twice")]
    DuplicateCrop(String),
    #[error("parcel {parcel} of crop {crop:?} is outside the {cells}-cell grid")]
    ParcelOutOfGrid {
        crop: String,
        parcel: String,
        cells: usize,
    },
    #[error("parcel {parcel} is claimed by both {first:?} and {second:?}")]
    ParcelClaimedTwice {
        parcel: String,
        first: String,
        second: String,
    },
}

/// keys end up in urls and inline handlers, so keep them to [a-z0-9_-]+
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// the crops of the farm, in sidebar order
#[derive(Clone, Debug, PartialEq)]
pub struct CropCatalog {
    crops: Vec<Crop>,
    /// parcel id -> index into `crops`
    owners: HashMap<String, usize>,
}

impl CropCatalog {
    /// build and validate a catalog against a grid of `cell_count` parcels
    pub fn new(crops: Vec<Crop>, cell_count: usize) -> Result<Self, CatalogError> {
        let mut owners: HashMap<String, usize> = HashMap::new();
        for (idx, crop) in crops.iter().enumerate() {
            if crop.key == ALL_CROPS {
                return Err(CatalogError::ReservedKey(crop.key.clone()));
            }
            if !is_valid_key(&crop.key) {
                return Err(CatalogError::InvalidKey(crop.key.clone()));
            }
            if crops[..idx].iter().any(|c| c.key == crop.key) {
                return Err(CatalogError::DuplicateCrop(crop.key.clone()));
            }
            for parcel in &crop.parcels {
                match parcel_number(parcel) {
                    Some(n) if n >= 1 && n <= cell_count && *parcel == format!("C{}", n) => {}
                    _ => {
                        return Err(CatalogError::ParcelOutOfGrid {
                            crop: crop.key.clone(),
                            parcel: parcel.clone(),
                            cells: cell_count,
                        })
                    }
                }
                if let Some(&prev) = owners.get(parcel) {
                    return Err(CatalogError::ParcelClaimedTwice {
                        parcel: parcel.clone(),
                        first: crops[prev].key.clone(),
                        second: crop.key.clone(),
                    });
                }
                owners.insert(parcel.clone(), idx);
            }
        }
        Ok(Self { crops, owners })
    }

    /// farm default: tomatoes C1-C8, onions C9-C14, mint on everything after
    pub fn default_for(cell_count: usize) -> Self {
        let crops = default_crops(cell_count);
        // membership is clamped to the grid so this cannot fail
        let owners = crops
            .iter()
            .enumerate()
            .flat_map(|(idx, c)| c.parcels.iter().map(move |p| (p.clone(), idx)))
            .collect();
        Self { crops, owners }
    }

    /// specific crops, excluding "all"
    pub fn crops(&self) -> &[Crop] {
        &self.crops
    }

    pub fn get(&self, key: &str) -> Option<&Crop> {
        self.crops.iter().find(|c| c.key == key)
    }

    /// crop owning `cell_id`, if any
    pub fn crop_for(&self, cell_id: &str) -> Option<&Crop> {
        self.owners.get(cell_id).map(|&idx| &self.crops[idx])
    }

    /// true for "all" and for every declared crop key
    pub fn is_known_key(&self, key: &str) -> bool {
        key == ALL_CROPS || self.get(key).is_some()
    }

    /// the "all" aggregate entry for a grid of `cell_count` parcels
    pub fn all_entry(cell_count: usize) -> Crop {
        Crop {
            key: ALL_CROPS.to_string(),
            name: "All crops".to_string(),
            color: "#9575cd".to_string(),
            icon: "🌾".to_string(),
            parcels: parcel_range(1, cell_count),
        }
    }

    /// sidebar entries: "all" first, then the specific crops
    pub fn entries(&self, cell_count: usize) -> Vec<Crop> {
        std::iter::once(Self::all_entry(cell_count))
            .chain(self.crops.iter().cloned())
            .collect()
    }
}

fn default_crops(cell_count: usize) -> Vec<Crop> {
    vec![
        Crop {
            key: "tomato".to_string(),
            name: "Tomatoes".to_string(),
            color: "#ff4444".to_string(),
            icon: "🍅".to_string(),
            parcels: parcel_range(1, cell_count.min(8)),
        },
        Crop {
            key: "onion".to_string(),
            name: "Onions".to_string(),
            color: "#ffaa00".to_string(),
            icon: "🧅".to_string(),
            parcels: parcel_range(9, cell_count.min(14)),
        },
        Crop {
            key: "mint".to_string(),
            name: "Mint".to_string(),
            color: "#44aa44".to_string(),
            icon: "🌿".to_string(),
            parcels: parcel_range(15, cell_count),
        },
    ]
}

/// "C<from>".."C<to>" inclusive, empty when from > to
fn parcel_range(from: usize, to: usize) -> Vec<String> {
    (from..=to).map(|n| format!("C{}", n)).collect()
}

/// parse the 1-based number out of "C<n>"
pub fn parcel_number(id: &str) -> Option<usize> {
    id.strip_prefix('C')?.parse().ok()
}
