//! Read-only ecology inputs consumed by the feature and plot-effect planners.

use serde::{Deserialize, Serialize};

use crate::grid::{GridDims, GridError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomeSymbol {
    Snow,
    Tundra,
    Boreal,
    TemperateDry,
    TemperateHumid,
    TropicalSeasonal,
    TropicalRainforest,
    Desert,
}

impl BiomeSymbol {
    pub const ALL: [BiomeSymbol; 8] = [
        BiomeSymbol::Snow,
        BiomeSymbol::Tundra,
        BiomeSymbol::Boreal,
        BiomeSymbol::TemperateDry,
        BiomeSymbol::TemperateHumid,
        BiomeSymbol::TropicalSeasonal,
        BiomeSymbol::TropicalRainforest,
        BiomeSymbol::Desert,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Climate sample for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileClimate {
    pub symbol: BiomeSymbol,
    pub vegetation: f32,
    pub moisture: f32,
    pub temperature: f32,
    pub aridity: f32,
    pub freeze: f32,
    pub elevation: i32,
}

impl Default for TileClimate {
    fn default() -> Self {
        Self {
            symbol: BiomeSymbol::TemperateHumid,
            vegetation: 0.5,
            moisture: 100.0,
            temperature: 15.0,
            aridity: 0.3,
            freeze: 0.0,
            elevation: 100,
        }
    }
}

/// Per-tile biome classification. All arrays are `width * height` long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeClassification {
    pub width: u32,
    pub height: u32,
    pub biome_index: Vec<u8>,
    pub vegetation_density: Vec<f32>,
    pub effective_moisture: Vec<f32>,
    pub surface_temperature: Vec<f32>,
    pub aridity_index: Vec<f32>,
    pub freeze_index: Vec<f32>,
    pub elevation: Vec<i32>,
}

impl BiomeClassification {
    pub fn filled(dims: GridDims, climate: TileClimate) -> Self {
        let len = dims.len();
        Self {
            width: dims.width,
            height: dims.height,
            biome_index: vec![climate.symbol.index(); len],
            vegetation_density: vec![climate.vegetation; len],
            effective_moisture: vec![climate.moisture; len],
            surface_temperature: vec![climate.temperature; len],
            aridity_index: vec![climate.aridity; len],
            freeze_index: vec![climate.freeze; len],
            elevation: vec![climate.elevation; len],
        }
    }

    pub fn dims(&self) -> GridDims {
        GridDims {
            width: self.width,
            height: self.height,
        }
    }

    /// Check every array against the grid the classification claims.
    pub fn validate(&self) -> Result<(), GridError> {
        let dims = GridDims::new(self.width, self.height)?;
        dims.check_len("biome_index", self.biome_index.len())?;
        dims.check_len("vegetation_density", self.vegetation_density.len())?;
        dims.check_len("effective_moisture", self.effective_moisture.len())?;
        dims.check_len("surface_temperature", self.surface_temperature.len())?;
        dims.check_len("aridity_index", self.aridity_index.len())?;
        dims.check_len("freeze_index", self.freeze_index.len())?;
        dims.check_len("elevation", self.elevation.len())?;
        Ok(())
    }

    pub fn set_tile(&mut self, index: usize, climate: TileClimate) {
        self.biome_index[index] = climate.symbol.index();
        self.vegetation_density[index] = climate.vegetation;
        self.effective_moisture[index] = climate.moisture;
        self.surface_temperature[index] = climate.temperature;
        self.aridity_index[index] = climate.aridity;
        self.freeze_index[index] = climate.freeze;
        self.elevation[index] = climate.elevation;
    }

    pub fn symbol(&self, index: usize) -> Option<BiomeSymbol> {
        BiomeSymbol::from_index(self.biome_index[index])
    }

    pub fn tile(&self, index: usize) -> Option<TileClimate> {
        Some(TileClimate {
            symbol: self.symbol(index)?,
            vegetation: self.vegetation_density[index],
            moisture: self.effective_moisture[index],
            temperature: self.surface_temperature[index],
            aridity: self.aridity_index[index],
            freeze: self.freeze_index[index],
            elevation: self.elevation[index],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_indices_round_trip_and_reject_unknown() {
        for symbol in BiomeSymbol::ALL {
            assert_eq!(BiomeSymbol::from_index(symbol.index()), Some(symbol));
        }
        assert_eq!(BiomeSymbol::from_index(8), None);
    }

    #[test]
    fn validate_reports_short_arrays() {
        let dims = GridDims::new(3, 2).unwrap();
        let mut classification = BiomeClassification::filled(dims, TileClimate::default());
        assert!(classification.validate().is_ok());
        classification.freeze_index.pop();
        assert!(classification.validate().is_err());
    }
}
