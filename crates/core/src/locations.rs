//! Location list configuration
//!
//! The location file is TOML with one `[[locations]]` table per place:
//!
//! ```toml
//! [[locations]]
//! city = "Sopron"
//! latitude = 47.68
//! longitude = 16.58
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file '{0}' not found")]
    NotFound(String),
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("At least one location must be provided")]
    NoLocations,
    #[error("Location #{index} has an empty name")]
    EmptyName { index: usize },
    #[error("Latitude of '{name}' must be between -90 and 90 degrees, got {value}")]
    Latitude { name: String, value: f64 },
    #[error("Longitude of '{name}' must be between -180 and 180 degrees, got {value}")]
    Longitude { name: String, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Location {
    #[serde(alias = "city")]
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName { index });
        }
        // written so NaN fails as well
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ConfigError::Latitude {
                name: self.name.clone(),
                value: self.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ConfigError::Longitude {
                name: self.name.clone(),
                value: self.longitude,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationsConfig {
    #[serde(default)]
    pub locations: Vec<Location>,
}

impl LocationsConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: LocationsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locations.is_empty() {
            return Err(ConfigError::NoLocations);
        }
        for (index, location) in self.locations.iter().enumerate() {
            location.validate(index)?;
        }
        Ok(())
    }
}

/// Read and validate the location list
pub fn load_locations(path: impl AsRef<Path>) -> Result<Vec<Location>, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    Ok(LocationsConfig::from_toml(&content)?.locations)
}
