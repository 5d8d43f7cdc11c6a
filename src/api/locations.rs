//! Conditional Access named locations

use crate::api::ApiClient;
use crate::error::{CapmError, Result};
use serde::Deserialize;

/// A named location as normalised by the backend
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedLocation {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// "IP Ranges", "Countries/Regions" or "Unknown"
    #[serde(rename = "type", default)]
    pub location_type: String,
    #[serde(default)]
    pub is_trusted: bool,
    #[serde(default)]
    pub ip_ranges: Vec<String>,
    #[serde(default)]
    pub countries_and_regions: Vec<String>,
    #[serde(default)]
    pub include_unknown_countries_and_regions: bool,
}

impl NamedLocation {
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Unnamed Location")
    }
}

#[derive(Debug, Deserialize)]
struct LocationList {
    #[serde(default)]
    locations: Vec<NamedLocation>,
}

/// List every named location in the tenant
pub async fn list_named_locations(client: &ApiClient) -> Result<Vec<NamedLocation>> {
    let list: LocationList = client.get_plain("api/named-locations").await?;
    tracing::debug!("Loaded {} named locations", list.locations.len());
    Ok(list.locations)
}

/// Find one named location by id
///
/// The backend has no single-location route, so this filters the list.
pub async fn get_named_location(client: &ApiClient, location_id: &str) -> Result<NamedLocation> {
    list_named_locations(client)
        .await?
        .into_iter()
        .find(|loc| loc.id == location_id)
        .ok_or_else(|| CapmError::InvalidArgument(format!("Named location {} not found", location_id)))
}
