use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// One entry of the capabilities listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityInfo {
    /// Wire name, usable as `capability` in a dispatch request
    pub name: String,
    /// Function tool name exposed to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub description: String,
    pub input_field: String,
    pub output_field: String,
}

impl From<Capability> for CapabilityInfo {
    fn from(capability: Capability) -> Self {
        Self {
            name: capability.name().to_string(),
            tool_name: capability.tool_name().map(str::to_owned),
            description: capability.description().to_string(),
            input_field: capability.input_field().to_string(),
            output_field: capability.output_field().to_string(),
        }
    }
}
