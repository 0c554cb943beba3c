//! Inspector configuration.

use serde::Deserialize;

/// Limits and switches for decoding, resolution and validation.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InspectorConfig {
    /// Largest input accepted, in bytes
    pub max_input_bytes: usize,

    /// Deepest proof level resolved before failing with `ChainTooDeep`
    pub max_chain_depth: usize,

    /// Most links a resolved chain may hold before failing with `ChainTooLarge`
    pub max_chain_links: usize,

    /// How close to expiry a link must be to earn an `expiring_soon` warning
    pub expiring_soon_window_secs: i64,

    /// Check that each link only narrows the capabilities of its proofs
    pub audit_attenuation: bool,

    /// Discard archive blocks whose bytes do not hash to their content id
    pub verify_block_integrity: bool,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 10 * 1024 * 1024,
            max_chain_depth: 64,
            max_chain_links: 1024,
            expiring_soon_window_secs: 24 * 60 * 60,
            audit_attenuation: true,
            verify_block_integrity: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_fills_missing_fields_with_defaults() {
        let config: InspectorConfig =
            serde_json::from_str(r#"{"maxChainDepth": 8, "auditAttenuation": false}"#).unwrap();
        assert_eq!(config.max_chain_depth, 8);
        assert!(!config.audit_attenuation);
        assert_eq!(config.max_input_bytes, InspectorConfig::default().max_input_bytes);
        assert_eq!(config.expiring_soon_window_secs, 86_400);
    }
}
