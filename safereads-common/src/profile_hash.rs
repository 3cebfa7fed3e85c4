//! Sensitivity profile hashing
//!
//! Derives the analysis cache key for a sensitivity vector. The key only
//! partitions the cache; it is not a security boundary and makes no
//! collision-resistance claims against adversarial input.
//!
//! Format: the six dimension values joined by `-` in this fixed order:
//! violence, language, sexual content, substance use, dark themes,
//! religious sensitivity. Values are integers, so `-` never appears inside
//! a component (dimensions are validated to 1-10 before they are stored).

use crate::models::SensitivitySettings;

/// Compute the deterministic cache key for a sensitivity vector
pub fn compute_profile_hash(settings: &SensitivitySettings) -> String {
    [
        settings.violence,
        settings.language,
        settings.sexual_content,
        settings.substance_use,
        settings.dark_themes,
        settings.religious_sensitivity,
    ]
    .iter()
    .map(|value| value.to_string())
    .collect::<Vec<_>>()
    .join("-")
}
