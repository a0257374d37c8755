/// Canonical hardware model identifiers for the LoRa sensors we accept on the
/// administrative registration surface.
pub const SUPPORTED_MODELS: [&str; 4] = ["LHT65", "LHT52", "EM300-TH", "S31-LB"];

/// Vendor alias → canonical model. Gateways and older firmware report the
/// same hardware under a handful of spellings; registration and row
/// normalization both fold through this table. Additive: new aliases are new
/// rows, not new branching.
const MODEL_ALIASES: [(&str, &str); 10] = [
    ("lht65", "LHT65"),
    ("lht-65", "LHT65"),
    ("dragino-lht65", "LHT65"),
    ("lht52", "LHT52"),
    ("lht-52", "LHT52"),
    ("dragino-lht52", "LHT52"),
    ("em300", "EM300-TH"),
    ("em300-th", "EM300-TH"),
    ("em300th", "EM300-TH"),
    ("s31-lb", "S31-LB"),
];

/// Maps a raw vendor model string to its canonical identifier. Unrecognized
/// models pass through trimmed so an administrator can still see and register
/// them later; only explicit registration rejects them.
pub fn normalize_model(raw: &str) -> String {
    let trimmed = raw.trim();
    let folded = trimmed.to_lowercase();
    for (alias, canonical) in MODEL_ALIASES {
        if folded == alias {
            return canonical.to_string();
        }
    }
    trimmed.to_string()
}

pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.iter().any(|m| *m == model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_aliases_fold_to_canonical() {
        assert_eq!(normalize_model("LHT-65"), "LHT65");
        assert_eq!(normalize_model(" dragino-lht65 "), "LHT65");
        assert_eq!(normalize_model("em300"), "EM300-TH");
        assert_eq!(normalize_model("S31-LB"), "S31-LB");
    }

    #[test]
    fn unknown_models_pass_through_unchanged() {
        assert_eq!(normalize_model("WSD500A"), "WSD500A");
        assert!(!is_supported_model("WSD500A"));
    }

    #[test]
    fn canonical_models_are_supported() {
        for model in SUPPORTED_MODELS {
            assert!(is_supported_model(&normalize_model(model)));
        }
    }
}
