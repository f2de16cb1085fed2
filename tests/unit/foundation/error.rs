use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        PolicyError::validation("x")
            .to_string()
            .contains("validation error:")
    );
    assert!(
        PolicyError::engine("x")
            .to_string()
            .contains("render engine error:")
    );
    assert!(PolicyError::cache("x").to_string().contains("cache error:"));
    assert!(
        PolicyError::serde("x")
            .to_string()
            .contains("serialization error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = PolicyError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn serde_json_errors_map_to_serde_variant() {
    let err: PolicyError = serde_json::from_str::<serde_json::Value>("{")
        .unwrap_err()
        .into();
    assert!(matches!(err, PolicyError::Serde(_)));
}
