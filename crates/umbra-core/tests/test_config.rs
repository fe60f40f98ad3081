use umbra_core::engine::{EngineMode, OutputNorm, RejectionMethod, StackMethod, StackParams};
use umbra_core::pipeline::RunConfig;
use umbra_core::validate::ValidationLimits;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn test_default_stack_params() {
    let params = StackParams::default();
    assert_eq!(params.method, StackMethod::Average);
    assert_eq!(params.rejection, RejectionMethod::WinsorizedSigma);
    assert_eq!(params.rejection_param1, 3.0);
    assert_eq!(params.rejection_param2, 3.0);
    assert_eq!(params.norm, OutputNorm::NoScale);
}

#[test]
fn test_default_validation_limits() {
    let limits = ValidationLimits::default();
    assert_eq!(limits.max_median, 200.0);
    assert_eq!(limits.max_hot_pixel_fraction, 0.002);
    assert_eq!(limits.max_mad_ratio, 0.15);
    assert_eq!(limits.max_central_dispersion, 0.4);
}

#[test]
fn test_default_run_config() {
    let config = RunConfig::default();
    assert_eq!(config.temperature_precision, 0.5);
    assert_eq!(config.min_darks_threshold, 0);
    assert!(!config.force);
    assert!(!config.dry_run);
    assert!(matches!(config.engine, EngineMode::Native { .. }));
}

#[test]
fn test_staging_dir_defaults_under_library() {
    let config = RunConfig {
        library_root: "/data/library".into(),
        ..RunConfig::default()
    };
    assert_eq!(
        config.effective_staging_dir(),
        std::path::PathBuf::from("/data/library/.staging")
    );
}

// ---------------------------------------------------------------------------
// TOML round trip
// ---------------------------------------------------------------------------

#[test]
fn test_run_config_toml_round_trip() {
    let config = RunConfig {
        input_roots: vec!["darks".into()],
        library_root: "library".into(),
        max_age_days: Some(120),
        min_darks_threshold: 8,
        stacking: StackParams {
            method: StackMethod::Median,
            rejection: RejectionMethod::Sigma,
            rejection_param1: 2.5,
            rejection_param2: 2.5,
            norm: OutputNorm::AddScale,
        },
        engine: EngineMode::Flatpak {
            package: "org.free_astro.siril".into(),
        },
        ..RunConfig::default()
    };

    let rendered = toml::to_string_pretty(&config).unwrap();
    let parsed: RunConfig = toml::from_str(&rendered).unwrap();

    assert_eq!(parsed.max_age_days, Some(120));
    assert_eq!(parsed.min_darks_threshold, 8);
    assert_eq!(parsed.stacking.method, StackMethod::Median);
    assert_eq!(parsed.stacking.norm, OutputNorm::AddScale);
    assert_eq!(parsed.stacking.signature(), config.stacking.signature());
    assert!(matches!(parsed.engine, EngineMode::Flatpak { ref package } if package == "org.free_astro.siril"));
}

#[test]
fn test_partial_toml_uses_field_defaults() {
    let parsed: RunConfig = toml::from_str(
        r#"
input_roots = ["darks"]
library_root = "library"
"#,
    )
    .unwrap();
    assert_eq!(parsed.temperature_precision, 0.5);
    assert_eq!(parsed.stacking.rejection, RejectionMethod::WinsorizedSigma);
    assert_eq!(parsed.limits.max_median, 200.0);
    assert!(parsed.max_age_days.is_none());
}
