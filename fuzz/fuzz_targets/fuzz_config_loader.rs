#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<substep_config::Config>(data) {
        let _ = cfg.validate();
    }
    if let Ok(p) = toml::from_str::<substep_config::PersistedPhases>(data) {
        let _ = substep_config::phases_well_formed(p.phases);
    }
});
