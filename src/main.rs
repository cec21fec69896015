#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod config;
mod error;
mod export;
mod model_download;
mod pipeline;
mod probe;
mod scene;
mod session;
mod types;
mod ui;

use anyhow::Result;
use gpui::Application;

use config::AppConfig;
use error::StartupError;
use model_download::{ModelKind, ensure_model_ready};
use probe::{CapabilitySource, RuntimeCapabilities, probe_capabilities};
use ui::bindings::{DEFAULT_LAYOUT, UiBindings};

fn prepare(config: &AppConfig) -> Result<UiBindings, StartupError> {
    let models = [
        (ModelKind::HandposeEstimator, config.handpose_estimator_model_path()),
        (ModelKind::PalmDetector, config.palm_detector_model_path()),
    ];
    for (kind, path) in models {
        // A failed download surfaces below as a missing model.
        if let Err(err) = ensure_model_ready(kind, &path) {
            log::error!("failed to provision model: {err:?}");
        }
    }

    startup(&RuntimeCapabilities::new(config), DEFAULT_LAYOUT)
}

/// Probes dependencies, then binds the UI. Elements are only resolved once
/// every dependency is present.
fn startup<S: CapabilitySource>(
    source: &S,
    layout: &[(&str, &str)],
) -> Result<UiBindings, StartupError> {
    probe_capabilities(source)?;
    UiBindings::resolve(layout)
}

fn main() -> Result<()> {
    env_logger::init();

    let config = AppConfig::from_env();
    log::info!("starting HOLO-Gen1 with {config:?}");
    let startup = prepare(&config);

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            let launched = match startup {
                Ok(bindings) => ui::launch_ui(app, config, bindings),
                Err(err) => {
                    log::error!("startup halted: {err}");
                    ui::launch_halted(app, &err)
                }
            };
            if let Err(err) = launched {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::probe::Dependency;

    struct Missing(Option<Dependency>);

    impl CapabilitySource for Missing {
        fn is_available(&self, dependency: Dependency) -> bool {
            self.0 != Some(dependency)
        }
    }

    struct Counting<'a>(&'a Cell<usize>);

    impl CapabilitySource for Counting<'_> {
        fn is_available(&self, _dependency: Dependency) -> bool {
            self.0.set(self.0.get() + 1);
            true
        }
    }

    fn layout_without(id: &str) -> Vec<(&'static str, &'static str)> {
        DEFAULT_LAYOUT
            .iter()
            .copied()
            .filter(|(element_id, _)| *element_id != id)
            .collect()
    }

    #[test]
    fn missing_model_halts_before_elements_are_resolved() {
        let layout = layout_without("capture-image-btn");
        let err = startup(&Missing(Some(Dependency::HandposeModel)), &layout).unwrap_err();

        assert!(matches!(
            err,
            StartupError::MissingDependency(Dependency::HandposeModel)
        ));
        assert!(err.diagnostic().contains("handpose estimator model"));
    }

    #[test]
    fn missing_element_is_reported_once_dependencies_pass() {
        let layout = layout_without("capture-image-btn");
        let err = startup(&Missing(None), &layout).unwrap_err();
        match err {
            StartupError::MissingElement { id } => assert_eq!(id, "capture-image-btn"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn complete_startup_binds_every_element() {
        let checks = Cell::new(0);
        assert!(startup(&Counting(&checks), DEFAULT_LAYOUT).is_ok());
        assert_eq!(checks.get(), Dependency::ALL.len());
    }
}
