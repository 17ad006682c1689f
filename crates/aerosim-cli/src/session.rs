//! Loading plugins onto a scene and stepping it with bridges attached.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use aerosim_hal::{SimWorld, World};
use aerosim_middleware::{BridgedFrame, TopicBridge, TransportHub, TransportNode};
use aerosim_sensors::GpsPlugin;
use aerosim_types::{SimError, SimTime};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Scene;

/// Bridged frames buffered between the bridges and the printer.
const FRAME_BUFFER: usize = 1024;

/// How long stepping waits for the bridges to pick up new registrations.
const BRIDGE_ATTACH_TIMEOUT: Duration = Duration::from_secs(1);

/// Plugins attached to a world.
pub struct LoadedPlugins {
    plugins: Vec<(GpsPlugin, String)>,
    failures: Vec<(String, SimError)>,
}

impl LoadedPlugins {
    pub fn loaded(&self) -> usize {
        self.plugins.len()
    }

    /// `(sensor name, error)` for every plugin that refused to load.
    pub fn failures(&self) -> &[(String, SimError)] {
        &self.failures
    }

    /// Namespaces of the loaded plugins.
    pub fn namespaces(&self) -> BTreeSet<String> {
        self.plugins.iter().map(|(_, ns)| ns.clone()).collect()
    }

    /// Detach every plugin from its sensor.
    pub fn unload(self, world: &mut SimWorld) {
        for (plugin, _) in self.plugins {
            let name = plugin.sensor_name().to_string();
            if let Some((sensor, _)) = world.sensor_and_state(&name) {
                plugin.unload(sensor);
            }
        }
    }
}

/// Load one GPS plugin per scene sensor.  A plugin that fails to load is
/// recorded and skipped.
pub fn load_plugins(scene: &Scene, world: &mut SimWorld, hub: &TransportHub) -> LoadedPlugins {
    let mut loaded = LoadedPlugins {
        plugins: Vec::new(),
        failures: Vec::new(),
    };
    for sensor_config in &scene.sensors {
        let params = sensor_config.plugin_params();
        let Some((sensor, state)) = world.sensor_and_state(&sensor_config.name) else {
            continue;
        };
        match GpsPlugin::load(sensor, state, hub, &params) {
            Ok(plugin) => {
                let namespace = params
                    .get::<String>("robotNamespace")
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                loaded.plugins.push((plugin, namespace));
            }
            Err(e) => loaded.failures.push((sensor_config.name.clone(), e)),
        }
    }
    loaded
}

/// Outcome of [`run_scene`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: u64,
    pub sensor_events: u64,
    pub sim_time: SimTime,
    pub plugins_loaded: usize,
    pub plugin_failures: Vec<(String, SimError)>,
    pub bridged_topics: usize,
    pub frames: u64,
    pub interrupted: bool,
}

/// Build the scene's world, attach plugins and bridges, take `steps` steps
/// (or fewer if `stop` is raised) and tear everything down again.
///
/// `on_frame` sees every bridged frame, from a separate task.
pub async fn run_scene<F>(
    scene: &Scene,
    steps: u64,
    stop: Arc<AtomicBool>,
    mut on_frame: F,
) -> Result<RunSummary, SimError>
where
    F: FnMut(&BridgedFrame) + Send + 'static,
{
    let mut world = scene.build_world()?;
    let hub = TransportHub::default();
    let plugins = load_plugins(scene, &mut world, &hub);
    for (sensor, e) in plugins.failures() {
        warn!(sensor = %sensor, error = %e, "sensor runs without its plugin");
    }

    let (tx, mut rx) = mpsc::channel(FRAME_BUFFER);
    let mut bridges = Vec::new();
    let mut bridge_tasks = JoinSet::new();
    for namespace in plugins.namespaces() {
        let bridge = TopicBridge::new(TransportNode::new(hub.clone(), namespace));
        let registrations = bridge.attach();
        bridge_tasks.spawn(bridge.clone().serve(registrations, tx.clone()));
        bridges.push(bridge);
    }
    drop(tx);

    let printer = tokio::spawn(async move {
        let mut frames = 0u64;
        while let Some(frame) = rx.recv().await {
            on_frame(&frame);
            frames += 1;
        }
        frames
    });

    info!(world = world.name(), steps, plugins = plugins.loaded(), "stepping world");
    let mut taken = 0;
    let mut sensor_events = 0u64;
    let mut interrupted = false;
    let mut attached = false;
    while taken < steps {
        if stop.load(Ordering::SeqCst) {
            interrupted = true;
            break;
        }
        let fired = world.step();
        sensor_events += fired as u64;
        taken += 1;
        // Active sensors all fire on the first step, which is when their
        // plugins register channels.
        if !attached && fired > 0 {
            wait_for_registrations(&bridges, 2 * plugins.loaded()).await;
            attached = true;
        }
        tokio::task::yield_now().await;
    }
    debug!(taken, sensor_events, "stepping finished");

    let plugins_loaded = plugins.loaded();
    let plugin_failures = plugins.failures().to_vec();
    plugins.unload(&mut world);
    hub.shutdown();

    while let Some(result) = bridge_tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "bridge stopped with an error"),
            Err(e) => warn!(error = %e, "bridge task failed"),
        }
    }
    let frames = printer
        .await
        .map_err(|e| SimError::Runtime(format!("frame printer failed: {e}")))?;

    Ok(RunSummary {
        steps: taken,
        sensor_events,
        sim_time: world.sim_time(),
        plugins_loaded,
        plugin_failures,
        bridged_topics: bridges.iter().map(|b| b.requests().len()).sum(),
        frames,
        interrupted,
    })
}

async fn wait_for_registrations(bridges: &[TopicBridge], expected: usize) {
    let accepted = || bridges.iter().map(|b| b.requests().len()).sum::<usize>();
    let waited = tokio::time::timeout(BRIDGE_ATTACH_TIMEOUT, async {
        while accepted() < expected {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if waited.is_err() {
        warn!(expected, accepted = accepted(), "bridges did not pick up every registration in time");
    }
}

/// Load `scene` and configure every plugin without stepping.  Returns the
/// plugin failures; an unloadable scene is an error.
pub fn validate_scene(scene: &Scene) -> Result<Vec<(String, SimError)>, SimError> {
    let mut world = scene.build_world()?;
    let plugins = load_plugins(scene, &mut world, &TransportHub::default());
    let failures = plugins.failures().to_vec();
    plugins.unload(&mut world);
    Ok(failures)
}
