//! Scene files: the world, its links and the sensors with their plugin
//! parameters, read from TOML.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use aerosim_hal::{SimWorld, SphericalCoordinates};
use aerosim_sensors::PluginParams;
use aerosim_types::SimError;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub world: WorldConfig,

    #[serde(default)]
    pub links: Vec<LinkConfig>,

    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Physics step, seconds.
    #[serde(default = "default_step_size")]
    pub step_size: f64,

    /// Number of steps `run` takes unless overridden.
    #[serde(default = "default_steps")]
    pub steps: u64,

    #[serde(default)]
    pub spherical_coordinates: SphericalConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SphericalConfig {
    #[serde(default)]
    pub latitude_deg: f64,
    #[serde(default)]
    pub longitude_deg: f64,
    #[serde(default)]
    pub elevation: f64,
    #[serde(default)]
    pub heading_deg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub name: String,
    #[serde(default)]
    pub position: [f64; 3],
    /// Constant world-frame velocity, m/s.
    #[serde(default)]
    pub velocity: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub link: String,
    /// Hz; zero means every step.
    #[serde(default)]
    pub update_rate: f64,
    /// Parameters handed verbatim to the GPS plugin.
    #[serde(default)]
    pub plugin: BTreeMap<String, toml::Value>,
}

fn default_world_name() -> String {
    "default".to_string()
}
fn default_step_size() -> f64 {
    0.001
}
fn default_steps() -> u64 {
    1000
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            step_size: default_step_size(),
            steps: default_steps(),
            spherical_coordinates: SphericalConfig::default(),
        }
    }
}

impl SensorConfig {
    /// The `[sensors.plugin]` table as plugin parameters.  Strings are taken
    /// as-is, every other value by its TOML rendering.
    pub fn plugin_params(&self) -> PluginParams {
        self.plugin
            .iter()
            .map(|(key, value)| {
                let raw = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), raw)
            })
            .collect()
    }
}

impl Scene {
    /// Build the world the scene describes.
    ///
    /// # Errors
    ///
    /// [`SimError::Scene`] for a non-positive step size,
    /// [`SimError::LinkNotFound`] when a sensor is attached to an undeclared
    /// link.
    pub fn build_world(&self) -> Result<SimWorld, SimError> {
        let sc = self.world.spherical_coordinates;
        let mut builder = SimWorld::builder(self.world.name.clone())
            .step_size(self.world.step_size)
            .spherical_coordinates(SphericalCoordinates::new(
                sc.latitude_deg,
                sc.longitude_deg,
                sc.elevation,
                sc.heading_deg,
            ));
        for link in &self.links {
            builder = builder.with_link(
                link.name.clone(),
                Vector3::from(link.position),
                Vector3::from(link.velocity),
            );
        }
        for sensor in &self.sensors {
            builder = builder.with_gps(sensor.name.clone(), sensor.link.clone(), sensor.update_rate);
        }
        builder.build()
    }
}

/// Load a scene file and apply environment overrides.
pub fn load_from(path: &Path) -> Result<Scene, SimError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| SimError::Scene(format!("failed to read {}: {e}", path.display())))?;
    let mut scene: Scene = toml::from_str(&raw)
        .map_err(|e| SimError::Scene(format!("failed to parse {}: {e}", path.display())))?;
    apply_env_overrides(&mut scene);
    Ok(scene)
}

/// Apply `AEROSIM_*` environment variable overrides to `scene`.
///
/// | Variable | Scene field |
/// |---|---|
/// | `AEROSIM_STEPS` | `world.steps` |
/// | `AEROSIM_STEP_SIZE` | `world.step_size` |
///
/// Unparsable values are ignored.
pub fn apply_env_overrides(scene: &mut Scene) {
    if let Ok(v) = std::env::var("AEROSIM_STEPS")
        && let Ok(steps) = v.parse::<u64>()
    {
        scene.world.steps = steps;
    }
    if let Ok(v) = std::env::var("AEROSIM_STEP_SIZE")
        && let Ok(step_size) = v.parse::<f64>()
    {
        scene.world.step_size = step_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerosim_hal::World;

    const FIREFLY: &str = r#"
[world]
name = "outdoor"
step_size = 0.01

[world.spherical_coordinates]
latitude_deg = 47.3667
longitude_deg = 8.55
elevation = 500.0

[[links]]
name = "firefly/base_link"
velocity = [1.0, 0.0, 0.0]

[[sensors]]
name = "gps"
link = "firefly/base_link"
update_rate = 5.0

[sensors.plugin]
robotNamespace = "firefly"
linkName = "firefly/base_link"
horVelStdDev = 0.2
seed = 2016
"#;

    fn write_scene(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("scene.toml");
        std::fs::write(&path, contents).expect("write scene");
        (dir, path)
    }

    #[test]
    fn parses_full_scene() {
        let (_dir, path) = write_scene(FIREFLY);
        let scene = load_from(&path).expect("load");
        assert_eq!(scene.world.name, "outdoor");
        assert_eq!(scene.links[0].velocity, [1.0, 0.0, 0.0]);
        assert_eq!(scene.links[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(scene.sensors[0].update_rate, 5.0);
    }

    #[test]
    fn plugin_table_becomes_params() {
        let scene: Scene = toml::from_str(FIREFLY).expect("parse");
        let params = scene.sensors[0].plugin_params();
        assert_eq!(params.require::<String>("robotNamespace").unwrap(), "firefly");
        assert_eq!(params.get::<f64>("horVelStdDev").unwrap(), Some(0.2));
        assert_eq!(params.get::<u64>("seed").unwrap(), Some(2016));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let scene: Scene = toml::from_str("").expect("parse");
        assert_eq!(scene.world, WorldConfig::default());
        assert!(scene.links.is_empty());
        assert!(scene.sensors.is_empty());
    }

    #[test]
    fn builds_world_from_scene() {
        let scene: Scene = toml::from_str(FIREFLY).expect("parse");
        let world = scene.build_world().expect("world");
        assert_eq!(world.name(), "outdoor");
        assert!(world.link_by_name("firefly/base_link").is_some());
        assert!(world.sensor("gps").is_some());
    }

    #[test]
    fn sensor_on_unknown_link_is_rejected() {
        let mut scene: Scene = toml::from_str(FIREFLY).expect("parse");
        scene.sensors[0].link = "firefly/rotor_0".to_string();
        assert_eq!(
            scene.build_world().unwrap_err(),
            SimError::LinkNotFound("firefly/rotor_0".to_string())
        );
    }

    #[test]
    fn missing_file_is_a_scene_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, SimError::Scene(_)));
    }

    #[test]
    fn malformed_file_is_a_scene_error() {
        let (_dir, path) = write_scene("[world\nname = ");
        assert!(matches!(load_from(&path), Err(SimError::Scene(_))));
    }

    #[test]
    fn env_overrides_steps_and_step_size() {
        // SAFETY: the only test touching these variables.
        unsafe {
            std::env::set_var("AEROSIM_STEPS", "42");
            std::env::set_var("AEROSIM_STEP_SIZE", "not-a-number");
        }
        let mut scene: Scene = toml::from_str(FIREFLY).expect("parse");
        apply_env_overrides(&mut scene);
        unsafe {
            std::env::remove_var("AEROSIM_STEPS");
            std::env::remove_var("AEROSIM_STEP_SIZE");
        }
        assert_eq!(scene.world.steps, 42);
        assert_eq!(scene.world.step_size, 0.01);
    }
}
