//! Noisy GPS sampler plugin.
//!
//! On every update of the host [`GpsSensor`] the plugin reads the geodetic
//! position and the world-frame velocity of the link the receiver rides on,
//! perturbs the velocity with zero-mean Gaussian noise, and publishes a
//! [`NavSatFix`] and a ground-speed [`TwistStamped`] carrying the same
//! measurement stamp.  Publication channels are created lazily on the first
//! update (see [`crate::channels`]).

use std::sync::Arc;

use aerosim_hal::{ConnectionId, GpsSensor, Link, World};
use aerosim_middleware::{TransportHub, TransportNode};
use aerosim_types::{
    CovarianceType, FixStatus, Header, NavSatFix, ServiceType, SimError, TwistStamped, Vector3,
};
use tracing::{debug, error, info};

use crate::channels::{ChannelSet, Channels};
use crate::noise::VelocityNoise;
use crate::params::PluginParams;

pub const DEFAULT_GPS_TOPIC: &str = "gps";
pub const DEFAULT_GROUND_SPEED_TOPIC: &str = "ground_speed";
pub const DEFAULT_HOR_POS_STD_DEV: f64 = 3.0;
pub const DEFAULT_VER_POS_STD_DEV: f64 = 6.0;
pub const DEFAULT_HOR_VEL_STD_DEV: f64 = 0.1;
pub const DEFAULT_VER_VEL_STD_DEV: f64 = 0.1;

/// Resolved plugin configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GpsPluginConfig {
    pub namespace: String,
    pub link_name: String,
    pub gps_topic: String,
    pub ground_speed_topic: String,
    /// Standard deviations, metres.  Only reported in the fix covariance.
    pub hor_pos_std_dev: f64,
    pub ver_pos_std_dev: f64,
    /// Standard deviations, m/s.  Drive the velocity noise.
    pub hor_vel_std_dev: f64,
    pub ver_vel_std_dev: f64,
    pub seed: Option<u64>,
}

impl GpsPluginConfig {
    /// Read the configuration from a plugin parameter block.
    ///
    /// # Errors
    ///
    /// [`SimError::MissingParameter`] when `robotNamespace` or `linkName` is
    /// absent, [`SimError::InvalidParameter`] when a value does not parse or a
    /// standard deviation is negative or not finite.
    pub fn from_params(params: &PluginParams) -> Result<Self, SimError> {
        let config = Self {
            namespace: params.require("robotNamespace")?,
            link_name: params.require("linkName")?,
            gps_topic: params.get_or("gpsTopic", DEFAULT_GPS_TOPIC.to_string())?,
            ground_speed_topic: params
                .get_or("groundSpeedTopic", DEFAULT_GROUND_SPEED_TOPIC.to_string())?,
            hor_pos_std_dev: params.get_or("horPosStdDev", DEFAULT_HOR_POS_STD_DEV)?,
            ver_pos_std_dev: params.get_or("verPosStdDev", DEFAULT_VER_POS_STD_DEV)?,
            hor_vel_std_dev: params.get_or("horVelStdDev", DEFAULT_HOR_VEL_STD_DEV)?,
            ver_vel_std_dev: params.get_or("verVelStdDev", DEFAULT_VER_VEL_STD_DEV)?,
            seed: params.get("seed")?,
        };

        for (key, value) in [
            ("horPosStdDev", config.hor_pos_std_dev),
            ("verPosStdDev", config.ver_pos_std_dev),
            ("horVelStdDev", config.hor_vel_std_dev),
            ("verVelStdDev", config.ver_vel_std_dev),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::InvalidParameter {
                    key: key.to_string(),
                    details: format!("standard deviation must be finite and non-negative, got {value}"),
                });
            }
        }
        Ok(config)
    }

    /// Row-major 3x3 position covariance, diagonal only.
    pub fn position_covariance(&self) -> [f64; 9] {
        let h = self.hor_pos_std_dev * self.hor_pos_std_dev;
        let v = self.ver_pos_std_dev * self.ver_pos_std_dev;
        [h, 0.0, 0.0, 0.0, h, 0.0, 0.0, 0.0, v]
    }
}

/// Everything the update handler owns.
pub struct GpsContext {
    config: GpsPluginConfig,
    link: Arc<dyn Link>,
    node: TransportNode,
    noise: VelocityNoise,
    gps_message: NavSatFix,
    ground_speed_message: TwistStamped,
    channels: Channels,
    updates: u64,
}

impl GpsContext {
    /// Build the context and fill in the fields of both records that never
    /// change.
    ///
    /// # Errors
    ///
    /// [`SimError::Noise`] when the velocity noise cannot be constructed.
    pub fn new(config: GpsPluginConfig, link: Arc<dyn Link>, node: TransportNode) -> Result<Self, SimError> {
        let noise = VelocityNoise::new(config.hor_vel_std_dev, config.ver_vel_std_dev, config.seed)?;

        let header = Header {
            frame_id: config.link_name.clone(),
            ..Header::default()
        };
        let gps_message = NavSatFix {
            header: header.clone(),
            service: ServiceType::Gps,
            status: FixStatus::Fix,
            position_covariance_type: CovarianceType::Known,
            position_covariance: config.position_covariance(),
            ..NavSatFix::default()
        };
        let ground_speed_message = TwistStamped {
            header,
            ..TwistStamped::default()
        };

        Ok(Self {
            config,
            link,
            node,
            noise,
            gps_message,
            ground_speed_message,
            channels: Channels::Uninitialized,
            updates: 0,
        })
    }

    /// Handle one sensor update.
    pub fn on_update(&mut self, sensor: &dyn GpsSensor) {
        if self.channels.ensure_ready(
            &self.node,
            &self.config.gps_topic,
            &self.config.ground_speed_topic,
        ) {
            debug!(sensor = sensor.name(), "gps channels ready");
        }

        let stamp = sensor.last_measurement_time();
        let velocity = self.link.world_linear_vel() + self.noise.sample();

        self.gps_message.header.stamp = stamp;
        self.gps_message.latitude = sensor.latitude_deg();
        self.gps_message.longitude = sensor.longitude_deg();
        self.gps_message.altitude = sensor.altitude();

        self.ground_speed_message.header.stamp = stamp;
        self.ground_speed_message.twist.linear = Vector3::new(velocity.x, velocity.y, velocity.z);

        if let Some(ChannelSet { gps, ground_speed }) = self.channels.as_ready() {
            gps.publish(&self.gps_message);
            ground_speed.publish(&self.ground_speed_message);
        }
        self.updates += 1;
    }

    pub fn config(&self) -> &GpsPluginConfig {
        &self.config
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    /// Last published fix.
    pub fn gps_message(&self) -> &NavSatFix {
        &self.gps_message
    }

    /// Last published ground-speed twist.
    pub fn ground_speed_message(&self) -> &TwistStamped {
        &self.ground_speed_message
    }

    /// Number of updates handled so far.
    pub fn updates(&self) -> u64 {
        self.updates
    }
}

/// A loaded GPS plugin: the connection of its context to one sensor.
#[derive(Debug)]
pub struct GpsPlugin {
    sensor_name: String,
    connection: ConnectionId,
}

impl GpsPlugin {
    /// Configure the plugin and attach it to `sensor`.
    ///
    /// On success the sensor is active and every update publishes.  On
    /// failure the error is logged and nothing is connected.
    pub fn load(
        sensor: &mut dyn GpsSensor,
        world: &dyn World,
        hub: &TransportHub,
        params: &PluginParams,
    ) -> Result<Self, SimError> {
        Self::try_load(sensor, world, hub, params).inspect_err(|e| {
            error!(sensor = sensor.name(), error = %e, "gps plugin failed to load");
        })
    }

    fn try_load(
        sensor: &mut dyn GpsSensor,
        world: &dyn World,
        hub: &TransportHub,
        params: &PluginParams,
    ) -> Result<Self, SimError> {
        let config = GpsPluginConfig::from_params(params)?;
        let link = world
            .link_by_name(&config.link_name)
            .ok_or_else(|| SimError::LinkNotFound(config.link_name.clone()))?;
        let node = TransportNode::new(hub.clone(), config.namespace.clone());

        info!(
            sensor = sensor.name(),
            world = world.name(),
            namespace = %config.namespace,
            link = %config.link_name,
            "loading gps plugin"
        );

        let mut context = GpsContext::new(config, link, node)?;
        let connection = sensor.connect_updated(Box::new(move |s: &dyn GpsSensor| context.on_update(s)));
        sensor.set_active(true);

        Ok(Self {
            sensor_name: sensor.name().to_string(),
            connection,
        })
    }

    pub fn sensor_name(&self) -> &str {
        &self.sensor_name
    }

    /// Detach from `sensor`.  Returns `false` when the handler was already
    /// gone.
    pub fn unload(self, sensor: &mut dyn GpsSensor) -> bool {
        let removed = sensor.disconnect_updated(self.connection);
        debug!(sensor = %self.sensor_name, removed, "gps plugin unloaded");
        removed
    }
}
