pub mod descriptor;
pub mod registry;
pub mod snapshot;

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use crate::{
    axis::{
        value::{AxisKind, AxisValue},
        Axis,
    },
    channel::ChannelTransport,
    error::{Advisory, Outcome},
    guard::{evaluate_guards, Verdict},
};
use descriptor::StationDescriptor;
use snapshot::{AxisView, StationSnapshot};

/// A named, fixed collection of axes together with the data that governs
/// how they may be moved.
pub struct Station {
    descriptor: StationDescriptor,
    axes: Vec<Arc<Axis>>,
}

impl Station {
    pub async fn build(
        descriptor: StationDescriptor,
        transport: Arc<dyn ChannelTransport>,
        limit_query_timeout: Duration,
    ) -> Result<Self> {
        descriptor
            .validate()
            .with_context(|| format!("Invalid station {}", descriptor.name))?;

        let mut axes = Vec::with_capacity(descriptor.axes.len());
        for config in &descriptor.axes {
            let axis = Axis::connect(config.clone(), transport.clone(), limit_query_timeout).await;
            axes.push(Arc::new(axis));
        }

        info!("Station {} ready with {} axes", descriptor.name, axes.len());
        Ok(Self { descriptor, axes })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn descriptor(&self) -> &StationDescriptor {
        &self.descriptor
    }

    /// Axes in declaration order.
    pub fn axes(&self) -> &[Arc<Axis>] {
        &self.axes
    }

    pub fn axis(&self, name: &str) -> Option<&Arc<Axis>> {
        self.axes.iter().find(|a| a.name() == name)
    }

    fn require_axis(&self, name: &str) -> Result<&Arc<Axis>> {
        self.axis(name)
            .ok_or_else(|| anyhow!("Axis not found: {}/{}", self.name(), name))
    }

    pub fn snapshot(&self, connected: bool) -> StationSnapshot {
        StationSnapshot {
            station: self.name().to_string(),
            connected,
            axes: self.axes.iter().map(|a| AxisView::of(a)).collect(),
        }
    }

    /// Guarded absolute move. Guards are only consulted for numeric targets.
    pub async fn move_axis(
        &self,
        name: &str,
        target: AxisValue,
        enforce_limits: bool,
    ) -> Result<Outcome> {
        let axis = self.require_axis(name)?;

        if let Some(value) = target.as_f64() {
            let snapshot = self.snapshot(true);
            if let Verdict::Reject(advisory) =
                evaluate_guards(&snapshot, &self.descriptor.guards, name, value)
            {
                warn!("{}/{}: {}", self.name(), name, advisory);
                return Ok(Outcome::rejected(advisory));
            }
        }

        axis.move_to(target, enforce_limits).await
    }

    /// Run a named operation: the guarded primary move, then its follow-on
    /// moves if the primary move was accepted.
    pub async fn run_preset(&self, preset: &str) -> Result<Outcome> {
        let preset = self
            .descriptor
            .preset(preset)
            .ok_or_else(|| anyhow!("Preset not found: {}/{}", self.name(), preset))?;

        let outcome = self
            .move_axis(&preset.axis, AxisValue::Number(preset.target), true)
            .await?;
        if !outcome.is_applied() {
            return Ok(outcome);
        }

        for follow in &preset.also {
            let follow_outcome = self
                .move_axis(&follow.axis, AxisValue::Number(follow.target), true)
                .await?;
            if let Some(advisory) = follow_outcome.advisory() {
                warn!(
                    "Preset {} follow-on move of {} not issued: {}",
                    preset.name, follow.axis, advisory
                );
            }
        }

        info!("Ran preset {}/{}", self.name(), preset.name);
        Ok(outcome)
    }

    /// Relative move from the published readback.
    pub async fn jog(&self, name: &str, step: f64) -> Result<Outcome> {
        let axis = self.require_axis(name)?;
        let Some(current) = axis.published().and_then(|v| v.as_f64()) else {
            return Ok(Outcome::rejected(Advisory::NotNumeric {
                axis: name.to_string(),
            }));
        };

        debug!("Jogging {}/{} by {}", self.name(), name, step);
        self.move_axis(name, AxisValue::Number(current + step), true)
            .await
    }

    /// Write `1` to every stop channel, regardless of motion state.
    pub async fn stop_all(&self) -> Result<()> {
        for name in &self.descriptor.stop_channels {
            self.require_axis(name)?.trigger(1.0).await?;
        }
        warn!("Stop issued on station {}", self.name());
        Ok(())
    }

    /// Halt one motor through its `.STOP` field, regardless of motion state.
    pub async fn stop_axis(&self, name: &str) -> Result<Outcome> {
        let axis = self.require_axis(name)?;
        if !axis.is_movable() || axis.kind() != AxisKind::Position {
            return Ok(Outcome::rejected(Advisory::NoStopField {
                axis: name.to_string(),
            }));
        }
        axis.stop().await?;
        warn!("Stop issued on {}/{}", self.name(), name);
        Ok(Outcome::Applied)
    }

    pub async fn set_limits(&self, name: &str, low: f64, high: f64) -> Result<Outcome> {
        self.require_axis(name)?.set_limits(low, high).await
    }

    pub async fn zero_offset(&self, name: &str) -> Result<Outcome> {
        self.require_axis(name)?.set_as_offset().await
    }

    pub fn addresses(&self) -> Vec<String> {
        self.descriptor.addresses()
    }
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("name", &self.descriptor.name)
            .field("axes", &self.axes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        axis::{address::ChannelAddress, config::AxisConfig, value::AxisKind},
        channel::simulated::SimulatedTransport,
        guard::rule::{GuardRule, Relation, Requirement, TargetMatch},
    };
    use super::descriptor::Preset;

    const MIRROR_ADVISORY: &str = "First move to X-Ray position and move the pinhole OUT!";

    fn descriptor() -> StationDescriptor {
        let rb = |name: &str, base: &str| {
            AxisConfig::new(name, ChannelAddress::new(base).with_readback_suffix())
                .movable()
                .monitored()
        };
        StationDescriptor::new("13-BMD")
            .with_axis(rb("omega", "13BMD:m92"))
            .with_axis(rb("pinhole", "13BMD:m27").with_limits(-30.0, 20.0))
            .with_axis(
                rb("us_mirror", "13BMD:m65")
                    .with_limits(-115.0, 0.0)
                    .with_reference("in", 0.0)
                    .with_reference("out", -115.0),
            )
            .with_axis(rb("microscope", "13BMD:m68"))
            .with_axis(
                AxisConfig::new("light_switch", ChannelAddress::new("13BMD:Unidig1Bo7"))
                    .with_kind(AxisKind::Switch)
                    .movable(),
            )
            .with_axis(AxisConfig::new("station_stop", ChannelAddress::new("13BMD:allstop")).movable())
            .with_guard(
                GuardRule::new("us_mirror_in", "us_mirror")
                    .applies_to(TargetMatch::Exactly(0.0))
                    .wait_for("omega")
                    .wait_for("pinhole")
                    .require(Requirement::new("omega", Relation::Equal, -90.0, MIRROR_ADVISORY))
                    .require(Requirement::new("pinhole", Relation::AtMost, 0.0, MIRROR_ADVISORY)),
            )
            .with_preset(Preset::new("microscope_in", "microscope", 0.0).also("light_switch", 1.0))
            .with_preset(Preset::new("mirror_in", "us_mirror", 0.0))
            .with_stop_channel("station_stop")
    }

    fn transport(omega: f64, pinhole: f64) -> Arc<SimulatedTransport> {
        Arc::new(
            SimulatedTransport::new("sim")
                .with_channel("13BMD:m92.RBV", omega)
                .with_channel("13BMD:m27.RBV", pinhole)
                .with_channel("13BMD:m27.LLM", -30.0)
                .with_channel("13BMD:m27.HLM", 20.0)
                .with_channel("13BMD:m65.RBV", -115.0)
                .with_channel("13BMD:m65.LLM", -115.0)
                .with_channel("13BMD:m65.HLM", 0.0)
                .with_channel("13BMD:m68.RBV", -50.0),
        )
    }

    /// Build and publish the initial readbacks, as the first tick would.
    async fn settled(transport: &Arc<SimulatedTransport>) -> Station {
        let station = Station::build(descriptor(), transport.clone(), Duration::from_millis(200))
            .await
            .unwrap();
        for axis in station.axes() {
            axis.cell().drain();
        }
        station
    }

    #[tokio::test]
    async fn test_mirror_in_issued_when_prerequisites_hold() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;

        let outcome = station.run_preset("mirror_in").await.unwrap();

        assert!(outcome.is_applied());
        assert_eq!(transport.writes_to("13BMD:m65"), vec![AxisValue::Number(0.0)]);
    }

    #[tokio::test]
    async fn test_mirror_in_rejected_off_x_ray_angle() {
        let transport = transport(-45.0, -25.0);
        let station = settled(&transport).await;

        let outcome = station
            .move_axis("us_mirror", AxisValue::Number(0.0), true)
            .await
            .unwrap();

        assert_eq!(outcome.advisory().map(|a| a.to_string()).as_deref(), Some(MIRROR_ADVISORY));
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_mirror_in_waits_for_undrained_prerequisite() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;
        transport.inject("13BMD:m92.RBV", -89.0);
        // No bridge installed: mark omega dirty the way a callback would.
        station.axis("omega").unwrap().cell().notify(AxisValue::Number(-89.0));

        let outcome = station
            .move_axis("us_mirror", AxisValue::Number(0.0), true)
            .await
            .unwrap();

        assert!(matches!(
            outcome.advisory(),
            Some(Advisory::PrerequisiteMoving { axis, .. }) if axis == "omega"
        ));
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_preset_issues_follow_on_moves() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;

        assert!(station.run_preset("microscope_in").await.unwrap().is_applied());

        let channels: Vec<String> = transport.writes().into_iter().map(|(c, _)| c).collect();
        assert_eq!(channels, vec!["13BMD:m68", "13BMD:Unidig1Bo7"]);
    }

    #[tokio::test]
    async fn test_unknown_preset_and_axis_are_errors() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;

        assert!(station.run_preset("nope").await.is_err());
        assert!(station.jog("zoom", 0.1).await.is_err());
    }

    #[tokio::test]
    async fn test_jog_moves_relative_to_published_readback() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;

        assert!(station.jog("pinhole", 0.1).await.unwrap().is_applied());
        let written = transport.writes_to("13BMD:m27")[0].as_f64().unwrap();
        assert!((written - -24.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_jog_respects_limits() {
        let transport = transport(-90.0, 19.95);
        let station = settled(&transport).await;

        let outcome = station.jog("pinhole", 0.1).await.unwrap();
        assert!(matches!(outcome.advisory(), Some(Advisory::LimitViolation { .. })));
        assert!(transport.writes().is_empty());
    }

    #[tokio::test]
    async fn test_stop_all_is_idempotent() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;

        station.stop_all().await.unwrap();
        station.stop_all().await.unwrap();

        assert_eq!(
            transport.writes_to("13BMD:allstop"),
            vec![AxisValue::Number(1.0), AxisValue::Number(1.0)]
        );
        assert!(station.axes().iter().all(|a| !a.is_moving()));
    }

    #[tokio::test]
    async fn test_stop_axis_halts_moving_motor() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;
        station.axis("pinhole").unwrap().cell().notify(AxisValue::Number(-10.0));

        assert!(station.stop_axis("pinhole").await.unwrap().is_applied());
        assert_eq!(transport.writes_to("13BMD:m27.STOP"), vec![AxisValue::Number(1.0)]);

        let switch = station.stop_axis("light_switch").await.unwrap();
        assert!(matches!(switch.advisory(), Some(Advisory::NoStopField { .. })));
        assert!(transport.writes_to("13BMD:Unidig1Bo7.STOP").is_empty());
        assert!(station.stop_axis("zoom").await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_reports_published_state() {
        let transport = transport(-90.0, -25.0);
        let station = settled(&transport).await;
        station.axis("pinhole").unwrap().cell().notify(AxisValue::Number(-24.0));

        let snapshot = station.snapshot(true);
        let pinhole = snapshot.get("pinhole").unwrap();

        assert_eq!(pinhole.readback, Some(AxisValue::Number(-25.0)));
        assert!(pinhole.moving);
        assert_eq!(snapshot.axes.len(), 6);
    }
}
