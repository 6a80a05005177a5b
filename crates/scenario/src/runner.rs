//! ScenarioRunner - drives a `MonitorHub` through a scripted episode

use std::sync::{Arc, Mutex};

use contracts::{
    FinishedEventCallback, InMemoryRegistry, LoggerBlueprint, SignalListener,
};
use monitors::{
    AssemblerStats, AssistAction, EventAssembler, HubStats, MonitorHub, MonitorId,
    RecordingGraspAssist,
};
use tracing::{debug, info, instrument, warn};

use crate::error::ScenarioError;
use crate::script::{ScenarioScript, ScenarioStep, StepAction};
use crate::world::SimWorld;

/// Outcome of one replayed episode
#[derive(Debug, Clone)]
pub struct RunReport {
    pub episode_id: String,
    /// Simulation time the episode was closed at
    pub end_time: f64,
    pub steps: usize,
    /// Monitors that failed init, with the reason
    pub init_failures: Vec<(String, String)>,
    pub hub: HubStats,
    pub assembler: AssemblerStats,
    /// Grasp-assist actions per manipulator, in order
    pub assist_actions: Vec<(String, AssistAction)>,
}

/// Scripted replay of one episode
pub struct ScenarioRunner {
    episode_id: String,
    hub: MonitorHub,
    world: SimWorld,
    assembler: Arc<Mutex<EventAssembler>>,
    assists: Vec<(String, RecordingGraspAssist)>,
    script: ScenarioScript,
    tick_interval: f64,
    end_time: f64,
}

impl ScenarioRunner {
    /// Build the registry, hub and world; finished events go to `callback`
    #[instrument(name = "scenario_runner_new", skip_all, fields(episode = %blueprint.episode.id))]
    pub fn new(
        blueprint: &LoggerBlueprint,
        script: ScenarioScript,
        callback: FinishedEventCallback,
    ) -> Result<Self, ScenarioError> {
        script.validate()?;

        let registry = Arc::new(InMemoryRegistry::from_configs(&blueprint.entities)?);
        let mut hub = MonitorHub::from_blueprint(blueprint, registry);

        let assembler = Arc::new(Mutex::new(EventAssembler::new(callback)));
        hub.add_listener(Box::new(Arc::clone(&assembler)));

        let mut assists = Vec::new();
        for config in &blueprint.manipulators {
            if config.grasp_assist.is_none() {
                continue;
            }
            let Some(id) = hub.monitor_id(&config.name) else {
                continue;
            };
            let assist = RecordingGraspAssist::new();
            hub.set_grasp_assist(id, Box::new(assist.clone()))?;
            assists.push((config.name.clone(), assist));
        }

        for (index, step) in script.steps.iter().enumerate() {
            if let Some(name) = step_monitor(step) {
                if hub.monitor_id(name).is_none() {
                    return Err(ScenarioError::UnknownMonitor {
                        index,
                        name: name.to_string(),
                    });
                }
            }
        }

        let tick_interval = script.tick_interval.unwrap_or(blueprint.episode.tick_interval);
        let end_time = script
            .end_time
            .or(blueprint.episode.end_time)
            .unwrap_or_else(|| script.last_step_time())
            .max(script.last_step_time());

        Ok(Self {
            episode_id: blueprint.episode.id.clone(),
            hub,
            world: SimWorld::with_bones(&script.bones),
            assembler,
            assists,
            script,
            tick_interval,
            end_time,
        })
    }

    /// Extra listener (taps, tests); sees every signal after the assembler
    pub fn add_listener(&mut self, listener: Box<dyn SignalListener + Send>) {
        self.hub.add_listener(listener);
    }

    pub fn hub(&self) -> &MonitorHub {
        &self.hub
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Replay every step, then close the episode
    #[instrument(
        name = "scenario_run",
        skip(self),
        fields(episode = %self.episode_id, steps = self.script.steps.len())
    )]
    pub fn run(mut self) -> Result<RunReport, ScenarioError> {
        let init_failures: Vec<(String, String)> = self
            .hub
            .init_all(&self.world)
            .into_iter()
            .map(|(name, err)| (name, err.to_string()))
            .collect();
        self.hub.start_all(&self.world);

        let steps = std::mem::take(&mut self.script.steps);
        for (index, step) in steps.iter().enumerate() {
            self.advance(step.time);
            self.apply(index, step)?;
        }

        self.advance(self.end_time);
        self.hub.finish_all(&self.world, false);

        let assembler = match self.assembler.lock() {
            Ok(guard) => guard.stats(),
            Err(poisoned) => poisoned.into_inner().stats(),
        };
        let assist_actions = self
            .assists
            .iter()
            .flat_map(|(name, assist)| {
                assist
                    .actions()
                    .into_iter()
                    .map(move |action| (name.clone(), action))
            })
            .collect();

        let report = RunReport {
            episode_id: self.episode_id,
            end_time: self.hub.now(),
            steps: steps.len(),
            init_failures,
            hub: self.hub.stats(),
            assembler,
            assist_actions,
        };
        info!(
            end_time = report.end_time,
            events = report.assembler.finished,
            "Scenario finished"
        );
        Ok(report)
    }

    /// Advance tick by tick up to `target`
    fn advance(&mut self, target: f64) {
        let mut t = self.hub.now();
        while t + self.tick_interval < target {
            t += self.tick_interval;
            self.hub.advance_to(&self.world, t);
        }
        self.hub.advance_to(&self.world, target);
    }

    fn apply(&mut self, index: usize, step: &ScenarioStep) -> Result<(), ScenarioError> {
        debug!(index, time = step.time, action = step.action.label(), "Step");
        match &step.action {
            StepAction::OverlapBegin(spec) => {
                if self.world.begin_overlap(spec) {
                    self.hub.overlap_begin(&self.world, &spec.notification(step.time));
                } else {
                    warn!(index, volume = %spec.volume, "Duplicate overlap begin skipped");
                }
            }
            StepAction::OverlapEnd(spec) => {
                if self.world.end_overlap(spec) {
                    self.hub.overlap_end(&self.world, &spec.notification(step.time));
                } else {
                    warn!(index, volume = %spec.volume, "Overlap end without begin skipped");
                }
            }
            StepAction::SetLocation { actor, location } => {
                self.world.set_location(*actor, *location);
            }
            StepAction::SetVelocity { actor, velocity } => {
                self.world.set_velocity(*actor, *velocity);
            }
            StepAction::SetGraspType {
                monitor,
                grasp_type,
            } => {
                let id = self.monitor(index, monitor)?;
                self.hub.set_grasp_type(id, grasp_type)?;
            }
            StepAction::SetGraspInput { monitor, value } => {
                let id = self.monitor(index, monitor)?;
                self.hub.set_grasp_input(&self.world, id, *value)?;
            }
            StepAction::TriggerGraspAssist { monitor, target } => {
                let id = self.monitor(index, monitor)?;
                self.hub.trigger_grasp_assist(&self.world, id, *target)?;
            }
        }
        Ok(())
    }

    fn monitor(&self, index: usize, name: &str) -> Result<MonitorId, ScenarioError> {
        self.hub
            .monitor_id(name)
            .ok_or_else(|| ScenarioError::UnknownMonitor {
                index,
                name: name.to_string(),
            })
    }
}

fn step_monitor(step: &ScenarioStep) -> Option<&str> {
    match &step.action {
        StepAction::SetGraspType { monitor, .. }
        | StepAction::SetGraspInput { monitor, .. }
        | StepAction::TriggerGraspAssist { monitor, .. } => Some(monitor),
        _ => None,
    }
}
