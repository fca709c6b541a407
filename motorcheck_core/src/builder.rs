//! Type-state builder for `DiagnosticsEngine`.
//!
//! `build()` only exists once a bus was provided; `try_build()` is always
//! available and reports missing or invalid pieces as `BuildError`.

use std::marker::PhantomData;
use std::sync::Arc;

use motorcheck_traits::{Clock, MonotonicClock, PortActuator, PortSensor};

use crate::admission::AdmissionController;
use crate::config::{DiagnosticsCfg, MAX_PORTS, ReferenceTable};
use crate::engine::DiagnosticsEngine;
use crate::error::{BuildError, Result};
use crate::fleet::FleetStats;
use crate::machine::PortMachine;
use crate::sampler::TelemetrySampler;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct EngineBuilder<B, S> {
    bus: Option<B>,
    cfg: Option<DiagnosticsCfg>,
    references: Option<ReferenceTable>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    ports: Option<usize>,
    _s: PhantomData<S>,
}

impl<B> Default for EngineBuilder<B, Missing> {
    fn default() -> Self {
        Self {
            bus: None,
            cfg: None,
            references: None,
            clock: None,
            ports: None,
            _s: PhantomData,
        }
    }
}

impl<B, S> EngineBuilder<B, S> {
    pub fn with_config(mut self, cfg: DiagnosticsCfg) -> Self {
        self.cfg = Some(cfg);
        self
    }

    pub fn with_references(mut self, references: ReferenceTable) -> Self {
        self.references = Some(references);
        self
    }

    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Number of ports to scan, starting at port 0. Defaults to the full bus.
    pub fn with_ports(mut self, ports: usize) -> Self {
        self.ports = Some(ports);
        self
    }
}

impl<B> EngineBuilder<B, Missing> {
    pub fn with_bus(self, bus: B) -> EngineBuilder<B, Set> {
        EngineBuilder {
            bus: Some(bus),
            cfg: self.cfg,
            references: self.references,
            clock: self.clock,
            ports: self.ports,
            _s: PhantomData,
        }
    }
}

impl<B: PortSensor + PortActuator, S> EngineBuilder<B, S> {
    /// Fallible build available in any type-state.
    pub fn try_build(self) -> Result<DiagnosticsEngine<B>> {
        let bus = self
            .bus
            .ok_or_else(|| eyre::Report::new(BuildError::MissingBus))?;
        let cfg = self.cfg.unwrap_or_default();
        cfg.validate().map_err(eyre::Report::new)?;

        let ports = self.ports.unwrap_or(MAX_PORTS);
        if ports == 0 || ports > MAX_PORTS {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "port count must be in 1..=21",
            )));
        }

        let references = self.references.unwrap_or_default();
        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let epoch = clock.now();

        Ok(DiagnosticsEngine {
            bus,
            epoch,
            sampler: TelemetrySampler::new(&cfg.sampling, &cfg.session),
            admission: AdmissionController::new(cfg.admission.capacity),
            fleet: FleetStats::new(references.len()),
            machines: vec![PortMachine::new(); ports],
            pending: Vec::new(),
            clock,
            cfg,
            references,
        })
    }
}

impl<B: PortSensor + PortActuator> EngineBuilder<B, Set> {
    pub fn build(self) -> Result<DiagnosticsEngine<B>> {
        self.try_build()
    }
}
