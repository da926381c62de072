//! Frame driver
//!
//! One frame is, strictly in this order: dispatch the integration step,
//! wait on the barrier, advance the rotation animation, draw, present. The
//! next dispatch is never issued before the previous barrier has returned,
//! and a stop request is only honoured between frames.

use attractor_physics::{
    AttractorField, FrameTransforms, IntegrationParams, ModelParams, SceneParams,
};
use glam::Vec3;

use crate::backend::Integrator;
use crate::error::SimulationError;
use crate::frame::{ParticleView, Synced};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Running,
    Stopped,
}

/// Per-frame Euler angle increments in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationAnimation {
    pub degrees_per_frame: Vec3,
}

impl Default for RotationAnimation {
    fn default() -> Self {
        // X winds down, Z winds up
        Self {
            degrees_per_frame: Vec3::new(-1.0, 0.0, 1.0),
        }
    }
}

impl RotationAnimation {
    pub fn still() -> Self {
        Self {
            degrees_per_frame: Vec3::ZERO,
        }
    }

    pub fn advance(&self, model: &mut ModelParams) {
        model.rotation_degrees += self.degrees_per_frame;
    }
}

/// Everything a sink needs to draw one frame
pub struct FrameInput<'a> {
    pub particles: ParticleView<'a>,
    pub synced: Synced,
    pub field: &'a AttractorField,
    pub transforms: FrameTransforms,
}

/// The render half of a frame: consume synced state, then show it
pub trait FrameSink {
    type Error: From<SimulationError>;

    fn draw(&mut self, frame: &FrameInput<'_>) -> Result<(), Self::Error>;

    fn present(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was drawn from state at this write generation
    Presented { generation: u64 },
    Stopped,
}

pub struct FrameDriver<I> {
    integrator: I,
    field: AttractorField,
    params: IntegrationParams,
    scene: SceneParams,
    animation: RotationAnimation,
    state: DriverState,
    frames: u64,
}

impl<I: Integrator> FrameDriver<I> {
    pub fn new(
        integrator: I,
        field: AttractorField,
        params: IntegrationParams,
        scene: SceneParams,
    ) -> Self {
        log::info!(
            "Frame driver ready: {} particles, {} attractors",
            integrator.particle_count(),
            field.len()
        );
        Self {
            integrator,
            field,
            params,
            scene,
            animation: RotationAnimation::default(),
            state: DriverState::Running,
            frames: 0,
        }
    }

    pub fn with_animation(mut self, animation: RotationAnimation) -> Self {
        self.animation = animation;
        self
    }

    /// Run one full frame against `sink`.
    ///
    /// Once stopped this does nothing and returns [`FrameOutcome::Stopped`].
    /// Errors abort the frame; nothing is retried.
    pub fn run_frame<S: FrameSink>(&mut self, sink: &mut S) -> Result<FrameOutcome, S::Error> {
        if self.state == DriverState::Stopped {
            return Ok(FrameOutcome::Stopped);
        }

        let ticket = self.integrator.dispatch(&self.field, &self.params)?;
        let synced = self.integrator.barrier(ticket)?;

        self.animation.advance(&mut self.scene.model);
        let transforms = self.scene.transforms();

        let frame = FrameInput {
            particles: self.integrator.view(&synced)?,
            synced,
            field: &self.field,
            transforms,
        };
        sink.draw(&frame)?;
        sink.present()?;

        self.frames += 1;
        log::trace!("frame {} presented at generation {}", self.frames, synced.generation());
        Ok(FrameOutcome::Presented {
            generation: synced.generation(),
        })
    }

    /// Loop frames until `stop_requested` returns true. The signal is polled
    /// before every frame. Returns the total number of presented frames.
    pub fn run<S, F>(&mut self, sink: &mut S, mut stop_requested: F) -> Result<u64, S::Error>
    where
        S: FrameSink,
        F: FnMut() -> bool,
    {
        loop {
            if stop_requested() {
                self.stop();
            }
            if self.run_frame(sink)? == FrameOutcome::Stopped {
                return Ok(self.frames);
            }
        }
    }

    pub fn stop(&mut self) {
        if self.state == DriverState::Running {
            log::info!("Frame driver stopped after {} frames", self.frames);
        }
        self.state = DriverState::Stopped;
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    pub fn field(&self) -> &AttractorField {
        &self.field
    }

    pub fn params(&self) -> &IntegrationParams {
        &self.params
    }

    pub fn scene(&self) -> &SceneParams {
        &self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::StepTicket;
    use attractor_physics::{model_matrix, ParticleStore};
    use glam::Mat4;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Dispatch(u64),
        Barrier(u64),
        Draw(u64),
        Present,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct RecordingIntegrator {
        store: ParticleStore,
        in_flight: Option<u64>,
        log: Log,
    }

    impl RecordingIntegrator {
        fn new(log: &Log) -> Self {
            Self {
                store: ParticleStore::grid(2).unwrap(),
                in_flight: None,
                log: log.clone(),
            }
        }
    }

    impl Integrator for RecordingIntegrator {
        fn particle_count(&self) -> u32 {
            self.store.len() as u32
        }

        fn dispatch(
            &mut self,
            _field: &AttractorField,
            _params: &IntegrationParams,
        ) -> Result<StepTicket, SimulationError> {
            if self.in_flight.is_some() {
                return Err(SimulationError::StepInFlight);
            }
            let generation = self.store.generation() + 1;
            self.in_flight = Some(generation);
            self.log.borrow_mut().push(Event::Dispatch(generation));
            Ok(StepTicket::new(generation))
        }

        fn barrier(&mut self, ticket: StepTicket) -> Result<Synced, SimulationError> {
            let generation = self.in_flight.take().ok_or(SimulationError::NoStepInFlight)?;
            assert_eq!(ticket.generation(), generation);
            self.store.rewrite_with(|_, _| {});
            self.log.borrow_mut().push(Event::Barrier(generation));
            Ok(Synced::new(generation))
        }

        fn view(&self, synced: &Synced) -> Result<ParticleView<'_>, SimulationError> {
            if self.in_flight.is_some() {
                return Err(SimulationError::StepInFlight);
            }
            if synced.generation() != self.store.generation() {
                return Err(SimulationError::StaleFrame {
                    expected: self.store.generation(),
                    found: synced.generation(),
                });
            }
            Ok(ParticleView::Host(&self.store))
        }
    }

    struct RecordingSink {
        log: Log,
        models: Vec<Mat4>,
    }

    impl FrameSink for RecordingSink {
        type Error = SimulationError;

        fn draw(&mut self, frame: &FrameInput<'_>) -> Result<(), SimulationError> {
            self.log.borrow_mut().push(Event::Draw(frame.synced.generation()));
            self.models.push(frame.transforms.model);
            Ok(())
        }

        fn present(&mut self) -> Result<(), SimulationError> {
            self.log.borrow_mut().push(Event::Present);
            Ok(())
        }
    }

    fn driver(log: &Log) -> FrameDriver<RecordingIntegrator> {
        FrameDriver::new(
            RecordingIntegrator::new(log),
            AttractorField::reference(),
            IntegrationParams::default(),
            SceneParams::default(),
        )
    }

    #[test]
    fn frame_steps_run_in_order() {
        let log = Log::default();
        let mut driver = driver(&log);
        let mut sink = RecordingSink {
            log: log.clone(),
            models: Vec::new(),
        };

        for _ in 0..2 {
            driver.run_frame(&mut sink).unwrap();
        }

        assert_eq!(
            *log.borrow(),
            vec![
                Event::Dispatch(1),
                Event::Barrier(1),
                Event::Draw(1),
                Event::Present,
                Event::Dispatch(2),
                Event::Barrier(2),
                Event::Draw(2),
                Event::Present,
            ]
        );
    }

    #[test]
    fn rotation_advances_before_draw() {
        let log = Log::default();
        let mut driver = driver(&log);
        let mut sink = RecordingSink {
            log: log.clone(),
            models: Vec::new(),
        };

        driver.run_frame(&mut sink).unwrap();
        driver.run_frame(&mut sink).unwrap();

        let expected = |frames: f32| {
            model_matrix(&ModelParams {
                rotation_degrees: Vec3::new(-frames, 0.0, frames),
                ..ModelParams::default()
            })
        };
        assert!(sink.models[0].abs_diff_eq(expected(1.0), 1e-6));
        assert!(sink.models[1].abs_diff_eq(expected(2.0), 1e-6));
        assert_eq!(driver.scene().model.rotation_degrees, Vec3::new(-2.0, 0.0, 2.0));
    }

    #[test]
    fn stopped_driver_dispatches_nothing() {
        let log = Log::default();
        let mut driver = driver(&log);
        let mut sink = RecordingSink {
            log: log.clone(),
            models: Vec::new(),
        };

        let mut polls = 0;
        let frames = driver
            .run(&mut sink, || {
                polls += 1;
                polls > 3
            })
            .unwrap();

        assert_eq!(frames, 3);
        assert_eq!(driver.state(), DriverState::Stopped);
        assert_eq!(driver.run_frame(&mut sink).unwrap(), FrameOutcome::Stopped);
        let dispatches = log
            .borrow()
            .iter()
            .filter(|e| matches!(e, Event::Dispatch(_)))
            .count();
        assert_eq!(dispatches, 3);
    }
}
