use attractor_physics::{
    AttractorField, EscapePolicy, IntegrationParams, ParticleStore, SceneParams, RECYCLE_POSITION,
};
use attractor_simulation::{
    CpuSimulation, DriverState, FrameDriver, FrameInput, FrameSink, ParticleView,
    SimulationError,
};
use glam::{DVec3, Vec3, Vec4};

fn step_once(
    sim: &mut CpuSimulation,
    field: &AttractorField,
    params: &IntegrationParams,
) -> ParticleStore {
    let ticket = sim.dispatch(field, params).unwrap();
    let synced = sim.barrier(ticket).unwrap();
    match sim.view(&synced).unwrap() {
        ParticleView::Host(store) => store.clone(),
        ParticleView::Device { .. } => unreachable!("cpu backend keeps state on the host"),
    }
}

fn corners() -> (Vec<Vec4>, Vec<Vec4>) {
    let mut positions = Vec::new();
    let mut velocities = Vec::new();
    for i in 0..2 {
        for j in 0..2 {
            for k in 0..2 {
                positions.push(Vec4::new(i as f32, j as f32, k as f32, 1.0));
                velocities.push(Vec4::new(
                    0.25 * i as f32 - 0.1,
                    0.5 - 0.3 * j as f32,
                    0.2 * k as f32,
                    0.0,
                ));
            }
        }
    }
    (positions, velocities)
}

#[test]
fn one_step_matches_closed_form_for_eight_particles() {
    let field = AttractorField::reference();
    let params = IntegrationParams {
        delta_t: 0.0005,
        inverse_mass: 10.0,
        ..IntegrationParams::default()
    };
    let (positions, velocities) = corners();
    let store = ParticleStore::new(positions.clone(), velocities.clone()).unwrap();
    let mut sim = CpuSimulation::new(store);

    let next = step_once(&mut sim, &field, &params);

    let dt = params.delta_t as f64;
    let attractors = [DVec3::new(5.0, 0.0, 0.0), DVec3::new(-5.0, 0.0, 0.0)];
    for i in 0..8 {
        let p = positions[i].truncate().as_dvec3();
        let v = velocities[i].truncate().as_dvec3();
        let force: DVec3 = attractors
            .iter()
            .map(|a| (1000.0 / a.distance(p)) * (*a - p).normalize())
            .sum();
        let acc = force * 10.0;
        let expected_p = p + v * dt + 0.5 * acc * dt * dt;
        let expected_v = v + acc * dt;

        let got_p = next.positions()[i];
        let got_v = next.velocities()[i];
        assert!(
            (got_p.truncate().as_dvec3() - expected_p).abs().max_element() < 1e-6,
            "particle {i}: position {got_p:?} vs {expected_p:?}"
        );
        assert!(
            (got_v.truncate().as_dvec3() - expected_v).abs().max_element() < 1e-6,
            "particle {i}: velocity {got_v:?} vs {expected_v:?}"
        );
        assert_eq!(got_p.w, 1.0);
        assert_eq!(got_v.w, 0.0);
    }
}

#[test]
fn zero_force_step_is_pure_drift() {
    let params = IntegrationParams::default();
    let (positions, velocities) = corners();
    let store = ParticleStore::new(positions.clone(), velocities.clone()).unwrap();
    let mut sim = CpuSimulation::new(store);

    let next = step_once(&mut sim, &AttractorField::empty(), &params);

    for i in 0..positions.len() {
        let expected = positions[i].truncate() + velocities[i].truncate() * params.delta_t;
        assert!((next.positions()[i].truncate() - expected).abs().max_element() < 1e-7);
        assert_eq!(next.velocities()[i], velocities[i]);
    }
}

#[test]
fn particles_beyond_last_attractor_limit_are_recycled() {
    let positions = vec![
        Vec4::new(60.0, 0.0, 0.0, 1.0),
        Vec4::new(0.0, 0.0, -80.0, 1.0),
        Vec4::new(1.0, 0.0, 0.0, 1.0),
    ];
    let velocities = vec![
        Vec4::new(-4.0, 2.0, 0.0, 0.0),
        Vec4::ZERO,
        Vec4::ZERO,
    ];
    let mut sim = CpuSimulation::new(ParticleStore::new(positions, velocities.clone()).unwrap());

    let next = step_once(&mut sim, &AttractorField::reference(), &IntegrationParams::default());

    assert_eq!(next.positions()[0], RECYCLE_POSITION);
    assert_eq!(next.velocities()[0], velocities[0]);
    assert_eq!(next.positions()[1], RECYCLE_POSITION);
    assert_eq!(next.velocities()[1], Vec4::ZERO);
    assert_ne!(next.positions()[2], RECYCLE_POSITION);
}

#[test]
fn all_attractors_policy_keeps_particles_near_any_attractor() {
    // 48 from (-5, 0, 0) but 38 from (5, 0, 0)
    let store = ParticleStore::new(vec![Vec4::new(43.0, 0.0, 0.0, 1.0)], vec![Vec4::ZERO]).unwrap();
    let params = IntegrationParams {
        escape: EscapePolicy::AllAttractors,
        ..IntegrationParams::default()
    };

    let mut last = CpuSimulation::new(store.clone());
    let recycled = step_once(
        &mut last,
        &AttractorField::reference(),
        &IntegrationParams::default(),
    );
    assert_eq!(recycled.positions()[0], RECYCLE_POSITION);

    let mut all = CpuSimulation::new(store);
    let kept = step_once(&mut all, &AttractorField::reference(), &params);
    assert!(kept.positions()[0].x < 43.0);
    assert!(kept.velocities()[0].x < 0.0);
}

/// Sink that checks the state it is handed was written by exactly the step
/// the barrier joined.
#[derive(Default)]
struct GenerationCheckingSink {
    drawn: Vec<u64>,
    presented: usize,
}

impl FrameSink for GenerationCheckingSink {
    type Error = SimulationError;

    fn draw(&mut self, frame: &FrameInput<'_>) -> Result<(), SimulationError> {
        let ParticleView::Host(store) = frame.particles else {
            panic!("expected host-resident particles");
        };
        assert_eq!(store.generation(), frame.synced.generation());
        assert_eq!(self.drawn.len(), self.presented, "draw without present");
        self.drawn.push(store.generation());
        Ok(())
    }

    fn present(&mut self) -> Result<(), SimulationError> {
        self.presented += 1;
        Ok(())
    }
}

#[test]
fn reader_generation_matches_writer_generation_every_frame() {
    let sim = CpuSimulation::new(ParticleStore::grid(10).unwrap());
    let mut driver = FrameDriver::new(
        sim,
        AttractorField::reference(),
        IntegrationParams::default(),
        SceneParams::default(),
    );
    let mut sink = GenerationCheckingSink::default();

    let mut remaining = 25;
    let frames = driver
        .run(&mut sink, || {
            if remaining == 0 {
                return true;
            }
            remaining -= 1;
            false
        })
        .unwrap();

    assert_eq!(frames, 25);
    assert_eq!(sink.drawn, (1..=25).collect::<Vec<u64>>());
    assert_eq!(sink.presented, 25);
    assert_eq!(driver.state(), DriverState::Stopped);
    assert_eq!(driver.integrator().generation(), Some(25));
    assert_eq!(driver.integrator().particle_count(), 1000);
}

#[test]
fn driver_output_matches_direct_steps() {
    let field = AttractorField::reference();
    let params = IntegrationParams::default();

    let mut direct = CpuSimulation::new(ParticleStore::grid(5).unwrap());
    let expected = (0..3)
        .map(|_| step_once(&mut direct, &field, &params))
        .last()
        .unwrap();

    let mut driver = FrameDriver::new(
        CpuSimulation::new(ParticleStore::grid(5).unwrap()),
        field,
        params,
        SceneParams::default(),
    );
    let mut sink = GenerationCheckingSink::default();
    for _ in 0..3 {
        driver.run_frame(&mut sink).unwrap();
    }

    let synced = driver.integrator().synced().unwrap();
    let ParticleView::Host(store) = driver.integrator().view(&synced).unwrap() else {
        panic!("expected host-resident particles");
    };
    assert_eq!(store.positions(), expected.positions());
    assert_eq!(store.velocities(), expected.velocities());
    assert_eq!(driver.scene().model.rotation_degrees, Vec3::new(-3.0, 0.0, 3.0));
}
