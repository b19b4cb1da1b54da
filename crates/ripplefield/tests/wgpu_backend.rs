//! wgpu backend integration tests.
//!
//! These tests require a GPU adapter.
//! Run with: cargo test -p ripplefield --features wgpu -- --ignored

#![cfg(feature = "wgpu")]

use glam::Vec3;
use ripplefield::prelude::*;

async fn gpu_backend(resolution: Resolution) -> Option<WgpuBackend> {
    match WgpuBackend::new(resolution).await {
        Ok(backend) => Some(backend),
        Err(e) => {
            eprintln!("Skipping test: {e}");
            None
        }
    }
}

fn config() -> RippleConfig {
    let mut config = RippleConfig::default();
    config.domain.lx = 6.4;
    config.domain.ly = 6.4;
    config.pulse.position = Some([32, 32]);
    config
}

#[tokio::test]
#[ignore] // Requires GPU
async fn test_wgpu_backend_creation() {
    let resolution = Resolution::new(64, 64).unwrap();
    let Some(backend) = gpu_backend(resolution).await else {
        return;
    };
    assert_eq!(backend.kind(), BackendKind::Wgpu);
    assert_eq!(backend.resolution(), resolution);
    assert!(!backend.adapter_name().is_empty());
}

#[tokio::test]
#[ignore] // Requires GPU
async fn test_wgpu_single_pulse() {
    let config = config();
    let Some(backend) = gpu_backend(config.resolution().unwrap()).await else {
        return;
    };
    let mut sim = FrameOrchestrator::with_backend(&config, Box::new(backend)).unwrap();
    sim.tick(&FrameInput::new(1.0 / 60.0)).unwrap();

    let field = sim.published().unwrap();
    assert!((field.get(32, 32) - 0.05).abs() < 1e-6);
    assert_eq!(field.energy(), field.get(32, 32) * field.get(32, 32));
}

#[tokio::test]
#[ignore] // Requires GPU
async fn test_wgpu_matches_cpu() {
    let config = config();
    let resolution = config.resolution().unwrap();
    let Some(backend) = gpu_backend(resolution).await else {
        return;
    };

    let mut gpu = FrameOrchestrator::with_backend(&config, Box::new(backend)).unwrap();
    let mut cpu = FrameOrchestrator::with_backend(
        &config,
        Box::new(CpuBackend::new(resolution, Execution::Sequential)),
    )
    .unwrap();

    let ids: Vec<ObjectId> = [&mut gpu, &mut cpu]
        .into_iter()
        .map(|sim| sim.tracker_mut().registry_mut().register(Vec3::ZERO))
        .collect();

    for frame in 1..=90 {
        let angle = frame as f32 * 0.04;
        let position = Vec3::new(1.2 * angle.cos(), 0.0, 1.2 * angle.sin());
        for (sim, id) in [&mut gpu, &mut cpu].into_iter().zip(&ids) {
            sim.tracker_mut().registry_mut().set_position(*id, position);
        }

        let input = FrameInput::new(1.0 / 60.0);
        let a = gpu.tick(&input).unwrap();
        let b = cpu.tick(&input).unwrap();
        assert_eq!(a.scroll, b.scroll);
    }

    let gpu_field = gpu.published().unwrap();
    let cpu_field = cpu.published().unwrap();
    let worst = gpu_field
        .as_slice()
        .iter()
        .zip(cpu_field.as_slice())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0_f32, f32::max);
    assert!(worst < 1e-4, "GPU and CPU differ by {worst}");
}

#[tokio::test]
#[ignore] // Requires GPU
async fn test_wgpu_reset_clears_field() {
    let config = config();
    let Some(backend) = gpu_backend(config.resolution().unwrap()).await else {
        return;
    };
    let mut sim = FrameOrchestrator::with_backend(&config, Box::new(backend)).unwrap();
    for _ in 0..10 {
        sim.tick(&FrameInput::new(1.0 / 60.0)).unwrap();
    }
    sim.reset().unwrap();

    let report = sim.tick(&FrameInput::new(1.0 / 60.0)).unwrap();
    assert_eq!(report.frame, 1);
    assert!((report.max_amplitude - 0.05).abs() < 1e-6);
}
