/// Scalar vs compute backend on the same scenes.
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sunraster::{
    create_test_cube, BackendKind, Color, EngineConfig, FrameContext, Mat4, Material, Renderer, Texture, Vec3,
};

fn cube_grid(renderer: &mut Renderer, config: &EngineConfig, material: &Material, angle: f32) {
    let (vertices, indices) = create_test_cube(0xFFC08040);
    let view = Mat4::translation(Vec3::new(0.0, 0.0, 14.0));
    for gy in -2..=2 {
        for gx in -3..=3 {
            let world = Mat4::from_srt(
                Vec3::new(0.6, 0.6, 0.6),
                Vec3::new(angle, angle * 1.3, 0.0),
                Vec3::new(gx as f32 * 2.0, gy as f32 * 2.0, 0.0),
            );
            let ctx: FrameContext = config.frame_context(view).with_world(world);
            renderer
                .draw_mesh(&ctx, &vertices, &indices, material)
                .unwrap();
        }
    }
}

fn config(backend: BackendKind) -> EngineConfig {
    EngineConfig {
        width: 640,
        height: 480,
        backend,
        ..EngineConfig::default()
    }
}

fn bench_cube_grid(c: &mut Criterion) {
    let mut group = c.benchmark_group("cube_grid_640x480");
    let texture = Texture::checkerboard(64, 64, Color::WHITE, Color::new(60, 60, 90)).into_handle();
    let materials = [
        ("solid", Material::solid(0xFFC08040)),
        ("textured", Material::textured(texture)),
    ];

    for backend in [BackendKind::Scalar, BackendKind::Compute] {
        for (label, material) in &materials {
            let cfg = config(backend);
            let mut renderer = Renderer::new(cfg.clone()).unwrap();
            let id = BenchmarkId::new(format!("{:?}", backend), label);
            group.bench_with_input(id, material, |b, material| {
                let mut angle = 0.0;
                b.iter(|| {
                    angle += 1.0;
                    renderer.begin_frame().unwrap();
                    cube_grid(&mut renderer, &cfg, material, black_box(angle));
                    black_box(renderer.end_frame().unwrap());
                });
            });
        }
    }
    group.finish();
}

fn bench_clear(c: &mut Criterion) {
    let mut renderer = Renderer::new(config(BackendKind::Scalar)).unwrap();
    c.bench_function("begin_end_empty_frame", |b| {
        b.iter(|| {
            renderer.begin_frame().unwrap();
            black_box(renderer.end_frame().unwrap());
        });
    });
}

criterion_group!(benches, bench_cube_grid, bench_clear);
criterion_main!(benches);
