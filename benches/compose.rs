use std::io::Cursor;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageOutputFormat, Rgb, RgbImage};
use morph_compositor::{
    composition::blend_sequence, video::blend_frames, CompositeRequest, Config, Frame,
    FrameCompositor,
};

fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageOutputFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

fn bench_blend(c: &mut Criterion) {
    let source = Frame::new_filled(512, 512, [255, 0, 0]);
    let target = Frame::new_filled(512, 512, [0, 0, 255]);

    c.bench_function("blend.single_frame_512", |b| {
        b.iter(|| blend_frames(&source, &target, 0.5).expect("blend"));
    });

    let mut group = c.benchmark_group("blend.sequence_512");
    for frame_count in [12usize, 48] {
        group.bench_with_input(
            BenchmarkId::from_parameter(frame_count),
            &frame_count,
            |b, &n| b.iter(|| blend_sequence(&source, &target, n).expect("sequence")),
        );
    }
    group.finish();
}

fn bench_render_frames(c: &mut Criterion) {
    let compositor = FrameCompositor::new(&Config::default());
    let request = CompositeRequest::new(gradient_png(800, 600), gradient_png(640, 480))
        .with_frame_count(24)
        .with_resolution(256);

    c.bench_function("compose.render_frames_256x24", |b| {
        b.iter(|| compositor.render_frames(&request).expect("render"));
    });
}

criterion_group!(benches, bench_blend, bench_render_frames);
criterion_main!(benches);
