use criterion::{Criterion, black_box, criterion_group, criterion_main};
use governor_core::{CommandMapper, PidController, PidGains, frame, rpm};

pub fn bench_cycle_math(c: &mut Criterion) {
    let mut g = c.benchmark_group("cycle");
    // Allow quick tweaking without CLI flags (Criterion 0.5):
    //   BENCH_SAMPLE_SIZE=20 cargo bench -p governor_core --bench cycle
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(10));
    }

    let line = br#"{"pressure_bar": 2.31, "ir_pulse_count": 11, "flow_rate": 3.4}"#;

    g.bench_function("decode_frame", |b| {
        b.iter(|| frame::decode(black_box(line)));
    });

    let mapper = CommandMapper::new(210.0, 200, 512).expect("valid mapper");
    g.bench_function("line_to_goal", |b| {
        let mut pid = PidController::new(PidGains::default(), None);
        b.iter(|| {
            let frame = frame::decode(black_box(line)).expect("frame decodes");
            let measured = rpm::estimate_rpm(frame.ir_pulse_count, 3, 1.0);
            let output = pid.compute(210.0, measured);
            black_box(mapper.map_to_position(output))
        });
    });
    g.finish();
}

criterion_group!(cycle, bench_cycle_math);
criterion_main!(cycle);
