use criterion::{criterion_group, criterion_main, Criterion};
use lx90_mount::guide::GuideDirection;
use lx90_mount::protocol::{commands, replies};
use lx90_mount::AxisRole;
use std::hint::black_box;
use std::time::Duration;

pub fn bench_reply_parsing(c: &mut Criterion) {
    c.bench_function("parse_right_ascension_hms", |b| {
        b.iter(|| black_box(replies::parse_right_ascension(black_box("05:34:32"))))
    });
    c.bench_function("parse_right_ascension_tenths", |b| {
        b.iter(|| black_box(replies::parse_right_ascension(black_box("05:34.5"))))
    });
    c.bench_function("parse_declination_glyph", |b| {
        b.iter(|| black_box(replies::parse_angle(black_box("-12\u{DF}30'36"))))
    });
    c.bench_function("parse_utc", |b| {
        b.iter(|| {
            black_box(replies::parse_utc(
                black_box("10/16/26"),
                black_box("22:15:00"),
                black_box("-05.0"),
            ))
        })
    });
}

pub fn bench_command_building(c: &mut Criterion) {
    c.bench_function("custom_rate_command", |b| {
        b.iter(|| black_box(commands::rate_select(AxisRole::Secondary, black_box(1.5), true)))
    });
    c.bench_function("pulse_guide_command", |b| {
        b.iter(|| black_box(commands::pulse_guide(GuideDirection::East, black_box(1750))))
    });
    c.bench_function("set_target_dec_command", |b| {
        b.iter(|| black_box(commands::set_target_dec(black_box(-12.51))))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_reply_parsing, bench_command_building
}
criterion_main!(benches);
