use std::hint::black_box;

use cadence_engine::{reconcile, resolve, BacklogEntry, Frequency, ScheduleSpec, TimeOfDay};
use chrono::TimeZone;
use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

fn spec(frequency: Frequency, day_of_week: Option<u8>, day_of_month: Option<u8>) -> ScheduleSpec {
    ScheduleSpec {
        frequency,
        time_of_day: TimeOfDay::parse("09:00"),
        day_of_week,
        day_of_month,
        timezone: "America/New_York".parse().unwrap(),
    }
}

fn bench_resolve(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();
    let daily = spec(Frequency::Daily, None, None);
    let monthly = spec(Frequency::Monthly, None, Some(31));

    c.bench_function("resolve daily offset 30", |b| {
        b.iter(|| resolve(black_box(&daily), black_box(30), black_box(now)))
    });

    c.bench_function("resolve monthly day-31 offset 30", |b| {
        b.iter(|| resolve(black_box(&monthly), black_box(30), black_box(now)))
    });

    let backlog: Vec<BacklogEntry> = (0..100)
        .map(|i| BacklogEntry {
            post_id: format!("post-{i:03}"),
            created_at: now - chrono::Duration::minutes(i),
        })
        .collect();

    c.bench_function("reconcile backlog of 100", |b| {
        b.iter(|| reconcile(black_box(&monthly), black_box(&backlog), black_box(now)))
    });
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
