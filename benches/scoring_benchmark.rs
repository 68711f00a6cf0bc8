use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::hint::black_box;
use vitals_tracker::config::ScoringConfig;
use vitals_tracker::services::providers::{oura, whoop};
use vitals_tracker::services::scoring::score_day;

fn benchmark_normalize_and_score(c: &mut Criterion) {
    let recovery = json!({
        "score": {
            "recovery_score": 44,
            "resting_heart_rate": 64,
            "hrv_rmssd_milli": 31.81,
            "spo2_percentage": 95.69
        }
    });
    let sleep = json!({
        "score": {
            "stage_summary": {
                "total_awake_time_milli": 1403507,
                "total_light_sleep_time_milli": 14905851,
                "total_slow_wave_sleep_time_milli": 6630370,
                "total_rem_sleep_time_milli": 5879573
            },
            "sleep_needed": {
                "baseline_milli": 27395716,
                "need_from_sleep_debt_milli": 352230,
                "need_from_recent_strain_milli": 208595
            },
            "sleep_performance_percentage": 98
        }
    });
    let workout = json!({"score": {"strain": 8.25, "average_heart_rate": 123}});

    let readiness = json!({
        "score": 82,
        "temperature_deviation": -0.12,
        "contributors": {"activity_balance": 56, "body_temperature": 98, "hrv_balance": null}
    });
    let daily_sleep = json!({"score": 77, "contributors": {"deep_sleep": 99, "rem_sleep": 68}});
    let activity = json!({"score": 91, "steps": 10500, "active_calories": 420});
    let stress = json!({"stress_high": 5400, "recovery_high": 9000, "day_summary": "restored"});
    let spo2 = json!({"spo2_percentage": {"average": 97.3}});

    let config = ScoringConfig::default();
    let whoop_metrics = whoop::normalize(Some(&recovery), Some(&sleep), Some(&workout));
    let oura_metrics = oura::normalize(
        Some(&readiness),
        Some(&daily_sleep),
        Some(&activity),
        Some(&stress),
        Some(&spo2),
    );

    let mut group = c.benchmark_group("daily_aggregation");

    group.bench_function("normalize_whoop", |b| {
        b.iter(|| whoop::normalize(black_box(Some(&recovery)), Some(&sleep), Some(&workout)))
    });

    group.bench_function("normalize_oura", |b| {
        b.iter(|| {
            oura::normalize(
                black_box(Some(&readiness)),
                Some(&daily_sleep),
                Some(&activity),
                Some(&stress),
                Some(&spo2),
            )
        })
    });

    group.bench_function("score_day", |b| {
        b.iter(|| score_day(&config, black_box(&whoop_metrics), black_box(&oura_metrics)))
    });

    group.finish();
}

criterion_group!(benches, benchmark_normalize_and_score);
criterion_main!(benches);
