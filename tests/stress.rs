//! Stress tests for MeterKPI
//!
//! Run with: cargo test --release stress -- --ignored

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use meterkpi::*;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn tod(ts: NaiveDateTime) -> TodLabel {
    let period = match ts.hour() {
        6..=16 => TodPeriod::Normal,
        17..=22 => TodPeriod::Peak,
        _ => TodPeriod::OffPeak,
    };
    TodLabel::Known(period)
}

/// Five-minute readings for `days` days at `locations` sheds.
fn table(days: i64, locations: usize) -> ReadingTable {
    let mut readings = Vec::new();
    for l in 0..locations {
        let location = format!("Shed_{:02}", l + 1);
        let mut counter = 10_000.0;
        for i in 0..days * 288 {
            let ts = start() + Duration::minutes(5 * i);
            let kw = 80.0 + 60.0 * (i as f64 * 0.02).sin();
            counter += kw / 12.0;
            // Counter replaced at the start of day 10
            if i == 10 * 288 {
                counter = 0.0;
            }
            let mut r = Reading::new(ts, location.clone());
            r.power_kw = Some(kw);
            r.energy_kwh = Some(counter);
            r.power_factor = Some(0.88 + (i % 13) as f64 * 0.01);
            r.current_total = Some(kw * 1.4);
            r.phase_currents = Some(ThreePhase::new(kw / 2.0, kw / 2.1, kw / 1.9));
            r.current_n = Some((i % 31) as f64);
            r.line_voltages = Some(ThreePhase::new(410.0, 415.0, 420.0));
            r.frequency = Some(49.8 + (i % 7) as f64 * 0.1);
            r.tod = Some(tod(ts));
            readings.push(r);
        }
    }
    ReadingTable::new(readings)
}

#[test]
#[ignore] // Run manually with --ignored
fn stress_test_month_single_location() {
    let engine = KpiEngine::new(EngineConfig::default()).unwrap();
    let table = table(30, 1);
    let request = KpiRequest::new().with_estimated_days(true);

    let iterations = 20;
    let start = Instant::now();
    for _ in 0..iterations {
        let report = engine.compute(&table, &request);
        assert!(report.kpis.number("total_energy_kwh").unwrap() >= 0.0);
    }
    let elapsed = start.elapsed();
    let per_report = elapsed / iterations;

    println!(
        "Computed {} reports over {} readings in {:?}",
        iterations,
        table.len(),
        elapsed
    );
    println!("Per report: {:?}", per_report);

    assert!(
        per_report.as_millis() < 2_000,
        "A month of readings should take under 2s, got {:?}",
        per_report
    );
}

#[test]
#[ignore]
fn stress_test_year_many_locations() {
    let engine = KpiEngine::new(EngineConfig::default()).unwrap();
    let table = table(365, 8);

    let start = Instant::now();
    let report = engine.compute(&table, &KpiRequest::new());
    let elapsed = start.elapsed();

    println!("{} readings in {:?}", table.len(), elapsed);

    assert_eq!(report.kpis.count("total_readings"), Some(365 * 288 * 8));
    assert_eq!(report.kpis.count("energy_resets_detected"), Some(8));
    assert_eq!(report.tables.daily_energy.len(), 365 * 8);
    let fire_total: usize = ["fire_safe", "fire_watch", "fire_high", "fire_critical"]
        .iter()
        .map(|k| report.kpis.count(k).unwrap())
        .sum();
    assert_eq!(fire_total, table.len());
}

#[test]
#[ignore]
fn stress_test_per_location_matches_filtered_table() {
    let engine = KpiEngine::new(EngineConfig::default()).unwrap();
    let table = table(60, 6);
    let request = KpiRequest::new();

    let start = Instant::now();
    let reports = engine.compute_per_location(&table, &request);
    println!("{} per-location reports in {:?}", reports.len(), start.elapsed());

    assert_eq!(reports.len(), 6);
    for (location, report) in &reports {
        let alone = engine.compute(&table.for_location(location), &request);
        assert_eq!(&alone, report, "report mismatch for {}", location);
    }
}

#[test]
#[ignore]
fn stress_test_normalize_raw_rows() {
    let engine = KpiEngine::new(EngineConfig::default()).unwrap();

    let iterations = 200_000;
    let rows: Vec<RawReading> = (0..iterations)
        .map(|i| {
            let ts = start() + Duration::minutes(5 * i as i64);
            let mut row = RawReading::new(ts.format("%Y-%m-%d %H:%M:%S").to_string(), "Shed_01")
                .with(RawColumn::PowerKw, 50.0 + (i % 40) as f64)
                .with(RawColumn::EnergyKwh, i as f64 * 4.0)
                .with_text(RawColumn::TodPeriod, "Off-Peak");
            // Every 1000th row carries garbage
            if i % 1000 == 999 {
                row.timestamp = Some("not a date".to_string());
                row.power_kw = Some("n/a".to_string());
            }
            row
        })
        .collect();

    let start = Instant::now();
    let report = engine.compute_raw(&rows, &KpiRequest::new());
    let elapsed = start.elapsed();
    let rate = iterations as f64 / elapsed.as_secs_f64();

    println!("Normalized and computed {} rows in {:?}", iterations, elapsed);
    println!("Rate: {:.0} rows/second", rate);

    assert_eq!(report.rejected_rows.len(), iterations / 1000);
    assert!(
        rate > 50_000.0,
        "Should process at least 50k rows/s, got {:.0}",
        rate
    );
}

#[test]
#[ignore]
fn stress_test_concurrent_reports() {
    let engine = Arc::new(KpiEngine::new(EngineConfig::default()).unwrap());
    let table = Arc::new(table(30, 2));
    let expected = engine.compute(&table, &KpiRequest::new());

    let start = Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let table = Arc::clone(&table);
            thread::spawn(move || engine.compute(&table, &KpiRequest::new()))
        })
        .collect();

    for handle in handles {
        let report = handle.join().unwrap();
        assert_eq!(report, expected);
    }

    println!("8 concurrent reports in {:?}", start.elapsed());
}
