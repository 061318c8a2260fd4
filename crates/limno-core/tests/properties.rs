//! Property tests for decoding, bucketing and aggregation.

use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone, Utc};
use limno_core::aggregate::{AggregationWindow, aggregate, aggregate_query};
use limno_core::bucket::{Resolution, bucket_key};
use limno_core::ingest::{ingest_line, parse_line};
use limno_core::parameters::ParameterRegistry;
use limno_core::store::{MemoryStore, ReadingStore};
use limno_core::{ParameterId, Reading, SensorId};
use proptest::prelude::*;

const CODES: [&str; 7] = ["Tw", "Ta", "pH", "Pa", "RH", "DO", "EC"];

/// 2000-01-01 .. 2040-01-01, in seconds
fn arb_instant() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..2_208_988_800).prop_map(|secs| {
        DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH)
    })
}

/// Whole-minute offsets between -12:00 and +14:00
fn arb_offset() -> impl Strategy<Value = FixedOffset> {
    (-720i32..=840).prop_map(|minutes| {
        FixedOffset::east_opt(minutes * 60).unwrap_or(FixedOffset::east_opt(0).unwrap())
    })
}

fn arb_resolution() -> impl Strategy<Value = Resolution> {
    prop_oneof![Just(Resolution::Hour), Just(Resolution::Day)]
}

fn arb_segments() -> impl Strategy<Value = Vec<(&'static str, f64)>> {
    prop::collection::vec(
        (prop::sample::select(CODES.to_vec()), -1.0e6f64..1.0e6),
        1..12,
    )
}

/// Readings of one sensor and parameter spread over about a week.
fn arb_readings(max: usize) -> impl Strategy<Value = Vec<Reading>> {
    prop::collection::vec((0i64..7 * 24 * 3600, -500.0f64..500.0), 0..max).prop_map(|samples| {
        let base = Utc.with_ymd_and_hms(2015, 7, 10, 0, 0, 0).unwrap();
        samples
            .into_iter()
            .map(|(secs, value)| {
                Reading::new(
                    SensorId::new("buoy-1"),
                    ParameterId::new("ph"),
                    value,
                    base + TimeDelta::seconds(secs),
                )
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_every_segment_becomes_a_reading(
        instant in arb_instant(),
        offset in arb_offset(),
        segments in arb_segments(),
    ) {
        let registry = ParameterRegistry::default();
        let local = instant.with_timezone(&offset);
        let body: Vec<String> = segments
            .iter()
            .map(|(code, value)| format!("{code}={value}"))
            .collect();
        let line = format!("{};{}", local.to_rfc3339(), body.join(";"));

        let readings = ingest_line(&line, &SensorId::new("s1"), &registry).unwrap();

        prop_assert_eq!(readings.len(), segments.len());
        for (reading, (code, value)) in readings.iter().zip(&segments) {
            prop_assert_eq!(reading.collected_at, instant);
            let expected = registry.lookup(code).map(|def| def.id.clone());
            prop_assert_eq!(Some(reading.parameter.clone()), expected);
            prop_assert_eq!(reading.value, *value);
        }
    }

    #[test]
    fn prop_parse_is_total(line in ".{0,80}") {
        // Either outcome is fine; the call must return one of them.
        if let Ok(parsed) = parse_line(&line) {
            prop_assert!(!parsed.is_empty());
        }
    }

    #[test]
    fn prop_parse_is_total_on_near_valid_lines(
        segments in prop::collection::vec("[A-Za-z:=;. 0-9-]{0,12}", 0..6),
    ) {
        let line = format!("2015-07-14T10:08:15-03:00;{}", segments.join(";"));
        match parse_line(&line) {
            Ok(parsed) => prop_assert!(!parsed.is_empty()),
            Err(e) => prop_assert!(!e.code().is_empty()),
        }
    }

    #[test]
    fn prop_bucket_key_is_deterministic(instant in arb_instant(), resolution in arb_resolution()) {
        let key = bucket_key(instant, resolution);
        prop_assert_eq!(key, bucket_key(instant, resolution));
        prop_assert!(key.contains(instant));

        let start = key.start().unwrap();
        prop_assert!(start <= instant);
        prop_assert!(instant < start + resolution.bucket_width());
        if let Some(hour) = key.hour {
            prop_assert!((1..=24).contains(&hour));
        }
    }

    #[test]
    fn prop_aggregation_is_complete(readings in arb_readings(200), resolution in arb_resolution()) {
        let aggregates = aggregate(&readings, resolution);

        let total: u64 = aggregates.iter().map(|a| a.count).sum();
        prop_assert_eq!(total as usize, readings.len());

        for reading in &readings {
            let key = bucket_key(reading.collected_at, resolution);
            prop_assert!(aggregates.iter().any(|a| a.key == key));
        }
        prop_assert!(aggregates.windows(2).all(|pair| pair[0].key < pair[1].key));
    }

    #[test]
    fn prop_avg_between_min_and_max(readings in arb_readings(200), resolution in arb_resolution()) {
        for aggregate in aggregate(&readings, resolution) {
            prop_assert!(aggregate.count >= 1);
            prop_assert!(aggregate.min <= aggregate.avg, "{:?}", aggregate);
            prop_assert!(aggregate.avg <= aggregate.max, "{:?}", aggregate);
        }
    }

    #[test]
    fn prop_range_boundaries_are_included(
        readings in arb_readings(50),
        span_secs in 0i64..3 * 24 * 3600,
        resolution in arb_resolution(),
    ) {
        let start = Utc.with_ymd_and_hms(2015, 7, 12, 0, 0, 0).unwrap();
        let end = start + TimeDelta::seconds(span_secs);

        let store = MemoryStore::new();
        store.insert_readings(&readings).unwrap();
        store
            .insert_readings(&[
                Reading::new(SensorId::new("buoy-1"), ParameterId::new("ph"), 1.0, start),
                Reading::new(SensorId::new("buoy-1"), ParameterId::new("ph"), 2.0, end),
            ])
            .unwrap();

        let window = AggregationWindow {
            sensor: SensorId::new("buoy-1"),
            parameter: ParameterId::new("ph"),
            start,
            end,
            resolution,
        };
        let result = aggregate_query(&store, &window).unwrap();

        let inside = readings
            .iter()
            .filter(|r| start <= r.collected_at && r.collected_at <= end)
            .count();
        prop_assert_eq!(result.count, inside + 2);
        prop_assert!(result.aggregates.iter().any(|a| a.key == bucket_key(start, resolution)));
        prop_assert!(result.aggregates.iter().any(|a| a.key == bucket_key(end, resolution)));
    }
}
