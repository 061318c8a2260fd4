//! End-to-end behaviour of the measurement service over both stores.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use limno_core::config::QueryConfig;
use limno_core::parameters::ParameterRegistry;
use limno_core::service::{AggregateQuery, MeasurementService, ReadingsQuery};
use limno_core::store::{FileStore, MemoryStore, ReadingStore};
use limno_core::{ParameterId, ReadingId, Resolution, SensorId};
use tempfile::tempdir;

const DAYS_OF_MEASUREMENTS: i64 = 90;
const INTERVAL_HOURS: i64 = 6;
const PER_PARAMETER: usize = (DAYS_OF_MEASUREMENTS * 24 / INTERVAL_HOURS) as usize;
const PARAMETERS_PER_LINE: usize = 4;

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2015, 10, 1, 0, 0, 0).unwrap()
}

fn sensor() -> SensorId {
    SensorId::new("sensor-1")
}

/// Collection instant of the `i`-th newest sample.
fn sample_at(i: usize) -> DateTime<Utc> {
    anchor() - TimeDelta::hours(i as i64 * INTERVAL_HOURS)
}

fn pressure(i: usize) -> f64 {
    1000.0 + (i % 10) as f64
}

/// Ingest 90 days of four-parameter lines, one every six hours, oldest first.
fn seed<S: ReadingStore>(service: &MeasurementService<S>) {
    for i in (0..PER_PARAMETER).rev() {
        let line = format!(
            "{};Pa={};Tw={};Ta={};pH={}",
            sample_at(i).to_rfc3339(),
            pressure(i),
            18.0 + (i % 5) as f64,
            22.5,
            7.0
        );
        let report = service.ingest(&sensor(), &line).unwrap();
        assert_eq!(report.readings.len(), PARAMETERS_PER_LINE);
    }
}

fn memory_service() -> MeasurementService<MemoryStore> {
    MeasurementService::new(
        ParameterRegistry::default(),
        QueryConfig::default(),
        MemoryStore::new(),
    )
}

fn pressure_query() -> ReadingsQuery {
    let mut query = ReadingsQuery::new(sensor());
    query.parameter = Some(ParameterId::new("atmospheric_pressure"));
    query
}

#[test]
fn first_page_for_one_parameter() {
    let service = memory_service();
    seed(&service);

    let page = service.list(&pressure_query()).unwrap();

    assert_eq!(page.count, PER_PARAMETER);
    assert_eq!(page.page, 1);
    assert_eq!(page.per_page, 20);
    assert_eq!(page.readings.len(), 20);
    for (k, row) in page.readings.iter().enumerate() {
        assert_eq!(row.reading.collected_at, sample_at(k), "row {k}");
        assert_eq!(row.reading.value, pressure(k), "row {k}");
    }
}

#[test]
fn first_page_across_parameters() {
    let service = memory_service();
    seed(&service);

    let page = service.list(&ReadingsQuery::new(sensor())).unwrap();

    assert_eq!(page.count, PARAMETERS_PER_LINE * PER_PARAMETER);
    assert_eq!(page.readings.len(), 20);
    let newest = &page.readings[..PARAMETERS_PER_LINE];
    assert!(newest.iter().all(|row| row.reading.collected_at == anchor()));
}

#[test]
fn explicit_page_and_size() {
    let service = memory_service();
    seed(&service);

    let mut query = pressure_query();
    query.page = Some(3);
    query.per_page = Some(14);
    let page = service.list(&query).unwrap();

    assert_eq!((page.page, page.per_page, page.count), (3, 14, PER_PARAMETER));
    let instants: Vec<_> = page.readings.iter().map(|r| r.reading.collected_at).collect();
    let expected: Vec<_> = (28..42).map(sample_at).collect();
    assert_eq!(instants, expected);
}

#[test]
fn page_past_the_end_is_empty() {
    let service = memory_service();
    seed(&service);

    let mut query = pressure_query();
    query.page = Some(100);
    let page = service.list(&query).unwrap();

    assert!(page.readings.is_empty());
    assert_eq!(page.count, PER_PARAMETER);
}

#[test]
fn filter_by_date_range() {
    let service = memory_service();
    seed(&service);

    let from = anchor() - TimeDelta::days(23);
    let to = anchor() - TimeDelta::days(10);
    let mut query = pressure_query();
    query.from = Some(from);
    query.to = Some(to);
    let page = service.list(&query).unwrap();

    // samples 40..=92 sit inside [from, to], both ends included
    assert_eq!(page.count, 53);
    assert_eq!(page.readings.len(), 20);
    assert_eq!(page.readings[0].reading.collected_at, to);
    assert!(
        page.readings
            .iter()
            .all(|r| (from..=to).contains(&r.reading.collected_at))
    );
}

#[test]
fn aggregate_by_hour() {
    let service = memory_service();
    seed(&service);

    let query = AggregateQuery {
        sensor: sensor(),
        parameter: ParameterId::new("atmospheric_pressure"),
        start: anchor() - TimeDelta::hours(30),
        end: anchor() - TimeDelta::hours(5),
        resolution: Resolution::Hour,
    };
    let report = service.aggregate(&query).unwrap();

    assert_eq!(report.count, 5);
    assert_eq!(report.aggregates.len(), 5);

    let first = report.aggregates[0].key;
    assert_eq!((first.year, first.month, first.day, first.hour), (2015, 9, 29, Some(19)));
    let last = report.aggregates[4].key;
    assert_eq!((last.year, last.month, last.day, last.hour), (2015, 9, 30, Some(19)));

    for aggregate in &report.aggregates {
        assert_eq!(aggregate.count, 1);
        assert_eq!(aggregate.min, aggregate.max);
        assert_eq!(aggregate.avg, aggregate.min);
    }
}

#[test]
fn aggregate_by_day_covers_every_reading() {
    let service = memory_service();
    seed(&service);

    let query = AggregateQuery {
        sensor: sensor(),
        parameter: ParameterId::new("atmospheric_pressure"),
        start: anchor() - TimeDelta::days(DAYS_OF_MEASUREMENTS),
        end: anchor(),
        resolution: Resolution::Day,
    };
    let report = service.aggregate(&query).unwrap();

    assert_eq!(report.count, PER_PARAMETER);
    assert_eq!(report.aggregates.len(), 91);
    let total: u64 = report.aggregates.iter().map(|a| a.count).sum();
    assert_eq!(total as usize, PER_PARAMETER);

    assert_eq!(report.aggregates.first().map(|a| a.count), Some(3));
    assert_eq!(report.aggregates.last().map(|a| a.count), Some(1));
    for aggregate in &report.aggregates {
        assert!(aggregate.min <= aggregate.avg && aggregate.avg <= aggregate.max);
    }
}

#[test]
fn aggregate_of_unknown_sensor_is_empty() {
    let service = memory_service();
    seed(&service);

    let report = service
        .aggregate(&AggregateQuery {
            sensor: SensorId::new("sensor-2"),
            parameter: ParameterId::new("ph"),
            start: anchor() - TimeDelta::days(1),
            end: anchor(),
            resolution: Resolution::Hour,
        })
        .unwrap();

    assert!(report.aggregates.is_empty());
    assert_eq!(report.count, 0);
}

#[test]
fn converted_units_are_stored_canonically() {
    let service = memory_service();
    let report = service
        .ingest(&sensor(), "2015-07-14T10:08:15-03:00;Tw=20.3;Ta:F=78.29;pH=6.9")
        .unwrap();

    let ambient = report
        .readings
        .iter()
        .find(|row| row.reading.parameter.as_str() == "ambient_temperature")
        .unwrap();
    assert!((ambient.reading.value - 25.716_666).abs() < 1e-5);
}

#[test]
fn rejected_lines_report_their_code() {
    let service = memory_service();
    let cases = [
        ("2015-07-14T10:08:15-03:00;", "missing_measurements"),
        ("2015-07-14T10:08:15-03:00Tw=20.3;Ta:F=78.29;pH=6.9", "invalid_timestamp"),
        ("2015-07-14T10:08:15-03:00;Tw=20.3;Ta:F=78.29;pH", "malformed_measurement"),
    ];

    for (line, code) in cases {
        let err = service.ingest(&sensor(), line).unwrap_err();
        assert_eq!(err.code(), code, "line {line:?}");
    }
    assert!(service.store().is_empty().unwrap());
}

#[test]
fn file_store_keeps_readings_across_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("limno.log");

    {
        let service = MeasurementService::new(
            ParameterRegistry::default(),
            QueryConfig::default(),
            FileStore::open(&path).unwrap(),
        );
        seed(&service);
    }

    let service = MeasurementService::new(
        ParameterRegistry::default(),
        QueryConfig::default(),
        FileStore::open(&path).unwrap(),
    );

    let page = service.list(&pressure_query()).unwrap();
    assert_eq!(page.count, PER_PARAMETER);
    assert_eq!(page.readings[0].reading.collected_at, anchor());

    let newest = page.readings[0].id;
    assert!(service.delete(newest).unwrap());
    assert!(!service.delete(newest).unwrap());
    assert!(!service.delete(ReadingId(u64::MAX)).unwrap());

    let page = service.list(&pressure_query()).unwrap();
    assert_eq!(page.count, PER_PARAMETER - 1);
    assert_eq!(page.readings[0].reading.collected_at, sample_at(1));
}
