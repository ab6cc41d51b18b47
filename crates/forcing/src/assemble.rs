//! Chunked retrieval over a date range and assembly into one forcing record.

use clmu_common::{month_chunks, DateRange, GeoPoint};
use tracing::{info, instrument, warn};

use crate::convert::{convert, ConversionParams};
use crate::error::{ForcingError, ForcingResult};
use crate::record::{ForcingRecord, RawRecord};
use crate::sources::RawFetcher;

/// Fetch every month chunk of `range` in order and concatenate the results.
///
/// Chunks are awaited one after another. The combined record is sorted by
/// time and repeated timestamps at chunk boundaries are dropped.
#[instrument(skip(fetcher), fields(source = fetcher.name()))]
pub async fn fetch_range(
    fetcher: &dyn RawFetcher,
    point: &GeoPoint,
    range: &DateRange,
) -> ForcingResult<RawRecord> {
    let chunks = month_chunks(range);
    let mut combined = RawRecord::default();

    for chunk in &chunks {
        info!(chunk = %chunk, "Fetching chunk");
        let record = fetcher.fetch(point, chunk).await?;
        record.validate()?;
        if record.is_empty() {
            warn!(chunk = %chunk, "Source returned no records for chunk");
        }
        combined.append(record);
    }

    let dropped = combined.sort_dedup();
    if dropped > 0 {
        warn!(dropped, "Dropped duplicate timestamps");
    }

    info!(
        chunks = chunks.len(),
        steps = combined.len(),
        "Assembled raw record"
    );
    Ok(combined)
}

/// Fetch a date range and derive the forcing series.
pub async fn build_forcing(
    fetcher: &dyn RawFetcher,
    point: &GeoPoint,
    range: &DateRange,
    params: &ConversionParams,
) -> ForcingResult<ForcingRecord> {
    params.validate()?;

    let raw = fetch_range(fetcher, point, range).await?;
    if raw.is_empty() {
        return Err(ForcingError::EmptyChunk(format!(
            "{} ~ {}",
            range.start, range.end
        )));
    }

    convert(&raw, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FLOOR;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use clmu_common::{MonthChunk, YearMonth};
    use std::sync::Mutex;
    use test_utils::fixtures::time::{LONG_END, LONG_START};

    /// Serves hourly synthetic values for each chunk and records the calls.
    struct MockFetcher {
        calls: Mutex<Vec<MonthChunk>>,
        /// Extra trailing hour to overlap the next chunk
        overlap: bool,
    }

    impl MockFetcher {
        fn new(overlap: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                overlap,
            }
        }
    }

    #[async_trait]
    impl RawFetcher for MockFetcher {
        async fn fetch(&self, _point: &GeoPoint, chunk: &MonthChunk) -> ForcingResult<RawRecord> {
            self.calls.lock().unwrap().push(*chunk);

            let start = chunk.start_datetime();
            let mut hours = (chunk.end_datetime() - start).num_hours();
            if self.overlap {
                hours += 1;
            }

            let mut r = RawRecord::default();
            for h in 0..hours {
                r.time.push(start + Duration::hours(h));
                r.t2m.push(285.0);
                r.d2m.push(280.0);
                r.sp.push(101_000.0);
                r.u10.push(2.0);
                r.v10.push(-1.0);
                r.ssrd.push(if h % 24 < 6 { 0.0 } else { 1.0e6 });
                r.strd.push(1.1e6);
                r.tp.push(0.0);
                r.fsr.push(0.7);
            }
            Ok(r)
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn point() -> GeoPoint {
        GeoPoint::new(51.5, -0.12).unwrap()
    }

    #[tokio::test]
    async fn test_fifteen_month_range() {
        let start: YearMonth = LONG_START.parse().unwrap();
        let end: YearMonth = LONG_END.parse().unwrap();
        let range = DateRange::from_months(start, end).unwrap();
        let fetcher = MockFetcher::new(false);

        let raw = fetch_range(&fetcher, &point(), &range).await.unwrap();

        let calls = fetcher.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 15);
        let expected_hours: i64 = calls
            .iter()
            .map(|c| (c.end_datetime() - c.start_datetime()).num_hours())
            .sum();
        assert_eq!(raw.len() as i64, expected_hours);
        // 2012-11-01 .. 2014-02-01 is 457 days
        assert_eq!(raw.len(), 457 * 24);
        assert!(raw.time.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(raw.time[0], Utc.with_ymd_and_hms(2012, 11, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_overlapping_chunks_deduplicated() {
        let range = DateRange::parse("2012-01-15", "2012-03-10").unwrap();
        let fetcher = MockFetcher::new(true);

        let raw = fetch_range(&fetcher, &point(), &range).await.unwrap();

        // Each chunk overlaps the next by one hour; the last one runs past the end
        let hours = (range.end - range.start).num_days() * 24 + 1;
        assert_eq!(raw.len() as i64, hours);
        assert!(raw.time.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_build_forcing_end_to_end() {
        let range = DateRange::parse("2013-06-01", "2013-06-03").unwrap();
        let fetcher = MockFetcher::new(false);

        let forcing = build_forcing(&fetcher, &point(), &range, &ConversionParams::default())
            .await
            .unwrap();

        assert_eq!(forcing.len(), 48);
        assert!(forcing.is_strictly_increasing());
        assert!(forcing.swdown.iter().all(|v| *v >= FLOOR));
        assert!(forcing.prectmms.iter().all(|v| *v == FLOOR));
        assert_eq!(forcing.zbot, 30.0);
    }

    #[tokio::test]
    async fn test_invalid_params_fail_before_fetching() {
        let range = DateRange::parse("2013-06-01", "2013-06-03").unwrap();
        let fetcher = MockFetcher::new(false);
        let params = ConversionParams {
            zbot: -1.0,
            lapse_rate: 0.006,
        };

        let result = build_forcing(&fetcher, &point(), &range, &params).await;
        assert!(matches!(result, Err(ForcingError::InvalidConfig(_))));
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }
}
