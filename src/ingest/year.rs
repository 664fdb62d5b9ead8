//! Streams one yearly CSV into the `data` table.

use indicatif::ProgressBar;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    download::ObjectStore,
    error::{FetchError, Result},
    reading::{decode_day, DayRecord},
    reframe::split_records,
    table::{row_marker, set_row_marker, Dataset, ProgressMarker},
};

pub fn year_key(config: &Config, year: i32) -> String {
    format!("{}{}.csv", config.ghcn_path, year)
}

/// Appends the rows of `year` that a previous run has not already appended.
///
/// The blob is read in ranges of `block_size` bytes. After each range the
/// decoded rows are appended as one slab and the row marker is moved to the
/// number of lines read so far, so a later run skips them. Returns the number
/// of rows appended, 0 when the blob is missing, empty or fully consumed.
pub async fn ingest_year<S, D>(
    store: &S,
    data: &mut D,
    config: &Config,
    year: i32,
    progress: &ProgressBar,
) -> Result<u64>
where
    S: ObjectStore,
    D: Dataset<Record = DayRecord>,
{
    let bucket = config.ghcn_bucket.as_str();
    let key = year_key(config, year);

    let Some(meta) = store.head(bucket, &key).await? else {
        info!("{} not found", key);
        return Ok(0);
    };
    let content_length = meta.length;
    if content_length == 0 {
        info!("{} is empty", key);
        return Ok(0);
    }

    // A marker for another year says nothing about this one.
    let mut marker = match row_marker(data)? {
        Some(m) if m.year == year => m.row,
        _ => 0,
    };
    info!(
        "Loading {} ({} bytes, {} rows already read)",
        key, content_length, marker
    );

    progress.set_length(content_length);
    progress.set_position(0);
    progress.set_message(key.clone());

    let mut range_start: u64 = 0;
    let mut rows_read: i64 = 0;
    let mut appended: u64 = 0;

    loop {
        let range_end = (range_start + config.block_size).min(content_length);
        if range_end <= range_start {
            break;
        }

        debug!("GET {} bytes={}-{}", key, range_start, range_end);
        let chunk = match store.get_range(bucket, &key, range_start, range_end).await {
            Ok(chunk) => chunk,
            Err(FetchError::InvalidRange) => {
                debug!("{}: range starting at {} not satisfiable", key, range_start);
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let at_end = range_start + chunk.len() as u64 >= content_length;
        let framed = split_records(&chunk, at_end);
        range_start += (chunk.len() - framed.tail.len()) as u64;
        progress.set_position(range_start);

        if framed.lines.is_empty() {
            if at_end {
                warn!("{}: incomplete last line at byte {}", key, range_start);
            } else {
                warn!(
                    "{}: line at byte {} is longer than block_size {}",
                    key, range_start, config.block_size
                );
            }
            break;
        }

        let count = framed.lines.len() as i64;
        rows_read += count;
        if rows_read <= marker {
            debug!("{}: lines up to {} already loaded", key, rows_read);
            continue;
        }
        let first_line = rows_read - count;
        let skip = if first_line < marker {
            (marker - first_line) as usize
        } else {
            0
        };

        let mut records = Vec::with_capacity(framed.lines.len() - skip);
        for (i, line) in framed.lines.iter().enumerate().skip(skip) {
            match decode_day(line) {
                Ok(record) => records.push(record),
                Err(reason) => warn!(
                    "{} line {}: {}, skipping",
                    key,
                    first_line + i as i64 + 1,
                    reason
                ),
            }
        }

        if !records.is_empty() {
            appended += data.append(&records)?;
        }
        marker = rows_read;
        set_row_marker(
            data,
            ProgressMarker {
                year,
                row: rows_read,
            },
        )?;
        debug!(
            "{}: appended {} rows, marker at {}",
            key,
            records.len(),
            rows_read
        );
    }

    info!("{}: {} rows appended", key, appended);

    Ok(appended)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        error::Error,
        reading::day::MISSING_VALUE,
        table::memory::MemoryDataset,
        testing::{config_fixture, MemoryStore},
    };

    const L1: &str = "US1NYAB0001,20200101,PRCP,5,,,a,0700\n";
    const L2: &str = "US1NYAB0002,20200101,TMAX,250,,,a,0700\n";
    const L3: &str = "US1NYAB0003,20200101,TMIN,100,,,a,0700\n";
    const L4: &str = "US1NYAB0004,20200102,PRCP,12,,,a,0700\n";

    fn blob(lines: &[&str]) -> Vec<u8> {
        lines.concat().into_bytes()
    }

    fn store_with(body: &[u8]) -> MemoryStore {
        let store = MemoryStore::default();
        store.put("csv/by_year/2020.csv", body, "\"v1\"");
        store
    }

    async fn run(store: &MemoryStore, data: &mut MemoryDataset<DayRecord>, block_size: u64) -> u64 {
        let mut config = config_fixture();
        config.block_size = block_size;

        ingest_year(store, data, &config, 2020, &ProgressBar::hidden())
            .await
            .unwrap()
    }

    fn marker(data: &MemoryDataset<DayRecord>) -> Option<ProgressMarker> {
        row_marker(data).unwrap()
    }

    fn station_ids(data: &MemoryDataset<DayRecord>) -> Vec<&str> {
        data.rows.iter().map(|r| r.station_id.as_str()).collect()
    }

    #[tokio::test]
    async fn should_load_clean_blob() {
        let store = store_with(&blob(&[L1, L2, L3]));
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 10 * 1024 * 1024).await, 3);

        assert_eq!(
            station_ids(&data),
            vec!["US1NYAB0001", "US1NYAB0002", "US1NYAB0003"]
        );
        assert_eq!(data.rows[1].data_value, 250);
        assert_eq!(data.rows[2].element, "TMIN");
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 3 }));
    }

    #[tokio::test]
    async fn should_rewind_partial_lines_at_range_boundaries() {
        let store = store_with(&blob(&[L1, L2, L3]));
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 40).await, 3);

        let mut once = MemoryDataset::default();
        run(&store_with(&blob(&[L1, L2, L3])), &mut once, 1024).await;
        assert_eq!(data.rows, once.rows);
        assert_eq!(
            store
                .requests()
                .into_iter()
                .filter(|r| r.starts_with("GET"))
                .collect::<Vec<_>>(),
            vec![
                "GET csv/by_year/2020.csv 0-40",
                "GET csv/by_year/2020.csv 37-77",
                "GET csv/by_year/2020.csv 76-115",
            ]
        );
    }

    #[tokio::test]
    async fn should_rewind_line_cut_inside_last_field() {
        // the first two ranges end in "a,07" and "a,"
        let store = store_with(&blob(&[L1, L2, L3]));
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 72).await, 3);

        assert!(data.rows.iter().all(|r| r.obs_time == "0700"));
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 3 }));
    }

    #[tokio::test]
    async fn should_not_depend_on_block_size() {
        let body = blob(&[L1, L2, L3, L4]);
        let mut expected = MemoryDataset::default();
        run(&store_with(&body), &mut expected, 1024).await;

        for block_size in 38..=130 {
            let mut data = MemoryDataset::default();
            run(&store_with(&body), &mut data, block_size).await;

            assert_eq!(data.rows, expected.rows, "block_size {}", block_size);
            assert_eq!(
                marker(&data),
                Some(ProgressMarker { year: 2020, row: 4 }),
                "block_size {}",
                block_size
            );
        }
    }

    #[tokio::test]
    async fn should_load_last_line_without_newline() {
        let body = blob(&[L1, L2, L3.trim_end()]);

        for block_size in [40, 1024] {
            let mut data = MemoryDataset::default();

            assert_eq!(run(&store_with(&body), &mut data, block_size).await, 3);
            assert_eq!(data.rows[2].obs_time, "0700");
        }
    }

    #[tokio::test]
    async fn should_resume_after_blob_grows() {
        let store = store_with(&blob(&[L1, L2, L3]));
        let mut data = MemoryDataset::default();
        run(&store, &mut data, 1024).await;

        store.put("csv/by_year/2020.csv", &blob(&[L1, L2, L3, L4]), "\"v2\"");

        assert_eq!(run(&store, &mut data, 1024).await, 1);
        assert_eq!(data.rows.len(), 4);
        assert_eq!(data.rows[3].station_id, "US1NYAB0004");
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 4 }));
    }

    #[tokio::test]
    async fn should_resume_from_prefix_without_duplicates() {
        let full = blob(&[L1, L2, L3, L4]);
        let mut expected = MemoryDataset::default();
        run(&store_with(&full), &mut expected, 1024).await;

        // cuts inside the third line, before its last field
        for cut in [L1.len() + L2.len() + 5, L1.len() + L2.len() + 30] {
            for block_size in [45, 1024] {
                let store = store_with(&full[..cut]);
                let mut data = MemoryDataset::default();
                run(&store, &mut data, block_size).await;
                assert_eq!(data.rows.len(), 2);

                store.put("csv/by_year/2020.csv", &full, "\"v2\"");
                run(&store, &mut data, block_size).await;

                assert_eq!(data.rows, expected.rows, "cut {} block {}", cut, block_size);
            }
        }
    }

    #[tokio::test]
    async fn should_append_nothing_when_rerun() {
        let store = store_with(&blob(&[L1, L2, L3]));
        let mut data = MemoryDataset::default();
        run(&store, &mut data, 40).await;

        assert_eq!(run(&store, &mut data, 40).await, 0);
        assert_eq!(data.rows.len(), 3);
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 3 }));
    }

    #[tokio::test]
    async fn should_substitute_missing_value() {
        let store = store_with(b"US1NYAB0001,20200101,PRCP,99999,,,a,0700\n");
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 1024).await, 1);
        assert_eq!(data.rows[0].data_value, MISSING_VALUE);
    }

    #[tokio::test]
    async fn should_advance_marker_past_malformed_line() {
        let store = store_with(b"US1NYAB0001,20200101,PRCP,5,,,a\n");
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 1024).await, 0);
        assert!(data.rows.is_empty());
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 1 }));
    }

    #[tokio::test]
    async fn should_count_malformed_lines_toward_marker() {
        let body = [L1, "not,a,row\n", L2].concat();
        let store = store_with(body.as_bytes());
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 1024).await, 2);
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 3 }));
    }

    #[tokio::test]
    async fn should_ignore_marker_of_other_year() {
        let store = store_with(&blob(&[L1, L2]));
        let mut data = MemoryDataset::default();
        set_row_marker(&mut data, ProgressMarker { year: 2019, row: 5 }).unwrap();

        assert_eq!(run(&store, &mut data, 1024).await, 2);
        assert_eq!(marker(&data), Some(ProgressMarker { year: 2020, row: 2 }));
    }

    #[tokio::test]
    async fn should_keep_marker_monotonic_within_year() {
        let full = blob(&[L1, L2, L3, L4]);
        let store = store_with(&full[..L1.len()]);
        let mut data = MemoryDataset::default();
        let mut last = 0;

        for end in [L1.len(), L1.len() + 10, L1.len() + L2.len(), full.len()] {
            store.put("csv/by_year/2020.csv", &full[..end], "\"v\"");
            run(&store, &mut data, 40).await;

            let row = marker(&data).unwrap().row;
            assert!(row >= last);
            last = row;
        }
        assert_eq!(last, 4);
        assert_eq!(data.rows.len(), 4);
    }

    #[tokio::test]
    async fn should_return_zero_for_missing_or_empty_blob() {
        let mut data = MemoryDataset::default();

        assert_eq!(run(&MemoryStore::default(), &mut data, 1024).await, 0);
        assert_eq!(run(&store_with(b""), &mut data, 1024).await, 0);
        assert_eq!(marker(&data), None);
    }

    #[tokio::test]
    async fn should_stop_on_line_longer_than_block() {
        let store = store_with(&blob(&[L1, L2]));
        let mut data = MemoryDataset::default();

        assert_eq!(run(&store, &mut data, 20).await, 0);
        assert_eq!(marker(&data), None);
    }

    #[tokio::test]
    async fn should_propagate_transient_fetch_errors() {
        let store = store_with(&blob(&[L1, L2]));
        store.fail_gets("csv/by_year/2020.csv");
        let mut data = MemoryDataset::default();

        let result = ingest_year(
            &store,
            &mut data,
            &config_fixture(),
            2020,
            &ProgressBar::hidden(),
        )
        .await;

        match result {
            Err(e @ Error::Fetch(_)) => assert!(e.is_transient()),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(data.rows.is_empty());
    }
}
