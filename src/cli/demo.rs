use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt16Array, UInt32Array, UInt64Array, UInt8Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use hittree::table::{TableBundle, HIT_TABLE, META_TABLE};

/// Readout period of one event in seconds
const EVENT_PERIOD: f64 = 25e-6;
/// Every n-th event has no meta row
const MISSING_META_EVERY: u64 = 50;

/// Generate a synthetic interpreted run
pub fn run(output: PathBuf, events: usize) -> Result<()> {
    info!("hittree - synthetic table bundle");
    info!("================================");

    let bundle = TableBundle::create(&output).context("Failed to create bundle directory")?;

    let hits = build_hits(events as u64).context("Failed to build hit table")?;
    let meta = build_meta(events as u64).context("Failed to build meta table")?;

    bundle
        .write_table(HIT_TABLE, &hits)
        .context("Failed to write hit table")?;
    bundle
        .write_table(META_TABLE, &meta)
        .context("Failed to write meta table")?;

    println!("Demo bundle written to {}", output.display());
    println!("  {}: {} rows", HIT_TABLE, hits.num_rows());
    println!("  {}: {} rows", META_TABLE, meta.num_rows());
    println!();
    println!("Convert it with:");
    println!("  hittree convert {}", output.display());
    Ok(())
}

/// Number of hits in an event, between 0 and 6
fn hits_in_event(event: u64) -> u64 {
    (event * 5 + 3) % 7
}

fn build_hits(events: u64) -> Result<RecordBatch> {
    let mut event_number = Vec::new();
    let mut trigger_number = Vec::new();
    let mut relative_bcid = Vec::new();
    let mut lvl1id = Vec::new();
    let mut column = Vec::new();
    let mut row = Vec::new();
    let mut tot = Vec::new();
    let mut bcid = Vec::new();
    let mut tdc = Vec::new();
    let mut tdc_time_stamp = Vec::new();
    let mut trigger_status = Vec::new();
    let mut service_record = Vec::new();
    let mut event_status = Vec::new();

    for event in 0..events {
        for hit in 0..hits_in_event(event) {
            let seed = event * 31 + hit * 17;
            event_number.push(event);
            trigger_number.push(event as u32);
            relative_bcid.push((hit % 16) as u8);
            lvl1id.push((event % 4096) as u16);
            column.push((seed % 80) as u8 + 1);
            row.push((seed % 336) as u16 + 1);
            tot.push((seed % 14) as u8);
            bcid.push(((event * 16 + hit) % 65536) as u16);
            tdc.push(((seed * 13) % 4096) as u16);
            tdc_time_stamp.push((seed % 256) as u16);
            trigger_status.push(0u8);
            service_record.push(0u32);
            event_status.push(0u16);
        }
    }

    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::UInt64, false),
        Field::new("trigger_number", DataType::UInt32, false),
        Field::new("relative_BCID", DataType::UInt8, false),
        Field::new("LVL1ID", DataType::UInt16, false),
        Field::new("column", DataType::UInt8, false),
        Field::new("row", DataType::UInt16, false),
        Field::new("tot", DataType::UInt8, false),
        Field::new("BCID", DataType::UInt16, false),
        Field::new("TDC", DataType::UInt16, false),
        Field::new("TDC_time_stamp", DataType::UInt16, false),
        Field::new("trigger_status", DataType::UInt8, false),
        Field::new("service_record", DataType::UInt32, false),
        Field::new("event_status", DataType::UInt16, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from(event_number)),
        Arc::new(UInt32Array::from(trigger_number)),
        Arc::new(UInt8Array::from(relative_bcid)),
        Arc::new(UInt16Array::from(lvl1id)),
        Arc::new(UInt8Array::from(column)),
        Arc::new(UInt16Array::from(row)),
        Arc::new(UInt8Array::from(tot)),
        Arc::new(UInt16Array::from(bcid)),
        Arc::new(UInt16Array::from(tdc)),
        Arc::new(UInt16Array::from(tdc_time_stamp)),
        Arc::new(UInt8Array::from(trigger_status)),
        Arc::new(UInt32Array::from(service_record)),
        Arc::new(UInt16Array::from(event_status)),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}

fn build_meta(events: u64) -> Result<RecordBatch> {
    let kept: Vec<u64> = (0..events)
        .filter(|e| e % MISSING_META_EVERY != MISSING_META_EVERY - 1)
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("event_number", DataType::UInt32, false),
        Field::new("timestamp_start", DataType::Float64, false),
        Field::new("timestamp_stop", DataType::Float64, false),
        Field::new("error_code", DataType::UInt8, false),
    ]));
    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt32Array::from_iter_values(kept.iter().map(|&e| e as u32))),
        Arc::new(Float64Array::from_iter_values(
            kept.iter().map(|&e| e as f64 * EVENT_PERIOD),
        )),
        Arc::new(Float64Array::from_iter_values(
            kept.iter().map(|&e| (e + 1) as f64 * EVENT_PERIOD),
        )),
        Arc::new(UInt8Array::from_iter_values(kept.iter().map(|_| 0u8))),
    ];
    Ok(RecordBatch::try_new(schema, columns)?)
}
