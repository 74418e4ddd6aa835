use super::cell_types;
use crate::record::{EpochRecord, EpochStore};
use crate::signal::ResponseStream;
use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Rate assumed for responses that carry none.
pub const DEFAULT_SAMPLE_RATE: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadOptions {
    /// Rewrite `cellInfo.type` shorthand codes to descriptive names.
    pub expand_cell_types: bool,
    /// Prefix ganglion-cell names with `RGC\` when expanding.
    pub prefix_rgc: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SampleRate {
    Hz(f64),
    Text(String),
}

impl SampleRate {
    fn hz(&self) -> f64 {
        match self {
            SampleRate::Hz(value) => *value,
            SampleRate::Text(text) => parse_rate(text),
        }
    }
}

/// Parse rates such as `"10000 Hz"` or `"10 kHz"`; 0 when no number is found.
pub fn parse_rate(text: &str) -> f64 {
    let Some(start) = text.find(|c: char| c.is_ascii_digit()) else {
        return 0.0;
    };
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let Ok(value) = rest[..end].parse::<f64>() else {
        return 0.0;
    };
    let unit = rest[end..].trim_start();
    if unit.starts_with("kHz") {
        value * 1e3
    } else if unit.starts_with("MHz") {
        value * 1e6
    } else {
        value
    }
}

#[derive(Debug, Deserialize)]
struct ExportFile {
    #[serde(default)]
    format_version: Option<String>,
    experiments: Vec<Experiment>,
}

#[derive(Debug, Deserialize)]
struct Experiment {
    #[serde(default)]
    cells: Vec<Cell>,
    #[serde(flatten)]
    info: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    epoch_groups: Vec<EpochGroup>,
    #[serde(flatten)]
    info: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct EpochGroup {
    #[serde(default)]
    epoch_blocks: Vec<EpochBlock>,
    #[serde(flatten)]
    info: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct EpochBlock {
    #[serde(default)]
    epochs: Vec<ExportEpoch>,
    #[serde(flatten)]
    info: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExportEpoch {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    label: Value,
    #[serde(default)]
    start_time: Value,
    #[serde(default)]
    parameters: Map<String, Value>,
    #[serde(default)]
    responses: Vec<ExportResponse>,
    #[serde(flatten)]
    info: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ExportResponse {
    #[serde(default)]
    device_name: String,
    #[serde(default)]
    data: Vec<f64>,
    #[serde(default)]
    spike_times: Option<Vec<f64>>,
    #[serde(default)]
    sample_rate: Option<SampleRate>,
    #[serde(default)]
    units: Option<String>,
}

impl ExportResponse {
    fn into_stream(self) -> ResponseStream {
        let fs = self
            .sample_rate
            .as_ref()
            .map(SampleRate::hz)
            .unwrap_or(DEFAULT_SAMPLE_RATE);
        ResponseStream {
            fs,
            data: self.data,
            spike_times: self.spike_times.filter(|t| !t.is_empty()),
            units: self.units,
        }
    }
}

pub fn read_epochs(path: &Path, options: &LoadOptions) -> Result<EpochStore> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read epochs {}", path.display()))?;
    let store = parse_epochs(&contents, options)
        .with_context(|| format!("parsing epochs {}", path.display()))?;
    info!("loaded {} epochs from {}", store.len(), path.display());
    Ok(store)
}

/// Accepts a flat array of records or the nested experiment export.
pub fn parse_epochs(text: &str, options: &LoadOptions) -> Result<EpochStore> {
    let value: Value = serde_json::from_str(text).context("invalid JSON")?;
    if value.is_array() {
        let mut records: Vec<EpochRecord> =
            serde_json::from_value(value).context("reading epoch records")?;
        if options.expand_cell_types {
            records
                .iter_mut()
                .for_each(|r| expand_cell_type(&mut r.attributes, options.prefix_rgc));
        }
        return Ok(EpochStore::from_records(records));
    }
    if value.get("experiments").is_none() {
        bail!("expected an array of epochs or an object with `experiments`");
    }
    let export: ExportFile = serde_json::from_value(value).context("reading nested export")?;
    Ok(flatten(export, options))
}

fn expand_cell_type(attributes: &mut Value, prefix_rgc: bool) {
    if let Some(Value::String(code)) = attributes.pointer_mut("/cellInfo/type") {
        *code = cell_types::full_name(code, prefix_rgc);
    }
}

fn flatten(export: ExportFile, options: &LoadOptions) -> EpochStore {
    if let Some(version) = &export.format_version {
        info!("nested export format {}", version);
    }
    let mut store = EpochStore::new();
    for experiment in export.experiments {
        for cell in experiment.cells {
            for group in cell.epoch_groups {
                for block in group.epoch_blocks {
                    let block_parameters = match block.info.get("parameters") {
                        Some(Value::Object(map)) => map.clone(),
                        _ => Map::new(),
                    };
                    for epoch in block.epochs {
                        let mut parameters = block_parameters.clone();
                        parameters.extend(epoch.parameters);
                        let mut attributes = Map::new();
                        attributes.insert("expInfo".into(), Value::Object(experiment.info.clone()));
                        attributes.insert("cellInfo".into(), Value::Object(cell.info.clone()));
                        attributes.insert("groupInfo".into(), Value::Object(group.info.clone()));
                        attributes.insert("blockInfo".into(), Value::Object(block.info.clone()));
                        attributes.insert("parameters".into(), Value::Object(parameters));
                        attributes.insert("id".into(), epoch.id);
                        attributes.insert("label".into(), epoch.label);
                        attributes.insert("startTime".into(), epoch.start_time);
                        for (key, value) in epoch.info {
                            attributes.entry(key).or_insert(value);
                        }

                        let mut record = EpochRecord::new(Value::Object(attributes));
                        if options.expand_cell_types {
                            expand_cell_type(&mut record.attributes, options.prefix_rgc);
                        }
                        for (i, response) in epoch.responses.into_iter().enumerate() {
                            let name = if response.device_name.is_empty() {
                                format!("response{}", i + 1)
                            } else {
                                response.device_name.clone()
                            };
                            let stream = response.into_stream();
                            if stream.fs <= 0.0 {
                                warn!(
                                    "epoch {} response {} has no usable sample rate",
                                    store.len(),
                                    name
                                );
                            }
                            record.responses.insert(name, stream);
                        }
                        store.push(record);
                    }
                }
            }
        }
    }
    store
}

/// Write the store as a flat JSON array of records.
pub fn write_records(path: &Path, store: &EpochStore) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(file, store.records())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn sample_path(relative: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .and_then(|p| p.parent())
            .expect("workspace root")
            .join(relative)
    }

    #[test]
    fn parses_rate_strings() {
        assert_eq!(parse_rate("10000 Hz"), 10_000.0);
        assert_eq!(parse_rate("10 kHz"), 10_000.0);
        assert_eq!(parse_rate("2.5kHz"), 2_500.0);
        assert_eq!(parse_rate("1 MHz"), 1e6);
        assert_eq!(parse_rate("fast"), 0.0);
    }

    #[test]
    fn flattens_nested_export() {
        let text = json!({
            "format_version": "1.0",
            "metadata": { "num_experiments": 1 },
            "experiments": [{
                "id": 1, "exp_name": "2024-01-01",
                "cells": [{
                    "id": 10, "type": "OnP",
                    "epoch_groups": [{
                        "id": 15, "protocol_name": "Contrast",
                        "epoch_blocks": [{
                            "id": 20, "protocol_name": "Contrast",
                            "parameters": { "contrast": 0.5, "size": 200 },
                            "epochs": [
                                {
                                    "id": 100, "label": "Epoch 1",
                                    "end_time": "2024-01-01T10:00:01",
                                    "epoch_start_ms": 12.5,
                                    "frame_times_ms": [0.0, 16.7],
                                    "stimuli": [{ "device_name": "Stage", "h5_path": "/stim/0" }],
                                    "parameters": { "contrast": 0.8 },
                                    "responses": [{
                                        "device_name": "Amp1",
                                        "data": [1.0, 2.0],
                                        "sample_rate": "10 kHz",
                                        "units": "pA"
                                    }]
                                },
                                {
                                    "id": 101,
                                    "responses": [{ "data": [3.0] }]
                                }
                            ]
                        }]
                    }]
                }]
            }]
        })
        .to_string();
        let store = parse_epochs(&text, &LoadOptions::default()).unwrap();
        assert_eq!(store.len(), 2);
        let first = &store.records()[0];
        assert_eq!(first.attribute("cellInfo.type"), Some(&json!("OnP")));
        assert_eq!(first.attribute("parameters.contrast"), Some(&json!(0.8)));
        assert_eq!(first.attribute("parameters.size"), Some(&json!(200)));
        assert_eq!(first.attribute("blockInfo.protocol_name"), Some(&json!("Contrast")));
        assert_eq!(first.attribute("expInfo.exp_name"), Some(&json!("2024-01-01")));
        assert!(first.attribute("cellInfo.epoch_groups").is_none());
        assert_eq!(first.attribute("end_time"), Some(&json!("2024-01-01T10:00:01")));
        assert_eq!(first.attribute("epoch_start_ms"), Some(&json!(12.5)));
        assert_eq!(first.attribute("frame_times_ms.1"), Some(&json!(16.7)));
        assert_eq!(first.attribute("stimuli.0.device_name"), Some(&json!("Stage")));
        assert!(first.attribute("responses").is_none());
        assert!(first.is_selected);
        let amp = first.response("Amp1").unwrap();
        assert_eq!(amp.fs, 10_000.0);
        assert_eq!(amp.units.as_deref(), Some("pA"));

        let second = &store.records()[1];
        assert_eq!(second.attribute("parameters.contrast"), Some(&json!(0.5)));
        assert_eq!(second.response("response1").unwrap().fs, DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn flat_arrays_default_to_selected() {
        let text = json!([
            { "attributes": { "cellInfo": { "type": "RB" } } },
            { "attributes": {}, "is_selected": false }
        ])
        .to_string();
        let options = LoadOptions {
            expand_cell_types: true,
            prefix_rgc: true,
        };
        let store = parse_epochs(&text, &options).unwrap();
        assert_eq!(store.selected_count(), 1);
        assert_eq!(
            store.records()[0].attribute("cellInfo.type"),
            Some(&json!("rod-bipolar"))
        );
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(parse_epochs("{\"epochs\": []}", &LoadOptions::default()).is_err());
        assert!(parse_epochs("not json", &LoadOptions::default()).is_err());
    }

    #[test]
    fn reads_bundled_sample() {
        let options = LoadOptions {
            expand_cell_types: true,
            prefix_rgc: true,
        };
        let store = read_epochs(&sample_path("test_data/sample_export.json"), &options).unwrap();
        assert_eq!(store.len(), 6);
        assert_eq!(
            store.records()[0].attribute("cellInfo.type"),
            Some(&json!("RGC\\ON-parasol"))
        );
    }

    #[test]
    fn written_records_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("epochs.json");
        let mut store = EpochStore::new();
        store.push(
            EpochRecord::new(json!({ "id": 1 }))
                .with_response("Amp1", ResponseStream::new(100.0, vec![0.5])),
        );
        write_records(&path, &store).unwrap();
        let back = read_epochs(&path, &LoadOptions::default()).unwrap();
        assert_eq!(back.records(), store.records());
    }
}
