mod common;

use std::sync::Arc;

use common::Recorder;
use glimpse_core::{Inspect, Node};
use glimpse_fabric::{
    DumpConfig, DumpExt, Dumper, Endpoint, Error, LocalRenderer, SourceFormatter,
};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Inspect)]
struct Point {
    x: i32,
    y: i32,
}

fn dumper(recorder: &Recorder) -> Dumper {
    Dumper::new(DumpConfig::default(), recorder.clone()).unwrap()
}

#[derive(Clone, Default)]
struct CapturingRenderer {
    calls: Arc<Mutex<Vec<String>>>,
}

impl LocalRenderer for CapturingRenderer {
    fn render_data(&self, node: &Node, title: Option<&str>) {
        self.calls.lock().push(format!(
            "data:{}:{}",
            title.unwrap_or("-"),
            serde_json::to_string(node).unwrap()
        ));
    }

    fn render_clear(&self) {
        self.calls.lock().push("clear".to_string());
    }

    fn render_markup(&self, markup: &str, _title: Option<&str>) {
        self.calls.lock().push(format!("markup:{}", markup));
    }
}

#[tokio::test]
async fn dump_sends_canonical_tree_with_title() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);
    dumper.configure(|config| config.source = false);

    dumper
        .dump(&Point { x: 3, y: 4 }, Some("Origin"))
        .await
        .unwrap();

    assert_eq!(
        *recorder.payloads.lock(),
        vec![json!({
            "$type": "dump-container",
            "$value": {"$type": "Point", "x": 3, "y": 4},
            "title": "Origin"
        })]
    );
}

#[tokio::test]
async fn dump_ext_labels_source_with_receiver() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);

    let point = Point { x: 1, y: 2 };
    let same = point.dump_with(&dumper, None);
    assert_eq!(same.x, 1);
    dumper.flush().await;

    let payloads = recorder.payloads.lock().clone();
    assert_eq!(payloads[0]["source"], json!("point"));
}

#[tokio::test]
async fn source_formatter_rewrites_label() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);
    dumper.configure(|config| {
        config.source_format = Some(SourceFormatter::new(|line, accessor| {
            format!("[{}] {}", accessor.unwrap_or("dump"), line)
        }));
    });

    let totals = vec![1, 2, 3];
    totals.dump_with(&dumper, Some("Totals"));
    dumper.flush().await;

    let payloads = recorder.payloads.lock().clone();
    assert_eq!(payloads[0]["source"], json!("[dump_with] totals"));
    assert_eq!(payloads[0]["title"], json!("Totals"));
}

#[tokio::test]
async fn missing_source_file_drops_label() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);
    let dir = tempfile::tempdir().unwrap();
    dumper.configure(|config| config.source_root = Some(dir.path().to_path_buf()));

    dumper.dump(&1u8, None).await.unwrap();

    let payloads = recorder.payloads.lock().clone();
    assert_eq!(payloads[0], json!({"$type": "dump-container", "$value": 1}));
}

#[tokio::test]
async fn value_is_snapshotted_at_dump_time() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);
    dumper.configure(|config| config.source = false);

    let mut rows = vec!["a"];
    let pending = dumper.dump(&rows, None);
    rows.push("b");
    pending.await.unwrap();

    assert_eq!(
        recorder.payloads.lock()[0]["$value"],
        json!({"$type": "sequence", "$values": ["a"]})
    );
}

#[tokio::test]
async fn configured_endpoint_applies_to_later_items() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);

    dumper.dump(&1u8, None);
    dumper.configure(|config| config.port = 6100);
    dumper.clear().await.unwrap();

    assert_eq!(
        *recorder.endpoints.lock(),
        vec![Endpoint::local(5255), Endpoint::local(6100)]
    );
}

#[tokio::test]
async fn clear_supersedes_unsent_dumps() {
    let (recorder, gate) = Recorder::gated();
    let dumper = Dumper::new(DumpConfig::default(), recorder.clone()).unwrap();
    dumper.configure(|config| config.source = false);

    let first = dumper.dump("first", None);
    let second = dumper.dump("second", None);
    recorder.wait_for("start:first").await;

    let clear = dumper.clear();
    assert_eq!(dumper.pending(), 2);
    second.await.unwrap();

    gate.add_permits(2);
    first.await.unwrap();
    clear.await.unwrap();
    assert_eq!(
        recorder.entries(),
        vec!["start:first", "end:first", "start:clear", "end:clear"]
    );
}

#[tokio::test]
async fn markup_goes_through_queue() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);

    dumper
        .dump_markup("<h1>Report</h1>", Some("Report"))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(
        recorder.payloads.lock()[0],
        json!({
            "$type": "dump-container",
            "$value": {"$type": "html", "$html": "<h1>Report</h1>"},
            "title": "Report"
        })
    );
}

#[tokio::test]
async fn renderer_bypasses_transport() {
    let recorder = Recorder::new();
    let renderer = CapturingRenderer::default();
    let dumper = dumper(&recorder).with_renderer(renderer.clone());

    dumper.dump(&true, Some("flag")).await.unwrap();
    dumper.dump_markup("<p/>", None).unwrap().await.unwrap();
    dumper.clear().await.unwrap();

    assert!(matches!(
        dumper.dump_markup(vec![0xffu8], None),
        Err(Error::InvalidMarkup(_))
    ));
    assert_eq!(
        *renderer.calls.lock(),
        vec!["data:flag:true", "markup:<p/>", "clear"]
    );
    assert!(recorder.entries().is_empty());
    assert_eq!(dumper.pending(), 0);
}

#[tokio::test]
async fn shutdown_drains_queue() {
    let recorder = Recorder::new();
    let dumper = dumper(&recorder);
    dumper.configure(|config| config.source = false);

    for n in 0..5u32 {
        dumper.dump(&n.to_string(), None);
    }
    dumper.shutdown().await;

    assert_eq!(recorder.payloads.lock().len(), 5);
    assert_eq!(recorder.entries().last().map(String::as_str), Some("end:4"));
}
