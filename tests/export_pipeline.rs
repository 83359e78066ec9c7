//! End-to-end export test: scripted record source, wiremock object storage,
//! real filesystem output.

use std::collections::BTreeMap;
use std::sync::Arc;

use corpus_bundler::{
    ClipSource, Config, Event, ExportPipeline, HttpClipStorage, Record, Result,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct VecSource(std::vec::IntoIter<Record>);

#[async_trait::async_trait]
impl ClipSource for VecSource {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.0.next())
    }
}

fn record(id: u64, locale: &str, client_id: &str, accent: &str) -> Record {
    let mut demographics = BTreeMap::new();
    demographics.insert("accent".to_string(), accent.to_string());
    demographics.insert("age".to_string(), "thirties".to_string());
    demographics.insert("gender".to_string(), "male".to_string());
    Record {
        id,
        locale: locale.to_string(),
        client_id: client_id.to_string(),
        sentence: format!("sentence number {id}"),
        path: format!("{locale}/{id}.mp3"),
        demographics,
    }
}

#[tokio::test]
async fn test_full_export_writes_tsv_clips_and_report() {
    let server = MockServer::start().await;
    let records = vec![
        record(1, "en", "alice", "us"),
        record(2, "en", "bob", "gb"),
        record(3, "de", "carol", ""),
    ];
    for r in &records {
        Mock::given(method("GET"))
            .and(path(format!("/clips/{}", r.path)))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(format!("audio {}", r.id).into_bytes()),
            )
            .expect(1)
            .mount(&server)
            .await;
    }

    let out_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.export.local_out_dir = out_dir.path().to_path_buf();
    config.clip_bucket.base_url = format!("{}/clips", server.uri());
    let config = Arc::new(config);

    let storage = Arc::new(HttpClipStorage::new(&config.clip_bucket.base_url).unwrap());
    let pipeline = ExportPipeline::new(config.clone(), storage);
    let mut events = pipeline.subscribe();

    let tsv_path = out_dir.path().join("clips.tsv");
    let sink = std::fs::File::create(&tsv_path).unwrap();
    let report = pipeline
        .run(VecSource(records.into_iter()), sink)
        .await
        .unwrap();

    // Report
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.clips_downloaded, 3);
    assert_eq!(report.locales["en"].clips, 2);
    assert_eq!(report.locales["en"].users, 2);
    assert_eq!(report.locales["de"].clips, 1);
    assert_eq!(report.locales["en"].splits["accent"]["us"], 0.5);

    // TSV: header plus one row per record, in source order
    let tsv = std::fs::read_to_string(&tsv_path).unwrap();
    let lines: Vec<&str> = tsv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("id\tclient_id\tpath\tsentence\tlocale"));
    assert!(lines[1].starts_with("1\t"));
    assert!(lines[2].starts_with("2\t"));
    assert!(lines[3].starts_with("3\t"));
    assert!(
        lines[1].contains("common_voice_en_1.mp3"),
        "path must be rewritten to the canonical filename: {}",
        lines[1]
    );
    assert!(
        !lines[1].contains("alice"),
        "client_id must be hashed by default: {}",
        lines[1]
    );

    // Clips on disk, under <out>/<locale>/clips/
    for (locale, id) in [("en", 1), ("en", 2), ("de", 3)] {
        let clip = out_dir
            .path()
            .join(locale)
            .join("clips")
            .join(format!("common_voice_{locale}_{id}.mp3"));
        assert_eq!(
            std::fs::read_to_string(&clip).unwrap(),
            format!("audio {id}"),
            "clip body mismatch at {}",
            clip.display()
        );
    }

    // Completion event observed
    let mut complete = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            Event::Complete {
                rows_read: 3,
                clips_downloaded: 3
            }
        ) {
            complete = true;
        }
    }
    assert!(complete, "a Complete event must be broadcast");
}

#[tokio::test]
async fn test_second_run_fetches_nothing_from_storage() {
    let server = MockServer::start().await;
    let make_records = || vec![record(1, "en", "alice", "us"), record(2, "en", "bob", "gb")];
    for r in &make_records() {
        Mock::given(method("GET"))
            .and(path(format!("/clips/{}", r.path)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"audio".to_vec()))
            .expect(1) // exactly once across BOTH runs
            .mount(&server)
            .await;
    }

    let out_dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.export.local_out_dir = out_dir.path().to_path_buf();
    config.clip_bucket.base_url = format!("{}/clips", server.uri());
    let config = Arc::new(config);
    let storage = Arc::new(HttpClipStorage::new(&config.clip_bucket.base_url).unwrap());

    let first = ExportPipeline::new(config.clone(), storage.clone())
        .run(
            VecSource(make_records().into_iter()),
            std::fs::File::create(out_dir.path().join("clips.tsv")).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.clips_downloaded, 2);

    let second = ExportPipeline::new(config, storage)
        .run(
            VecSource(make_records().into_iter()),
            std::fs::File::create(out_dir.path().join("clips.tsv")).unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(second.clips_downloaded, 0);
    assert_eq!(second.locales, first.locales);
    // MockServer asserts the expect(1) counts on drop.
}
