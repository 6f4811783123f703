//! End-to-end harvest runs against real SQLite and redb stores
mod common;

use futures::FutureExt;
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chart_harvester::application::{harvest_with_source, run_and_release};
use chart_harvester::crawling::{CategoryEnd, DualSinkPersistor, HarvestPlan, Harvester};
use chart_harvester::domain::RecordDetails;
use chart_harvester::infrastructure::{BackupWriter, RedbDocumentStore, SqliteRelationalStore};
use chart_harvester::SourceKind;

use common::{FailingRelational, RecordingDocument, ScriptedSource, read_backup, test_config};

fn movie(id: usize, title: &str) -> Value {
    json!({
        "id": id.to_string(),
        "title": title,
        "score": "8.9",
        "vote_count": 1000 + id,
        "regions": ["中国大陆"],
        "types": ["剧情"],
        "actors": ["甲", "乙"],
        "url": format!("https://movie.douban.com/subject/{id}/"),
    })
}

fn movies(ids: std::ops::Range<usize>) -> Vec<Value> {
    ids.map(|id| movie(id, &format!("movie {id}"))).collect()
}

async fn open_stores(config: &chart_harvester::HarvestConfig) -> (SqliteRelationalStore, RedbDocumentStore) {
    let relational = SqliteRelationalStore::connect(&config.storage.database_url)
        .await
        .unwrap();
    let document = RedbDocumentStore::open(&config.storage.document_store_path).unwrap();
    (relational, document)
}

#[tokio::test]
async fn single_page_with_one_unidentified_record_accepts_two() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Netease, &[("3778678", "热歌榜")], 1500, None);
    let source = ScriptedSource::new(SourceKind::Netease, None).page(
        "3778678",
        0,
        vec![
            json!({"id": 186016, "name": "晴天", "artists": [{"name": "周杰伦", "id": 6452}], "duration": 269}),
            json!({"name": "missing id", "artists": []}),
            json!({"id": 185811, "name": "稻香", "ar": [{"name": "周杰伦", "id": 6452}], "dt": 223_000}),
        ],
    );

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    assert_eq!(report.total_accepted, 2);
    assert_eq!(report.categories[0].rejected, 1);
    assert_eq!(report.sink_failures.relational, 0);
    assert_eq!(report.sink_failures.document, 0);
    assert_eq!(report.backup, Ok(2));

    let backup = read_backup(&config, SourceKind::Netease);
    let ids: Vec<_> = backup.iter().map(|r| r.external_id.to_string()).collect();
    assert_eq!(ids, vec!["186016", "185811"]);
    assert_eq!(backup[1].rank, 3);

    let (relational, document) = open_stores(&config).await;
    for id in ["186016", "185811"] {
        assert_eq!(
            relational.count_by_external_id(SourceKind::Netease, id).await.unwrap(),
            1
        );
        assert!(document.get(SourceKind::Netease, id).unwrap().is_some());
    }
}

#[tokio::test]
async fn short_page_ends_the_category() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Douban, &[("11", "剧情")], 1200, Some(120));
    let source = ScriptedSource::new(SourceKind::Douban, Some(50)).page("11", 0, movies(0..37));
    let requests = source.request_log();

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    assert_eq!(report.total_accepted, 37);
    assert_eq!(*requests.lock().unwrap(), vec![("11".to_string(), 0)]);
    assert_eq!(report.categories[0].end, CategoryEnd::Exhausted);
}

#[tokio::test]
async fn full_pages_step_the_offset_by_page_size() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Douban, &[("11", "剧情")], 1200, Some(120));
    let source = ScriptedSource::new(SourceKind::Douban, Some(50))
        .page("11", 0, movies(0..50))
        .page("11", 50, movies(50..100))
        .page("11", 100, movies(100..150));
    let requests = source.request_log();

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    // per-category budget of 120 stops the third page part-way
    assert_eq!(report.total_accepted, 120);
    assert_eq!(report.categories[0].end, CategoryEnd::CategoryBudget);
    let offsets: Vec<_> = requests.lock().unwrap().iter().map(|(_, o)| *o).collect();
    assert_eq!(offsets, vec![0, 50, 100]);
}

#[tokio::test]
async fn empty_and_failed_categories_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        dir.path(),
        SourceKind::Douban,
        &[("1", "恐怖"), ("3", "奇幻"), ("5", "动作")],
        1200,
        None,
    );
    let source = ScriptedSource::new(SourceKind::Douban, Some(50))
        .page("1", 0, vec![])
        .failing("3", 0)
        .page("5", 0, movies(0..2));

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    assert_eq!(report.total_accepted, 2);
    let ends: Vec<_> = report.categories.iter().map(|c| c.end.clone()).collect();
    assert_eq!(ends[0], CategoryEnd::Empty);
    assert!(matches!(ends[1], CategoryEnd::FetchFailed(_)));
    assert_eq!(ends[2], CategoryEnd::Exhausted);
    assert_eq!(report.categories[0].accepted, 0);
    assert_eq!(report.categories[1].accepted, 0);
}

#[tokio::test]
async fn budgets_are_never_exceeded() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        dir.path(),
        SourceKind::Douban,
        &[("11", "剧情"), ("24", "喜剧"), ("5", "动作")],
        7,
        Some(3),
    );
    let source = ScriptedSource::new(SourceKind::Douban, Some(50))
        .page("11", 0, movies(0..10))
        .page("24", 0, movies(10..20))
        .page("5", 0, movies(20..30));
    let requests = source.request_log();

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    assert_eq!(report.total_accepted, 7);
    assert!(report.categories.iter().all(|c| c.accepted <= 3));
    assert_eq!(report.categories[2].accepted, 1);
    assert_eq!(report.categories[2].end, CategoryEnd::GlobalBudget);
    assert_eq!(requests.lock().unwrap().len(), 3);
    assert_eq!(read_backup(&config, SourceKind::Douban).len(), 7);
}

#[tokio::test]
async fn repeated_ids_across_categories_count_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(
        dir.path(),
        SourceKind::Douban,
        &[("11", "剧情"), ("13", "爱情")],
        1200,
        None,
    );
    let source = ScriptedSource::new(SourceKind::Douban, Some(50))
        .page("11", 0, movies(1..3))
        .page("13", 0, movies(2..4));

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    assert_eq!(report.total_accepted, 3);
    assert_eq!(report.categories[1].duplicates, 1);

    // the first sighting keeps its category
    let backup = read_backup(&config, SourceKind::Douban);
    let movie_2 = backup.iter().find(|r| r.external_id.as_str() == "2").unwrap();
    assert_eq!(movie_2.grouping_label, "剧情");
}

#[tokio::test]
async fn second_run_keeps_first_row_and_latest_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Douban, &[("11", "剧情")], 1200, None);

    let first = ScriptedSource::new(SourceKind::Douban, Some(50)).page("11", 0, vec![movie(1292052, "first title")]);
    harvest_with_source(&config, Box::new(first)).await.unwrap();

    let second = ScriptedSource::new(SourceKind::Douban, Some(50)).page("11", 0, vec![movie(1292052, "second title")]);
    let report = harvest_with_source(&config, Box::new(second)).await.unwrap();
    assert_eq!(report.total_accepted, 1);

    let (relational, document) = open_stores(&config).await;
    assert_eq!(
        relational.count_by_external_id(SourceKind::Douban, "1292052").await.unwrap(),
        1
    );
    let rows = relational.load_movies().await.unwrap();
    assert_eq!(rows[0].title.as_deref(), Some("first title"));

    let stored = document.get(SourceKind::Douban, "1292052").unwrap().unwrap();
    assert_eq!(stored.primary_label, "second title");
}

#[tokio::test]
async fn failing_relational_sink_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Douban, &[("11", "剧情")], 1200, None);

    let relational = Arc::new(FailingRelational::default());
    let document = Arc::new(RecordingDocument::default());
    let persistor = DualSinkPersistor::new(relational.clone(), document.clone());
    let source = ScriptedSource::new(SourceKind::Douban, Some(50)).page("11", 0, movies(0..4));
    let harvester = Harvester::new(
        Box::new(source),
        persistor.clone(),
        BackupWriter::new(config.backup_path(SourceKind::Douban)),
        HarvestPlan::from_config(&config.douban),
    );

    let report = run_and_release(harvester, &persistor).await;

    assert_eq!(report.total_accepted, 4);
    assert_eq!(report.sink_failures.relational, 4);
    assert_eq!(report.sink_failures.document, 0);
    assert_eq!(relational.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(document.documents.lock().unwrap().len(), 4);
    assert_eq!(read_backup(&config, SourceKind::Douban).len(), 4);
    assert!(relational.closed.load(Ordering::SeqCst));
    assert!(document.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn sinks_are_closed_when_the_harvest_panics() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Douban, &[("11", "剧情")], 1200, None);

    let relational = Arc::new(FailingRelational::default());
    let document = Arc::new(RecordingDocument::default());
    let persistor = DualSinkPersistor::new(relational.clone(), document.clone());
    let source = ScriptedSource::new(SourceKind::Douban, Some(50)).panicking("11", 0);
    let harvester = Harvester::new(
        Box::new(source),
        persistor.clone(),
        BackupWriter::new(config.backup_path(SourceKind::Douban)),
        HarvestPlan::from_config(&config.douban),
    );

    let outcome = AssertUnwindSafe(run_and_release(harvester, &persistor))
        .catch_unwind()
        .await;

    assert!(outcome.is_err());
    assert!(relational.closed.load(Ordering::SeqCst));
    assert!(document.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn alias_shapes_store_identical_songs() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Netease, &[("1", "A"), ("2", "B")], 1500, None);
    let source = ScriptedSource::new(SourceKind::Netease, None)
        .page("1", 0, vec![json!({"id": 10, "ar": [{"name": "X", "id": 1}], "dt": 215_000})])
        .page("2", 0, vec![json!({"id": 20, "artists": [{"name": "X", "id": 1}], "duration": 215})]);

    harvest_with_source(&config, Box::new(source)).await.unwrap();

    let backup = read_backup(&config, SourceKind::Netease);
    assert_eq!(backup.len(), 2);
    for record in &backup {
        assert_eq!(record.attribution, "X");
        assert!(matches!(
            record.details,
            RecordDetails::Song { artist_id: 1, duration_secs: 215, .. }
        ));
    }
}

#[tokio::test]
async fn unopenable_store_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), SourceKind::Douban, &[("11", "剧情")], 1200, None);
    // a directory where the redb file should be
    std::fs::create_dir_all(dir.path().join("blocked.redb")).unwrap();
    config.storage.document_store_path = dir.path().join("blocked.redb");

    let source = ScriptedSource::new(SourceKind::Douban, Some(50)).page("11", 0, movies(0..3));
    let requests = source.request_log();

    assert!(harvest_with_source(&config, Box::new(source)).await.is_err());
    assert!(requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn zero_song_ids_are_rejected_not_merged() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), SourceKind::Netease, &[("3778678", "热歌榜")], 1500, None);
    let source = ScriptedSource::new(SourceKind::Netease, None).page(
        "3778678",
        0,
        vec![
            json!({"id": 0, "name": "local file"}),
            json!({"id": 186016, "name": "晴天"}),
            json!({"id": 0, "name": "another local file"}),
        ],
    );

    let report = harvest_with_source(&config, Box::new(source)).await.unwrap();

    assert_eq!(report.total_accepted, 1);
    assert_eq!(report.categories[0].rejected, 2);
    assert_eq!(report.categories[0].duplicates, 0);

    let (relational, document) = open_stores(&config).await;
    assert_eq!(
        relational.count_by_external_id(SourceKind::Netease, "0").await.unwrap(),
        0
    );
    assert!(document.get(SourceKind::Netease, "0").unwrap().is_none());
}
