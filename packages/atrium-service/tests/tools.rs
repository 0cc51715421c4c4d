use std::sync::Arc;

use serde_json::{Value, json};

use atrium_objects::{BucketEntry, BucketRegistry, MemoryBucket, ObjectStore};
use atrium_service::{
	AtriumService, BucketListRequest, BucketSearchRequest, BucketSummaryRequest, DB_NOT_BOUND,
	Error, HumanContextAddRequest, HumanContextListRequest,
};
use atrium_storage::db::Db;
use atrium_testkit::FailingBucket;

const SEARCH_KEYS: [&str; 3] = ["logs/a.json", "logs/b.txt", "img/a.json"];

fn registry(files: Arc<dyn ObjectStore>) -> BucketRegistry {
	BucketRegistry::new(
		vec![
			BucketEntry::bound("agent-files", files).with_aliases(["MCP_BUCKET"]),
			BucketEntry::unbound("cold-archive"),
		],
		Some("agent-files".to_string()),
	)
}

fn service(db: Option<Db>, buckets: BucketRegistry) -> AtriumService {
	AtriumService::new(atrium_testkit::sample_config(), db, buckets)
}

fn parse(text: &str) -> Value {
	serde_json::from_str(text).unwrap_or_else(|err| panic!("Expected JSON, got {text:?}: {err}."))
}

#[tokio::test]
async fn search_uses_inventory_with_prefix_and_suffix() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");

	for key in SEARCH_KEYS {
		sqlx::query(
			"INSERT INTO r2_object_inventory (bucket_name, object_key, size_bytes, last_modified_iso) VALUES ('agent-files', ?, 10, '2026-01-01T00:00:00Z')",
		)
		.bind(key)
		.execute(&db.pool)
		.await
		.expect("Failed to insert inventory row.");
	}

	let service = service(Some(db), registry(Arc::new(MemoryBucket::new())));
	let text = service
		.bucket_search(BucketSearchRequest {
			prefix: Some("logs/".to_string()),
			suffix: Some(".json".to_string()),
			..Default::default()
		})
		.await
		.expect("search");
	let body = parse(&text);

	assert_eq!(body["source"], json!("r2_object_inventory"));
	assert_eq!(body["rows"].as_array().map(Vec::len), Some(1));
	assert_eq!(body["rows"][0]["object_key"], json!("logs/a.json"));
	assert_eq!(body["rows"][0]["bucket_name"], json!("agent-files"));
}

#[tokio::test]
async fn search_treats_like_wildcards_literally() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");

	for key in ["logs_x/a.json", "logsAx/a.json"] {
		sqlx::query(
			"INSERT INTO r2_object_inventory (bucket_name, object_key, size_bytes) VALUES ('agent-files', ?, 1)",
		)
		.bind(key)
		.execute(&db.pool)
		.await
		.expect("Failed to insert inventory row.");
	}

	let service = service(Some(db), registry(Arc::new(MemoryBucket::new())));
	let text = service
		.bucket_search(BucketSearchRequest {
			bucket: Some("MCP_BUCKET".to_string()),
			prefix: Some("logs_".to_string()),
			..Default::default()
		})
		.await
		.expect("search");
	let body = parse(&text);

	assert_eq!(body["rows"].as_array().map(Vec::len), Some(1));
	assert_eq!(body["rows"][0]["object_key"], json!("logs_x/a.json"));
}

#[tokio::test]
async fn search_falls_back_to_listing_without_database() {
	let files = Arc::new(MemoryBucket::with_objects(SEARCH_KEYS.map(|key| (key, 7))));
	let service = service(None, registry(files));
	let text = service
		.bucket_search(BucketSearchRequest {
			prefix: Some("logs/".to_string()),
			suffix: Some(".json".to_string()),
			..Default::default()
		})
		.await
		.expect("search");
	let body = parse(&text);

	assert_eq!(body["source"], json!("r2_list"));
	assert_eq!(body["bucket"], json!("agent-files"));
	assert_eq!(body["count"], json!(1));
	assert_eq!(body["objects"][0]["key"], json!("logs/a.json"));
	assert_eq!(body["objects"][0]["size"], json!(7));
}

#[tokio::test]
async fn search_falls_back_when_inventory_is_missing() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");

	sqlx::query("DROP TABLE r2_object_inventory")
		.execute(&db.pool)
		.await
		.expect("Failed to drop inventory.");

	let files = Arc::new(MemoryBucket::with_objects(SEARCH_KEYS.map(|key| (key, 1))));
	let service = service(Some(db), registry(files));
	let text = service
		.bucket_search(BucketSearchRequest {
			suffix: Some(".txt".to_string()),
			..Default::default()
		})
		.await
		.expect("search");
	let body = parse(&text);

	assert_eq!(body["source"], json!("r2_list"));
	assert_eq!(body["objects"][0]["key"], json!("logs/b.txt"));
}

#[tokio::test]
async fn search_without_any_bound_bucket_reports_it() {
	let buckets = BucketRegistry::new(vec![BucketEntry::unbound("cold-archive")], None);
	let text = service(None, buckets)
		.bucket_search(BucketSearchRequest::default())
		.await
		.expect("search");

	assert_eq!(text, "No bucket bound for search");
}

#[tokio::test]
async fn search_limit_out_of_range_is_rejected() {
	let result = service(None, registry(Arc::new(MemoryBucket::new())))
		.bucket_search(BucketSearchRequest { limit: Some(201), ..Default::default() })
		.await;

	assert!(matches!(result, Err(Error::InvalidRequest { .. })));
}

#[tokio::test]
async fn summary_isolates_a_failing_bucket() {
	let healthy = MemoryBucket::with_objects([("a", 10), ("b", 20), ("c", 30)]);
	let flaky = MemoryBucket::with_objects((0..2_500).map(|i| (format!("k{i:05}"), 1)));
	let failing = Arc::new(FailingBucket::new(flaky, 1));
	let buckets = BucketRegistry::new(
		vec![
			BucketEntry::bound("agent-files", Arc::new(healthy)),
			BucketEntry::bound("site-assets", failing.clone()),
			BucketEntry::unbound("cold-archive"),
		],
		None,
	);
	let text = service(None, buckets)
		.bucket_summary(BucketSummaryRequest::default())
		.await
		.expect("summary");

	assert_eq!(
		parse(&text),
		json!({
			"agent-files": { "count": 3, "totalBytes": 60 },
			"site-assets": { "count": -1, "totalBytes": -1 },
			"cold-archive": { "count": 0, "totalBytes": 0 },
		})
	);
	assert_eq!(failing.calls(), 2);
}

#[tokio::test]
async fn summary_walks_every_page() {
	let many = MemoryBucket::with_objects((0..2_345).map(|i| (format!("obj/{i:05}"), 2)));
	let buckets = registry(Arc::new(many));
	let text = service(None, buckets)
		.bucket_summary(BucketSummaryRequest { bucket: Some("MCP_BUCKET".to_string()) })
		.await
		.expect("summary");

	assert_eq!(parse(&text), json!({ "agent-files": { "count": 2_345, "totalBytes": 4_690 } }));
}

#[tokio::test]
async fn list_reports_one_page() {
	let files =
		Arc::new(MemoryBucket::with_objects([("a/1", 1), ("a/2", 2), ("a/3", 3), ("b/1", 4)]));
	let service = service(None, registry(files));
	let text = service
		.bucket_list(BucketListRequest {
			bucket: "agent-files".to_string(),
			prefix: Some("a/".to_string()),
			limit: Some(2),
		})
		.await
		.expect("list");
	let body = parse(&text);

	assert_eq!(body["bucket"], json!("agent-files"));
	assert_eq!(body["truncated"], json!(true));
	assert_eq!(body["cursor"], json!("a/2"));
	assert_eq!(body["count"], json!(2));
	assert_eq!(body["objects"][1]["key"], json!("a/2"));
	assert!(body["objects"][0]["etag"].is_string());
}

#[tokio::test]
async fn list_handles_unbound_unknown_and_failing_buckets() {
	let failing = Arc::new(FailingBucket::new(MemoryBucket::new(), 0));
	let service = service(None, registry(failing));
	let unbound = service
		.bucket_list(BucketListRequest { bucket: "cold-archive".to_string(), ..Default::default() })
		.await
		.expect("list");

	assert_eq!(unbound, "Bucket cold-archive not bound");

	let unknown = service
		.bucket_list(BucketListRequest { bucket: "nope".to_string(), ..Default::default() })
		.await;

	assert!(matches!(unknown, Err(Error::InvalidRequest { .. })));

	let failed = service
		.bucket_list(BucketListRequest { bucket: "agent-files".to_string(), ..Default::default() })
		.await
		.expect("list");

	assert!(failed.starts_with("Bucket list failed: "), "got {failed}");
}

#[tokio::test]
async fn human_context_round_trip_newest_first() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let service = service(Some(db.clone()), BucketRegistry::default());

	for (topic, note) in [("deploys", "first"), ("deploys", "second"), ("billing", "third")] {
		let text = service
			.human_context_add(HumanContextAddRequest {
				note: note.to_string(),
				topic: Some(topic.to_string()),
				author: None,
			})
			.await
			.expect("add");

		assert_eq!(text, "human_context note added");
	}

	let text = service
		.human_context_list(HumanContextListRequest {
			topic: Some("deploys".to_string()),
			limit: None,
		})
		.await
		.expect("list");
	let notes = parse(&text);

	assert_eq!(notes.as_array().map(Vec::len), Some(2));
	assert_eq!(notes[0]["note"], json!("second"));
	assert_eq!(notes[0]["author"], json!("operator"));
	assert_eq!(notes[1]["note"], json!("first"));
}

#[tokio::test]
async fn database_tools_need_a_database() {
	let service = service(None, BucketRegistry::default());
	let listed =
		service.human_context_list(HumanContextListRequest::default()).await.expect("list");
	let added = service
		.human_context_add(HumanContextAddRequest {
			note: "hello".to_string(),
			..Default::default()
		})
		.await
		.expect("add");

	assert_eq!(listed, DB_NOT_BOUND);
	assert_eq!(added, DB_NOT_BOUND);

	let empty = service.human_context_add(HumanContextAddRequest::default()).await;

	assert!(matches!(empty, Err(Error::InvalidRequest { .. })));
}

#[test]
fn workers_text_reports_truncation() {
	let service = service(None, BucketRegistry::default());

	assert_eq!(service.list_workers(None).expect("workers"), "Workers: api, mcp, cron");
	assert_eq!(service.list_workers(Some(2)).expect("workers"), "Workers: api, mcp, and 1 more.");
	assert!(service.list_workers(Some(0)).is_err());
	assert_eq!(service.platform_info(), "Platform: atrium test deployment.");
}
