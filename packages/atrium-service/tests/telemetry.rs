use serde_json::{Value, json};

use atrium_service::{
	RecordTelemetryRequest, TelemetryMetadata, TelemetryQuery, TelemetryStatsQuery, telemetry,
};

fn call(session_id: &str, agent_id: &str, input: i64, output: i64) -> RecordTelemetryRequest {
	RecordTelemetryRequest {
		session_id: session_id.to_string(),
		agent_id: agent_id.to_string(),
		model_used: "model-a".to_string(),
		tool_choice: Some("auto".to_string()),
		input_tokens: input,
		output_tokens: output,
		input_rate: 3.0,
		output_rate: 15.0,
		role_name: Some("planner".to_string()),
		..Default::default()
	}
}

#[tokio::test]
async fn query_without_matches_is_an_empty_success() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();
	let envelope = telemetry::query(&db, &cfg.telemetry, &TelemetryQuery::default()).await;

	assert_eq!(
		serde_json::to_value(&envelope).expect("serialize"),
		json!({ "success": true, "data": [] })
	);
}

#[tokio::test]
async fn recorded_calls_are_queryable_newest_first() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();
	let first = telemetry::record(&db, &cfg.telemetry, &call("s-1", "agent-1", 1_000_000, 0)).await;
	let second =
		telemetry::record(&db, &cfg.telemetry, &call("s-1", "agent-2", 0, 1_000_000)).await;
	let _other = telemetry::record(&db, &cfg.telemetry, &call("s-2", "agent-1", 10, 10)).await;

	assert!(first.success, "record failed: {:?}", first.error);
	assert!(second.success, "record failed: {:?}", second.error);

	let first_id = first.data.expect("recorded id").id;

	assert!(first_id.starts_with("tel_"), "id {first_id}");

	// Same-second inserts share a timestamp; pin them apart so ordering is observable.
	sqlx::query("UPDATE agent_telemetry SET timestamp = timestamp - 60 WHERE id = ?")
		.bind(first_id.as_str())
		.execute(&db.pool)
		.await
		.expect("Failed to age record.");

	let query = TelemetryQuery { session_id: Some("s-1".to_string()), ..Default::default() };
	let envelope = telemetry::query(&db, &cfg.telemetry, &query).await;

	assert!(envelope.success);
	assert_eq!(envelope.data.len(), 2);
	assert_eq!(envelope.data[1].id, first_id);
	assert_eq!(envelope.data[0].agent_id.as_deref(), Some("agent-2"));
	assert!((envelope.data[0].computed_cost_usd - 15.0).abs() < 1e-9);
	assert!((envelope.data[1].computed_cost_usd - 3.0).abs() < 1e-9);
	assert_eq!(envelope.data[0].tenant_id, "tenant-test");
	assert_eq!(envelope.data[0].metric_type, "cost");
	assert_eq!(envelope.data[0].metric_name, "llm_call");

	match &envelope.data[0].metadata {
		TelemetryMetadata::Billing(billing) => {
			assert_eq!(billing.billing_email, "billing@example.com");
			assert_eq!(billing.operator, "ops-test");
		},
		other => panic!("Expected billing metadata, got {other:?}."),
	}

	let limited = TelemetryQuery { limit: Some(1), ..Default::default() };

	assert_eq!(telemetry::query(&db, &cfg.telemetry, &limited).await.data.len(), 1);

	let other_tenant =
		TelemetryQuery { tenant_id: Some("tenant-other".to_string()), ..Default::default() };

	assert!(telemetry::query(&db, &cfg.telemetry, &other_tenant).await.data.is_empty());
}

#[tokio::test]
async fn time_range_bounds_are_inclusive() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();
	let recorded = telemetry::record(&db, &cfg.telemetry, &call("s-1", "agent-1", 1, 1)).await;
	let id = recorded.data.expect("recorded id").id;

	sqlx::query("UPDATE agent_telemetry SET timestamp = 1000 WHERE id = ?")
		.bind(id.as_str())
		.execute(&db.pool)
		.await
		.expect("Failed to pin timestamp.");

	let inside = TelemetryQuery {
		start_timestamp: Some(1000),
		end_timestamp: Some(1000),
		..Default::default()
	};
	let outside = TelemetryQuery { start_timestamp: Some(1001), ..Default::default() };

	assert_eq!(telemetry::query(&db, &cfg.telemetry, &inside).await.data.len(), 1);
	assert!(telemetry::query(&db, &cfg.telemetry, &outside).await.data.is_empty());
}

#[tokio::test]
async fn invalid_counts_are_rejected_without_insert() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();
	let envelope = telemetry::record(&db, &cfg.telemetry, &call("s-1", "agent-1", -5, 0)).await;

	assert!(!envelope.success);
	assert!(envelope.data.is_none());
	assert!(envelope.error.as_deref().is_some_and(|err| err.contains("input_tokens")));

	let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM agent_telemetry")
		.fetch_one(&db.pool)
		.await
		.expect("Failed to count rows.");

	assert_eq!(count, 0);
}

#[tokio::test]
async fn stats_aggregate_matching_rows() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();
	let mut cached = call("s-1", "agent-1", 1_000_000, 1_000_000);

	cached.cache_read_input_tokens = Some(500_000);
	cached.cache_read_rate = Some(0.3);

	for req in [cached, call("s-1", "agent-2", 2_000_000, 0), call("s-2", "agent-1", 5, 5)] {
		assert!(telemetry::record(&db, &cfg.telemetry, &req).await.success);
	}

	let query = TelemetryStatsQuery { session_id: Some("s-1".to_string()), agent_id: None };
	let envelope = telemetry::stats(&db, &cfg.telemetry, &query).await;
	let stats = envelope.data.expect("stats");

	assert_eq!(stats.total_calls, 2);
	assert_eq!(stats.total_input_tokens, Some(3_000_000));
	assert_eq!(stats.total_output_tokens, Some(1_000_000));
	assert_eq!(stats.total_cache_read_tokens, Some(500_000));
	assert_eq!(stats.total_cache_write_tokens, Some(0));

	let total = stats.total_cost_usd.expect("total cost");

	assert!((total - (3.0 + 15.0 + 0.15 + 6.0)).abs() < 1e-9, "total {total}");
	assert!((stats.avg_cost_per_call.expect("avg") - total / 2.0).abs() < 1e-9);
	assert!(stats.first_call_timestamp.is_some());
}

#[tokio::test]
async fn stats_without_matches_keep_null_aggregates() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();
	let envelope = telemetry::stats(&db, &cfg.telemetry, &TelemetryStatsQuery::default()).await;
	let json = serde_json::to_value(&envelope).expect("serialize");

	assert_eq!(json["success"], Value::Bool(true));
	assert_eq!(json["data"]["total_calls"], json!(0));
	assert_eq!(json["data"]["total_cost_usd"], Value::Null);
	assert_eq!(json["data"]["last_call_timestamp"], Value::Null);
}

#[tokio::test]
async fn store_failure_becomes_failed_envelope() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();

	sqlx::query("DROP TABLE agent_telemetry")
		.execute(&db.pool)
		.await
		.expect("Failed to drop table.");

	let envelope = telemetry::query(&db, &cfg.telemetry, &TelemetryQuery::default()).await;

	assert!(!envelope.success);
	assert!(envelope.data.is_empty());
	assert!(envelope.error.as_deref().is_some_and(|err| err.contains("agent_telemetry")));
}

#[tokio::test]
async fn empty_filters_read_as_absent() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();

	for req in [call("s-1", "agent-1", 1, 1), call("s-2", "agent-2", 1, 1)] {
		assert!(telemetry::record(&db, &cfg.telemetry, &req).await.success);
	}

	let query = TelemetryQuery {
		tenant_id: Some(String::new()),
		session_id: Some(String::new()),
		agent_id: Some(String::new()),
		..Default::default()
	};

	assert_eq!(telemetry::query(&db, &cfg.telemetry, &query).await.data.len(), 2);

	let stats_query =
		TelemetryStatsQuery { session_id: Some(String::new()), agent_id: Some(String::new()) };
	let stats = telemetry::stats(&db, &cfg.telemetry, &stats_query).await.data.expect("stats");

	assert_eq!(stats.total_calls, 2);
}

#[tokio::test]
async fn hosted_rows_without_token_counts_stay_null() {
	let db = atrium_testkit::memory_db().await.expect("Failed to open test database.");
	let cfg = atrium_testkit::sample_config();

	sqlx::query(
		"INSERT INTO agent_telemetry (id, tenant_id, metric_type, metric_name, timestamp) \
		 VALUES ('tel_hosted', ?, 'cost', 'llm_call', 5)",
	)
	.bind(cfg.telemetry.tenant_id.as_str())
	.execute(&db.pool)
	.await
	.expect("Failed to insert hosted row.");

	let envelope = telemetry::query(&db, &cfg.telemetry, &TelemetryQuery::default()).await;

	assert!(envelope.success, "query failed: {:?}", envelope.error);
	assert_eq!(envelope.data.len(), 1);
	assert_eq!(envelope.data[0].input_tokens, None);
	assert_eq!(envelope.data[0].output_tokens, None);

	let json = serde_json::to_value(&envelope.data[0]).expect("serialize");

	assert_eq!(json["input_tokens"], Value::Null);
	assert_eq!(json["cache_read_input_tokens"], json!(0));
}
