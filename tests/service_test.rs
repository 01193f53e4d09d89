mod common;

use common::*;
use semantic_sql::error::{QueryError, ValidationError};
use semantic_sql::intent::{QueryIntent, TimeRange};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const GOOD_SQL: &str = "SELECT f.title, SUM(p.amount) AS value FROM film f \
                        JOIN inventory i ON f.film_id = i.film_id \
                        JOIN rental r ON i.inventory_id = r.inventory_id \
                        JOIN payment p ON r.rental_id = p.rental_id \
                        GROUP BY f.title ORDER BY value DESC LIMIT 5";

#[tokio::test]
async fn test_ask_returns_rows_for_valid_sql() {
    let h = Harness::new(ScriptedGenerator::sql(GOOD_SQL), RecordingRepairer::replying("unused"));

    let response = h.service.ask("sakila", "top grossing films").await.unwrap();

    assert_eq!(response.sql, GOOD_SQL);
    assert!(!response.repaired);
    assert_eq!(response.rows.len(), 1);
    assert_eq!(h.repairer.calls(), 0);
    assert_eq!(h.executor.executed(), vec![GOOD_SQL.to_string()]);
}

#[tokio::test]
async fn test_ask_repairs_once() {
    let h = Harness::new(
        ScriptedGenerator::sql("SELECT f.budget FROM film f"),
        RecordingRepairer::replying(GOOD_SQL),
    );

    let response = h.service.ask("sakila", "top grossing films").await.unwrap();

    assert!(response.repaired);
    assert_eq!(response.sql, GOOD_SQL);
    let requests = h.repairer.requests.lock().unwrap().clone();
    assert_eq!(
        requests,
        vec![("SELECT f.budget FROM film f".to_string(), "UnknownColumn".to_string())]
    );
}

#[tokio::test]
async fn test_failed_repair_reports_both_errors_and_never_executes() {
    let h = Harness::new(
        ScriptedGenerator::sql("SELECT * FROM film JOIN payment ON film.film_id = payment.payment_id"),
        RecordingRepairer::replying("DELETE FROM payment"),
    );

    let err = h.service.ask("sakila", "revenue per film").await.unwrap_err();

    match err {
        QueryError::RepairExhausted { initial, repair, candidate_sql } => {
            assert_eq!(
                initial,
                ValidationError::InvalidJoin("film.film_id = payment.payment_id".to_string())
            );
            assert_eq!(repair, ValidationError::ForbiddenOperation("DELETE".to_string()));
            assert_eq!(candidate_sql, "DELETE FROM payment");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.repairer.calls(), 1);
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_generation_failure_is_terminal() {
    let h = Harness::new(ScriptedGenerator::failing("timeout"), RecordingRepairer::replying(GOOD_SQL));

    let err = h.service.ask("sakila", "anything").await.unwrap_err();

    assert!(matches!(err, QueryError::GenerationFailed(ref msg) if msg.contains("timeout")));
    assert_eq!(h.repairer.calls(), 0);
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_request_errors() {
    let h = Harness::new(ScriptedGenerator::sql(GOOD_SQL), RecordingRepairer::replying(GOOD_SQL));

    assert!(matches!(
        h.service.ask("sakila", "   ").await,
        Err(QueryError::InvalidRequest(_))
    ));
    assert!(matches!(
        h.service.ask("world", "films").await,
        Err(QueryError::UnknownDatabase(ref name)) if name == "world"
    ));
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.introspector.calls(), 0);
}

#[tokio::test]
async fn test_introspection_failure_is_not_cached() {
    let h = Harness::with_introspector(
        FakeIntrospector::failing(),
        ScriptedGenerator::sql(GOOD_SQL),
        RecordingRepairer::replying(GOOD_SQL),
    );

    for _ in 0..2 {
        let err = h.service.ask("sakila", "films").await.unwrap_err();
        assert!(matches!(
            err,
            QueryError::IntrospectionFailed { ref database, ref reason }
                if database == "sakila" && reason.contains("connection refused")
        ));
    }
    assert_eq!(h.introspector.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_requests_introspect_once() {
    let h = Arc::new(Harness::new(
        ScriptedGenerator::sql(GOOD_SQL),
        RecordingRepairer::replying(GOOD_SQL),
    ));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.schema("sakila").await.map(|s| s.table_count()) })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), 10);
    }
    assert_eq!(h.introspector.calls(), 1);

    assert!(h.service.clear_schema("sakila"));
    h.service.schema("sakila").await.unwrap();
    assert_eq!(h.introspector.calls(), 2);
}

#[tokio::test]
async fn test_ask_intent_compiles_joins_from_graph() {
    let h = Harness::new(ScriptedGenerator::sql(""), RecordingRepairer::replying("unused"));
    let intent = QueryIntent::new("Movies", "Revenue", TimeRange::AllTime, Some(5)).unwrap();

    let response = h.service.ask_intent("sakila", &intent).await.unwrap();

    assert_eq!(
        response.sql,
        "SELECT film.film_id, SUM(payment.amount) AS value FROM film \
         JOIN inventory ON film.film_id = inventory.film_id \
         JOIN rental ON inventory.inventory_id = rental.inventory_id \
         JOIN payment ON rental.rental_id = payment.rental_id \
         GROUP BY film.film_id ORDER BY value DESC LIMIT 5"
    );
    assert!(!response.repaired);
    assert_eq!(h.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_structural_errors_skip_repair() {
    let h = Harness::new(ScriptedGenerator::sql(""), RecordingRepairer::replying(GOOD_SQL));

    let unknown = QueryIntent::new("Planets", "Revenue", TimeRange::None, None).unwrap();
    assert!(matches!(
        h.service.ask_intent("sakila", &unknown).await,
        Err(QueryError::UnknownEntity(_))
    ));

    let mut semantics = semantic_sql::SemanticCatalog::sakila();
    semantics.entities.insert("Note".to_string(), "staff_notes".to_string());
    let schema = sakila_schema();
    let intent = QueryIntent::new("Note", "Revenue", TimeRange::None, None).unwrap();
    let err = semantic_sql::resolve(&intent, &semantics, &schema).unwrap_err();
    assert!(err.is_structural());
    assert!(matches!(err, QueryError::NoJoinPath { .. }));

    assert_eq!(h.repairer.calls(), 0);
    assert!(h.executor.executed().is_empty());
}

#[tokio::test]
async fn test_ask_semantic_parses_fenced_intent() {
    let h = Harness::new(
        ScriptedGenerator::intent(
            "```json\n{\"entity\": \"Users\", \"metric\": \"revenue\", \"time_range\": \"all_time\", \"limit\": 3}\n```",
        ),
        RecordingRepairer::replying("unused"),
    );

    let response = h.service.ask_semantic("sakila", "best customers").await.unwrap();

    assert_eq!(
        response.sql,
        "SELECT customer.customer_id, SUM(payment.amount) AS value FROM customer \
         JOIN payment ON customer.customer_id = payment.customer_id \
         GROUP BY customer.customer_id ORDER BY value DESC LIMIT 3"
    );
}

#[tokio::test]
async fn test_ask_semantic_rejects_malformed_intent() {
    let h = Harness::new(
        ScriptedGenerator::intent("{\"metric\": \"Revenue\"}"),
        RecordingRepairer::replying("unused"),
    );

    let err = h.service.ask_semantic("sakila", "best customers").await.unwrap_err();

    assert!(matches!(err, QueryError::InvalidIntent(_)));
    assert!(h.executor.executed().is_empty());
}
