mod common;

use chrono::NaiveDate;
use common::sakila_schema;
use semantic_sql::compile;
use semantic_sql::error::ValidationError;
use semantic_sql::intent::{QueryIntent, TimeRange};
use semantic_sql::planner::resolve_at;
use semantic_sql::schema::{MetricDefinition, Schema, SemanticCatalog};
use semantic_sql::validate;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
}

#[test]
fn test_every_catalog_intent_compiles_to_valid_sql() {
    let schema = sakila_schema();
    let semantics = SemanticCatalog::sakila();

    for entity in semantics.entity_names() {
        for metric in semantics.metric_names() {
            for time_range in [TimeRange::LastMonth, TimeRange::AllTime, TimeRange::None] {
                let intent = QueryIntent::new(entity, metric, time_range, Some(7)).unwrap();
                let plan = resolve_at(&intent, &semantics, &schema, today()).unwrap();

                for join in &plan.joins {
                    let stored = schema
                        .graph()
                        .edges(join.left_table(), join.right_table())
                        .any(|edge| &edge.join_on == join);
                    assert!(stored, "{} / {}: join {:?} is not a stored edge", entity, metric, join);
                }

                let sql = compile(&plan);
                assert_eq!(validate(&sql, &schema), Ok(()), "{}", sql);
            }
        }
    }
}

#[test]
fn test_movies_revenue_last_month() {
    let intent = QueryIntent::from_json(
        r#"{"entity": "Movies", "metric": "Revenue", "time_range": "last_month", "limit": 5}"#,
    )
    .unwrap();
    let plan = resolve_at(&intent, &SemanticCatalog::sakila(), &sakila_schema(), today()).unwrap();

    assert_eq!(
        compile(&plan),
        "SELECT film.film_id, SUM(payment.amount) AS value FROM film \
         JOIN inventory ON film.film_id = inventory.film_id \
         JOIN rental ON inventory.inventory_id = rental.inventory_id \
         JOIN payment ON rental.rental_id = payment.rental_id \
         WHERE payment.payment_date BETWEEN '2026-09-01' AND '2026-10-19' \
         GROUP BY film.film_id ORDER BY value DESC LIMIT 5"
    );
}

#[test]
fn test_validator_rejects_adversarial_candidates() {
    let schema = sakila_schema();
    let cases = [
        ("SELECT * FROM film; DROP TABLE film", "ForbiddenOperation"),
        ("select * from film where title = 'x' or 1=1; update film set title = ''", "ForbiddenOperation"),
        ("SELECT * FROM film; SELECT * FROM payment", "MultiStatement"),
        ("WITH x AS (SELECT 1) SELECT * FROM x", "NotASelect"),
        ("SELECT * FROM information_schema.tables", "UnknownTable"),
        ("SELECT * FROM film f JOIN (SELECT * FROM pg_shadow) s ON 1 = 1", "UnknownTable"),
        ("SELECT p.amount FROM payment", "UnknownAlias"),
        ("SELECT payment.password FROM payment", "UnknownColumn"),
        ("SELECT * FROM customer c JOIN payment p ON c.customer_id = p.payment_id", "InvalidJoin"),
        ("SELECT * FROM film CROSS JOIN payment", "InvalidJoin"),
    ];

    for (sql, kind) in cases {
        let err = validate(sql, &schema).expect_err(sql);
        assert_eq!(err.kind(), kind, "{}: {}", sql, err);
    }
}

#[test]
fn test_validator_accepts_harmless_variants() {
    let schema = sakila_schema();
    for sql in [
        "SELECT a.last_update FROM actor a",
        "select c.first_name, count(*) from customer as c join payment as p on p.customer_id = c.customer_id group by c.first_name;",
        "SELECT \"film\".\"title\" FROM \"film\"",
        "SELECT f.title FROM film f WHERE f.film_id IN (SELECT i.film_id FROM inventory i)",
        "SELECT EXTRACT(MONTH FROM r.rental_date) AS m, COUNT(*) FROM rental r GROUP BY 1",
    ] {
        assert_eq!(validate(sql, &schema), Ok(()), "{}", sql);
    }
}

#[test]
fn test_rejection_carries_offending_token() {
    let err = validate("SELECT film.budget FROM film", &sakila_schema()).unwrap_err();
    assert_eq!(err, ValidationError::UnknownColumn("film.budget".to_string()));
    assert_eq!(err.token(), "film.budget");
}

#[test]
fn test_reserved_and_mixed_case_tables_round_trip() {
    let schema = Schema::builder()
        .table("Customers", &["id", "name"])
        .table("order", &["order_id", "customer_id", "total", "placed_at"])
        .foreign_key("order", "customer_id", "Customers", "id")
        .build();
    let mut semantics = SemanticCatalog::default();
    semantics.entities.insert("Customers".to_string(), "Customers".to_string());
    semantics.entities.insert("Orders".to_string(), "order".to_string());
    semantics.metrics.insert("Count".to_string(), MetricDefinition::new("COUNT(*)", None, None));
    semantics.metrics.insert(
        "Spend".to_string(),
        MetricDefinition::new("SUM(\"order\".total)", Some("order"), Some("placed_at")),
    );

    let orders = QueryIntent::new("Orders", "Count", TimeRange::None, None).unwrap();
    let sql = compile(&resolve_at(&orders, &semantics, &schema, today()).unwrap());
    assert_eq!(
        sql,
        "SELECT \"order\".order_id, COUNT(*) AS value FROM \"order\" \
         GROUP BY \"order\".order_id ORDER BY value DESC LIMIT 10"
    );
    assert_eq!(validate(&sql, &schema), Ok(()), "{}", sql);

    let spend = QueryIntent::new("Customers", "Spend", TimeRange::LastMonth, None).unwrap();
    let sql = compile(&resolve_at(&spend, &semantics, &schema, today()).unwrap());
    assert_eq!(
        sql,
        "SELECT \"Customers\".id, SUM(\"order\".total) AS value FROM \"Customers\" \
         JOIN \"order\" ON \"Customers\".id = \"order\".customer_id \
         WHERE \"order\".placed_at BETWEEN '2026-09-01' AND '2026-10-19' \
         GROUP BY \"Customers\".id ORDER BY value DESC LIMIT 10"
    );
    assert_eq!(validate(&sql, &schema), Ok(()), "{}", sql);
}
