use leaf_sql::escape::{check, escape_raw_string};
use leaf_sql::prelude::*;
use leaf_sql::relation::{DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG};
use leaf_sql::statement::{batch_insert_at, delete_soft_where_at};
use pretty_assertions::assert_eq;

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_one_fragment_per_rendering_column() {
    let relation = ConditionRelation::new()
        .with("created_at", Operator::Ge, 100i64)
        .with("nickname", Operator::StrEq, "")
        .with("username", Operator::RightLike, "jetty")
        .with("created_at", Operator::Le, 200i64)
        .with("status", Operator::In, vec![1i64, 2, 3]);

    let clause = WhereClause::compile(&relation, "a").unwrap();
    assert_eq!(
        clause.fragments(),
        &[
            "a.created_at >= 100 AND a.created_at <= 200".to_string(),
            "a.username LIKE 'jetty%'".to_string(),
            "a.status IN (1,2,3)".to_string(),
        ]
    );
}

#[test]
fn test_soft_delete_filter_follows_exclusion_flag() {
    let ctx = SqlContext::default();
    let query = QueryDescriptor::new("users")
        .alias("u")
        .condition(ConditionRelation::new().with("age", Operator::Eq, 30i64));

    let sql = find_by_condition(&ctx, &query).unwrap();
    assert!(sql.contains("u.is_deleted = 0"));
    let sql = check_record_is_exists(&ctx, &query).unwrap();
    assert!(sql.contains("u.is_deleted = 0"));

    let query = query.condition(
        ConditionRelation::new()
            .with("age", Operator::Eq, 30i64)
            .with(DELETED_FLAG_FIELD, EXCLUSION_DELETED_FLAG, 1i64),
    );
    let sql = find_by_condition(&ctx, &query).unwrap();
    assert_eq!(sql, "SELECT u.* FROM users u WHERE (u.age = 30)");
    assert!(!check_record_is_exists(&ctx, &query).unwrap().contains("is_deleted"));
}

#[test]
fn test_string_sentinel_from_config() {
    let config = EngineConfig::builder().not_deleted_value_type("String").build();
    let ctx = config.context();
    let sql = find_by_condition(&ctx, &QueryDescriptor::new("t").alias("x")).unwrap();
    assert_eq!(sql, "SELECT x.* FROM t x WHERE (x.is_deleted = '0')");
}

#[test]
fn test_escape_raw_string_leaves_plain_text() {
    for text in ["", "hello world", "ünïcødé ✓", "100%_done"] {
        assert_eq!(escape_raw_string(text), text);
    }
    assert_eq!(escape_raw_string("a'b\"c\\d\n\r\0\x1a"), "a\\'b\\\"c\\\\d\\n\\r\\0\\Z");
}

#[test]
fn test_injection_heuristic() {
    assert!(check("SELECT * FROM users"));
    assert!(!check("hello world"));
}

#[test]
fn test_left_join_round_trip() {
    let ctx = SqlContext::default();
    let query = QueryDescriptor::new("users")
        .alias("u")
        .join(JoinSpec::new("LEFT", "orders", "o", "u").field("user_id", "id"));
    let sql = find_by_condition(&ctx, &query).unwrap();
    assert!(sql.contains("LEFT OUTER JOIN orders o ON o.user_id = u.id"));
}

#[test]
fn test_batch_insert_contract() {
    assert!(matches!(
        batch_insert("t", &[]),
        Err(SqlError::EmptyBatchInsert)
    ));

    let sql = batch_insert("t", &[row(&[("a", Value::Int(1))])]).unwrap();
    assert!(sql.starts_with("INSERT INTO t(`a`,`created_at`,`ext`) VALUES (1,"));
    assert!(sql.ends_with(",'{}')"));
}

#[test]
fn test_batch_insert_values_are_escaped() {
    // Quotes in inserted values are escaped the same way as in WHERE clauses.
    let rows = vec![row(&[
        ("name", Value::from("x'); DROP TABLE t; --")),
        ("ext", Value::from("{\"k\":\"v\"}")),
    ])];
    assert_eq!(
        batch_insert_at("t", &rows, 1).unwrap(),
        "INSERT INTO t(`name`,`ext`,`created_at`) VALUES ('x\\'); DROP TABLE t; --','{\\\"k\\\":\\\"v\\\"}',1)"
    );
}

#[test]
fn test_scalar_conditions() {
    let age = ConditionRelation::new().with("age", "EQ", 30i64);
    assert_eq!(WhereClause::compile(&age, "").unwrap().predicate(), "(age = 30)");

    let name = ConditionRelation::new().with("name", "STR_EQ", "bob");
    assert_eq!(WhereClause::compile(&name, "").unwrap().predicate(), "(name = 'bob')");
}

#[test]
fn test_set_conditions() {
    let numbers = ConditionRelation::new().with("id", "IN", vec![1i64, 2, 3]);
    assert_eq!(delete_where("t", &numbers).unwrap(), "DELETE FROM t WHERE (id IN (1,2,3))");

    let strings = ConditionRelation::new().with("code", "STR_IN", vec!["a", "b"]);
    assert_eq!(delete_where("t", &strings).unwrap(), "DELETE FROM t WHERE (code IN ('a','b'))");
}

#[test]
fn test_soft_delete_guards_deleted_rows() {
    let ctx = SqlContext::default();
    let condition = ConditionRelation::new().with("id", Operator::Eq, 4i64);
    assert_eq!(
        delete_soft_where_at(&ctx, "s_admin", &condition, 99).unwrap(),
        "UPDATE s_admin SET is_deleted = id, deleted_at = 99 WHERE (id = 4) AND (is_deleted = 0)"
    );
    // The caller's condition is not modified.
    assert_eq!(condition.len(), 1);
}

#[test]
fn test_parsed_cells_build_statements() {
    let ctx = SqlContext::default();
    let condition = leaf_sql::parse(["a.age GE 18", "a.name STR_NOT_EQ 'O''Brien'"]).unwrap();
    let query = QueryDescriptor::new("people").alias("a").condition(condition);
    assert_eq!(
        find_by_condition(&ctx, &query).unwrap(),
        "SELECT a.* FROM people a WHERE (a.age >= 18) AND (a.name != 'O\\'Brien') AND (a.is_deleted = 0)"
    );
}

#[test]
fn test_unknown_operator_is_a_hard_error() {
    let ctx = SqlContext::default();
    let query = QueryDescriptor::new("t")
        .condition(ConditionRelation::new().with("a", "SOUNDS_LIKE", "x"));
    assert!(matches!(
        find_by_condition(&ctx, &query),
        Err(SqlError::UnknownOperator(op)) if op == "SOUNDS_LIKE"
    ));
}
