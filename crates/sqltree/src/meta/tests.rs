use super::*;
use crate::config::{ConnectionConfig, RoleConventions};
use crate::quote::MySqlQuoter;
use crate::testing::{ScriptedDriver, script_table};

fn departments() -> ScriptedDriver {
    script_table(
        ScriptedDriver::new(),
        "departments",
        &[
            ("id", "int(10) unsigned", "PRI", "auto_increment"),
            ("name", "varchar(64)", "", ""),
            ("budget", "decimal(10,2)", "", ""),
            ("active", "tinyint(1)", "", ""),
            ("kind", "enum('internal','external')", "", ""),
        ],
        &[],
    )
}

fn user_roles(driver: ScriptedDriver) -> ScriptedDriver {
    script_table(
        driver,
        "user_roles",
        &[
            ("user_id", "int(10)", "PRI", ""),
            ("role_id", "int(10)", "PRI", ""),
        ],
        &[("user_id", Some("users"), "id"), ("role_id", Some("roles"), "id")],
    )
}

#[test]
fn test_normalize_native_types() {
    assert_eq!(normalize_type("tinyint(1)").field_type, FieldType::Boolean);
    assert_eq!(normalize_type("bigint(20) unsigned").field_type, FieldType::Integer);
    assert_eq!(normalize_type("bigint(20) unsigned").maxlength, Some(20));
    assert_eq!(normalize_type("tinyint(4)").field_type, FieldType::Integer);
    assert_eq!(normalize_type("longtext").field_type, FieldType::String);
    assert_eq!(normalize_type("mediumblob").field_type, FieldType::Blob);
    assert_eq!(normalize_type("varchar(255)").maxlength, Some(255));
    assert_eq!(normalize_type("timestamp").field_type, FieldType::DateTime);
    assert_eq!(normalize_type("year(4)").field_type, FieldType::Year);
    assert_eq!(normalize_type("point").field_type, FieldType::Geometry);
    assert_eq!(normalize_type("mystery").field_type, FieldType::Unknown);

    let decimal = normalize_type("decimal(8,0)");
    assert_eq!((decimal.maxlength, decimal.decimals), (Some(8), Some(0)));

    let set = normalize_type("set('a','it''s','c,d')");
    assert_eq!(set.field_type, FieldType::Set);
    assert_eq!(set.values, vec!["a", "it's", "c,d"]);
    assert_eq!(set.maxlength, None);
}

#[tokio::test]
async fn test_fetch_metadata_infers_roles() {
    let conn = Connection::new(departments());
    let meta = conn.fetch_metadata("departments").await.unwrap();

    assert_eq!(meta.engine.as_deref(), Some("InnoDB"));
    assert_eq!(meta.collation.as_deref(), Some("utf8mb4_general_ci"));
    assert_eq!(meta.field_names(), vec!["id", "name", "budget", "active", "kind"]);
    assert_eq!(meta.role, TableRole::None);

    let id = meta.field("id").unwrap();
    assert!(id.is_primary && id.auto_increment && !id.required);
    assert!(id.has_role(FieldRole::Id));

    let name = meta.field("name").unwrap();
    assert!(name.required);
    assert!(name.has_role(FieldRole::Description));
    assert_eq!(name.maxlength, Some(64));

    let budget = meta.field("budget").unwrap();
    assert_eq!(budget.field_type, FieldType::Decimal);
    assert_eq!(budget.decimals, Some(2));

    assert!(meta.field("active").unwrap().has_role(FieldRole::Active));
    assert_eq!(meta.field("kind").unwrap().values, vec!["internal", "external"]);

    assert_eq!(meta.view, "*");
    assert_eq!(
        meta.overview.as_deref(),
        Some("`departments`.`id`, `departments`.`name`")
    );
    assert_eq!(
        meta.descview.as_deref(),
        Some("`departments`.`id`, `departments`.`name`, `departments`.`active` AS `role:active`")
    );
}

#[tokio::test]
async fn test_descview_without_active_uses_literal() {
    let driver = script_table(
        ScriptedDriver::new(),
        "tags",
        &[("id", "int(11)", "PRI", "auto_increment"), ("title", "varchar(20)", "", "")],
        &[],
    );
    let conn = Connection::new(driver);
    let meta = conn.fetch_metadata("tags").await.unwrap();
    assert_eq!(
        meta.descview.as_deref(),
        Some("`tags`.`id`, `tags`.`title`, 1 AS `role:active`")
    );
}

#[tokio::test]
async fn test_single_natural_key_gets_id_role() {
    let driver = script_table(
        ScriptedDriver::new(),
        "countries",
        &[("code", "char(2)", "PRI", ""), ("name", "varchar(40)", "", "")],
        &[],
    );
    let conn = Connection::new(driver);
    let meta = conn.fetch_metadata("countries").await.unwrap();
    assert!(meta.field("code").unwrap().has_role(FieldRole::Id));
    assert!(meta.field("code").unwrap().required);
}

#[tokio::test]
async fn test_junction_table_inferred_from_foreign_keys() {
    let conn = Connection::new(user_roles(ScriptedDriver::new()));
    let meta = conn.fetch_metadata("user_roles").await.unwrap();

    assert_eq!(meta.role, TableRole::Junction);
    assert_eq!(meta.parent.as_deref(), Some("users"));
    assert!(meta.field("user_id").unwrap().has_role(FieldRole::ParentKey));
    assert!(!meta.field("role_id").unwrap().has_role(FieldRole::ParentKey));
    assert!(meta.field_by_role(FieldRole::Id).is_none());
    assert_eq!(meta.primary_key(), vec!["user_id", "role_id"]);
    assert!(meta.warnings.is_empty());
    assert_eq!(meta.field("role_id").unwrap().foreign_table.as_deref(), Some("roles"));
}

#[tokio::test]
async fn test_junction_parent_skips_unresolvable_key() {
    let driver = script_table(
        ScriptedDriver::new(),
        "links",
        &[("a_id", "int(11)", "PRI", ""), ("b_id", "int(11)", "PRI", "")],
        &[("a_id", None, "id"), ("b_id", Some("shop.b"), "id")],
    );
    let conn = Connection::new(driver);
    let meta = conn.fetch_metadata("links").await.unwrap();
    assert_eq!(meta.role, TableRole::Junction);
    assert_eq!(meta.parent.as_deref(), Some("shop.b"));
    assert!(meta.field("b_id").unwrap().has_role(FieldRole::ParentKey));
}

#[tokio::test]
async fn test_unresolvable_junction_is_downgraded_with_warning() {
    let driver = script_table(
        ScriptedDriver::new(),
        "pairs",
        &[("left_id", "int(11)", "PRI", ""), ("right_id", "int(11)", "PRI", "")],
        &[("left_id", None, "id")],
    );
    let conn = Connection::new(driver);
    let meta = conn.fetch_metadata("pairs").await.unwrap();

    assert_eq!(meta.role, TableRole::None);
    assert_eq!(meta.parent, None);
    assert_eq!(meta.warnings.len(), 1);
    assert!(meta.warnings[0].contains("parentkey field 'left_id'"));
}

#[tokio::test]
async fn test_declared_junction_without_foreign_keys_is_downgraded() {
    let driver = script_table(
        ScriptedDriver::new(),
        "pairs",
        &[("left_id", "int(11)", "PRI", ""), ("right_id", "int(11)", "PRI", "")],
        &[],
    );
    let conn = Connection::new(driver)
        .with_config(ConnectionConfig::new().junction_table("pairs"));
    let meta = conn.fetch_metadata("pairs").await.unwrap();

    assert_eq!(meta.role, TableRole::None);
    assert!(meta.warnings[0].contains("doesn't have a parentkey field"));
}

#[tokio::test]
async fn test_plain_composite_key_is_not_a_junction() {
    let driver = script_table(
        ScriptedDriver::new(),
        "versions",
        &[("doc", "int(11)", "PRI", ""), ("rev", "int(11)", "PRI", "")],
        &[],
    );
    let conn = Connection::new(driver);
    let meta = conn.fetch_metadata("versions").await.unwrap();
    assert_eq!(meta.role, TableRole::None);
    assert!(meta.warnings.is_empty());
    assert!(meta.field_by_role(FieldRole::Id).is_none());
}

#[tokio::test]
async fn test_foreign_keys_can_be_disabled() {
    let driver = user_roles(ScriptedDriver::new());
    let conn = Connection::new(driver).with_config(ConnectionConfig::new().without_foreign_keys());
    let meta = conn.fetch_metadata("user_roles").await.unwrap();
    assert_eq!(meta.role, TableRole::None);
    assert_eq!(conn.driver().count("INFORMATION_SCHEMA"), 0);
}

#[tokio::test]
async fn test_primary_key_is_cached_per_key() {
    let conn = Connection::new(user_roles(departments()));

    let pk = conn.get_primary_key("departments", false, false).await.unwrap();
    assert_eq!(pk, vec!["id"]);
    let pk = conn.get_primary_key("departments", false, true).await.unwrap();
    assert_eq!(pk, vec!["`departments`.`id`"]);
    assert_eq!(conn.driver().count("WHERE `Key` = 'PRI'"), 1);

    // auto_increment_only is a separate cache entry
    let auto = conn.get_primary_key("user_roles", true, false).await.unwrap();
    assert!(auto.is_empty());
    let all = conn.get_primary_key("user_roles", false, false).await.unwrap();
    assert_eq!(all, vec!["user_id", "role_id"]);
    assert_eq!(conn.driver().count("WHERE `Key` = 'PRI'"), 3);

    conn.clear_metadata_cache(Some("departments"));
    conn.get_primary_key("departments", false, false).await.unwrap();
    conn.get_primary_key("user_roles", false, false).await.unwrap();
    assert_eq!(conn.driver().count("FROM `departments` WHERE `Key` = 'PRI'"), 2);
    assert_eq!(conn.driver().count("FROM `user_roles` WHERE `Key` = 'PRI'"), 2);
}

#[tokio::test]
async fn test_metadata_is_cached_until_cleared() {
    let conn = Connection::new(departments());
    conn.fetch_metadata("departments").await.unwrap();
    conn.fetch_metadata("departments").await.unwrap();
    assert_eq!(conn.driver().count("SHOW TABLE STATUS"), 1);

    conn.clear_metadata_cache(None);
    conn.fetch_metadata("departments").await.unwrap();
    assert_eq!(conn.driver().count("SHOW TABLE STATUS"), 2);
}

#[tokio::test]
async fn test_quoted_and_bare_table_names_share_cache_entries() {
    let conn = Connection::new(departments());

    conn.get_primary_key("departments", false, false).await.unwrap();
    let pk = conn.get_primary_key("`departments`", false, true).await.unwrap();
    assert_eq!(pk, vec!["`departments`.`id`"]);
    conn.fetch_metadata("departments").await.unwrap();
    conn.fetch_metadata("`departments`").await.unwrap();
    assert_eq!(conn.driver().count("WHERE `Key` = 'PRI'"), 1);
    assert_eq!(conn.driver().count("SHOW TABLE STATUS"), 1);

    conn.clear_metadata_cache(Some("`departments`"));
    conn.get_primary_key("departments", false, false).await.unwrap();
    conn.fetch_metadata("departments").await.unwrap();
    assert_eq!(conn.driver().count("WHERE `Key` = 'PRI'"), 2);
    assert_eq!(conn.driver().count("SHOW TABLE STATUS"), 2);
}

#[tokio::test]
async fn test_missing_table_is_an_error_and_not_cached() {
    let driver = ScriptedDriver::new().on_rows(
        "SHOW TABLE STATUS LIKE 'nope'",
        &["Name", "Engine"],
        vec![],
    );
    let conn = Connection::new(driver);
    assert!(conn.fetch_metadata("nope").await.unwrap_err().is_usage());
    assert!(conn.fetch_metadata("nope").await.is_err());
    assert_eq!(conn.driver().count("SHOW TABLE STATUS"), 2);
}

#[tokio::test]
async fn test_metadata_driver_failure_is_query_error() {
    let driver = ScriptedDriver::new().on_error("SHOW FIELDS", "Table 'db.ghost' doesn't exist");
    let conn = Connection::new(driver);
    let err = conn.get_field_names("ghost").await.unwrap_err();
    assert!(err.is_query());
    assert_eq!(err.statement(), Some("SHOW FIELDS FROM `ghost`"));
}

#[tokio::test]
async fn test_table_listing_and_info() {
    let driver = departments()
        .on_rows("SHOW TABLES", &["Tables_in_shop"], vec![vec!["departments".into()], vec!["employees".into()]])
        .on_rows("SELECT DATABASE()", &["DATABASE()"], vec![vec!["shop".into()]]);
    let conn = Connection::new(driver);

    assert_eq!(conn.get_table_names().await.unwrap(), vec!["departments", "employees"]);
    assert_eq!(conn.get_db_name().await.unwrap().as_deref(), Some("shop"));
    assert_eq!(
        conn.get_field_names("departments").await.unwrap(),
        vec!["id", "name", "budget", "active", "kind"]
    );

    let info = conn.get_table_info("departments").await.unwrap().unwrap();
    assert_eq!(info.get("engine"), Some(&Value::from("InnoDB")));
    assert!(info.contains_key("row_format"));
}

#[test]
fn test_custom_role_conventions() {
    let mut meta = TableMetadata::new("posts");
    let mut id = FieldMetadata::new("posts", "id");
    id.is_primary = true;
    id.roles.insert(FieldRole::Id);
    let mut headline = FieldMetadata::new("posts", "headline");
    headline.field_type = FieldType::String;
    let mut live = FieldMetadata::new("posts", "live");
    live.field_type = FieldType::Boolean;
    meta.fields = vec![id, headline, live];

    let conventions = RoleConventions::new().description(["headline"]).active(["live"]);
    set_implicit_properties(&mut meta, &conventions, false, &MySqlQuoter);

    assert!(meta.field("headline").unwrap().has_role(FieldRole::Description));
    assert!(meta.field("live").unwrap().has_role(FieldRole::Active));
    assert_eq!(
        meta.descview.as_deref(),
        Some("`posts`.`id`, `posts`.`headline`, `posts`.`live` AS `role:active`")
    );
}

#[test]
fn test_metadata_sql_for_qualified_table() {
    let q = MySqlQuoter;
    assert_eq!(
        introspect::table_status_sql(&q, "shop.orders"),
        "SHOW TABLE STATUS FROM `shop` LIKE 'orders'"
    );
    assert!(introspect::foreign_keys_sql(&q, "shop.orders")
        .contains("`TABLE_SCHEMA` = 'shop' AND `TABLE_NAME` = 'orders'"));
    assert!(introspect::foreign_keys_sql(&q, "orders").contains("`TABLE_SCHEMA` = DATABASE()"));
    assert_eq!(
        introspect::primary_key_sql(&q, "orders", true).unwrap(),
        "SHOW FIELDS FROM `orders` WHERE `Key` = 'PRI' AND `Extra` = 'auto_increment'"
    );
}
