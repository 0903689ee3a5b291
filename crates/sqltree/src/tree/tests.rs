use super::*;
use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::DbError;
use crate::quote::MySqlQuoter;
use crate::result::{Cell, ColumnKind, Outcome, ResultSet, ResultShape};
use crate::testing::ScriptedDriver;
use crate::value::Value;

const Q: MySqlQuoter = MySqlQuoter;

const DEPARTMENTS: &str = "SELECT id, name, \
     (SELECT id, name FROM employees WHERE department_id = departments.id) \
     FROM departments";

fn rows(set: &ResultSet, column: &str) -> Vec<Value> {
    set.rows()
        .iter()
        .map(|r| r.value(column).cloned().unwrap_or_default())
        .collect()
}

async fn run(conn: &Connection<ScriptedDriver>, sql: &str) -> Result<Outcome, DbError> {
    let tree = extract_tree(sql, conn.quoter())?;
    conn.execute_tree(&tree).await
}

// ==================== Decomposition ====================

#[test]
fn test_decompose_filtered_child() {
    let tree = extract_tree(DEPARTMENTS, &Q).unwrap();

    assert_eq!(tree.statement_count(), 2);
    assert_eq!(tree.primary.sql(), "SELECT id, name FROM departments");
    assert_eq!(
        tree.slots,
        vec![Slot::Field(0), Slot::Field(1), Slot::Child(0)]
    );

    let child = &tree.children[0];
    assert!(child.filter);
    assert!(!child.scalar);
    assert_eq!(child.source_field, 0);
    assert_eq!(child.target_field, 2);
    assert_eq!(child.name, "employees");
    assert_eq!(
        child.tree.primary.sql(),
        "SELECT id, name, department_id FROM employees WHERE department_id IN (:tree_parent)"
    );
    assert_eq!(child.tree.key_field, Some(2));
}

#[test]
fn test_decompose_passthrough() {
    for sql in [
        "UPDATE departments SET name = 'x' WHERE id = 1",
        "SELECT id, (1 + 2) AS three FROM departments",
        "SELECT * FROM departments",
    ] {
        let tree = extract_tree(sql, &Q).unwrap();
        assert!(tree.is_passthrough(), "{sql}");
        assert_eq!(tree.statement_count(), 1);
        assert_eq!(tree.primary.sql(), sql);
    }
}

#[test]
fn test_decompose_adds_hidden_source_field() {
    let sql = "SELECT e.name, \
               (SELECT name FROM departments WHERE departments.id = e.department_id LIMIT 1) AS department \
               FROM employees AS e";
    let tree = extract_tree(sql, &Q).unwrap();

    assert_eq!(
        tree.primary.sql(),
        "SELECT e.name, e.department_id FROM employees AS e"
    );
    let child = &tree.children[0];
    assert!(!child.filter);
    assert!(child.scalar);
    assert_eq!(child.source_field, 1);
    assert_eq!(child.name, "department");
    // Raised so that a second match is seen.
    assert_eq!(
        child.tree.primary.sql(),
        "SELECT name FROM departments WHERE departments.id = :tree_parent LIMIT 2"
    );
    assert!(child.tree.is_passthrough());
}

#[test]
fn test_decompose_ordered_lookup_keeps_limit() {
    let sql = "SELECT id, \
               (SELECT id, title FROM reviews WHERE employee_id = employees.id ORDER BY created DESC LIMIT 1) AS latest \
               FROM employees";
    let tree = extract_tree(sql, &Q).unwrap();
    let child = &tree.children[0];
    assert!(!child.filter);
    assert!(!child.scalar);
    assert!(child.tree.primary.sql().ends_with("ORDER BY created DESC LIMIT 1"));
}

#[test]
fn test_decompose_nested_levels() {
    let sql = "SELECT id, \
               (SELECT id, (SELECT title FROM tasks WHERE tasks.employee_id = employees.id) AS tasks \
                FROM employees WHERE department_id = departments.id) AS employees \
               FROM departments";
    let tree = extract_tree(sql, &Q).unwrap();

    assert_eq!(tree.statement_count(), 3);
    let child = &tree.children[0];
    assert_eq!(
        child.tree.primary.sql(),
        "SELECT id, department_id FROM employees WHERE department_id IN (:tree_parent)"
    );
    let grandchild = &child.tree.children[0];
    assert_eq!(
        grandchild.tree.primary.sql(),
        "SELECT title, tasks.employee_id FROM tasks WHERE tasks.employee_id IN (:tree_parent)"
    );
}

#[test]
fn test_decompose_wildcard() {
    let sql = "SELECT d.*, (SELECT name FROM employees WHERE department_id = d.id) AS staff \
               FROM departments d";
    let tree = extract_tree(sql, &Q).unwrap();
    assert_eq!(tree.primary.sql(), "SELECT d.*, d.id FROM departments d");
    assert_eq!(tree.slots, vec![Slot::Wildcard(0), Slot::Child(0)]);
    assert_eq!(tree.children[0].source_field, 1);
}

#[test]
fn test_decompose_failures() {
    let cases = [
        // no correlation
        "SELECT id, (SELECT COUNT(*) FROM employees) AS n FROM departments",
        // correlated twice
        "SELECT id, (SELECT id FROM employees WHERE department_id = departments.id \
         AND manager_id = departments.head_id) AS e FROM departments",
        // not an equality
        "SELECT id, (SELECT id FROM employees WHERE department_id > departments.id) AS e FROM departments",
        // two wildcards
        "SELECT *, d.*, (SELECT id FROM employees WHERE department_id = d.id) AS e FROM departments d",
        // unbalanced
        "SELECT id, (SELECT id FROM employees WHERE department_id = departments.id FROM departments",
        // malformed grandchild
        "SELECT id, (SELECT id, (SELECT title FROM tasks) AS t FROM employees \
         WHERE department_id = departments.id) AS e FROM departments",
    ];
    for sql in cases {
        let err = extract_tree(sql, &Q).unwrap_err();
        assert!(err.is_parse(), "{sql}: {err}");
    }
}

#[test]
fn test_unsupported_correlation_message() {
    let sql = "SELECT id, (SELECT id FROM employees WHERE department_id > departments.id) AS e \
               FROM departments";
    let err = extract_tree(sql, &Q).unwrap_err();
    assert!(err.to_string().contains("Unsupported correlation"));
}

#[test]
fn test_correlation_inside_literal_is_ignored() {
    let sql = "SELECT id, (SELECT id FROM employees WHERE department_id = departments.id \
               AND note <> 'departments.x') AS e FROM departments";
    let tree = extract_tree(sql, &Q).unwrap();
    assert!(tree.children[0]
        .tree
        .primary
        .sql()
        .contains("department_id IN (:tree_parent) AND note <> 'departments.x'"));
}

#[test]
fn test_decompose_rejects_limits_of_batched_children() {
    for limit in ["LIMIT 3", "LIMIT 0, 1", "LIMIT 1 OFFSET 2"] {
        let sql = format!(
            "SELECT id, (SELECT name FROM employees WHERE department_id = departments.id \
             ORDER BY hired DESC {limit}) AS recent FROM departments"
        );
        let err = extract_tree(&sql, &Q).unwrap_err();
        assert!(err.is_parse(), "{limit}: {err}");
        assert!(err.to_string().contains("Unsupported"), "{limit}: {err}");
    }
}

#[test]
fn test_decompose_groups_aggregate_child_by_key() {
    let sql = "SELECT id, (SELECT COUNT(*) FROM employees WHERE department_id = departments.id) AS n \
               FROM departments";
    let tree = extract_tree(sql, &Q).unwrap();
    let child = &tree.children[0];
    assert!(child.filter);
    assert_eq!(
        child.tree.primary.sql(),
        "SELECT COUNT(*), department_id FROM employees \
         WHERE department_id IN (:tree_parent) GROUP BY department_id"
    );
}

#[test]
fn test_decompose_extends_child_group_by_with_key() {
    let sql = "SELECT id, (SELECT role, COUNT(*) AS n FROM employees \
               WHERE department_id = departments.id GROUP BY role ORDER BY role) AS roles \
               FROM departments";
    let tree = extract_tree(sql, &Q).unwrap();
    assert_eq!(
        tree.children[0].tree.primary.sql(),
        "SELECT role, COUNT(*) AS n, department_id FROM employees \
         WHERE department_id IN (:tree_parent) GROUP BY role, department_id ORDER BY role"
    );
}

#[test]
fn test_decompose_leaves_lookup_and_window_aggregates_ungrouped() {
    let lookup = "SELECT id, (SELECT MAX(salary) FROM employees \
                  WHERE department_id = departments.id LIMIT 1) AS top FROM departments";
    let tree = extract_tree(lookup, &Q).unwrap();
    assert_eq!(
        tree.children[0].tree.primary.sql(),
        "SELECT MAX(salary) FROM employees WHERE department_id = :tree_parent LIMIT 2"
    );

    let window = "SELECT id, (SELECT name, COUNT(*) OVER () AS n FROM employees \
                  WHERE department_id = departments.id) AS staff FROM departments";
    let tree = extract_tree(window, &Q).unwrap();
    assert!(!tree.children[0].tree.primary.sql().contains("GROUP BY"));
}

// ==================== Execution ====================

#[tokio::test]
async fn test_attach_children_by_correlation_value() {
    let driver = ScriptedDriver::new()
        .on_rows(
            "SELECT id, name FROM departments",
            &["id", "name"],
            vec![vec![1.into(), "Eng".into()], vec![2.into(), "Sales".into()]],
        )
        .on_rows(
            "FROM employees WHERE department_id IN (1, 2)",
            &["id", "name", "department_id"],
            // child order differs from parent order
            vec![
                vec![11.into(), "Bo".into(), 2.into()],
                vec![10.into(), "Amy".into(), 1.into()],
            ],
        );
    let conn = Connection::new(driver);

    let set = run(&conn, DEPARTMENTS).await.unwrap().into_result_set().unwrap();
    assert_eq!(set.shape(), ResultShape::Tree);
    let names: Vec<_> = set.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "employees"]);
    assert_eq!(set.columns()[2].kind, ColumnKind::Children);

    let eng = set.rows()[0].children("employees").unwrap();
    let sales = set.rows()[1].children("employees").unwrap();
    assert_eq!(rows(eng, "name"), vec![Value::from("Amy")]);
    assert_eq!(rows(sales, "name"), vec![Value::from("Bo")]);
    // hidden key field is not in the output
    assert!(eng.field_index("department_id").is_none());
    assert_eq!(conn.driver().executed().len(), 2);
}

#[tokio::test]
async fn test_unmatched_parent_gets_empty_set() {
    let driver = ScriptedDriver::new()
        .on_rows(
            "SELECT id, name FROM departments",
            &["id", "name"],
            vec![
                vec![1.into(), "Eng".into()],
                vec![2.into(), "Sales".into()],
                vec![Value::Null, "Limbo".into()],
            ],
        )
        .on_rows(
            "IN (1, 2)",
            &["id", "name", "department_id"],
            vec![vec![10.into(), "Amy".into(), "1".into()]],
        );
    let conn = Connection::new(driver);

    let set = run(&conn, DEPARTMENTS).await.unwrap().into_result_set().unwrap();
    // "1" from a text protocol matches the integer 1
    assert_eq!(set.rows()[0].children("employees").unwrap().len(), 1);
    assert!(set.rows()[1].children("employees").unwrap().is_empty());
    assert!(set.rows()[2].children("employees").unwrap().is_empty());
}

#[tokio::test]
async fn test_text_keys_match_like_default_collation() {
    let sql = "SELECT code, (SELECT name FROM staff WHERE dept_code = departments.code) AS staff \
               FROM departments";
    let driver = || {
        ScriptedDriver::new()
            .on_rows(
                "SELECT code FROM departments",
                &["code"],
                vec![vec!["ENG".into()]],
            )
            .on_rows(
                "FROM staff WHERE dept_code IN ('ENG')",
                &["name", "dept_code"],
                vec![vec!["Amy".into(), "eng ".into()]],
            )
    };

    let conn = Connection::new(driver());
    let set = run(&conn, sql).await.unwrap().into_result_set().unwrap();
    assert_eq!(rows(set.rows()[0].children("staff").unwrap(), "name"), vec![Value::from("Amy")]);

    let conn = Connection::new(driver())
        .with_config(ConnectionConfig::new().case_insensitive_keys(false));
    let set = run(&conn, sql).await.unwrap().into_result_set().unwrap();
    assert!(set.rows()[0].children("staff").unwrap().is_empty());
}

#[tokio::test]
async fn test_no_parent_rows_skips_children() {
    let driver = ScriptedDriver::new().on_rows(
        "SELECT id, name FROM departments",
        &["id", "name"],
        vec![],
    );
    let conn = Connection::new(driver);

    let set = run(&conn, DEPARTMENTS).await.unwrap().into_result_set().unwrap();
    assert!(set.is_empty());
    assert_eq!(conn.driver().count("employees"), 0);
}

#[tokio::test]
async fn test_lookup_memoized_per_value() {
    let sql = "SELECT id, name, \
               (SELECT name FROM departments WHERE departments.id = employees.department_id LIMIT 1) AS department \
               FROM employees";
    let driver = ScriptedDriver::new()
        .on_rows(
            "SELECT id, name, employees.department_id FROM employees",
            &["id", "name", "department_id"],
            vec![
                vec![1.into(), "Amy".into(), 10.into()],
                vec![2.into(), "Bo".into(), 10.into()],
                vec![3.into(), "Cy".into(), Value::Null],
                vec![4.into(), "Di".into(), 99.into()],
            ],
        )
        .on_rows(
            "WHERE departments.id = 10 LIMIT 2",
            &["name"],
            vec![vec!["Eng".into()]],
        )
        .on_rows("WHERE departments.id = 99 LIMIT 2", &["name"], vec![]);
    let conn = Connection::new(driver);

    let set = run(&conn, sql).await.unwrap().into_result_set().unwrap();
    let names: Vec<_> = set.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "department"]);
    assert_eq!(set.columns()[2].kind, ColumnKind::Lookup);
    assert_eq!(
        rows(&set, "department"),
        vec!["Eng".into(), "Eng".into(), Value::Null, Value::Null]
    );
    assert_eq!(conn.driver().count("departments.id = 10"), 1);
}

#[tokio::test]
async fn test_lookup_row() {
    let sql = "SELECT id, \
               (SELECT id, name FROM departments d WHERE d.id = e.department_id LIMIT 1) AS department \
               FROM employees e";
    let driver = ScriptedDriver::new()
        .on_rows(
            "SELECT id, e.department_id FROM employees e",
            &["id", "department_id"],
            vec![vec![1.into(), 10.into()]],
        )
        .on_rows(
            "WHERE d.id = 10 LIMIT 2",
            &["id", "name"],
            vec![vec![10.into(), "Eng".into()]],
        );
    let conn = Connection::new(driver);

    let set = run(&conn, sql).await.unwrap().into_result_set().unwrap();
    let department = set.rows()[0].get("department").and_then(Cell::as_row).unwrap();
    assert_eq!(department.value("name"), Some(&Value::from("Eng")));
}

#[tokio::test]
async fn test_lookup_with_several_matches_fails() {
    let sql = "SELECT id, \
               (SELECT name FROM departments WHERE departments.id = employees.department_id LIMIT 1) AS department \
               FROM employees";
    let driver = ScriptedDriver::new()
        .on_rows(
            "FROM employees",
            &["id", "department_id"],
            vec![vec![1.into(), 10.into()]],
        )
        .on_rows(
            "WHERE departments.id = 10 LIMIT 2",
            &["name"],
            vec![vec!["Eng".into()], vec!["Ops".into()]],
        );
    let conn = Connection::new(driver);

    let err = run(&conn, sql).await.unwrap_err();
    assert!(err.is_constraint(), "{err}");
}

#[tokio::test]
async fn test_nested_levels_attach() {
    let sql = "SELECT id, \
               (SELECT id, (SELECT title FROM tasks WHERE tasks.employee_id = employees.id) AS tasks \
                FROM employees WHERE department_id = departments.id) AS employees \
               FROM departments";
    let driver = ScriptedDriver::new()
        .on_rows("SELECT id FROM departments", &["id"], vec![vec![1.into()]])
        .on_rows(
            "FROM employees WHERE department_id IN (1)",
            &["id", "department_id"],
            vec![vec![10.into(), 1.into()], vec![11.into(), 1.into()]],
        )
        .on_rows(
            "FROM tasks WHERE tasks.employee_id IN (10, 11)",
            &["title", "employee_id"],
            vec![
                vec!["a".into(), 10.into()],
                vec!["b".into(), 11.into()],
                vec!["c".into(), 10.into()],
            ],
        );
    let conn = Connection::new(driver);

    let set = run(&conn, sql).await.unwrap().into_result_set().unwrap();
    let employees = set.rows()[0].children("employees").unwrap();
    assert_eq!(employees.len(), 2);
    let tasks = employees.rows()[0].children("tasks").unwrap();
    assert_eq!(rows(tasks, "title"), vec![Value::from("a"), Value::from("c")]);

    let json = set.to_json().unwrap();
    assert_eq!(json[0]["employees"][1]["tasks"][0]["title"], "b");
}

#[tokio::test]
async fn test_wildcard_columns_expand() {
    let sql = "SELECT d.*, (SELECT name FROM employees WHERE department_id = d.id) AS staff \
               FROM departments d";
    let driver = ScriptedDriver::new()
        .on_rows(
            "SELECT d.*, d.id FROM departments d",
            &["id", "name", "id"],
            vec![vec![1.into(), "Eng".into(), 1.into()]],
        )
        .on_rows(
            "WHERE department_id IN (1)",
            &["name", "department_id"],
            vec![vec!["Amy".into(), 1.into()]],
        );
    let conn = Connection::new(driver);

    let set = run(&conn, sql).await.unwrap().into_result_set().unwrap();
    let names: Vec<_> = set.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "name", "staff"]);
    assert_eq!(set.rows()[0].children("staff").unwrap().len(), 1);
}

fn two_children() -> &'static str {
    "SELECT id, \
     (SELECT name FROM employees WHERE department_id = departments.id) AS staff, \
     (SELECT title FROM projects WHERE department_id = departments.id) AS projects \
     FROM departments"
}

fn two_children_driver() -> ScriptedDriver {
    ScriptedDriver::new()
        .on_rows(
            "SELECT id FROM departments",
            &["id"],
            vec![vec![1.into()], vec![2.into()]],
        )
        .on_rows(
            "FROM employees WHERE department_id IN (1, 2)",
            &["name", "department_id"],
            vec![vec!["Amy".into(), 2.into()]],
        )
        .on_rows(
            "FROM projects WHERE department_id IN (1, 2)",
            &["title", "department_id"],
            vec![vec!["Apollo".into(), 1.into()]],
        )
}

#[tokio::test]
async fn test_children_run_concurrently_when_allowed() {
    let conn = Connection::new(two_children_driver().concurrent())
        .with_config(ConnectionConfig::new().concurrent_children(true));

    let set = run(&conn, two_children()).await.unwrap().into_result_set().unwrap();
    assert_eq!(set.rows()[0].children("projects").unwrap().len(), 1);
    assert!(set.rows()[0].children("staff").unwrap().is_empty());
    assert_eq!(set.rows()[1].children("staff").unwrap().len(), 1);
    assert_eq!(conn.driver().executed().len(), 3);
}

#[tokio::test]
async fn test_children_run_in_order_by_default() {
    let conn = Connection::new(two_children_driver());

    run(&conn, two_children()).await.unwrap();
    let executed = conn.driver().executed();
    assert!(executed[1].contains("employees"));
    assert!(executed[2].contains("projects"));
}

#[tokio::test]
async fn test_child_failure_aborts() {
    let driver = ScriptedDriver::new()
        .on_rows(
            "SELECT id FROM departments",
            &["id"],
            vec![vec![1.into()]],
        )
        .on_rows(
            "FROM employees WHERE department_id IN (1)",
            &["name", "department_id"],
            vec![],
        )
        .on_error("FROM projects", "Table 'projects' doesn't exist");
    let conn = Connection::new(driver);

    let err = run(&conn, two_children()).await.unwrap_err();
    assert!(err.is_query());
    assert!(err.statement().unwrap().contains("projects"));
}

#[tokio::test]
async fn test_statements_without_rows() {
    let driver = ScriptedDriver::new()
        .on_affected("DELETE FROM departments", 3, None)
        .on_affected("INSERT INTO departments", 1, Some(7));
    let conn = Connection::new(driver);

    let outcome = run(&conn, "DELETE FROM departments WHERE id > 2").await.unwrap();
    assert_eq!(outcome, Outcome::Affected(3));
    let outcome = run(&conn, "INSERT INTO departments (name) VALUES ('x')").await.unwrap();
    assert_eq!(outcome, Outcome::Inserted(7));
}

#[tokio::test]
async fn test_nested_set_shape() {
    let driver = ScriptedDriver::new().on_rows(
        "FROM categories",
        &["id", "tree:left", "tree:right"],
        vec![
            vec![1.into(), 1.into(), 4.into()],
            vec![2.into(), 2.into(), 3.into()],
        ],
    );
    let conn = Connection::new(driver);

    let set = run(&conn, "SELECT id, lft AS `tree:left`, rgt AS `tree:right` FROM categories")
        .await
        .unwrap()
        .into_result_set()
        .unwrap();
    assert_eq!(set.shape(), ResultShape::NestedSet);
    let forest = set.nested_set().unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].children.len(), 1);
}
