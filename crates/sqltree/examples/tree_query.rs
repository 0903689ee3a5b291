//! Tree query example against an in-memory driver.
//!
//! Run with: cargo run --example tree_query -p sqltree
//!
//! The driver below answers a fixed set of statements, standing in for a
//! MySQL connection.

use sqltree::{
    Connection, ConnectionConfig, DbResult, Driver, DriverError, DriverOutput, RowCursor,
    TracingMonitor, Value,
};

struct Fixture;

fn text(s: &str) -> Value {
    Value::from(s)
}

impl Driver for Fixture {
    async fn execute(&self, sql: &str) -> Result<DriverOutput, DriverError> {
        let cursor = if sql.starts_with("SELECT id, name FROM departments") {
            RowCursor::from_names(
                &["id", "name"],
                vec![vec![1.into(), text("Engineering")], vec![2.into(), text("Sales")]],
            )
        } else if sql.contains("FROM employees WHERE department_id IN") {
            RowCursor::from_names(
                &["id", "name", "department_id"],
                vec![
                    vec![10.into(), text("Amy"), 1.into()],
                    vec![11.into(), text("Bo"), 2.into()],
                    vec![12.into(), text("Cy"), 1.into()],
                ],
            )
        } else if sql.contains("FROM offices WHERE offices.id =") {
            RowCursor::from_names(&["city"], vec![vec![text("Utrecht")]])
        } else {
            return Err(DriverError::new(format!("unknown statement: {sql}")));
        };
        Ok(DriverOutput::Rows(cursor))
    }
}

#[tokio::main]
async fn main() -> DbResult<()> {
    let conn = Connection::new(Fixture)
        .with_config(ConnectionConfig::new().log_statements(true))
        .with_monitor(TracingMonitor::new());

    let departments = conn
        .query(
            "SELECT id, name, \
             (SELECT id, name FROM employees WHERE department_id = departments.id) AS staff, \
             (SELECT city FROM offices WHERE offices.id = departments.id LIMIT 1) AS city \
             FROM departments",
            (),
        )
        .await?
        .into_result_set()?;

    println!("shape: {:?}", departments.shape());
    for department in departments.rows() {
        let name = department.value("name").map(Value::to_string).unwrap_or_default();
        let city = department.value("city").map(Value::to_string).unwrap_or_default();
        println!("{name} ({city})");
        if let Some(staff) = department.children("staff") {
            for employee in staff.rows() {
                println!("  - {}", employee.value("name").map(Value::to_string).unwrap_or_default());
            }
        }
    }

    println!("{}", departments.to_json()?);
    Ok(())
}
