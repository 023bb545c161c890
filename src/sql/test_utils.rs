//! Test utilities for canonical statement validation.
//!
//! Checks that emitted statements are syntactically correct PostgreSQL
//! using sqlparser-rs for roundtrip validation.

use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Validates that a SQL string is a single syntactically valid statement.
///
/// # Example
///
/// ```ignore
/// use crate::sql::test_utils::validate_sql;
///
/// validate_sql("SELECT \"abc123\" FROM \"F\"").unwrap();
/// ```
pub fn validate_sql(sql: &str) -> Result<(), String> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| format!("Invalid SQL: {}\nSQL: {}", e, sql))?;
    if statements.len() != 1 {
        return Err(format!(
            "Expected one statement, found {}\nSQL: {}",
            statements.len(),
            sql
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM \"users\"").unwrap();
        validate_sql("INSERT INTO \"f\" (\"a\") VALUES ('x')").unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        assert!(validate_sql("SELEC * FORM users").is_err());
        assert!(validate_sql("SELECT 1; SELECT 2").is_err());
    }
}
