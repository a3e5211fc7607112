use crate::error::{DbxError, DbxResult};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// SQL 파서 — sqlparser-rs
pub struct SqlParser {
    dialect: GenericDialect,
}

impl SqlParser {
    /// 새 SQL 파서 생성
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// SQL 문자열을 AST로 파싱
    pub fn parse(&self, sql: &str) -> DbxResult<Vec<Statement>> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| DbxError::SqlParse {
            message: e.to_string(),
            sql: sql.to_string(),
        })
    }

    /// 단일 문장 파싱
    pub fn parse_one(&self, sql: &str) -> DbxResult<Statement> {
        let mut statements = self.parse(sql)?;
        match statements.len() {
            1 => Ok(statements.remove(0)),
            0 => Err(DbxError::SqlParse {
                message: "empty statement".to_string(),
                sql: sql.to_string(),
            }),
            n => Err(DbxError::SqlNotSupported {
                feature: format!("{n} statements in one query"),
                hint: "Submit one SELECT statement at a time".to_string(),
            }),
        }
    }
}

impl Default for SqlParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlparser::ast::{SelectItem, SetExpr};

    #[test]
    fn test_parse_field_access_on_alias() {
        let parser = SqlParser::new();
        let statement = parser.parse_one("SELECT mk(1) AS p, p.label").unwrap();
        let Statement::Query(query) = statement else {
            panic!("Expected Query");
        };
        let SetExpr::Select(select) = query.body.as_ref() else {
            panic!("Expected Select");
        };
        assert_eq!(select.projection.len(), 2);
        assert!(matches!(
            &select.projection[1],
            SelectItem::UnnamedExpr(sqlparser::ast::Expr::CompoundIdentifier(parts)) if parts.len() == 2
        ));
    }

    #[test]
    fn test_parse_udf_call_in_where() {
        let parser = SqlParser::new();
        let statement = parser
            .parse_one("SELECT strLen(s) FROM t WHERE filter(n)")
            .unwrap();

        match statement {
            Statement::Query(query) => {
                if let SetExpr::Select(select) = query.body.as_ref() {
                    assert_eq!(select.projection.len(), 1);
                    assert!(select.selection.is_some());
                }
            }
            _ => panic!("Expected Query"),
        }
    }

    #[test]
    fn test_parse_select_without_from() {
        let parser = SqlParser::new();
        let statement = parser.parse_one("SELECT substr('abcd', 2, 3, 4)").unwrap();
        assert!(matches!(statement, Statement::Query(_)));
    }

    #[test]
    fn test_parse_one_rejects_multiple() {
        let parser = SqlParser::new();
        assert!(matches!(
            parser.parse_one("SELECT 1; SELECT 2"),
            Err(DbxError::SqlNotSupported { .. })
        ));
    }

    #[test]
    fn test_parse_error() {
        let parser = SqlParser::new();
        match parser.parse_one("SELECT strLen('x' FROM t") {
            Err(DbxError::SqlParse { sql, .. }) => assert_eq!(sql, "SELECT strLen('x' FROM t"),
            other => panic!("Expected SqlParse, got {:?}", other),
        }
    }
}
