//! 세션 — 함수 레지스트리, 테이블 카탈로그, 설정을 소유
//!
//! 쿼리 파이프라인:
//!
//! ```text
//! SQL → SqlParser → LogicalPlanner → Analyzer ⇄ QueryOptimizer → QueryExecutor → QueryResult
//! ```
//!
//! 분석과 최적화는 플랜이 더 이상 바뀌지 않을 때까지 (최대 `max_rewrite_passes`회) 반복됩니다.

use crate::analyzer::{Analyzer, SchemaProvider};
use crate::config::SessionConfig;
use crate::error::{DbxError, DbxResult};
use crate::function::{Arity, FunctionRegistry, IntoScalarUdf, ScalarUdf, builtin_registry};
use crate::sql::executor::{QueryExecutor, QueryResult, TableSource, ensure_resolved};
use crate::sql::optimizer::QueryOptimizer;
use crate::sql::parser::SqlParser;
use crate::sql::planner::{ColumnDef, LogicalPlan, LogicalPlanner, RowSchema};
use crate::types::{SemanticType, Value};
use arrow::record_batch::RecordBatch;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// 등록된 테이블
#[derive(Debug, Clone)]
pub struct Table {
    pub schema: RowSchema,
    pub batches: Vec<RecordBatch>,
}

impl Table {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }
}

/// UDF 세션
pub struct Session {
    config: SessionConfig,
    registry: FunctionRegistry,
    tables: DashMap<String, Table>,
    parser: SqlParser,
    optimizer: QueryOptimizer,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        info!(
            case_sensitive = config.case_sensitive,
            decimal_narrowing = %config.decimal_narrowing,
            on_udf_error = %config.on_udf_error,
            "session opened"
        );
        Self {
            registry: FunctionRegistry::with_case_sensitivity(config.case_sensitive),
            config,
            tables: DashMap::new(),
            parser: SqlParser::new(),
            optimizer: QueryOptimizer::new(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// User function registry
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Register a typed closure. An existing function of the same name is replaced.
    pub fn register_udf<F, Args, Marker>(&self, name: &str, func: F) -> DbxResult<()>
    where
        F: IntoScalarUdf<Args, Marker>,
    {
        self.registry.register_fn(name, func)
    }

    /// Register a function with an explicit signature over raw values.
    pub fn register_udf_dynamic<F>(
        &self,
        name: &str,
        params: Vec<SemanticType>,
        return_type: SemanticType,
        arity: Arity,
        body: F,
    ) -> DbxResult<()>
    where
        F: Fn(&[Value]) -> DbxResult<Value> + Send + Sync + 'static,
    {
        let udf = ScalarUdf::dynamic(name, params, return_type, arity, body)?;
        self.registry.register(Arc::new(udf));
        Ok(())
    }

    pub fn deregister_udf(&self, name: &str) -> bool {
        self.registry.deregister(name)
    }

    /// Sorted names of user functions
    pub fn list_udfs(&self) -> Vec<String> {
        self.registry.names()
    }

    /// User and built-in signatures as JSON.
    pub fn describe_functions_json(&self) -> DbxResult<String> {
        #[derive(Serialize)]
        struct Catalog {
            user: Vec<crate::function::FunctionSignature>,
            builtin: Vec<crate::function::FunctionSignature>,
        }
        let catalog = Catalog {
            user: self.registry.describe(),
            builtin: builtin_registry().describe(),
        };
        Ok(serde_json::to_string_pretty(&catalog)?)
    }

    fn table_key(&self, name: &str) -> String {
        name.to_lowercase()
    }

    /// Register (or replace) an in-memory table. Each batch becomes one partition.
    pub fn register_table(&self, name: &str, batches: Vec<RecordBatch>) -> DbxResult<()> {
        let first = batches.first().ok_or_else(|| {
            DbxError::Schema(format!("table '{name}' needs at least one batch"))
        })?;
        let arrow_schema = first.schema();
        if let Some(other) = batches.iter().find(|b| b.schema() != arrow_schema) {
            return Err(DbxError::Schema(format!(
                "table '{name}': batch schema {:?} differs from {:?}",
                other.schema(),
                arrow_schema
            )));
        }

        let columns = arrow_schema
            .fields()
            .iter()
            .map(|f| Ok(ColumnDef::new(f.name(), SemanticType::from_arrow(f.data_type())?)))
            .collect::<DbxResult<Vec<_>>>()?;
        let table = Table {
            schema: RowSchema::new(columns),
            batches,
        };
        debug!(table = name, rows = table.num_rows(), "table registered");
        self.tables.insert(self.table_key(name), table);
        Ok(())
    }

    pub fn drop_table(&self, name: &str) -> bool {
        self.tables.remove(&self.table_key(name)).is_some()
    }

    /// Resolve every function call and type-check the plan.
    pub fn analyze(&self, plan: LogicalPlan) -> DbxResult<LogicalPlan> {
        self.analyzer().analyze(plan)
    }

    fn analyzer(&self) -> Analyzer<'_> {
        Analyzer::new(
            &self.registry,
            builtin_registry(),
            self.config.decimal_narrowing,
            self,
        )
    }

    /// Parse, plan, analyze and optimize. The returned plan is fully resolved.
    pub fn plan_sql(&self, sql: &str) -> DbxResult<LogicalPlan> {
        let statement = self.parser.parse_one(sql)?;
        let plan = LogicalPlanner::with_schemas(self).plan(&statement)?;

        let analyzer = self.analyzer();
        let mut plan = analyzer.analyze(plan)?;
        for pass in 1..=self.config.max_rewrite_passes {
            let rewritten = analyzer.analyze(self.optimizer.optimize(plan.clone())?)?;
            let changed = rewritten != plan;
            debug!(pass, changed, "rewrite pass");
            plan = rewritten;
            if !changed {
                break;
            }
        }
        Ok(plan)
    }

    /// Execute a resolved plan.
    pub fn execute_plan(&self, plan: &LogicalPlan) -> DbxResult<QueryResult> {
        ensure_resolved(plan)?;
        QueryExecutor::new(self, self.config.on_udf_error).execute(plan)
    }

    /// SQL 실행
    pub fn sql(&self, sql: &str) -> DbxResult<QueryResult> {
        let plan = self.plan_sql(sql)?;
        self.execute_plan(&plan)
    }

    /// Teardown: drops all user functions and tables.
    pub fn close(&self) {
        self.registry.clear();
        self.tables.clear();
        info!("session closed");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SchemaProvider for Session {
    fn table_schema(&self, table: &str) -> DbxResult<RowSchema> {
        self.tables
            .get(&self.table_key(table))
            .map(|t| t.schema.clone())
            .ok_or_else(|| DbxError::TableNotFound(table.to_string()))
    }
}

impl TableSource for Session {
    fn scan(&self, table: &str, alias: Option<&str>) -> DbxResult<(RowSchema, Vec<RecordBatch>)> {
        let entry = self
            .tables
            .get(&self.table_key(table))
            .ok_or_else(|| DbxError::TableNotFound(table.to_string()))?;
        let mut qualifiers = vec![table.to_string()];
        qualifiers.extend(alias.map(str::to_string));
        Ok((
            entry.schema.clone().with_qualifiers(qualifiers),
            entry.batches.clone(),
        ))
    }
}
