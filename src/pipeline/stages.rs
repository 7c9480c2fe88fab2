use regex::Regex;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, info};

use super::record::ExecutionLog;
use super::{Pipeline, PipelineError, Stage};

/// Stored as the result when the query could not be run.
pub const EXECUTION_ERROR_MARKER: &str = "Error executing query";

static FENCE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*```[ \t]*[a-z0-9_+\-]*[ \t\r]*$").unwrap()
});
static INLINE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)```(?:sql)?").unwrap());

/// Strips markdown code fences, tagged or not, from model output.
pub fn clean_sql(raw: &str) -> String {
    let without_lines = FENCE_LINE.replace_all(raw, "");
    INLINE_FENCE
        .replace_all(&without_lines, "")
        .trim()
        .to_string()
}

impl Pipeline {
    pub(super) async fn generate_sql(
        &self,
        question: &str,
        log: &mut ExecutionLog,
    ) -> Result<String, PipelineError> {
        debug!(stage = %Stage::Generating, "Generating SQL");
        let started = Instant::now();

        let schema = self
            .database
            .describe_schema()
            .await
            .map_err(PipelineError::Schema)?;
        let prompt = self
            .prompts
            .sql_prompt(&schema, question, self.database.dialect())
            .map_err(|source| PipelineError::Prompt {
                stage: Stage::Generating,
                source,
            })?;
        log.sql_prompt = Some(prompt.clone());

        let model = &self.settings.sql_model;
        let raw = self
            .backend
            .complete(&prompt, &model.model, model.temperature)
            .await
            .map_err(PipelineError::Generation)?;

        let sql = clean_sql(&raw);
        log.sql_query = Some(sql.clone());
        log.sql_generation_time = started.elapsed().as_secs_f64();
        info!("SQL generated in {:.2}s", log.sql_generation_time);

        Ok(sql)
    }

    pub(super) async fn execute_query(
        &self,
        sql: &str,
        log: &mut ExecutionLog,
    ) -> Result<String, PipelineError> {
        debug!(stage = %Stage::Executing, "Executing SQL: {}", sql);
        let started = Instant::now();

        let rows = match self.database.execute(sql).await {
            Ok(rows) => rows,
            Err(e) => {
                log.result = Some(EXECUTION_ERROR_MARKER.to_string());
                return Err(PipelineError::Execution(e));
            }
        };

        let result = rows.canonical();
        log.result = Some(result.clone());
        log.query_execution_time = started.elapsed().as_secs_f64();
        info!(
            "Query executed in {:.2}s ({} rows)",
            log.query_execution_time,
            rows.rows().len()
        );

        Ok(result)
    }

    pub(super) async fn synthesize_answer(
        &self,
        question: &str,
        sql: &str,
        result: &str,
        log: &mut ExecutionLog,
    ) -> Result<String, PipelineError> {
        debug!(
            stage = %Stage::Synthesizing,
            strategy = %self.prompts.strategy(),
            "Synthesizing answer"
        );
        let started = Instant::now();

        let prompt = self
            .prompts
            .answer_prompt(question, sql, result)
            .map_err(|source| PipelineError::Prompt {
                stage: Stage::Synthesizing,
                source,
            })?;
        log.nlp_prompt = Some(prompt.clone());

        let model = &self.settings.nlp_model;
        let answer = self
            .backend
            .complete(&prompt, &model.model, model.temperature)
            .await
            .map_err(PipelineError::Synthesis)?
            .trim()
            .to_string();

        log.final_answer = Some(answer.clone());
        log.answer_generation_time = started.elapsed().as_secs_f64();
        info!("Answer generated in {:.2}s", log.answer_generation_time);

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_variants_reduce_to_bare_sql() {
        let inputs = [
            "SELECT 1",
            "```sql\nSELECT 1\n```",
            "```\nSELECT 1\n```",
            "```SQL\nSELECT 1\n```",
            "  ```Sql\r\nSELECT 1\r\n```  \n",
            "```sql SELECT 1```",
        ];
        for input in inputs {
            assert_eq!(clean_sql(input), "SELECT 1", "input: {:?}", input);
        }
    }

    #[test]
    fn test_other_language_tags_are_stripped() {
        assert_eq!(clean_sql("```duckdb\nSELECT 1\n```"), "SELECT 1");
        assert_eq!(clean_sql("```postgresql\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_multiline_query_is_preserved() {
        let raw = "```sql\nSELECT c.company_name, COUNT(*)\nFROM customers c\nGROUP BY 1;\n```";
        assert_eq!(
            clean_sql(raw),
            "SELECT c.company_name, COUNT(*)\nFROM customers c\nGROUP BY 1;"
        );
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        assert_eq!(clean_sql("\n\n  SELECT 1;  \n"), "SELECT 1;");
        assert_eq!(clean_sql("```\n```"), "");
    }
}
