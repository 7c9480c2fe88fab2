use minijinja::{context, Environment, UndefinedBehavior};
use serde::Deserialize;
use std::fmt;

const SQL_TEMPLATE: &str = "sql_generation.txt";
const ANSWER_STANDARD_TEMPLATE: &str = "answer_standard.txt";
const ANSWER_COMPACT_TEMPLATE: &str = "answer_compact.txt";

/// How (question, SQL, result) is rendered for answer synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStrategy {
    /// Full instructions, suited to capable conversational models
    #[default]
    Standard,
    /// The same rules compressed for small models
    Compact,
}

impl PromptStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            PromptStrategy::Standard => "standard",
            PromptStrategy::Compact => "compact",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            PromptStrategy::Standard => ANSWER_STANDARD_TEMPLATE,
            PromptStrategy::Compact => ANSWER_COMPACT_TEMPLATE,
        }
    }
}

impl fmt::Display for PromptStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub struct PromptRenderer {
    env: Environment<'static>,
    strategy: PromptStrategy,
}

impl PromptRenderer {
    pub fn new(strategy: PromptStrategy) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_template(SQL_TEMPLATE, include_str!("../../templates/sql_generation.txt"))
            .expect("Failed to add SQL generation template");
        env.add_template(
            ANSWER_STANDARD_TEMPLATE,
            include_str!("../../templates/answer_standard.txt"),
        )
        .expect("Failed to add standard answer template");
        env.add_template(
            ANSWER_COMPACT_TEMPLATE,
            include_str!("../../templates/answer_compact.txt"),
        )
        .expect("Failed to add compact answer template");

        Self { env, strategy }
    }

    pub fn strategy(&self) -> PromptStrategy {
        self.strategy
    }

    pub fn sql_prompt(
        &self,
        schema: &str,
        question: &str,
        dialect: &str,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(SQL_TEMPLATE)?
            .render(context! { schema, question, dialect })
    }

    pub fn answer_prompt(
        &self,
        question: &str,
        query: &str,
        result: &str,
    ) -> Result<String, minijinja::Error> {
        self.env
            .get_template(self.strategy.template())?
            .render(context! { question, query, result })
    }
}
