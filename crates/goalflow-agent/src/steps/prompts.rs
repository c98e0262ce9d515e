//! Prompt text sent to the generator.

pub const MATH_PARSER_SYSTEM: &str = "You are a math parser. Return only the arithmetic expression.";

pub const DBT_SYSTEM: &str = "You are a dbt expert. Respond with a single dbt model: SQL only, \
no prose, no markdown.";

pub const EXPLAIN_SYSTEM: &str = "You explain arithmetic results to a general audience in one or \
two short sentences.";

pub fn extract_expression(goal: &str) -> String {
    format!("Extract the arithmetic expression from: {}", goal)
}

pub fn refine_sql(sql: &str) -> String {
    format!(
        "Convert this SQL into ONE best dbt model only. Include a config() block and keep \
         the column list intact. Do not provide multiple options or explanations. SQL:\n{}",
        sql
    )
}

pub fn explain_result(expression: &str, value: f64) -> String {
    format!(
        "The expression {} evaluates to {}. Explain how that result is reached.",
        expression, value
    )
}
