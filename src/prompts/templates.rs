//! Prompt template text.
//!
//! `{name}` placeholders are substituted by [`super::Prompt::from_template`].
//! `{before_question}` marks [`super::InsertionPoint::BeforeQuestion`] and is
//! never substituted.

pub const BEFORE_QUESTION_MARKER: &str = "{before_question}";

pub const SQL_GENERATION: &str = "You are a SQL expert. Given a database schema and a natural language question, generate a valid SQL query.

Database Schema:
{schema}

{before_question}Question: {question}

Important rules:
- Return ONLY the SQL query, nothing else
- Use proper SQL syntax for SQLite
- Match table and column names exactly as shown in the schema
- Use appropriate JOINs when needed
- Add WHERE clauses for filtering
- Use GROUP BY for aggregations
- Return SELECT statements only

SQL Query:";

pub const FEW_SHOT: &str = "You are a SQL expert. Here are some examples:

Example 1:
Question: How many customers are there?
Schema: CREATE TABLE customers (id INTEGER, name TEXT, email TEXT);
SQL: SELECT COUNT(*) FROM customers;

Example 2:
Question: What are the top 5 products by price?
Schema: CREATE TABLE products (id INTEGER, name TEXT, price REAL);
SQL: SELECT name, price FROM products ORDER BY price DESC LIMIT 5;

Example 3:
Question: Show employees and their departments
Schema: CREATE TABLE employees (id INTEGER, name TEXT, department_id INTEGER); CREATE TABLE departments (id INTEGER, name TEXT);
SQL: SELECT e.name, d.name FROM employees e JOIN departments d ON e.department_id = d.id;

Now generate SQL for:
Schema: {schema}
{before_question}Question: {question}

SQL Query:";

pub const CHAIN_OF_THOUGHT: &str = "You are a SQL expert. Let's think step by step.

Database Schema:
{schema}

{before_question}Question: {question}

First, let's break down what we need to do:
1. Identify which tables are needed
2. Determine what columns to select
3. Decide if JOINs are needed
4. Consider any filters (WHERE clauses)
5. Think about aggregations or sorting

Now generate the SQL query. Return ONLY the final SQL query.";

pub const ERROR_CORRECTION: &str = "The following SQL query has an error:

SQL Query: {sql_query}
Error: {error}

Database Schema:
{schema}

Question: {question}

Generate a corrected SQL query that fixes this error. Return ONLY the corrected SQL query, nothing else.";

pub const FEEDBACK_ENHANCED: &str = "You are a SQL expert. Learn from previous successful queries and common mistakes.

Database Schema:
{schema}

{feedback_examples}

{feedback_corrections}

{before_question}Question: {question}

Generate a SQL query following best practices from the examples above. Return ONLY the SQL query.";

pub const SUMMARIZATION: &str = "Given a SQL query and its results, provide a natural language summary.

Question: {question}
SQL Query: {sql_query}
Results: {results}

Provide a clear, concise summary of the results in natural language that directly answers the original question.";

pub const CLARIFICATION: &str = "The following question might be ambiguous: \"{question}\"

Database Schema:
{schema}

Analyze if this question is ambiguous given the schema. If it is ambiguous, provide 2-3 possible interpretations.
If it's clear, respond with \"CLEAR\".";

pub const AMBIGUITY_CHECK: &str = "Is the following question ambiguous given the database schema?

Question: {question}
Schema: {schema}

Answer with YES or NO only.";

pub const MODEL_COMPARISON: &str = "Given the database schema:
{schema}

Generate a SQL query to answer: {question}

Return ONLY the SQL query, nothing else.";
