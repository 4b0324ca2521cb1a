pub mod collector;
pub mod completion;
pub mod config;
pub mod fields;
pub mod hierarchy;
pub mod issue;
pub mod jira_client;
pub mod models;
pub mod projection;
pub mod query;
pub mod renderer;
pub mod routes;
pub mod sink;
pub mod sprint;
pub mod velocity;
pub mod velocity_graph;

#[cfg(test)]
mod fixtures;
