//! services/api/src/adapters/mod.rs
//!
//! Concrete implementations of the `tutor_core` ports: the PostgreSQL store
//! and the OpenAI completion gateway.

pub mod chat_llm;
pub mod db;
