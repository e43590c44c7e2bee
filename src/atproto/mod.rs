//! AT Protocol identity, addressing and record access

pub mod did;
pub mod fetcher;
pub mod identifier;
pub mod types;
pub mod uri;

#[cfg(test)]
mod resolver_tests;
