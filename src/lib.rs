//! Jobhound - job listing acquisition and triage tracking.
//!
//! Scrapes a job board on behalf of saved searches, deduplicates the
//! postings it finds, and tracks each one through a small triage
//! workflow shared by two reviewers.

pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod server;
pub mod services;
