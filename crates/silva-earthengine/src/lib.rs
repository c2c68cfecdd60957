#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod auth;
mod client;
mod config;
mod error;
mod expression;
mod export;

pub mod hansen;

pub use auth::{AccessToken, EngineCredentials, ServiceAccountKey};
pub use client::EngineClient;
pub use config::EngineConfig;
pub use expression::{Expr, FunctionDefinition, Geometry, Image, ImageCollection, Invocation};
pub use export::{ExportParams, ExportTask, FileFormat, TaskStatus};
