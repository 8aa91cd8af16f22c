mod authn;
mod authz;
mod bucket;
mod error;
mod pipeline;
mod render;
mod resource;
mod response;
mod router;
mod storage;
mod target;
mod upload;

pub mod config;
pub mod factory;
pub mod reload;
pub mod restful;
pub mod table;
