pub mod catalog;
pub mod commands;
pub mod connection;
pub mod descriptor;
pub mod device;
pub mod diagnostics;
pub mod entity;
pub mod filter;
pub mod homie;
pub mod logbook;
pub mod output;
pub mod parameter;
pub mod product;
pub mod schedule;
pub mod setup;
pub mod snapshot;
