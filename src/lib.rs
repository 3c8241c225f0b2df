pub mod app;
pub mod data_loaders;
pub mod elevate;
pub mod generator;
pub mod glob_resolver;
pub mod host;
pub mod logging;
pub mod menu;
pub mod patch;
pub mod paths;
pub mod sources;
pub mod utility;
