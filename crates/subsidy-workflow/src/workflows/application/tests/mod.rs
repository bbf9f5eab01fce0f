mod common;
mod engine;
mod gates;
mod graph;
mod routing;
