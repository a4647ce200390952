//! Integration Tests Module
//!
//! End-to-end tests of the Beacon plugin runtime: discovery across package
//! sources, action aggregation and execution, module reloads, registry
//! caching, install and uninstall, views, and the channel router.

// Shared fixtures: shell plugins, fake registry, recording surfaces
mod common;

// Discovery, aggregation, execution and reload
mod plugin_runtime_test;

// Registry cache, install and uninstall
mod marketplace_test;

// Channel router envelope and view lifecycle
mod router_test;
