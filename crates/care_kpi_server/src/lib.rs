//! care_kpi_server: REST surface over the care KPI core.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
