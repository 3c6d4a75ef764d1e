//! `List` filter and pagination shapes (spec 6).

use chrono::{DateTime, Utc};
use deploy_types::{Environment, ModuleName, PipelineStatus};

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub environment: Option<Environment>,
    pub module_name: Option<ModuleName>,
    pub status: Option<PipelineStatus>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { offset: 0, limit: 50 }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}
