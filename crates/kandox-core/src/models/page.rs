use serde::{Deserialize, Serialize};

/// Pagination metadata attached to every listing response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PageMeta {
    #[serde(default)]
    pub page: u32,
    #[serde(rename = "pageSize", default)]
    pub page_size: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub total: u64,
}

/// A page of results from a listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Page<T> {
    #[serde(default)]
    pub meta: PageMeta,
    #[serde(default = "Vec::new")]
    pub result: Vec<T>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.meta.page >= self.meta.pages
    }

    pub fn summary(&self) -> String {
        format!(
            "page {}/{} ({} of {} total)",
            self.meta.page,
            self.meta.pages.max(1),
            self.result.len(),
            self.meta.total
        )
    }
}
