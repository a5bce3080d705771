//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Amount;
use crate::error::GatewayError;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u32,
    /// Total number of pages.
    pub total_pages: u32,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// Slices `items` to the requested page and builds its metadata.
    #[must_use]
    pub fn paginate<T>(&self, items: Vec<T>) -> (Vec<T>, PaginationMeta) {
        let params = self.clamped();
        let total = u32::try_from(items.len()).unwrap_or(u32::MAX);
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(params.per_page)
        };
        let start = (params.page.saturating_sub(1) as usize).saturating_mul(params.per_page as usize);
        let data = items
            .into_iter()
            .skip(start)
            .take(params.per_page as usize)
            .collect();
        (
            data,
            PaginationMeta {
                page: params.page,
                per_page: params.per_page,
                total,
                total_pages,
            },
        )
    }
}

/// Amount given either in wei or in ether.
///
/// Exactly one of the two fields must be set.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AmountInput {
    /// Amount in wei (string-encoded u128).
    #[serde(default)]
    pub wei: Option<String>,
    /// Amount in ether as a decimal string (e.g. `"0.5"`).
    #[serde(default)]
    pub ether: Option<String>,
}

impl AmountInput {
    /// Resolves the input to an [`Amount`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] unless exactly one field is
    /// set and parses.
    pub fn resolve(&self, field: &str) -> Result<Amount, GatewayError> {
        match (self.wei.as_deref(), self.ether.as_deref()) {
            (Some(wei), None) => wei.parse().map_err(|_| {
                GatewayError::InvalidRequest(format!("invalid {field}.wei: {wei}"))
            }),
            (None, Some(ether)) => Amount::parse_ether(ether),
            (Some(_), Some(_)) => Err(GatewayError::InvalidRequest(format!(
                "{field}.wei and {field}.ether are mutually exclusive"
            ))),
            (None, None) => Err(GatewayError::InvalidRequest(format!(
                "missing {field}.wei or {field}.ether"
            ))),
        }
    }
}

/// Amount rendered both in wei and in ether.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AmountDto {
    /// Amount in wei (string-encoded u128).
    pub wei: String,
    /// Amount in ether.
    pub ether: String,
}

impl From<Amount> for AmountDto {
    fn from(amount: Amount) -> Self {
        Self {
            wei: amount.wei().to_string(),
            ether: amount.to_ether_string(),
        }
    }
}

/// Generic count response.
#[derive(Debug, Serialize, ToSchema)]
pub struct CountResponse {
    /// Number of items.
    pub count: usize,
}
