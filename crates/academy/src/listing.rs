//! Pagination and filter parsing shared by every list page.
//!
//! Parsing never fails: garbage falls back to the defaults, so a hand-edited
//! query string can only ever produce a (possibly empty) page.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{LikeExpr, SimpleExpr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, QuerySelect, Select,
};
use serde::{Deserialize, Serialize};

use crate::models::student::Gender;
use crate::view::View;

pub const PAGE_SIZES: [u64; 3] = [10, 20, 50];
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Highest page whose offset still fits the signed 64-bit value bound for OFFSET.
const MAX_PAGE: u64 = i64::MAX as u64 / PAGE_SIZES[PAGE_SIZES.len() - 1] + 1;

/// Raw list query string. Every field is optional text.
///
/// Usage in handlers:
/// ```rust,ignore
/// async fn list(query: ListQuery) -> impl IntoResponse {
///     let req = query.page_request();
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub gender: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl ListQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::parse(
            self.page.as_deref(),
            self.per_page.as_deref().or(self.limit.as_deref()),
        )
    }

    pub fn search(&self) -> Option<String> {
        parse_search(self.search.as_deref())
    }

    pub fn gender(&self) -> Option<Gender> {
        self.gender.as_deref().and_then(Gender::parse)
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::parse(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

impl<S> FromRequestParts<S> for ListQuery
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or("");
        Ok(serde_urlencoded::from_str(query).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Pages start at 1 and are capped at [`MAX_PAGE`]; sizes outside
    /// [`PAGE_SIZES`] fall back to the default.
    pub fn parse(page: Option<&str>, per_page: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(MAX_PAGE))
            .unwrap_or(1);
        let per_page = per_page
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| PAGE_SIZES.contains(p))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        PageRequest { page, per_page }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// `ceil(total / per_page)`, never less than 1.
pub fn total_pages(total_count: u64, per_page: u64) -> u64 {
    total_count.div_ceil(per_page.max(1)).max(1)
}

/// Trimmed search term, `None` when blank.
pub fn parse_search(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Substring match of `term` against `column`, ignoring case.
///
/// `%`, `_` and `\` in the term match literally. Postgres needs `ILIKE`;
/// SQLite's `LIKE` already ignores case.
pub fn contains_term<C: ColumnTrait>(backend: DbBackend, column: C, term: &str) -> SimpleExpr {
    let pattern = LikeExpr::new(format!("%{}%", escape_like(term))).escape('\\');
    let column = column.into_expr();
    match backend {
        DbBackend::Postgres => column.ilike(pattern),
        _ => column.like(pattern),
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Calendar-day range, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Dates are `YYYY-MM-DD`; anything else is treated as unset.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Self {
        DateRange {
            start: start.and_then(parse_date),
            end: end.and_then(parse_date),
        }
    }

    /// Midnight at the start of the first day.
    pub fn lower_bound(&self) -> Option<NaiveDateTime> {
        self.start.and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Midnight after the last day, to compare with `<`.
    pub fn upper_bound_exclusive(&self) -> Option<NaiveDateTime> {
        self.end
            .and_then(|d| d.succ_opt())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, req: &PageRequest) -> Self {
        let total_pages = total_pages(total_count, req.per_page);
        Page {
            items,
            page: req.page,
            per_page: req.per_page,
            total_count,
            total_pages,
            has_prev: req.page > 1,
            has_next: req.page < total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total_count: self.total_count,
            total_pages: self.total_pages,
            has_prev: self.has_prev,
            has_next: self.has_next,
        }
    }
}

impl<T: Serialize> Page<T> {
    /// Put the rows under `items_key` and the paging fields at the top level.
    pub fn into_view(self, view: View, items_key: &str) -> View {
        view.with(items_key, &self.items)
            .with("page", self.page)
            .with("per_page", self.per_page)
            .with("page_sizes", PAGE_SIZES)
            .with("total_count", self.total_count)
            .with("total_pages", self.total_pages)
            .with("has_prev", self.has_prev)
            .with("has_next", self.has_next)
    }
}

/// Count every match, then fetch the requested slice.
pub async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    req: &PageRequest,
) -> Result<Page<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
{
    let total_count = select.clone().count(db).await?;
    let items = select
        .offset(req.offset())
        .limit(req.per_page)
        .all(db)
        .await?;
    Ok(Page::new(items, total_count, req))
}
