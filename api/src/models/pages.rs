//! Listing, filtering and pagination for entity routes

use chrono::{DateTime, Utc};
use utoipa::{IntoParams, ToSchema};

use crate::utils::ApiError;

/// Helps serde default the page number to 1
fn default_page() -> usize {
    1
}

/// Helps serde default the page size to 50
fn default_size() -> usize {
    50
}

/// The query params list routes accept
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema, IntoParams)]
pub struct ListParams {
    /// Only return the entity with this id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Only return entities with ids in this comma separated list
    #[serde(default, rename = "id__in", skip_serializing_if = "Option::is_none")]
    pub id_in: Option<String>,
    /// Only return entities with exactly this name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Only return entities whose name contains this case insensitively
    #[serde(default, rename = "name__ilike", skip_serializing_if = "Option::is_none")]
    pub name_ilike: Option<String>,
    /// The 1 based page to return
    #[serde(default = "default_page")]
    pub page: usize,
    /// The number of entities per page
    #[serde(default = "default_size")]
    pub size: usize,
    /// The field to order by, prefixed with + or - for direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
}

impl Default for ListParams {
    /// Build params returning the first default sized page
    fn default() -> Self {
        ListParams {
            id: None,
            id_in: None,
            name: None,
            name_ilike: None,
            page: default_page(),
            size: default_size(),
            order_by: None,
        }
    }
}

impl ListParams {
    /// Parse the comma separated id filter if one was given
    pub fn ids(&self) -> Result<Option<Vec<i64>>, ApiError> {
        match &self.id_in {
            Some(raw) => {
                let ids = raw
                    .split(',')
                    .map(|id| id.trim().parse::<i64>())
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(Some(ids))
            }
            None => Ok(None),
        }
    }
}

/// A single page of entities
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Page<T> {
    /// The entities in this page
    pub items: Vec<T>,
    /// The total number of entities matching the filters
    pub total: usize,
    /// The 1 based page that was returned
    pub page: usize,
    /// The number of entities per page
    pub size: usize,
    /// The total number of pages
    pub pages: usize,
}

/// The accessors list filtering and ordering needs
pub trait Listable {
    /// The id of this entity
    fn key_id(&self) -> i64;

    /// The name of this entity
    fn key_name(&self) -> &str;

    /// When this entity was created
    fn key_created(&self) -> DateTime<Utc>;
}

/// Filter, order and paginate a full entity list
///
/// # Arguments
///
/// * `items` - The entities to page over
/// * `params` - The filters and ordering to apply
pub fn paginate<T: Listable>(mut items: Vec<T>, params: &ListParams) -> Result<Page<T>, ApiError> {
    // apply the id filters first
    if let Some(id) = params.id {
        items.retain(|item| item.key_id() == id);
    }
    if let Some(ids) = params.ids()? {
        items.retain(|item| ids.contains(&item.key_id()));
    }
    // then the name filters
    if let Some(name) = &params.name {
        items.retain(|item| item.key_name() == name);
    }
    if let Some(fragment) = &params.name_ilike {
        let fragment = fragment.to_lowercase();
        items.retain(|item| item.key_name().to_lowercase().contains(&fragment));
    }
    // order by the requested field defaulting to ascending ids
    let raw_order = params.order_by.as_deref().unwrap_or("+id");
    let (descending, field) = match raw_order.split_at_checked(1) {
        Some(("-", field)) => (true, field),
        Some(("+", field)) => (false, field),
        _ => (false, raw_order),
    };
    match field {
        "id" => items.sort_by_key(Listable::key_id),
        "name" => items.sort_by(|left, right| left.key_name().cmp(right.key_name())),
        "created" => items.sort_by_key(Listable::key_created),
        field => {
            return Err(ApiError::invalid(
                "order_by",
                format!("cannot order by unknown field {field}"),
            ))
        }
    }
    if descending {
        items.reverse();
    }
    // slice out the requested page
    let size = params.size.max(1);
    let page = params.page.max(1);
    let total = items.len();
    let pages = total.div_ceil(size);
    let items = items
        .into_iter()
        .skip((page - 1) * size)
        .take(size)
        .collect();
    Ok(Page {
        items,
        total,
        page,
        size,
        pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A tiny listable stand in for entities
    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
        name: String,
        created: DateTime<Utc>,
    }

    impl Listable for Row {
        fn key_id(&self) -> i64 {
            self.id
        }
        fn key_name(&self) -> &str {
            &self.name
        }
        fn key_created(&self) -> DateTime<Utc> {
            self.created
        }
    }

    /// build some rows to page over
    fn rows() -> Vec<Row> {
        ["edge", "lab", "Corp", "edge-v6"]
            .iter()
            .enumerate()
            .map(|(index, name)| Row {
                id: index as i64 + 1,
                name: (*name).to_owned(),
                created: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn name_ilike_is_case_insensitive() {
        let params = ListParams {
            name_ilike: Some("CORP".to_owned()),
            ..ListParams::default()
        };
        let page = paginate(rows(), &params).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "Corp");
    }

    #[test]
    fn id_in_filters_and_orders() {
        let params = ListParams {
            id_in: Some("3,1".to_owned()),
            order_by: Some("-id".to_owned()),
            ..ListParams::default()
        };
        let page = paginate(rows(), &params).unwrap();
        assert_eq!(
            page.items.iter().map(|row| row.id).collect::<Vec<i64>>(),
            vec![3, 1]
        );
    }

    #[test]
    fn pages_are_sliced() {
        let params = ListParams {
            size: 3,
            page: 2,
            ..ListParams::default()
        };
        let page = paginate(rows(), &params).unwrap();
        assert_eq!(page.total, 4);
        assert_eq!(page.pages, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, 4);
    }

    #[test]
    fn unknown_order_fields_are_rejected() {
        let params = ListParams {
            order_by: Some("comment".to_owned()),
            ..ListParams::default()
        };
        assert!(paginate(rows(), &params).is_err());
    }
}
