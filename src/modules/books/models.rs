use serde::{Deserialize, Serialize};
use shelf_http::error::AppError;
use uuid::Uuid;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

/// Book record as stored and served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub thumbnail: Option<String>,
}

/// One page of a book query, in the wire shape clients consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub data: Vec<Book>,
}

/// Query-string parameters of the list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub title: Option<String>,
}

impl ListParams {
    /// Resolve defaults (page 1, limit 10) and normalize the search term.
    ///
    /// Values below 1 fall back to the defaults; the term is trimmed and
    /// lowercased so case-variant queries share one cache entry.
    pub fn sanitize(&self) -> (i64, i64, String) {
        let page = self.page.filter(|page| *page >= 1).unwrap_or(DEFAULT_PAGE);
        let limit = self
            .limit
            .filter(|limit| *limit >= 1)
            .unwrap_or(DEFAULT_LIMIT);
        let term = self
            .title
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();

        (page, limit, term)
    }
}

/// Validated fields of a book to insert.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub year: i32,
    pub thumbnail: Option<String>,
}

/// Request body for creating a book.
#[derive(Debug, Deserialize)]
pub struct CreateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub thumbnail: Option<String>,
}

impl CreateBookRequest {
    /// Require title, author, and year; thumbnail stays optional.
    pub fn validate(self) -> Result<NewBook, AppError> {
        let mut details = Vec::new();

        let title = non_empty(self.title.as_deref());
        if title.is_none() {
            details.push(serde_json::json!({"field": "title", "error": "required"}));
        }
        let author = non_empty(self.author.as_deref());
        if author.is_none() {
            details.push(serde_json::json!({"field": "author", "error": "required"}));
        }
        if self.year.is_none() {
            details.push(serde_json::json!({"field": "year", "error": "required"}));
        }

        if !details.is_empty() {
            return Err(AppError::validation(
                details,
                "title, author and year are required",
            ));
        }

        Ok(NewBook {
            title: title.unwrap(),
            author: author.unwrap(),
            year: self.year.unwrap(),
            thumbnail: self.thumbnail,
        })
    }
}

/// Validated partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct BookChanges {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub thumbnail: Option<String>,
}

/// Request body for partially updating a book.
#[derive(Debug, Deserialize)]
pub struct UpdateBookRequest {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub thumbnail: Option<String>,
}

impl UpdateBookRequest {
    /// Supplied fields must still be valid; absent fields stay untouched.
    pub fn validate(self) -> Result<BookChanges, AppError> {
        let mut details = Vec::new();

        if self.title.is_some() && non_empty(self.title.as_deref()).is_none() {
            details.push(serde_json::json!({"field": "title", "error": "must not be empty"}));
        }
        if self.author.is_some() && non_empty(self.author.as_deref()).is_none() {
            details.push(serde_json::json!({"field": "author", "error": "must not be empty"}));
        }

        if !details.is_empty() {
            return Err(AppError::validation(details, "invalid book update"));
        }

        Ok(BookChanges {
            title: self.title.map(|title| title.trim().to_string()),
            author: self.author.map(|author| author.trim().to_string()),
            year: self.year,
            thumbnail: self.thumbnail,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_default_to_first_page_of_ten() {
        let (page, limit, term) = ListParams::default().sanitize();
        assert_eq!((page, limit), (1, 10));
        assert_eq!(term, "");
    }

    #[test]
    fn list_params_below_one_fall_back_to_defaults() {
        let params = ListParams {
            page: Some(0),
            limit: Some(-5),
            title: None,
        };
        let (page, limit, _) = params.sanitize();
        assert_eq!((page, limit), (1, 10));
    }

    #[test]
    fn search_term_is_trimmed_and_lowercased() {
        let params = ListParams {
            page: None,
            limit: None,
            title: Some("  Dune ".to_string()),
        };
        let (_, _, term) = params.sanitize();
        assert_eq!(term, "dune");
    }

    #[test]
    fn create_request_requires_title_author_year() {
        let request = CreateBookRequest {
            title: Some("  ".to_string()),
            author: None,
            year: None,
            thumbnail: None,
        };

        let error = request.validate().unwrap_err();
        match error {
            AppError::Validation { details, .. } => assert_eq!(details.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_request_accepts_missing_thumbnail() {
        let request = CreateBookRequest {
            title: Some("Dune".to_string()),
            author: Some("Frank Herbert".to_string()),
            year: Some(1965),
            thumbnail: None,
        };

        let new_book = request.validate().unwrap();
        assert_eq!(new_book.title, "Dune");
        assert_eq!(new_book.year, 1965);
        assert!(new_book.thumbnail.is_none());
    }

    #[test]
    fn update_request_rejects_empty_supplied_fields() {
        let request = UpdateBookRequest {
            title: Some(String::new()),
            author: None,
            year: None,
            thumbnail: None,
        };

        assert!(request.validate().is_err());
    }

    #[test]
    fn update_request_keeps_absent_fields_absent() {
        let request = UpdateBookRequest {
            title: None,
            author: None,
            year: Some(1966),
            thumbnail: None,
        };

        let changes = request.validate().unwrap();
        assert!(changes.title.is_none());
        assert_eq!(changes.year, Some(1966));
    }

    #[test]
    fn page_result_wire_shape_is_camel_case() {
        let result = PageResult {
            page: 1,
            limit: 10,
            total_pages: 0,
            total_items: 0,
            data: vec![],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "page": 1,
                "limit": 10,
                "totalPages": 0,
                "totalItems": 0,
                "data": []
            })
        );
    }
}
