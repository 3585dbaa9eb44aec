pub mod categories;
pub mod coupons;
pub mod feedback;
pub mod offers;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;

use mongodb::bson::{doc, oid::ObjectId};
use mongodb::options::FindOptions;

use crate::error::ApiError;

pub(crate) fn parse_object_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::Validation("invalid id format".to_string()))
}

pub(crate) fn page_options(page: Option<u64>, limit: Option<i64>) -> FindOptions {
    let limit = limit.unwrap_or(50).clamp(1, 200);
    let page = page.unwrap_or(1).max(1);
    FindOptions::builder()
        .skip((page - 1) * limit as u64)
        .limit(limit)
        .sort(doc! { "created_at": -1 })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_parsing() {
        assert!(parse_object_id("65f1b2c3d4e5f6a7b8c9d0e1").is_ok());
        assert!(parse_object_id("not-an-id").is_err());
    }

    #[test]
    fn paging_defaults_and_clamps() {
        let opts = page_options(None, None);
        assert_eq!(opts.skip, Some(0));
        assert_eq!(opts.limit, Some(50));

        let opts = page_options(Some(3), Some(20));
        assert_eq!(opts.skip, Some(40));
        assert_eq!(opts.limit, Some(20));

        let opts = page_options(Some(0), Some(10_000));
        assert_eq!(opts.skip, Some(0));
        assert_eq!(opts.limit, Some(200));
    }
}
