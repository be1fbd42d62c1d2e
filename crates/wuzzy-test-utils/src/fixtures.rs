// SPDX-FileCopyrightText: 2026 Wuzzy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sample records.

use uuid::Uuid;
use wuzzy_core::{ApplicationType, UbiQuery};

/// An image-search query for `text` under `client_id`.
pub fn sample_query(text: &str, client_id: &str) -> UbiQuery {
    UbiQuery {
        application: ApplicationType::GraphqlImages,
        query_id: Uuid::new_v4(),
        client_id: client_id.to_string(),
        user_query: text.to_string(),
        timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        query_response_hit_ids: vec![format!("{text}-hit-1"), format!("{text}-hit-2")],
        query_attributes: None,
    }
}
