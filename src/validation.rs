// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path parameter validation.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ApiError;

static NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name pattern is valid"));

/// A name is one or more of `A-Z a-z 0-9 _ -`.
pub fn is_valid_name(name: &str) -> bool {
    NAME.is_match(name)
}

/// Reject the request on the first invalid path parameter, in key order.
pub fn validate_path_params(params: &BTreeMap<String, String>) -> Result<(), ApiError> {
    match params.iter().find(|(_, value)| !is_valid_name(value)) {
        Some((key, _)) => Err(ApiError::invalid_name(key)),
        None => Ok(()),
    }
}
