// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Text passes applied to rendered markup.
//!
//! Both passes are total: a failure is logged and the input is returned
//! unchanged, so a broken macro or stylesheet never takes a page down.

pub mod macros;
pub mod scope;

pub use macros::expand_macros;
pub use scope::{ScopeRewriter, DEFAULT_SCOPE_DEPTH, SCOPE_ATTRIBUTE_PREFIX};
