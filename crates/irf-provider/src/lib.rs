//! IRF Provider - Anthropic Messages API generator
//!
//! [`AnthropicGenerator`] implements [`irf_core::TextGenerator`] over HTTP.
//! Responses are mapped onto [`irf_core::GenerationError`] so the session's
//! retry policy can tell transient failures from fatal ones:
//!
//! | response | error |
//! |---|---|
//! | 429, 529 | `RateLimited` (with `retry-after` when sent) |
//! | 401, 403 | `Auth` |
//! | client timeout | `Timeout` |
//! | anything else, empty text | `Provider` |

#![warn(unreachable_pub)]

mod anthropic;
mod error;
mod wire;

pub use anthropic::{AnthropicGenerator, ProviderConfig, DEFAULT_ENDPOINT, DEFAULT_MODEL, SYSTEM_PROMPT};
pub use error::ProviderError;
pub use wire::{classify_status, parse_retry_after};
