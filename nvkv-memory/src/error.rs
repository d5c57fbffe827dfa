// Copyright 2026 foyer Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Configuration error of a tier.
///
/// Success is `Ok(())`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbError {
    /// A required handle or name is missing or empty, or a supplied node is structurally invalid.
    #[error("bad argument")]
    BadArg,
    /// The operation is invalid in the current lifecycle state, e.g. configuring twice.
    #[error("not available")]
    NotAvailable,
    /// The transcode buffer cannot hold the raw and serialized forms of the largest node.
    #[error("transcode buffer too small")]
    TranscodeBufferTooSmall,
}

/// Configuration result.
pub type DbResult<T> = std::result::Result<T, DbError>;
