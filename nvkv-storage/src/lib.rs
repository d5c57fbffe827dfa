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


//! NVM tier of nvkv.
//!
//! An [`NvmKvdb`](crate::nvm::NvmKvdb) wraps a RAM tier and mirrors its persistent nodes into a partition of a
//! non-volatile key-value [`Device`](crate::device::Device).

pub mod device;
/// The NVM tier.
pub mod nvm;

/// Re-exports of the commonly used types.
pub mod prelude;
