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

//! Stock node delegates.

/// Copy `data` into `cache`, zero filling the tail. Rejects data longer than the cache.
pub fn memcpy_writer(cache: &mut [u8], data: &[u8]) -> bool {
    if data.len() > cache.len() {
        return false;
    }
    let (head, tail) = cache.split_at_mut(data.len());
    head.copy_from_slice(data);
    tail.fill(0);
    true
}

/// Copy the whole `cache` into `out`. Fails if `out` is shorter than the cache.
pub fn memcpy_reader(cache: &[u8], out: &mut [u8]) -> Option<usize> {
    if out.len() < cache.len() {
        return None;
    }
    out[..cache.len()].copy_from_slice(cache);
    Some(cache.len())
}

/// Store UTF-8 text NUL padded in `cache`. Rejects text longer than the cache or not UTF-8.
///
/// A NUL in `data` terminates the text.
pub fn string_writer(cache: &mut [u8], data: &[u8]) -> bool {
    let len = data.iter().position(|b| *b == 0).unwrap_or(data.len());
    let text = &data[..len];
    if std::str::from_utf8(text).is_err() {
        return false;
    }
    memcpy_writer(cache, text)
}

/// Copy the text stored by [`string_writer`] into `out`, without the NUL padding.
pub fn string_reader(cache: &[u8], out: &mut [u8]) -> Option<usize> {
    let len = cache.iter().position(|b| *b == 0).unwrap_or(cache.len());
    memcpy_reader(&cache[..len], out)
}
