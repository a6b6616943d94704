// leafsql: SQL access to the Leaf agricultural data API
// Copyright 2026 leafsql contributors
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

//! Pagination position tracking.

use crate::catalog::PaginationMode;

/// Where the next page starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PagePosition {
    /// Unpaginated endpoint, one request
    Single,
    Page(u64),
    Offset(usize),
    /// `None` before the first page
    Cursor(Option<String>),
}

/// Progress of one scan through a paginated endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaginationState {
    pub position: PagePosition,
    /// Records delivered so far
    pub delivered: usize,
    pub pages: usize,
    pub exhausted: bool,
}

impl PaginationState {
    /// Initial state for a scan starting `start_offset` records in.
    ///
    /// Page-number mode requires the offset to be page aligned; the planner
    /// only pushes offsets for which [`PaginationMode::can_start_at`] holds.
    pub fn start(mode: &PaginationMode, start_offset: usize) -> Self {
        let position = match mode {
            PaginationMode::None => PagePosition::Single,
            PaginationMode::PageNumber {
                page_size,
                first_page,
                ..
            } => PagePosition::Page(first_page + (start_offset / (*page_size).max(1)) as u64),
            PaginationMode::Offset { .. } => PagePosition::Offset(start_offset),
            PaginationMode::Cursor { .. } => PagePosition::Cursor(None),
        };
        Self {
            position,
            delivered: 0,
            pages: 0,
            exhausted: false,
        }
    }

    /// Records a received page and moves to the next position.
    ///
    /// `received` is the number of records in the page, `requested` the page
    /// size asked for. Returns whether another page may exist.
    pub fn advance(
        &mut self,
        received: usize,
        requested: Option<usize>,
        next_cursor: Option<String>,
        last_page: Option<bool>,
    ) -> bool {
        self.pages += 1;
        let full = requested.is_some_and(|size| received >= size);
        let has_more = match &mut self.position {
            PagePosition::Single => false,
            PagePosition::Page(page) => {
                *page += 1;
                full && last_page != Some(true)
            }
            PagePosition::Offset(offset) => {
                *offset += received;
                full && last_page != Some(true)
            }
            PagePosition::Cursor(cursor) => match next_cursor.filter(|c| !c.is_empty()) {
                Some(next) if received > 0 => {
                    *cursor = Some(next);
                    true
                }
                _ => false,
            },
        };
        if !has_more {
            self.exhausted = true;
        }
        has_more
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_start_and_advance() {
        let mut state = PaginationState::start(&PaginationMode::page_number(10), 20);
        assert_eq!(state.position, PagePosition::Page(2));
        assert!(state.advance(10, Some(10), None, None));
        assert_eq!(state.position, PagePosition::Page(3));
        assert!(!state.advance(4, Some(10), None, None));
        assert!(state.exhausted);
        assert_eq!(state.pages, 2);
    }

    #[test]
    fn test_last_flag_ends_scan() {
        let mut state = PaginationState::start(&PaginationMode::page_number(10), 0);
        assert!(!state.advance(10, Some(10), None, Some(true)));
    }

    #[test]
    fn test_offset_advance() {
        let mut state = PaginationState::start(&PaginationMode::offset(5), 7);
        assert!(state.advance(5, Some(5), None, None));
        assert_eq!(state.position, PagePosition::Offset(12));
    }

    #[test]
    fn test_cursor_advance() {
        let mut state = PaginationState::start(&PaginationMode::cursor("next", 5), 0);
        assert_eq!(state.position, PagePosition::Cursor(None));
        assert!(state.advance(5, Some(5), Some("abc".into()), None));
        assert_eq!(state.position, PagePosition::Cursor(Some("abc".into())));
        assert!(!state.advance(0, Some(5), Some("def".into()), None));
        let mut state = PaginationState::start(&PaginationMode::cursor("next", 5), 0);
        assert!(!state.advance(3, Some(5), Some(String::new()), None));
    }

    #[test]
    fn test_single() {
        let mut state = PaginationState::start(&PaginationMode::None, 0);
        assert!(!state.advance(1000, None, None, None));
    }
}
